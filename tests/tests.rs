//! Run with `cargo test --all-features`.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Once;

use quickcheck_macros::quickcheck;
use reqeval::{
    CacheKind, DispatchEntry, EvaluationError, Evaluator, Request, Tagged, Zone, register_zone,
};

macro_rules! test {
    (miss: $call:expr, $result:expr) => {{
        assert_eq!($call, $result);
        assert!(!reqeval::internal::last_was_hit());
    }};
    (hit: $call:expr, $result:expr) => {{
        assert_eq!($call, $result);
        assert!(reqeval::internal::last_was_hit());
    }};
}

const BASIC: Zone = Zone(20);

thread_local! {
    static CALLS: Cell<usize> = const { Cell::new(0) };
    static ORDER: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

fn calls() -> usize {
    CALLS.with(Cell::get)
}

fn count_call() {
    CALLS.with(|cell| cell.set(cell.get() + 1));
}

fn setup() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        register_zone(
            BASIC,
            [
                DispatchEntry::of::<Empty>(),
                DispatchEntry::of::<Double>(),
                DispatchEntry::of::<Fib>(),
                DispatchEntry::of::<Roll>(),
                DispatchEntry::of::<Square>(),
                DispatchEntry::of::<Area>(),
                DispatchEntry::of::<Trace>(),
                DispatchEntry::of::<Slotted>(),
            ],
        )
        .unwrap();
    });
    CALLS.with(|cell| cell.set(0));
    ORDER.with(|order| order.borrow_mut().clear());
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Tagged)]
#[tagged(zone = BASIC, id = 0)]
struct Empty;

impl Request for Empty {
    type Output = u8;
    const CACHE_KIND: CacheKind = CacheKind::Cached;

    fn compute(&self, _: &mut Evaluator) -> Result<u8, EvaluationError> {
        Ok(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Tagged)]
#[tagged(zone = BASIC, id = 1)]
struct Double(u32);

impl Request for Double {
    type Output = u32;
    const CACHE_KIND: CacheKind = CacheKind::Cached;

    fn compute(&self, _: &mut Evaluator) -> Result<u32, EvaluationError> {
        count_call();
        Ok(2 * self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Tagged)]
#[tagged(zone = BASIC, id = 2)]
struct Fib(u32);

impl Request for Fib {
    type Output = u64;
    const CACHE_KIND: CacheKind = CacheKind::Cached;

    fn compute(&self, evaluator: &mut Evaluator) -> Result<u64, EvaluationError> {
        if self.0 <= 2 {
            return Ok(1);
        }
        Ok(evaluator.evaluate(Fib(self.0 - 1))? + evaluator.evaluate(Fib(self.0 - 2))?)
    }
}

/// Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Tagged)]
#[tagged(zone = BASIC, id = 3)]
struct Roll(u32);

impl Request for Roll {
    type Output = u32;

    fn compute(&self, _: &mut Evaluator) -> Result<u32, EvaluationError> {
        count_call();
        Ok(self.0 + 1)
    }
}

/// Cached only for large numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Tagged)]
#[tagged(zone = BASIC, id = 4)]
struct Square(u64);

impl Request for Square {
    type Output = u64;
    const CACHE_KIND: CacheKind = CacheKind::Cached;

    fn compute(&self, _: &mut Evaluator) -> Result<u64, EvaluationError> {
        count_call();
        Ok(self.0 * self.0)
    }

    fn is_cached(&self) -> bool {
        self.0 >= 10
    }
}

/// A shape that remembers its own area.
#[derive(Clone)]
struct Shape(Rc<ShapeData>);

struct ShapeData {
    width: u64,
    height: u64,
    area: Cell<Option<u64>>,
}

impl Shape {
    fn new(width: u64, height: u64) -> Self {
        Self(Rc::new(ShapeData { width, height, area: Cell::new(None) }))
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Shape {}

impl Hash for Shape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl Debug for Shape {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Shape({}x{})", self.0.width, self.0.height)
    }
}

/// Caches its result in the shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Tagged)]
#[tagged(zone = BASIC, id = 5)]
struct Area(Shape);

impl Request for Area {
    type Output = u64;
    const CACHE_KIND: CacheKind = CacheKind::SeparatelyCached;

    fn compute(&self, _: &mut Evaluator) -> Result<u64, EvaluationError> {
        count_call();
        Ok(self.0.0.width * self.0.0.height)
    }

    fn cached_result(&self) -> Option<u64> {
        self.0.0.area.get()
    }

    fn cache_result(&self, output: u64) {
        self.0.0.area.set(Some(output));
    }
}

/// Logs its evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Tagged)]
#[tagged(zone = BASIC, id = 6)]
struct Trace(&'static str);

impl Request for Trace {
    type Output = &'static str;

    fn compute(&self, _: &mut Evaluator) -> Result<&'static str, EvaluationError> {
        ORDER.with(|order| order.borrow_mut().push(self.0));
        Ok(self.0)
    }
}

/// Caches in its own slot, but compares by key only.
#[derive(Clone, Tagged)]
#[tagged(zone = BASIC, id = 7)]
struct Slotted {
    key: u32,
    slot: Rc<Cell<Option<u32>>>,
}

impl Slotted {
    fn new(key: u32) -> Self {
        Self { key, slot: Rc::new(Cell::new(None)) }
    }
}

impl PartialEq for Slotted {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Slotted {}

impl Hash for Slotted {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl Debug for Slotted {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Slotted({})", self.key)
    }
}

impl Request for Slotted {
    type Output = u32;
    const CACHE_KIND: CacheKind = CacheKind::SeparatelyCached;

    fn compute(&self, _: &mut Evaluator) -> Result<u32, EvaluationError> {
        count_call();
        Ok(self.key * 10)
    }

    fn cached_result(&self) -> Option<u32> {
        self.slot.get()
    }

    fn cache_result(&self, output: u32) {
        self.slot.set(Some(output));
    }
}

/// Test basic memoization.
#[test]
fn test_basic() {
    setup();
    let mut evaluator = Evaluator::new();

    test!(miss: evaluator.evaluate(Empty).unwrap(), 0);
    test!(hit: evaluator.evaluate(Empty).unwrap(), 0);

    test!(miss: evaluator.evaluate(Double(21)).unwrap(), 42);
    test!(hit: evaluator.evaluate(Double(21)).unwrap(), 42);
    test!(miss: evaluator.evaluate(Double(5)).unwrap(), 10);
    assert_eq!(calls(), 2);

    test!(miss: evaluator.evaluate(Fib(5)).unwrap(), 5);
    test!(hit: evaluator.evaluate(Fib(3)).unwrap(), 2);
    test!(miss: evaluator.evaluate(Fib(8)).unwrap(), 21);
    test!(hit: evaluator.evaluate(Fib(7)).unwrap(), 13);
    assert!(evaluator.is_cached_internally(&Fib(6)));
    assert!(!evaluator.is_cached_internally(&Fib(9)));
}

/// Test that uncached requests run every time.
#[test]
fn test_uncached() {
    setup();
    let mut evaluator = Evaluator::new();
    test!(miss: evaluator.evaluate(Roll(1)).unwrap(), 2);
    test!(miss: evaluator.evaluate(Roll(1)).unwrap(), 2);
    assert_eq!(calls(), 2);
    assert_eq!(evaluator.cache_len(), 0);
    assert!(!evaluator.is_cached_internally(&Roll(1)));
}

/// Test that a request can opt out of caching per instance.
#[test]
fn test_instance_predicate() {
    setup();
    let mut evaluator = Evaluator::new();
    test!(miss: evaluator.evaluate(Square(3)).unwrap(), 9);
    test!(miss: evaluator.evaluate(Square(3)).unwrap(), 9);
    test!(miss: evaluator.evaluate(Square(12)).unwrap(), 144);
    test!(hit: evaluator.evaluate(Square(12)).unwrap(), 144);
    assert_eq!(calls(), 3);
    assert_eq!(evaluator.cache_len(), 1);
}

/// Test that clearing the cache forces recomputation.
#[test]
fn test_clear_cache() {
    setup();
    let mut evaluator = Evaluator::new();
    test!(miss: evaluator.evaluate(Double(2)).unwrap(), 4);
    test!(hit: evaluator.evaluate(Double(2)).unwrap(), 4);
    evaluator.clear_cache();
    assert_eq!(evaluator.cache_len(), 0);
    test!(miss: evaluator.evaluate(Double(2)).unwrap(), 4);
    assert_eq!(calls(), 2);
}

/// Test age-based eviction.
#[test]
fn test_evict() {
    setup();
    let mut evaluator = Evaluator::new();
    test!(miss: evaluator.evaluate(Empty).unwrap(), 0);
    test!(hit: evaluator.evaluate(Empty).unwrap(), 0);
    evaluator.evict(2);
    test!(hit: evaluator.evaluate(Empty).unwrap(), 0);
    evaluator.evict(2);
    evaluator.evict(2);
    test!(hit: evaluator.evaluate(Empty).unwrap(), 0);
    evaluator.evict(2);
    evaluator.evict(2);
    evaluator.evict(2);
    test!(miss: evaluator.evaluate(Empty).unwrap(), 0);
    test!(hit: evaluator.evaluate(Empty).unwrap(), 0);
    evaluator.evict(0);
    test!(miss: evaluator.evaluate(Empty).unwrap(), 0);
    test!(hit: evaluator.evaluate(Empty).unwrap(), 0);
}

/// Test requests that keep their results themselves.
#[test]
fn test_external_cache() {
    setup();
    let mut evaluator = Evaluator::new();
    let shape = Shape::new(3, 4);

    test!(miss: evaluator.evaluate(Area(shape.clone())).unwrap(), 12);
    assert_eq!(shape.0.area.get(), Some(12));
    test!(hit: evaluator.evaluate(Area(shape.clone())).unwrap(), 12);
    assert!(!evaluator.is_cached_internally(&Area(shape.clone())));
    assert_eq!(evaluator.cache_len(), 0);

    // Same dimensions, but a different shape.
    test!(miss: evaluator.evaluate(Area(Shape::new(3, 4))).unwrap(), 12);

    // The shape's cache survives clearing the evaluator's.
    evaluator.clear_cache();
    test!(hit: evaluator.evaluate(Area(shape)).unwrap(), 12);
    assert_eq!(calls(), 2);
}

/// Test that results are stored on the instance that was asked for.
#[test]
fn test_external_cache_per_instance() {
    setup();
    let mut evaluator = Evaluator::new();
    let (first, second) = (Slotted::new(1), Slotted::new(1));

    test!(miss: evaluator.evaluate(first.clone()).unwrap(), 10);
    test!(miss: evaluator.evaluate(second.clone()).unwrap(), 10);
    assert_eq!(first.slot.get(), Some(10));
    assert_eq!(second.slot.get(), Some(10));

    test!(hit: evaluator.evaluate(second).unwrap(), 10);
    test!(hit: evaluator.evaluate(first).unwrap(), 10);
    assert_eq!(calls(), 2);
    assert_eq!(evaluator.graph_len(), 1);
}

/// Test that batches run from left to right.
#[test]
fn test_batch_order() {
    setup();
    let mut evaluator = Evaluator::new();
    let (c, a, b) = evaluator.evaluate_all((Trace("c"), Trace("a"), Trace("b")));
    assert_eq!((c.unwrap(), a.unwrap(), b.unwrap()), ("c", "a", "b"));
    assert_eq!(ORDER.with(|order| order.borrow().clone()), ["c", "a", "b"]);

    let (double, fib) = evaluator.evaluate_all((Double(4), Fib(6)));
    assert_eq!(double.unwrap(), 8);
    assert_eq!(fib.unwrap(), 8);
}

/// Test that the default is not used without a cycle.
#[test]
fn test_default_without_cycle() {
    setup();
    let mut evaluator = Evaluator::new();
    assert_eq!(evaluator.evaluate_or_default(Double(7), 0).unwrap(), 14);
}

#[quickcheck]
fn test_memoized_matches_direct(n: u16) -> bool {
    setup();
    let mut evaluator = Evaluator::new();
    let first = evaluator.evaluate(Double(n.into())).unwrap();
    let second = evaluator.evaluate(Double(n.into())).unwrap();
    first == 2 * u32::from(n) && second == first && reqeval::internal::last_was_hit()
}

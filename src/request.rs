use std::any::Any;
use std::borrow::Cow;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::EvaluationError;
use crate::evaluator::Evaluator;
use crate::tag::{Tagged, TypeTag, Zone};
use crate::value::Value;

/// How the results of a request type are cached.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CacheKind {
    /// Every evaluation runs the request's function.
    Uncached,
    /// Results are stored in the evaluator's cache.
    Cached,
    /// Results are stored by the request itself, through
    /// [`Request::cached_result`] and [`Request::cache_result`].
    SeparatelyCached,
}

impl CacheKind {
    /// Whether results of this kind are ever cached.
    pub const fn is_ever_cached(self) -> bool {
        !matches!(self, Self::Uncached)
    }

    /// Whether the request type owns its cache.
    pub const fn has_external_cache(self) -> bool {
        matches!(self, Self::SeparatelyCached)
    }
}

/// A value describing one computation.
///
/// A request is both the instruction and the cache key: two equal requests
/// must produce equal results. Requests are evaluated through
/// [`Evaluator::evaluate`], which dispatches to the function registered for
/// the request's tag (usually [`Request::compute`], see
/// [`DispatchEntry`](crate::DispatchEntry)).
pub trait Request: Tagged + Clone + Eq + Hash + Debug + 'static {
    /// The result of the computation.
    type Output: Value;

    /// How results of this request type are cached.
    const CACHE_KIND: CacheKind = CacheKind::Uncached;

    /// Compute the result, possibly evaluating other requests.
    fn compute(&self, evaluator: &mut Evaluator) -> Result<Self::Output, EvaluationError>;

    /// Whether this instance should be cached.
    ///
    /// Only consulted when [`Self::CACHE_KIND`] is not
    /// [`CacheKind::Uncached`]. Cheap instances of an otherwise cached type
    /// can opt out.
    fn is_cached(&self) -> bool {
        Self::CACHE_KIND.is_ever_cached()
    }

    /// A previously stored result, for [`CacheKind::SeparatelyCached`]
    /// requests.
    ///
    /// Consulted on the instance passed to [`Evaluator::evaluate`], which is
    /// also the one [`Request::cache_result`] is called on.
    fn cached_result(&self) -> Option<Self::Output> {
        None
    }

    /// Store a result, for [`CacheKind::SeparatelyCached`] requests.
    fn cache_result(&self, output: Self::Output) {
        let _ = output;
    }

    /// Explain that this request depends on itself.
    fn diagnose_cycle(&self, sink: &mut dyn DiagnosticSink) {
        sink.emit(Diagnostic::error(format!("circular reference in {self:?}")));
    }

    /// Explain that this request is one step on a cycle.
    fn note_cycle_step(&self, sink: &mut dyn DiagnosticSink) {
        sink.emit(Diagnostic::note(format!("through reference here: {self:?}")));
    }
}

/// A type-erased request, usable as a hash map key.
///
/// Besides normal requests, there are two sentinel states, the _empty_ and the
/// _tombstone_ key, for callers that build open-addressed tables on top of
/// requests. A sentinel never equals a normal request and always equals the
/// same kind of sentinel.
#[derive(Clone)]
pub struct AnyRequest {
    tag: TypeTag,
    hash: u128,
    storage: Storage,
}

#[derive(Clone)]
enum Storage {
    Normal(Rc<dyn RequestHolder>),
    Empty,
    Tombstone,
}

/// Sentinels get a tag from the reserved wrapper zone that no type uses.
const SENTINEL_TAG: TypeTag = TypeTag::new(Zone::TEMPLATES, u8::MAX);

impl AnyRequest {
    /// Erase the type of a request.
    pub fn new<R: Request>(request: R) -> Self {
        Self {
            tag: R::TAG,
            hash: crate::hash::hash(R::TAG, &request),
            storage: Storage::Normal(Rc::new(Holder(request))),
        }
    }

    /// The empty sentinel.
    pub fn empty_key() -> Self {
        Self { tag: SENTINEL_TAG, hash: u128::MAX, storage: Storage::Empty }
    }

    /// The tombstone sentinel.
    pub fn tombstone_key() -> Self {
        Self { tag: SENTINEL_TAG, hash: u128::MAX - 1, storage: Storage::Tombstone }
    }

    /// Whether this is one of the two sentinels.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self.storage, Storage::Normal(_))
    }

    /// The tag of the request's type.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// The name of the request's type.
    pub fn type_name(&self) -> Cow<'static, str> {
        match &self.storage {
            Storage::Normal(holder) => holder.type_name(),
            Storage::Empty => Cow::Borrowed("<empty>"),
            Storage::Tombstone => Cow::Borrowed("<tombstone>"),
        }
    }

    /// The stable 128-bit hash of the tag and the payload.
    pub fn stable_hash(&self) -> u128 {
        self.hash
    }

    /// Access the request as an `R`.
    ///
    /// Panics if the request is of a different type or a sentinel.
    #[track_caller]
    pub fn cast_to<R: Request>(&self) -> &R {
        match self.get_as::<R>() {
            Some(request) => request,
            None => panic!(
                "reqeval: cannot cast a request of type `{}` to `{}`",
                self.type_name(),
                R::type_name(),
            ),
        }
    }

    /// Access the request as an `R` if it is one.
    pub fn get_as<R: Request>(&self) -> Option<&R> {
        match &self.storage {
            Storage::Normal(holder) if self.tag == R::TAG => {
                holder.as_any().downcast_ref()
            }
            _ => None,
        }
    }

    /// Let the request explain that it depends on itself.
    pub fn diagnose_cycle(&self, sink: &mut dyn DiagnosticSink) {
        if let Storage::Normal(holder) = &self.storage {
            holder.diagnose_cycle(sink);
        }
    }

    /// Let the request explain that it is one step on a cycle.
    pub fn note_cycle_step(&self, sink: &mut dyn DiagnosticSink) {
        if let Storage::Normal(holder) = &self.storage {
            holder.note_cycle_step(sink);
        }
    }
}

impl PartialEq for AnyRequest {
    fn eq(&self, other: &Self) -> bool {
        match (&self.storage, &other.storage) {
            (Storage::Normal(a), Storage::Normal(b)) => {
                self.tag == other.tag && self.hash == other.hash && a.equals(&**b)
            }
            (Storage::Empty, Storage::Empty) => true,
            (Storage::Tombstone, Storage::Tombstone) => true,
            _ => false,
        }
    }
}

impl Eq for AnyRequest {}

impl Hash for AnyRequest {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u128(self.hash);
    }
}

impl Display for AnyRequest {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.storage {
            Storage::Normal(holder) => holder.display(f),
            Storage::Empty => f.pad("<empty key>"),
            Storage::Tombstone => f.pad("<tombstone key>"),
        }
    }
}

impl Debug for AnyRequest {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Object-safe operations on a stored request.
trait RequestHolder {
    fn as_any(&self) -> &dyn Any;
    fn equals(&self, other: &dyn RequestHolder) -> bool;
    fn display(&self, f: &mut Formatter) -> fmt::Result;
    fn type_name(&self) -> Cow<'static, str>;
    fn diagnose_cycle(&self, sink: &mut dyn DiagnosticSink);
    fn note_cycle_step(&self, sink: &mut dyn DiagnosticSink);
}

struct Holder<R>(R);

impl<R: Request> RequestHolder for Holder<R> {
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn equals(&self, other: &dyn RequestHolder) -> bool {
        other.as_any().downcast_ref::<R>().is_some_and(|other| self.0 == *other)
    }

    fn display(&self, f: &mut Formatter) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }

    fn type_name(&self) -> Cow<'static, str> {
        R::type_name()
    }

    fn diagnose_cycle(&self, sink: &mut dyn DiagnosticSink) {
        self.0.diagnose_cycle(sink);
    }

    fn note_cycle_step(&self, sink: &mut dyn DiagnosticSink) {
        self.0.note_cycle_step(sink);
    }
}

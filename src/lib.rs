//! Demand-driven request evaluation.
//!
//! A request is a small, hashable value that describes a computation. Asking
//! an [`Evaluator`] for a request runs the function registered for its type,
//! which may in turn ask for further requests. Along the way, the evaluator
//!
//! - memoizes results, either in its own cache or in a cache the request
//!   keeps itself (see [`CacheKind`]),
//! - records which requests each request asked for, and
//! - detects requests that transitively ask for themselves and reports them
//!   as [`CyclicDependency`] errors instead of overflowing the stack.
//!
//! ```
//! use reqeval::{
//!     CacheKind, DispatchEntry, EvaluationError, Evaluator, Request, Tagged,
//!     Zone, register_zone,
//! };
//!
//! const ARITHMETIC: Zone = Zone(10);
//!
//! /// Doubles a number.
//! #[derive(Debug, Clone, PartialEq, Eq, Hash, Tagged)]
//! #[tagged(zone = ARITHMETIC, id = 0)]
//! struct Double(u32);
//!
//! impl Request for Double {
//!     type Output = u32;
//!     const CACHE_KIND: CacheKind = CacheKind::Cached;
//!
//!     fn compute(&self, _: &mut Evaluator) -> Result<u32, EvaluationError> {
//!         Ok(2 * self.0)
//!     }
//! }
//!
//! register_zone(ARITHMETIC, [DispatchEntry::of::<Double>()]).unwrap();
//!
//! let mut evaluator = Evaluator::new();
//! assert_eq!(evaluator.evaluate(Double(21)).unwrap(), 42);
//! assert!(evaluator.is_cached_internally(&Double(21)));
//! ```
//!
//! Evaluation functions are found through a process-wide table that is filled
//! once per [`Zone`] with [`register_zone`]. Evaluators themselves are not
//! shared between threads.

extern crate self as reqeval;

mod batch;
mod cache;
mod diagnostics;
mod dispatch;
mod error;
mod evaluator;
mod graph;
mod hash;
mod request;
mod stats;
mod tag;
#[cfg(feature = "testing")]
mod testing;
mod value;

pub use crate::batch::Batch;
pub use crate::diagnostics::{
    CycleDiagnostics, Diagnostic, DiagnosticBuffer, DiagnosticSink, Severity, TracingSink,
};
pub use crate::dispatch::{DispatchEntry, is_registered, register_zone};
pub use crate::error::{CyclicDependency, EvaluationError, RegistryError};
pub use crate::evaluator::{Evaluator, EvaluatorOptions};
pub use crate::request::{AnyRequest, CacheKind, Request};
pub use crate::stats::{RequestCounts, StatsCollector};
pub use crate::tag::{Tagged, TypeTag, Zone};
pub use crate::value::{AnyValue, Value};

#[cfg(feature = "macros")]
pub use reqeval_macros::Tagged;

/// These are implementation details. Do not rely on them!
#[doc(hidden)]
pub mod internal {
    pub use crate::tag::distinct_local_ids;
    #[cfg(feature = "testing")]
    pub use crate::testing::{Outcome, last_outcome, last_was_hit};
}

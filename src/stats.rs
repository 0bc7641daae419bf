use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::request::AnyRequest;
use crate::tag::{Tagged, TypeTag};

/// Observes the requests an evaluator executes.
///
/// Cache hits are not reported, only actual runs of evaluation functions.
pub trait StatsCollector {
    /// Called right before a request's function runs.
    fn request_evaluated(&mut self, request: &AnyRequest);
}

/// Counts executed requests per request type.
///
/// Clones share their counts, so one clone can be handed to an evaluator and
/// another kept for inspection.
#[derive(Debug, Default, Clone)]
pub struct RequestCounts(Rc<RefCell<FxHashMap<TypeTag, (Cow<'static, str>, usize)>>>);

impl RequestCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// How often requests with the given tag were executed.
    pub fn get(&self, tag: TypeTag) -> usize {
        self.0.borrow().get(&tag).map_or(0, |&(_, count)| count)
    }

    /// How often requests of type `R` were executed.
    pub fn count<R: Tagged>(&self) -> usize {
        self.get(R::TAG)
    }

    /// How many requests were executed in total.
    pub fn total(&self) -> usize {
        self.0.borrow().values().map(|&(_, count)| count).sum()
    }

    /// The type names and counts of all executed request types, most
    /// frequent first.
    pub fn snapshot(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<_> = self
            .0
            .borrow()
            .values()
            .map(|(name, count)| (name.to_string(), *count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}

impl StatsCollector for RequestCounts {
    fn request_evaluated(&mut self, request: &AnyRequest) {
        self.0
            .borrow_mut()
            .entry(request.tag())
            .or_insert_with(|| (request.type_name(), 0))
            .1 += 1;
    }
}

use std::fmt::{self, Write};
use std::io;
use std::path::PathBuf;

use crate::batch::Batch;
use crate::cache::Cache;
use crate::diagnostics::{CycleDiagnostics, DiagnosticSink, TracingSink};
use crate::dispatch;
use crate::error::{CyclicDependency, EvaluationError};
use crate::graph::{DependencyGraph, NodeId};
use crate::request::{AnyRequest, Request};
use crate::stats::StatsCollector;
use crate::value::AnyValue;

/// Configuration of an [`Evaluator`], fixed for its lifetime.
#[derive(Debug, Default, Clone)]
pub struct EvaluatorOptions {
    /// What to report when a cyclic request is detected.
    pub cycle_diagnostics: CycleDiagnostics,
    /// Where to write the whole dependency graph in GraphViz format when the
    /// evaluator is dropped.
    pub graphviz_output: Option<PathBuf>,
}

impl EvaluatorOptions {
    /// Set what to report when a cyclic request is detected.
    pub fn with_cycle_diagnostics(mut self, mode: CycleDiagnostics) -> Self {
        self.cycle_diagnostics = mode;
        self
    }

    /// Write the dependency graph to `path` when the evaluator is dropped.
    pub fn with_graphviz_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.graphviz_output = Some(path.into());
        self
    }
}

/// Evaluates requests, memoizes their results and records which requests
/// depend on which.
///
/// An evaluator is used from a single thread. Evaluation is reentrant only
/// through the `&mut Evaluator` that a request's function receives.
pub struct Evaluator {
    options: EvaluatorOptions,
    /// Receives cycle explanations.
    diagnostics: Box<dyn DiagnosticSink>,
    /// Receives cycle dumps.
    debug_output: Box<dyn io::Write>,
    /// Notified of every executed request.
    stats: Option<Box<dyn StatsCollector>>,
    /// Every request seen so far and its dependencies.
    graph: DependencyGraph,
    /// Results of internally cached requests.
    cache: Cache,
    /// The requests currently being evaluated, innermost last.
    active: Vec<NodeId>,
}

impl Evaluator {
    /// Create an evaluator with default options.
    pub fn new() -> Self {
        Self::with_options(EvaluatorOptions::default())
    }

    /// Create an evaluator with the given options.
    pub fn with_options(options: EvaluatorOptions) -> Self {
        Self {
            options,
            diagnostics: Box::new(TracingSink),
            debug_output: Box::new(io::stderr()),
            stats: None,
            graph: DependencyGraph::default(),
            cache: Cache::default(),
            active: Vec::new(),
        }
    }

    /// Send cycle explanations to the given sink instead of `tracing`.
    pub fn with_diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.diagnostics = Box::new(sink);
        self
    }

    /// Send cycle dumps to the given stream instead of stderr.
    pub fn with_debug_output(mut self, output: impl io::Write + 'static) -> Self {
        self.debug_output = Box::new(output);
        self
    }

    /// Notify the given collector of every executed request.
    pub fn with_stats(mut self, stats: impl StatsCollector + 'static) -> Self {
        self.stats = Some(Box::new(stats));
        self
    }

    /// The options the evaluator was created with.
    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    /// Evaluate a request, or reuse a cached result for it.
    ///
    /// Fails with [`EvaluationError::Cycle`] if the request is already being
    /// evaluated further up the stack. Failures of the request's own function
    /// are returned unchanged and are never cached.
    pub fn evaluate<R: Request>(&mut self, request: R) -> Result<R::Output, EvaluationError> {
        // Requests that cache externally are checked before they enter the
        // graph, so a hit records no dependency.
        if R::CACHE_KIND.has_external_cache()
            && request.is_cached()
            && let Some(output) = request.cached_result()
        {
            tracing::trace!(?request, "external cache hit");

            #[cfg(feature = "testing")]
            crate::testing::register(crate::testing::Outcome::Hit);

            return Ok(output);
        }

        let node = self.graph.canonicalize(AnyRequest::new(request.clone()));
        self.enter(node)?.result(&request)
    }

    /// Evaluate a fixed-size tuple of requests, strictly from left to right.
    pub fn evaluate_all<B: Batch>(&mut self, batch: B) -> B::Output {
        batch.evaluate_with(self)
    }

    /// Evaluate a request, substituting `default` if it turns out to be cyclic.
    ///
    /// Only cyclic dependencies are replaced. Any other failure is returned.
    pub fn evaluate_or_default<R: Request>(
        &mut self,
        request: R,
        default: R::Output,
    ) -> Result<R::Output, EvaluationError> {
        match self.evaluate(request) {
            Err(EvaluationError::Cycle(cycle)) => {
                tracing::trace!(%cycle, "substituting default for cyclic request");
                Ok(default)
            }
            result => result,
        }
    }

    /// Drop all internally cached results.
    ///
    /// Requests that cache externally keep their results.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Evict internally cached results.
    ///
    /// This removes all results whose age is larger than or equal to
    /// `max_age`. The age of a result grows by one during each eviction and is
    /// reset to zero when the result produces a cache hit. Set `max_age` to
    /// zero to completely clear the cache.
    pub fn evict(&mut self, max_age: usize) {
        self.cache.evict(max_age);
    }

    /// Forget all requests, their dependencies and their internally cached
    /// results.
    ///
    /// Panics if called while a request is being evaluated.
    pub fn reset(&mut self) {
        assert!(
            self.active.is_empty(),
            "reqeval: cannot reset an evaluator while it evaluates requests",
        );
        self.cache.clear();
        self.graph.clear();
    }

    /// Whether the evaluator holds a cached result for the request.
    pub fn is_cached_internally<R: Request>(&self, request: &R) -> bool {
        self.graph
            .find(&AnyRequest::new(request.clone()))
            .is_some_and(|node| self.cache.contains(node))
    }

    /// The requests that the request asked for during its most recent
    /// uncached evaluation, or `None` if the evaluator has never seen it.
    pub fn dependencies_of<R: Request>(&self, request: &R) -> Option<Vec<AnyRequest>> {
        let node = self.graph.find(&AnyRequest::new(request.clone()))?;
        Some(self.graph.edges(node).iter().map(|&id| self.graph.request(id).clone()).collect())
    }

    /// The requests currently being evaluated, outermost first.
    pub fn active_requests(&self) -> Vec<AnyRequest> {
        self.active.iter().map(|&id| self.graph.request(id).clone()).collect()
    }

    /// The number of internally cached results.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// The number of distinct requests the evaluator has seen.
    pub fn graph_len(&self) -> usize {
        self.graph.len()
    }

    /// Print the dependency tree of a request.
    pub fn print_dependencies<R: Request>(
        &self,
        request: &R,
        out: &mut impl Write,
    ) -> fmt::Result {
        self.print_dependencies_highlighting(&AnyRequest::new(request.clone()), &[], out)
    }

    /// Print the dependency tree of a request and mark the requests in
    /// `highlight`.
    pub fn print_dependencies_highlighting(
        &self,
        request: &AnyRequest,
        highlight: &[AnyRequest],
        out: &mut impl Write,
    ) -> fmt::Result {
        let highlight: Vec<NodeId> =
            highlight.iter().filter_map(|request| self.graph.find(request)).collect();
        match self.graph.find(request) {
            Some(root) => self.graph.print_tree(&self.cache, root, &highlight, out),
            None => writeln!(out, "`-- {request} (dependency not evaluated)"),
        }
    }

    /// The dependency tree of a request as a string.
    pub fn dump_dependencies<R: Request>(&self, request: &R) -> String {
        let mut out = String::new();
        let _ = self.print_dependencies(request, &mut out);
        out
    }

    /// Print every request the evaluator has seen and their dependencies in
    /// GraphViz format.
    pub fn print_dependencies_graphviz(&self, out: &mut impl Write) -> fmt::Result {
        self.graph.print_graphviz(&self.cache, out)
    }

    /// Record the dependency of the innermost active request on `node` and
    /// make `node` active.
    fn enter(&mut self, node: NodeId) -> Result<ActiveRequest<'_>, EvaluationError> {
        if let Some(&parent) = self.active.last() {
            self.graph.add_edge(parent, node);
        }

        if let Some(start) = self.active.iter().position(|&id| id == node) {
            return Err(self.diagnose_cycle(node, start).into());
        }

        self.active.push(node);
        Ok(ActiveRequest { evaluator: self, node })
    }

    /// Report a cycle from the active request at `start` back to `node`.
    fn diagnose_cycle(&mut self, node: NodeId, start: usize) -> CyclicDependency {
        let request = self.graph.request(node).clone();
        let path: Vec<AnyRequest> =
            self.active[start..].iter().map(|&id| self.graph.request(id).clone()).collect();

        tracing::debug!(%request, length = path.len(), "cyclic dependency detected");

        match self.options.cycle_diagnostics {
            CycleDiagnostics::Silent => {}
            CycleDiagnostics::Full => {
                let sink = &mut *self.diagnostics;
                request.diagnose_cycle(sink);
                for step in &path[1..] {
                    step.note_cycle_step(sink);
                }
            }
            CycleDiagnostics::DebugDump => self.dump_cycle(),
        }

        CyclicDependency::new(request, path)
    }

    /// Write the dependency tree of the outermost active request, with all
    /// active requests highlighted, to the debug output.
    fn dump_cycle(&mut self) {
        let Some(&root) = self.active.first() else { return };

        let mut text = String::from("===CYCLE DETECTED===\n");
        let _ = self.graph.print_tree(&self.cache, root, &self.active, &mut text);

        if let Err(err) = self.debug_output.write_all(text.as_bytes()) {
            tracing::warn!(%err, "failed to write cycle dump");
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Evaluator {
    fn drop(&mut self) {
        let Some(path) = &self.options.graphviz_output else { return };

        let mut text = String::new();
        if self.print_dependencies_graphviz(&mut text).is_err() {
            return;
        }

        match std::fs::write(path, text) {
            Ok(()) => tracing::debug!(path = %path.display(), "wrote request graph"),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "failed to write request graph")
            }
        }
    }
}

/// A request on the active stack.
///
/// Dropping it pops the request again, no matter how evaluation ended.
struct ActiveRequest<'a> {
    evaluator: &'a mut Evaluator,
    node: NodeId,
}

impl ActiveRequest<'_> {
    /// Produce the result of `caller`, the instance that was asked for,
    /// according to its caching discipline.
    fn result<R: Request>(&mut self, caller: &R) -> Result<R::Output, EvaluationError> {
        let request = self.evaluator.graph.request(self.node).clone();

        if !R::CACHE_KIND.is_ever_cached() || !caller.is_cached() {
            return self.compute(&request).map(|value| value.cast_to::<R::Output>().clone());
        }

        if R::CACHE_KIND.has_external_cache() {
            // The external cache already missed in `Evaluator::evaluate`. The
            // result goes to the caller's storage, not the canonical copy's.
            let value = self.compute(&request)?;
            let output = value.cast_to::<R::Output>().clone();
            caller.cache_result(output.clone());
            return Ok(output);
        }

        if let Some(value) = self.evaluator.cache.lookup(self.node) {
            tracing::trace!(%request, "cache hit");

            #[cfg(feature = "testing")]
            crate::testing::register(crate::testing::Outcome::Hit);

            return Ok(value.cast_to::<R::Output>().clone());
        }

        let value = self.compute(&request)?;
        let output = value.cast_to::<R::Output>().clone();
        self.evaluator.cache.insert(self.node, value);
        Ok(output)
    }

    /// Run the request's registered function.
    fn compute(&mut self, request: &AnyRequest) -> Result<AnyValue, EvaluationError> {
        let evaluator = &mut *self.evaluator;

        // The dependencies are rebuilt by this run.
        evaluator.graph.clear_edges(self.node);

        let _span = tracing::trace_span!("evaluate", %request).entered();

        if let Some(stats) = &mut evaluator.stats {
            stats.request_evaluated(request);
        }

        let Some(function) = dispatch::lookup(request.tag()) else {
            panic!(
                "reqeval: no evaluation function registered for `{}` ({})",
                request.type_name(),
                request.tag(),
            );
        };

        let result = function(request, evaluator);

        #[cfg(feature = "testing")]
        crate::testing::register(crate::testing::Outcome::Miss);

        result
    }
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        let popped = self.evaluator.active.pop();
        assert_eq!(popped, Some(self.node), "reqeval: unbalanced active request stack");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchEntry, register_zone};
    use crate::request::CacheKind;
    use crate::tag::Zone;

    /// Counts down to zero, checking the active stack on the way.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Depth(u32);

    crate::type_ids! {
        zone Zone(105);
        0 => Depth,
    }

    impl Request for Depth {
        type Output = usize;
        const CACHE_KIND: CacheKind = CacheKind::Cached;

        fn compute(&self, evaluator: &mut Evaluator) -> Result<usize, EvaluationError> {
            let active = evaluator.active_requests();
            assert_eq!(active.last().and_then(|request| request.get_as::<Depth>()), Some(self));
            if self.0 == 0 {
                return Ok(active.len());
            }
            evaluator.evaluate(Depth(self.0 - 1))
        }
    }

    fn setup() {
        static REGISTER: std::sync::Once = std::sync::Once::new();
        REGISTER.call_once(|| {
            register_zone(Zone(105), [DispatchEntry::of::<Depth>()]).unwrap();
        });
    }

    #[test]
    fn test_stack_is_balanced() {
        setup();
        let mut evaluator = Evaluator::new();
        assert_eq!(evaluator.evaluate(Depth(3)).unwrap(), 4);
        assert!(evaluator.active_requests().is_empty());
        assert_eq!(evaluator.graph_len(), 4);
        assert_eq!(evaluator.cache_len(), 4);
        assert_eq!(
            evaluator.dependencies_of(&Depth(1)),
            Some(vec![AnyRequest::new(Depth(0))]),
        );
    }

    #[test]
    fn test_reset_forgets_everything() {
        setup();
        let mut evaluator = Evaluator::new();
        evaluator.evaluate(Depth(0)).unwrap();
        assert!(evaluator.is_cached_internally(&Depth(0)));
        evaluator.reset();
        assert_eq!(evaluator.cache_len(), 0);
        assert_eq!(evaluator.graph_len(), 0);
        assert_eq!(evaluator.dependencies_of(&Depth(0)), None);
    }

    #[test]
    fn test_unknown_request_prints_placeholder() {
        let evaluator = Evaluator::new();
        assert_eq!(
            evaluator.dump_dependencies(&Depth(3)),
            "`-- Depth(3) (dependency not evaluated)\n",
        );
    }
}

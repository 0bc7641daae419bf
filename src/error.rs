use std::error::Error;
use std::fmt::Write;

use thiserror::Error;

use crate::request::{AnyRequest, Request};
use crate::tag::Zone;

/// A failed evaluation.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The request depends on its own result. Produced by the evaluator.
    #[error(transparent)]
    Cycle(#[from] CyclicDependency),
    /// Produced by a request's evaluation function. The evaluator passes it
    /// through untouched.
    #[error(transparent)]
    Domain(Box<dyn Error + Send + Sync + 'static>),
}

impl EvaluationError {
    /// Wrap a failure of an evaluation function.
    pub fn domain(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self::Domain(error.into())
    }

    /// Whether this is a cyclic dependency.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle(_))
    }

    /// The cycle, if this is one.
    pub fn as_cycle(&self) -> Option<&CyclicDependency> {
        match self {
            Self::Cycle(cycle) => Some(cycle),
            Self::Domain(_) => None,
        }
    }
}

/// A request that transitively depends on its own result.
#[derive(Debug, Clone, Error)]
#[error("cyclic dependency: {}", render(.request, .path))]
pub struct CyclicDependency {
    request: AnyRequest,
    path: Vec<AnyRequest>,
}

impl CyclicDependency {
    pub(crate) fn new(request: AnyRequest, path: Vec<AnyRequest>) -> Self {
        Self { request, path }
    }

    /// The request that was reached a second time.
    pub fn request(&self) -> &AnyRequest {
        &self.request
    }

    /// The active requests from the first occurrence of the repeated request
    /// up to the one that asked for it again.
    pub fn path(&self) -> &[AnyRequest] {
        &self.path
    }

    /// The repeated request as an `R` if it is one.
    pub fn request_as<R: Request>(&self) -> Option<&R> {
        self.request.get_as()
    }
}

fn render(request: &AnyRequest, path: &[AnyRequest]) -> String {
    let mut out = String::new();
    for step in path {
        let _ = write!(out, "{step} -> ");
    }
    let _ = write!(out, "{request}");
    out
}

/// A rejected registration of request functions.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum RegistryError {
    /// The zone's functions were registered before.
    #[error("zone {0} already has request functions")]
    ZoneAlreadyRegistered(Zone),
    /// An entry's tag lies in a different zone.
    #[error("`{name}` belongs to zone {found}, not to zone {expected}")]
    ForeignZone { name: String, expected: Zone, found: Zone },
    /// An entry's tag belongs to an instantiated wrapper type.
    #[error("`{0}` has a wrapper tag and cannot be dispatched")]
    TemplateTag(String),
    /// Two entries share a local id.
    #[error("local id {local} appears twice in zone {zone}")]
    DuplicateLocalId { zone: Zone, local: u8 },
}

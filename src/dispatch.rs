use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{EvaluationError, RegistryError};
use crate::evaluator::Evaluator;
use crate::request::{AnyRequest, Request};
use crate::tag::{TypeTag, Zone};
use crate::value::AnyValue;

/// The uniform signature all evaluation functions are erased to.
pub(crate) type ErasedFn =
    dyn Fn(&AnyRequest, &mut Evaluator) -> Result<AnyValue, EvaluationError> + Send + Sync;

/// The functions of one zone, indexed by local id.
type ZoneTable = Vec<Option<Arc<ErasedFn>>>;

/// The global function tables, indexed by zone.
///
/// Each zone is written once and only read afterwards.
static TABLES: RwLock<Vec<Option<ZoneTable>>> = RwLock::new(Vec::new());

/// An evaluation function for one request type.
pub struct DispatchEntry {
    tag: TypeTag,
    name: Cow<'static, str>,
    function: Arc<ErasedFn>,
}

impl DispatchEntry {
    /// Dispatch to [`Request::compute`].
    pub fn of<R: Request>() -> Self {
        Self::with::<R>(R::compute)
    }

    /// Dispatch to a custom, statically typed function.
    pub fn with<R: Request>(
        function: impl Fn(&R, &mut Evaluator) -> Result<R::Output, EvaluationError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        let function: Arc<ErasedFn> =
            Arc::new(move |request: &AnyRequest, evaluator: &mut Evaluator| {
                function(request.cast_to::<R>(), evaluator).map(AnyValue::new)
            });
        Self { tag: R::TAG, name: R::type_name(), function }
    }

    /// The tag of the request type this entry evaluates.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// The name of the request type this entry evaluates.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Register the evaluation functions of all request types in a zone.
///
/// A zone can be registered only once per process, and must be registered
/// before any of its requests is evaluated. Nothing is registered if an error
/// is returned.
pub fn register_zone(
    zone: Zone,
    entries: impl IntoIterator<Item = DispatchEntry>,
) -> Result<(), RegistryError> {
    let mut table = ZoneTable::new();
    for entry in entries {
        if entry.tag.is_template() {
            return Err(RegistryError::TemplateTag(entry.name.into_owned()));
        }

        if entry.tag.zone() != zone {
            return Err(RegistryError::ForeignZone {
                name: entry.name.into_owned(),
                expected: zone,
                found: entry.tag.zone(),
            });
        }

        let local = entry.tag.local() as usize;
        if table.len() <= local {
            table.resize_with(local + 1, || None);
        }

        if table[local].is_some() {
            return Err(RegistryError::DuplicateLocalId { zone, local: entry.tag.local() });
        }

        table[local] = Some(entry.function);
    }

    let mut tables = TABLES.write();
    let index = zone.0 as usize;
    if tables.len() <= index {
        tables.resize_with(index + 1, || None);
    }

    if tables[index].is_some() {
        return Err(RegistryError::ZoneAlreadyRegistered(zone));
    }

    let count = table.iter().flatten().count();
    tables[index] = Some(table);
    tracing::debug!(zone = zone.0, count, "registered request functions");

    Ok(())
}

/// Whether the zone's functions have been registered.
pub fn is_registered(zone: Zone) -> bool {
    TABLES.read().get(zone.0 as usize).is_some_and(Option::is_some)
}

/// Find the evaluation function for a request type.
///
/// The function is cloned out of the table so that the lock is not held while
/// it runs.
pub(crate) fn lookup(tag: TypeTag) -> Option<Arc<ErasedFn>> {
    if tag.is_template() {
        return None;
    }

    let tables = TABLES.read();
    tables.get(tag.zone().0 as usize)?.as_ref()?.get(tag.local() as usize)?.clone()
}

use rustc_hash::FxHashMap;

use crate::graph::NodeId;
use crate::value::AnyValue;

/// The evaluator's internal cache.
///
/// Keyed by canonical request, so each logically distinct request has at most
/// one entry.
#[derive(Default)]
pub(crate) struct Cache {
    map: FxHashMap<NodeId, CacheEntry>,
}

/// A memoized result.
struct CacheEntry {
    /// The request's result.
    value: AnyValue,
    /// How many evictions have passed since the entry has last been used.
    age: usize,
}

impl Cache {
    /// Look up a result and mark it as used.
    pub fn lookup(&mut self, node: NodeId) -> Option<&AnyValue> {
        let entry = self.map.get_mut(&node)?;
        entry.age = 0;
        Some(&entry.value)
    }

    /// Look up a result without marking it as used.
    pub fn get(&self, node: NodeId) -> Option<&AnyValue> {
        self.map.get(&node).map(|entry| &entry.value)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.map.contains_key(&node)
    }

    /// Insert a freshly computed result.
    pub fn insert(&mut self, node: NodeId, value: AnyValue) {
        self.map.insert(node, CacheEntry { value, age: 0 });
    }

    /// Remove all entries whose age exceeds `max_age` after aging every entry
    /// by one.
    pub fn evict(&mut self, max_age: usize) {
        self.map.retain(|_, entry| {
            entry.age += 1;
            entry.age <= max_age
        });
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

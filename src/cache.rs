use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Memoization of the last successful remote lookup per input tuple.
///
/// Entries are dropped only by explicit invalidation (an upstream filter
/// change), never by time. The key space is bounded by the course, semester,
/// specialization and section combinations, so there is no eviction policy.
/// In-flight requests are not coalesced: two identical lookups issued before
/// the first resolves will both hit the network.
#[derive(Debug, Clone, Default)]
pub struct LookupCache<K, V> {
    map: HashMap<K, V>,
}

impl<K: Eq + Hash, V> LookupCache<K, V> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn set(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }

    pub fn retain<F: FnMut(&K, &V) -> bool>(&mut self, mut keep: F) {
        self.map.retain(|k, v| keep(k, v));
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.map.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterKey {
    pub course: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecializationKey {
    pub course: String,
    pub semester: u32,
}

/// Section is part of the key even though some backends ignore it for the
/// subject list; caching on the wider tuple only costs a few extra entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectKey {
    pub course: String,
    pub semester: u32,
    pub specialization: Option<String>,
    pub section: Option<String>,
}

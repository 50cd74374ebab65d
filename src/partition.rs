//! Grouping of mapped values by partition key.
//!
//! Values are appended in emission order and never reordered within a key.
//! Keys are kept in first-emission order, which only makes iteration
//! reproducible; reducers must not rely on it.

use indexmap::IndexMap;

use crate::types::PartitionKey;

/// All values sharing one key, in emission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition<V> {
    /// Partition key.
    pub key: PartitionKey,
    /// Values in emission order.
    pub values: Vec<V>,
}

/// Ordered multimap filled by the map stage and drained by the reduce stage.
#[derive(Clone, Debug)]
pub struct PartitionStore<V> {
    partitions: IndexMap<PartitionKey, Vec<V>>,
    value_count: usize,
}

impl<V> Default for PartitionStore<V> {
    fn default() -> Self {
        Self {
            partitions: IndexMap::new(),
            value_count: 0,
        }
    }
}

impl<V> PartitionStore<V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` to the partition for `key`.
    pub fn emit(&mut self, key: impl Into<PartitionKey>, value: V) {
        self.partitions.entry(key.into()).or_default().push(value);
        self.value_count += 1;
    }

    /// Values emitted for `key`, in emission order.
    pub fn get(&self, key: &str) -> Option<&[V]> {
        self.partitions.get(key).map(Vec::as_slice)
    }

    /// Distinct keys, in first-emission order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Returns `true` when nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Total number of emitted values across all keys.
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Consume the store into one `Partition` per key.
    pub fn into_partitions(self) -> Vec<Partition<V>> {
        self.partitions
            .into_iter()
            .map(|(key, values)| Partition { key, values })
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for PartitionStore<V>
where
    K: Into<PartitionKey>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = Self::new();
        for (key, value) in iter {
            store.emit(key, value);
        }
        store
    }
}

//! In-memory key-value store for testing.

use crate::backend::KvStore;
use crate::error::StorageResult;
use kvbind_codec::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory key-value store.
///
/// This store keeps all entries in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral state that doesn't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use kvbind_storage::{KvStore, InMemoryStore, Value};
///
/// let store = InMemoryStore::new();
/// store.write("count", Value::Integer(1)).unwrap();
/// assert!(store.has("count").unwrap());
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing entries.
    ///
    /// Useful for testing how bindings recover legacy data.
    #[must_use]
    pub fn with_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    /// Returns a copy of all entries.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries.read().clone()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KvStore for InMemoryStore {
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn read(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> StorageResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn erase_all(&self) -> StorageResult<()> {
        self.entries.write().clear();
        Ok(())
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert!(store.list_keys().unwrap().is_empty());
    }

    #[test]
    fn memory_write_then_read() {
        let store = InMemoryStore::new();
        store.write("a", Value::Integer(1)).unwrap();
        assert_eq!(store.read("a").unwrap(), Some(Value::Integer(1)));
        assert!(store.has("a").unwrap());
    }

    #[test]
    fn memory_overwrite_replaces() {
        let store = InMemoryStore::new();
        store.write("a", Value::Integer(1)).unwrap();
        store.write("a", Value::from("two")).unwrap();
        assert_eq!(store.read("a").unwrap(), Some(Value::from("two")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_read_missing_is_none() {
        let store = InMemoryStore::new();
        assert_eq!(store.read("missing").unwrap(), None);
        assert!(!store.has("missing").unwrap());
    }

    #[test]
    fn memory_remove() {
        let store = InMemoryStore::new();
        store.write("a", Value::Null).unwrap();
        store.remove("a").unwrap();
        store.remove("never-existed").unwrap();
        assert!(!store.has("a").unwrap());
    }

    #[test]
    fn memory_erase_all() {
        let store = InMemoryStore::with_entries([("a", Value::Integer(1)), ("b", Value::Integer(2))]);
        assert_eq!(store.len(), 2);
        store.erase_all().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn memory_keys_are_sorted() {
        let store = InMemoryStore::new();
        store.write("b", Value::Null).unwrap();
        store.write("a", Value::Null).unwrap();
        assert_eq!(store.list_keys().unwrap(), vec!["a", "b"]);
    }
}

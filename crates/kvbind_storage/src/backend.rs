//! Key-value store trait definition.

use crate::error::StorageResult;
use kvbind_codec::Value;

/// A key-value store that kvbind persists bindings into.
///
/// Every key is an independent namespace; the store holds one
/// [`Value`] per key and returns exactly what was written.
///
/// # Invariants
///
/// - `read` after `write` returns the written value
/// - `read` after `remove` returns `None`
/// - `list_keys` reflects all writes and removals made so far
/// - Implementations must be `Send + Sync`; one store instance is
///   shared by every binding of a context
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait KvStore: Send + Sync {
    /// Returns true if `key` has an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.read(key)?.is_some())
    }

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn read(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn write(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Removes the entry for `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be persisted.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be persisted.
    fn erase_all(&self) -> StorageResult<()>;

    /// Lists all keys, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn list_keys(&self) -> StorageResult<Vec<String>>;
}

impl<S: KvStore + ?Sized> KvStore for std::sync::Arc<S> {
    fn has(&self, key: &str) -> StorageResult<bool> {
        (**self).has(key)
    }

    fn read(&self, key: &str) -> StorageResult<Option<Value>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: Value) -> StorageResult<()> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn erase_all(&self) -> StorageResult<()> {
        (**self).erase_all()
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        (**self).list_keys()
    }
}

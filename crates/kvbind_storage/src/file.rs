//! File-based key-value store for persistent storage.

use crate::backend::KvStore;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use kvbind_codec::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A file-based key-value store.
///
/// All entries live in a single JSON document. Reads are served from memory;
/// every mutation rewrites the document to a temporary sibling file and
/// renames it over the original, so a crash never leaves a half-written
/// document behind.
///
/// # Locking
///
/// An advisory lock on `<path>.lock` is held for the lifetime of the store.
/// A second `FileStore` on the same path fails with [`StorageError::Locked`].
///
/// # Example
///
/// ```no_run
/// use kvbind_storage::{FileStore, KvStore, Value};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("state.json")).unwrap();
/// store.write("theme", Value::from("dark")).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, Value>>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process holds the lock (`Locked`)
    /// - The existing document is not a JSON object (`Corrupted`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> StorageResult<Self> {
        let lock_path = Self::sibling(path, "lock");
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StorageError::Locked)?;

        let entries = match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| StorageError::Corrupted(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
            _lock_file: lock_file,
        })
    }

    /// Opens or creates a store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the store cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(path: &Path, extension: &str) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    }

    /// Writes the whole document through a temp file and an atomic rename.
    fn persist(&self, entries: &BTreeMap<String, Value>) -> StorageResult<()> {
        let temp_path = Self::sibling(&self.path, "tmp");
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| StorageError::Corrupted(e.to_string()))?;

        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, Value>)) -> StorageResult<()> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        f(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn read(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> StorageResult<()> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        if !self.entries.read().contains_key(key) {
            return Ok(());
        }
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn erase_all(&self) -> StorageResult<()> {
        self.mutate(BTreeMap::clear)
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        assert!(store.list_keys().unwrap().is_empty());
        assert_eq!(store.path(), path);
    }

    #[test]
    fn file_write_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.write("a", Value::Integer(1)).unwrap();
        assert_eq!(store.read("a").unwrap(), Some(Value::Integer(1)));
        assert!(path.exists());
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = FileStore::open(&path).unwrap();
            store
                .write("todos", Value::map([("data", Value::from(vec!["x", "y"]))]))
                .unwrap();
        }

        {
            let store = FileStore::open(&path).unwrap();
            let stored = store.read("todos").unwrap().unwrap();
            assert_eq!(stored.get("data"), Some(&Value::from(vec!["x", "y"])));
        }
    }

    #[test]
    fn file_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let _first = FileStore::open(&path).unwrap();
        let second = FileStore::open(&path);
        assert!(matches!(second, Err(StorageError::Locked)));
    }

    #[test]
    fn file_corrupted_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "[1, 2").unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }

    #[test]
    fn file_remove_and_erase() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.write("a", Value::Integer(1)).unwrap();
        store.write("b", Value::Integer(2)).unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.list_keys().unwrap(), vec!["b"]);

        store.erase_all().unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.list_keys().unwrap().is_empty());
    }

    #[test]
    fn file_create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("path").join("state.json");

        let store = FileStore::open_with_create_dirs(&path).unwrap();
        store.write("k", Value::Bool(true)).unwrap();
        assert!(path.exists());
    }
}

//! Instrumented stores.

use kvbind_codec::Value;
use kvbind_storage::{InMemoryStore, KvStore, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Operation counts observed by a [`CountingStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCounts {
    /// Calls to `read` (and `has`).
    pub reads: u64,
    /// Calls to `write`.
    pub writes: u64,
    /// Calls to `remove`.
    pub removes: u64,
    /// Calls to `erase_all`.
    pub erases: u64,
}

/// Wraps a store and counts every operation passed through.
#[derive(Debug, Default)]
pub struct CountingStore<S = InMemoryStore> {
    inner: S,
    reads: AtomicU64,
    writes: AtomicU64,
    removes: AtomicU64,
    erases: AtomicU64,
}

impl CountingStore<InMemoryStore> {
    /// A counting in-memory store.
    pub fn new() -> Self {
        Self::wrap(InMemoryStore::new())
    }
}

impl<S: KvStore> CountingStore<S> {
    /// Wraps `inner`.
    pub fn wrap(inner: S) -> Self {
        Self {
            inner,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            removes: AtomicU64::new(0),
            erases: AtomicU64::new(0),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Counts so far.
    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            reads: self.reads.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
            removes: self.removes.load(Ordering::SeqCst),
            erases: self.erases.load(Ordering::SeqCst),
        }
    }

    /// Writes so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Zeroes all counters.
    pub fn reset(&self) {
        for counter in [&self.reads, &self.writes, &self.removes, &self.erases] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

impl<S: KvStore> KvStore for CountingStore<S> {
    fn has(&self, key: &str) -> StorageResult<bool> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.has(key)
    }

    fn read(&self, key: &str) -> StorageResult<Option<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: Value) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(key)
    }

    fn erase_all(&self) -> StorageResult<()> {
        self.erases.fetch_add(1, Ordering::SeqCst);
        self.inner.erase_all()
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.inner.list_keys()
    }
}

/// An in-memory store whose reads or writes can be made to fail.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: InMemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingStore {
    /// A store that does not fail until told to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes reads fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes writes, removals and erases fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The backing store, bypassing failure injection.
    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    fn check(flag: &AtomicBool, what: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other(format!(
                "injected {what} failure"
            ))));
        }
        Ok(())
    }
}

impl KvStore for FailingStore {
    fn read(&self, key: &str) -> StorageResult<Option<Value>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: Value) -> StorageResult<()> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.write(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        Self::check(&self.fail_writes, "remove")?;
        self.inner.remove(key)
    }

    fn erase_all(&self) -> StorageResult<()> {
        Self::check(&self.fail_writes, "erase")?;
        self.inner.erase_all()
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        Self::check(&self.fail_reads, "list")?;
        self.inner.list_keys()
    }
}

//! Test fixtures and context helpers.
//!
//! Every fixture runs on a [`ManualClock`] so expiration can be tested by
//! advancing time instead of sleeping.

use crate::stores::CountingStore;
use kvbind_core::{ManualClock, SyncConfig, SyncContext, SyncResult};
use kvbind_storage::{FileStore, KvStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Start time of every fixture clock, in epoch milliseconds.
pub const FIXTURE_EPOCH_MILLIS: i64 = 1_700_000_000_000;

/// A sync context over an instrumented store, with automatic cleanup.
pub struct TestContext {
    /// The context under test.
    pub ctx: SyncContext,
    /// The store, counting every operation the context makes.
    pub store: Arc<CountingStore<Arc<dyn KvStore>>>,
    /// The context's clock.
    pub clock: Arc<ManualClock>,
    _temp_dir: Option<TempDir>,
}

impl TestContext {
    /// A context over a fresh in-memory store.
    pub fn memory() -> Self {
        Self::memory_with_config(SyncConfig::new())
    }

    /// A context over a fresh in-memory store with `config`.
    pub fn memory_with_config(config: SyncConfig) -> Self {
        Self::over(Arc::new(kvbind_storage::InMemoryStore::new()), config, None)
    }

    /// A context over an existing store.
    pub fn over_store(store: Arc<dyn KvStore>, config: SyncConfig) -> Self {
        Self::over(store, config, None)
    }

    /// A context over a [`FileStore`] in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store.json");
        let store = FileStore::open(&path).expect("Failed to open file store");
        Self::over(Arc::new(store), SyncConfig::new(), Some(temp_dir))
    }

    fn over(store: Arc<dyn KvStore>, config: SyncConfig, temp_dir: Option<TempDir>) -> Self {
        let clock = Arc::new(ManualClock::new(FIXTURE_EPOCH_MILLIS));
        let store = Arc::new(CountingStore::wrap(store));
        let ctx = SyncContext::with_clock(config, clock.clone()).expect("Failed to create context");
        ctx.initialize(store.clone()).expect("Failed to attach store");
        Self {
            ctx,
            store,
            clock,
            _temp_dir: temp_dir,
        }
    }

    /// Path of the backing file, if file-based.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("store.json"))
    }

    /// Writes made to the store so far.
    pub fn writes(&self) -> u64 {
        self.store.writes()
    }
}

impl std::ops::Deref for TestContext {
    type Target = SyncContext;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

/// Runs a test with a context over a fresh in-memory store.
///
/// Panics if the closure returns an error.
///
/// # Example
///
/// ```rust,ignore
/// use kvbind_testkit::with_context;
///
/// #[test]
/// fn my_test() {
///     with_context(|ctx| {
///         ctx.set_value("k", Value::Integer(1))?;
///         Ok(())
///     });
/// }
/// ```
pub fn with_context<F, R>(f: F) -> R
where
    F: FnOnce(&SyncContext) -> SyncResult<R>,
{
    let test_ctx = TestContext::memory();
    f(&test_ctx.ctx).expect("test closure failed")
}

/// Runs a test with a context over a temporary file store.
pub fn with_file_context<F, R>(f: F) -> R
where
    F: FnOnce(&SyncContext, &std::path::Path) -> SyncResult<R>,
{
    let test_ctx = TestContext::file();
    let path = test_ctx.path().expect("file fixture has a path");
    f(&test_ctx.ctx, &path).expect("test closure failed")
}

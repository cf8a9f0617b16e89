//! The sync context.

use crate::binding::engine;
use crate::binding::{BindOptions, BindingState, LoadOutcome};
use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeListener};
use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::crypto::{cipher_for, PayloadCipher};
use crate::error::{SyncError, SyncResult};
use crate::gateway::RawStore;
use crate::locks::LockRegistry;
use crate::observable::Reactive;
use crate::stats::{StatsSnapshot, SyncStats};
use crate::subscription::Subscription;
use kvbind_codec::{Codec, Value};
use kvbind_storage::KvStore;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An active binding's bookkeeping.
pub(crate) struct BindingRecord {
    pub(crate) id: u64,
    pub(crate) state: BindingState,
    pub(crate) subscriptions: Vec<Subscription>,
}

pub(crate) struct ContextInner {
    pub(crate) config: SyncConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) stats: Arc<SyncStats>,
    pub(crate) feed: Arc<ChangeFeed>,
    pub(crate) locks: Arc<LockRegistry>,
    cipher: Option<Arc<dyn PayloadCipher>>,
    gateway: RwLock<Option<Arc<RawStore>>>,
    bindings: Mutex<HashMap<String, BindingRecord>>,
    next_binding: AtomicU64,
    /// Keys whose own write-through is in flight.
    propagating: Mutex<HashSet<String>>,
}

impl ContextInner {
    pub(crate) fn gateway(&self) -> SyncResult<Arc<RawStore>> {
        self.gateway.read().clone().ok_or(SyncError::NotInitialized)
    }

    pub(crate) fn next_binding_id(&self) -> u64 {
        self.next_binding.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn insert_binding(&self, key: &str, record: BindingRecord) {
        let previous = self.bindings.lock().insert(key.to_string(), record);
        drop(previous);
    }

    pub(crate) fn set_binding_state(&self, key: &str, id: u64, state: BindingState) {
        if let Some(record) = self.bindings.lock().get_mut(key) {
            if record.id == id {
                record.state = state;
            }
        }
    }

    /// Removes the binding for `key`, cancelling its subscriptions.
    pub(crate) fn unbind(&self, key: &str) -> bool {
        let removed = self.bindings.lock().remove(key);
        match removed {
            Some(record) => {
                debug!(key = %key, subscriptions = record.subscriptions.len(), "binding torn down");
                drop(record);
                self.locks.forget(key);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_propagating(&self, key: &str) -> bool {
        self.propagating.lock().contains(key)
    }

    pub(crate) fn mark_propagating<'a>(&'a self, key: &str) -> PropagatingGuard<'a> {
        let inserted = self.propagating.lock().insert(key.to_string());
        PropagatingGuard {
            inner: self,
            key: key.to_string(),
            inserted,
        }
    }
}

/// Marks a key as the origin of the store write in progress.
pub(crate) struct PropagatingGuard<'a> {
    inner: &'a ContextInner,
    key: String,
    inserted: bool,
}

impl Drop for PropagatingGuard<'_> {
    fn drop(&mut self) {
        if self.inserted {
            self.inner.propagating.lock().remove(&self.key);
        }
    }
}

/// Owns everything a set of bindings shares: the store, the lock registry,
/// the change feed and the statistics.
///
/// A context is cheap to clone; clones share state. Bindings live until they
/// are unbound, the context is closed, or the last clone is dropped.
///
/// # Example
///
/// ```rust
/// use kvbind_core::{BindOptions, Codec, Observable, SyncConfig, SyncContext};
/// use kvbind_storage::InMemoryStore;
/// use std::sync::Arc;
///
/// let ctx = SyncContext::open(Arc::new(InMemoryStore::new()), SyncConfig::new()).unwrap();
/// let counter = Observable::new(0i64);
/// ctx.bind(
///     "counter",
///     &counter,
///     Codec::storable(),
///     BindOptions::new().default_value(0),
/// )
/// .unwrap();
///
/// counter.set(5);
/// assert_eq!(ctx.get("counter", &Codec::<i64>::storable()).unwrap(), Some(5));
/// ```
#[derive(Clone)]
pub struct SyncContext {
    inner: Arc<ContextInner>,
}

impl SyncContext {
    /// Creates a context with no store attached.
    ///
    /// Every store operation returns [`SyncError::NotInitialized`] until
    /// [`initialize`](Self::initialize) is called.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::EncryptionNotEnabled`] if the config carries an
    /// encryption key but the `encryption` feature is off.
    pub fn new(config: SyncConfig) -> SyncResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a context reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_clock(config: SyncConfig, clock: Arc<dyn Clock>) -> SyncResult<Self> {
        let cipher = cipher_for(&config)?.map(Arc::<dyn PayloadCipher>::from);
        let stats = Arc::new(SyncStats::new());
        let feed = Arc::new(ChangeFeed::new(Arc::clone(&stats)));

        Ok(Self {
            inner: Arc::new(ContextInner {
                config,
                clock,
                stats,
                feed,
                locks: Arc::new(LockRegistry::new()),
                cipher,
                gateway: RwLock::new(None),
                bindings: Mutex::new(HashMap::new()),
                next_binding: AtomicU64::new(1),
                propagating: Mutex::new(HashSet::new()),
            }),
        })
    }

    /// Creates a context and attaches `store`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn open(store: Arc<dyn KvStore>, config: SyncConfig) -> SyncResult<Self> {
        let ctx = Self::new(config)?;
        ctx.initialize(store)?;
        Ok(ctx)
    }

    /// Attaches the store. A closed context can be initialized again.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidOperation`] if a store is already attached.
    pub fn initialize(&self, store: Arc<dyn KvStore>) -> SyncResult<()> {
        let mut gateway = self.inner.gateway.write();
        if gateway.is_some() {
            return Err(SyncError::invalid_operation("a store is already attached"));
        }
        *gateway = Some(Arc::new(RawStore::new(
            store,
            self.inner.cipher.clone(),
            Arc::clone(&self.inner.feed),
            Arc::clone(&self.inner.clock),
            Arc::clone(&self.inner.stats),
            self.inner.config.stamp_timestamps,
        )));
        info!(encrypted = self.inner.cipher.is_some(), "store attached");
        Ok(())
    }

    /// Returns true while a store is attached.
    pub fn is_initialized(&self) -> bool {
        self.inner.gateway.read().is_some()
    }

    /// Unbinds everything and detaches the store.
    ///
    /// Change listeners registered with [`on_change`](Self::on_change) stay
    /// registered, but nothing will be written until a store is attached again.
    pub fn close(&self) {
        let records: Vec<(String, BindingRecord)> = self.inner.bindings.lock().drain().collect();
        let count = records.len();
        drop(records);
        self.inner.locks.forget_idle();
        *self.inner.gateway.write() = None;
        info!(bindings = count, "context closed");
    }

    /// The configuration this context was created with.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Snapshot of the sync counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// The per-key update locks.
    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.inner.locks
    }

    pub(crate) fn inner(&self) -> &Arc<ContextInner> {
        &self.inner
    }

    // === Bindings ===

    /// Binds `observable` to `key`.
    ///
    /// Any previous binding for `key` is torn down first. The stored value is
    /// then loaded into the observable (or the default applied), and from
    /// then on every mutation of the observable is written through.
    ///
    /// Decode failures do not fail the bind: they are reported to the error
    /// hook and recovered with the default, if one was supplied.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails during the
    /// initial load. The binding is removed in that case.
    pub fn bind<T, R>(
        &self,
        key: &str,
        observable: &R,
        codec: Codec<T>,
        options: BindOptions<T>,
    ) -> SyncResult<LoadOutcome>
    where
        T: Clone + Send + Sync + 'static,
        R: Reactive<T> + Clone + 'static,
    {
        engine::bind(&self.inner, key, observable, codec, options)
    }

    /// Removes the binding for `key`. Returns false if there was none.
    pub fn unbind(&self, key: &str) -> bool {
        self.inner.unbind(key)
    }

    /// The binding state of `key`.
    pub fn binding_state(&self, key: &str) -> BindingState {
        self.inner
            .bindings
            .lock()
            .get(key)
            .map_or(BindingState::Unbound, |r| r.state)
    }

    /// Keys with an active binding, in ascending order.
    pub fn bound_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.bindings.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    // === Direct access ===

    /// Reads and decodes the value under `key`.
    ///
    /// A value that does not decode reads as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails.
    pub fn get<T>(&self, key: &str, codec: &Codec<T>) -> SyncResult<Option<T>> {
        let Some(raw) = self.inner.gateway()?.read(key)? else {
            return Ok(None);
        };
        match codec.decode(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.inner.stats.record_decode_failure();
                warn!(key = %key, error = %e, "stored value does not decode, treating as absent");
                Ok(None)
            }
        }
    }

    /// Reads `key`, falling back to `default` when absent or undecodable.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails.
    pub fn get_or<T>(&self, key: &str, codec: &Codec<T>, default: T) -> SyncResult<T> {
        Ok(self.get(key, codec)?.unwrap_or(default))
    }

    /// Reads the unwrapped stored value under `key` without decoding it.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails.
    pub fn get_value(&self, key: &str) -> SyncResult<Option<Value>> {
        self.inner.gateway()?.read(key)
    }

    /// Encodes and writes `value` under `key`.
    ///
    /// Bindings watching the store see this write.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached, encoding fails, or the store fails.
    pub fn set<T>(&self, key: &str, value: &T, codec: &Codec<T>) -> SyncResult<()> {
        let encoded = codec.encode(value).map_err(|e| SyncError::codec(key, e))?;
        self.set_value(key, encoded)
    }

    /// Writes an already encoded value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails.
    pub fn set_value(&self, key: &str, value: Value) -> SyncResult<()> {
        self.inner.gateway()?.write(key, value)
    }

    /// Returns true if a value is stored under `key`.
    ///
    /// Expiration is not consulted; an expired value counts until
    /// [`get_with_expiration`](Self::get_with_expiration) or
    /// [`purge_expired`](Self::purge_expired) evicts it.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails.
    pub fn has_key(&self, key: &str) -> SyncResult<bool> {
        self.inner.gateway()?.has(key)
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails.
    pub fn remove(&self, key: &str) -> SyncResult<()> {
        self.inner.gateway()?.remove(key)
    }

    /// Removes every stored entry. Bindings stay in place.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails.
    pub fn clear_all(&self) -> SyncResult<()> {
        self.inner.gateway()?.erase_all()
    }

    /// Every stored key, in store order.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails.
    pub fn keys(&self) -> SyncResult<Vec<String>> {
        self.inner.gateway()?.keys()
    }

    // === Notifications ===

    /// Calls `listener` after every accepted write or removal of `key`.
    pub fn on_change(
        &self,
        key: &str,
        listener: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let listener: ChangeListener = Arc::new(listener);
        self.inner.feed.subscribe(key, listener)
    }

    /// Number of change listeners registered for `key`.
    pub fn listener_count(&self, key: &str) -> usize {
        self.inner.feed.listener_count(key)
    }

    /// Runs `action` with change notifications suppressed.
    ///
    /// Afterwards, each key in `notify_keys` receives exactly one
    /// [`ChangeType::Batch`] event carrying its value from before the batch
    /// and its value after it. Listeners compare the two themselves.
    ///
    /// [`ChangeType::Batch`]: crate::ChangeType::Batch
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails while
    /// capturing the before or after values.
    pub fn without_notifications<R>(
        &self,
        notify_keys: &[&str],
        action: impl FnOnce(&SyncContext) -> R,
    ) -> SyncResult<R> {
        let gateway = self.inner.gateway()?;
        let before = notify_keys
            .iter()
            .map(|k| gateway.read(k))
            .collect::<SyncResult<Vec<_>>>()?;

        let result = {
            let _suppressed = self.inner.feed.suppress();
            action(self)
        };

        if self.inner.feed.is_suppressed() {
            return Ok(result);
        }
        for (key, old) in notify_keys.iter().zip(before) {
            let new = gateway.read(key)?;
            self.inner.feed.emit(&ChangeEvent::batch(*key, old, new));
        }
        Ok(result)
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("config", &self.inner.config)
            .field("initialized", &self.is_initialized())
            .field("bindings", &self.bound_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvbind_storage::InMemoryStore;

    fn open() -> SyncContext {
        SyncContext::open(Arc::new(InMemoryStore::new()), SyncConfig::new()).unwrap()
    }

    #[test]
    fn uninitialized_context_refuses_work() {
        let ctx = SyncContext::new(SyncConfig::new()).unwrap();
        assert!(!ctx.is_initialized());
        assert!(matches!(
            ctx.get_value("k"),
            Err(SyncError::NotInitialized)
        ));
        assert!(matches!(
            ctx.set_value("k", Value::Null),
            Err(SyncError::NotInitialized)
        ));
        assert!(matches!(ctx.keys(), Err(SyncError::NotInitialized)));
    }

    #[test]
    fn initialize_twice_is_rejected() {
        let ctx = open();
        let err = ctx.initialize(Arc::new(InMemoryStore::new())).unwrap_err();
        assert!(matches!(err, SyncError::InvalidOperation { .. }));
    }

    #[test]
    fn close_then_reinitialize() {
        let ctx = open();
        ctx.close();
        assert!(matches!(ctx.has_key("k"), Err(SyncError::NotInitialized)));
        ctx.initialize(Arc::new(InMemoryStore::new())).unwrap();
        assert!(!ctx.has_key("k").unwrap());
    }

    #[test]
    fn set_get_remove() {
        let ctx = open();
        let codec = Codec::<String>::storable();
        ctx.set("name", &"ada".to_string(), &codec).unwrap();
        assert_eq!(ctx.get("name", &codec).unwrap().as_deref(), Some("ada"));
        assert!(ctx.has_key("name").unwrap());

        ctx.remove("name").unwrap();
        assert_eq!(ctx.get("name", &codec).unwrap(), None);
        assert!(!ctx.has_key("name").unwrap());
    }

    #[test]
    fn type_mismatch_reads_as_none() {
        let ctx = open();
        ctx.set_value("n", Value::from("not a number")).unwrap();
        assert_eq!(ctx.get("n", &Codec::<i64>::storable()).unwrap(), None);
        assert_eq!(ctx.get_or("n", &Codec::<i64>::storable(), 9).unwrap(), 9);
        assert_eq!(ctx.stats().decode_failures, 2);
    }

    #[test]
    fn propagating_guard_only_clears_its_own_mark() {
        let ctx = open();
        let inner = ctx.inner();
        let outer = inner.mark_propagating("k");
        {
            let nested = inner.mark_propagating("k");
            drop(nested);
            assert!(inner.is_propagating("k"));
        }
        drop(outer);
        assert!(!inner.is_propagating("k"));
    }
}

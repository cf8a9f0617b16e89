//! Change feed for observing store mutations.
//!
//! The change feed delivers an event for every accepted write and removal
//! made through the gateway, to listeners registered per key. Listeners run
//! synchronously, in registration order, on the thread that made the change.
//!
//! # Usage
//!
//! ```rust,ignore
//! let sub = ctx.on_change("theme", |event| {
//!     println!("{} changed: {:?} -> {:?}", event.key, event.old_value, event.new_value);
//! });
//! ```
//!
//! Notifications can be suppressed for a batch of writes; see
//! [`SyncContext::without_notifications`](crate::SyncContext::without_notifications).

use crate::stats::SyncStats;
use crate::subscription::Subscription;
use kvbind_codec::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// A value was written.
    Write,
    /// A value was removed.
    Remove,
    /// A suppressed batch finished; carries the values from before and after it.
    Batch,
}

/// A single change event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// The key that changed.
    pub key: String,
    /// Type of change.
    pub change_type: ChangeType,
    /// Decoded value before the change, if any.
    pub old_value: Option<Value>,
    /// Decoded value after the change. None for removals.
    pub new_value: Option<Value>,
}

impl ChangeEvent {
    /// Creates a write event.
    pub fn write(key: impl Into<String>, old_value: Option<Value>, new_value: Value) -> Self {
        Self {
            key: key.into(),
            change_type: ChangeType::Write,
            old_value,
            new_value: Some(new_value),
        }
    }

    /// Creates a removal event.
    pub fn remove(key: impl Into<String>, old_value: Option<Value>) -> Self {
        Self {
            key: key.into(),
            change_type: ChangeType::Remove,
            old_value,
            new_value: None,
        }
    }

    /// Creates a synthesized end-of-batch event.
    pub fn batch(key: impl Into<String>, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            key: key.into(),
            change_type: ChangeType::Batch,
            old_value,
            new_value,
        }
    }
}

/// Listener invoked for each change event on its key.
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Per-key listener registry with a suppression switch.
///
/// - Multiple listeners per key, called in registration order
/// - Keys with no listeners left are dropped from the registry
/// - While any [`SuppressGuard`] is alive, [`emit`](Self::emit) delivers nothing
pub struct ChangeFeed {
    listeners: RwLock<HashMap<String, Vec<(u64, ChangeListener)>>>,
    suppressed: AtomicUsize,
    next_id: AtomicU64,
    stats: Arc<SyncStats>,
}

impl ChangeFeed {
    /// Creates an empty change feed reporting into `stats`.
    pub fn new(stats: Arc<SyncStats>) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            suppressed: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            stats,
        }
    }

    /// Registers a listener for `key`.
    pub fn subscribe(self: &Arc<Self>, key: &str, listener: ChangeListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .entry(key.to_string())
            .or_default()
            .push((id, listener));

        let weak: Weak<Self> = Arc::downgrade(self);
        let key = key.to_string();
        Subscription::new(move || {
            if let Some(feed) = weak.upgrade() {
                feed.unsubscribe(&key, id);
            }
        })
    }

    fn unsubscribe(&self, key: &str, id: u64) {
        let mut listeners = self.listeners.write();
        if let Some(list) = listeners.get_mut(key) {
            list.retain(|(lid, _)| *lid != id);
            if list.is_empty() {
                listeners.remove(key);
            }
        }
    }

    /// Returns true if anyone listens to `key`.
    pub fn has_listeners(&self, key: &str) -> bool {
        self.listeners.read().contains_key(key)
    }

    /// Number of listeners registered for `key`.
    pub fn listener_count(&self, key: &str) -> usize {
        self.listeners.read().get(key).map_or(0, Vec::len)
    }

    /// Number of keys with at least one listener.
    pub fn key_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns true while notifications are suppressed.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::SeqCst) > 0
    }

    /// Suppresses notifications until the returned guard is dropped.
    ///
    /// Guards nest; delivery resumes when the last one is dropped.
    pub fn suppress(self: &Arc<Self>) -> SuppressGuard {
        self.suppressed.fetch_add(1, Ordering::SeqCst);
        SuppressGuard {
            feed: Arc::clone(self),
        }
    }

    /// Returns true if an event for `key` would be delivered right now.
    pub fn would_deliver(&self, key: &str) -> bool {
        !self.is_suppressed() && self.has_listeners(key)
    }

    /// Delivers `event` to the listeners of its key.
    ///
    /// Returns the number of listeners called (zero while suppressed).
    pub fn emit(&self, event: &ChangeEvent) -> usize {
        if self.is_suppressed() {
            return 0;
        }

        // Snapshot so listeners may (un)subscribe while being called.
        let listeners: Vec<ChangeListener> = match self.listeners.read().get(&event.key) {
            Some(list) => list.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return 0,
        };

        for listener in &listeners {
            listener(event);
            self.stats.record_notification();
        }
        listeners.len()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("keys", &self.key_count())
            .field("suppressed", &self.is_suppressed())
            .finish()
    }
}

/// Keeps notifications suppressed while alive.
#[must_use = "notifications resume as soon as the guard is dropped"]
pub struct SuppressGuard {
    feed: Arc<ChangeFeed>,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        self.feed.suppressed.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn feed() -> Arc<ChangeFeed> {
        Arc::new(ChangeFeed::new(Arc::new(SyncStats::new())))
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> ChangeListener {
        let log = Arc::clone(log);
        Arc::new(move |e: &ChangeEvent| log.lock().push(format!("{tag}:{}", e.key)))
    }

    #[test]
    fn emit_in_registration_order() {
        let feed = feed();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = feed.subscribe("k", recorder(&log, "a"));
        let _b = feed.subscribe("k", recorder(&log, "b"));

        let delivered = feed.emit(&ChangeEvent::write("k", None, Value::Integer(1)));
        assert_eq!(delivered, 2);
        assert_eq!(*log.lock(), vec!["a:k", "b:k"]);
    }

    #[test]
    fn other_keys_are_not_notified() {
        let feed = feed();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = feed.subscribe("k", recorder(&log, "a"));

        assert_eq!(feed.emit(&ChangeEvent::remove("other", None)), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn empty_entries_are_removed() {
        let feed = feed();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = feed.subscribe("k", recorder(&log, "a"));
        let b = feed.subscribe("k", recorder(&log, "b"));
        assert_eq!(feed.listener_count("k"), 2);

        a.unsubscribe();
        assert_eq!(feed.listener_count("k"), 1);
        drop(b);
        assert!(!feed.has_listeners("k"));
        assert_eq!(feed.key_count(), 0);
    }

    #[test]
    fn suppression_nests() {
        let feed = feed();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = feed.subscribe("k", recorder(&log, "a"));

        let outer = feed.suppress();
        let inner = feed.suppress();
        assert_eq!(feed.emit(&ChangeEvent::remove("k", None)), 0);
        drop(inner);
        assert!(feed.is_suppressed());
        assert!(!feed.would_deliver("k"));
        drop(outer);
        assert!(feed.would_deliver("k"));

        assert_eq!(feed.emit(&ChangeEvent::remove("k", None)), 1);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let feed = feed();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let s = Arc::clone(&slot);
        let sub = feed.subscribe(
            "k",
            Arc::new(move |_: &ChangeEvent| {
                s.lock().take();
            }),
        );
        *slot.lock() = Some(sub);

        assert_eq!(feed.emit(&ChangeEvent::remove("k", None)), 1);
        assert!(!feed.has_listeners("k"));
    }
}

//! Per-key update locks.
//!
//! A key is locked while a sync cycle for it is in flight: an observable
//! mutation being written through, or a store change being pushed into an
//! observable. Anything that finds the key locked skips its own cycle,
//! which is what breaks the store → observable → store loop.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Instrumentation for one key's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockCounters {
    /// Times the lock was acquired.
    pub acquisitions: u64,
    /// Times the lock was released.
    pub releases: u64,
    /// Current number of holders (0 or 1).
    pub holders: u32,
    /// Highest number of simultaneous holders ever observed.
    pub max_holders: u32,
}

/// Registry of per-key update locks.
#[derive(Debug, Default)]
pub struct LockRegistry {
    keys: Mutex<HashMap<String, LockCounters>>,
}

impl LockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a cycle for `key` is in flight.
    pub fn is_locked(&self, key: &str) -> bool {
        self.keys.lock().get(key).is_some_and(|c| c.holders > 0)
    }

    /// Locks `key`, or returns `None` if it is already locked.
    ///
    /// The lock is released when the guard is dropped, including during unwinding.
    pub fn try_acquire(self: &Arc<Self>, key: &str) -> Option<LockGuard> {
        let mut keys = self.keys.lock();
        let counters = keys.entry(key.to_string()).or_default();
        if counters.holders > 0 {
            return None;
        }
        counters.holders += 1;
        counters.acquisitions += 1;
        counters.max_holders = counters.max_holders.max(counters.holders);

        Some(LockGuard {
            registry: Arc::clone(self),
            key: key.to_string(),
        })
    }

    /// Runs `action` with `key` locked.
    ///
    /// Returns `None` without running `action` if the key was already locked.
    pub fn with_lock<R>(self: &Arc<Self>, key: &str, action: impl FnOnce() -> R) -> Option<R> {
        let _guard = self.try_acquire(key)?;
        Some(action())
    }

    /// Instrumentation for `key`.
    pub fn counters(&self, key: &str) -> LockCounters {
        self.keys.lock().get(key).copied().unwrap_or_default()
    }

    /// Keys currently locked.
    pub fn locked_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keys
            .lock()
            .iter()
            .filter(|(_, c)| c.holders > 0)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drops the instrumentation for `key` unless it is currently locked.
    ///
    /// Returns true if an entry was dropped.
    pub fn forget(&self, key: &str) -> bool {
        let mut keys = self.keys.lock();
        if keys.get(key).is_some_and(|c| c.holders == 0) {
            keys.remove(key);
            return true;
        }
        false
    }

    /// Drops the instrumentation for every unlocked key.
    pub fn forget_idle(&self) -> usize {
        let mut keys = self.keys.lock();
        let before = keys.len();
        keys.retain(|_, c| c.holders > 0);
        before - keys.len()
    }

    /// Number of keys with instrumentation.
    pub fn tracked_keys(&self) -> usize {
        self.keys.lock().len()
    }

    fn release(&self, key: &str) {
        if let Some(counters) = self.keys.lock().get_mut(key) {
            counters.holders = counters.holders.saturating_sub(1);
            counters.releases += 1;
        }
    }
}

/// Holds a key's update lock.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard {
    registry: Arc<LockRegistry>,
    key: String,
}

impl LockGuard {
    /// The locked key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let locks = Arc::new(LockRegistry::new());
        let guard = locks.try_acquire("a").unwrap();
        assert_eq!(guard.key(), "a");
        assert!(locks.is_locked("a"));
        assert!(!locks.is_locked("b"));

        drop(guard);
        assert!(!locks.is_locked("a"));
        let c = locks.counters("a");
        assert_eq!((c.acquisitions, c.releases, c.holders), (1, 1, 0));
    }

    #[test]
    fn second_acquire_is_refused() {
        let locks = Arc::new(LockRegistry::new());
        let _guard = locks.try_acquire("a").unwrap();
        assert!(locks.try_acquire("a").is_none());
        assert!(locks.with_lock("a", || unreachable!()).is_none());
        assert_eq!(locks.counters("a").max_holders, 1);
    }

    #[test]
    fn keys_are_independent() {
        let locks = Arc::new(LockRegistry::new());
        let _a = locks.try_acquire("a").unwrap();
        let _b = locks.try_acquire("b").unwrap();
        assert_eq!(locks.locked_keys(), vec!["a", "b"]);
    }

    #[test]
    fn with_lock_releases_on_panic() {
        let locks = Arc::new(LockRegistry::new());
        let l = Arc::clone(&locks);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            l.with_lock("a", || panic!("boom"));
        }));
        assert!(result.is_err());
        assert!(!locks.is_locked("a"));
        assert_eq!(locks.counters("a").releases, 1);
    }

    #[test]
    fn with_lock_returns_value() {
        let locks = Arc::new(LockRegistry::new());
        assert_eq!(locks.with_lock("a", || 7), Some(7));
        assert!(!locks.is_locked("a"));
    }

    #[test]
    fn forget_keeps_held_entries() {
        let locks = Arc::new(LockRegistry::new());
        drop(locks.try_acquire("a").unwrap());
        let held = locks.try_acquire("b").unwrap();
        assert_eq!(locks.tracked_keys(), 2);

        assert!(locks.forget("a"));
        assert!(!locks.forget("b"));
        assert_eq!(locks.counters("a"), LockCounters::default());

        assert_eq!(locks.forget_idle(), 0);
        drop(held);
        assert_eq!(locks.counters("b").releases, 1);
        assert_eq!(locks.forget_idle(), 1);
        assert_eq!(locks.tracked_keys(), 0);
    }
}

//! Sync statistics.
//!
//! Counters describing what the engine did, readable at any time:
//!
//! ```rust,ignore
//! let ctx = SyncContext::open(store, SyncConfig::new())?;
//! // ... bind and mutate
//! let stats = ctx.stats();
//! println!("writes: {}, suppressed: {}", stats.writes, stats.suppressed_writes);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Live sync counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct SyncStats {
    /// Envelopes written to the store.
    writes: AtomicU64,
    /// Writes skipped because the stored value was already equal.
    suppressed_writes: AtomicU64,
    /// Observable mutations skipped because the key was locked.
    skipped_locked: AtomicU64,
    /// Values that failed to decode (whole values or collection items).
    decode_failures: AtomicU64,
    /// Default values applied on load.
    defaults_applied: AtomicU64,
    /// External store changes pushed into observables.
    external_updates: AtomicU64,
    /// Expired entries evicted.
    evictions: AtomicU64,
    /// Change notifications delivered to listeners.
    notifications: AtomicU64,
    /// Errors reported through error hooks or logs.
    errors: AtomicU64,
}

impl SyncStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed_write(&self) {
        self.suppressed_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped_locked(&self) {
        self.skipped_locked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_default_applied(&self) {
        self.defaults_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_external_update(&self) {
        self.external_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            writes: self.writes.load(Ordering::Relaxed),
            suppressed_writes: self.suppressed_writes.load(Ordering::Relaxed),
            skipped_locked: self.skipped_locked.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            defaults_applied: self.defaults_applied.load(Ordering::Relaxed),
            external_updates: self.external_updates.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`SyncStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Envelopes written to the store.
    pub writes: u64,
    /// Writes skipped because the stored value was already equal.
    pub suppressed_writes: u64,
    /// Observable mutations skipped because the key was locked.
    pub skipped_locked: u64,
    /// Values that failed to decode.
    pub decode_failures: u64,
    /// Default values applied on load.
    pub defaults_applied: u64,
    /// External store changes pushed into observables.
    pub external_updates: u64,
    /// Expired entries evicted.
    pub evictions: u64,
    /// Change notifications delivered to listeners.
    pub notifications: u64,
    /// Errors reported.
    pub errors: u64,
}

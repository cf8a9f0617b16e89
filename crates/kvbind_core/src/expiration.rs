//! Values with a time to live.
//!
//! The deadline for `key` lives in a sibling record named
//! `key + expiration_suffix` holding epoch milliseconds. Expiry is lazy:
//! nothing is removed until `get_with_expiration` or `purge_expired` finds an
//! expired value. Other reads treat the record as an ordinary key.
//! The check and the eviction are two store operations, so a writer racing
//! the eviction may have its fresh value removed.

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::gateway::RawStore;
use kvbind_codec::{Codec, Value};
use std::time::Duration;
use tracing::{debug, warn};

impl SyncContext {
    /// Writes `value` under `key` and records a deadline `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached, encoding fails, or the store fails.
    pub fn set_with_expiration<T>(
        &self,
        key: &str,
        value: &T,
        codec: &Codec<T>,
        ttl: Duration,
    ) -> SyncResult<()> {
        let gateway = self.inner().gateway()?;
        let encoded = codec.encode(value).map_err(|e| SyncError::codec(key, e))?;
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let deadline = self.inner().clock.now_millis().saturating_add(ttl_millis);

        gateway.write(key, encoded)?;
        gateway.write(
            &self.config().expiration_key(key),
            Value::Integer(deadline),
        )?;
        Ok(())
    }

    /// Reads `key`, or `None` once its deadline has passed.
    ///
    /// An expired value is evicted together with its expiration record.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails.
    pub fn get_with_expiration<T>(&self, key: &str, codec: &Codec<T>) -> SyncResult<Option<T>> {
        let gateway = self.inner().gateway()?;
        if self.evict_if_expired(&gateway, key)? {
            return Ok(None);
        }
        self.get(key, codec)
    }

    /// The deadline recorded for `key`, in epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails.
    pub fn expiration_of(&self, key: &str) -> SyncResult<Option<i64>> {
        let gateway = self.inner().gateway()?;
        self.read_deadline(&gateway, key)
    }

    /// Evicts every expired value. Returns how many were evicted.
    ///
    /// # Errors
    ///
    /// Returns an error if no store is attached or the store fails.
    pub fn purge_expired(&self) -> SyncResult<usize> {
        let gateway = self.inner().gateway()?;
        let suffix = &self.config().expiration_suffix;
        let mut evicted = 0;
        for record_key in gateway.keys()? {
            if !self.config().is_expiration_key(&record_key) {
                continue;
            }
            let Some(key) = record_key.strip_suffix(suffix.as_str()) else {
                continue;
            };
            if self.evict_if_expired(&gateway, key)? {
                evicted += 1;
            }
        }
        Ok(evicted)
    }

    /// Removes `key` and its record if the deadline has passed.
    pub(crate) fn evict_if_expired(&self, gateway: &RawStore, key: &str) -> SyncResult<bool> {
        let Some(deadline) = self.read_deadline(gateway, key)? else {
            return Ok(false);
        };
        if self.inner().clock.now_millis() <= deadline {
            return Ok(false);
        }

        gateway.remove(key)?;
        gateway.remove(&self.config().expiration_key(key))?;
        self.inner().stats.record_eviction();
        debug!(key = %key, deadline, "expired value evicted");
        Ok(true)
    }

    fn read_deadline(&self, gateway: &RawStore, key: &str) -> SyncResult<Option<i64>> {
        let record_key = self.config().expiration_key(key);
        match gateway.read(&record_key)? {
            None => Ok(None),
            Some(value) => match value.as_integer() {
                Some(deadline) => Ok(Some(deadline)),
                None => {
                    warn!(key = %key, found = value.kind(), "ignoring malformed expiration record");
                    Ok(None)
                }
            },
        }
    }
}

//! Raw store gateway.
//!
//! Sits between the binding engine and the [`KvStore`]:
//!
//! - wraps every written value in an [`Envelope`]
//! - encrypts the serialized envelope when a cipher is configured
//! - unwraps and decrypts on read, tolerating older encodings
//! - emits change events after every accepted mutation
//!
//! Reads never fail because of malformed stored data. A value that cannot be
//! decrypted or parsed is returned exactly as stored.

use crate::change_feed::{ChangeEvent, ChangeFeed};
use crate::clock::Clock;
use crate::crypto::{PayloadCipher, ENCRYPTED_MARKER};
use crate::envelope::Envelope;
use crate::error::{SyncError, SyncResult};
use crate::stats::SyncStats;
use kvbind_codec::{from_json_str, is_different_opt, to_json_string, Value};
use kvbind_storage::KvStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Envelope-aware access to the underlying store.
pub struct RawStore {
    store: Arc<dyn KvStore>,
    cipher: Option<Arc<dyn PayloadCipher>>,
    feed: Arc<ChangeFeed>,
    clock: Arc<dyn Clock>,
    stats: Arc<SyncStats>,
    stamp_timestamps: bool,
}

/// What [`RawStore::write_if_changed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was written.
    Written,
    /// The stored value was already equal; nothing was written.
    Unchanged,
}

impl RawStore {
    pub(crate) fn new(
        store: Arc<dyn KvStore>,
        cipher: Option<Arc<dyn PayloadCipher>>,
        feed: Arc<ChangeFeed>,
        clock: Arc<dyn Clock>,
        stats: Arc<SyncStats>,
        stamp_timestamps: bool,
    ) -> Self {
        Self {
            store,
            cipher,
            feed,
            clock,
            stats,
            stamp_timestamps,
        }
    }

    /// The wrapped store.
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Returns true if payloads are encrypted on write.
    pub fn encrypts(&self) -> bool {
        self.cipher.is_some()
    }

    /// Reads and unwraps the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    pub fn read(&self, key: &str) -> SyncResult<Option<Value>> {
        Ok(self.store.read(key)?.map(|raw| self.decode_raw(key, raw)))
    }

    /// Returns true if `key` has an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn has(&self, key: &str) -> SyncResult<bool> {
        Ok(self.store.has(key)?)
    }

    /// Lists all stored keys in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn keys(&self) -> SyncResult<Vec<String>> {
        Ok(self.store.list_keys()?)
    }

    /// Wraps, optionally encrypts, and stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the store fails.
    pub fn write(&self, key: &str, value: Value) -> SyncResult<()> {
        let old = self.old_value_for_event(key)?;
        let stored = self.encode_envelope(&value)?;
        self.store.write(key, stored)?;
        self.stats.record_write();
        debug!(key = %key, "value written");

        if let Some(old) = old {
            self.feed.emit(&ChangeEvent::write(key, old, value));
        }
        Ok(())
    }

    /// Writes `value` unless the stored value already equals it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or encryption fails.
    pub fn write_if_changed(&self, key: &str, value: Value) -> SyncResult<WriteOutcome> {
        let current = self.read(key)?;
        if !is_different_opt(current.as_ref(), Some(&value)) {
            self.stats.record_suppressed_write();
            return Ok(WriteOutcome::Unchanged);
        }
        self.write(key, value)?;
        Ok(WriteOutcome::Written)
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn remove(&self, key: &str) -> SyncResult<()> {
        let old = self.old_value_for_event(key)?;
        self.store.remove(key)?;
        if let Some(old) = old {
            self.feed.emit(&ChangeEvent::remove(key, old));
        }
        Ok(())
    }

    /// Removes every entry, notifying listeners of each removed key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn erase_all(&self) -> SyncResult<()> {
        let mut removed = Vec::new();
        if !self.feed.is_suppressed() {
            for key in self.store.list_keys()? {
                if self.feed.has_listeners(&key) {
                    let old = self.read(&key)?;
                    removed.push(ChangeEvent::remove(key, old));
                }
            }
        }

        self.store.erase_all()?;
        for event in &removed {
            self.feed.emit(event);
        }
        Ok(())
    }

    /// Reads the previous value when an event will be delivered for `key`.
    ///
    /// The outer `Option` says whether to emit at all.
    fn old_value_for_event(&self, key: &str) -> SyncResult<Option<Option<Value>>> {
        if !self.feed.would_deliver(key) {
            return Ok(None);
        }
        Ok(Some(self.read(key)?))
    }

    fn encode_envelope(&self, value: &Value) -> SyncResult<Value> {
        let envelope = if self.stamp_timestamps {
            Envelope::stamped(value.clone(), self.clock.now_millis())
        } else {
            Envelope::new(value.clone())
        };
        let stored = envelope.to_value();

        match &self.cipher {
            None => Ok(stored),
            Some(cipher) => {
                let text = to_json_string(&stored)
                    .map_err(|e| SyncError::encryption_failed(e.to_string()))?;
                let payload = cipher.encrypt(&text)?;
                Ok(Value::Text(format!("{ENCRYPTED_MARKER}{payload}")))
            }
        }
    }

    /// Decodes a stored value, trying in order: a structured envelope, an
    /// encrypted payload, a JSON object or array in text form.
    pub(crate) fn decode_raw(&self, key: &str, raw: Value) -> Value {
        let text = match raw {
            Value::Text(text) => text,
            other => return Envelope::unwrap_value(other),
        };

        if let Some(payload) = text.strip_prefix(ENCRYPTED_MARKER) {
            let Some(cipher) = &self.cipher else {
                warn!(key = %key, "encrypted value found but no key configured");
                return Value::Text(text);
            };
            return match cipher.decrypt(payload) {
                Ok(plain) => match from_json_str(&plain) {
                    Ok(parsed) => Envelope::unwrap_value(parsed),
                    Err(_) => Value::Text(plain),
                },
                Err(e) => {
                    warn!(key = %key, error = %e, "could not decrypt stored value");
                    Value::Text(text)
                }
            };
        }

        if looks_like_json_container(&text) {
            if let Ok(parsed) = from_json_str(&text) {
                return Envelope::unwrap_value(parsed);
            }
            debug!(key = %key, "text resembles JSON but does not parse");
        }
        Value::Text(text)
    }
}

impl std::fmt::Debug for RawStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawStore")
            .field("encrypts", &self.encrypts())
            .field("stamp_timestamps", &self.stamp_timestamps)
            .finish()
    }
}

fn looks_like_json_container(text: &str) -> bool {
    let trimmed = text.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SyncConfig;
    use crate::crypto::cipher_for;
    use kvbind_storage::InMemoryStore;
    use parking_lot::Mutex;

    struct Fixture {
        memory: Arc<InMemoryStore>,
        feed: Arc<ChangeFeed>,
        raw: RawStore,
    }

    fn fixture(config: &SyncConfig) -> Fixture {
        let memory = Arc::new(InMemoryStore::new());
        let stats = Arc::new(SyncStats::new());
        let feed = Arc::new(ChangeFeed::new(Arc::clone(&stats)));
        let raw = RawStore::new(
            memory.clone(),
            cipher_for(config).unwrap().map(Arc::<dyn PayloadCipher>::from),
            Arc::clone(&feed),
            Arc::new(ManualClock::new(1_000)),
            stats,
            config.stamp_timestamps,
        );
        Fixture { memory, feed, raw }
    }

    #[test]
    fn write_wraps_in_envelope() {
        let f = fixture(&SyncConfig::new());
        f.raw.write("counter", Value::Integer(5)).unwrap();

        assert_eq!(
            f.memory.read("counter").unwrap(),
            Some(Envelope::stamped(Value::Integer(5), 1_000).to_value())
        );
        assert_eq!(f.raw.read("counter").unwrap(), Some(Value::Integer(5)));
    }

    #[test]
    fn unstamped_envelope() {
        let f = fixture(&SyncConfig::new().stamp_timestamps(false));
        f.raw.write("k", Value::Bool(true)).unwrap();
        assert_eq!(
            f.memory.read("k").unwrap(),
            Some(Value::map([("data", Value::Bool(true))]))
        );
    }

    #[test]
    fn missing_key_reads_none() {
        let f = fixture(&SyncConfig::new());
        assert_eq!(f.raw.read("nope").unwrap(), None);
        assert!(!f.raw.has("nope").unwrap());
    }

    #[test]
    fn legacy_json_text_is_parsed() {
        let f = fixture(&SyncConfig::new());
        f.memory
            .write("a", Value::from(r#"{"data":[1,2],"timestamp":9}"#))
            .unwrap();
        f.memory.write("b", Value::from(r#"[{"id":"1"}]"#)).unwrap();
        f.memory.write("c", Value::from("{not json}")).unwrap();
        f.memory.write("d", Value::from("plain")).unwrap();
        f.memory.write("e", Value::Integer(3)).unwrap();

        assert_eq!(f.raw.read("a").unwrap(), Some(Value::from(vec![1i64, 2])));
        assert_eq!(
            f.raw.read("b").unwrap(),
            Some(Value::Array(vec![Value::map([("id", Value::from("1"))])]))
        );
        assert_eq!(f.raw.read("c").unwrap(), Some(Value::from("{not json}")));
        assert_eq!(f.raw.read("d").unwrap(), Some(Value::from("plain")));
        assert_eq!(f.raw.read("e").unwrap(), Some(Value::Integer(3)));
    }

    #[test]
    fn write_if_changed_suppresses_equal_values() {
        let f = fixture(&SyncConfig::new());
        assert_eq!(
            f.raw.write_if_changed("k", Value::Integer(1)).unwrap(),
            WriteOutcome::Written
        );
        assert_eq!(
            f.raw.write_if_changed("k", Value::Float(1.0)).unwrap(),
            WriteOutcome::Unchanged
        );
        assert_eq!(
            f.raw.write_if_changed("k", Value::Integer(2)).unwrap(),
            WriteOutcome::Written
        );
    }

    #[test]
    fn events_carry_old_and_new() {
        let f = fixture(&SyncConfig::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&events);
        let _sub = f
            .feed
            .subscribe("k", Arc::new(move |ev: &ChangeEvent| e.lock().push(ev.clone())));

        f.raw.write("k", Value::Integer(1)).unwrap();
        f.raw.write("k", Value::Integer(2)).unwrap();
        f.raw.remove("k").unwrap();

        let events = events.lock();
        assert_eq!(
            *events,
            vec![
                ChangeEvent::write("k", None, Value::Integer(1)),
                ChangeEvent::write("k", Some(Value::Integer(1)), Value::Integer(2)),
                ChangeEvent::remove("k", Some(Value::Integer(2))),
            ]
        );
    }

    #[test]
    fn erase_all_notifies_each_watched_key() {
        let f = fixture(&SyncConfig::new());
        f.raw.write("a", Value::Integer(1)).unwrap();
        f.raw.write("b", Value::Integer(2)).unwrap();

        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        let _sub = f
            .feed
            .subscribe("a", Arc::new(move |_: &ChangeEvent| *c.lock() += 1));

        f.raw.erase_all().unwrap();
        assert!(f.memory.is_empty());
        assert_eq!(*count.lock(), 1);
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn encrypted_round_trip() {
        let f = fixture(&SyncConfig::new().encryption_key("passphrase"));
        f.raw.write("secret", Value::from("hidden")).unwrap();

        let stored = f.memory.read("secret").unwrap().unwrap();
        let text = stored.as_text().unwrap();
        assert!(text.starts_with(ENCRYPTED_MARKER));
        assert!(!text.contains("hidden"));
        assert_eq!(f.raw.read("secret").unwrap(), Some(Value::from("hidden")));
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn undecryptable_payload_is_returned_raw() {
        let f = fixture(&SyncConfig::new().encryption_key("passphrase"));
        let garbage = format!("{ENCRYPTED_MARKER}not-base64!");
        f.memory.write("k", Value::from(garbage.as_str())).unwrap();
        assert_eq!(f.raw.read("k").unwrap(), Some(Value::from(garbage.as_str())));

        let plain = fixture(&SyncConfig::new());
        plain.memory.write("k", Value::from(garbage.as_str())).unwrap();
        assert_eq!(plain.raw.read("k").unwrap(), Some(Value::from(garbage)));
    }
}

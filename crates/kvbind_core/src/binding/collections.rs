//! List, map and set bindings.
//!
//! Collections decode item by item. An item that fails to decode is logged
//! and skipped; the rest of the collection still loads.

use super::{BindOptions, LoadOutcome};
use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::observable::Reactive;
use crate::stats::SyncStats;
use kvbind_codec::{Codec, CodecError, CodecResult, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

fn decode_item<T>(
    key: &str,
    position: &dyn std::fmt::Display,
    item_codec: &Codec<T>,
    item: &Value,
    stats: &SyncStats,
) -> Option<T> {
    match item_codec.decode(item) {
        Ok(value) => Some(value),
        Err(e) => {
            stats.record_decode_failure();
            warn!(key = %key, item = %position, error = %e, "skipping undecodable item");
            None
        }
    }
}

/// Sequence codec that skips items failing to decode.
pub(crate) fn lenient_list<T>(key: &str, item_codec: Codec<T>, stats: Arc<SyncStats>) -> Codec<Vec<T>>
where
    T: Send + Sync + 'static,
{
    let encoder = item_codec.clone();
    let key = key.to_string();
    Codec::new(
        move |items: &Vec<T>| {
            items
                .iter()
                .map(|item| encoder.encode(item))
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Array)
        },
        move |value: &Value| {
            let items = value
                .as_array()
                .ok_or_else(|| CodecError::type_mismatch("array", value.kind()))?;
            Ok(items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| decode_item(&key, &i, &item_codec, item, &stats))
                .collect())
        },
    )
}

/// Sequence codec collecting into an ordered set. Duplicates collapse.
pub(crate) fn lenient_set<T>(
    key: &str,
    item_codec: Codec<T>,
    stats: Arc<SyncStats>,
) -> Codec<BTreeSet<T>>
where
    T: Ord + Send + Sync + 'static,
{
    let encoder = item_codec.clone();
    let key = key.to_string();
    Codec::new(
        move |items: &BTreeSet<T>| {
            items
                .iter()
                .map(|item| encoder.encode(item))
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Array)
        },
        move |value: &Value| {
            let items = value
                .as_array()
                .ok_or_else(|| CodecError::type_mismatch("array", value.kind()))?;
            Ok(items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| decode_item(&key, &i, &item_codec, item, &stats))
                .collect())
        },
    )
}

/// String-keyed mapping codec that skips entries whose value fails to decode.
pub(crate) fn lenient_map<T>(
    key: &str,
    item_codec: Codec<T>,
    stats: Arc<SyncStats>,
) -> Codec<BTreeMap<String, T>>
where
    T: Send + Sync + 'static,
{
    let encoder = item_codec.clone();
    let key = key.to_string();
    Codec::new(
        move |entries: &BTreeMap<String, T>| {
            entries
                .iter()
                .map(|(k, v)| encoder.encode(v).map(|v| (k.clone(), v)))
                .collect::<CodecResult<BTreeMap<_, _>>>()
                .map(Value::Map)
        },
        move |value: &Value| {
            let entries = value
                .as_map()
                .ok_or_else(|| CodecError::type_mismatch("map", value.kind()))?;
            Ok(entries
                .iter()
                .filter_map(|(k, v)| {
                    decode_item(&key, k, &item_codec, v, &stats).map(|v| (k.clone(), v))
                })
                .collect())
        },
    )
}

impl SyncContext {
    /// Binds a list observable to `key`, decoding each item with `item_codec`.
    ///
    /// Items that fail to decode are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Same as [`bind`](Self::bind).
    pub fn bind_list<T, R>(
        &self,
        key: &str,
        observable: &R,
        item_codec: Codec<T>,
        options: BindOptions<Vec<T>>,
    ) -> SyncResult<LoadOutcome>
    where
        T: Clone + Send + Sync + 'static,
        R: Reactive<Vec<T>> + Clone + 'static,
    {
        let codec = lenient_list(key, item_codec, Arc::clone(&self.inner().stats));
        self.bind(key, observable, codec, options)
    }

    /// Binds a string-keyed map observable to `key`.
    ///
    /// Entries whose value fails to decode are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Same as [`bind`](Self::bind).
    pub fn bind_map<T, R>(
        &self,
        key: &str,
        observable: &R,
        item_codec: Codec<T>,
        options: BindOptions<BTreeMap<String, T>>,
    ) -> SyncResult<LoadOutcome>
    where
        T: Clone + Send + Sync + 'static,
        R: Reactive<BTreeMap<String, T>> + Clone + 'static,
    {
        let codec = lenient_map(key, item_codec, Arc::clone(&self.inner().stats));
        self.bind(key, observable, codec, options)
    }

    /// Binds a set observable to `key`. The set is stored as a sequence.
    ///
    /// # Errors
    ///
    /// Same as [`bind`](Self::bind).
    pub fn bind_set<T, R>(
        &self,
        key: &str,
        observable: &R,
        item_codec: Codec<T>,
        options: BindOptions<BTreeSet<T>>,
    ) -> SyncResult<LoadOutcome>
    where
        T: Clone + Ord + Send + Sync + 'static,
        R: Reactive<BTreeSet<T>> + Clone + 'static,
    {
        let codec = lenient_set(key, item_codec, Arc::clone(&self.inner().stats));
        self.bind(key, observable, codec, options)
    }
}

//! Persistence, encryption and stored-format compatibility tests.

mod common;

use common::init_tracing;
use kvbind_core::{
    BindOptions, Codec, FileStore, InMemoryStore, KvStore, LoadOutcome, Observable, SyncConfig,
    SyncContext, SyncError, Value,
};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn bound_values_survive_a_restart() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");

    {
        let store = FileStore::open(&path).unwrap();
        let ctx = SyncContext::open(Arc::new(store), SyncConfig::new()).unwrap();
        let volume = Observable::new(0i64);
        ctx.bind(
            "volume",
            &volume,
            Codec::storable(),
            BindOptions::new().default_value(50),
        )
        .unwrap();
        volume.set(80);
    }

    let store = FileStore::open(&path).unwrap();
    let ctx = SyncContext::open(Arc::new(store), SyncConfig::new()).unwrap();
    let volume = Observable::new(0i64);
    let outcome = ctx
        .bind(
            "volume",
            &volume,
            Codec::storable(),
            BindOptions::new().default_value(50),
        )
        .unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded);
    assert_eq!(volume.get(), 80);
}

#[test]
fn floats_read_back_exactly_from_a_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("floats.json");
    let codec = Codec::<f64>::storable();
    let price = -216_288_378.937_336_18_f64;

    {
        let ctx = SyncContext::open(Arc::new(FileStore::open(&path).unwrap()), SyncConfig::new())
            .unwrap();
        ctx.set("price", &price, &codec).unwrap();
    }

    let ctx =
        SyncContext::open(Arc::new(FileStore::open(&path).unwrap()), SyncConfig::new()).unwrap();
    assert_eq!(ctx.get("price", &codec).unwrap(), Some(price));
}

#[test]
fn second_open_of_a_locked_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let _first = FileStore::open(&path).unwrap();
    assert!(FileStore::open(&path).is_err());
}

#[test]
fn legacy_encodings_are_read() {
    let store = InMemoryStore::with_entries([
        ("structured", Value::map([("data", Value::Integer(1))])),
        ("json_text", Value::from(r#"{"data":"two","timestamp":5}"#)),
        ("bare_json", Value::from(r#"{"theme":"dark"}"#)),
        ("plain", Value::from("just text")),
    ]);
    let ctx = SyncContext::open(Arc::new(store), SyncConfig::new()).unwrap();

    assert_eq!(ctx.get_value("structured").unwrap(), Some(Value::Integer(1)));
    assert_eq!(ctx.get_value("json_text").unwrap(), Some(Value::from("two")));
    assert_eq!(
        ctx.get_value("bare_json").unwrap(),
        Some(Value::map([("theme", Value::from("dark"))]))
    );
    assert_eq!(ctx.get_value("plain").unwrap(), Some(Value::from("just text")));
}

#[cfg(feature = "encryption")]
mod encrypted {
    use super::*;
    use kvbind_core::ENCRYPTED_MARKER;

    fn encrypted_config() -> SyncConfig {
        SyncConfig::new()
            .encryption_key("correct horse battery staple")
            .stamp_timestamps(false)
    }

    #[test]
    fn values_are_encrypted_at_rest() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = SyncContext::open(store.clone(), encrypted_config()).unwrap();
        let secret = Observable::new(String::new());
        ctx.bind("secret", &secret, Codec::storable(), BindOptions::new())
            .unwrap();
        secret.set("hunter2".to_string());

        let raw = store.read("secret").unwrap().unwrap();
        let text = raw.as_text().unwrap();
        assert!(text.starts_with(ENCRYPTED_MARKER));
        assert!(!text.contains("hunter2"));

        let reopened = SyncContext::open(store.clone(), encrypted_config());
        assert!(reopened.is_ok());
        let reader = reopened.unwrap();
        assert_eq!(
            reader
                .get("secret", &Codec::<String>::storable())
                .unwrap()
                .as_deref(),
            Some("hunter2")
        );
    }

    #[test]
    fn floats_read_back_exactly() {
        let ctx = SyncContext::open(Arc::new(InMemoryStore::new()), encrypted_config()).unwrap();
        let codec = Codec::<f64>::storable();
        let ratio = -216_288_378.937_336_18_f64;
        ctx.set("ratio", &ratio, &codec).unwrap();
        assert_eq!(ctx.get("ratio", &codec).unwrap(), Some(ratio));
    }

    #[test]
    fn equal_float_is_not_rewritten() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = SyncContext::open(store, encrypted_config()).unwrap();
        let ratio = Observable::new(0.0f64);
        ctx.bind("ratio", &ratio, Codec::storable(), BindOptions::new())
            .unwrap();

        ratio.set(0.1 + 0.2);
        let writes = ctx.stats().writes;
        ratio.set(0.1 + 0.2);
        assert_eq!(ctx.stats().writes, writes);
        assert_eq!(ctx.stats().suppressed_writes, 1);
    }

    #[test]
    fn identical_payloads_encrypt_identically() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = SyncContext::open(store.clone(), encrypted_config()).unwrap();
        ctx.set_value("a", Value::Integer(1)).unwrap();
        ctx.set_value("b", Value::Integer(1)).unwrap();
        assert_eq!(store.read("a").unwrap(), store.read("b").unwrap());
    }

    #[test]
    fn wrong_key_reads_the_raw_payload() {
        let store = Arc::new(InMemoryStore::new());
        let writer = SyncContext::open(store.clone(), encrypted_config()).unwrap();
        writer.set_value("n", Value::Integer(5)).unwrap();

        let other = SyncContext::open(
            store.clone(),
            SyncConfig::new().encryption_key("another key"),
        )
        .unwrap();
        let raw = other.get_value("n").unwrap().unwrap();
        assert!(raw.as_text().unwrap().starts_with(ENCRYPTED_MARKER));
        assert_eq!(other.get("n", &Codec::<i64>::storable()).unwrap(), None);

        let plain = SyncContext::open(store, SyncConfig::new()).unwrap();
        assert!(plain.get_value("n").unwrap().unwrap().as_text().is_some());
    }
}

#[cfg(not(feature = "encryption"))]
#[test]
fn encryption_key_requires_the_feature() {
    let err = SyncContext::new(SyncConfig::new().encryption_key("k")).unwrap_err();
    assert!(matches!(err, SyncError::EncryptionNotEnabled));
}

#[test]
fn has_key_and_keys_reflect_the_store() {
    let ctx = SyncContext::open(Arc::new(InMemoryStore::new()), SyncConfig::new()).unwrap();
    assert!(!ctx.has_key("a").unwrap());
    ctx.set_value("b", Value::Integer(1)).unwrap();
    ctx.set_value("a", Value::Integer(2)).unwrap();
    assert!(ctx.has_key("a").unwrap());
    assert_eq!(ctx.keys().unwrap(), vec!["a", "b"]);

    ctx.close();
    assert!(matches!(ctx.keys(), Err(SyncError::NotInitialized)));
}

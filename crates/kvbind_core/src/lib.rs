//! # kvbind core
//!
//! Keeps in-memory observable values and a key-value store in step.
//!
//! This crate provides:
//! - [`SyncContext`], owning the store, the per-key update locks and the change feed
//! - Bindings of scalar, list, map and set observables to store keys
//! - An envelope format with optional AES-256-GCM payload encryption
//! - Values with a time to live
//! - Change notifications, with suppression for batched writes
//!
//! ## Loop prevention
//!
//! A mutation of a bound observable locks its key, writes through to the
//! store if the stored value differs, and releases the lock. A store change
//! pushed into an observable holds the same lock, so the resulting
//! observable notification is recognised and skipped instead of being
//! written back.
//!
//! ## Example
//!
//! ```rust
//! use kvbind_core::{BindOptions, Codec, Observable, SyncConfig, SyncContext};
//! use kvbind_storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! let ctx = SyncContext::open(Arc::new(InMemoryStore::new()), SyncConfig::new()).unwrap();
//!
//! let todos: Observable<Vec<String>> = Observable::default();
//! ctx.bind_list("todos", &todos, Codec::storable(), BindOptions::new()).unwrap();
//!
//! todos.update(|list| list.push("write docs".to_string()));
//! assert_eq!(
//!     ctx.get("todos", &Codec::<Vec<String>>::storable()).unwrap(),
//!     Some(vec!["write docs".to_string()])
//! );
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod binding;
mod change_feed;
mod clock;
mod config;
mod context;
mod crypto;
mod envelope;
mod error;
mod expiration;
mod gateway;
mod locks;
mod observable;
mod stats;
mod subscription;

pub use binding::{BindOptions, BindingState, LoadOutcome};
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeListener, ChangeType, SuppressGuard};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{SyncConfig, DEFAULT_EXPIRATION_SUFFIX};
pub use context::SyncContext;
pub use crypto::{cipher_for, PayloadCipher, ENCRYPTED_MARKER};
pub use envelope::Envelope;
pub use error::{SyncError, SyncResult};
pub use gateway::{RawStore, WriteOutcome};
pub use locks::{LockCounters, LockGuard, LockRegistry};
pub use observable::{Observable, Reactive, ValueListener};
pub use stats::{StatsSnapshot, SyncStats};
pub use subscription::Subscription;

#[cfg(feature = "encryption")]
pub use crypto::{AesGcmCipher, EncryptionKey};

// Re-export the codec and storage types bindings are written against.
pub use kvbind_codec::{is_different, Codec, CodecError, Storable, Value};
pub use kvbind_storage::{FileStore, InMemoryStore, KvStore, StorageError};

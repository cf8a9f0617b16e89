//! # kvbind Storage
//!
//! Key-value store trait and implementations for kvbind.
//!
//! Stores are **opaque value stores**: they keep whatever [`Value`] they
//! are handed under a string key and never interpret it. Envelopes,
//! encryption and legacy decoding all live above this layer.
//!
//! ## Design Principles
//!
//! - Six operations: has, read, write, remove, erase-all, list-keys
//! - No knowledge of envelopes, expiration records or bindings
//! - Must be `Send + Sync`; all methods take `&self`
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral state
//! - [`FileStore`] - A JSON document on disk, rewritten atomically
//!
//! ## Example
//!
//! ```rust
//! use kvbind_storage::{KvStore, InMemoryStore};
//! use kvbind_codec::Value;
//!
//! let store = InMemoryStore::new();
//! store.write("greeting", Value::from("hello")).unwrap();
//! assert_eq!(store.read("greeting").unwrap(), Some(Value::from("hello")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::KvStore;
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;

pub use kvbind_codec::Value;

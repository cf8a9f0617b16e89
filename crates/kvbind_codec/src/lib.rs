//! # kvbind Codec
//!
//! Storable value model and per-key codecs for kvbind.
//!
//! This crate provides:
//! - [`Value`], the JSON-shaped primitive every binding is reduced to
//! - [`is_different`], the deep structural equality engine that gates
//!   every write and every observable update
//! - [`Codec`], an explicit `{encode, decode}` pair supplied per key
//! - [`Storable`], built-in codecs for common Rust types
//!
//! ## Usage
//!
//! ```
//! use kvbind_codec::{is_different, Codec, Value};
//!
//! let codec = Codec::<i64>::storable();
//! let encoded = codec.encode(&42).unwrap();
//! assert_eq!(encoded, Value::Integer(42));
//! assert_eq!(codec.decode(&encoded).unwrap(), 42);
//!
//! assert!(!is_different(&encoded, &Value::from(42)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod diff;
mod error;
mod json;
mod value;

pub use codec::{Codec, Storable};
pub use diff::{is_different, is_different_opt};
pub use error::{CodecError, CodecResult};
pub use json::{from_json_str, to_json_string};
pub use value::Value;

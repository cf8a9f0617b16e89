//! # kvbind testkit
//!
//! Test utilities for kvbind.
//!
//! This crate provides:
//! - Context fixtures backed by memory or a temporary file, with a manual clock
//! - Store wrappers that count operations or fail on demand
//! - Property-based generators for stored values
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kvbind_testkit::prelude::*;
//!
//! #[test]
//! fn binds() {
//!     with_context(|ctx| {
//!         let counter = Observable::new(0i64);
//!         ctx.bind("counter", &counter, Codec::storable(), BindOptions::new())?;
//!         Ok(())
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stores;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stores::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stores::*;

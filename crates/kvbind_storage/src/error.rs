//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The storage file is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the store's lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The store is closed.
    #[error("storage is closed")]
    Closed,

    /// The backing implementation rejected the operation.
    #[error("store rejected operation on {key}: {message}")]
    Rejected {
        /// The key being operated on.
        key: String,
        /// Reason given by the backend.
        message: String,
    },
}

impl StorageError {
    /// Creates a rejected-operation error.
    pub fn rejected(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            key: key.into(),
            message: message.into(),
        }
    }
}

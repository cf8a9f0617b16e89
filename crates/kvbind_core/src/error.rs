//! Error types for kvbind core.

use thiserror::Error;

/// Result type for core operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while binding and syncing values.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] kvbind_storage::StorageError),

    /// Codec error while converting a value for `key`.
    #[error("codec error for {key}: {source}")]
    Codec {
        /// The key whose value failed to convert.
        key: String,
        /// The underlying codec error.
        #[source]
        source: kvbind_codec::CodecError,
    },

    /// The context has no store attached, or was closed.
    #[error("sync context not initialized: attach a store before use")]
    NotInitialized,

    /// Encryption is not enabled.
    #[error("encryption feature not enabled")]
    EncryptionNotEnabled,

    /// Encryption failed.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Decryption failed.
    #[error("decryption failed: {message}")]
    DecryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl SyncError {
    /// Creates a codec error bound to a key.
    pub fn codec(key: impl Into<String>, source: kvbind_codec::CodecError) -> Self {
        Self::Codec {
            key: key.into(),
            source,
        }
    }

    /// Creates an encryption failed error.
    pub fn encryption_failed(message: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a decryption failed error.
    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for errors raised while decoding a stored value.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Codec { .. })
    }

    /// Returns true if the stored primitive had the wrong shape for the codec.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::Codec { source, .. } if source.is_type_mismatch())
    }
}

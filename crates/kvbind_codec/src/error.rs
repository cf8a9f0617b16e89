//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while converting between domain values and [`Value`](crate::Value).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a domain value.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a stored value.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// The stored primitive does not have the shape the caller asked for.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Name of the expected primitive kind.
        expected: &'static str,
        /// Name of the primitive kind that was found.
        found: &'static str,
    },

    /// A number could not be represented in the requested type.
    #[error("numeric value {value} out of range for {target}")]
    OutOfRange {
        /// Textual form of the offending number.
        value: String,
        /// Name of the target type.
        target: &'static str,
    },

    /// Text could not be parsed as JSON.
    #[error("invalid JSON: {message}")]
    InvalidJson {
        /// Parser message.
        message: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }

    /// Create an out of range error.
    pub fn out_of_range(value: impl ToString, target: &'static str) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
            target,
        }
    }

    /// Returns true if this error is a [`CodecError::TypeMismatch`].
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson {
            message: err.to_string(),
        }
    }
}

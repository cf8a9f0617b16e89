//! Payload encryption for stored envelopes.
//!
//! Encryption is a pluggable transform over the serialized envelope text.
//! The gateway prefixes transformed payloads with [`ENCRYPTED_MARKER`];
//! text without the marker is plaintext.
//!
//! ## Security Model
//!
//! - AES-256-GCM with a key derived from the configured passphrase (HKDF-SHA256)
//! - Nonces are derived from the key and the plaintext, so the transform is
//!   deterministic: equal payloads produce equal ciphertexts
//! - Keys are zeroized on drop
//! - An empty passphrase disables encryption entirely
//!
//! Encryption must be enabled via the `encryption` feature.

#[cfg(feature = "encryption")]
mod encrypted;

#[cfg(feature = "encryption")]
pub use encrypted::*;

use crate::config::SyncConfig;
use crate::error::SyncResult;

/// Prefix marking an encrypted payload.
pub const ENCRYPTED_MARKER: &str = "ENCRYPTED:";

/// A reversible transform applied to serialized envelopes.
pub trait PayloadCipher: Send + Sync {
    /// Transforms plaintext into an opaque text payload (without the marker).
    ///
    /// # Errors
    ///
    /// Returns an error if the transform fails.
    fn encrypt(&self, plaintext: &str) -> SyncResult<String>;

    /// Exact inverse of [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns an error if the payload was not produced by this cipher.
    fn decrypt(&self, payload: &str) -> SyncResult<String>;
}

/// Builds the cipher described by `config`, or `None` when the key is empty.
///
/// # Errors
///
/// Returns [`SyncError::EncryptionNotEnabled`](crate::SyncError::EncryptionNotEnabled)
/// if a key is configured but the `encryption` feature is off.
pub fn cipher_for(config: &SyncConfig) -> SyncResult<Option<Box<dyn PayloadCipher>>> {
    if !config.encrypts() {
        return Ok(None);
    }

    #[cfg(feature = "encryption")]
    {
        let cipher = AesGcmCipher::new(EncryptionKey::derive_from_passphrase(
            config.encryption_key.as_bytes(),
        )?);
        Ok(Some(Box::new(cipher)))
    }

    #[cfg(not(feature = "encryption"))]
    {
        Err(crate::error::SyncError::EncryptionNotEnabled)
    }
}

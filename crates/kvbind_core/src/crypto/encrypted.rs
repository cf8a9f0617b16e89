//! Payload encryption using AES-256-GCM.

use super::PayloadCipher;
use crate::error::{SyncError, SyncResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// HKDF salt for passphrase-derived keys.
const KEY_SALT: &[u8] = b"kvbind-payload-salt";
/// HKDF info string for passphrase-derived keys.
const KEY_INFO: &[u8] = b"kvbind-payload-key-v1";

/// Encryption key for AES-256-GCM.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> SyncResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(SyncError::encryption_failed(format!(
                "invalid key size: expected {KEY_SIZE}, got {}",
                bytes.len()
            )));
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Derives a key from a passphrase using HKDF-SHA256.
    ///
    /// HKDF is not a password hashing function; the passphrase is expected
    /// to be application-provided key material rather than a user password.
    pub fn derive_from_passphrase(passphrase: &[u8]) -> SyncResult<Self> {
        use hkdf::Hkdf;

        let hk = Hkdf::<Sha256>::new(Some(KEY_SALT), passphrase);
        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(KEY_INFO, &mut bytes)
            .map_err(|_| SyncError::encryption_failed("HKDF expand failed"))?;

        Ok(Self { bytes })
    }

    /// Returns the key as a byte slice.
    ///
    /// Don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Deterministic AES-256-GCM payload cipher.
///
/// Output format: `base64(nonce (12 bytes) || ciphertext || tag (16 bytes))`.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
    key: EncryptionKey,
}

impl AesGcmCipher {
    /// Creates a cipher with the given key.
    #[must_use]
    pub fn new(key: EncryptionKey) -> Self {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher, key }
    }

    /// Synthetic nonce: the first 12 bytes of SHA-256(key || plaintext).
    fn nonce_for(&self, plaintext: &[u8]) -> [u8; NONCE_SIZE] {
        let mut hasher = Sha256::new();
        hasher.update(self.key.as_bytes());
        hasher.update(plaintext);
        let digest = hasher.finalize();

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&digest[..NONCE_SIZE]);
        nonce
    }
}

impl PayloadCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> SyncResult<String> {
        let nonce_bytes = self.nonce_for(plaintext.as_bytes());
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| SyncError::encryption_failed("encryption error"))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend(ciphertext);
        Ok(STANDARD.encode(out))
    }

    fn decrypt(&self, payload: &str) -> SyncResult<String> {
        let raw = STANDARD
            .decode(payload.trim())
            .map_err(|e| SyncError::decryption_failed(e.to_string()))?;
        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(SyncError::decryption_failed("ciphertext too short"));
        }

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&raw[..NONCE_SIZE]), &raw[NONCE_SIZE..])
            .map_err(|_| SyncError::decryption_failed("decryption error"))?;
        String::from_utf8(plaintext).map_err(|e| SyncError::decryption_failed(e.to_string()))
    }
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCipher")
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}

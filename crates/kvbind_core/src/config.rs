//! Context configuration.

/// Default suffix of the sibling key holding an expiration deadline.
pub const DEFAULT_EXPIRATION_SUFFIX: &str = "_expiration";

/// Configuration for a [`SyncContext`](crate::SyncContext).
#[derive(Clone)]
pub struct SyncConfig {
    /// Passphrase for payload encryption. Empty means pass-through.
    pub encryption_key: String,

    /// Whether envelopes carry a write timestamp.
    pub stamp_timestamps: bool,

    /// Suffix appended to a key to form its expiration record key.
    pub expiration_suffix: String,

    /// Whether new bindings push external store changes into their observable
    /// unless the bind options say otherwise.
    pub watch_store: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            encryption_key: String::new(),
            stamp_timestamps: true,
            expiration_suffix: DEFAULT_EXPIRATION_SUFFIX.to_string(),
            watch_store: false,
        }
    }
}

impl SyncConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the encryption passphrase.
    #[must_use]
    pub fn encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = key.into();
        self
    }

    /// Sets whether envelopes carry a timestamp.
    #[must_use]
    pub const fn stamp_timestamps(mut self, value: bool) -> Self {
        self.stamp_timestamps = value;
        self
    }

    /// Sets the expiration record suffix.
    #[must_use]
    pub fn expiration_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.expiration_suffix = suffix.into();
        self
    }

    /// Sets the default for external change propagation.
    #[must_use]
    pub const fn watch_store(mut self, value: bool) -> Self {
        self.watch_store = value;
        self
    }

    /// Returns true if payloads are encrypted.
    pub fn encrypts(&self) -> bool {
        !self.encryption_key.is_empty()
    }

    /// Key of the expiration record belonging to `key`.
    pub fn expiration_key(&self, key: &str) -> String {
        format!("{key}{}", self.expiration_suffix)
    }

    /// Returns true if `key` names an expiration record.
    pub fn is_expiration_key(&self, key: &str) -> bool {
        !self.expiration_suffix.is_empty() && key.ends_with(&self.expiration_suffix)
    }
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("encryption_key", &if self.encrypts() { "[REDACTED]" } else { "" })
            .field("stamp_timestamps", &self.stamp_timestamps)
            .field("expiration_suffix", &self.expiration_suffix)
            .field("watch_store", &self.watch_store)
            .finish()
    }
}

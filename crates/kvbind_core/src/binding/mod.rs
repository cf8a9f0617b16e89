//! Binding lifecycle types.
//!
//! A binding ties one key to one observable. Its lifecycle:
//!
//! ```text
//! Unbound -> Loading -> Loaded     -> Syncing -> Unbound
//!                    \-> LoadFailed -/
//! ```
//!
//! `Syncing` is only entered when auto-sync is on; otherwise the binding
//! stays in `Loaded` or `LoadFailed` until it is unbound.

mod collections;
pub(crate) mod engine;

use crate::error::SyncError;
use std::fmt;
use std::sync::Arc;

pub(crate) type LoadedHook<T> = Arc<dyn Fn(Option<&T>) + Send + Sync>;
pub(crate) type UpdatedHook<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub(crate) type ErrorHook = Arc<dyn Fn(&SyncError) + Send + Sync>;

/// The state of a key's binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// No binding exists for the key.
    Unbound,
    /// The initial value is being read.
    Loading,
    /// The stored value (or nothing) was loaded without error.
    Loaded,
    /// The stored value could not be decoded.
    LoadFailed,
    /// Observable mutations are being written through.
    Syncing,
}

impl BindingState {
    /// Returns true if a binding exists in any state.
    pub fn is_bound(&self) -> bool {
        !matches!(self, BindingState::Unbound)
    }
}

/// How the initial load of a binding went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing stored and no default supplied.
    Empty,
    /// Nothing stored; the default was applied and persisted.
    Defaulted,
    /// The stored value was decoded into the observable.
    Loaded,
    /// The stored value failed to decode; the default replaced it.
    RecoveredWithDefault,
    /// The stored value failed to decode and there was no default.
    Failed,
}

impl LoadOutcome {
    pub(crate) fn state(self) -> BindingState {
        match self {
            LoadOutcome::Empty | LoadOutcome::Defaulted | LoadOutcome::Loaded => {
                BindingState::Loaded
            }
            LoadOutcome::RecoveredWithDefault | LoadOutcome::Failed => BindingState::LoadFailed,
        }
    }
}

/// Per-binding options.
///
/// ```rust
/// use kvbind_core::BindOptions;
///
/// let options = BindOptions::new()
///     .default_value(0i64)
///     .on_loaded(|v: Option<&i64>| println!("loaded {v:?}"))
///     .on_error(|e| eprintln!("sync failed: {e}"));
/// ```
pub struct BindOptions<T> {
    pub(crate) auto_sync: bool,
    pub(crate) default_value: Option<T>,
    pub(crate) watch_store: Option<bool>,
    pub(crate) on_loaded: Option<LoadedHook<T>>,
    pub(crate) on_updated: Option<UpdatedHook<T>>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl<T> Default for BindOptions<T> {
    fn default() -> Self {
        Self {
            auto_sync: true,
            default_value: None,
            watch_store: None,
            on_loaded: None,
            on_updated: None,
            on_error: None,
        }
    }
}

impl<T> BindOptions<T> {
    /// Creates options with auto-sync on and no default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether observable mutations are written through.
    #[must_use]
    pub fn auto_sync(mut self, value: bool) -> Self {
        self.auto_sync = value;
        self
    }

    /// Value used when nothing is stored or the stored value is unreadable.
    #[must_use]
    pub fn default_value(mut self, value: T) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Sets whether store changes made elsewhere are pushed into the observable.
    ///
    /// When unset, the context's [`SyncConfig::watch_store`](crate::SyncConfig::watch_store) applies.
    #[must_use]
    pub fn watch_store(mut self, value: bool) -> Self {
        self.watch_store = Some(value);
        self
    }

    /// Called once after the initial load with the loaded value, if any.
    #[must_use]
    pub fn on_loaded(mut self, hook: impl Fn(Option<&T>) + Send + Sync + 'static) -> Self {
        self.on_loaded = Some(Arc::new(hook));
        self
    }

    /// Called after each observable mutation has been synced.
    #[must_use]
    pub fn on_updated(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_updated = Some(Arc::new(hook));
        self
    }

    /// Called with every error the binding recovers from.
    #[must_use]
    pub fn on_error(mut self, hook: impl Fn(&SyncError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for BindOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindOptions")
            .field("auto_sync", &self.auto_sync)
            .field("default_value", &self.default_value)
            .field("watch_store", &self.watch_store)
            .field("on_loaded", &self.on_loaded.is_some())
            .field("on_updated", &self.on_updated.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

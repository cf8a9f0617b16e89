//! Shared helpers for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Installs a log subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Collects whatever a callback is given.
#[derive(Clone, Default)]
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, item: T) {
        self.seen.lock().push(item);
    }

    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.seen.lock())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

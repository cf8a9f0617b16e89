//! Observable values.
//!
//! [`Reactive`] is the seam to whatever observable primitive the host
//! application uses: something with a current value, a setter that notifies,
//! and a way to subscribe. [`Observable`] is the implementation shipped with
//! kvbind.

use crate::subscription::Subscription;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Listener invoked with the new value after every mutation.
pub type ValueListener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A value container that notifies subscribers on mutation.
pub trait Reactive<T>: Send + Sync {
    /// Returns a copy of the current value.
    fn get(&self) -> T;

    /// Replaces the value and notifies subscribers.
    fn set(&self, value: T);

    /// Registers a listener called after every mutation.
    fn subscribe(&self, listener: ValueListener<T>) -> Subscription;
}

struct Inner<T> {
    value: RwLock<T>,
    listeners: RwLock<Vec<(u64, ValueListener<T>)>>,
    next_id: AtomicU64,
}

/// A shared observable value.
///
/// Clones share the same value and subscriber list. Every [`set`](Self::set)
/// notifies every subscriber, even when the new value equals the old one;
/// deciding whether anything changed is the sync engine's job.
///
/// # Example
///
/// ```rust
/// use kvbind_core::Observable;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicI64, Ordering};
///
/// let counter = Observable::new(0i64);
/// let seen = Arc::new(AtomicI64::new(0));
/// let s = Arc::clone(&seen);
/// let _sub = counter.subscribe(move |v: &i64| s.store(*v, Ordering::SeqCst));
///
/// counter.set(5);
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
/// ```
pub struct Observable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Creates an observable holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(value),
                listeners: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Runs `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Replaces the value and notifies subscribers.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value.clone();
        self.notify(&value);
    }

    /// Mutates the value in place and notifies subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let value = {
            let mut guard = self.inner.value.write();
            f(&mut guard);
            guard.clone()
        };
        self.notify(&value);
    }

    /// Registers a listener called after every mutation.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.subscribe_arc(Arc::new(listener))
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    fn subscribe_arc(&self, listener: ValueListener<T>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().push((id, listener));

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.write().retain(|(lid, _)| *lid != id);
            }
        })
    }

    fn notify(&self, value: &T) {
        // Snapshot so listeners may subscribe, unsubscribe or set re-entrantly.
        let listeners: Vec<ValueListener<T>> = self
            .inner
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(value);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Reactive<T> for Observable<T> {
    fn get(&self) -> T {
        Observable::get(self)
    }

    fn set(&self, value: T) {
        Observable::set(self, value);
    }

    fn subscribe(&self, listener: ValueListener<T>) -> Subscription {
        self.subscribe_arc(listener)
    }
}

impl<T: Clone + Default + Send + Sync + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.read())
            .field("listeners", &self.inner.listeners.read().len())
            .finish()
    }
}

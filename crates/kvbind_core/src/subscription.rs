//! Cancellable subscriptions.

use std::fmt;

/// A live registration of a listener.
///
/// Dropping a `Subscription` removes the listener. Call [`detach`](Self::detach)
/// to keep the listener registered for the lifetime of its source instead.
#[must_use = "dropping a Subscription unregisters its listener immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription that was never registered anywhere.
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Unregisters the listener now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    /// Keeps the listener registered and forgets the handle.
    pub fn detach(mut self) {
        self.cancel = None;
    }

    /// Returns true until the listener has been removed or detached.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting() -> (Subscription, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (sub, count)
    }

    #[test]
    fn drop_cancels_once() {
        let (sub, count) = counting();
        drop(sub);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_cancels_once() {
        let (sub, count) = counting();
        assert!(sub.is_active());
        sub.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detach_never_cancels() {
        let (sub, count) = counting();
        sub.detach();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

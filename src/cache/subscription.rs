//! Subscriber bookkeeping for the cache store

use super::key::QueryKey;
use super::store::Inner;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Type-erased subscriber callback, fed the entry's current value
pub(crate) type Listener<V> = Arc<Mutex<dyn FnMut(Option<&V>) + Send>>;

pub(crate) struct Subscriber<V> {
    pub(crate) id: u64,
    pub(crate) listener: Listener<V>,
}

/// Wrap a selector and a change listener into a store callback.
///
/// The listener only fires when the selected projection differs from the
/// last one seen, and receives `(current, previous)`.
pub(crate) fn selecting<V, S, F, L>(initial: S, selector: F, mut listener: L) -> Listener<V>
where
    V: 'static,
    S: PartialEq + Send + 'static,
    F: Fn(Option<&V>) -> S + Send + 'static,
    L: FnMut(&S, &S) + Send + 'static,
{
    let mut last = initial;
    Arc::new(Mutex::new(move |value: Option<&V>| {
        let next = selector(value);
        if next != last {
            listener(&next, &last);
            last = next;
        }
    }))
}

/// Values to deliver once the store lock has been released
pub(crate) struct Notification<V> {
    pub(crate) listeners: Vec<Listener<V>>,
    pub(crate) value: Option<V>,
}

pub(crate) fn deliver<V>(notifications: Vec<Notification<V>>) {
    for notification in notifications {
        for listener in &notification.listeners {
            // A listener that writes to the key it observes would deadlock here
            let mut callback = listener.lock().unwrap_or_else(PoisonError::into_inner);
            (*callback)(notification.value.as_ref());
        }
    }
}

/// Handle returned by `CacheStore::subscribe`
///
/// Dropping the handle unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription<V> {
    pub(crate) store: Weak<Mutex<Inner<V>>>,
    pub(crate) key: QueryKey,
    pub(crate) id: u64,
}

impl<V> Subscription<V> {
    /// Stop receiving notifications
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<V> Drop for Subscription<V> {
    fn drop(&mut self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let mut inner = store.lock().unwrap_or_else(PoisonError::into_inner);
        inner.detach(&self.key, self.id);
    }
}

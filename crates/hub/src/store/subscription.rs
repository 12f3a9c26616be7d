//! Scoped store subscriptions
//!
//! Listeners are registered through a handle that detaches them when it is
//! dropped, so release is guaranteed on every exit path of the subscribing
//! component.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::models::StoreState;

pub(crate) type Listener = dyn Fn(Arc<StoreState>) + Send + Sync;

/// Registered listeners, shared between the store and its subscription
/// handles.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    listeners: Mutex<Vec<(u64, Arc<Listener>)>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub(crate) fn add(&self, listener: Box<Listener>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().push((id, listener.into()));
        id
    }

    pub(crate) fn remove(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|(entry_id, _)| *entry_id != id);
    }

    /// Deliver one committed snapshot to every listener.
    ///
    /// The registry lock is released before any listener runs, so listeners
    /// may subscribe, unsubscribe, or dispatch reentrantly. A listener
    /// detached while a notification is in flight may still receive that
    /// one snapshot (delivery is at-least-once).
    pub(crate) fn notify(&self, state: &Arc<StoreState>) {
        let listeners: Vec<Arc<Listener>> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            (*listener)(Arc::clone(state));
        }
    }
}

/// Handle for one registered listener.
///
/// Dropping the handle detaches the listener; [`Subscription::cancel`] is
/// the explicit form.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    registry: Weak<SubscriberRegistry>,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(registry: Weak<SubscriberRegistry>, id: u64) -> Self {
        Self { registry, id }
    }

    /// Detach the listener now
    pub fn cancel(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

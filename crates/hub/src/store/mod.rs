//! The authoritative in-memory state tree
//!
//! `ServiceStore` owns the current [`StoreState`] snapshot and is the only
//! component that produces new versions of it. Transitions are serialized
//! through an explicit queue: one is in flight at a time, overlapping
//! submissions apply in arrival order, and a dispatch issued from inside a
//! subscriber runs after the current transition completes instead of
//! interleaving with it.
//!
//! Reads are always O(1) and always see a committed snapshot; holders of a
//! previous `Arc<StoreState>` keep a valid value across any number of later
//! transitions.

mod subscription;

pub use subscription::Subscription;

use chrono::Utc;
use log::warn;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{HubError, Result};
use crate::models::{
    MailboxConfig, MailboxId, MailboxState, SearchId, ServiceKey, ServiceType, StoreState,
};
use crate::reducers::{ServiceAction, reducer_for};
use subscription::SubscriberRegistry;

/// One queued state transition
enum Transition {
    Reduce {
        key: ServiceKey,
        action: ServiceAction,
    },
    SetActive(Option<ServiceKey>),
    AddMailbox(MailboxConfig),
    RemoveMailbox(MailboxId),
}

/// Store for all mailbox/service state
///
/// Construct one per application and share it (`Arc<ServiceStore>`) with the
/// hibernation controller, event bridges, and the presentation layer.
pub struct ServiceStore {
    state: RwLock<Arc<StoreState>>,
    queue: Mutex<VecDeque<Transition>>,
    draining: AtomicBool,
    subscribers: Arc<SubscriberRegistry>,
}

impl ServiceStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Arc::new(StoreState::default())),
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            subscribers: Arc::new(SubscriberRegistry::default()),
        }
    }

    // ========================================================================
    // Snapshot reads
    // ========================================================================

    /// The current committed snapshot
    pub fn get_state(&self) -> Arc<StoreState> {
        Arc::clone(&self.state.read().unwrap())
    }

    /// Look up one mailbox in the current snapshot
    pub fn get_mailbox(&self, id: &MailboxId) -> Option<MailboxState> {
        self.get_state().get_mailbox(id).cloned()
    }

    /// Whether the given key is the one the user is currently viewing
    pub fn is_active(&self, key: &ServiceKey) -> bool {
        self.get_state().is_active(key)
    }

    /// Whether a search session is open on the given service
    pub fn is_searching_mailbox(&self, key: &ServiceKey) -> bool {
        self.get_state().is_searching_mailbox(key)
    }

    /// Current search term for the given service
    pub fn mailbox_search_term(&self, key: &ServiceKey) -> Option<String> {
        self.get_state().mailbox_search_term(key)
    }

    /// Token of the open search session for the given service
    pub fn mailbox_search_hash(&self, key: &ServiceKey) -> Option<SearchId> {
        self.get_state().mailbox_search_hash(key)
    }

    /// Build a validated key for a configured mailbox's service.
    ///
    /// Uses the mailbox's stored family, so callers don't need to carry it.
    pub fn service_key(&self, id: &MailboxId, service_type: ServiceType) -> Result<ServiceKey> {
        let state = self.get_state();
        let mailbox = state
            .get_mailbox(id)
            .ok_or_else(|| HubError::unknown_key(id))?;
        ServiceKey::new(mailbox.family, mailbox.id.clone(), service_type)
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Register a listener for committed snapshots.
    ///
    /// The listener receives every new `StoreState` synchronously, in
    /// dispatch order, with no coalescing; a consumer that only cares about
    /// the latest value must debounce itself. The returned handle detaches
    /// the listener when dropped.
    pub fn subscribe(
        &self,
        listener: impl Fn(Arc<StoreState>) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.subscribers.add(Box::new(listener));
        Subscription::new(Arc::downgrade(&self.subscribers), id)
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Apply a reducer action to one service.
    ///
    /// Validation happens synchronously before the transition is queued, so
    /// an unknown key or malformed payload fails fast to the caller. The
    /// transition itself is serialized with all others and notifies every
    /// subscriber once committed.
    pub fn dispatch(&self, key: &ServiceKey, action: ServiceAction) -> Result<()> {
        action.validate()?;
        if self.get_state().get_service(key).is_none() {
            return Err(HubError::unknown_key(key));
        }
        self.submit(Transition::Reduce {
            key: key.clone(),
            action,
        });
        Ok(())
    }

    /// Fire-and-forget variant of [`dispatch`](Self::dispatch).
    ///
    /// Used for "after the current tick" dispatches issued from inside a
    /// subscriber: the transition queues behind the one currently applying.
    /// Validation failures are logged, not returned.
    pub fn defer(&self, key: &ServiceKey, action: ServiceAction) {
        if let Err(err) = self.dispatch(key, action) {
            warn!("Dropping deferred dispatch for {key}: {err}");
        }
    }

    /// Change which service is active (`None` clears the pointer).
    ///
    /// At most one key is active globally at any time.
    pub fn set_active(&self, key: Option<&ServiceKey>) -> Result<()> {
        // Validate against the current snapshot so the error is synchronous.
        self.get_state().with_active(key.cloned())?;
        self.submit(Transition::SetActive(key.cloned()));
        Ok(())
    }

    /// Configure a mailbox and create the initial state for its services
    pub fn add_mailbox(&self, config: MailboxConfig) -> Result<()> {
        let state = self.get_state();
        state.with_mailbox(MailboxState::from_config(&config, Utc::now())?)?;
        self.submit(Transition::AddMailbox(config));
        Ok(())
    }

    /// Remove a mailbox and destroy all its service state
    pub fn remove_mailbox(&self, id: &MailboxId) -> Result<()> {
        if self.get_state().get_mailbox(id).is_none() {
            return Err(HubError::unknown_key(id));
        }
        self.submit(Transition::RemoveMailbox(id.clone()));
        Ok(())
    }

    // ========================================================================
    // Queue
    // ========================================================================

    fn submit(&self, transition: Transition) {
        self.queue.lock().unwrap().push_back(transition);
        self.drain();
    }

    /// Apply queued transitions until the queue is empty.
    ///
    /// Only one drain runs at a time; a submission arriving while a drain is
    /// in progress (including reentrantly, from a subscriber) is picked up
    /// by that drain in arrival order.
    fn drain(&self) {
        if self.draining.swap(true, Ordering::AcqRel) {
            return;
        }
        loop {
            let next = self.queue.lock().unwrap().pop_front();
            match next {
                Some(transition) => self.apply(transition),
                None => {
                    self.draining.store(false, Ordering::Release);
                    // A transition may have been queued between the last pop
                    // and clearing the flag; reclaim the drain if so.
                    if self.queue.lock().unwrap().is_empty()
                        || self.draining.swap(true, Ordering::AcqRel)
                    {
                        break;
                    }
                }
            }
        }
    }

    /// Apply one transition and publish the result.
    ///
    /// Submission-time validation already passed; a transition invalidated
    /// by an earlier queued one (e.g. a reduce behind a mailbox removal) is
    /// skipped with a warning rather than surfaced, since its submitter was
    /// answered while it was still valid.
    fn apply(&self, transition: Transition) {
        let current = self.get_state();
        let next = match transition {
            Transition::Reduce { key, action } => {
                let Some(service) = current.get_service(&key) else {
                    warn!("Skipping queued action for removed service {key}");
                    return;
                };
                let reducer = reducer_for(key.service_type);
                match reducer
                    .reduce(service, &action, Utc::now())
                    .and_then(|next_service| current.with_service(&key, next_service))
                {
                    Ok(next) => next,
                    Err(err) => {
                        warn!("Skipping queued action for {key}: {err}");
                        return;
                    }
                }
            }
            Transition::SetActive(key) => match current.with_active(key) {
                Ok(next) => next,
                Err(err) => {
                    warn!("Skipping queued activation: {err}");
                    return;
                }
            },
            Transition::AddMailbox(config) => {
                match MailboxState::from_config(&config, Utc::now())
                    .and_then(|mailbox| current.with_mailbox(mailbox))
                {
                    Ok(next) => next,
                    Err(err) => {
                        warn!("Skipping queued mailbox add for {}: {err}", config.id);
                        return;
                    }
                }
            }
            Transition::RemoveMailbox(id) => match current.without_mailbox(&id) {
                Ok(next) => next,
                Err(err) => {
                    warn!("Skipping queued mailbox removal for {id}: {err}");
                    return;
                }
            },
        };

        let next = Arc::new(next);
        *self.state.write().unwrap() = Arc::clone(&next);
        self.subscribers.notify(&next);
    }
}

impl Default for ServiceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MailboxFamily, ServiceConfig};
    use std::sync::Mutex;

    fn store_with_slack(id: &str) -> (ServiceStore, ServiceKey) {
        let store = ServiceStore::new();
        store
            .add_mailbox(
                MailboxConfig::new(id, MailboxFamily::Slack).with_service(ServiceConfig::new(
                    ServiceType::Default,
                    format!("https://{id}.slack.com"),
                )),
            )
            .unwrap();
        let key = store
            .service_key(&MailboxId::new(id), ServiceType::Default)
            .unwrap();
        (store, key)
    }

    #[test]
    fn test_dispatch_updates_snapshot() {
        let (store, key) = store_with_slack("m1");
        store
            .dispatch(&key, ServiceAction::SetUnreadCount { count: 4 })
            .unwrap();
        assert_eq!(store.get_state().get_service(&key).unwrap().unread_count, 4);
    }

    #[test]
    fn test_dispatch_unknown_key_fails_fast() {
        let store = ServiceStore::new();
        let key = ServiceKey::new(MailboxFamily::Slack, "nope", ServiceType::Default).unwrap();
        let err = store
            .dispatch(&key, ServiceAction::SetUnreadCount { count: 1 })
            .unwrap_err();
        assert!(matches!(err, HubError::UnknownServiceKey { .. }));
    }

    #[test]
    fn test_invalid_argument_commits_nothing() {
        let (store, key) = store_with_slack("m1");
        let seen = Arc::new(Mutex::new(0u32));
        let seen_in_listener = Arc::clone(&seen);
        let _sub = store.subscribe(move |_| {
            *seen_in_listener.lock().unwrap() += 1;
        });

        let err = store
            .dispatch(&key, ServiceAction::SetUnreadCount { count: -3 })
            .unwrap_err();
        assert!(matches!(err, HubError::InvalidArgument { .. }));
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn test_old_snapshots_stay_valid() {
        let (store, key) = store_with_slack("m1");
        let before = store.get_state();
        store
            .dispatch(&key, ServiceAction::SetUnreadCount { count: 9 })
            .unwrap();
        assert_eq!(before.get_service(&key).unwrap().unread_count, 0);
        assert_eq!(store.get_state().get_service(&key).unwrap().unread_count, 9);
    }

    #[test]
    fn test_same_key_dispatches_apply_in_order() {
        let (store, key) = store_with_slack("m1");
        store
            .dispatch(&key, ServiceAction::SetUnreadCount { count: 5 })
            .unwrap();
        store
            .dispatch(&key, ServiceAction::SetUnreadCount { count: 7 })
            .unwrap();
        assert_eq!(store.get_state().get_service(&key).unwrap().unread_count, 7);
    }

    #[test]
    fn test_subscribers_see_every_commit_in_order() {
        let (store, key) = store_with_slack("m1");
        let counts = Arc::new(Mutex::new(Vec::new()));
        let counts_in_listener = Arc::clone(&counts);
        let key_in_listener = key.clone();
        let _sub = store.subscribe(move |state| {
            counts_in_listener
                .lock()
                .unwrap()
                .push(state.get_service(&key_in_listener).unwrap().unread_count);
        });

        for count in [1, 2, 3] {
            store
                .dispatch(&key, ServiceAction::SetUnreadCount { count })
                .unwrap();
        }
        assert_eq!(*counts.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_dropping_subscription_detaches_listener() {
        let (store, key) = store_with_slack("m1");
        let seen = Arc::new(Mutex::new(0u32));
        let seen_in_listener = Arc::clone(&seen);
        let sub = store.subscribe(move |_| {
            *seen_in_listener.lock().unwrap() += 1;
        });

        store
            .dispatch(&key, ServiceAction::SetUnreadCount { count: 1 })
            .unwrap();
        sub.cancel();
        store
            .dispatch(&key, ServiceAction::SetUnreadCount { count: 2 })
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_reentrant_dispatch_runs_after_current_transition() {
        let (store, key) = store_with_slack("m1");
        let store = Arc::new(store);

        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed_in_listener = Arc::clone(&observed);
        let store_in_listener = Arc::clone(&store);
        let key_in_listener = key.clone();
        let _sub = store.subscribe(move |state| {
            let count = state.get_service(&key_in_listener).unwrap().unread_count;
            observed_in_listener.lock().unwrap().push(count);
            if count == 1 {
                // Queued behind the in-flight transition, not interleaved.
                store_in_listener.defer(
                    &key_in_listener,
                    ServiceAction::SetUnreadCount { count: 2 },
                );
            }
        });

        store
            .dispatch(&key, ServiceAction::SetUnreadCount { count: 1 })
            .unwrap();
        assert_eq!(*observed.lock().unwrap(), vec![1, 2]);
        assert_eq!(store.get_state().get_service(&key).unwrap().unread_count, 2);
    }

    #[test]
    fn test_active_pointer_is_exclusive() {
        let (store, key1) = store_with_slack("m1");
        store
            .add_mailbox(
                MailboxConfig::new("m2", MailboxFamily::Google)
                    .with_service(ServiceConfig::new(ServiceType::Default, "https://mail"))
                    .with_service(ServiceConfig::new(ServiceType::Team, "https://chat")),
            )
            .unwrap();
        let key2 = store
            .service_key(&MailboxId::new("m2"), ServiceType::Team)
            .unwrap();

        store.set_active(Some(&key1)).unwrap();
        assert!(store.is_active(&key1));

        store.set_active(Some(&key2)).unwrap();
        assert!(!store.is_active(&key1));
        assert!(store.is_active(&key2));

        store.set_active(None).unwrap();
        assert!(!store.is_active(&key2));
    }

    #[test]
    fn test_remove_mailbox_destroys_service_state() {
        let (store, key) = store_with_slack("m1");
        store.remove_mailbox(&MailboxId::new("m1")).unwrap();
        assert!(store.get_state().get_service(&key).is_none());
        assert!(matches!(
            store.remove_mailbox(&MailboxId::new("m1")),
            Err(HubError::UnknownServiceKey { .. })
        ));
    }

    #[test]
    fn test_search_queries() {
        let (store, key) = store_with_slack("m1");
        assert!(!store.is_searching_mailbox(&key));
        assert_eq!(store.mailbox_search_hash(&key), None);

        store
            .dispatch(
                &key,
                ServiceAction::TrackSearching {
                    term: Some("incident".into()),
                },
            )
            .unwrap();
        assert!(store.is_searching_mailbox(&key));
        assert_eq!(store.mailbox_search_term(&key).as_deref(), Some("incident"));
        let first = store.mailbox_search_hash(&key).unwrap();

        store.dispatch(&key, ServiceAction::UntrackSearching).unwrap();
        assert!(!store.is_searching_mailbox(&key));
        assert_eq!(store.mailbox_search_hash(&key), None);

        store
            .dispatch(&key, ServiceAction::TrackSearching { term: None })
            .unwrap();
        let second = store.mailbox_search_hash(&key).unwrap();
        assert!(second.0 > first.0);
    }

    #[test]
    fn test_service_key_uses_stored_family() {
        let (store, _) = store_with_slack("m1");
        let err = store
            .service_key(&MailboxId::new("m1"), ServiceType::Team)
            .unwrap_err();
        assert!(matches!(err, HubError::InvalidServiceKey { .. }));
    }
}

//! Web view lifecycle: creation, hibernation, resume
//!
//! The controller owns the mapping from `ServiceKey` to a live-or-hibernated
//! browsing surface. It enforces the lifecycle state machine and resource
//! bookkeeping; the decision of *when* to hibernate is delegated to a
//! [`HibernationPolicy`], and the browser engine itself lives behind the
//! [`SurfaceFactory`]/[`ViewSurface`] seam.
//!
//! Activation is asynchronous: `activate` allocates the surface and starts
//! the load, and the embedder reports the outcome through
//! [`notify_load_result`](HibernationController::notify_load_result). A
//! surface is not usable until the controller signals it live through the
//! [`LifecycleObserver`].

mod policy;
mod surface;

pub use policy::{HibernationPolicy, IdleTimeoutPolicy, PolicyContext, idle_elapsed};
pub use surface::{SurfaceFactory, SurfaceSpec, ViewHandle, ViewLifecycle, ViewSurface};

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::bridge::{ScriptIntent, ViewCommand};
use crate::error::{HubError, Result};
use crate::models::{SearchId, ServiceKey, StoreState};
use crate::store::ServiceStore;

/// Receives lifecycle signals for presentation
pub trait LifecycleObserver: Send + Sync {
    /// The surface finished loading and is usable
    fn surface_live(&self, key: &ServiceKey);

    /// The surface exhausted its load retry and is degraded; the key stays
    /// live so a retry affordance can be shown
    fn surface_load_failed(&self, key: &ServiceKey);
}

/// Service state remembered across hibernation, replayed on resume
struct Rehydration {
    was_searching: bool,
    #[allow(dead_code)] // term re-entry is delegated to the surface's own restore
    search_term: String,
    #[allow(dead_code)]
    search_id: Option<SearchId>,
}

struct Slot {
    lifecycle: ViewLifecycle,
    handle: Option<ViewHandle>,
    rehydration: Option<Rehydration>,
    /// A load was issued and its outcome has not been reported yet
    load_pending: bool,
    /// The pending load already consumed its automatic retry
    retried: bool,
    /// Hibernate was requested while a load was pending; honored once the
    /// load settles
    hibernate_requested: bool,
    /// When the service stopped being the active one
    idle_since: Option<DateTime<Utc>>,
}

impl Slot {
    fn new() -> Self {
        Self {
            lifecycle: ViewLifecycle::Uncreated,
            handle: None,
            rehydration: None,
            load_pending: false,
            retried: false,
            hibernate_requested: false,
            idle_since: None,
        }
    }
}

/// Deferred observer signal, emitted after the slot lock is released
enum Signal {
    Live(ServiceKey),
    LoadFailed(ServiceKey),
}

/// Owns every browsing surface and its lifecycle
pub struct HibernationController {
    store: Arc<ServiceStore>,
    factory: Box<dyn SurfaceFactory>,
    policy: Box<dyn HibernationPolicy>,
    observer: Option<Box<dyn LifecycleObserver>>,
    slots: Mutex<HashMap<ServiceKey, Slot>>,
    pins: Mutex<HashSet<ServiceKey>>,
    last_active: Mutex<Option<ServiceKey>>,
}

impl HibernationController {
    pub fn new(store: Arc<ServiceStore>, factory: Box<dyn SurfaceFactory>) -> Self {
        Self {
            store,
            factory,
            policy: Box::new(IdleTimeoutPolicy::default()),
            observer: None,
            slots: Mutex::new(HashMap::new()),
            pins: Mutex::new(HashSet::new()),
            last_active: Mutex::new(None),
        }
    }

    /// Replace the hibernation policy
    pub fn with_policy(mut self, policy: Box<dyn HibernationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Attach a lifecycle observer
    pub fn with_observer(mut self, observer: Box<dyn LifecycleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Current lifecycle of a key. Keys the controller has never seen (or
    /// has destroyed and forgotten) report `Uncreated`.
    pub fn lifecycle(&self, key: &ServiceKey) -> ViewLifecycle {
        self.slots
            .lock()
            .unwrap()
            .get(key)
            .map(|slot| slot.lifecycle)
            .unwrap_or(ViewLifecycle::Uncreated)
    }

    /// Whether the key's surface is degraded after a failed load
    pub fn load_failed(&self, key: &ServiceKey) -> bool {
        self.slots
            .lock()
            .unwrap()
            .get(key)
            .and_then(|slot| slot.handle.as_ref())
            .is_some_and(|handle| handle.load_failed)
    }

    /// Make the key's surface live, allocating or resuming as needed.
    ///
    /// No-op when the surface is already live. The surface is not usable
    /// until the embedder's load report arrives and the observer signals it.
    pub fn activate(&self, key: &ServiceKey) -> Result<()> {
        let spec = self.surface_spec(key)?;

        let load_result;
        {
            let mut slots = self.slots.lock().unwrap();
            let slot = slots.entry(key.clone()).or_insert_with(Slot::new);
            // An activation supersedes any not-yet-honored hibernate request.
            slot.hibernate_requested = false;
            match slot.lifecycle {
                ViewLifecycle::Live => return Ok(()),
                ViewLifecycle::Uncreated | ViewLifecycle::Hibernated => {
                    let surface = self.factory.create(key, &spec).map_err(|err| {
                        error!("Surface allocation for {key} failed: {err:#}");
                        HubError::ViewLoadFailed {
                            key: key.to_string(),
                        }
                    })?;
                    let mut handle = ViewHandle::new(key.clone(), surface);
                    load_result = handle.surface.load_url(&spec.url);
                    slot.handle = Some(handle);
                    slot.lifecycle = ViewLifecycle::Live;
                    slot.load_pending = true;
                    slot.retried = false;
                }
                ViewLifecycle::Destroyed => {
                    // Destroyed slots are removed from the map, so this arm
                    // is unreachable; treat it like an unknown key.
                    return Err(HubError::unknown_key(key));
                }
            }
        }

        if let Err(err) = load_result {
            self.notify_load_result(key, Err(err));
        }
        Ok(())
    }

    /// Request hibernation of the key's surface.
    ///
    /// A no-op for keys without a live surface. When a load is pending the
    /// request is remembered and honored after the load settles; a
    /// half-created surface is never torn down mid-flight.
    pub fn hibernate(&self, key: &ServiceKey) -> Result<()> {
        let mut slots = self.slots.lock().unwrap();
        let Some(slot) = slots.get_mut(key) else {
            return Ok(());
        };
        match slot.lifecycle {
            ViewLifecycle::Live if slot.load_pending => {
                slot.hibernate_requested = true;
            }
            ViewLifecycle::Live => {
                self.release_to_hibernated(key, slot);
            }
            _ => {}
        }
        Ok(())
    }

    /// Destroy the key's surface and forget the key.
    ///
    /// Called on mailbox/service removal; idempotent.
    pub fn destroy(&self, key: &ServiceKey) -> Result<()> {
        let slot = self.slots.lock().unwrap().remove(key);
        match slot {
            Some(mut slot) => {
                if let Some(handle) = slot.handle.as_mut() {
                    handle.surface.close();
                }
            }
            None => debug!("Destroy for unknown key {key}"),
        }
        Ok(())
    }

    /// Pin a key so policy never hibernates it
    pub fn pin(&self, key: &ServiceKey) {
        self.pins.lock().unwrap().insert(key.clone());
    }

    /// Remove a pin
    pub fn unpin(&self, key: &ServiceKey) {
        self.pins.lock().unwrap().remove(key);
    }

    /// Report the outcome of a pending surface load.
    ///
    /// Called by the embedder. A failed load is retried once automatically;
    /// a second failure leaves the surface live but degraded
    /// (`load_failed`), never destroys the key. On success any rehydration
    /// data is replayed (an interrupted search session gets its focus
    /// command re-issued).
    pub fn notify_load_result(&self, key: &ServiceKey, result: anyhow::Result<()>) {
        let mut signals = Vec::new();
        {
            let mut slots = self.slots.lock().unwrap();
            let Some(slot) = slots.get_mut(key) else {
                warn!("Load report for unknown key {key}");
                return;
            };
            if !slot.load_pending {
                warn!("Stale load report for {key}");
                return;
            }

            match result {
                Ok(()) => {
                    slot.load_pending = false;
                    slot.retried = false;
                    if let Some(handle) = slot.handle.as_mut() {
                        handle.load_failed = false;
                        if let Some(rehydration) = slot.rehydration.take() {
                            if rehydration.was_searching {
                                let command =
                                    ViewCommand::Script(ScriptIntent::FocusSearchField);
                                if let Err(err) = handle.surface.run_command(&command) {
                                    warn!("Search focus replay for {key} failed: {err:#}");
                                }
                            }
                        }
                    }
                    signals.push(Signal::Live(key.clone()));
                }
                Err(err) => {
                    if !slot.retried {
                        slot.retried = true;
                        warn!("Load for {key} failed, retrying once: {err:#}");
                        let url = self
                            .store
                            .get_state()
                            .get_service(key)
                            .map(|service| service.url.clone());
                        let retry = match (slot.handle.as_mut(), url) {
                            (Some(handle), Some(url)) => handle.surface.load_url(&url),
                            _ => Err(anyhow::anyhow!("no surface to retry")),
                        };
                        match retry {
                            Ok(()) => return, // still pending; wait for the next report
                            Err(retry_err) => {
                                error!("Retry for {key} failed to start: {retry_err:#}");
                            }
                        }
                    } else {
                        error!("Load for {key} failed after retry: {err:#}");
                    }
                    slot.load_pending = false;
                    if let Some(handle) = slot.handle.as_mut() {
                        handle.load_failed = true;
                    }
                    signals.push(Signal::LoadFailed(key.clone()));
                }
            }

            if slot.hibernate_requested {
                slot.hibernate_requested = false;
                self.release_to_hibernated(key, slot);
            }
        }
        self.emit(signals);
    }

    /// Execute a command against the key's live surface.
    ///
    /// Returns `false` when the surface is not live (commands are never
    /// queued against hibernated surfaces). Surface-level failures are
    /// logged, not surfaced: a broken command must not crash the dispatch
    /// pipeline.
    pub fn run_command(&self, key: &ServiceKey, command: &ViewCommand) -> Result<bool> {
        let mut slots = self.slots.lock().unwrap();
        let Some(slot) = slots.get_mut(key) else {
            return Err(HubError::unknown_key(key));
        };
        if slot.lifecycle != ViewLifecycle::Live {
            return Ok(false);
        }
        let Some(handle) = slot.handle.as_mut() else {
            return Ok(false);
        };
        if let Err(err) = handle.surface.run_command(command) {
            warn!("Command {command:?} for {key} failed: {err:#}");
        }
        Ok(true)
    }

    /// Keep lifecycle bookkeeping in step with a committed store snapshot.
    ///
    /// Wire this to [`ServiceStore::subscribe`]. Tracks when services go
    /// idle for the policy, and destroys surfaces whose service was removed
    /// from the store.
    pub fn handle_state_change(&self, state: &StoreState) {
        let now = Utc::now();
        let active = state.active().cloned();
        let previous = {
            let mut last = self.last_active.lock().unwrap();
            std::mem::replace(&mut *last, active.clone())
        };

        if previous != active {
            let mut slots = self.slots.lock().unwrap();
            if let Some(ref key) = previous {
                if let Some(slot) = slots.get_mut(key) {
                    slot.idle_since = Some(now);
                }
            }
            if let Some(ref key) = active {
                if let Some(slot) = slots.get_mut(key) {
                    slot.idle_since = None;
                }
            }
        }

        let removed: Vec<ServiceKey> = self
            .slots
            .lock()
            .unwrap()
            .keys()
            .filter(|key| state.get_service(key).is_none())
            .cloned()
            .collect();
        for key in removed {
            debug!("Service {key} removed from store; destroying surface");
            let _ = self.destroy(&key);
        }
    }

    /// Apply the hibernation policy to every live, inactive surface.
    ///
    /// Pull-based: the owner decides when this runs (a timer tick, an
    /// activity change). Returns the keys whose hibernation was performed
    /// or, for surfaces with a pending load, scheduled.
    pub fn sweep_idle(&self, now: DateTime<Utc>) -> Vec<ServiceKey> {
        let state = self.store.get_state();
        let pins = self.pins.lock().unwrap().clone();
        let candidates: Vec<ServiceKey> = {
            let slots = self.slots.lock().unwrap();
            let live_count = slots
                .values()
                .filter(|slot| slot.lifecycle == ViewLifecycle::Live)
                .count();
            slots
                .iter()
                .filter(|(key, slot)| {
                    slot.lifecycle == ViewLifecycle::Live && !state.is_active(key)
                })
                .filter(|(key, slot)| {
                    let ctx = PolicyContext {
                        idle_since: slot.idle_since,
                        live_count,
                        pinned: pins.contains(*key),
                    };
                    self.policy.should_hibernate(key, &ctx, now)
                })
                .map(|(key, _)| key.clone())
                .collect()
        };

        for key in &candidates {
            if let Err(err) = self.hibernate(key) {
                warn!("Policy hibernation for {key} failed: {err}");
            }
        }
        candidates
    }

    /// Number of currently live surfaces
    pub fn live_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap()
            .values()
            .filter(|slot| slot.lifecycle == ViewLifecycle::Live)
            .count()
    }

    fn surface_spec(&self, key: &ServiceKey) -> Result<SurfaceSpec> {
        let state = self.store.get_state();
        let service = state
            .get_service(key)
            .ok_or_else(|| HubError::unknown_key(key))?;
        Ok(SurfaceSpec {
            url: service.url.clone(),
            preload: service.preload.clone(),
        })
    }

    /// Capture rehydration data and release the surface. Caller holds the
    /// slot lock and has verified the slot is live.
    fn release_to_hibernated(&self, key: &ServiceKey, slot: &mut Slot) {
        let state = self.store.get_state();
        slot.rehydration = state.get_service(key).map(|service| Rehydration {
            was_searching: service.is_searching,
            search_term: service.search_term.clone(),
            search_id: service.search_id,
        });
        if let Some(handle) = slot.handle.as_mut() {
            handle.surface.close();
        }
        slot.handle = None;
        slot.load_pending = false;
        slot.retried = false;
        slot.lifecycle = ViewLifecycle::Hibernated;
    }

    fn emit(&self, signals: Vec<Signal>) {
        let Some(observer) = self.observer.as_ref() else {
            return;
        };
        for signal in signals {
            match signal {
                Signal::Live(key) => observer.surface_live(&key),
                Signal::LoadFailed(key) => observer.surface_load_failed(&key),
            }
        }
    }
}

//! Hub crate - Core state coordination for a multi-service mailbox client
//!
//! Each top-level mailbox hosts one or more embedded services (a default
//! web app, a team/chat sub-service), every one rendered through a
//! heavyweight embedded browsing surface. This crate provides the
//! platform-independent core that keeps those pieces coherent:
//! - Identity model: (mailbox, service-type) keys used for every lookup
//! - Pure service reducers producing immutable state snapshots
//! - The authoritative store with serialized dispatch and subscriptions
//! - The hibernation controller deciding which surfaces stay live
//! - The event bridge translating raw browser events into typed actions
//!
//! Rendering, browser-engine embedding, and external URL routing live in
//! host applications and are reached only through the traits exported here.
//! This crate has zero UI dependencies.

pub mod bridge;
pub mod error;
pub mod hibernate;
pub mod models;
pub mod reducers;
pub mod settings;
pub mod store;

pub use bridge::{
    EventBridge, ExternalOpener, ScriptIntent, SurfaceEvent, SystemOpener, ViewCommand,
    WindowOpenOptions, classify_favicons,
};
pub use error::{HubError, Result};
pub use hibernate::{
    HibernationController, HibernationPolicy, IdleTimeoutPolicy, LifecycleObserver, PolicyContext,
    SurfaceFactory, SurfaceSpec, ViewHandle, ViewLifecycle, ViewSurface, idle_elapsed,
};
pub use models::{
    MailboxConfig, MailboxFamily, MailboxId, MailboxState, SearchId, ServiceConfig, ServiceKey,
    ServiceState, ServiceType, StoreState,
};
pub use reducers::{
    DefaultServiceReducer, ServiceAction, ServiceReducer, TeamServiceReducer, reducer_for,
};
pub use settings::Settings;
pub use store::{ServiceStore, Subscription};

//! The browsing-surface seam
//!
//! The embedded browser engine lives behind these traits; the controller
//! only ever sees them. Loads complete asynchronously: the embedder reports
//! the outcome back through
//! [`HibernationController::notify_load_result`](super::HibernationController::notify_load_result).

use crate::bridge::ViewCommand;
use crate::models::ServiceKey;

/// What to allocate a surface with
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSpec {
    /// Initial load target
    pub url: String,
    /// Guest tooling to inject at load, if the service needs one
    pub preload: Option<String>,
}

/// One live embedded browsing surface
pub trait ViewSurface: Send {
    /// Start loading a URL. Completion is reported by the embedder through
    /// the controller, not by this call.
    fn load_url(&mut self, url: &str) -> anyhow::Result<()>;

    /// Execute a typed command against the surface
    fn run_command(&mut self, command: &ViewCommand) -> anyhow::Result<()>;

    /// Release the surface's underlying resources
    fn close(&mut self);
}

/// Allocates browsing surfaces
pub trait SurfaceFactory: Send + Sync {
    fn create(&self, key: &ServiceKey, spec: &SurfaceSpec) -> anyhow::Result<Box<dyn ViewSurface>>;
}

/// Lifecycle of one service's surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewLifecycle {
    /// No surface has ever been allocated for the key
    Uncreated,
    /// A surface is allocated (possibly still loading, possibly degraded)
    Live,
    /// Resources are released; identity and rehydration data are retained
    Hibernated,
    /// The key is gone; no transition leads out of this state
    Destroyed,
}

/// A live or degraded reference to one browsing surface.
///
/// Handles are owned exclusively by the controller and correlated 1:1 with
/// a `ServiceKey`; other components reach the surface only through commands.
pub struct ViewHandle {
    pub key: ServiceKey,
    pub(crate) surface: Box<dyn ViewSurface>,
    /// Set when the surface exhausted its load retry; the surface stays
    /// allocated so presentation can offer a retry affordance.
    pub load_failed: bool,
}

impl ViewHandle {
    pub(crate) fn new(key: ServiceKey, surface: Box<dyn ViewSurface>) -> Self {
        Self {
            key,
            surface,
            load_failed: false,
        }
    }
}

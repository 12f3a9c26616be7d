//! Outbound commands issued to browsing surfaces and collaborators
//!
//! Script execution on a surface is deliberately closed: the only scripts
//! that can be produced are the two fixed intents in [`ScriptIntent`].
//! There is no way for a caller outside this module to run arbitrary
//! embedded script.

use log::debug;
use serde_json::{Map, Value};

use crate::models::ServiceKey;

/// The two embedded-script intents the bridge is allowed to express
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptIntent {
    /// Focus the service's in-page search field
    FocusSearchField,
    /// Invoke the service's internal deep-link handler
    DeepLink { uri: String },
}

impl ScriptIntent {
    /// Render the intent as the embedded script to execute.
    ///
    /// The interpolated URI is escaped for the single-quoted string it lands
    /// in, so a crafted link cannot break out of the handler call.
    pub fn to_script(&self) -> String {
        match self {
            Self::FocusSearchField => r#"document.querySelector('[name="q"]').focus()"#.to_string(),
            Self::DeepLink { uri } => {
                let escaped = uri.replace('\\', "\\\\").replace('\'', "\\'");
                format!("TS.client.handleDeepLink('{escaped}')")
            }
        }
    }
}

/// Command executed against one browsing surface
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    /// Navigate the surface to a URL
    LoadUrl(String),
    /// Download the target instead of navigating
    Download(String),
    /// Execute one of the fixed script intents
    Script(ScriptIntent),
}

/// Options bag accompanying a new-window request.
///
/// The bag is carried opaquely from the browser surface, except that
/// `webPreferences` is stripped before the bag crosses to a linked content
/// window: carrying it across breaks cross-frame communication with the
/// opener.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowOpenOptions(pub Map<String, Value>);

impl WindowOpenOptions {
    pub fn new(options: Map<String, Value>) -> Self {
        Self(options)
    }

    /// The same bag with the `webPreferences` key removed
    pub fn without_web_preferences(&self) -> Self {
        let mut options = self.0.clone();
        options.remove("webPreferences");
        Self(options)
    }
}

/// External-link collaborator
///
/// Routes URLs that leave the embedded surface: either into a linked content
/// window that shares the service's session, or out to the operating system.
pub trait ExternalOpener: Send + Sync {
    /// Open a linked content window for the given service.
    ///
    /// The options bag has already had `webPreferences` cleared.
    fn open_content_window(
        &self,
        key: &ServiceKey,
        url: &str,
        options: WindowOpenOptions,
    ) -> anyhow::Result<()>;

    /// Hand a URL to an external window/browser
    fn open_external(&self, url: &str) -> anyhow::Result<()>;
}

/// Default opener backed by the operating system.
///
/// Without an embedder there is nothing to host a linked content window in,
/// so content-window requests fall back to an external open.
pub struct SystemOpener;

impl ExternalOpener for SystemOpener {
    fn open_content_window(
        &self,
        key: &ServiceKey,
        url: &str,
        _options: WindowOpenOptions,
    ) -> anyhow::Result<()> {
        debug!("No embedder for content window of {key}; opening externally");
        self.open_external(url)
    }

    fn open_external(&self, url: &str) -> anyhow::Result<()> {
        open::that(url)?;
        Ok(())
    }
}

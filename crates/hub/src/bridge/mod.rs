//! Translation between raw browsing-surface events and the store
//!
//! One `EventBridge` exists per rendered service component. Inbound browser
//! events become store dispatches or typed [`ViewCommand`]s; outbound store
//! intents become surface commands. Every translation is explicit about
//! what it filters: events for another component's key, and favicons that
//! match no known marker, are expected no-ops rather than errors.

mod commands;

pub use commands::{ExternalOpener, ScriptIntent, SystemOpener, ViewCommand, WindowOpenOptions};

use log::{debug, warn};
use std::sync::{Arc, Mutex};
use url::Url;

use crate::error::Result;
use crate::models::{SearchId, ServiceKey, StoreState};
use crate::reducers::ServiceAction;
use crate::settings::Settings;
use crate::store::ServiceStore;

/// Favicon markers signalling unread chat activity. Checked before the base
/// marker, which they contain as a prefix.
const UNREAD_FAVICON_MARKERS: [&str; 2] = ["chat-favicon-new-notif", "chat-favicon-new-non-notif"];

/// Favicon marker for the quiet base icon
const BASE_FAVICON_MARKER: &str = "chat-favicon";

/// File-download host for new-window classification
const DOWNLOAD_HOST: &str = "files.slack.com";

/// Host suffix and path prefix identifying in-app call windows
const CALL_HOST_SUFFIX: &str = ".slack.com";
const CALL_PATH_PREFIX: &str = "/call/";

/// A raw event reported by a browsing surface
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    /// The page's favicon set changed
    FaviconChanged {
        key: ServiceKey,
        favicons: Vec<String>,
    },
    /// The host asked the service to open an item (notification click,
    /// deep link)
    OpenItem {
        key: ServiceKey,
        launch_uri: Option<String>,
        channel_id: Option<String>,
    },
    /// The page requested a new window
    NewWindow {
        key: ServiceKey,
        url: String,
        options: WindowOpenOptions,
    },
}

/// Classify a favicon set against the fixed marker patterns.
///
/// `Some(true)` for an unread marker, `Some(false)` for the quiet base
/// icon, `None` when no marker matches (no action; an expected no-op).
pub fn classify_favicons(favicons: &[String]) -> Option<bool> {
    if favicons
        .iter()
        .any(|favicon| UNREAD_FAVICON_MARKERS.iter().any(|m| favicon.contains(m)))
    {
        return Some(true);
    }
    if favicons
        .iter()
        .any(|favicon| favicon.contains(BASE_FAVICON_MARKER))
    {
        return Some(false);
    }
    None
}

/// Per-component translator between one surface and the store
pub struct EventBridge {
    key: ServiceKey,
    store: Arc<ServiceStore>,
    settings: Settings,
    opener: Arc<dyn ExternalOpener>,
    /// Last observed (is_searching, search_id) pair, for detecting new
    /// search sessions and discarding stale ones
    last_search: Mutex<(bool, Option<SearchId>)>,
}

impl EventBridge {
    pub fn new(
        key: ServiceKey,
        store: Arc<ServiceStore>,
        settings: Settings,
        opener: Arc<dyn ExternalOpener>,
    ) -> Self {
        Self {
            key,
            store,
            settings,
            opener,
            last_search: Mutex::new((false, None)),
        }
    }

    /// The key this bridge translates for
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Translate one inbound surface event.
    ///
    /// Returns the command to execute on this component's surface, if the
    /// event called for one. Store dispatches and collaborator calls happen
    /// as side effects. Events for another component's key are ignored.
    pub fn handle_event(&self, event: &SurfaceEvent) -> Result<Option<ViewCommand>> {
        match event {
            SurfaceEvent::FaviconChanged { key, favicons } => {
                if *key != self.key {
                    debug!("Ignoring favicon event for {key}");
                    return Ok(None);
                }
                if let Some(has_unread) = classify_favicons(favicons) {
                    self.store.dispatch(
                        &self.key,
                        ServiceAction::SetHasUnreadActivity { has_unread },
                    )?;
                }
                Ok(None)
            }
            SurfaceEvent::OpenItem {
                key,
                launch_uri,
                channel_id,
            } => {
                if *key != self.key {
                    debug!("Ignoring open-item event for {key}");
                    return Ok(None);
                }
                Ok(self.open_item_command(launch_uri.as_deref(), channel_id.as_deref()))
            }
            SurfaceEvent::NewWindow { key, url, options } => {
                if *key != self.key {
                    debug!("Ignoring new-window event for {key}");
                    return Ok(None);
                }
                Ok(self.new_window_command(url, options))
            }
        }
    }

    /// Pick the command for a matching open-item event: deep link when the
    /// event carries a target, plain navigation to the service's base URL
    /// otherwise.
    fn open_item_command(
        &self,
        launch_uri: Option<&str>,
        channel_id: Option<&str>,
    ) -> Option<ViewCommand> {
        let state = self.store.get_state();
        let service = state.get_service(&self.key)?;

        if let Some(uri) = launch_uri {
            return Some(ViewCommand::Script(ScriptIntent::DeepLink {
                uri: uri.to_string(),
            }));
        }
        if let Some(channel) = channel_id {
            let team = service.auth_team_id.as_deref().unwrap_or_default();
            let uri = format!(
                "slack://channel?id={}&team={}",
                urlencoding::encode(channel),
                urlencoding::encode(team)
            );
            return Some(ViewCommand::Script(ScriptIntent::DeepLink { uri }));
        }
        Some(ViewCommand::LoadUrl(service.url.clone()))
    }

    /// Classify a new-window request by its target URL.
    ///
    /// File-download hosts become a download command for this surface;
    /// recognized in-app call windows open as linked content windows (with
    /// the `webPreferences` override stripped, since carrying it across
    /// breaks cross-frame communication); everything else opens externally. With
    /// the experimental opener enabled the whole event is delegated
    /// unclassified.
    fn new_window_command(&self, raw_url: &str, options: &WindowOpenOptions) -> Option<ViewCommand> {
        if self.settings.use_experimental_window_opener {
            if let Err(err) = self.opener.open_external(raw_url) {
                warn!("Experimental opener failed for {raw_url}: {err:#}");
            }
            return None;
        }

        let url = match Url::parse(raw_url) {
            Ok(url) => url,
            Err(err) => {
                warn!("Dropping new-window request with malformed URL {raw_url}: {err}");
                return None;
            }
        };
        let host = url.host_str().unwrap_or_default();

        if host == DOWNLOAD_HOST {
            return Some(ViewCommand::Download(raw_url.to_string()));
        }
        if host.ends_with(CALL_HOST_SUFFIX) && url.path().starts_with(CALL_PATH_PREFIX) {
            let cleaned = options.without_web_preferences();
            if let Err(err) = self.opener.open_content_window(&self.key, raw_url, cleaned) {
                warn!("Content window for {raw_url} failed: {err:#}");
            }
            return None;
        }
        if let Err(err) = self.opener.open_external(raw_url) {
            warn!("External open for {raw_url} failed: {err:#}");
        }
        None
    }

    /// React to a committed store snapshot.
    ///
    /// When a new search session opens on this bridge's (active) service,
    /// returns the focus command for its surface and defers the untrack so
    /// the session is consumed after the current tick. Snapshots repeating
    /// an already-observed search token produce nothing.
    pub fn handle_state_change(&self, state: &StoreState) -> Option<ViewCommand> {
        let is_active = state.is_active(&self.key);
        let is_searching = state.is_searching_mailbox(&self.key);
        let search_id = state.mailbox_search_hash(&self.key);

        let changed = {
            let mut last = self.last_search.lock().unwrap();
            let changed = is_searching != last.0 || search_id != last.1;
            *last = (is_searching, search_id);
            changed
        };

        if is_active && changed && is_searching {
            self.store.defer(&self.key, ServiceAction::UntrackSearching);
            return Some(ViewCommand::Script(ScriptIntent::FocusSearchField));
        }
        None
    }
}

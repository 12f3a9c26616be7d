//! Per-service state snapshot
//!
//! A `ServiceState` is immutable: reducers never modify one in place, they
//! produce a replacement with the affected fields changed. Holders of an old
//! snapshot keep a valid value for as long as they need it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::SearchId;

/// Immutable application state of one embedded service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    /// Unread items reported by the service
    pub unread_count: u32,
    /// When the unread count was last reported. Refreshed on every report,
    /// including reports that repeat the previous count.
    pub unread_count_update_time: DateTime<Utc>,
    /// Whether the service is signalling unread activity (e.g. a badge
    /// favicon) independent of a counted value
    pub has_unread_activity: bool,
    /// Whether a search session is open on this service
    pub is_searching: bool,
    /// Current search term; empty when not searching
    pub search_term: String,
    /// Token for the open search session, cleared on untrack
    pub search_id: Option<SearchId>,
    /// High-water mark of issued search tokens. Survives untrack so the next
    /// session's token is strictly greater.
    pub search_seq: u64,
    /// Team/workspace token used for deep links into the service
    pub auth_team_id: Option<String>,
    /// The service's base load target
    pub url: String,
    /// Identifier of the guest tooling injected into the surface at load,
    /// if the service needs one
    pub preload: Option<String>,
}

impl ServiceState {
    /// Create the initial state for a freshly configured service
    pub fn new(url: impl Into<String>, preload: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            unread_count: 0,
            unread_count_update_time: now,
            has_unread_activity: false,
            is_searching: false,
            search_term: String::new(),
            search_id: None,
            search_seq: 0,
            auth_team_id: None,
            url: url.into(),
            preload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let now = Utc::now();
        let state = ServiceState::new("https://example.slack.com", None, now);
        assert_eq!(state.unread_count, 0);
        assert_eq!(state.unread_count_update_time, now);
        assert!(!state.has_unread_activity);
        assert!(!state.is_searching);
        assert!(state.search_id.is_none());
        assert_eq!(state.search_seq, 0);
        assert_eq!(state.url, "https://example.slack.com");
    }
}

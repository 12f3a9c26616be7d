//! Pure state transitions for service snapshots
//!
//! A reducer computes a replacement `ServiceState` from the previous one
//! plus an action payload. Reducers never mutate their input, never retain a
//! reference to it, and never read the clock themselves (the store injects
//! `now`), so applying one is a pure value computation.
//!
//! One reducer variant exists per service type, all conforming to the shared
//! contract carried by [`ServiceReducer`]'s default methods. The store picks
//! the variant with [`reducer_for`], so it can dispatch generically without
//! knowing the concrete family.

mod default;
mod team;

pub use default::DefaultServiceReducer;
pub use team::TeamServiceReducer;

use chrono::{DateTime, Utc};

use crate::error::{HubError, Result};
use crate::models::{SearchId, ServiceState, ServiceType};

/// Action payload applied to one service state
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceAction {
    /// Report the unread count. Counts arrive from browser-side payloads,
    /// so the input is signed and validated at the boundary.
    SetUnreadCount { count: i64 },
    /// Set or clear the unread-activity flag
    SetHasUnreadActivity { has_unread: bool },
    /// Open a search session with an optional initial term
    TrackSearching { term: Option<String> },
    /// Close the search session
    UntrackSearching,
    /// Record the team/workspace token used for deep links
    SetAuthTeamId { team_id: Option<String> },
}

impl ServiceAction {
    /// Validate the payload without touching any state.
    ///
    /// Called synchronously at dispatch submission so a caller bug fails
    /// fast, before the transition is queued.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::SetUnreadCount { count } if u32::try_from(*count).is_err() => Err(
                HubError::invalid_argument(format!("unread count must be >= 0, got {count}")),
            ),
            _ => Ok(()),
        }
    }
}

/// Shared reducer contract
///
/// The default methods are the base behavior; variants override only where
/// their service family genuinely differs.
pub trait ServiceReducer: Send + Sync {
    /// Apply one action, routing to the matching operation
    fn reduce(
        &self,
        state: &ServiceState,
        action: &ServiceAction,
        now: DateTime<Utc>,
    ) -> Result<ServiceState> {
        match action {
            ServiceAction::SetUnreadCount { count } => self.set_unread_count(state, *count, now),
            ServiceAction::SetHasUnreadActivity { has_unread } => {
                self.set_has_unread_activity(state, *has_unread)
            }
            ServiceAction::TrackSearching { term } => self.track_searching(state, term.as_deref()),
            ServiceAction::UntrackSearching => self.untrack_searching(state),
            ServiceAction::SetAuthTeamId { team_id } => {
                self.set_auth_team_id(state, team_id.as_deref())
            }
        }
    }

    /// Record a reported unread count.
    ///
    /// The update time refreshes on every report, including a repeat of the
    /// previous count: it tracks when the counter was last reported, not
    /// when it last changed.
    fn set_unread_count(
        &self,
        state: &ServiceState,
        count: i64,
        now: DateTime<Utc>,
    ) -> Result<ServiceState> {
        let count = u32::try_from(count).map_err(|_| {
            HubError::invalid_argument(format!("unread count must be >= 0, got {count}"))
        })?;
        Ok(ServiceState {
            unread_count: count,
            unread_count_update_time: now,
            ..state.clone()
        })
    }

    /// Set or clear the unread-activity flag; every other field is carried
    /// over unchanged.
    fn set_has_unread_activity(
        &self,
        state: &ServiceState,
        has_unread: bool,
    ) -> Result<ServiceState> {
        Ok(ServiceState {
            has_unread_activity: has_unread,
            ..state.clone()
        })
    }

    /// Open a search session.
    ///
    /// A fresh token is issued only on the transition into a searching
    /// state; tracking again while already searching updates the term and
    /// keeps the session token.
    fn track_searching(&self, state: &ServiceState, term: Option<&str>) -> Result<ServiceState> {
        let (search_id, search_seq) = if state.is_searching {
            (state.search_id, state.search_seq)
        } else {
            let next = state.search_seq + 1;
            (Some(SearchId(next)), next)
        };
        Ok(ServiceState {
            is_searching: true,
            search_term: term.unwrap_or_default().to_string(),
            search_id,
            search_seq,
            ..state.clone()
        })
    }

    /// Close the search session. The token is cleared, never regenerated;
    /// the sequence high-water mark survives so the next session's token is
    /// strictly greater.
    fn untrack_searching(&self, state: &ServiceState) -> Result<ServiceState> {
        Ok(ServiceState {
            is_searching: false,
            search_term: String::new(),
            search_id: None,
            ..state.clone()
        })
    }

    /// Record the team/workspace token used to build deep links
    fn set_auth_team_id(
        &self,
        state: &ServiceState,
        team_id: Option<&str>,
    ) -> Result<ServiceState> {
        Ok(ServiceState {
            auth_team_id: team_id.map(str::to_string),
            ..state.clone()
        })
    }
}

static DEFAULT_REDUCER: DefaultServiceReducer = DefaultServiceReducer;
static TEAM_REDUCER: TeamServiceReducer = TeamServiceReducer;

/// The reducer variant for the given service type
pub fn reducer_for(service_type: ServiceType) -> &'static dyn ServiceReducer {
    match service_type {
        ServiceType::Default => &DEFAULT_REDUCER,
        ServiceType::Team => &TEAM_REDUCER,
    }
}

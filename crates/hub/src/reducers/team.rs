//! Reducer for team/chat sub-services

use super::ServiceReducer;
use crate::error::Result;
use crate::models::ServiceState;

/// Reducer for [`ServiceType::Team`](crate::models::ServiceType) slots.
///
/// Team sub-services authenticate through their parent mailbox session and
/// carry no workspace token of their own, so the auth-team operation is a
/// state-preserving no-op.
pub struct TeamServiceReducer;

impl ServiceReducer for TeamServiceReducer {
    fn set_auth_team_id(
        &self,
        state: &ServiceState,
        _team_id: Option<&str>,
    ) -> Result<ServiceState> {
        Ok(state.clone())
    }
}

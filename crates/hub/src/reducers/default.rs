//! Reducer for a mailbox's primary web service

use super::ServiceReducer;

/// Reducer for [`ServiceType::Default`](crate::models::ServiceType) slots.
///
/// The primary service carries the full shared contract, including the
/// team/workspace token its deep links are built from.
pub struct DefaultServiceReducer;

impl ServiceReducer for DefaultServiceReducer {}

//! Error taxonomy for the hub core
//!
//! Reducer and store errors are not recovered internally; they surface
//! synchronously to the dispatch caller. Surface load failures are retried
//! once by the hibernation controller and then downgraded to an observable
//! `load_failed` flag instead of an error.

/// Errors surfaced by the hub core
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Malformed reducer or store input. Caller bug; fails fast, never retried.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A dispatch or query named a service key that is not configured.
    #[error("Unknown service key: {key}")]
    UnknownServiceKey { key: String },

    /// Identity construction failed (unsupported service type for the
    /// mailbox family, or a malformed mailbox id).
    #[error("Invalid service key: {message}")]
    InvalidServiceKey { message: String },

    /// A browsing surface failed to load after the automatic retry.
    #[error("View load failed: {key}")]
    ViewLoadFailed { key: String },
}

impl HubError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn unknown_key(key: impl ToString) -> Self {
        Self::UnknownServiceKey {
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidServiceKey {
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, HubError>;

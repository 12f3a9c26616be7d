//! Identity types for mailboxes and their embedded services
//!
//! A `ServiceKey` is the composite identity every map in the store and the
//! hibernation controller is keyed by. Construction is the only validation
//! point: the mailbox family gates which service types a key may name.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HubError, Result};

/// Opaque stable identifier for one mailbox/account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailboxId(pub String);

impl MailboxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MailboxId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MailboxId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for MailboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Embedded service slot within a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    /// The mailbox's primary web app
    Default,
    /// A team/chat sub-service hosted alongside the primary app
    Team,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Team => f.write_str("team"),
        }
    }
}

/// Provider family a mailbox belongs to
///
/// The family determines which service types the mailbox hosts: Slack
/// exposes only the primary app, while Google and Microsoft mailboxes also
/// carry a team/chat sub-service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MailboxFamily {
    Google,
    Microsoft,
    Slack,
}

impl MailboxFamily {
    /// Service types this family hosts
    pub fn supported_services(&self) -> &'static [ServiceType] {
        match self {
            Self::Google | Self::Microsoft => &[ServiceType::Default, ServiceType::Team],
            Self::Slack => &[ServiceType::Default],
        }
    }

    /// Whether the family hosts the given service type
    pub fn supports(&self, service_type: ServiceType) -> bool {
        self.supported_services().contains(&service_type)
    }
}

impl fmt::Display for MailboxFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google => f.write_str("google"),
            Self::Microsoft => f.write_str("microsoft"),
            Self::Slack => f.write_str("slack"),
        }
    }
}

/// Composite identity of one (mailbox, service) pair
///
/// Unique across the whole store; the sole key for every lookup. There is no
/// way to build a partial or unchecked key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceKey {
    pub mailbox_id: MailboxId,
    pub service_type: ServiceType,
}

impl ServiceKey {
    /// Build a key for a service the mailbox family actually hosts.
    ///
    /// Fails with [`HubError::InvalidServiceKey`] on an empty mailbox id or
    /// a service type the family does not support.
    pub fn new(
        family: MailboxFamily,
        mailbox_id: impl Into<MailboxId>,
        service_type: ServiceType,
    ) -> Result<Self> {
        let mailbox_id = mailbox_id.into();
        if mailbox_id.as_str().is_empty() {
            return Err(HubError::invalid_key("mailbox id must not be empty"));
        }
        if !family.supports(service_type) {
            return Err(HubError::invalid_key(format!(
                "{family} mailboxes have no {service_type} service"
            )));
        }
        Ok(Self {
            mailbox_id,
            service_type,
        })
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mailbox_id, self.service_type)
    }
}

/// Opaque token identifying one search session on one service
///
/// Tokens are strictly increasing per service, so a stale asynchronous
/// search event can be detected by value mismatch and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchId(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality_is_structural() {
        let a = ServiceKey::new(MailboxFamily::Google, "m1", ServiceType::Team).unwrap();
        let b = ServiceKey::new(MailboxFamily::Google, "m1", ServiceType::Team).unwrap();
        assert_eq!(a, b);

        let c = ServiceKey::new(MailboxFamily::Google, "m1", ServiceType::Default).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_slack_has_no_team_service() {
        let err = ServiceKey::new(MailboxFamily::Slack, "m1", ServiceType::Team).unwrap_err();
        assert!(matches!(err, crate::HubError::InvalidServiceKey { .. }));
    }

    #[test]
    fn test_empty_mailbox_id_rejected() {
        let err = ServiceKey::new(MailboxFamily::Slack, "", ServiceType::Default).unwrap_err();
        assert!(matches!(err, crate::HubError::InvalidServiceKey { .. }));
    }

    #[test]
    fn test_family_service_sets() {
        assert!(MailboxFamily::Google.supports(ServiceType::Team));
        assert!(MailboxFamily::Microsoft.supports(ServiceType::Team));
        assert!(!MailboxFamily::Slack.supports(ServiceType::Team));
        assert!(MailboxFamily::Slack.supports(ServiceType::Default));
    }

    #[test]
    fn test_key_display() {
        let key = ServiceKey::new(MailboxFamily::Slack, "m1", ServiceType::Default).unwrap();
        assert_eq!(key.to_string(), "m1:default");
    }
}

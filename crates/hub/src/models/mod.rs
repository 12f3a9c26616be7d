//! Domain models for mailboxes, services, and their identities

mod identity;
mod mailbox;
mod service;

pub use identity::{MailboxFamily, MailboxId, SearchId, ServiceKey, ServiceType};
pub use mailbox::{MailboxConfig, MailboxState, ServiceConfig, StoreState};
pub use service::ServiceState;

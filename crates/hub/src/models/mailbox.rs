//! Mailbox aggregation and the immutable store root
//!
//! `StoreState` is the value handed to every subscriber and query. A new
//! root is produced for each committed transition; services untouched by a
//! transition stay shared (`Arc`) between the old and new root.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use super::identity::{MailboxFamily, MailboxId, SearchId, ServiceKey, ServiceType};
use super::service::ServiceState;
use crate::error::{HubError, Result};

/// Configuration for one embedded service at mailbox setup time
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_type: ServiceType,
    /// Base load target for the service's browsing surface
    pub url: String,
    /// Optional guest tooling identifier injected at surface load
    pub preload: Option<String>,
}

impl ServiceConfig {
    pub fn new(service_type: ServiceType, url: impl Into<String>) -> Self {
        Self {
            service_type,
            url: url.into(),
            preload: None,
        }
    }

    pub fn with_preload(mut self, preload: impl Into<String>) -> Self {
        self.preload = Some(preload.into());
        self
    }
}

/// Configuration for one mailbox and its services
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub id: MailboxId,
    pub family: MailboxFamily,
    pub services: Vec<ServiceConfig>,
}

impl MailboxConfig {
    pub fn new(id: impl Into<MailboxId>, family: MailboxFamily) -> Self {
        Self {
            id: id.into(),
            family,
            services: Vec::new(),
        }
    }

    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.services.push(service);
        self
    }
}

/// State of one mailbox: its family plus zero or more service states
#[derive(Debug, Clone)]
pub struct MailboxState {
    pub id: MailboxId,
    pub family: MailboxFamily,
    services: HashMap<ServiceType, Arc<ServiceState>>,
}

impl MailboxState {
    /// Build a mailbox state from its configuration, validating each
    /// service slot against the family.
    pub(crate) fn from_config(config: &MailboxConfig, now: DateTime<Utc>) -> Result<Self> {
        let mut services = HashMap::new();
        for service in &config.services {
            // Key construction is the validation point for the pairing.
            ServiceKey::new(config.family, config.id.clone(), service.service_type)?;
            if services
                .insert(
                    service.service_type,
                    Arc::new(ServiceState::new(
                        service.url.clone(),
                        service.preload.clone(),
                        now,
                    )),
                )
                .is_some()
            {
                return Err(HubError::invalid_argument(format!(
                    "duplicate {} service for mailbox {}",
                    service.service_type, config.id
                )));
            }
        }
        Ok(Self {
            id: config.id.clone(),
            family: config.family,
            services,
        })
    }

    /// State of one service, if the mailbox hosts it
    pub fn service(&self, service_type: ServiceType) -> Option<&Arc<ServiceState>> {
        self.services.get(&service_type)
    }

    /// Service types this mailbox hosts
    pub fn service_types(&self) -> impl Iterator<Item = ServiceType> + '_ {
        self.services.keys().copied()
    }

    pub(crate) fn replace_service(&mut self, service_type: ServiceType, state: ServiceState) {
        self.services.insert(service_type, Arc::new(state));
    }
}

/// Immutable root of the whole store
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    mailboxes: HashMap<MailboxId, MailboxState>,
    /// The service the user is currently viewing, if any
    active: Option<ServiceKey>,
}

impl StoreState {
    /// Look up one mailbox
    pub fn get_mailbox(&self, id: &MailboxId) -> Option<&MailboxState> {
        self.mailboxes.get(id)
    }

    /// Look up one service state
    pub fn get_service(&self, key: &ServiceKey) -> Option<&Arc<ServiceState>> {
        self.mailboxes
            .get(&key.mailbox_id)?
            .service(key.service_type)
    }

    /// All configured mailboxes
    pub fn mailboxes(&self) -> impl Iterator<Item = &MailboxState> {
        self.mailboxes.values()
    }

    /// The globally active service key, if any
    pub fn active(&self) -> Option<&ServiceKey> {
        self.active.as_ref()
    }

    /// Whether the given key is the one the user is currently viewing
    pub fn is_active(&self, key: &ServiceKey) -> bool {
        self.active.as_ref() == Some(key)
    }

    /// Whether a search session is open on the given service
    pub fn is_searching_mailbox(&self, key: &ServiceKey) -> bool {
        self.get_service(key).is_some_and(|s| s.is_searching)
    }

    /// Current search term for the given service; empty when not searching
    pub fn mailbox_search_term(&self, key: &ServiceKey) -> Option<String> {
        self.get_service(key).map(|s| s.search_term.clone())
    }

    /// Token of the open search session for the given service
    pub fn mailbox_search_hash(&self, key: &ServiceKey) -> Option<SearchId> {
        self.get_service(key).and_then(|s| s.search_id)
    }

    pub(crate) fn with_mailbox(&self, mailbox: MailboxState) -> Result<Self> {
        if self.mailboxes.contains_key(&mailbox.id) {
            return Err(HubError::invalid_argument(format!(
                "mailbox {} is already configured",
                mailbox.id
            )));
        }
        let mut next = self.clone();
        next.mailboxes.insert(mailbox.id.clone(), mailbox);
        Ok(next)
    }

    pub(crate) fn without_mailbox(&self, id: &MailboxId) -> Result<Self> {
        if !self.mailboxes.contains_key(id) {
            return Err(HubError::unknown_key(id));
        }
        let mut next = self.clone();
        next.mailboxes.remove(id);
        // The active pointer must never dangle.
        if next
            .active
            .as_ref()
            .is_some_and(|key| &key.mailbox_id == id)
        {
            next.active = None;
        }
        Ok(next)
    }

    pub(crate) fn with_active(&self, key: Option<ServiceKey>) -> Result<Self> {
        if let Some(ref key) = key {
            if self.get_service(key).is_none() {
                return Err(HubError::unknown_key(key));
            }
        }
        let mut next = self.clone();
        next.active = key;
        Ok(next)
    }

    pub(crate) fn with_service(&self, key: &ServiceKey, state: ServiceState) -> Result<Self> {
        let mut next = self.clone();
        let mailbox = next
            .mailboxes
            .get_mut(&key.mailbox_id)
            .ok_or_else(|| HubError::unknown_key(key))?;
        if mailbox.service(key.service_type).is_none() {
            return Err(HubError::unknown_key(key));
        }
        mailbox.replace_service(key.service_type, state);
        Ok(next)
    }
}

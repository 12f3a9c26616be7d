//! Hibernation policy
//!
//! The controller enforces the lifecycle state machine and resource
//! bookkeeping; *when* a live surface should hibernate is a pluggable
//! predicate so hosts can trade memory against resume latency.

use chrono::{DateTime, Utc};

use crate::models::ServiceKey;

/// What a policy gets to look at for one live, inactive surface
#[derive(Debug, Clone)]
pub struct PolicyContext {
    /// When the service stopped being the active one (`None` if it has
    /// been inactive since creation)
    pub idle_since: Option<DateTime<Utc>>,
    /// Live surfaces currently allocated, across all keys
    pub live_count: usize,
    /// Whether the user pinned this service to stay live
    pub pinned: bool,
}

/// Decides whether one live, inactive surface should hibernate
pub trait HibernationPolicy: Send + Sync {
    fn should_hibernate(&self, key: &ServiceKey, ctx: &PolicyContext, now: DateTime<Utc>) -> bool;
}

/// Check if a surface has been idle long enough to hibernate.
///
/// # Arguments
/// * `idle_since` - When the surface stopped being active (None if it was
///   never active, which counts as idle from the start)
/// * `idle_secs` - Minimum seconds of inactivity before hibernation
pub fn idle_elapsed(idle_since: Option<DateTime<Utc>>, idle_secs: u64, now: DateTime<Utc>) -> bool {
    match idle_since {
        Some(since) => (now - since).num_seconds() >= idle_secs as i64,
        None => true,
    }
}

/// Default policy: hibernate after a fixed idle period, or immediately when
/// the live-surface budget is exceeded. Pinned surfaces never hibernate.
pub struct IdleTimeoutPolicy {
    /// Seconds of inactivity after which a surface hibernates
    pub idle_secs: u64,
    /// Maximum surfaces to keep live; beyond it, idle surfaces hibernate
    /// regardless of how recently they were active
    pub max_live: usize,
}

impl Default for IdleTimeoutPolicy {
    fn default() -> Self {
        Self {
            idle_secs: 300,
            max_live: 4,
        }
    }
}

impl HibernationPolicy for IdleTimeoutPolicy {
    fn should_hibernate(&self, _key: &ServiceKey, ctx: &PolicyContext, now: DateTime<Utc>) -> bool {
        if ctx.pinned {
            return false;
        }
        if ctx.live_count > self.max_live {
            return true;
        }
        idle_elapsed(ctx.idle_since, self.idle_secs, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MailboxFamily, ServiceType};
    use chrono::Duration;

    fn key() -> ServiceKey {
        ServiceKey::new(MailboxFamily::Slack, "m1", ServiceType::Default).unwrap()
    }

    #[test]
    fn test_idle_elapsed_never_active() {
        let now = Utc::now();
        assert!(idle_elapsed(None, 300, now));
        assert!(idle_elapsed(None, 0, now));
    }

    #[test]
    fn test_idle_elapsed_recently_active() {
        let now = Utc::now();
        assert!(!idle_elapsed(Some(now - Duration::seconds(10)), 300, now));
    }

    #[test]
    fn test_idle_elapsed_boundary() {
        let now = Utc::now();
        assert!(idle_elapsed(Some(now - Duration::seconds(300)), 300, now));
        assert!(idle_elapsed(Some(now - Duration::hours(2)), 300, now));
    }

    #[test]
    fn test_pinned_never_hibernates() {
        let policy = IdleTimeoutPolicy::default();
        let now = Utc::now();
        let ctx = PolicyContext {
            idle_since: Some(now - Duration::hours(1)),
            live_count: 100,
            pinned: true,
        };
        assert!(!policy.should_hibernate(&key(), &ctx, now));
    }

    #[test]
    fn test_budget_overrides_idle_window() {
        let policy = IdleTimeoutPolicy {
            idle_secs: 300,
            max_live: 2,
        };
        let now = Utc::now();
        let ctx = PolicyContext {
            idle_since: Some(now - Duration::seconds(1)),
            live_count: 3,
            pinned: false,
        };
        assert!(policy.should_hibernate(&key(), &ctx, now));
    }

    #[test]
    fn test_within_budget_and_window_stays_live() {
        let policy = IdleTimeoutPolicy::default();
        let now = Utc::now();
        let ctx = PolicyContext {
            idle_since: Some(now - Duration::seconds(30)),
            live_count: 2,
            pinned: false,
        };
        assert!(!policy.should_hibernate(&key(), &ctx, now));
    }
}

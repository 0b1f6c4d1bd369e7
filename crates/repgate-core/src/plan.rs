//! Plan tier entitlements.
//!
//! The engine only reads two facts from the subscription layer: how many apps
//! may be blocked and whether emergency unlocks are available. Billing lives
//! elsewhere.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on the blocked-app registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "max")]
pub enum AppLimit {
    Bounded(usize),
    Unbounded,
}

impl fmt::Display for AppLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppLimit::Bounded(max) => write!(f, "{max}"),
            AppLimit::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Read-only entitlement source.
pub trait PlanResolver {
    fn max_blocked_apps(&self) -> AppLimit;
    fn emergency_unlock_allowed(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
}

/// Entitlements resolved from a locally known tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPlan {
    pub tier: PlanTier,
    pub free_max_blocked_apps: usize,
    pub free_emergency_unlock: bool,
}

impl StaticPlan {
    pub fn free(max_blocked_apps: usize) -> Self {
        Self {
            tier: PlanTier::Free,
            free_max_blocked_apps: max_blocked_apps,
            free_emergency_unlock: false,
        }
    }

    pub fn pro() -> Self {
        Self {
            tier: PlanTier::Pro,
            free_max_blocked_apps: 3,
            free_emergency_unlock: false,
        }
    }
}

impl PlanResolver for StaticPlan {
    fn max_blocked_apps(&self) -> AppLimit {
        match self.tier {
            PlanTier::Free => AppLimit::Bounded(self.free_max_blocked_apps),
            PlanTier::Pro => AppLimit::Unbounded,
        }
    }

    fn emergency_unlock_allowed(&self) -> bool {
        match self.tier {
            PlanTier::Free => self.free_emergency_unlock,
            PlanTier::Pro => true,
        }
    }
}

impl<P: PlanResolver + ?Sized> PlanResolver for &P {
    fn max_blocked_apps(&self) -> AppLimit {
        (**self).max_blocked_apps()
    }

    fn emergency_unlock_allowed(&self) -> bool {
        (**self).emergency_unlock_allowed()
    }
}

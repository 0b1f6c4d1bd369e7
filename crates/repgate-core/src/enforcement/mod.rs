//! Enforcement gateway boundary.
//!
//! The OS mechanism that actually blocks app launches differs per platform.
//! Each platform is one implementation of [`EnforcementGateway`]; the engine
//! only ever hands it allow/deny directives for a set of identifiers and
//! trusts the acknowledgement.

mod file;
mod memory;

use std::collections::BTreeSet;

pub use file::{FileGateway, RestrictionFile};
pub use memory::{GatewayCall, MemoryGateway};

use crate::error::GatewayError;

pub trait EnforcementGateway {
    /// Block launching every app in `app_ids`.
    fn apply_restriction(&mut self, app_ids: &BTreeSet<String>) -> Result<(), GatewayError>;

    /// Lift the restriction on every app in `app_ids`.
    fn clear_restriction(&mut self, app_ids: &BTreeSet<String>) -> Result<(), GatewayError>;

    /// Whether the platform currently grants restriction permission.
    fn is_authorized(&self) -> bool;
}

impl<G: EnforcementGateway + ?Sized> EnforcementGateway for Box<G> {
    fn apply_restriction(&mut self, app_ids: &BTreeSet<String>) -> Result<(), GatewayError> {
        (**self).apply_restriction(app_ids)
    }

    fn clear_restriction(&mut self, app_ids: &BTreeSet<String>) -> Result<(), GatewayError> {
        (**self).clear_restriction(app_ids)
    }

    fn is_authorized(&self) -> bool {
        (**self).is_authorized()
    }
}

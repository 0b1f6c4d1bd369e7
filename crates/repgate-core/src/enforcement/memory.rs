use std::collections::BTreeSet;

use super::EnforcementGateway;
use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Apply(BTreeSet<String>),
    Clear(BTreeSet<String>),
}

/// In-process gateway that tracks the restricted set and records every call.
///
/// Hosts that bridge to a platform API on their own poll `restricted()`.
#[derive(Debug, Clone)]
pub struct MemoryGateway {
    authorized: bool,
    restricted: BTreeSet<String>,
    calls: Vec<GatewayCall>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self {
            authorized: true,
            restricted: BTreeSet::new(),
            calls: Vec::new(),
        }
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_authorized(&mut self, authorized: bool) {
        self.authorized = authorized;
    }

    pub fn restricted(&self) -> &BTreeSet<String> {
        &self.restricted
    }

    pub fn calls(&self) -> &[GatewayCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GatewayCall> {
        std::mem::take(&mut self.calls)
    }
}

impl EnforcementGateway for MemoryGateway {
    fn apply_restriction(&mut self, app_ids: &BTreeSet<String>) -> Result<(), GatewayError> {
        if !self.authorized {
            return Err(GatewayError::NotAuthorized);
        }
        self.restricted.extend(app_ids.iter().cloned());
        self.calls.push(GatewayCall::Apply(app_ids.clone()));
        Ok(())
    }

    fn clear_restriction(&mut self, app_ids: &BTreeSet<String>) -> Result<(), GatewayError> {
        if !self.authorized {
            return Err(GatewayError::NotAuthorized);
        }
        self.restricted.retain(|id| !app_ids.contains(id));
        self.calls.push(GatewayCall::Clear(app_ids.clone()));
        Ok(())
    }

    fn is_authorized(&self) -> bool {
        self.authorized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn apply_and_clear_track_restricted_set() {
        let mut gw = MemoryGateway::new();
        gw.apply_restriction(&ids(&["a", "b"])).unwrap();
        gw.clear_restriction(&ids(&["a"])).unwrap();
        assert_eq!(gw.restricted(), &ids(&["b"]));
        assert_eq!(gw.calls().len(), 2);
    }

    #[test]
    fn unauthorized_rejects_without_recording() {
        let mut gw = MemoryGateway::new();
        gw.set_authorized(false);
        assert!(matches!(
            gw.apply_restriction(&ids(&["a"])),
            Err(GatewayError::NotAuthorized)
        ));
        assert!(gw.calls().is_empty());
        assert!(gw.restricted().is_empty());
    }
}

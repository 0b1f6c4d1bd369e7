//! Blocked-app registry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{UnlockError, ValidationError};
use crate::plan::AppLimit;

/// Opaque application identifiers under enforcement.
///
/// Ordered so the set serializes and reaches the gateway deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockedAppSet {
    apps: BTreeSet<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error(transparent)]
    Limit(#[from] UnlockError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl From<RegistryError> for crate::error::CoreError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Limit(e) => e.into(),
            RegistryError::Invalid(e) => e.into(),
        }
    }
}

impl BlockedAppSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `app_id`. Returns `false` if it was already present.
    ///
    /// # Errors
    /// `LimitExceeded` if the set would grow past `limit`; the set is left
    /// unchanged.
    pub fn add(&mut self, app_id: &str, limit: AppLimit) -> Result<bool, RegistryError> {
        let app_id = app_id.trim();
        if app_id.is_empty() {
            return Err(ValidationError::EmptyAppId.into());
        }
        if self.apps.contains(app_id) {
            return Ok(false);
        }
        let attempted = self.apps.len() + 1;
        if let AppLimit::Bounded(max) = limit {
            if attempted > max {
                return Err(UnlockError::LimitExceeded {
                    limit: max,
                    attempted,
                }
                .into());
            }
        }
        Ok(self.apps.insert(app_id.to_string()))
    }

    /// Remove `app_id`. Returns `false` if it was not present.
    pub fn remove(&mut self, app_id: &str) -> bool {
        self.apps.remove(app_id.trim())
    }

    pub fn contains(&self, app_id: &str) -> bool {
        self.apps.contains(app_id.trim())
    }

    pub fn all(&self) -> &BTreeSet<String> {
        &self.apps
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

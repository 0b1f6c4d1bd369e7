//! Gateway that hands the restricted set to a platform helper via a file.
//!
//! The helper (a Screen Time extension, an accessibility service, a launcher
//! shim) watches the file and enforces whatever it lists. A read-only file
//! means the helper has withdrawn permission.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EnforcementGateway;
use crate::error::GatewayError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionFile {
    pub restricted: BTreeSet<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct FileGateway {
    path: PathBuf,
}

impl FileGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents; a missing or unreadable file means nothing is restricted.
    pub fn read(&self) -> RestrictionFile {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn write(&self, mut contents: RestrictionFile) -> Result<(), GatewayError> {
        if !self.is_authorized() {
            return Err(GatewayError::NotAuthorized);
        }
        contents.updated_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(&contents)
            .map_err(|e| GatewayError::Rejected(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), count = contents.restricted.len(), "restriction file written");
        Ok(())
    }
}

impl EnforcementGateway for FileGateway {
    fn apply_restriction(&mut self, app_ids: &BTreeSet<String>) -> Result<(), GatewayError> {
        let mut contents = self.read();
        contents.restricted.extend(app_ids.iter().cloned());
        self.write(contents)
    }

    fn clear_restriction(&mut self, app_ids: &BTreeSet<String>) -> Result<(), GatewayError> {
        let mut contents = self.read();
        contents.restricted.retain(|id| !app_ids.contains(id));
        self.write(contents)
    }

    fn is_authorized(&self) -> bool {
        let dir_ok = self.path.parent().is_some_and(|dir| dir.is_dir());
        let writable = std::fs::metadata(&self.path)
            .map(|m| !m.permissions().readonly())
            .unwrap_or(true);
        dir_ok && writable
    }
}

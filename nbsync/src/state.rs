//! Persisted sync status.
//!
//! Serialized as camelCase JSON so the file reads like the status block of
//! an inventory custom resource.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub message: String,
    /// Resource key to hash of the documents last synced.
    #[serde(default)]
    pub sync_hash: BTreeMap<String, String>,
    #[serde(default, rename = "nautobotStatusReport")]
    pub report: BTreeMap<String, Vec<String>>,
}

impl SyncState {
    /// Load from `path`. A missing file is a fresh state.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file, starting fresh");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write to `path` through a temporary file so a crash never leaves a
    /// truncated state behind.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Hash recorded for `key`, empty if never synced.
    pub fn sync_hash(&self, key: &str) -> &str {
        self.sync_hash.get(key).map_or("", String::as_str)
    }

    /// Record `hash` for `key`. An empty hash removes the entry.
    pub fn set_sync_hash(&mut self, key: &str, hash: &str) {
        if hash.is_empty() {
            self.sync_hash.remove(key);
        } else {
            self.sync_hash.insert(key.to_string(), hash.to_string());
        }
    }
}

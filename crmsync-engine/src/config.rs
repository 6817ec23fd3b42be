//! Integration settings.

use crate::error::{ReconcileError, ReconcileResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Objects the integration is allowed to sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncObject {
    Lead,
    Company,
}

/// Feature toggles set by the administrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSettings {
    /// Queue remote deletions for the sweep instead of deleting immediately.
    #[serde(default)]
    pub cron_delete: bool,

    /// Objects synced from the remote system.
    #[serde(default = "default_objects")]
    pub objects: Vec<SyncObject>,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            cron_delete: false,
            objects: default_objects(),
        }
    }
}

/// Settings of one remote integration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Integration name, recorded on every remote-sync change.
    #[serde(default = "default_integration")]
    pub integration: String,

    /// Whether the integration is enabled.
    #[serde(default = "default_published")]
    pub is_published: bool,

    #[serde(default)]
    pub features: FeatureSettings,
}

fn default_integration() -> String {
    "pipedrive".to_string()
}

fn default_published() -> bool {
    true
}

fn default_objects() -> Vec<SyncObject> {
    vec![SyncObject::Lead]
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            integration: default_integration(),
            is_published: default_published(),
            features: FeatureSettings::default(),
        }
    }
}

impl SyncSettings {
    /// Parses settings from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> ReconcileResult<Self> {
        serde_json::from_str(json).map_err(|e| ReconcileError::Config(e.to_string()))
    }

    /// Reads settings from a JSON file.
    pub fn load(path: &Path) -> ReconcileResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ReconcileError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn with_published(mut self, published: bool) -> Self {
        self.is_published = published;
        self
    }

    pub fn with_cron_delete(mut self, enabled: bool) -> Self {
        self.features.cron_delete = enabled;
        self
    }

    pub fn with_company_support(mut self, enabled: bool) -> Self {
        self.features.objects.retain(|o| *o != SyncObject::Company);
        if enabled {
            self.features.objects.push(SyncObject::Company);
        }
        self
    }

    /// Deletions go through the queue only while the integration is enabled.
    pub fn deletes_via_queue(&self) -> bool {
        self.is_published && self.features.cron_delete
    }

    pub fn is_company_support_enabled(&self) -> bool {
        self.features.objects.contains(&SyncObject::Company)
    }
}

//! Configuration types for the permission synchronizer

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Maximum simultaneous backend calls unless configured otherwise
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PermsyncConfig {
    /// Authorization backend admin API
    pub backend: BackendConfig,
    /// Sync driver settings
    pub sync: SyncConfig,
    /// Input file locations
    pub sources: SourcesConfig,
}

impl PermsyncConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.sync.validate()?;
        Ok(config)
    }
}

/// Authorization backend admin API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Admin endpoint accepting rule commands
    pub endpoint: Option<String>,
    /// Admin credential
    pub admin_secret: Option<String>,
    /// Header carrying the admin credential
    pub admin_secret_header: String,
    /// Per-call timeout in seconds (unset = client default)
    pub request_timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            admin_secret: None,
            admin_secret_header: "x-admin-secret".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl BackendConfig {
    /// Require an endpoint and credential; run before any network call
    pub fn validate(&self) -> Result<(&str, &str)> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(Error::MissingEndpoint)?;
        let secret = self
            .admin_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingCredential)?;
        Ok((endpoint, secret))
    }
}

/// What the merge engine does with a slot governed by exactly one spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SingleMemberPolicy {
    /// Emit nothing for the slot
    #[default]
    Drop,
    /// Emit the lone member as its own rule
    Emit,
}

/// Sync driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum in-flight backend calls (default: 20)
    pub concurrency: usize,
    /// Audit snapshot location, overwritten every run
    pub audit_path: PathBuf,
    /// Handling of single-member merge slots
    pub single_member: SingleMemberPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            audit_path: PathBuf::from("permissions-audit.json"),
            single_member: SingleMemberPolicy::Drop,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::ConfigError(
                "sync.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Input file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Policy registry (JSON or TOML)
    pub registry_path: PathBuf,
    /// Role to permission-name assignments (JSON)
    pub roles_path: PathBuf,
    /// Table to column list (JSON)
    pub schema_path: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from("permissions.json"),
            roles_path: PathBuf::from("roles.json"),
            schema_path: PathBuf::from("schema.json"),
        }
    }
}

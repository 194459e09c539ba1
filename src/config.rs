use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sync::{SyncError, SyncResult};

/// Configuration for a sync runtime instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path where the durable local cache stores its data
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    /// How terminal and completion callbacks are delivered
    #[serde(default)]
    pub dispatcher: DispatcherKind,
    /// Overrides the schema's default remote when set
    #[serde(default)]
    pub remote_override: Option<String>,
    /// Overrides the schema's default auth when set
    #[serde(default)]
    pub auth_override: Option<String>,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data")
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            dispatcher: DispatcherKind::default(),
            remote_override: None,
            auth_override: None,
        }
    }
}

impl RuntimeConfig {
    /// Create a new configuration with the specified storage path
    pub fn new(storage_path: PathBuf) -> Self {
        Self {
            storage_path,
            ..Default::default()
        }
    }

    /// Set the callback dispatcher kind
    pub fn with_dispatcher(mut self, dispatcher: DispatcherKind) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Route all endpoint traffic through the named remote
    pub fn with_remote_override(mut self, remote: &str) -> Self {
        self.remote_override = Some(remote.to_string());
        self
    }

    /// Attach the named auth configuration to all endpoint traffic
    pub fn with_auth_override(mut self, auth: &str) -> Self {
        self.auth_override = Some(auth.to_string());
        self
    }

    /// Overlay configuration overrides onto the schema's resolved defaults
    pub fn apply_to(&self, defaults: RuntimeDefaults) -> RuntimeDefaults {
        RuntimeDefaults {
            remote: self.remote_override.clone().or(defaults.remote),
            auth: self.auth_override.clone().or(defaults.auth),
        }
    }
}

/// How an operation's callbacks are delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherKind {
    /// Run callbacks inline on the completing task
    #[default]
    Caller,
    /// Hand callbacks off to a spawned task
    Spawn,
}

/// Schema defaults resolved once into an explicit immutable object.
///
/// Built from the resolved graph (and optionally overlaid by
/// [`RuntimeConfig`] overrides), then threaded through the sync runtime's
/// call sites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeDefaults {
    /// Name of the default remote, if one is flagged
    pub remote: Option<String>,
    /// Name of the default auth, if one is flagged
    pub auth: Option<String>,
}

/// Load a runtime configuration from a TOML file
pub fn load_runtime_config(path: &str) -> SyncResult<RuntimeConfig> {
    let text = fs::read_to_string(path)
        .map_err(|e| SyncError::Cache(format!("Failed to read config {}: {}", path, e)))?;
    toml::from_str(&text)
        .map_err(|e| SyncError::Cache(format!("Failed to parse config {}: {}", path, e)))
}

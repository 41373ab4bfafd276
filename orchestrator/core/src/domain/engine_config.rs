// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration Types
//
// Defines the configuration schema for a Meridian engine host:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Navigator limits
// - Gateway deadlock sweep timeout
// - Swarm runtime settings

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_API_VERSION: &str = "meridian/v1";
pub const CONFIG_KIND: &str = "EngineConfig";

/// Top-level Kubernetes-style engine configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigManifest {
    /// API version (must be "meridian/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "EngineConfig")
    pub kind: String,

    #[serde(default)]
    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: EngineConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Engine configuration specification (content under spec:)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub navigator: NavigatorConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub swarm: SwarmRuntimeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigatorConfig {
    /// Visits allowed per node before navigation aborts as a runaway loop
    #[serde(default = "default_max_node_visits")]
    pub max_node_visits: u32,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            max_node_visits: default_max_node_visits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Age after which an unsynchronized inclusive split is swept as abandoned
    #[serde(default = "default_deadlock_timeout", with = "humantime_serde")]
    pub deadlock_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            deadlock_timeout: default_deadlock_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmRuntimeConfig {
    /// Broadcast buffer of the in-process event bus
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Recovery plans attempted before a failing swarm gives up
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,
}

impl Default for SwarmRuntimeConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: default_event_bus_capacity(),
            max_recovery_attempts: default_max_recovery_attempts(),
        }
    }
}

fn default_max_node_visits() -> u32 {
    100
}

fn default_deadlock_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_event_bus_capacity() -> usize {
    1000
}

fn default_max_recovery_attempts() -> u32 {
    3
}

impl EngineConfig {
    /// Parse and validate a configuration manifest.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let manifest: EngineConfigManifest =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Yaml(e.to_string()))?;

        if manifest.api_version != CONFIG_API_VERSION {
            return Err(ConfigError::InvalidApiVersion(manifest.api_version));
        }
        if manifest.kind != CONFIG_KIND {
            return Err(ConfigError::InvalidKind(manifest.kind));
        }
        manifest.spec.validate()?;
        Ok(manifest.spec)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.navigator.max_node_visits == 0 {
            return Err(ConfigError::Invalid(
                "navigator.max_node_visits must be at least 1".to_string(),
            ));
        }
        if self.swarm.event_bus_capacity == 0 {
            return Err(ConfigError::Invalid(
                "swarm.event_bus_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the configuration as a manifest document.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        let manifest = EngineConfigManifest {
            api_version: CONFIG_API_VERSION.to_string(),
            kind: CONFIG_KIND.to_string(),
            metadata: ManifestMetadata {
                name: "default".to_string(),
                version: None,
            },
            spec: self.clone(),
        };
        serde_yaml::to_string(&manifest).map_err(|e| ConfigError::Yaml(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {error}")]
    Io { path: String, error: String },

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("Invalid API version: expected '{CONFIG_API_VERSION}', got '{0}'")]
    InvalidApiVersion(String),

    #[error("Invalid kind: expected '{CONFIG_KIND}', got '{0}'")]
    InvalidKind(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

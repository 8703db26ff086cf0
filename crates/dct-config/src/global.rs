//! Global configuration for compose-testkit
//!
//! Located at `~/.config/compose-testkit/config.toml`, or at
//! `$DCT_CONFIG_DIR/config.toml` when that variable is set.

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that relocates the config directory
pub const CONFIG_DIR_ENV: &str = "DCT_CONFIG_DIR";

/// Upper bound for `probe.timeout_secs` (one week)
pub const MAX_PROBE_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Global compose-testkit configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestkitConfig {
    pub compose: ComposeConfig,
    pub network: NetworkConfig,
    pub probe: ProbeConfig,
    pub environment: EnvironmentConfig,
}

/// How the orchestration tool is invoked
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Compose invocation, e.g. "docker compose" or "podman-compose".
    /// Empty means auto-detect.
    pub command: String,
}

impl ComposeConfig {
    /// Split the configured command into program and leading arguments.
    /// Returns `None` when auto-detection should be used.
    pub fn command_parts(&self) -> Option<(String, Vec<String>)> {
        let mut parts = self.command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some((program, parts.collect()))
    }
}

/// Host networking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Bridge interface whose address containers use to reach the host
    pub bridge_interface: String,
    /// Fixed host alias entry, skipping interface discovery
    pub host_alias: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bridge_interface: "docker0".to_string(),
            host_alias: None,
        }
    }
}

/// Health probe defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Wall-clock budget for a probe to succeed
    pub timeout_secs: u64,
    /// Delay between probe attempts
    pub poll_interval_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            poll_interval_ms: 250,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Environment defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Remove containers, volumes and orphans on tear-down
    pub container_cleanup: bool,
}

impl TestkitConfig {
    /// Load global configuration from the default path
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load global configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {:?}: compose command={:?}",
            path,
            config.compose.command
        );

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.probe.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "probe.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.probe.timeout_secs > MAX_PROBE_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "probe.timeout_secs must be at most {}",
                MAX_PROBE_TIMEOUT_SECS
            )));
        }
        if self.network.bridge_interface.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "network.bridge_interface must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir).join("config.toml"));
            }
        }
        let dirs = ProjectDirs::from("", "", "compose-testkit").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

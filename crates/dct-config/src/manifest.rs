//! Dependency manifest read from `dct.toml` beside a compose file
//!
//! Each declared dependency becomes a default environment variable holding
//! its pinned version, so a compose file can reference `${POSTGRES_VERSION}`.

use crate::{ConfigError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the manifest, looked up in the compose file's directory
pub const MANIFEST_FILE_NAME: &str = "dct.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DependencyManifest {
    pub dependencies: BTreeMap<String, DependencySpec>,
}

/// A dependency is either a bare version or a table with an explicit env name
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Version(String),
    Detailed {
        version: String,
        #[serde(default)]
        env: Option<String>,
    },
}

/// One resolved `(env_name, version)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    pub name: String,
    pub env_name: String,
    pub version: String,
}

impl DependencyManifest {
    /// Path of the manifest that belongs to `compose_file`
    pub fn path_for(compose_file: &Path) -> PathBuf {
        compose_file
            .parent()
            .unwrap_or(Path::new("."))
            .join(MANIFEST_FILE_NAME)
    }

    /// Load the manifest next to `compose_file`. A missing manifest is empty.
    pub fn load_for(compose_file: &Path) -> Result<Self> {
        let path = Self::path_for(compose_file);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;
        let manifest: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(
            "Loaded {} dependencies from {:?}",
            manifest.dependencies.len(),
            path
        );
        Ok(manifest)
    }

    pub fn dependency_information(&self) -> Vec<DependencyInfo> {
        self.dependencies
            .iter()
            .map(|(name, spec)| {
                let (version, env) = match spec {
                    DependencySpec::Version(v) => (v.clone(), None),
                    DependencySpec::Detailed { version, env } => (version.clone(), env.clone()),
                };
                DependencyInfo {
                    name: name.clone(),
                    env_name: env.unwrap_or_else(|| default_env_name(name)),
                    version,
                }
            })
            .collect()
    }

    /// Env name to version map, the defaults every environment starts from
    pub fn version_env(&self) -> BTreeMap<String, String> {
        self.dependency_information()
            .into_iter()
            .map(|d| (d.env_name, d.version))
            .collect()
    }
}

/// `my-service` -> `MY_SERVICE_VERSION`
pub fn default_env_name(dependency: &str) -> String {
    let mut name: String = dependency
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    name.push_str("_VERSION");
    name
}

//! Environment handle and its lifecycle
//!
//! An [`Environment`] is one compose project: the compose file, its project
//! name, the variables passed to every compose invocation, and the cache of
//! addresses resolved so far.

use crate::{Result, ServiceKey, TestkitError, HOST_ALIAS_ENV};
use dct_compose::{ComposeProject, ComposeRunner};
use dct_config::ProbeConfig;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Options for creating an environment
#[derive(Debug, Clone, Default)]
pub struct EnvironmentOptions {
    /// Remove containers, volumes and orphans on tear-down.
    /// `None` uses `environment.container_cleanup` from the config (default false).
    pub container_cleanup: Option<bool>,
    /// Recreate containers even if the project is already running (default false)
    pub force_recreate: bool,
    /// Variables overriding the dependency-version defaults (default none)
    pub overrides: Option<BTreeMap<String, String>>,
    /// Tag isolating this environment from others using the same file (default none)
    pub variation: Option<String>,
}

impl EnvironmentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container_cleanup(mut self, cleanup: bool) -> Self {
        self.container_cleanup = Some(cleanup);
        self
    }

    pub fn force_recreate(mut self, force: bool) -> Self {
        self.force_recreate = force;
        self
    }

    /// Add one override variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn variation(mut self, variation: impl Into<String>) -> Self {
        self.variation = Some(variation.into());
        self
    }
}

/// Merge the variables for compose invocations.
///
/// Dependency defaults are overridden by the caller's overrides, which in
/// turn never replace the inherited `PATH` or the host alias.
pub fn build_environment_variables(
    dependency_defaults: BTreeMap<String, String>,
    overrides: Option<&BTreeMap<String, String>>,
    host_alias: &str,
) -> BTreeMap<String, String> {
    let mut env = dependency_defaults;
    if let Some(overrides) = overrides {
        env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    match std::env::var("PATH") {
        Ok(path) => {
            env.insert("PATH".to_string(), path);
        }
        Err(_) => {
            env.remove("PATH");
        }
    }
    env.insert(HOST_ALIAS_ENV.to_string(), host_alias.to_string());
    env
}

/// A running (or about to run) compose project
pub struct Environment {
    pub(crate) project: ComposeProject,
    pub(crate) container_cleanup: bool,
    pub(crate) runner: Arc<dyn ComposeRunner>,
    pub(crate) probe_defaults: ProbeConfig,
    /// Addresses that passed their health probe. Only ever grows.
    pub(crate) addresses: Mutex<HashMap<ServiceKey, String>>,
}

impl Environment {
    pub(crate) fn new(
        project: ComposeProject,
        container_cleanup: bool,
        runner: Arc<dyn ComposeRunner>,
        probe_defaults: ProbeConfig,
    ) -> Self {
        Self {
            project,
            container_cleanup,
            runner,
            probe_defaults,
            addresses: Mutex::new(HashMap::new()),
        }
    }

    /// Compose project name scoping every operation
    pub fn project_name(&self) -> &str {
        &self.project.project_name
    }

    pub fn config_path(&self) -> &Path {
        &self.project.file
    }

    /// Variables passed to every compose invocation
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.project.env
    }

    pub fn container_cleanup(&self) -> bool {
        self.container_cleanup
    }

    /// Start the project detached.
    ///
    /// Running this again without `force_recreate` keeps the existing
    /// containers and their published ports.
    pub async fn bring_up(&self, force_recreate: bool) -> Result<()> {
        tracing::info!(
            project = %self.project.project_name,
            force_recreate,
            "Bringing up {}",
            self.project.file.display()
        );
        self.runner
            .up(&self.project, force_recreate)
            .await
            .map_err(|e| TestkitError::SetupFailure {
                project: self.project.project_name.clone(),
                file: self.project.file.clone(),
                source: e,
            })
    }

    /// Tear the project down, removing volumes and orphans.
    ///
    /// Does nothing unless container cleanup was requested. Consumes the
    /// handle either way; a failed tear-down may leave containers running.
    /// To retry, rebuild the handle with [`Testkit::prepare_environment`]
    /// using the same file and options: it gets the same project name and
    /// starts nothing.
    ///
    /// [`Testkit::prepare_environment`]: crate::Testkit::prepare_environment
    pub async fn tear_down(self) -> Result<()> {
        if !self.container_cleanup {
            tracing::debug!(
                project = %self.project.project_name,
                "Container cleanup not requested, leaving project running"
            );
            return Ok(());
        }

        tracing::info!(project = %self.project.project_name, "Tearing down");
        self.runner
            .down(&self.project)
            .await
            .map_err(|e| TestkitError::TeardownFailure {
                project: self.project.project_name.clone(),
                source: e,
            })
    }

    /// Captured output of `service`, verbatim
    pub async fn fetch_logs(&self, service: &str) -> Result<String> {
        self.runner
            .logs(&self.project, service)
            .await
            .map_err(|e| TestkitError::LogFetchFailure {
                project: self.project.project_name.clone(),
                service: service.to_string(),
                source: e,
            })
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("project", &self.project)
            .field("container_cleanup", &self.container_cleanup)
            .field("runner", &self.runner.describe())
            .finish_non_exhaustive()
    }
}

//! Entry point for creating environments

use crate::{
    build_environment_variables, compute_identity, host_network_alias, Environment,
    EnvironmentOptions, Result,
};
use dct_compose::{create_default_runner, ComposeProject, ComposeRunner};
use dct_config::{DependencyManifest, TestkitConfig};
use std::path::Path;
use std::sync::Arc;

/// Creates environments with a shared config and compose runner
pub struct Testkit {
    config: TestkitConfig,
    runner: Arc<dyn ComposeRunner>,
}

impl Testkit {
    /// Create a testkit using the compose command selected by `config`
    pub fn new(config: TestkitConfig) -> Result<Self> {
        let runner = create_default_runner(&config.compose)?;
        tracing::debug!("Using compose runner: {}", runner.describe());
        Ok(Self {
            config,
            runner: Arc::from(runner),
        })
    }

    /// Create a testkit from the global config file
    pub fn from_default_config() -> Result<Self> {
        Self::new(TestkitConfig::load()?)
    }

    /// Create a testkit with a specific runner
    pub fn with_runner(config: TestkitConfig, runner: Arc<dyn ComposeRunner>) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &TestkitConfig {
        &self.config
    }

    /// Project name an environment for `config_path` and `options` would get
    pub fn project_name_for(&self, config_path: &Path, options: &EnvironmentOptions) -> String {
        compute_identity(
            &config_path.to_string_lossy(),
            options.overrides.as_ref(),
            options.variation.as_deref(),
        )
    }

    /// Build the environment handle without starting anything
    pub async fn prepare_environment(
        &self,
        config_path: impl AsRef<Path>,
        options: &EnvironmentOptions,
    ) -> Result<Environment> {
        let config_path = config_path.as_ref();
        let project_name = self.project_name_for(config_path, options);

        let dependency_defaults = DependencyManifest::load_for(config_path)?.version_env();
        let host_alias = host_network_alias(&self.config.network).await?;
        let env = build_environment_variables(
            dependency_defaults,
            options.overrides.as_ref(),
            &host_alias,
        );

        let project = ComposeProject::new(config_path, project_name).with_env(env);
        let container_cleanup = options
            .container_cleanup
            .unwrap_or(self.config.environment.container_cleanup);

        Ok(Environment::new(
            project,
            container_cleanup,
            self.runner.clone(),
            self.config.probe.clone(),
        ))
    }

    /// Create and bring up an environment for a compose file
    pub async fn create_environment(
        &self,
        config_path: impl AsRef<Path>,
        options: EnvironmentOptions,
    ) -> Result<Environment> {
        let environment = self.prepare_environment(config_path, &options).await?;
        environment.bring_up(options.force_recreate).await?;
        Ok(environment)
    }
}

/// Bring up `config_path` using the global config and the detected compose command
pub async fn run_compose(
    config_path: impl AsRef<Path>,
    options: EnvironmentOptions,
) -> Result<Environment> {
    Testkit::from_default_config()?
        .create_environment(config_path, options)
        .await
}

//! Compose runner trait and implementations for compose-testkit
//!
//! This crate wraps the container-orchestration CLI (`docker compose`,
//! `docker-compose`, `podman-compose`, ...) behind a small trait covering the
//! four operations the testkit needs.

mod cli_compose;
mod error;
mod types;

pub use cli_compose::CliCompose;
pub use error::*;
pub use types::*;

use async_trait::async_trait;
use dct_config::ComposeConfig;

/// Trait for orchestration-tool backends
#[async_trait]
pub trait ComposeRunner: Send + Sync {
    /// Start the project detached, optionally recreating its containers
    async fn up(&self, project: &ComposeProject, force_recreate: bool) -> Result<()>;

    /// Stop the project, removing its volumes and orphan containers
    async fn down(&self, project: &ComposeProject) -> Result<()>;

    /// Published host address (`host:port`) of a service's container port
    async fn port(
        &self,
        project: &ComposeProject,
        service: &str,
        port: u16,
        index: u32,
    ) -> Result<String>;

    /// Captured output of a service, verbatim
    async fn logs(&self, project: &ComposeProject, service: &str) -> Result<String>;

    /// Human readable description of the backing command
    fn describe(&self) -> String;
}

/// Create the runner selected by the config, auto-detecting when unset
pub fn create_default_runner(config: &ComposeConfig) -> Result<Box<dyn ComposeRunner>> {
    let runner = match config.command_parts() {
        Some((program, base_args)) => {
            tracing::debug!("Using configured compose command: {}", config.command);
            CliCompose::new(program, base_args)
        }
        None => CliCompose::detect()?,
    };
    Ok(Box::new(runner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_command_is_used() {
        let config = ComposeConfig {
            command: "podman compose".to_string(),
        };
        let runner = create_default_runner(&config).unwrap();
        assert_eq!(runner.describe(), "podman compose");
    }
}

//! CLI-based compose runner
//!
//! Shells out to the compose binary for every operation. The compose process
//! runs in the compose file's directory and inherits the parent environment,
//! overlaid with the project's variables.

use crate::{
    down_args, logs_args, port_args, up_args, ComposeError, ComposeOperation, ComposeProject,
    ComposeRunner, Result,
};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// CLI-based compose runner
#[derive(Debug, Clone)]
pub struct CliCompose {
    /// Program to run ("docker-compose", "docker", "podman-compose", ...)
    program: String,
    /// Arguments placed before the project scope (e.g. ["compose"])
    base_args: Vec<String>,
}

impl CliCompose {
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// Prefer the standalone `docker-compose`, fall back to the `docker compose` plugin
    pub fn detect() -> Result<Self> {
        if which::which("docker-compose").is_ok() {
            tracing::debug!("Detected standalone docker-compose");
            return Ok(Self::new("docker-compose", Vec::new()));
        }
        if which::which("docker").is_ok() {
            tracing::debug!("Using docker compose plugin");
            return Ok(Self::new("docker", vec!["compose".to_string()]));
        }
        Err(ComposeError::CommandNotFound)
    }

    /// Build the full command for an operation on a project
    fn build_command(&self, project: &ComposeProject, operation_args: Vec<String>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args);
        cmd.args(project.scoped_args(operation_args));
        cmd.current_dir(project.project_dir());
        cmd.envs(&project.env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    /// Run an operation and return its stdout
    async fn run(
        &self,
        project: &ComposeProject,
        operation: ComposeOperation,
        operation_args: Vec<String>,
    ) -> Result<String> {
        tracing::debug!(
            project = %project.project_name,
            "{} {}",
            self.describe(),
            operation_args.join(" ")
        );

        let output = self
            .build_command(project, operation_args)
            .output()
            .await
            .map_err(|e| ComposeError::Spawn {
                command: self.describe(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ComposeError::CommandFailed {
                operation: operation.to_string(),
                exit_code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl ComposeRunner for CliCompose {
    async fn up(&self, project: &ComposeProject, force_recreate: bool) -> Result<()> {
        self.run(project, ComposeOperation::Up, up_args(force_recreate))
            .await?;
        Ok(())
    }

    async fn down(&self, project: &ComposeProject) -> Result<()> {
        self.run(project, ComposeOperation::Down, down_args()).await?;
        Ok(())
    }

    async fn port(
        &self,
        project: &ComposeProject,
        service: &str,
        port: u16,
        index: u32,
    ) -> Result<String> {
        let output = self
            .run(project, ComposeOperation::Port, port_args(service, port, index))
            .await?;
        parse_port_output(&output)
    }

    async fn logs(&self, project: &ComposeProject, service: &str) -> Result<String> {
        self.run(project, ComposeOperation::Logs, logs_args(service))
            .await
    }

    fn describe(&self) -> String {
        if self.base_args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.base_args.join(" "))
        }
    }
}

/// `compose port` prints the published address on a single line
fn parse_port_output(output: &str) -> Result<String> {
    let address = output.trim();
    if address.is_empty() {
        return Err(ComposeError::EmptyOutput {
            operation: ComposeOperation::Port.to_string(),
        });
    }
    Ok(address.to_string())
}

//! Shared types for compose runners

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Everything that scopes a compose invocation to one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeProject {
    /// Compose file passed with `--file`
    pub file: PathBuf,
    /// Name passed with `--project-name`
    pub project_name: String,
    /// Variables set on the compose process, on top of the inherited ones
    pub env: BTreeMap<String, String>,
}

impl ComposeProject {
    pub fn new(file: impl Into<PathBuf>, project_name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            project_name: project_name.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Working directory for compose: the compose file's directory
    pub fn project_dir(&self) -> &Path {
        match self.file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// `--file <file> --project-name <name>` followed by the operation's arguments
    pub fn scoped_args<I, S>(&self, operation_args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = vec![
            "--file".to_string(),
            self.file.to_string_lossy().to_string(),
            "--project-name".to_string(),
            self.project_name.clone(),
        ];
        args.extend(operation_args.into_iter().map(Into::into));
        args
    }
}

/// The compose operations used by the testkit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeOperation {
    Up,
    Down,
    Port,
    Logs,
}

impl fmt::Display for ComposeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeOperation::Up => write!(f, "up"),
            ComposeOperation::Down => write!(f, "down"),
            ComposeOperation::Port => write!(f, "port"),
            ComposeOperation::Logs => write!(f, "logs"),
        }
    }
}

/// Arguments for `up`
pub fn up_args(force_recreate: bool) -> Vec<String> {
    let mut args = vec!["up".to_string(), "--detach".to_string()];
    if force_recreate {
        args.push("--force-recreate".to_string());
    }
    args
}

/// Arguments for `down`
pub fn down_args() -> Vec<String> {
    vec![
        "down".to_string(),
        "--volumes".to_string(),
        "--remove-orphans".to_string(),
    ]
}

/// Arguments for `port`
pub fn port_args(service: &str, port: u16, index: u32) -> Vec<String> {
    vec![
        "port".to_string(),
        format!("--index={}", index),
        service.to_string(),
        port.to_string(),
    ]
}

/// Arguments for `logs`
pub fn logs_args(service: &str) -> Vec<String> {
    vec!["logs".to_string(), service.to_string()]
}

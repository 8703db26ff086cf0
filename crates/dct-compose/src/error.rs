//! Error types for compose runners

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("No compose command found on PATH (tried docker-compose and docker)")]
    CommandNotFound,

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("compose {operation} failed (exit code {}): {stderr}", .exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    CommandFailed {
        operation: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("compose {operation} produced no output")]
    EmptyOutput { operation: String },
}

impl ComposeError {
    /// Exit code of the compose process, when it ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ComposeError::CommandFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ComposeError>;

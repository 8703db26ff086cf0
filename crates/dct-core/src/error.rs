//! Error types for dct-core

use crate::ProbeError;
use dct_compose::ComposeError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestkitError {
    #[error("Configuration error: {0}")]
    Config(#[from] dct_config::ConfigError),

    #[error("Compose runner unavailable: {0}")]
    Runner(#[from] ComposeError),

    #[error("Failed to bring up project {project} from {}: {source}", .file.display())]
    SetupFailure {
        project: String,
        file: PathBuf,
        source: ComposeError,
    },

    #[error("Failed to tear down project {project}: {source}")]
    TeardownFailure {
        project: String,
        source: ComposeError,
    },

    #[error("Invalid instance index {index} for {service}: replica indexes start at 1")]
    InvalidInstanceIndex { service: String, index: u32 },

    #[error("Failed to look up published port {port} of {service} (index {index}) in project {project}: {source}")]
    PortLookupFailure {
        project: String,
        service: String,
        port: u16,
        index: u32,
        source: ComposeError,
    },

    #[error(
        "Service {service}:{port} (index {index}) at {address} was not healthy within {}s after {attempts} attempts{}",
        .budget.as_secs_f64(),
        .last_error.as_ref().map(|e| format!(": {}", e)).unwrap_or_default()
    )]
    ProbeTimeout {
        service: String,
        port: u16,
        index: u32,
        address: String,
        budget: Duration,
        attempts: u32,
        last_error: Option<ProbeError>,
    },

    #[error("Failed to determine host network alias: {0}")]
    NetworkDiscovery(String),

    #[error("Failed to fetch logs of {service} in project {project}: {source}")]
    LogFetchFailure {
        project: String,
        service: String,
        source: ComposeError,
    },

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

pub type Result<T> = std::result::Result<T, TestkitError>;

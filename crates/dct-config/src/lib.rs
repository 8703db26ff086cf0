//! Configuration parsing for compose-testkit
//!
//! This crate handles parsing of:
//! - Global configuration (`~/.config/compose-testkit/config.toml`)
//! - Dependency manifests (`dct.toml` next to a compose file)

mod error;
mod global;
mod manifest;

pub use error::*;
pub use global::*;
pub use manifest::*;

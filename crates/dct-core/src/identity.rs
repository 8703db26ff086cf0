//! Deterministic compose project names
//!
//! The project name is derived from the compose file path, the caller's
//! variable overrides and an optional variation tag. Identical inputs give
//! identical names, so a second run against an unchanged configuration reuses
//! the containers of the first; a different variation gives an isolated
//! project from the same file.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Namespace prefix of every project name
pub const PROJECT_NAME_PREFIX: &str = "dct_";

/// Bytes of the digest kept in the project name
const DIGEST_LEN: usize = 16;

/// Compute the project name for a compose file.
///
/// `overrides` are serialized as a JSON object in key order; `None` and an
/// empty map hash differently. The result is lowercase and contains only
/// characters valid in a compose project name.
pub fn compute_identity(
    config_path: &str,
    overrides: Option<&BTreeMap<String, String>>,
    variation: Option<&str>,
) -> String {
    let overrides_json = overrides
        .map(|env| serde_json::to_string(env).unwrap_or_default())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(config_path.as_bytes());
    hasher.update(overrides_json.as_bytes());
    hasher.update(variation.unwrap_or_default().as_bytes());
    let digest = hasher.finalize();

    let encoded: String = STANDARD
        .encode(&digest[..DIGEST_LEN])
        .chars()
        .filter(|c| !matches!(c, '=' | '/' | '+'))
        .collect();

    format!("{}{}", PROJECT_NAME_PREFIX, encoded).to_lowercase()
}

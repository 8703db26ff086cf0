//! Host network alias for containers
//!
//! Docker Desktop (macOS, Windows) runs containers in a VM and already maps
//! `host.docker.internal` to the host's loopback. On Linux the alias has to
//! be added by the compose file itself (`extra_hosts: ["${HOST_DOCKER_INTERNAL}"]`),
//! pointing at the address of the container bridge interface.

use crate::{Result, TestkitError};
use dct_config::NetworkConfig;
use std::future::Future;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::OnceCell;
use url::Url;

/// Hostname containers use to reach the host
pub const HOST_ALIAS_NAME: &str = "host.docker.internal";

/// Variable carrying the `extra_hosts` entry into every compose invocation
pub const HOST_ALIAS_ENV: &str = "HOST_DOCKER_INTERNAL";

/// Harmless `extra_hosts` entry for platforms that resolve the alias themselves
pub const DESKTOP_HOST_ALIAS: &str = "dct-unused-host-alias:127.0.0.1";

/// Hosts rewritten by [`adjust_url_for_host_access`]
pub const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "0.0.0.0"];

static HOST_ALIAS: OnceCell<String> = OnceCell::const_new();

/// Whether containers run inside a desktop VM on this platform
pub fn uses_desktop_vm() -> bool {
    cfg!(any(target_os = "macos", target_os = "windows"))
}

/// The `extra_hosts` entry that lets containers reach the host.
///
/// A `host_alias` set in the config is returned as is. Otherwise the value is
/// discovered once per process and reused afterwards, even if the network
/// configuration changes. A failed discovery is not cached.
pub async fn host_network_alias(network: &NetworkConfig) -> Result<String> {
    if let Some(ref alias) = network.host_alias {
        return Ok(alias.clone());
    }

    memoized_alias(&HOST_ALIAS, || discover_host_alias(&network.bridge_interface)).await
}

/// Value of `cell`, running `discover` only while the cell is still empty
async fn memoized_alias<F, Fut>(cell: &OnceCell<String>, discover: F) -> Result<String>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    cell.get_or_try_init(discover).await.cloned()
}

async fn discover_host_alias(bridge_interface: &str) -> Result<String> {
    if uses_desktop_vm() {
        tracing::debug!("Desktop container platform, host alias provided by runtime");
        return Ok(DESKTOP_HOST_ALIAS.to_string());
    }

    let output = Command::new("ip")
        .args(["-4", "addr", "show"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| TestkitError::NetworkDiscovery(format!("failed to run `ip addr show`: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TestkitError::NetworkDiscovery(format!(
            "`ip addr show` failed: {}",
            stderr.trim()
        )));
    }

    let alias = alias_from_ip_output(&String::from_utf8_lossy(&output.stdout), bridge_interface)?;
    tracing::info!("Host network alias: {}", alias);
    Ok(alias)
}

/// `host.docker.internal:<bridge address>` from `ip addr show` output
fn alias_from_ip_output(ip_output: &str, bridge_interface: &str) -> Result<String> {
    let address = parse_bridge_address(ip_output, bridge_interface).ok_or_else(|| {
        TestkitError::NetworkDiscovery(format!(
            "no IPv4 address found for bridge interface {}",
            bridge_interface
        ))
    })?;
    Ok(format!("{}:{}", HOST_ALIAS_NAME, address))
}

/// Find the IPv4 address of `interface` in `ip addr show` output.
///
/// Matches lines like `inet 172.17.0.1/16 brd 172.17.255.255 scope global docker0`.
pub fn parse_bridge_address(ip_output: &str, interface: &str) -> Option<String> {
    ip_output.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("inet") {
            return None;
        }
        let cidr = tokens.next()?;
        if !tokens.any(|t| t == interface) {
            return None;
        }
        let address = cidr.split('/').next()?;
        if address.is_empty() {
            None
        } else {
            Some(address.to_string())
        }
    })
}

/// Rewrite a loopback host in `url` to [`HOST_ALIAS_NAME`].
///
/// Used to hand a host-side listening address to a process running in a
/// container. Scheme, port, path and query are preserved; non-loopback hosts
/// are returned unchanged.
pub fn adjust_url_for_host_access(url: &str) -> Result<String> {
    let mut parsed = Url::parse(url).map_err(|e| TestkitError::InvalidUrl {
        url: url.to_string(),
        source: e,
    })?;

    let needs_rewrite = parsed
        .host_str()
        .is_some_and(|host| LOOPBACK_HOSTS.contains(&host));

    if needs_rewrite {
        parsed
            .set_host(Some(HOST_ALIAS_NAME))
            .map_err(|e| TestkitError::InvalidUrl {
                url: url.to_string(),
                source: e,
            })?;
    }

    Ok(parsed.to_string())
}

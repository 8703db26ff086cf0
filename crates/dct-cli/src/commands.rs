//! CLI command implementations

use crate::EnvironmentArgs;
use anyhow::Result;
use dct_config::TestkitConfig;
use dct_core::{
    adjust_url_for_host_access, host_network_alias, EnvironmentOptions, ResolveOptions,
    TcpProbe, Testkit,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Parse a `KEY=VALUE` override
pub fn parse_env_pair(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn environment_options(args: &EnvironmentArgs) -> EnvironmentOptions {
    let mut options = EnvironmentOptions::new();
    if !args.env.is_empty() {
        options = options.overrides(args.env.iter().cloned().collect::<BTreeMap<_, _>>());
    }
    if let Some(ref variation) = args.variation {
        options = options.variation(variation.clone());
    }
    options
}

/// Print the project name without touching compose
pub fn project_name(args: &EnvironmentArgs) -> Result<()> {
    let options = environment_options(args);
    let name = dct_core::compute_identity(
        &args.file.to_string_lossy(),
        options.overrides.as_ref(),
        options.variation.as_deref(),
    );
    println!("{}", name);
    Ok(())
}

pub async fn up(config: TestkitConfig, args: &EnvironmentArgs, force_recreate: bool) -> Result<()> {
    let testkit = Testkit::new(config)?;
    let environment = testkit
        .create_environment(
            &args.file,
            environment_options(args).force_recreate(force_recreate),
        )
        .await?;
    println!("{}", environment.project_name());
    Ok(())
}

pub async fn down(config: TestkitConfig, args: &EnvironmentArgs) -> Result<()> {
    let testkit = Testkit::new(config)?;
    let environment = testkit
        .prepare_environment(&args.file, &environment_options(args).container_cleanup(true))
        .await?;
    environment.tear_down().await?;
    Ok(())
}

pub struct AddressRequest {
    pub service: String,
    pub port: u16,
    pub index: u32,
    pub tcp: bool,
    pub timeout: Option<u64>,
}

pub async fn address(
    config: TestkitConfig,
    args: &EnvironmentArgs,
    request: AddressRequest,
) -> Result<()> {
    let testkit = Testkit::new(config)?;
    let environment = testkit
        .prepare_environment(&args.file, &environment_options(args))
        .await?;

    let mut options = ResolveOptions::new().instance_index(request.index);
    if request.tcp {
        options = options.probe(Arc::new(TcpProbe));
    }
    if let Some(secs) = request.timeout {
        options = options.probe_timeout(Duration::from_secs(secs));
    }

    let address = environment
        .resolve_address(&request.service, request.port, options)
        .await?;
    println!("{}", address);
    Ok(())
}

pub async fn logs(config: TestkitConfig, args: &EnvironmentArgs, service: &str) -> Result<()> {
    let testkit = Testkit::new(config)?;
    let environment = testkit
        .prepare_environment(&args.file, &environment_options(args))
        .await?;
    print!("{}", environment.fetch_logs(service).await?);
    Ok(())
}

pub async fn host_alias(config: &TestkitConfig) -> Result<()> {
    println!("{}", host_network_alias(&config.network).await?);
    Ok(())
}

pub fn adjust_url(url: &str) -> Result<()> {
    println!("{}", adjust_url_for_host_access(url)?);
    Ok(())
}

//! dct - compose-testkit CLI

mod commands;

use clap::{Args, Parser, Subcommand};
use dct_config::TestkitConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dct")]
#[command(author, version, about = "Ephemeral docker-compose environments for integration tests", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the global compose-testkit config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments identifying one environment
#[derive(Args, Debug, Clone)]
pub struct EnvironmentArgs {
    /// Compose file
    pub file: PathBuf,

    /// Override variable, KEY=VALUE (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = commands::parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Variation tag isolating this environment
    #[arg(long)]
    pub variation: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the project name for a compose file
    ProjectName {
        #[command(flatten)]
        environment: EnvironmentArgs,
    },

    /// Bring an environment up
    Up {
        #[command(flatten)]
        environment: EnvironmentArgs,
        /// Recreate containers even if they are running
        #[arg(long)]
        force_recreate: bool,
    },

    /// Tear an environment down, removing volumes and orphans
    Down {
        #[command(flatten)]
        environment: EnvironmentArgs,
    },

    /// Print the published address of a service once it is healthy
    Address {
        #[command(flatten)]
        environment: EnvironmentArgs,
        /// Service name
        #[arg(long, short)]
        service: String,
        /// Container port
        #[arg(long, short, default_value_t = 80)]
        port: u16,
        /// Replica index, starting at 1
        #[arg(long, default_value_t = 1)]
        index: u32,
        /// Probe with a TCP connect instead of an HTTP GET
        #[arg(long)]
        tcp: bool,
        /// Probe budget in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the logs of a service
    Logs {
        #[command(flatten)]
        environment: EnvironmentArgs,
        /// Service name
        #[arg(long, short)]
        service: String,
    },

    /// Print the extra_hosts entry that lets containers reach the host
    HostAlias,

    /// Rewrite a loopback URL so a container can reach it
    AdjustUrl {
        url: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays usable in scripts
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = match cli.config {
        Some(ref path) => TestkitConfig::load_from(path)?,
        None => TestkitConfig::load()?,
    };
    tracing::debug!("compose command: {:?}", config.compose.command);

    match cli.command {
        Commands::ProjectName { environment } => commands::project_name(&environment),
        Commands::Up {
            environment,
            force_recreate,
        } => commands::up(config, &environment, force_recreate).await,
        Commands::Down { environment } => commands::down(config, &environment).await,
        Commands::Address {
            environment,
            service,
            port,
            index,
            tcp,
            timeout,
        } => {
            commands::address(
                config,
                &environment,
                commands::AddressRequest {
                    service,
                    port,
                    index,
                    tcp,
                    timeout,
                },
            )
            .await
        }
        Commands::Logs {
            environment,
            service,
        } => commands::logs(config, &environment, &service).await,
        Commands::HostAlias => commands::host_alias(&config).await,
        Commands::AdjustUrl { url } => commands::adjust_url(&url),
    }
}

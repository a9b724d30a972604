#![deny(unsafe_code)]

//! tailsock CLI — query a local `tailscaled` through its `LocalAPI`.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tailsock_core::{LocalApi, ProbePolicy};

/// tailsock — a client for the tailscaled LocalAPI.
#[derive(Parser)]
#[command(name = "tailsock", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "tailsock.toml")]
    config: PathBuf,

    /// Daemon socket path override.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Force the Unix socket even on macOS.
    #[arg(long)]
    socket_only: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status as normalized JSON.
    Status,

    /// Look up the tailnet peer owning an address.
    Whois {
        /// Peer address (v4, v6, or v4-mapped v6).
        addr: String,
    },

    /// Dump daemon metrics in Prometheus text format.
    Metrics,

    /// List files waiting to be picked up.
    Files,

    /// Start an interactive login flow in the daemon.
    Login,

    /// Log this node out of the tailnet.
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    // Set up tracing subscriber with verbosity level
    let filter = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let api = connect(&cli, &config)?;
    api.wait_ready()
        .await
        .context("tailscaled never became reachable")?;

    match cli.command {
        Commands::Status => {
            let status = api.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Whois { addr } => cmd_whois(&api, &addr).await?,
        Commands::Metrics => {
            print!("{}", api.metrics().await?);
        }
        Commands::Files => {
            let files = api.waiting_files().await?;
            println!("{}", serde_json::to_string_pretty(&files)?);
        }
        Commands::Login => {
            api.login_interactive().await?;
            info!("login flow started, check the daemon log for the auth URL");
        }
        Commands::Logout => {
            api.logout().await?;
            info!("logged out");
        }
    }

    Ok(())
}

fn connect(cli: &Cli, config: &tailsock_config::ClientConfig) -> Result<LocalApi> {
    let mut builder = LocalApi::builder()
        .socket_only(cli.socket_only || config.transport.socket_only)
        .probe_policy(ProbePolicy {
            max_retries: config.probe.max_retries,
            base_delay: Duration::from_millis(config.probe.base_delay_ms),
        });

    if let Some(socket) = cli
        .socket
        .clone()
        .or_else(|| config.transport.socket_path.clone().map(PathBuf::from))
    {
        builder = builder.socket_path(socket);
    }

    builder.connect().context("failed to set up transport")
}

async fn cmd_whois(api: &LocalApi, addr: &str) -> Result<()> {
    let ip: IpAddr = addr.parse().context("invalid address")?;
    match api.tailnet_addr(addr) {
        Some(canonical) => info!(%canonical, "address is inside the tailnet"),
        None => info!(%ip, "address is outside the tailnet ranges"),
    }
    let who = api.whois(ip).await?;
    println!("{}", serde_json::to_string_pretty(&who)?);
    Ok(())
}

fn load_config(path: &Path) -> Result<tailsock_config::ClientConfig> {
    if path.exists() {
        tailsock_config::ClientConfig::load(path).map_err(|e| anyhow::anyhow!(e))
    } else {
        Ok(tailsock_config::ClientConfig::default())
    }
}

//! # smarttv-remote
//!
//! Command-line remote for smart TVs on the local network.
//! Scans the LAN, sends remote keys and text to Samsung TVs, launches apps,
//! and wakes TVs with a magic packet.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;

use app::App;
use commands::{cmd_apps, cmd_install, cmd_keys, cmd_launch, cmd_scan, cmd_text, cmd_wake};

use smarttv_remote::{RemoteConfig, TvCommand};

/// Command-line remote for smart TVs on the local network.
#[derive(Parser)]
#[command(name = "smarttv-remote", version, about)]
struct Cli {
    /// Path to smarttv.toml config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging (set RUST_LOG for fine-grained control)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover TVs on the local network
    Scan {
        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Subnet to probe, e.g. 192.168.1.0/24
        #[arg(long)]
        subnet: Option<String>,

        /// Skip the mDNS browse
        #[arg(long)]
        no_mdns: bool,
    },

    /// Press one or more remote keys (e.g. `volume-up`, `home`, `KEY_ENTER`)
    Key {
        /// TV address
        host: String,

        #[arg(required = true)]
        keys: Vec<TvCommand>,

        /// Pause between key presses, in milliseconds
        #[arg(long, default_value_t = 250)]
        delay_ms: u64,
    },

    /// Type text into the focused input field
    Text { host: String, text: String },

    /// List well-known app names and ids
    Apps,

    /// Launch an app by name or id
    Launch { host: String, app: String },

    /// Open the TV's install page for an app
    Install { host: String, app: String },

    /// Send a Wake-on-LAN magic packet
    Wake {
        /// MAC address, e.g. a0:b1:c2:d3:e4:f5
        mac: String,

        /// Destination (default 255.255.255.255:9)
        #[arg(long)]
        target: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "smarttv_remote=debug,smarttv_remote_cli=debug"
    } else {
        "smarttv_remote=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match RemoteConfig::discover(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) if cli.config.is_some() => return Err(e.into()),
        Err(e) => {
            eprintln!("Note: ignoring unreadable config ({e}). Using defaults.");
            RemoteConfig::from_env()
        }
    };

    match cli.command {
        Command::Scan {
            json,
            subnet,
            no_mdns,
        } => {
            if subnet.is_some() {
                config.discovery.subnet = subnet;
            }
            if no_mdns {
                config.discovery.mdns = false;
            }
            cmd_scan(&App::new(config)?, json).await?;
        }
        Command::Key {
            host,
            keys,
            delay_ms,
        } => {
            let app = App::new(config)?;
            cmd_keys(&app, &host, &keys, Duration::from_millis(delay_ms)).await?;
        }
        Command::Text { host, text } => cmd_text(&App::new(config)?, &host, &text).await?,
        Command::Apps => cmd_apps(),
        Command::Launch { host, app } => cmd_launch(&App::new(config)?, &host, &app).await?,
        Command::Install { host, app } => cmd_install(&App::new(config)?, &host, &app).await?,
        Command::Wake { mac, target } => cmd_wake(&mac, target).await?,
    }
    Ok(())
}

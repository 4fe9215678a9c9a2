//! Ponto CLI
//!
//! Command-line interface for Ponto - offline-first time clock.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use ponto_core::ClockType;

mod commands;
mod context;
mod logging;
mod notifier;
mod output;

use context::Context;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "ponto")]
#[command(about = "Ponto - Offline-first time clock")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this configuration file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a clock event (clock_in, clock_out, break_start, break_end)
    Clock {
        /// Kind of event
        kind: ClockType,
        /// Latitude of the device
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Longitude of the device
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
        /// Photo to attach
        #[arg(long, value_name = "FILE")]
        photo: Option<PathBuf>,
        /// Save to the local queue without contacting the server
        #[arg(long)]
        offline: bool,
    },
    /// Inspect the local queue
    Queue {
        #[command(subcommand)]
        command: Option<QueueCommands>,
    },
    /// Send pending events to the server
    Sync,
    /// Show connection, queue and proxy status
    Status,
    /// Watch connectivity and sync on every reconnect
    Watch,
    /// Manage the caching proxy
    Proxy {
        #[command(subcommand)]
        command: ProxyCommands,
    },
    /// Manage the stored access token
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// List queued events
    #[command(alias = "ls")]
    List {
        /// Only events not yet confirmed by the server
        #[arg(long)]
        pending: bool,
    },
    /// Remove events already confirmed by the server
    Purge,
}

#[derive(Subcommand)]
enum ProxyCommands {
    /// Fetch and cache the static manifest for the configured version
    Install,
    /// Delete stale generations and start intercepting requests
    Activate,
    /// List cache generations
    #[command(alias = "ls")]
    Generations,
    /// Send a request through the proxy
    Fetch {
        /// Request URL
        url: String,
        /// Request destination (document, script, style, image, font)
        #[arg(short, long)]
        destination: Option<String>,
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
    },
    /// Deliver a push message (JSON payload)
    Push {
        /// Payload, e.g. '{"title":"Ponto","body":"Reminder"}'
        payload: Option<String>,
    },
    /// Simulate a notification click
    Click,
    /// Deliver a background sync signal
    Sync {
        /// Registration tag
        #[arg(default_value = ponto_core::proxy::SYNC_TAG)]
        tag: String,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Store the access token
    SetToken {
        /// Bearer token
        token: String,
    },
    /// Forget the stored access token
    #[command(alias = "logout")]
    Clear,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (api_url, data_dir, cache_version, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work even when the rest of the setup would fail
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let ctx = Context::load(config_path)?;
    logging::init_logging(&ctx.config);

    match cli.command {
        Commands::Clock {
            kind,
            lat,
            lon,
            photo,
            offline,
        } => {
            let location = lat.zip(lon);
            commands::clock::record(&ctx, kind, location, photo, offline, &output).await
        }
        Commands::Queue { command } => handle_queue_command(command, &ctx, &output).await,
        Commands::Sync => commands::sync::sync(&ctx, &output).await,
        Commands::Status => commands::status::show(&ctx, &output).await,
        Commands::Watch => commands::watch::watch(&ctx, &output).await,
        Commands::Proxy { command } => handle_proxy_command(command, &ctx, &output).await,
        Commands::Auth { command } => match command {
            AuthCommands::SetToken { token } => commands::auth::set_token(&ctx, token, &output),
            AuthCommands::Clear => commands::auth::clear(&ctx, &output),
        },
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

async fn handle_queue_command(
    command: Option<QueueCommands>,
    ctx: &Context,
    output: &Output,
) -> Result<()> {
    match command {
        Some(QueueCommands::List { pending }) => commands::queue::list(ctx, pending, output).await,
        None => commands::queue::list(ctx, false, output).await,
        Some(QueueCommands::Purge) => commands::queue::purge(ctx, output).await,
    }
}

async fn handle_proxy_command(command: ProxyCommands, ctx: &Context, output: &Output) -> Result<()> {
    match command {
        ProxyCommands::Install => commands::proxy::install(ctx, output).await,
        ProxyCommands::Activate => commands::proxy::activate(ctx, output).await,
        ProxyCommands::Generations => commands::proxy::generations(ctx, output).await,
        ProxyCommands::Fetch {
            url,
            destination,
            method,
        } => commands::proxy::fetch(ctx, url, destination, method, output).await,
        ProxyCommands::Push { payload } => commands::proxy::push(ctx, payload, output).await,
        ProxyCommands::Click => commands::proxy::click(ctx, output).await,
        ProxyCommands::Sync { tag } => commands::proxy::sync_tag(ctx, tag, output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

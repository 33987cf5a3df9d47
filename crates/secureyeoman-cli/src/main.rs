//! `secureyeoman` - the gateway CLI.
//!
//! Talks to a running gateway over its HTTP API, or starts one with
//! `secureyeoman start`. JSON output with `--json`, human-readable tables
//! otherwise. Exit code 0 on success, 1 on any operational failure.

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod client;
mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::client::ApiClient;

#[derive(Parser)]
#[command(name = "secureyeoman", about = "Security-hardened autonomous agent gateway", version)]
struct Cli {
    /// Gateway base URL.
    #[arg(long, global = true, default_value = "http://127.0.0.1:3030", env = "SECUREYEOMAN_URL")]
    url: String,

    /// Access token or API key.
    #[arg(long, global = true, env = "SECUREYEOMAN_TOKEN")]
    token: Option<String>,

    /// Emit JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the gateway process.
    Start {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: Option<std::path::PathBuf>,
    },
    /// Show gateway status.
    Status,
    /// Generate a starter configuration file.
    Init {
        /// Where to write the configuration.
        #[arg(long, default_value = "secureyeoman.toml")]
        out: std::path::PathBuf,
        /// Admin password to hash into the configuration.
        #[arg(long, env = "SECUREYEOMAN_ADMIN_PASSWORD")]
        password: String,
    },
    /// Model gateway operations.
    #[command(subcommand)]
    Model(commands::model::ModelCommand),
    /// Memory operations.
    #[command(subcommand)]
    Memory(commands::memory::MemoryCommand),
    /// Role management.
    #[command(subcommand)]
    Role(commands::role::RoleCommand),
    /// Task execution.
    #[command(subcommand)]
    Execute(commands::execute::ExecuteCommand),
    /// Security operations.
    #[command(subcommand)]
    Security(commands::security::SecurityCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Start { config } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info".into()),
                )
                .init();
            let config = secureyeoman_server::Config::load(config.as_deref())
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            secureyeoman_server::serve(config)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))
        },
        Command::Status => {
            let client = ApiClient::new(cli.url, cli.token, cli.json);
            commands::status(&client).await
        },
        Command::Init { out, password } => commands::init(&out, &password, cli.json),
        Command::Model(cmd) => {
            let client = ApiClient::new(cli.url, cli.token, cli.json);
            commands::model::run(&client, cmd).await
        },
        Command::Memory(cmd) => {
            let client = ApiClient::new(cli.url, cli.token, cli.json);
            commands::memory::run(&client, cmd).await
        },
        Command::Role(cmd) => {
            let client = ApiClient::new(cli.url, cli.token, cli.json);
            commands::role::run(&client, cmd).await
        },
        Command::Execute(cmd) => {
            let client = ApiClient::new(cli.url, cli.token, cli.json);
            commands::execute::run(&client, cmd).await
        },
        Command::Security(cmd) => {
            let client = ApiClient::new(cli.url, cli.token, cli.json);
            commands::security::run(&client, cmd).await
        },
    }
}

//! Imaginarium server launcher
//!
//! Parses flags, loads layered configuration, sets up tracing and runs the
//! HTTP API until interrupted.

use super::config::CliConfigBuilder;
use crate::server::{self, AppState};
use crate::tracing_config::{init_server_tracing, TracingFormat};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Image transformation API server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "imaginarium")]
pub struct Cli {
    /// Address to bind, overriding the config file
    #[arg(short, long, env = "IMAGINARIUM_BIND", value_name = "ADDR")]
    pub bind: Option<String>,

    /// Config file [default: <config dir>/imaginarium/config.json]
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Provider request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// Page size for image listings
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Print the effective configuration (secrets redacted) and exit
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_server_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid command-line arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    if cli.print_config {
        let redacted = CliConfigBuilder::redacted(&config);
        println!("{}", serde_json::to_string_pretty(&redacted)?);
        return Ok(());
    }

    let missing = config.missing_credentials();
    if !missing.is_empty() {
        tracing::warn!(
            missing = %missing.join(", "),
            "⚠️  Some provider credentials are not set; those calls will fail"
        );
    }

    let addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.bind))?;
    let state = AppState::from_config(&config).context("Failed to create provider clients")?;

    tracing::info!(
        cloud = %config.hosting.cloud_name,
        folder = %config.hosting.folder,
        payments = ?config.payments.mode,
        "Starting imaginarium"
    );
    server::serve(addr, state).await.context("Server failed")?;
    Ok(())
}

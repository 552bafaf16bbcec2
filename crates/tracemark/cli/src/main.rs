//! Tracemark CLI - native host for the identity pipeline
//!
//! Runs one page load against the local machine:
//! - Derives or reuses the visitor identifier from a cookie jar on disk
//! - Enriches it with a network location lookup
//! - Prints the composed redirect URL, or the disclosure listing when the
//!   query carries no routing target

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod context;
mod error;
mod output;
mod raster;

use config::{CliConfig, Overrides};

/// Tracemark CLI application
#[derive(Parser)]
#[command(name = "tracemark")]
#[command(about = "Tracemark - visitor identity derivation and redirect composition", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TRACEMARK_CONFIG", global = true)]
    config: Option<String>,

    /// Cookie jar path
    #[arg(long, env = "TRACEMARK_JAR", global = true)]
    jar: Option<PathBuf>,

    /// Network lookup endpoint
    #[arg(long, env = "TRACEMARK_GEO_ENDPOINT", global = true)]
    geo_endpoint: Option<String>,

    /// Network lookup timeout in milliseconds
    #[arg(long, global = true)]
    geo_timeout_ms: Option<u64>,

    /// Query parameter holding the redirect target
    #[arg(long, global = true)]
    routing_key: Option<String>,

    /// Delay before navigating, in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    /// Output format (text, json)
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    output: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one page load
    Run {
        /// Page query string, with or without the leading '?'
        #[arg(default_value = "")]
        query: String,
    },

    /// Show the stored identifier
    Identity,

    /// Delete the stored identifier and every other cookie
    Forget,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let mut config = CliConfig::load(cli.config.as_deref())?;
    config.apply_overrides(&Overrides {
        jar: cli.jar,
        geo_endpoint: cli.geo_endpoint,
        geo_timeout_ms: cli.geo_timeout_ms,
        routing_key: cli.routing_key,
        delay_ms: cli.delay_ms,
    });
    let jar_path = config.jar_path()?;

    match cli.command {
        Commands::Run { query } => commands::run(&config, jar_path, &query, cli.output).await?,
        Commands::Identity => commands::identity(&config, jar_path, cli.output)?,
        Commands::Forget => commands::forget(&config, jar_path)?,
        Commands::Config => commands::show_config(&config, jar_path, cli.output)?,
    }
    Ok(())
}

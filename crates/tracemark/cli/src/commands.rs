//! Command implementations

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tracemark_core::{IdentityPipeline, IdentityStore};
use tracing::debug;

use crate::config::CliConfig;
use crate::context::NativeContext;
use crate::error::CliResult;
use crate::output::{self, OutputFormat, TerminalRenderer};

/// Run the pipeline once for `query`.
pub async fn run(
    config: &CliConfig,
    jar_path: PathBuf,
    query: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let ctx = Arc::new(NativeContext::open(query, &config.host, jar_path)?);
    let mut pipeline = IdentityPipeline::new(ctx.clone(), config.pipeline.clone())?;

    let outcome = pipeline.run(&TerminalRenderer::new(format)).await?;
    debug!(state = %pipeline.state(), navigated = ?ctx.navigated(), "Run finished");

    output::print_outcome(&outcome, format)
}

/// Show the stored identifier.
pub fn identity(config: &CliConfig, jar_path: PathBuf, format: OutputFormat) -> CliResult<()> {
    let ctx = Arc::new(NativeContext::open("", &config.host, jar_path)?);
    let stored = IdentityStore::new(ctx).read(&config.pipeline.identity.cookie_name);

    match format {
        OutputFormat::Json => output::print_single(&json!({ "identifier": stored })),
        OutputFormat::Text => {
            match stored {
                Some(identifier) => println!("{}", identifier),
                None => output::print_warning("No stored identifier"),
            }
            Ok(())
        }
    }
}

/// Clear the cookie jar.
pub fn forget(config: &CliConfig, jar_path: PathBuf) -> CliResult<()> {
    let ctx = NativeContext::open("", &config.host, jar_path)?;
    ctx.clear_storage()?;
    output::print_success(&format!("Cleared {}", ctx.jar_path().display()));
    Ok(())
}

/// Print the effective configuration.
pub fn show_config(config: &CliConfig, jar_path: PathBuf, format: OutputFormat) -> CliResult<()> {
    let mut effective = config.clone();
    effective.jar = Some(jar_path);

    match format {
        OutputFormat::Json => output::print_single(&effective),
        OutputFormat::Text => {
            print!("{}", effective.to_toml()?);
            Ok(())
        }
    }
}

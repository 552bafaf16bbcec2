//! Output formatting utilities

use colored::*;
use serde::Serialize;
use serde_json::json;
use tracemark_core::{DisclosureField, DisclosureRenderer, PipelineOutcome};

use crate::error::CliResult;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Prints the disclosure as an aligned label/value listing.
///
/// Silent in JSON mode; the fields are part of the printed outcome there.
#[derive(Debug, Clone, Copy)]
pub struct TerminalRenderer {
    format: OutputFormat,
}

impl TerminalRenderer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl DisclosureRenderer for TerminalRenderer {
    fn render(&self, fields: &[DisclosureField]) {
        if self.format == OutputFormat::Json {
            return;
        }
        let width = fields.iter().map(|f| f.label.len()).max().unwrap_or(0);
        println!("{}", "Collected attributes".bold());
        for field in fields {
            let label = format!("{:<width$}", format!("{}:", field.label), width = width + 1);
            println!("  {}  {}", label.cyan(), abbreviate(&field.value));
        }
    }
}

/// Shorten long values such as raster data URLs for terminal display.
fn abbreviate(value: &str) -> String {
    const MAX_CHARS: usize = 72;
    if value.chars().count() <= MAX_CHARS {
        return value.to_string();
    }
    let head: String = value.chars().take(MAX_CHARS - 3).collect();
    format!("{}...", head)
}

/// Print the pipeline outcome in the requested format.
pub fn print_outcome(outcome: &PipelineOutcome, format: OutputFormat) -> CliResult<()> {
    match (outcome, format) {
        (PipelineOutcome::Redirected { url, identity, geo }, OutputFormat::Json) => print_single(
            &json!({
                "outcome": "redirected",
                "url": url,
                "identifier": identity.identifier,
                "minted": identity.minted,
                "persisted": identity.persisted,
                "geo": geo,
            }),
        ),
        (PipelineOutcome::Disclosed { fields, geo }, OutputFormat::Json) => print_single(&json!({
            "outcome": "disclosed",
            "fields": fields,
            "geo": geo,
        })),
        (PipelineOutcome::Redirected { url, identity, .. }, OutputFormat::Text) => {
            if identity.minted {
                print_info(&format!("New identifier {}", identity.identifier));
            }
            if !identity.persisted {
                print_warning("Identifier could not be stored; it will change next run");
            }
            println!("{}", url);
            Ok(())
        }
        (PipelineOutcome::Disclosed { .. }, OutputFormat::Text) => Ok(()),
    }
}

/// Print a single item as pretty JSON
pub fn print_single<T: Serialize>(data: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message);
}

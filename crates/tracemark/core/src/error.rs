//! Error types for tracemark-core.
//!
//! Most failures here are absorbed at the component that produced them and
//! turned into placeholder values. Only [`PipelineError`] reaches callers of
//! [`IdentityPipeline::run`](crate::IdentityPipeline::run).

use thiserror::Error;

/// Failures raised by a [`BrowserContext`](crate::BrowserContext) capability.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The offscreen raster surface could not be created.
    #[error("rendering surface unavailable")]
    RenderingUnavailable,

    /// Client-side storage refused the write (disabled, full, blocked).
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The digest primitive is missing or failed.
    #[error("digest unavailable: {0}")]
    DigestUnavailable(String),

    /// A storage record could not be parsed.
    #[error("invalid cookie record: {0}")]
    InvalidCookie(String),
}

/// Result type for context capabilities.
pub type ContextResult<T> = Result<T, ContextError>;

/// Failures of the remote enrichment lookup.
///
/// Every variant is recovered by [`GeoEnrichment::fetch`](crate::GeoEnrichment::fetch)
/// as the placeholder record.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// The lookup did not complete within its budget.
    #[error("enrichment lookup timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection or protocol failure.
    #[error("enrichment transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("enrichment endpoint returned status {0}")]
    Status(u16),

    /// The body was not the expected JSON shape.
    #[error("enrichment response could not be parsed: {0}")]
    Parse(String),

    /// The endpoint reported failure inside a success response.
    #[error("enrichment lookup rejected: {0}")]
    Rejected(String),
}

/// Result type for enrichment lookups.
pub type EnrichmentResult<T> = Result<T, EnrichmentError>;

/// Failures composing the outbound redirect.
#[derive(Debug, Error)]
pub enum RedirectError {
    /// The routing target is not an absolute URL.
    #[error("invalid redirect target '{0}'")]
    InvalidBase(String),

    /// The routing target uses a scheme other than http or https.
    #[error("unsupported redirect scheme '{0}'")]
    UnsupportedScheme(String),
}

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value the pipeline cannot work with.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Unrecoverable pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No identifier could be produced for the redirect route.
    #[error("identity generation failed: {0}")]
    IdentityGeneration(String),

    /// The routing target could not be turned into a redirect URL.
    #[error("redirect composition failed: {0}")]
    Redirect(#[from] RedirectError),

    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A component could not be constructed.
    #[error("pipeline setup failed: {0}")]
    Setup(String),

    /// The pipeline was already run; one run per page load.
    #[error("pipeline has already run")]
    AlreadyRan,
}

/// Result type for pipeline runs.
pub type PipelineResult<T> = Result<T, PipelineError>;

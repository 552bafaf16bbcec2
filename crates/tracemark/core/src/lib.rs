//! # Tracemark Core - Identity Derivation and Redirect Composition
//!
//! Derives a stable pseudo-identifier for a visiting browser, enriches it with
//! network location data, and either redirects the visitor to a caller-chosen
//! destination carrying that data as query parameters, or hands a disclosure
//! of the same attributes to a renderer.
//!
//! ## Key Components
//!
//! - [`BrowserContext`]: capabilities of the page (storage, raster, navigation,
//!   device attributes), injected so every component is testable
//! - [`entropy`]: ordered entropy sample with literal fallbacks
//! - [`IdentityStore`]: persisted identifier with multi-year expiry
//! - [`GeoEnrichment`]: time-bounded network lookup that never fails
//! - [`redirect`]: passthrough + derived parameter composition
//! - [`IdentityPipeline`]: the orchestrator
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracemark_core::{IdentityPipeline, MemoryContext, NoopRenderer, PipelineConfig};
//!
//! # async fn example() -> Result<(), tracemark_core::PipelineError> {
//! let ctx = Arc::new(MemoryContext::desktop(
//!     "redirect=https%3A%2F%2Fshop.example%2Flanding&utm_source=mail",
//! ));
//! let mut pipeline = IdentityPipeline::new(ctx.clone(), PipelineConfig::default())?;
//! let outcome = pipeline.run(&NoopRenderer).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Model
//!
//! Recoverable conditions are absorbed where they happen: missing attributes
//! become `"Unknown"`, a missing raster becomes `"Unavailable"`, a failed
//! lookup becomes an all-`"N/A"` [`GeoRecord`], and a failed storage write
//! leaves the run with an unpersisted identifier. Only identity derivation
//! failure and an unusable redirect target stop the redirect route.

pub mod config;
pub mod context;
pub mod disclosure;
pub mod entropy;
pub mod error;
pub mod geo;
pub mod identity;
pub mod pipeline;
pub mod redirect;
pub mod request;

// Re-export main types
pub use config::{GeoConfig, IdentityConfig, PipelineConfig};
pub use context::{
    BatteryStatus, BrowserContext, CookieJar, DeviceProfile, MemoryContext, ScreenResolution,
};
pub use disclosure::{DisclosureField, DisclosureRenderer, NoopRenderer};
pub use entropy::{EntropyAttribute, EntropySample};
pub use error::{
    ConfigError, ContextError, ContextResult, EnrichmentError, EnrichmentResult, PipelineError,
    PipelineResult, RedirectError,
};
pub use geo::{GeoEnrichment, GeoRecord};
pub use identity::{Identifier, IdentityStore};
pub use pipeline::{
    IdentityPipeline, PipelineOutcome, PipelineState, ResolvedIdentity, RouteKind, TerminalState,
};
pub use redirect::{compose, RedirectTarget};
pub use request::{RequestParams, Route};

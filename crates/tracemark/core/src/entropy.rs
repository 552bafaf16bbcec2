//! Entropy collection.
//!
//! Reads a fixed, ordered list of environment attributes from the
//! [`BrowserContext`] and joins them into the canonical string the identifier
//! is derived from. Missing attributes become literal fallbacks so the joined
//! sample is always well-formed.

use chrono::SecondsFormat;
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::BrowserContext;
use crate::error::{ContextError, ContextResult};

/// Separator between attributes in the joined sample.
pub const SAMPLE_SEPARATOR: &str = "||";

/// Fallback for device attributes the host does not expose.
pub const UNKNOWN: &str = "Unknown";

/// Fallback fingerprint when no raster surface can be created.
pub const RENDERING_FALLBACK: &str = "Unavailable";

/// Sampled attributes, in digest order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntropyAttribute {
    UserAgent,
    Platform,
    ScreenResolution,
    DeviceMemory,
    HardwareConcurrency,
    RenderingFingerprint,
    Timestamp,
    Nonce,
}

impl EntropyAttribute {
    pub const ORDER: [EntropyAttribute; 8] = [
        EntropyAttribute::UserAgent,
        EntropyAttribute::Platform,
        EntropyAttribute::ScreenResolution,
        EntropyAttribute::DeviceMemory,
        EntropyAttribute::HardwareConcurrency,
        EntropyAttribute::RenderingFingerprint,
        EntropyAttribute::Timestamp,
        EntropyAttribute::Nonce,
    ];

    /// Human-readable label used by the disclosure surface.
    pub fn label(&self) -> &'static str {
        match self {
            EntropyAttribute::UserAgent => "User Agent",
            EntropyAttribute::Platform => "Platform",
            EntropyAttribute::ScreenResolution => "Screen Resolution",
            EntropyAttribute::DeviceMemory => "Device Memory (GB)",
            EntropyAttribute::HardwareConcurrency => "CPU Cores",
            EntropyAttribute::RenderingFingerprint => "Canvas Fingerprint",
            EntropyAttribute::Timestamp => "Timestamp",
            EntropyAttribute::Nonce => "Nonce",
        }
    }
}

/// One collected set of attribute values.
///
/// Built fresh on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntropySample {
    pub user_agent: String,
    pub platform: String,
    pub screen_resolution: String,
    pub device_memory: String,
    pub hardware_concurrency: String,
    pub rendering_fingerprint: String,
    pub timestamp: String,
    pub nonce: String,
}

impl EntropySample {
    pub fn value(&self, attribute: EntropyAttribute) -> &str {
        match attribute {
            EntropyAttribute::UserAgent => &self.user_agent,
            EntropyAttribute::Platform => &self.platform,
            EntropyAttribute::ScreenResolution => &self.screen_resolution,
            EntropyAttribute::DeviceMemory => &self.device_memory,
            EntropyAttribute::HardwareConcurrency => &self.hardware_concurrency,
            EntropyAttribute::RenderingFingerprint => &self.rendering_fingerprint,
            EntropyAttribute::Timestamp => &self.timestamp,
            EntropyAttribute::Nonce => &self.nonce,
        }
    }

    /// Attribute/value pairs in digest order.
    pub fn entries(&self) -> impl Iterator<Item = (EntropyAttribute, &str)> + '_ {
        EntropyAttribute::ORDER
            .into_iter()
            .map(move |attribute| (attribute, self.value(attribute)))
    }

    /// Canonical digest input.
    pub fn joined(&self) -> String {
        self.entries()
            .map(|(_, value)| value)
            .collect::<Vec<_>>()
            .join(SAMPLE_SEPARATOR)
    }
}

/// Draw the fingerprint scene and return its encoding.
///
/// Fails with [`ContextError::RenderingUnavailable`] when the host has no
/// raster surface, or hands back an empty encoding.
pub fn render_fingerprint<C: BrowserContext + ?Sized>(ctx: &C) -> ContextResult<String> {
    let encoded = ctx.render_raster()?;
    if encoded.trim().is_empty() {
        return Err(ContextError::RenderingUnavailable);
    }
    Ok(encoded)
}

/// Collect a fresh [`EntropySample`].
pub fn collect<C: BrowserContext + ?Sized>(ctx: &C) -> EntropySample {
    let rendering_fingerprint = match render_fingerprint(ctx) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(error = %e, "Rendering fingerprint unavailable, using fallback");
            RENDERING_FALLBACK.to_string()
        }
    };

    let sample = EntropySample {
        user_agent: non_empty(ctx.user_agent()),
        platform: non_empty(ctx.platform()),
        screen_resolution: non_empty(ctx.screen_resolution().map(|s| s.to_string())),
        device_memory: non_empty(ctx.device_memory().map(|gb| gb.to_string())),
        hardware_concurrency: non_empty(ctx.hardware_concurrency().map(|n| n.to_string())),
        rendering_fingerprint,
        timestamp: ctx.now().to_rfc3339_opts(SecondsFormat::Millis, true),
        nonce: ctx.nonce().to_string(),
    };

    debug!(
        screen = %sample.screen_resolution,
        cores = %sample.hardware_concurrency,
        "Collected entropy sample"
    );
    sample
}

fn non_empty(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNKNOWN.to_string(),
    }
}

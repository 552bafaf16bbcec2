//! Pipeline configuration.
//!
//! Defines the routing key, identity persistence, enrichment endpoint and
//! navigation timing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Query parameter naming the redirect destination.
pub const DEFAULT_ROUTING_KEY: &str = "redirect";

/// Storage key of the persisted identifier.
pub const DEFAULT_COOKIE_NAME: &str = "uniqueID";

/// Roughly ten years.
pub const DEFAULT_TTL_DAYS: u32 = 3650;

/// Upper bound on the identifier lifetime; keeps expiry dates within four-digit years.
pub const MAX_TTL_DAYS: u32 = 36_500;

pub const DEFAULT_GEO_ENDPOINT: &str = "https://ipinfo.io/json";

pub const DEFAULT_GEO_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_NAVIGATION_DELAY_MS: u64 = 500;

/// Fields requested from the enrichment endpoint.
pub const DEFAULT_GEO_FIELDS: [&str; 7] = ["status", "country", "region", "city", "ip", "org", "loc"];

/// Top-level configuration for an [`IdentityPipeline`](crate::IdentityPipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Query parameter whose presence selects the redirect route.
    pub routing_key: String,

    /// Identity persistence.
    pub identity: IdentityConfig,

    /// Remote enrichment.
    pub geo: GeoConfig,

    /// Pause between composing the redirect and navigating.
    pub navigation_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            routing_key: DEFAULT_ROUTING_KEY.to_string(),
            identity: IdentityConfig::default(),
            geo: GeoConfig::default(),
            navigation_delay_ms: DEFAULT_NAVIGATION_DELAY_MS,
        }
    }
}

impl PipelineConfig {
    pub fn navigation_delay(&self) -> Duration {
        Duration::from_millis(self.navigation_delay_ms)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.routing_key.trim().is_empty() {
            return Err(ConfigError::Invalid("routing_key must not be empty".into()));
        }
        if self.routing_key.contains(['&', '=', '#']) {
            return Err(ConfigError::Invalid(format!(
                "routing_key '{}' contains a reserved character",
                self.routing_key
            )));
        }
        self.identity.validate()?;
        self.geo.validate()
    }
}

/// Identity persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Storage key holding the identifier.
    pub cookie_name: String,

    /// Lifetime of the stored record in days.
    pub ttl_days: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            ttl_days: DEFAULT_TTL_DAYS,
        }
    }
}

impl IdentityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let name = self.cookie_name.as_str();
        if name.is_empty() || name.contains([';', '=', ' ', ',']) {
            return Err(ConfigError::Invalid(format!(
                "cookie_name '{}' is not a valid cookie name",
                name
            )));
        }
        if self.ttl_days == 0 || self.ttl_days > MAX_TTL_DAYS {
            return Err(ConfigError::Invalid(format!(
                "ttl_days must be between 1 and {}",
                MAX_TTL_DAYS
            )));
        }
        Ok(())
    }
}

/// Enrichment lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Endpoint answering with the caller's network information as JSON.
    pub endpoint: String,

    /// Hard upper bound on the lookup.
    pub timeout_ms: u64,

    /// Fields requested via the `fields` query parameter. Empty sends none.
    pub fields: Vec<String>,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GEO_ENDPOINT.to_string(),
            timeout_ms: DEFAULT_GEO_TIMEOUT_MS,
            fields: DEFAULT_GEO_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl GeoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = url::Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::Invalid(format!("geo endpoint '{}': {}", self.endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "geo endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("geo timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.routing_key, "redirect");
        assert_eq!(config.identity.cookie_name, "uniqueID");
        assert_eq!(config.geo.timeout(), Duration::from_secs(5));
        assert_eq!(config.geo.fields.len(), 7);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"routing_key":"to","geo":{"timeout_ms":250}}"#).unwrap();
        assert_eq!(config.routing_key, "to");
        assert_eq!(config.geo.timeout_ms, 250);
        assert_eq!(config.geo.endpoint, DEFAULT_GEO_ENDPOINT);
        assert_eq!(config.identity.ttl_days, DEFAULT_TTL_DAYS);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.routing_key = "a=b".into();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.identity.cookie_name = "unique id".into();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.geo.endpoint = "ftp://example.test".into();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.geo.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ttl_bounds() {
        let mut config = PipelineConfig::default();
        config.identity.ttl_days = MAX_TTL_DAYS;
        config.validate().unwrap();

        config.identity.ttl_days = MAX_TTL_DAYS + 1;
        assert!(config.validate().is_err());

        config.identity.ttl_days = u32::MAX;
        assert!(config.validate().is_err());

        config.identity.ttl_days = 0;
        assert!(config.validate().is_err());
    }
}

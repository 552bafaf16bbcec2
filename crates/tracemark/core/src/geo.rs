//! Network and location enrichment.
//!
//! One time-bounded GET to a network-information endpoint. Any failure
//! (timeout, transport, status, body) resolves to the placeholder
//! [`GeoRecord`], so callers always receive a complete record.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::GeoConfig;
use crate::error::{EnrichmentError, EnrichmentResult};

/// Value used for every field the lookup could not provide.
pub const PLACEHOLDER: &str = "N/A";

/// Location attributes of the visitor's network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoRecord {
    pub ip: String,
    pub city: String,
    pub region: String,
    pub country: String,
    /// `latitude,longitude`.
    pub coordinates: String,
    pub organization: String,
}

impl GeoRecord {
    /// Record with every field set to [`PLACEHOLDER`].
    pub fn placeholder() -> Self {
        Self {
            ip: PLACEHOLDER.to_string(),
            city: PLACEHOLDER.to_string(),
            region: PLACEHOLDER.to_string(),
            country: PLACEHOLDER.to_string(),
            coordinates: PLACEHOLDER.to_string(),
            organization: PLACEHOLDER.to_string(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }

    /// `city,region,country` as carried by the redirect.
    pub fn location(&self) -> String {
        format!("{},{},{}", self.city, self.region, self.country)
    }
}

impl Default for GeoRecord {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Union of the ipinfo-style and ip-api-style response bodies.
#[derive(Debug, Default, Deserialize)]
struct GeoResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(alias = "query")]
    ip: Option<String>,
    city: Option<String>,
    region: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    country: Option<String>,
    loc: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    org: Option<String>,
    isp: Option<String>,
}

impl GeoResponse {
    fn into_record(self) -> EnrichmentResult<GeoRecord> {
        if let Some(status) = self.status.as_deref() {
            if !status.eq_ignore_ascii_case("success") {
                return Err(EnrichmentError::Rejected(
                    self.message.unwrap_or_else(|| status.to_string()),
                ));
            }
        }

        let coordinates = match (self.loc, self.lat, self.lon) {
            (Some(loc), _, _) if !loc.trim().is_empty() => Some(loc),
            (_, Some(lat), Some(lon)) => Some(format!("{},{}", lat, lon)),
            _ => None,
        };

        Ok(GeoRecord {
            ip: or_placeholder(self.ip),
            city: or_placeholder(self.city),
            region: or_placeholder(non_empty(self.region).or(self.region_name)),
            country: or_placeholder(self.country),
            coordinates: or_placeholder(coordinates),
            organization: or_placeholder(non_empty(self.org).or(self.isp)),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn or_placeholder(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Remote lookup client.
#[derive(Debug, Clone)]
pub struct GeoEnrichment {
    client: Client,
    config: GeoConfig,
}

impl GeoEnrichment {
    /// Create a lookup client for `config`.
    ///
    /// The client carries no timeout of its own; [`fetch`](Self::fetch)
    /// bounds the whole exchange.
    pub fn new(config: GeoConfig) -> EnrichmentResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| EnrichmentError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: GeoConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &GeoConfig {
        &self.config
    }

    /// Look up the caller's network, giving up after `timeout_ms`.
    ///
    /// Never fails: errors and timeouts are logged and yield
    /// [`GeoRecord::placeholder`].
    #[instrument(skip(self), fields(endpoint = %self.config.endpoint))]
    pub async fn fetch(&self, timeout_ms: u64) -> GeoRecord {
        let start = Instant::now();
        match self.try_fetch(timeout_ms).await {
            Ok(record) => {
                debug!(
                    latency_ms = start.elapsed().as_millis() as u64,
                    country = %record.country,
                    "Enrichment lookup completed"
                );
                record
            }
            Err(e) => {
                warn!(error = %e, "Enrichment lookup failed, using placeholder record");
                GeoRecord::placeholder()
            }
        }
    }

    /// [`fetch`](Self::fetch) with the configured timeout.
    pub async fn fetch_default(&self) -> GeoRecord {
        self.fetch(self.config.timeout_ms).await
    }

    /// Look up with a hard timeout, reporting why it failed.
    ///
    /// The in-flight request is dropped, and so cancelled, when the timeout
    /// fires.
    pub async fn try_fetch(&self, timeout_ms: u64) -> EnrichmentResult<GeoRecord> {
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.lookup())
            .await
            .map_err(|_| EnrichmentError::Timeout { timeout_ms })?
    }

    async fn lookup(&self) -> EnrichmentResult<GeoRecord> {
        let mut request = self.client.get(self.config.endpoint.as_str());
        if !self.config.fields.is_empty() {
            request = request.query(&[("fields", self.config.fields.join(","))]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EnrichmentError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| EnrichmentError::Transport(e.to_string()))?;
        let parsed: GeoResponse =
            serde_json::from_slice(&body).map_err(|e| EnrichmentError::Parse(e.to_string()))?;
        parsed.into_record()
    }
}

//! Browser capabilities injected into the pipeline.
//!
//! Everything the pipeline needs from the page lives behind
//! [`BrowserContext`]: the query string, client-side storage, an offscreen
//! raster, navigation, and the device attributes used as entropy sources.
//! Components never reach for global page state directly.

mod cookie;
mod memory;

pub use cookie::{CookieJar, StoredCookie, COOKIE_DATE_FORMAT};
pub use memory::MemoryContext;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ContextResult;

/// Display dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenResolution {
    pub width: u32,
    pub height: u32,
}

impl ScreenResolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ScreenResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Battery reading exposed by the host, if any.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Charge level between 0.0 and 1.0.
    pub level: f64,
    pub charging: bool,
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let percent = (self.level.clamp(0.0, 1.0) * 100.0).round();
        if self.charging {
            write!(f, "{}% (charging)", percent)
        } else {
            write!(f, "{}%", percent)
        }
    }
}

/// Static device attributes a host reports.
///
/// Every field is optional; readers that find nothing fall back to a literal
/// placeholder rather than an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub screen: Option<ScreenResolution>,
    /// Approximate RAM in GiB, as browsers report it.
    pub device_memory: Option<f64>,
    pub hardware_concurrency: Option<u32>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub timezone: Option<String>,
    pub battery: Option<BatteryStatus>,
}

/// Capability object standing in for the page.
///
/// Only the query string, storage, raster, and navigation are required.
/// Attribute readers default to "not available" and the crypto and clock
/// hooks default to real implementations.
pub trait BrowserContext: Send + Sync {
    /// Raw query string of the current page, without the leading `?`.
    fn query_string(&self) -> String;

    /// Current storage contents in `name=value; name2=value2` form.
    fn read_storage(&self) -> String;

    /// Persist one `name=value; attr; attr` record.
    fn write_storage(&self, record: &str) -> ContextResult<()>;

    /// Draw the fixed fingerprint scene offscreen and return it encoded.
    fn render_raster(&self) -> ContextResult<String>;

    /// Leave the page. Fire and forget.
    fn navigate(&self, url: &str);

    fn user_agent(&self) -> Option<String> {
        None
    }

    fn platform(&self) -> Option<String> {
        None
    }

    fn screen_resolution(&self) -> Option<ScreenResolution> {
        None
    }

    fn device_memory(&self) -> Option<f64> {
        None
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        None
    }

    fn languages(&self) -> Vec<String> {
        Vec::new()
    }

    /// IANA timezone name, e.g. `Europe/Paris`.
    fn timezone(&self) -> Option<String> {
        None
    }

    fn battery(&self) -> Option<BatteryStatus> {
        None
    }

    fn cookies_enabled(&self) -> bool {
        true
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Random value in `[0, 1)`.
    fn nonce(&self) -> f64 {
        rand::random::<f64>()
    }

    /// SHA-256 of `data`.
    fn digest(&self, data: &[u8]) -> ContextResult<Vec<u8>> {
        Ok(Sha256::digest(data).to_vec())
    }
}

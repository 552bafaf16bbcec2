//! CLI configuration

use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracemark_core::PipelineConfig;

/// CLI configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CliConfig {
    /// Cookie jar location; defaults to the user data directory.
    pub jar: Option<PathBuf>,

    /// Device attributes reported by the native host.
    pub host: HostConfig,

    pub pipeline: PipelineConfig,
}

/// Overrides for attributes the host cannot discover on its own.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HostConfig {
    pub user_agent: Option<String>,

    /// Screen resolution as `WIDTHxHEIGHT`.
    pub screen: Option<String>,

    pub device_memory_gb: Option<f64>,

    /// Preferred languages; read from `LANG` when empty.
    pub languages: Vec<String>,

    /// IANA timezone name; read from `TZ` when unset.
    pub timezone: Option<String>,
}

impl CliConfig {
    /// Load configuration from file, or defaults if the file does not exist.
    pub fn load(path: Option<&str>) -> CliResult<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&contents)
        } else {
            Ok(CliConfig::default())
        }
    }

    pub fn from_toml(contents: &str) -> CliResult<Self> {
        toml::from_str(contents).map_err(|e| CliError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> CliResult<String> {
        toml::to_string_pretty(self).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Resolved cookie jar path.
    pub fn jar_path(&self) -> CliResult<PathBuf> {
        match &self.jar {
            Some(path) => Ok(path.clone()),
            None => {
                let data_dir = dirs::data_dir()
                    .ok_or_else(|| CliError::Config("Cannot find data directory".into()))?;
                Ok(data_dir.join("tracemark").join("cookies.json"))
            }
        }
    }

    /// Apply command-line overrides on top of the file values.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(path) = &overrides.jar {
            self.jar = Some(path.clone());
        }
        if let Some(endpoint) = &overrides.geo_endpoint {
            self.pipeline.geo.endpoint = endpoint.clone();
        }
        if let Some(timeout_ms) = overrides.geo_timeout_ms {
            self.pipeline.geo.timeout_ms = timeout_ms;
        }
        if let Some(key) = &overrides.routing_key {
            self.pipeline.routing_key = key.clone();
        }
        if let Some(delay_ms) = overrides.delay_ms {
            self.pipeline.navigation_delay_ms = delay_ms;
        }
    }

    fn default_config_path() -> CliResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Cannot find config directory".into()))?;
        Ok(config_dir.join("tracemark").join("config.toml"))
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub jar: Option<PathBuf>,
    pub geo_endpoint: Option<String>,
    pub geo_timeout_ms: Option<u64>,
    pub routing_key: Option<String>,
    pub delay_ms: Option<u64>,
}

/// Parse `1920x1080` into width and height.
pub fn parse_screen(value: &str) -> Option<(u32, u32)> {
    let (width, height) = value.trim().split_once(['x', 'X'])?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}

/// Convert a POSIX locale such as `en_US.UTF-8` into a language tag.
pub fn language_from_locale(locale: &str) -> Option<String> {
    let tag = locale.split(['.', '@']).next()?.trim();
    if tag.is_empty() || tag == "C" || tag == "POSIX" {
        return None;
    }
    Some(tag.replace('_', "-"))
}

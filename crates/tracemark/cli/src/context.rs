//! Native host for the pipeline.
//!
//! Storage is a JSON cookie jar on disk, device attributes come from the
//! operating system and the `[host]` config table, and navigation is recorded
//! for the caller to print.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracemark_core::context::CookieJar;
use tracemark_core::{
    BrowserContext, ContextError, ContextResult, DeviceProfile, ScreenResolution,
};
use tracing::{debug, info};

use crate::config::{language_from_locale, parse_screen, HostConfig};
use crate::error::{CliError, CliResult};
use crate::raster;

/// Page backed by the local machine.
pub struct NativeContext {
    query: String,
    device: DeviceProfile,
    jar_path: PathBuf,
    jar: Mutex<CookieJar>,
    navigation: Mutex<Option<String>>,
}

impl NativeContext {
    /// Open the page for `query`, loading the jar at `jar_path` if present.
    pub fn open(query: &str, host: &HostConfig, jar_path: PathBuf) -> CliResult<Self> {
        let jar = load_jar(&jar_path)?;
        debug!(path = %jar_path.display(), cookies = jar.len(), "Loaded cookie jar");

        Ok(Self {
            query: query.trim_start_matches('?').to_string(),
            device: device_profile(host, |key| std::env::var(key).ok()),
            jar_path,
            jar: Mutex::new(jar),
            navigation: Mutex::new(None),
        })
    }

    pub fn jar_path(&self) -> &Path {
        &self.jar_path
    }

    /// URL passed to the last navigation, if any.
    pub fn navigated(&self) -> Option<String> {
        lock(&self.navigation).clone()
    }

    /// Drop every stored cookie and remove the jar file.
    pub fn clear_storage(&self) -> CliResult<()> {
        *lock(&self.jar) = CookieJar::new();
        match std::fs::remove_file(&self.jar_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, jar: &CookieJar) -> ContextResult<()> {
        let storage_error = |e: &dyn std::fmt::Display| {
            ContextError::StorageUnavailable(format!("{}: {}", self.jar_path.display(), e))
        };

        if let Some(parent) = self.jar_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| storage_error(&e))?;
            }
        }
        let contents = serde_json::to_string_pretty(jar).map_err(|e| storage_error(&e))?;
        std::fs::write(&self.jar_path, contents).map_err(|e| storage_error(&e))
    }
}

impl BrowserContext for NativeContext {
    fn query_string(&self) -> String {
        self.query.clone()
    }

    fn read_storage(&self) -> String {
        lock(&self.jar).header(Utc::now())
    }

    fn write_storage(&self, record: &str) -> ContextResult<()> {
        let mut jar = lock(&self.jar);
        let mut updated = jar.clone();
        updated.set(record, Utc::now())?;
        updated.purge_expired(Utc::now());
        self.save(&updated)?;
        *jar = updated;
        Ok(())
    }

    fn render_raster(&self) -> ContextResult<String> {
        let traits = format!(
            "{} {}",
            self.device.platform.as_deref().unwrap_or_default(),
            self.device.hardware_concurrency.unwrap_or_default()
        );
        Ok(raster::render(&traits))
    }

    fn navigate(&self, url: &str) {
        info!(url, "Navigation requested");
        *lock(&self.navigation) = Some(url.to_string());
    }

    fn user_agent(&self) -> Option<String> {
        self.device.user_agent.clone()
    }

    fn platform(&self) -> Option<String> {
        self.device.platform.clone()
    }

    fn screen_resolution(&self) -> Option<ScreenResolution> {
        self.device.screen
    }

    fn device_memory(&self) -> Option<f64> {
        self.device.device_memory
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        self.device.hardware_concurrency
    }

    fn languages(&self) -> Vec<String> {
        self.device.languages.clone()
    }

    fn timezone(&self) -> Option<String> {
        self.device.timezone.clone()
    }
}

/// Build the device profile from config, falling back to the environment.
pub fn device_profile<F>(host: &HostConfig, env: F) -> DeviceProfile
where
    F: Fn(&str) -> Option<String>,
{
    let platform = format!("{} {}", std::env::consts::OS, std::env::consts::ARCH);
    let user_agent = host.user_agent.clone().unwrap_or_else(|| {
        format!("tracemark/{} ({})", env!("CARGO_PKG_VERSION"), platform)
    });

    let languages = if host.languages.is_empty() {
        env("LANGUAGE")
            .filter(|v| !v.is_empty())
            .map(|v| v.split(':').filter_map(language_from_locale).collect())
            .or_else(|| env("LANG").and_then(|v| language_from_locale(&v)).map(|l| vec![l]))
            .unwrap_or_default()
    } else {
        host.languages.clone()
    };

    let timezone = host.timezone.clone().or_else(|| {
        env("TZ")
            .map(|tz| tz.trim_start_matches(':').to_string())
            .filter(|tz| !tz.is_empty())
    });

    DeviceProfile {
        user_agent: Some(user_agent),
        platform: Some(platform),
        screen: host
            .screen
            .as_deref()
            .and_then(parse_screen)
            .map(|(w, h)| ScreenResolution::new(w, h)),
        device_memory: host.device_memory_gb,
        hardware_concurrency: std::thread::available_parallelism()
            .ok()
            .and_then(|n| u32::try_from(n.get()).ok()),
        languages,
        timezone,
        battery: None,
    }
}

fn load_jar(path: &Path) -> CliResult<CookieJar> {
    if !path.exists() {
        return Ok(CookieJar::new());
    }
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(CookieJar::new());
    }
    let mut jar: CookieJar = serde_json::from_str(&contents)
        .map_err(|e| CliError::Jar(format!("{}: {}", path.display(), e)))?;
    jar.purge_expired(Utc::now());
    Ok(jar)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_profile_from_environment() {
        let profile = device_profile(
            &HostConfig::default(),
            env_of(&[("LANG", "fr_FR.UTF-8"), ("TZ", ":Europe/Paris")]),
        );
        assert_eq!(profile.languages, vec!["fr-FR".to_string()]);
        assert_eq!(profile.timezone.as_deref(), Some("Europe/Paris"));
        assert!(profile.user_agent.unwrap().starts_with("tracemark/"));
        assert!(profile.screen.is_none());
    }

    #[test]
    fn test_config_wins_over_environment() {
        let host = HostConfig {
            user_agent: Some("Mozilla/5.0 (X11)".into()),
            screen: Some("1280x720".into()),
            languages: vec!["de-DE".into()],
            timezone: Some("Europe/Berlin".into()),
            ..HostConfig::default()
        };
        let profile = device_profile(&host, env_of(&[("LANG", "en_US.UTF-8"), ("TZ", "UTC")]));
        assert_eq!(profile.user_agent.as_deref(), Some("Mozilla/5.0 (X11)"));
        assert_eq!(profile.screen, Some(ScreenResolution::new(1280, 720)));
        assert_eq!(profile.languages, vec!["de-DE".to_string()]);
        assert_eq!(profile.timezone.as_deref(), Some("Europe/Berlin"));
    }

    #[test]
    fn test_language_list() {
        let profile = device_profile(
            &HostConfig::default(),
            env_of(&[("LANGUAGE", "en_GB:en"), ("LANG", "C")]),
        );
        assert_eq!(profile.languages, vec!["en-GB".to_string(), "en".to_string()]);
        assert!(profile.timezone.is_none());
    }

    #[test]
    fn test_storage_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cookies.json");

        let ctx = NativeContext::open("", &HostConfig::default(), path.clone()).unwrap();
        ctx.write_storage("uniqueID=abc; path=/").unwrap();
        assert!(path.exists());

        let reopened = NativeContext::open("", &HostConfig::default(), path).unwrap();
        assert_eq!(reopened.read_storage(), "uniqueID=abc");

        reopened.clear_storage().unwrap();
        assert_eq!(reopened.read_storage(), "");
        assert!(!reopened.jar_path().exists());
    }

    #[test]
    fn test_unwritable_jar_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let ctx =
            NativeContext::open("", &HostConfig::default(), blocker.join("cookies.json")).unwrap();
        assert!(matches!(
            ctx.write_storage("uniqueID=abc"),
            Err(ContextError::StorageUnavailable(_))
        ));
        assert_eq!(ctx.read_storage(), "");
    }

    #[test]
    fn test_corrupt_jar_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            NativeContext::open("", &HostConfig::default(), path),
            Err(CliError::Jar(_))
        ));
    }

    #[test]
    fn test_navigation_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = NativeContext::open(
            "?redirect=x",
            &HostConfig::default(),
            dir.path().join("cookies.json"),
        )
        .unwrap();
        assert_eq!(ctx.query_string(), "redirect=x");
        ctx.navigate("https://x.test/");
        assert_eq!(ctx.navigated().as_deref(), Some("https://x.test/"));
    }
}

//! In-memory reference implementation of [`BrowserContext`].
//!
//! Deterministic and test-friendly: storage is a [`CookieJar`], navigations
//! are recorded instead of performed, and every capability can be switched
//! off to exercise the degraded paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::{BatteryStatus, BrowserContext, CookieJar, DeviceProfile, ScreenResolution};
use crate::error::{ContextError, ContextResult};

/// Raster payload returned while rendering is available.
const MEMORY_RASTER: &str = "data:image/png;base64,dHJhY2VtYXJrLW1lbW9yeS1yYXN0ZXI=";

/// In-memory page.
pub struct MemoryContext {
    query: String,
    device: DeviceProfile,
    jar: Mutex<CookieJar>,
    navigations: Mutex<Vec<String>>,
    fixed_now: Option<DateTime<Utc>>,
    fixed_nonce: Option<f64>,
    storage_writable: AtomicBool,
    rendering_available: AtomicBool,
    digest_available: AtomicBool,
    digest_calls: AtomicUsize,
}

impl MemoryContext {
    /// Create a page loaded with `query` (no leading `?`).
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            device: DeviceProfile::default(),
            jar: Mutex::new(CookieJar::new()),
            navigations: Mutex::new(Vec::new()),
            fixed_now: None,
            fixed_nonce: None,
            storage_writable: AtomicBool::new(true),
            rendering_available: AtomicBool::new(true),
            digest_available: AtomicBool::new(true),
            digest_calls: AtomicUsize::new(0),
        }
    }

    /// A page with a plausible desktop profile.
    pub fn desktop(query: impl Into<String>) -> Self {
        Self::new(query).with_device(DeviceProfile {
            user_agent: Some(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            platform: Some("Linux x86_64".to_string()),
            screen: Some(ScreenResolution::new(1920, 1080)),
            device_memory: Some(8.0),
            hardware_concurrency: Some(8),
            languages: vec!["en-US".to_string(), "en".to_string()],
            timezone: Some("Europe/Paris".to_string()),
            battery: Some(BatteryStatus {
                level: 0.8,
                charging: false,
            }),
        })
    }

    pub fn with_device(mut self, device: DeviceProfile) -> Self {
        self.device = device;
        self
    }

    /// Pre-populate storage with a record, as a previous visit would have.
    pub fn with_cookie(self, record: &str) -> ContextResult<Self> {
        let now = self.now();
        self.jar().set(record, now)?;
        Ok(self)
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    pub fn with_nonce(mut self, nonce: f64) -> Self {
        self.fixed_nonce = Some(nonce);
        self
    }

    pub fn with_storage_disabled(self) -> Self {
        self.storage_writable.store(false, Ordering::SeqCst);
        self
    }

    pub fn without_rendering(self) -> Self {
        self.rendering_available.store(false, Ordering::SeqCst);
        self
    }

    pub fn without_digest(self) -> Self {
        self.digest_available.store(false, Ordering::SeqCst);
        self
    }

    /// Number of digest computations requested so far.
    pub fn digest_calls(&self) -> usize {
        self.digest_calls.load(Ordering::SeqCst)
    }

    /// Every URL passed to [`BrowserContext::navigate`], oldest first.
    pub fn navigations(&self) -> Vec<String> {
        lock(&self.navigations).clone()
    }

    /// Snapshot of the cookie jar.
    pub fn cookie_jar(&self) -> CookieJar {
        self.jar().clone()
    }

    fn jar(&self) -> MutexGuard<'_, CookieJar> {
        lock(&self.jar)
    }
}

// A poisoned lock only means a test panicked mid-write; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BrowserContext for MemoryContext {
    fn query_string(&self) -> String {
        self.query.clone()
    }

    fn read_storage(&self) -> String {
        self.jar().header(self.now())
    }

    fn write_storage(&self, record: &str) -> ContextResult<()> {
        if !self.storage_writable.load(Ordering::SeqCst) {
            return Err(ContextError::StorageUnavailable(
                "storage disabled".to_string(),
            ));
        }
        let now = self.now();
        self.jar().set(record, now)
    }

    fn render_raster(&self) -> ContextResult<String> {
        if self.rendering_available.load(Ordering::SeqCst) {
            Ok(MEMORY_RASTER.to_string())
        } else {
            Err(ContextError::RenderingUnavailable)
        }
    }

    fn navigate(&self, url: &str) {
        lock(&self.navigations).push(url.to_string());
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

    fn battery(&self) -> Option<BatteryStatus> {
        self.device.battery
    }

    fn cookies_enabled(&self) -> bool {
        self.storage_writable.load(Ordering::SeqCst)
    }

    fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    fn nonce(&self) -> f64 {
        self.fixed_nonce.unwrap_or_else(rand::random::<f64>)
    }

    fn digest(&self, data: &[u8]) -> ContextResult<Vec<u8>> {
        self.digest_calls.fetch_add(1, Ordering::SeqCst);
        if !self.digest_available.load(Ordering::SeqCst) {
            return Err(ContextError::DigestUnavailable(
                "digest primitive unavailable".to_string(),
            ));
        }
        Ok(Sha256::digest(data).to_vec())
    }
}

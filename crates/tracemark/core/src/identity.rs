//! Identifier derivation and persistence.
//!
//! An [`Identifier`] is the lowercase hex SHA-256 of a joined
//! [`EntropySample`]. It is minted once per device and kept in client-side
//! storage by the [`IdentityStore`]; later visits reuse the stored value.

use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::{BrowserContext, COOKIE_DATE_FORMAT};
use crate::entropy::EntropySample;
use crate::error::{ContextError, ContextResult};

/// Hex length of a SHA-256 digest.
pub const IDENTIFIER_LEN: usize = 64;

/// Device identifier: 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validate a stored or transmitted identifier.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = value.len() == IDENTIFIER_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(value.to_string()))
    }

    /// Hex-encode a 32-byte digest.
    pub fn from_digest(digest: &[u8]) -> Option<Self> {
        Self::parse(&hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identifier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::parse(&value).ok_or_else(|| format!("'{}' is not a valid identifier", value))
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// Digest a sample into a new identifier.
pub fn derive_identifier<C: BrowserContext + ?Sized>(
    ctx: &C,
    sample: &EntropySample,
) -> ContextResult<Identifier> {
    let digest = ctx.digest(sample.joined().as_bytes())?;
    Identifier::from_digest(&digest).ok_or_else(|| {
        ContextError::DigestUnavailable(format!(
            "digest produced {} bytes, expected {}",
            digest.len(),
            IDENTIFIER_LEN / 2
        ))
    })
}

/// Reads and writes the persisted identifier record.
pub struct IdentityStore<C: ?Sized> {
    ctx: Arc<C>,
}

impl<C: BrowserContext + ?Sized> IdentityStore<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx }
    }

    /// Look up `name` in storage.
    ///
    /// Returns `None` when no record exists or its value is not a valid
    /// identifier.
    pub fn read(&self, name: &str) -> Option<Identifier> {
        let raw = self.read_raw(name)?;
        let id = Identifier::parse(&raw);
        if id.is_none() {
            debug!(cookie = name, "Stored identifier is malformed, ignoring");
        }
        id
    }

    /// Raw decoded value of `name`, whatever it contains.
    pub fn read_raw(&self, name: &str) -> Option<String> {
        let storage = self.ctx.read_storage();
        storage.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            if key.trim() != name {
                return None;
            }
            percent_decode_str(value.trim())
                .decode_utf8()
                .ok()
                .map(|v| v.into_owned())
        })
    }

    /// Persist `value` under `name` for `ttl_days`.
    ///
    /// Rewriting the same value only refreshes the expiry.
    pub fn write(&self, name: &str, value: &str, ttl_days: u32) -> ContextResult<()> {
        self.record(name, value, ttl_days)
            .and_then(|record| self.ctx.write_storage(&record))
            .map_err(|e| {
                warn!(cookie = name, error = %e, "Failed to persist identifier");
                e
            })
    }

    /// Serialized storage record for `name=value`.
    ///
    /// Fails when the expiry falls outside the representable date range.
    pub fn record(&self, name: &str, value: &str, ttl_days: u32) -> ContextResult<String> {
        let expires = self
            .ctx
            .now()
            .checked_add_signed(Duration::days(i64::from(ttl_days)))
            .ok_or_else(|| {
                ContextError::StorageUnavailable(format!(
                    "expiry {} days from now is out of range",
                    ttl_days
                ))
            })?;
        Ok(format!(
            "{}={}; expires={}; path=/; SameSite=Strict; Secure",
            name,
            utf8_percent_encode(value, NON_ALPHANUMERIC),
            expires.format(COOKIE_DATE_FORMAT)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryContext;
    use crate::entropy;
    use chrono::{TimeZone, Utc};

    const ID: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    #[test]
    fn test_identifier_validation() {
        assert!(Identifier::parse(ID).is_some());
        assert!(Identifier::parse(&ID.to_uppercase()).is_none());
        assert!(Identifier::parse(&ID[..63]).is_none());
        assert!(Identifier::parse("").is_none());
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let ctx = Arc::new(MemoryContext::new(""));
        let store = IdentityStore::new(ctx.clone());

        store.write("uniqueID", ID, 3650).unwrap();
        assert_eq!(store.read("uniqueID").unwrap().as_str(), ID);

        let cookie = ctx.cookie_jar().get("uniqueID").cloned().unwrap();
        assert!(cookie.secure);
        assert_eq!(cookie.same_site.as_deref(), Some("Strict"));
        assert_eq!(cookie.path.as_deref(), Some("/"));
    }

    #[test]
    fn test_record_format() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let ctx = Arc::new(MemoryContext::new("").with_now(now));
        let store = IdentityStore::new(ctx);

        assert_eq!(
            store.record("uniqueID", "a b", 1).unwrap(),
            "uniqueID=a%20b; expires=Fri, 02 Jan 2026 00:00:00 GMT; path=/; SameSite=Strict; Secure"
        );
    }

    #[test]
    fn test_out_of_range_expiry_is_storage_failure() {
        let ctx = Arc::new(MemoryContext::new(""));
        let store = IdentityStore::new(ctx.clone());

        assert!(matches!(
            store.record("uniqueID", ID, u32::MAX),
            Err(ContextError::StorageUnavailable(_))
        ));
        assert!(matches!(
            store.write("uniqueID", ID, u32::MAX),
            Err(ContextError::StorageUnavailable(_))
        ));
        assert!(ctx.cookie_jar().is_empty());

        store.write("uniqueID", ID, crate::config::MAX_TTL_DAYS).unwrap();
        assert_eq!(store.read("uniqueID").unwrap().as_str(), ID);
    }

    #[test]
    fn test_rewrite_refreshes_expiry_only() {
        let ctx = Arc::new(MemoryContext::new(""));
        let store = IdentityStore::new(ctx.clone());

        store.write("uniqueID", ID, 1).unwrap();
        let first = ctx.cookie_jar().get("uniqueID").cloned().unwrap();
        store.write("uniqueID", ID, 30).unwrap();
        let second = ctx.cookie_jar().get("uniqueID").cloned().unwrap();

        assert_eq!(first.value, second.value);
        assert!(second.expires > first.expires);
        assert_eq!(ctx.cookie_jar().len(), 1);
    }

    #[test]
    fn test_read_ignores_other_and_malformed_records() {
        let ctx = Arc::new(
            MemoryContext::new("")
                .with_cookie("session=xyz")
                .unwrap()
                .with_cookie("uniqueID=not-a-digest")
                .unwrap(),
        );
        let store = IdentityStore::new(ctx);

        assert!(store.read("uniqueID").is_none());
        assert_eq!(store.read_raw("uniqueID").as_deref(), Some("not-a-digest"));
        assert!(store.read("missing").is_none());
    }

    #[test]
    fn test_write_failure_is_reported() {
        let ctx = Arc::new(MemoryContext::new("").with_storage_disabled());
        let store = IdentityStore::new(ctx);
        assert!(store.write("uniqueID", ID, 1).is_err());
        assert!(store.read("uniqueID").is_none());
    }

    #[test]
    fn test_nonce_changes_identifier() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = MemoryContext::desktop("").with_now(now).with_nonce(0.1);
        let b = MemoryContext::desktop("").with_now(now).with_nonce(0.2);

        let id_a = derive_identifier(&a, &entropy::collect(&a)).unwrap();
        let id_b = derive_identifier(&b, &entropy::collect(&b)).unwrap();
        assert_ne!(id_a, id_b);

        let again = derive_identifier(&a, &entropy::collect(&a)).unwrap();
        assert_eq!(id_a, again);
    }

    #[test]
    fn test_digest_failure_is_propagated() {
        let ctx = MemoryContext::desktop("").without_digest();
        let sample = entropy::collect(&ctx);
        assert!(matches!(
            derive_identifier(&ctx, &sample),
            Err(ContextError::DigestUnavailable(_))
        ));
    }
}

//! Minimal cookie jar.
//!
//! Understands the subset of the cookie format the identity store writes:
//! `name=value; expires=<date>; path=/; SameSite=Strict; Secure`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ContextError, ContextResult};

/// `expires` attribute format (RFC 1123, always GMT).
pub const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// One stored cookie and its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub value: String,
    pub expires: Option<DateTime<Utc>>,
    pub path: Option<String>,
    pub same_site: Option<String>,
    pub secure: bool,
}

impl StoredCookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires.map_or(true, |expires| expires > now)
    }
}

/// Name-keyed cookie storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar {
    cookies: BTreeMap<String, StoredCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a `name=value; attr...` record.
    ///
    /// A record whose expiry is already past removes the cookie, as a
    /// browser would.
    pub fn set(&mut self, record: &str, now: DateTime<Utc>) -> ContextResult<()> {
        let mut parts = record.split(';');
        let pair = parts.next().unwrap_or_default();
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| ContextError::InvalidCookie(format!("missing '=' in '{}'", pair)))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ContextError::InvalidCookie("empty cookie name".to_string()));
        }

        let mut cookie = StoredCookie {
            value: value.trim().to_string(),
            expires: None,
            path: None,
            same_site: None,
            secure: false,
        };

        for attr in parts {
            let attr = attr.trim();
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (attr, None),
            };
            match (key.to_ascii_lowercase().as_str(), val) {
                ("expires", Some(date)) => {
                    let parsed = NaiveDateTime::parse_from_str(date, COOKIE_DATE_FORMAT)
                        .map_err(|e| {
                            ContextError::InvalidCookie(format!("bad expires '{}': {}", date, e))
                        })?;
                    cookie.expires = Some(parsed.and_utc());
                }
                ("path", Some(path)) => cookie.path = Some(path.to_string()),
                ("samesite", Some(mode)) => cookie.same_site = Some(mode.to_string()),
                ("secure", _) => cookie.secure = true,
                // Unknown attributes are ignored, as browsers do.
                _ => {}
            }
        }

        if cookie.is_live(now) {
            self.cookies.insert(name.to_string(), cookie);
        } else {
            self.cookies.remove(name);
        }
        Ok(())
    }

    /// Live cookies in `name=value; name2=value2` form.
    pub fn header(&self, now: DateTime<Utc>) -> String {
        self.cookies
            .iter()
            .filter(|(_, cookie)| cookie.is_live(now))
            .map(|(name, cookie)| format!("{}={}", name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn get(&self, name: &str) -> Option<&StoredCookie> {
        self.cookies.get(name)
    }

    /// Drop every cookie that has expired by `now`.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.cookies.retain(|_, cookie| cookie.is_live(now));
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_set_parses_attributes() {
        let mut jar = CookieJar::new();
        jar.set(
            "uniqueID=abc; expires=Sat, 01 Mar 2036 12:00:00 GMT; path=/; SameSite=Strict; Secure",
            now(),
        )
        .unwrap();

        let cookie = jar.get("uniqueID").unwrap();
        assert_eq!(cookie.value, "abc");
        assert_eq!(cookie.path.as_deref(), Some("/"));
        assert_eq!(cookie.same_site.as_deref(), Some("Strict"));
        assert!(cookie.secure);
        assert_eq!(
            cookie.expires,
            Some(Utc.with_ymd_and_hms(2036, 3, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_header_skips_expired() {
        let mut jar = CookieJar::new();
        jar.set("a=1", now()).unwrap();
        let soon = (now() + Duration::hours(1)).format(COOKIE_DATE_FORMAT);
        jar.set(&format!("b=2; expires={}", soon), now()).unwrap();

        assert_eq!(jar.header(now()), "a=1; b=2");
        assert_eq!(jar.header(now() + Duration::hours(2)), "a=1");

        jar.purge_expired(now() + Duration::hours(2));
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn test_past_expiry_removes_cookie() {
        let mut jar = CookieJar::new();
        jar.set("a=1", now()).unwrap();
        jar.set("a=1; expires=Thu, 01 Jan 1970 00:00:00 GMT", now())
            .unwrap();
        assert!(jar.is_empty());
    }

    #[test]
    fn test_rejects_malformed_records() {
        let mut jar = CookieJar::new();
        assert!(jar.set("novalue", now()).is_err());
        assert!(jar.set("=x", now()).is_err());
        assert!(jar.set("a=1; expires=tomorrow", now()).is_err());
        assert!(jar.is_empty());
    }
}

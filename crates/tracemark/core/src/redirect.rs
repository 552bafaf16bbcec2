//! Redirect URL composition.
//!
//! Passthrough parameters and derived parameters are kept as two ordered
//! lists and concatenated, passthrough first. They are never merged key by
//! key, so neither set can overwrite the other. Passthrough segments are
//! emitted as received; derived values are percent-encoded exactly once.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::error::RedirectError;
use crate::geo::GeoRecord;

/// Derived parameter carrying the identifier.
pub const PARAM_IDENTIFIER: &str = "uniqueID";
pub const PARAM_TIMEZONE: &str = "timezone";
pub const PARAM_LOCATION: &str = "location";

/// Characters escaped in derived values.
///
/// Anything that would end or split a query component is escaped. Commas,
/// slashes and colons stay readable (`Paris,IDF,FR`, `Europe/Paris`).
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'[')
    .add(b']');

/// Destination plus the two parameter lists appended to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    base: String,
    passthrough: Vec<String>,
    derived: Vec<(String, String)>,
}

impl RedirectTarget {
    /// Start from `base`, which must be an absolute http(s) URL.
    pub fn new(base: &str) -> Result<Self, RedirectError> {
        let base = base.trim();
        let parsed = Url::parse(base).map_err(|_| RedirectError::InvalidBase(base.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RedirectError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        Ok(Self {
            base: base.to_string(),
            passthrough: Vec::new(),
            derived: Vec::new(),
        })
    }

    /// Append already-encoded `key=value` segments.
    pub fn with_passthrough<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.passthrough.extend(
            segments
                .into_iter()
                .map(|s| s.as_ref().to_string())
                .filter(|s| !s.is_empty()),
        );
        self
    }

    /// Append a derived parameter; `value` is raw and encoded on output.
    pub fn with_derived(mut self, key: &str, value: &str) -> Self {
        self.derived.push((key.to_string(), value.to_string()));
        self
    }

    pub fn passthrough(&self) -> &[String] {
        &self.passthrough
    }

    pub fn derived(&self) -> &[(String, String)] {
        &self.derived
    }

    /// Render the final URL.
    ///
    /// A fragment on the base stays at the end, after the appended query.
    pub fn to_url(&self) -> String {
        let (head, fragment) = match self.base.split_once('#') {
            Some((head, fragment)) => (head, Some(fragment)),
            None => (self.base.as_str(), None),
        };

        let block = self
            .passthrough
            .iter()
            .cloned()
            .chain(self.derived.iter().map(|(key, value)| {
                format!("{}={}", key, utf8_percent_encode(value, QUERY_VALUE))
            }))
            .collect::<Vec<_>>()
            .join("&");

        let mut url = String::with_capacity(head.len() + block.len() + 2);
        url.push_str(head);
        if !block.is_empty() {
            url.push_str(separator(head));
            url.push_str(&block);
        }
        if let Some(fragment) = fragment {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }
}

fn separator(head: &str) -> &'static str {
    if !head.contains('?') {
        "?"
    } else if head.ends_with('?') || head.ends_with('&') {
        ""
    } else {
        "&"
    }
}

/// Build the redirect URL for `base`.
///
/// `passthrough` is a raw `a=1&b=2` string forwarded as-is; it may be empty.
pub fn compose(
    base: &str,
    passthrough: &str,
    identifier: &str,
    timezone: &str,
    geo: &GeoRecord,
) -> Result<String, RedirectError> {
    let target = RedirectTarget::new(base)?
        .with_passthrough(passthrough.split('&'))
        .with_derived(PARAM_IDENTIFIER, identifier)
        .with_derived(PARAM_TIMEZONE, timezone)
        .with_derived(PARAM_LOCATION, &geo.location());
    Ok(target.to_url())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> GeoRecord {
        GeoRecord {
            city: "Paris".into(),
            region: "IDF".into(),
            country: "FR".into(),
            ..GeoRecord::placeholder()
        }
    }

    #[test]
    fn test_plain_base_with_placeholders() {
        let url = compose("https://x.test/a", "", "id1", "UTC", &GeoRecord::placeholder()).unwrap();
        assert_eq!(
            url,
            "https://x.test/a?uniqueID=id1&timezone=UTC&location=N/A,N/A,N/A"
        );
    }

    #[test]
    fn test_passthrough_comes_first() {
        let url = compose("https://x.test/a", "ref=1&utm=mail", "id1", "UTC", &paris()).unwrap();
        assert_eq!(
            url,
            "https://x.test/a?ref=1&utm=mail&uniqueID=id1&timezone=UTC&location=Paris,IDF,FR"
        );
    }

    #[test]
    fn test_base_with_query_uses_ampersand() {
        let url = compose("https://x.test/a?ref=1", "src=ad", "id1", "UTC", &paris()).unwrap();
        assert_eq!(
            url,
            "https://x.test/a?ref=1&src=ad&uniqueID=id1&timezone=UTC&location=Paris,IDF,FR"
        );

        let url = compose("https://x.test/a?", "", "id1", "UTC", &paris()).unwrap();
        assert!(url.starts_with("https://x.test/a?uniqueID=id1&"));
    }

    #[test]
    fn test_passthrough_is_not_reencoded() {
        let url = compose("https://x.test/", "q=a%20b&p=%2F", "id1", "UTC", &paris()).unwrap();
        assert!(url.starts_with("https://x.test/?q=a%20b&p=%2F&uniqueID="));
    }

    #[test]
    fn test_derived_values_encoded_once() {
        let geo = GeoRecord {
            city: "Saint-Denis & Co".into(),
            region: "A=B".into(),
            country: "100%".into(),
            ..GeoRecord::placeholder()
        };
        let url = compose("https://x.test/a", "", "id1", "America/New_York", &geo).unwrap();
        assert_eq!(
            url,
            "https://x.test/a?uniqueID=id1&timezone=America/New_York&location=Saint-Denis%20%26%20Co,A%3DB,100%25"
        );
        assert!(Url::parse(&url).is_ok());
    }

    #[test]
    fn test_fragment_stays_last() {
        let url = compose("https://x.test/a?x=1#top", "", "id1", "UTC", &paris()).unwrap();
        assert_eq!(
            url,
            "https://x.test/a?x=1&uniqueID=id1&timezone=UTC&location=Paris,IDF,FR#top"
        );
    }

    #[test]
    fn test_rejects_unsafe_targets() {
        let geo = GeoRecord::placeholder();
        assert!(matches!(
            compose("javascript:alert(1)", "", "id1", "UTC", &geo),
            Err(RedirectError::UnsupportedScheme(s)) if s == "javascript"
        ));
        assert!(matches!(
            compose("/relative/path", "", "id1", "UTC", &geo),
            Err(RedirectError::InvalidBase(_))
        ));
    }

    #[test]
    fn test_same_key_in_both_sets_is_kept_twice() {
        let target = RedirectTarget::new("https://x.test/")
            .unwrap()
            .with_passthrough(["timezone=caller"])
            .with_derived(PARAM_TIMEZONE, "UTC");
        assert_eq!(target.to_url(), "https://x.test/?timezone=caller&timezone=UTC");
    }
}

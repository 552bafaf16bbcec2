//! Incoming request parameters.
//!
//! The page's query string is read once. The routing target is decoded; every
//! other parameter is kept byte-for-byte so it can be forwarded without being
//! re-encoded.

use url::form_urlencoded;

/// Route selected by the incoming parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Send the visitor to `target`, forwarding `passthrough`.
    Redirect {
        target: String,
        passthrough: Vec<String>,
    },
    /// No routing target: show the disclosure instead.
    Disclosure,
}

/// Parsed view of the page's query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    target: Option<String>,
    passthrough: Vec<String>,
}

impl RequestParams {
    /// Split `query` (leading `?` optional) around `routing_key`.
    ///
    /// The first non-empty occurrence of the routing key wins; later ones are
    /// dropped rather than forwarded.
    pub fn parse(query: &str, routing_key: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        // A fragment is not part of the query.
        let query = query.split_once('#').map_or(query, |(head, _)| head);
        let mut target = None;
        let mut passthrough = Vec::new();

        for segment in query.split('&').filter(|s| !s.is_empty()) {
            let (raw_key, raw_value) = segment.split_once('=').unwrap_or((segment, ""));
            if decode(raw_key) != routing_key {
                passthrough.push(segment.to_string());
                continue;
            }
            let value = decode(raw_value);
            if target.is_none() && !value.trim().is_empty() {
                target = Some(value.trim().to_string());
            }
        }

        Self {
            target,
            passthrough,
        }
    }

    /// Decoded routing target, if present and non-empty.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Every non-routing `key=value` segment, verbatim, in original order.
    pub fn passthrough(&self) -> &[String] {
        &self.passthrough
    }

    pub fn route(&self) -> Route {
        match &self.target {
            Some(target) => Route::Redirect {
                target: target.clone(),
                passthrough: self.passthrough.clone(),
            },
            None => Route::Disclosure,
        }
    }
}

fn decode(raw: &str) -> String {
    form_urlencoded::parse(format!("k={}", raw).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

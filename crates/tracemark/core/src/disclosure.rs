//! Disclosure surface.
//!
//! When no routing target is present the pipeline shows the visitor what it
//! can see about them. It hands a flat, ordered list of label/value pairs to
//! a [`DisclosureRenderer`]; presentation is entirely the renderer's concern.

use serde::Serialize;

use crate::context::BrowserContext;
use crate::entropy::{EntropyAttribute, EntropySample};
use crate::geo::GeoRecord;

/// Value shown for a host attribute that could not be read.
pub const UNAVAILABLE: &str = "Unavailable";

/// One labelled line of the disclosure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisclosureField {
    pub label: String,
    pub value: String,
}

impl DisclosureField {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Paints the disclosure. Implemented by the host.
pub trait DisclosureRenderer {
    fn render(&self, fields: &[DisclosureField]);
}

/// Renderer that discards everything, for the redirect-only embedding.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRenderer;

impl DisclosureRenderer for NoopRenderer {
    fn render(&self, _fields: &[DisclosureField]) {}
}

/// Assemble the disclosure fields.
///
/// Order: device attributes, then host extras, then network attributes. Each
/// field degrades on its own; one missing value never drops the others.
pub fn disclosure_fields<C: BrowserContext + ?Sized>(
    ctx: &C,
    sample: &EntropySample,
    geo: &GeoRecord,
) -> Vec<DisclosureField> {
    let mut fields: Vec<DisclosureField> = EntropyAttribute::ORDER
        .into_iter()
        .filter(|attribute| !matches!(attribute, EntropyAttribute::Nonce))
        .map(|attribute| DisclosureField::new(attribute.label(), sample.value(attribute)))
        .collect();

    let languages: Vec<String> = ctx
        .languages()
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    fields.push(DisclosureField::new(
        "Languages",
        if languages.is_empty() {
            UNAVAILABLE.to_string()
        } else {
            languages.join(", ")
        },
    ));
    fields.push(DisclosureField::new(
        "Timezone",
        ctx.timezone()
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| UNAVAILABLE.to_string()),
    ));
    fields.push(DisclosureField::new(
        "Battery",
        ctx.battery()
            .map(|b| b.to_string())
            .unwrap_or_else(|| UNAVAILABLE.to_string()),
    ));
    fields.push(DisclosureField::new(
        "Cookies Enabled",
        if ctx.cookies_enabled() { "Yes" } else { "No" },
    ));

    fields.extend([
        DisclosureField::new("IP Address", geo.ip.as_str()),
        DisclosureField::new("City", geo.city.as_str()),
        DisclosureField::new("Region", geo.region.as_str()),
        DisclosureField::new("Country", geo.country.as_str()),
        DisclosureField::new("Coordinates", geo.coordinates.as_str()),
        DisclosureField::new("Organization", geo.organization.as_str()),
    ]);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DeviceProfile, MemoryContext};
    use crate::entropy;
    use std::cell::RefCell;

    #[derive(Default)]
    struct CapturingRenderer {
        seen: RefCell<Vec<DisclosureField>>,
    }

    impl DisclosureRenderer for CapturingRenderer {
        fn render(&self, fields: &[DisclosureField]) {
            self.seen.borrow_mut().extend_from_slice(fields);
        }
    }

    fn value<'a>(fields: &'a [DisclosureField], label: &str) -> &'a str {
        fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
            .unwrap()
    }

    #[test]
    fn test_fields_for_full_profile() {
        let ctx = MemoryContext::desktop("");
        let sample = entropy::collect(&ctx);
        let fields = disclosure_fields(&ctx, &sample, &GeoRecord::placeholder());

        assert_eq!(fields[0].label, "User Agent");
        assert_eq!(value(&fields, "Languages"), "en-US, en");
        assert_eq!(value(&fields, "Timezone"), "Europe/Paris");
        assert_eq!(value(&fields, "Battery"), "80%");
        assert_eq!(value(&fields, "City"), "N/A");
        assert!(fields.iter().all(|f| f.label != "Nonce"));
        assert_eq!(fields.last().unwrap().label, "Organization");
    }

    #[test]
    fn test_fields_degrade_individually() {
        let ctx = MemoryContext::new("").without_rendering().with_storage_disabled();
        let sample = entropy::collect(&ctx);
        let geo = GeoRecord {
            country: "FR".into(),
            ..GeoRecord::placeholder()
        };
        let fields = disclosure_fields(&ctx, &sample, &geo);

        assert_eq!(value(&fields, "Languages"), UNAVAILABLE);
        assert_eq!(value(&fields, "Battery"), UNAVAILABLE);
        assert_eq!(value(&fields, "Canvas Fingerprint"), "Unavailable");
        assert_eq!(value(&fields, "Cookies Enabled"), "No");
        assert_eq!(value(&fields, "Country"), "FR");
        assert!(fields.iter().all(|f| !f.value.is_empty()));
    }

    #[test]
    fn test_blank_host_values_are_unavailable() {
        let ctx = MemoryContext::new("").with_device(DeviceProfile {
            languages: vec![" ".into(), String::new()],
            timezone: Some("  ".into()),
            ..DeviceProfile::default()
        });
        let sample = entropy::collect(&ctx);
        let fields = disclosure_fields(&ctx, &sample, &GeoRecord::placeholder());

        assert_eq!(value(&fields, "Languages"), UNAVAILABLE);
        assert_eq!(value(&fields, "Timezone"), UNAVAILABLE);

        let ctx = MemoryContext::new("").with_device(DeviceProfile {
            languages: vec!["fr-FR".into(), "".into()],
            ..DeviceProfile::default()
        });
        let fields = disclosure_fields(&ctx, &entropy::collect(&ctx), &GeoRecord::placeholder());
        assert_eq!(value(&fields, "Languages"), "fr-FR");
    }

    #[test]
    fn test_renderer_receives_fields() {
        let renderer = CapturingRenderer::default();
        renderer.render(&[DisclosureField::new("City", "Paris")]);
        assert_eq!(renderer.seen.borrow().len(), 1);
    }
}

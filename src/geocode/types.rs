//! Core types for the geocoding pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Structured address parts. Any part may be missing or blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponents {
    #[serde(default)]
    pub street_address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl AddressComponents {
    /// True when no part carries any text.
    pub fn is_empty(&self) -> bool {
        super::address::build_address_string(self).is_empty()
    }
}

/// What the caller wants geocoded: free text or structured parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressInput {
    Query(String),
    Components(AddressComponents),
}

impl AddressInput {
    /// Normalize to the query string sent to a provider.
    pub fn to_query(&self) -> String {
        match self {
            Self::Query(q) => q.clone(),
            Self::Components(parts) => super::address::build_address_string(parts),
        }
    }
}

impl From<&str> for AddressInput {
    fn from(q: &str) -> Self {
        Self::Query(q.to_string())
    }
}

impl From<String> for AddressInput {
    fn from(q: String) -> Self {
        Self::Query(q)
    }
}

impl From<AddressComponents> for AddressInput {
    fn from(parts: AddressComponents) -> Self {
        Self::Components(parts)
    }
}

/// Per-call options for a resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolutionOptions {
    /// Explicit provider pin. Always wins over selection heuristics.
    pub provider: Option<String>,
    /// ISO 3166-1 alpha-2 country code (e.g. "GB"). Falls back to the setup default.
    pub country_code: Option<String>,
    /// Consult and fill the injected cache, if any.
    pub use_cache: bool,
    /// Per-call fetch timeout, overriding the fetcher's default.
    pub timeout: Option<Duration>,
}

impl ResolutionOptions {
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_country(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into());
        self
    }
}

/// The outcome of a resolution attempt, possibly partial.
///
/// `lat`/`lng` are only present when the provider's response matched the
/// corresponding extraction rule. Callers must check before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoResult {
    /// Unset until the caller persists the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// The query as given by the caller.
    pub key: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<String>,
    /// Any other extracted fields (postcode, country, town, ...).
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

/// Extracted field names that never override the base fields.
const RESERVED_FIELDS: &[&str] = &["id", "key", "provider"];

impl GeoResult {
    /// Assemble a result from the base fields and whatever extraction produced.
    pub fn assemble(key: &str, provider: &str, mut extracted: BTreeMap<String, String>) -> Self {
        let lat = extracted.remove("lat");
        let lng = extracted.remove("lng");
        for reserved in RESERVED_FIELDS {
            if extracted.remove(*reserved).is_some() {
                tracing::debug!(field = reserved, provider, "ignoring extracted field that shadows a base field");
            }
        }
        Self {
            id: None,
            key: key.to_string(),
            provider: provider.to_string(),
            lat,
            lng,
            fields: extracted,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }

    /// Parse the coordinates as decimals. `None` if either is missing or not numeric.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.lat.as_deref()?.trim().parse().ok()?;
        let lng = self.lng.as_deref()?.trim().parse().ok()?;
        Some((lat, lng))
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "lat" => self.lat.as_deref(),
            "lng" => self.lng.as_deref(),
            _ => self.fields.get(name).map(String::as_str),
        }
    }
}

impl fmt::Display for GeoResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lat, &self.lng) {
            (Some(lat), Some(lng)) => write!(f, "{} -> {}, {} [{}]", self.key, lat, lng, self.provider),
            _ => write!(f, "{} -> no coordinates [{}]", self.key, self.provider),
        }
    }
}

/// Transport-level failures of the fetch capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider answered with HTTP status {0}")]
    Status(u16),
    #[error("provider returned an empty body")]
    EmptyBody,
}

/// Hard failures of a resolution. A result without coordinates is not one of these.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Missing query: no usable address text")]
    EmptyQuery,
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("Provider '{0}' is disabled")]
    ProviderDisabled(String),
    #[error("Fetching from '{provider}' failed: {source}")]
    Fetch {
        provider: String,
        #[source]
        source: FetchError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn extracted(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_assemble_splits_coordinates() {
        let r = GeoResult::assemble(
            "SW1A 2AA",
            "multimap",
            extracted(&[("lat", "51.5034"), ("lng", "-0.1276"), ("postcode", "SW1A 2AA")]),
        );
        assert_eq!(r.id, None);
        assert_eq!(r.key, "SW1A 2AA");
        assert_eq!(r.provider, "multimap");
        assert_eq!(r.lat.as_deref(), Some("51.5034"));
        assert_eq!(r.field("postcode"), Some("SW1A 2AA"));
        assert!(!r.fields.contains_key("lat"));
        assert!(r.has_coordinates());
    }

    #[test]
    fn test_assemble_empty_extraction() {
        let r = GeoResult::assemble("nowhere", "google", BTreeMap::new());
        assert!(r.lat.is_none());
        assert!(r.lng.is_none());
        assert!(r.fields.is_empty());
        assert!(r.coordinates().is_none());
    }

    #[test]
    fn test_assemble_ignores_reserved_fields() {
        let r = GeoResult::assemble(
            "q",
            "google",
            extracted(&[("provider", "evil"), ("key", "other"), ("country", "GB")]),
        );
        assert_eq!(r.provider, "google");
        assert_eq!(r.key, "q");
        assert_eq!(r.fields.len(), 1);
    }

    #[test]
    fn test_coordinates_parse() {
        let r = GeoResult::assemble("q", "yahoo", extracted(&[("lat", " 51.5 "), ("lng", "-0.12")]));
        let (lat, lng) = r.coordinates().unwrap();
        assert_relative_eq!(lat, 51.5);
        assert_relative_eq!(lng, -0.12);
    }

    #[test]
    fn test_coordinates_not_numeric() {
        let r = GeoResult::assemble("q", "yahoo", extracted(&[("lat", "north"), ("lng", "-0.12")]));
        assert!(r.has_coordinates());
        assert!(r.coordinates().is_none());
    }

    #[test]
    fn test_serialize_flattens_fields() {
        let r = GeoResult::assemble("q", "multimap", extracted(&[("lat", "1"), ("country", "GB")]));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["country"], "GB");
        assert_eq!(json["lat"], "1");
        assert!(json.get("lng").is_none());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_input_from_str() {
        let input: AddressInput = "10 Downing Street".into();
        assert_eq!(input.to_query(), "10 Downing Street");
    }

    #[test]
    fn test_options_builders() {
        let opts = ResolutionOptions::default().with_provider("yahoo").with_country("GB");
        assert_eq!(opts.provider.as_deref(), Some("yahoo"));
        assert_eq!(opts.country_code.as_deref(), Some("GB"));
        assert!(!opts.use_cache);
    }
}

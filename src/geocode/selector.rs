//! Provider selection: explicit pin > regional heuristic > global default.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::providers::ProviderRegistry;
use super::types::ResolutionOptions;

/// Postcodes this provider family historically geocoded poorly are routed here by default.
pub const DEFAULT_UK_POSTCODE_PROVIDER: &str = "multimap";

/// A UK postcode, either the whole query or its trailing token.
static UK_POSTCODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^GIR ?0AA$|\b(?:[A-Z][0-9]{1,2}|[A-Z][A-HJ-Y][0-9]{1,2}|[A-Z][0-9][A-Z]|[A-Z][A-HJ-Y][0-9]?[A-Z]) ?[0-9][A-Z]{2}$)",
    )
    .expect("UK postcode pattern is valid")
});

/// Does the query look like (or end with) a UK postcode?
pub fn is_uk_postcode(query: &str) -> bool {
    UK_POSTCODE.is_match(query.trim())
}

/// Process-wide defaults used when a call does not say otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Setup {
    pub provider: String,
    pub country_code: String,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            country_code: "US".to_string(),
        }
    }
}

/// Chooses the provider for a query. Pure and deterministic.
#[derive(Debug, Clone)]
pub struct ProviderSelector {
    setup: Setup,
    uk_postcode_provider: String,
}

impl ProviderSelector {
    pub fn new(setup: Setup) -> Self {
        Self {
            setup,
            uk_postcode_provider: DEFAULT_UK_POSTCODE_PROVIDER.to_string(),
        }
    }

    pub fn with_uk_postcode_provider(mut self, provider: impl Into<String>) -> Self {
        self.uk_postcode_provider = provider.into();
        self
    }

    pub fn setup(&self) -> &Setup {
        &self.setup
    }

    /// The country code in effect for a call.
    pub fn country_code<'a>(&'a self, options: &'a ResolutionOptions) -> &'a str {
        options
            .country_code
            .as_deref()
            .unwrap_or(&self.setup.country_code)
    }

    /// Pick the provider name for `query`.
    ///
    /// 1. An explicit `options.provider` is returned unchanged.
    /// 2. In GB, a postcode query goes to the UK postcode provider if it is enabled.
    /// 3. Otherwise the setup default.
    pub fn select(&self, query: &str, options: &ResolutionOptions, registry: &ProviderRegistry) -> String {
        if let Some(pinned) = &options.provider {
            return pinned.clone();
        }

        if self.country_code(options).eq_ignore_ascii_case("GB") && is_uk_postcode(query) {
            if registry.is_enabled(&self.uk_postcode_provider) {
                return self.uk_postcode_provider.clone();
            }
            tracing::debug!(
                provider = %self.uk_postcode_provider,
                "UK postcode provider unavailable, using default"
            );
        }

        self.setup.provider.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::providers::ProviderConfig;

    fn selector() -> ProviderSelector {
        ProviderSelector::new(Setup::default())
    }

    fn gb() -> ResolutionOptions {
        ResolutionOptions::default().with_country("GB")
    }

    #[test]
    fn test_uk_postcode_grammar() {
        for pc in ["SW1A 1AA", "sw1a 1aa", "M1 1AE", "B33 8TH", "CR2 6XH", "DN55 1PT", "W1A 0AX", "EC1A1BB", "GIR 0AA"] {
            assert!(is_uk_postcode(pc), "{} should match", pc);
        }
        for q in ["123 Main St", "90210", "London", "SW1A", ""] {
            assert!(!is_uk_postcode(q), "{} should not match", q);
        }
    }

    #[test]
    fn test_uk_postcode_trailing_token() {
        assert!(is_uk_postcode("10 Downing Street, London, SW1A 2AA"));
        assert!(!is_uk_postcode("XSW1A 2AA"));
        assert!(!is_uk_postcode("SW1A 2AA, London"));
    }

    #[test]
    fn test_explicit_provider_always_wins() {
        let registry = ProviderRegistry::builtin().unwrap();
        let s = selector();
        let opts = gb().with_provider("yahoo");
        assert_eq!(s.select("SW1A 1AA", &opts, &registry), "yahoo");
        let opts = ResolutionOptions::default().with_provider("nonexistent");
        assert_eq!(s.select("123 Main St", &opts, &registry), "nonexistent");
    }

    #[test]
    fn test_gb_postcode_uses_uk_provider() {
        let registry = ProviderRegistry::builtin().unwrap();
        assert_eq!(selector().select("SW1A 1AA", &gb(), &registry), "multimap");
    }

    #[test]
    fn test_gb_non_postcode_uses_default() {
        let registry = ProviderRegistry::builtin().unwrap();
        assert_eq!(selector().select("123 Main St", &gb(), &registry), "google");
    }

    #[test]
    fn test_postcode_outside_gb_uses_default() {
        let registry = ProviderRegistry::builtin().unwrap();
        let opts = ResolutionOptions::default().with_country("US");
        assert_eq!(selector().select("SW1A 1AA", &opts, &registry), "google");
    }

    #[test]
    fn test_setup_country_applies_when_unset() {
        let registry = ProviderRegistry::builtin().unwrap();
        let s = ProviderSelector::new(Setup {
            provider: "yahoo".into(),
            country_code: "GB".into(),
        });
        assert_eq!(s.select("M1 1AE", &ResolutionOptions::default(), &registry), "multimap");
        assert_eq!(s.select("Manchester", &ResolutionOptions::default(), &registry), "yahoo");
    }

    #[test]
    fn test_disabled_uk_provider_falls_through() {
        let mut registry = ProviderRegistry::builtin().unwrap();
        let mut multimap: ProviderConfig = registry.get("multimap").unwrap().clone();
        multimap.enabled = false;
        registry.insert(multimap);
        assert_eq!(selector().select("SW1A 1AA", &gb(), &registry), "google");
    }

    #[test]
    fn test_custom_uk_provider() {
        let registry = ProviderRegistry::builtin().unwrap();
        let s = selector().with_uk_postcode_provider("yahoo");
        assert_eq!(s.select("SW1A 1AA", &gb(), &registry), "yahoo");
    }

    #[test]
    fn test_select_is_deterministic() {
        let registry = ProviderRegistry::builtin().unwrap();
        let s = selector();
        let first = s.select("EC1A 1BB", &gb(), &registry);
        for _ in 0..10 {
            assert_eq!(s.select("EC1A 1BB", &gb(), &registry), first);
        }
    }
}

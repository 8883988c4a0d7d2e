//! Provider definitions: URL templates, credentials, and per-field extraction rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::ConfigError;

/// A compiled pattern locating one field's value in a provider's response body.
///
/// The value is the first capture group of the first match. Patterns are
/// compiled once when configuration is loaded.
#[derive(Clone)]
pub struct ExtractionRule {
    regex: Regex,
}

impl ExtractionRule {
    /// Compile a pattern. It must contain at least one capture group.
    pub fn new(pattern: &str) -> Result<Self, String> {
        let regex = Regex::new(pattern).map_err(|e| e.to_string())?;
        if regex.captures_len() < 2 {
            return Err(format!("pattern '{}' has no capture group", pattern));
        }
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// The non-empty captured value of the first match, if any.
    pub fn find<'b>(&self, body: &'b str) -> Option<&'b str> {
        self.regex
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|v| !v.is_empty())
    }
}

impl fmt::Debug for ExtractionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExtractionRule").field(&self.as_str()).finish()
    }
}

impl PartialEq for ExtractionRule {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// One geocoding provider with compiled rules. Read-only once the registry is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    pub enabled: bool,
    /// Contains the placeholders `:q`, `:api` and `:countryCode`.
    pub url_template: String,
    pub api_key: String,
    /// Output field name → rule.
    pub field_rules: BTreeMap<String, ExtractionRule>,
}

/// A provider as written in a config file, patterns not yet compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub url_template: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    pub field_rules: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderSpec {
    /// Compile every field rule, naming the provider and field of the first bad one.
    pub fn compile(&self, name: &str) -> Result<ProviderConfig, ConfigError> {
        let mut field_rules = BTreeMap::new();
        for (field, pattern) in &self.field_rules {
            let rule = ExtractionRule::new(pattern).map_err(|reason| ConfigError::InvalidRule {
                provider: name.to_string(),
                field: field.clone(),
                reason,
            })?;
            field_rules.insert(field.clone(), rule);
        }
        Ok(ProviderConfig {
            name: name.to_string(),
            enabled: self.enabled,
            url_template: self.url_template.clone(),
            api_key: self.api_key.clone(),
            field_rules,
        })
    }
}

// ─── Built-in providers ─────────────────────────────────────────

struct BuiltinProvider {
    name: &'static str,
    url_template: &'static str,
    field_rules: &'static [(&'static str, &'static str)],
}

const PLACEHOLDER_API_KEY: &str = "your-api-key-here";

const BUILTIN_PROVIDERS: &[BuiltinProvider] = &[
    // 15,000 requests per 24 hours per IP address
    BuiltinProvider {
        name: "google",
        url_template: "http://maps.google.com/maps/geo?q=:q&output=xml&key=:api",
        field_rules: &[
            ("lng", r"<coordinates>(.*?),"),
            ("lat", r",(.*?),[^,\s]+</coordinates>"),
            ("address1", r"<address>(.*?)</address>"),
            ("postcode", r"<PostalCodeNumber>(.*?)</PostalCodeNumber>"),
            ("country", r"<CountryNameCode>(.*?)</CountryNameCode>"),
        ],
    },
    // Non-commercial use only
    BuiltinProvider {
        name: "multimap",
        url_template: "http://developer.multimap.com/API/geocode/1.2/:api?qs=:q&countryCode=:countryCode",
        field_rules: &[
            ("lat", r"<Lat>(.*?)</Lat>"),
            ("lng", r"<Lon>(.*?)</Lon>"),
            ("postcode", r"<PostalCode>(.*?)</PostalCode>"),
            ("country", r"<CountryCode>(.*?)</CountryCode>"),
        ],
    },
    // 5,000 requests per day; output may not be stored
    BuiltinProvider {
        name: "yahoo",
        url_template: "http://api.local.yahoo.com/MapsService/V1/geocode?appid=:api&location=:q",
        field_rules: &[
            ("lat", r"<Latitude>(.*?)</Latitude>"),
            ("lng", r"<Longitude>(.*?)</Longitude>"),
            ("town", r"<City>(.*?), "),
            ("postcode", r"<Zip>(.*?)</Zip>"),
            ("country", r"<Country>(.*?)</Country>"),
        ],
    },
];

fn builtin_to_config(p: &BuiltinProvider) -> Result<ProviderConfig, ConfigError> {
    let spec = ProviderSpec {
        enabled: true,
        url_template: p.url_template.to_string(),
        api_key: PLACEHOLDER_API_KEY.to_string(),
        field_rules: p
            .field_rules
            .iter()
            .map(|(field, pattern)| (field.to_string(), pattern.to_string()))
            .collect(),
    };
    spec.compile(p.name)
}

// ─── Registry ───────────────────────────────────────────────────

/// The set of known providers, built once at setup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    /// A registry with no providers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in providers: google, multimap, yahoo.
    pub fn builtin() -> Result<Self, ConfigError> {
        let mut registry = Self::empty();
        for p in BUILTIN_PROVIDERS {
            registry.insert(builtin_to_config(p)?);
        }
        Ok(registry)
    }

    /// Add or wholly replace a provider under its name.
    pub fn insert(&mut self, config: ProviderConfig) {
        self.providers.insert(config.name.clone(), config);
    }

    /// Merge caller overrides. A named override replaces the whole record; its
    /// field rules are never combined with the built-in ones.
    pub fn merge(mut self, overrides: &BTreeMap<String, ProviderSpec>) -> Result<Self, ConfigError> {
        for (name, spec) in overrides {
            self.insert(spec.compile(name)?);
        }
        Ok(self)
    }

    /// Replace API keys from a lookup keyed by `GEOCODEABLE_<NAME>_API_KEY`.
    pub fn apply_api_keys<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for config in self.providers.values_mut() {
            let var = api_key_var(&config.name);
            if let Some(key) = lookup(&var).filter(|k| !k.is_empty()) {
                tracing::debug!(provider = %config.name, var = %var, "api key taken from environment");
                config.api_key = key;
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some_and(|p| p.enabled)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Environment variable carrying a provider's API key.
pub fn api_key_var(provider: &str) -> String {
    let name: String = provider
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("GEOCODEABLE_{}_API_KEY", name)
}

/// A provider summary safe to show users (no API key).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub enabled: bool,
    pub url_template: String,
    pub fields: Vec<String>,
}

impl From<&ProviderConfig> for ProviderInfo {
    fn from(p: &ProviderConfig) -> Self {
        Self {
            name: p.name.clone(),
            enabled: p.enabled,
            url_template: p.url_template.clone(),
            fields: p.field_rules.keys().cloned().collect(),
        }
    }
}

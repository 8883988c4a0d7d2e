//! Settings loaded once at startup from JSON.
//!
//! Lookup order: explicit path, then ~/.geocodeable/config.json, then built-in
//! defaults. Every key is optional.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::geocode::cache::{FileCache, DEFAULT_TTL_DAYS};
use crate::geocode::fetch::{Fetcher, HttpFetcher};
use crate::geocode::providers::{ProviderRegistry, ProviderSpec};
use crate::geocode::record::FieldMap;
use crate::geocode::resolver::Resolver;
use crate::geocode::selector::{ProviderSelector, Setup, DEFAULT_UK_POSTCODE_PROVIDER};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid extraction rule for {provider}.{field}: {reason}")]
    InvalidRule {
        provider: String,
        field: String,
        reason: String,
    },
    #[error("config refers to unknown provider '{0}'")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_days: i64,
    /// Defaults to ~/.geocodeable/cache.json.
    pub path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_days: DEFAULT_TTL_DAYS,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub setup: Setup,
    pub uk_postcode_provider: String,
    pub timeout_secs: u64,
    pub cache: CacheSettings,
    pub fields: FieldMap,
    /// Merged over the built-in providers, one whole record per name.
    pub providers: BTreeMap<String, ProviderSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            setup: Setup::default(),
            uk_postcode_provider: DEFAULT_UK_POSTCODE_PROVIDER.to_string(),
            timeout_secs: 10,
            cache: CacheSettings::default(),
            fields: FieldMap::default(),
            providers: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load from `path` (must exist), else the default file if present, else defaults.
    ///
    /// Provider overrides are compiled here so a bad extraction rule fails at load.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_from(p),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load_from(&default)
                } else {
                    tracing::debug!("no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        for (name, spec) in &settings.providers {
            spec.compile(name)?;
        }
        tracing::debug!(path = %path.display(), overrides = settings.providers.len(), "config loaded");
        Ok(settings)
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".geocodeable")
            .join("config.json")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Built-in providers with overrides merged and API keys taken from `env`.
    ///
    /// The setup default and UK postcode provider must be known afterwards.
    pub fn build_registry<F>(&self, env: F) -> Result<ProviderRegistry, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut registry = ProviderRegistry::builtin()?.merge(&self.providers)?;
        registry.apply_api_keys(env);

        for name in [&self.setup.provider, &self.uk_postcode_provider] {
            if !registry.contains(name) {
                return Err(ConfigError::UnknownProvider(name.clone()));
            }
        }
        Ok(registry)
    }

    pub fn selector(&self) -> ProviderSelector {
        ProviderSelector::new(self.setup.clone()).with_uk_postcode_provider(self.uk_postcode_provider.clone())
    }

    /// Wire a resolver with the given fetcher and, if enabled, the file cache.
    pub fn build_resolver_with<F>(&self, fetcher: Arc<dyn Fetcher>, env: F) -> Result<Resolver, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let registry = self.build_registry(env)?;
        let mut resolver = Resolver::new(registry, self.setup.clone(), fetcher).with_selector(self.selector());
        if self.cache.enabled {
            let path = self.cache.path.clone().unwrap_or_else(FileCache::default_path);
            let cache = FileCache::load_from(path).with_ttl_days(self.cache.ttl_days);
            resolver = resolver.with_cache(Arc::new(cache));
        }
        Ok(resolver)
    }

    /// Wire a resolver over HTTP, reading API keys from the process environment.
    pub fn build_resolver(&self) -> Result<Resolver, ConfigError> {
        let fetcher = Arc::new(HttpFetcher::new(self.timeout()));
        self.build_resolver_with(fetcher, |var| std::env::var(var).ok())
    }
}

//! Resolver — orchestrates the geocoding pipeline.
//!
//! Flow:  input → query string → provider selection → [cache] → request URL → fetch → extraction → result
//!
//! Each call is a single linear pass: no retries, no state kept between calls.

use std::sync::Arc;

use super::cache::{cache_key, GeoCache};
use super::extract::extract_fields;
use super::fetch::Fetcher;
use super::providers::{ProviderConfig, ProviderRegistry};
use super::request::build_url;
use super::selector::{ProviderSelector, Setup};
use super::types::{AddressInput, FetchError, GeoResult, GeocodeError, ResolutionOptions};

/// The geocoding resolver. Shareable across threads; holds only read-only state
/// and injected capabilities.
pub struct Resolver {
    registry: ProviderRegistry,
    selector: ProviderSelector,
    fetcher: Arc<dyn Fetcher>,
    cache: Option<Arc<dyn GeoCache>>,
}

impl Resolver {
    pub fn new(registry: ProviderRegistry, setup: Setup, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            registry,
            selector: ProviderSelector::new(setup),
            fetcher,
            cache: None,
        }
    }

    pub fn with_selector(mut self, selector: ProviderSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Inject a cache, consulted only for calls that set `use_cache`.
    pub fn with_cache(mut self, cache: Arc<dyn GeoCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn selector(&self) -> &ProviderSelector {
        &self.selector
    }

    /// Resolve free text or structured address parts into a [`GeoResult`].
    ///
    /// Fails only for an empty query, an unknown or disabled provider, or a
    /// failed fetch; a blank body counts as a failed fetch. A response that
    /// yields no fields is still `Ok`, carrying just `key` and `provider`.
    pub fn resolve(
        &self,
        input: impl Into<AddressInput>,
        options: &ResolutionOptions,
    ) -> Result<GeoResult, GeocodeError> {
        let query = input.into().to_query();
        if query.trim().is_empty() {
            return Err(GeocodeError::EmptyQuery);
        }

        let provider_name = self.selector.select(&query, options, &self.registry);
        let provider = self.provider(&provider_name)?;
        let country_code = self.selector.country_code(options);
        tracing::debug!(provider = %provider_name, country = %country_code, "provider selected");

        let key = cache_key(&provider_name, country_code, &query);
        if let Some(cache) = self.active_cache(options) {
            if let Some(mut hit) = cache.lookup(&key) {
                tracing::debug!(provider = %provider_name, "cache hit");
                hit.key = query;
                return Ok(hit);
            }
        }

        let url = build_url(&provider.url_template, &query, &provider.api_key, country_code);
        let body = self
            .fetcher
            .fetch(&url, options.timeout)
            .and_then(|body| {
                if body.trim().is_empty() {
                    Err(FetchError::EmptyBody)
                } else {
                    Ok(body)
                }
            })
            .map_err(|source| {
                tracing::warn!(provider = %provider_name, error = %source, "fetch failed");
                GeocodeError::Fetch {
                    provider: provider_name.clone(),
                    source,
                }
            })?;

        let fields = extract_fields(&body, &provider.field_rules);
        tracing::debug!(provider = %provider_name, fields = fields.len(), "response extracted");

        let result = GeoResult::assemble(&query, &provider_name, fields);
        if result.has_coordinates() {
            if let Some(cache) = self.active_cache(options) {
                cache.store(&key, &result);
            }
        } else {
            tracing::warn!(provider = %provider_name, "provider response had no coordinates");
        }
        Ok(result)
    }

    fn provider(&self, name: &str) -> Result<&ProviderConfig, GeocodeError> {
        let provider = self
            .registry
            .get(name)
            .ok_or_else(|| GeocodeError::UnknownProvider(name.to_string()))?;
        if !provider.enabled {
            return Err(GeocodeError::ProviderDisabled(name.to_string()));
        }
        Ok(provider)
    }

    fn active_cache(&self, options: &ResolutionOptions) -> Option<&Arc<dyn GeoCache>> {
        if options.use_cache {
            self.cache.as_ref()
        } else {
            None
        }
    }
}

//! Address geocoding through interchangeable third-party providers.
//!
//! Builds a query from free text or address parts, picks a provider, fetches
//! its response through an injected capability and extracts fields with the
//! provider's configured rules.

pub mod address;
pub mod cache;
pub mod extract;
pub mod fetch;
pub mod providers;
pub mod record;
pub mod request;
pub mod resolver;
pub mod selector;
pub mod types;

pub use address::build_address_string;
pub use cache::{FileCache, GeoCache};
pub use fetch::{Fetcher, HttpFetcher};
pub use providers::{ExtractionRule, ProviderConfig, ProviderInfo, ProviderRegistry, ProviderSpec};
pub use record::{geocode_record, FieldMap};
pub use resolver::Resolver;
pub use selector::{ProviderSelector, Setup};
pub use types::{AddressComponents, AddressInput, FetchError, GeoResult, GeocodeError, ResolutionOptions};

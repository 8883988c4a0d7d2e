//! Geocoding of stored records whose fields are named by a [`FieldMap`].
//!
//! Whether a record can hold coordinates is an explicit check the caller (or
//! [`geocode_record`]) makes per record, not state computed at setup.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::resolver::Resolver;
use super::types::{AddressComponents, GeoResult, GeocodeError, ResolutionOptions};

/// Record keys for each logical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub lat: String,
    pub lng: String,
    pub street_address: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            lat: "geo_lat".into(),
            lng: "geo_long".into(),
            street_address: "address".into(),
            city: "city".into(),
            region: "state".into(),
            postal_code: "zip".into(),
            country: "country".into(),
        }
    }
}

impl FieldMap {
    /// Does the record have somewhere to store both coordinates?
    pub fn has_coordinate_fields(&self, record: &Map<String, Value>) -> bool {
        record.contains_key(&self.lat) && record.contains_key(&self.lng)
    }

    /// Read the structured address out of a record.
    pub fn address_components(&self, record: &Map<String, Value>) -> AddressComponents {
        let text = |key: &str| record.get(key).and_then(value_text);
        AddressComponents {
            street_address: text(&self.street_address),
            city: text(&self.city),
            region: text(&self.region),
            postal_code: text(&self.postal_code),
            country: text(&self.country),
        }
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Geocode a record in place.
///
/// Returns `Ok(None)` without resolving when the record lacks coordinate fields.
/// Coordinates are written only when the provider produced them; existing
/// values are left alone otherwise.
pub fn geocode_record(
    resolver: &Resolver,
    fields: &FieldMap,
    record: &mut Map<String, Value>,
    options: &ResolutionOptions,
) -> Result<Option<GeoResult>, GeocodeError> {
    if !fields.has_coordinate_fields(record) {
        tracing::debug!("record has no coordinate fields, skipping");
        return Ok(None);
    }

    let result = resolver.resolve(fields.address_components(record), options)?;
    if let Some(lat) = &result.lat {
        record.insert(fields.lat.clone(), Value::String(lat.clone()));
    }
    if let Some(lng) = &result.lng {
        record.insert(fields.lng.clone(), Value::String(lng.clone()));
    }
    Ok(Some(result))
}

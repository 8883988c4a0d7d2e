//! Address string assembly from structured parts.

use super::types::AddressComponents;

const SEPARATOR: &str = ", ";

/// Join the non-empty parts in fixed order: street, city, region, postal code, country.
///
/// Returns an empty string when every part is blank.
pub fn build_address_string(parts: &AddressComponents) -> String {
    [
        &parts.street_address,
        &parts.city,
        &parts.region,
        &parts.postal_code,
        &parts.country,
    ]
    .into_iter()
    .filter_map(|part| part.as_deref().map(str::trim))
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(SEPARATOR)
}

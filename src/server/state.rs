use crate::geocode::{FieldMap, Resolver};

/// Shared, read-only after startup. The resolver needs no lock.
pub struct AppState {
    pub resolver: Resolver,
    pub fields: FieldMap,
}

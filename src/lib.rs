//! Geocodeable: resolve postal addresses to coordinates through
//! interchangeable, configuration-driven providers.

pub mod config;
pub mod geocode;
pub mod server;

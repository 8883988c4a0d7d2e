//! Result caching capability and a file-backed implementation at ~/.geocodeable/cache.json.
//!
//! Keys are case-insensitive. Entries expire after a TTL (30 days by default).
//! Persistence is best effort: write failures are logged and never fail a resolution.

use super::types::GeoResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_TTL_DAYS: i64 = 30;

/// Caller-side cache consulted by the resolver when `use_cache` is requested.
pub trait GeoCache: Send + Sync {
    fn lookup(&self, key: &str) -> Option<GeoResult>;
    fn store(&self, key: &str, result: &GeoResult);
}

/// Cache key for a query answered by a provider in a given country.
pub fn cache_key(provider: &str, country_code: &str, query: &str) -> String {
    format!("{}|{}|{}", provider, country_code, query.trim()).to_lowercase()
}

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry {
    result: GeoResult,
    timestamp: i64,
}

/// JSON file cache shared behind a mutex.
pub struct FileCache {
    path: PathBuf,
    ttl_ms: i64,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl FileCache {
    /// Load from the default location (~/.geocodeable/cache.json).
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load from a specific path. A missing or unreadable file starts empty.
    pub fn load_from(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self {
            path,
            ttl_ms: DEFAULT_TTL_DAYS * 24 * 3600 * 1000,
            entries: Mutex::new(entries),
        }
    }

    pub fn with_ttl_days(mut self, days: i64) -> Self {
        self.ttl_ms = days * 24 * 3600 * 1000;
        self
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".geocodeable")
            .join("cache.json")
    }

    fn read_file(path: &Path) -> Option<HashMap<String, CacheEntry>> {
        let data = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable cache file");
                None
            }
        }
    }

    fn persist(&self, json: String) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Err(e) = fs::write(&self.path, json) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist cache");
        }
    }

    /// Number of entries, expired ones included until the next store.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GeoCache for FileCache {
    fn lookup(&self, key: &str) -> Option<GeoResult> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(&key.to_lowercase())?;

        let now = chrono::Utc::now().timestamp_millis();
        if now - entry.timestamp > self.ttl_ms {
            return None; // expired
        }
        Some(entry.result.clone())
    }

    fn store(&self, key: &str, result: &GeoResult) {
        let now = chrono::Utc::now().timestamp_millis();
        let json = {
            let Ok(mut entries) = self.entries.lock() else {
                return;
            };
            let before = entries.len();
            entries.retain(|_, entry| now - entry.timestamp <= self.ttl_ms);
            if entries.len() < before {
                tracing::debug!(dropped = before - entries.len(), "expired cache entries pruned");
            }
            entries.insert(
                key.to_lowercase(),
                CacheEntry {
                    result: result.clone(),
                    timestamp: now,
                },
            );
            serde_json::to_string_pretty(&*entries)
        };
        // File I/O happens after the lock is released.
        match json {
            Ok(json) => self.persist(json),
            Err(e) => tracing::warn!(error = %e, "failed to serialize cache"),
        }
    }
}

//! Persistent key/value cache with per-entry TTL, staleness detection,
//! schema versioning and capacity-based eviction.

use crate::utils::now_millis;
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bumped whenever the cached payload shape changes; entries written by a
/// different build are treated as absent, so no migration step is needed.
pub const SCHEMA_VERSION: u32 = 2;

/// Absolute ceiling age after which an entry is purged outright, independent
/// of its TTL.
pub const HARD_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub const DEFAULT_MAX_ENTRIES: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    pub written_at: i64,
    pub expires_at: i64,
    pub schema_version: u32,
}

/// A cache read: the stored payload plus whether its TTL has lapsed.
#[derive(Debug, Clone)]
pub struct Cached {
    pub data: Value,
    pub is_stale: bool,
}

/// App-lifetime key/value store backing the request coordinator.
///
/// Entries live in memory; a JSON snapshot is flushed to disk best-effort
/// after each mutation. The cache is never a correctness dependency: load
/// and flush failures are logged and swallowed.
pub struct CacheStore {
    namespace: String,
    max_entries: usize,
    entries: DashMap<String, CacheEntry>,
    persist_path: Option<PathBuf>,
}

impl CacheStore {
    /// In-memory store, no persistence. Used by tests and as a fallback when
    /// no cache file is configured.
    pub fn new(namespace: &str, max_entries: usize) -> Self {
        Self {
            namespace: namespace.to_string(),
            max_entries,
            entries: DashMap::new(),
            persist_path: None,
        }
    }

    /// Store backed by a JSON snapshot file. A missing or unreadable file
    /// starts the store empty.
    pub fn with_persistence(namespace: &str, max_entries: usize, path: impl AsRef<Path>) -> Self {
        let store = Self {
            namespace: namespace.to_string(),
            max_entries,
            entries: DashMap::new(),
            persist_path: Some(path.as_ref().to_path_buf()),
        };
        store.load();
        store
    }

    /// Canonical cache key for an endpoint path and its parameters.
    ///
    /// Parameters are sorted by name so two logically-identical requests with
    /// different insertion order collide to the same key.
    pub fn key_for(&self, path: &str, params: &[(String, String)]) -> String {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut key = format!("{}{}", self.namespace, path);
        let mut separator = '?';
        for (name, value) in sorted {
            key.push(separator);
            key.push_str(name);
            key.push('=');
            key.push_str(value);
            separator = '&';
        }
        key
    }

    /// Returns the cached payload unless the entry is missing, written by a
    /// different schema version, or past the hard-expiry ceiling. The latter
    /// two are purged as a side effect.
    pub fn get(&self, key: &str) -> Option<Cached> {
        let now = now_millis();
        let entry = match self.entries.get(key) {
            Some(entry) => entry.value().clone(),
            None => return None,
        };

        if entry.schema_version != SCHEMA_VERSION {
            debug!(
                "cache entry {} has schema {} (current {}), purging",
                key, entry.schema_version, SCHEMA_VERSION
            );
            self.entries.remove(key);
            return None;
        }
        if now - entry.written_at > HARD_EXPIRY.as_millis() as i64 {
            debug!("cache entry {} past hard expiry, purging", key);
            self.entries.remove(key);
            return None;
        }

        Some(Cached {
            data: entry.data,
            is_stale: now > entry.expires_at,
        })
    }

    /// Writes an entry with the given TTL. On persistence failure, prunes and
    /// retries the flush once; a second failure is logged and swallowed.
    pub fn set(&self, key: &str, data: Value, ttl: Duration) {
        let now = now_millis();
        let entry = CacheEntry {
            data,
            written_at: now,
            expires_at: now + ttl.as_millis() as i64,
            schema_version: SCHEMA_VERSION,
        };
        self.entries.insert(key.to_string(), entry);

        if self.entries.len() > self.max_entries {
            self.prune();
        }

        if let Err(err) = self.persist() {
            warn!("cache flush failed ({}), pruning and retrying once", err);
            self.prune();
            if let Err(err) = self.persist() {
                warn!("cache flush failed again ({}); entry kept in memory only", err);
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
        if let Err(err) = self.persist() {
            warn!("cache flush after remove failed: {}", err);
        }
    }

    /// Removes every entry under this cache's namespace.
    pub fn clear(&self) {
        self.entries.retain(|key, _| !key.starts_with(&self.namespace));
        if let Err(err) = self.persist() {
            warn!("cache flush after clear failed: {}", err);
        }
    }

    /// Deletes hard-expired and schema-mismatched entries; if more than
    /// `max_entries` remain, deletes the oldest half ranked by write time.
    ///
    /// This is write-time eviction, not access-time LRU.
    pub fn prune(&self) {
        let now = now_millis();
        let hard_expiry_ms = HARD_EXPIRY.as_millis() as i64;
        self.entries.retain(|_, entry| {
            entry.schema_version == SCHEMA_VERSION && now - entry.written_at <= hard_expiry_ms
        });

        if self.entries.len() > self.max_entries {
            let mut by_age: Vec<(String, i64)> = self
                .entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().written_at))
                .collect();
            by_age.sort_by_key(|(_, written_at)| *written_at);
            let evict = by_age.len() / 2;
            for (key, _) in by_age.into_iter().take(evict) {
                self.entries.remove(&key);
            }
            debug!("evicted {} oldest cache entries", evict);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn load(&self) {
        let path = match &self.persist_path {
            Some(path) => path,
            None => return,
        };
        let body = match std::fs::read_to_string(path) {
            Ok(body) => body,
            Err(err) => {
                debug!("no cache snapshot at {:?}: {}", path, err);
                return;
            }
        };
        match serde_json::from_str::<HashMap<String, CacheEntry>>(&body) {
            Ok(snapshot) => {
                let mut restored = 0usize;
                for (key, entry) in snapshot {
                    if key.starts_with(&self.namespace) {
                        self.entries.insert(key, entry);
                        restored += 1;
                    }
                }
                info!("restored {} cache entries from {:?}", restored, path);
            }
            Err(err) => warn!("discarding corrupt cache snapshot {:?}: {}", path, err),
        }
    }

    fn persist(&self) -> std::io::Result<()> {
        let path = match &self.persist_path {
            Some(path) => path,
            None => return Ok(()),
        };
        let snapshot: HashMap<String, CacheEntry> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let body = serde_json::to_string(&snapshot)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> CacheStore {
        CacheStore::new("catalog:", DEFAULT_MAX_ENTRIES)
    }

    fn raw_entry(data: Value, written_at: i64, expires_at: i64, schema_version: u32) -> CacheEntry {
        CacheEntry {
            data,
            written_at,
            expires_at,
            schema_version,
        }
    }

    #[test]
    fn key_is_order_independent() {
        let cache = store();
        let a = cache.key_for(
            "catalog/movie/trending",
            &[
                ("genre".to_string(), "drama".to_string()),
                ("page".to_string(), "2".to_string()),
            ],
        );
        let b = cache.key_for(
            "catalog/movie/trending",
            &[
                ("page".to_string(), "2".to_string()),
                ("genre".to_string(), "drama".to_string()),
            ],
        );
        assert_eq!(a, b);
        assert_eq!(a, "catalog:catalog/movie/trending?genre=drama&page=2");
    }

    #[tokio::test]
    async fn entries_go_stale_after_ttl() {
        let cache = store();
        cache.set("k", json!("v"), Duration::from_millis(1000));
        let fresh = cache.get("k").unwrap();
        assert_eq!(fresh.data, json!("v"));
        assert!(!fresh.is_stale);

        cache.set("short", json!("v"), Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let stale = cache.get("short").unwrap();
        assert_eq!(stale.data, json!("v"));
        assert!(stale.is_stale);
    }

    #[test]
    fn hard_expired_entries_are_absent_and_purged() {
        let cache = store();
        let ancient = now_millis() - HARD_EXPIRY.as_millis() as i64 - 1000;
        cache.entries.insert(
            "old".to_string(),
            raw_entry(json!("v"), ancient, ancient + 60_000, SCHEMA_VERSION),
        );
        assert!(cache.get("old").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn schema_mismatch_reads_as_absent() {
        let cache = store();
        let now = now_millis();
        cache.entries.insert(
            "k".to_string(),
            raw_entry(json!("v"), now, now + 60_000, SCHEMA_VERSION - 1),
        );
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn overflow_evicts_oldest_half_by_write_time() {
        let cache = CacheStore::new("catalog:", 10);
        let base = now_millis() - 60_000;
        for i in 0..11 {
            cache.entries.insert(
                format!("k{}", i),
                raw_entry(json!(i), base + i as i64, base + 600_000, SCHEMA_VERSION),
            );
        }
        cache.prune();
        assert_eq!(cache.len(), 6);
        for i in 0..5 {
            assert!(cache.get(&format!("k{}", i)).is_none(), "k{} should be evicted", i);
        }
        for i in 5..11 {
            assert!(cache.get(&format!("k{}", i)).is_some(), "k{} should survive", i);
        }
    }

    #[test]
    fn set_triggers_eviction_past_capacity() {
        let cache = CacheStore::new("catalog:", 4);
        for i in 0..5 {
            cache.set(&format!("k{}", i), json!(i), Duration::from_secs(60));
        }
        assert!(cache.len() <= 4);
    }

    #[test]
    fn removed_entries_are_gone() {
        let cache = store();
        cache.set("k", json!("v"), Duration::from_secs(60));
        cache.remove("k");
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn clear_only_touches_own_namespace() {
        let cache = store();
        cache.set("catalog:row", json!(1), Duration::from_secs(60));
        cache
            .entries
            .insert("other:row".to_string(), raw_entry(json!(2), now_millis(), now_millis() + 60_000, SCHEMA_VERSION));
        cache.clear();
        assert!(cache.get("catalog:row").is_none());
        assert!(cache.get("other:row").is_some());
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let path = std::env::temp_dir().join(format!("catalog-cache-{}.json", std::process::id()));
        {
            let cache = CacheStore::with_persistence("catalog:", 50, &path);
            cache.set("catalog:row", json!({"items": [1, 2]}), Duration::from_secs(60));
        }
        let reloaded = CacheStore::with_persistence("catalog:", 50, &path);
        let hit = reloaded.get("catalog:row").unwrap();
        assert_eq!(hit.data, json!({"items": [1, 2]}));
        assert!(!hit.is_stale);
        let _ = std::fs::remove_file(&path);
    }
}

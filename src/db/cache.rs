// db/cache.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Cache TTL constants (in seconds)
pub const TASK_LIST_CACHE_TTL: u64 = 120;      // 2 minutes
pub const TASK_CACHE_TTL: u64 = 300;           // 5 minutes
pub const CATEGORY_CACHE_TTL: u64 = 1800;      // 30 minutes
pub const TRANSACTION_CACHE_TTL: u64 = 300;    // 5 minutes

/// Query keys shared by readers and the invalidation table.
pub mod keys {
    use super::Uuid;

    pub fn task_list(filters_json: &str) -> String {
        format!("tasks:{}", filters_json)
    }

    pub fn task(id: Uuid) -> String {
        format!("task:{}", id)
    }

    pub fn categories() -> String {
        "categories".to_string()
    }

    pub fn transactions(user_id: Uuid) -> String {
        format!("transactions:{}", user_id)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// In-process query cache. Entries are only ever replaced by a fresh read or
/// dropped by invalidation, never patched in place.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generic get from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().await;

        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                match serde_json::from_value::<T>(entry.value.clone()) {
                    Ok(value) => {
                        tracing::debug!("Cache HIT: {}", key);
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        Some(value)
                    }
                    Err(_) => {
                        tracing::warn!("Cache deserialization failed for: {}", key);
                        self.misses.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                }
            }
            _ => {
                tracing::debug!("Cache MISS: {}", key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Generic set to cache with TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        if let Ok(value) = serde_json::to_value(value) {
            let entry = CacheEntry {
                value,
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            };
            self.entries.write().await.insert(key.to_string(), entry);
            tracing::debug!("Cache SET: {} (TTL: {}s)", key, ttl_seconds);
        }
    }

    /// Delete every key matching a glob pattern (`*` matches any run of characters)
    pub async fn delete_pattern(&self, pattern: &str) -> usize {
        let Some(matcher) = glob_regex(pattern) else {
            tracing::warn!("Invalid cache pattern: {}", pattern);
            return 0;
        };
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !matcher.is_match(key));
        let deleted_count = before - entries.len();

        tracing::debug!("Cache DELETE pattern: {} ({} keys deleted)", pattern, deleted_count);
        deleted_count
    }

    #[cfg(test)]
    pub(crate) async fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .await
            .get(key)
            .map(|entry| entry.expires_at > Instant::now())
            .unwrap_or(false)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Anchored regex for a glob pattern; everything except `*` is literal.
pub(crate) fn glob_regex(pattern: &str) -> Option<regex::Regex> {
    let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
    regex::Regex::new(&format!("^{}$", escaped.join(".*"))).ok()
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

//! TTL response cache with glob-pattern invalidation.
//!
//! Keys are derived deterministically from the request shape
//! (`METHOD:path?query:user`), so cached entries are scoped per identity and
//! an anonymous caller can never observe another user's response. Expiry is
//! lazy on read, with an optional background sweeper for bounded memory.

use dashmap::DashMap;
use gateway_core::CachedResponse;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Response cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Master switch; a disabled cache never stores or returns entries
    pub enabled: bool,
    /// TTL applied when the caller does not supply one
    pub default_ttl: Duration,
    /// Interval between background sweeps of expired entries
    pub sweep_interval: Duration,
    /// Hard cap on entries; inserts beyond this evict the oldest entry
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
            max_entries: 10_000,
        }
    }
}

/// Cache counters for status reporting
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups that returned a live entry
    pub hits: u64,
    /// Lookups that found nothing (or an expired entry)
    pub misses: u64,
    /// Entries removed by expiry, invalidation or capacity pressure
    pub evictions: u64,
    /// Live entries at snapshot time
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate in `[0, 1]`, zero when no lookups happened yet
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

struct CacheEntry {
    response: CachedResponse,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// TTL cache for upstream responses
pub struct ResponseCache {
    config: CacheConfig,
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ResponseCache {
    /// Create a cache
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            sweeper: Mutex::new(None),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Build the deterministic cache key for a request.
    ///
    /// The same method, path, query and user always produce the same key;
    /// anonymous requests use a distinct identity segment so they never
    /// collide with authenticated ones.
    #[must_use]
    pub fn generate_key(
        method: &str,
        path: &str,
        query: Option<&str>,
        user: Option<&str>,
    ) -> String {
        let mut key = String::with_capacity(
            method.len() + path.len() + query.map_or(0, str::len) + 16,
        );
        key.push_str(method);
        key.push(':');
        key.push_str(path);
        if let Some(q) = query {
            key.push('?');
            key.push_str(q);
        }
        key.push(':');
        key.push_str(user.unwrap_or("anonymous"));
        key
    }

    /// Look up a key, lazily evicting an expired entry
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        if !self.config.enabled {
            return None;
        }

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.response.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a response under the default TTL
    pub fn insert(&self, key: impl Into<String>, response: CachedResponse) {
        self.insert_with_ttl(key, response, self.config.default_ttl);
    }

    /// Store a response with an explicit TTL
    pub fn insert_with_ttl(
        &self,
        key: impl Into<String>,
        response: CachedResponse,
        ttl: Duration,
    ) {
        if !self.config.enabled {
            return;
        }

        if self.entries.len() >= self.config.max_entries {
            self.evict_oldest();
        }

        let key = key.into();
        debug!(key = %key, ttl_ms = ttl.as_millis(), "Caching response");
        self.entries.insert(
            key,
            CacheEntry {
                response,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove one entry; returns whether it existed
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry whose key matches a glob pattern (`*` matches any
    /// run of characters, `?` a single one); returns the number removed.
    ///
    /// Used for write-through invalidation: a mutating request that succeeds
    /// drops the cached reads it may have made stale.
    pub fn remove_pattern(&self, pattern: &str) -> usize {
        let Ok(re) = Regex::new(&glob_to_regex(pattern)) else {
            return 0;
        };

        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| re.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        for key in &stale {
            self.entries.remove(key);
        }
        if !stale.is_empty() {
            self.evictions
                .fetch_add(stale.len() as u64, Ordering::Relaxed);
            info!(pattern = %pattern, removed = stale.len(), "Cache invalidated");
        }
        stale.len()
    }

    /// Drop all expired entries
    pub fn sweep(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.is_expired())
            .map(|entry| entry.key().clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
        }
        self.evictions
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    /// Start the background sweeper; idempotent
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut guard = self.sweeper.lock();
        if guard.is_some() {
            return;
        }

        let cache = Arc::clone(self);
        let interval = self.config.sweep_interval;
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(removed, "Cache sweep completed");
                }
            }
        }));
    }

    /// Stop the background sweeper
    pub fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }

    /// Remove everything
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries, including not-yet-swept expired ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.stored_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for ResponseCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '.' | '+' | '^' | '$' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\' => {
                regex.push('\\');
                regex.push(c);
            }
            _ => regex.push(c),
        }
    }
    regex.push('$');
    regex
}

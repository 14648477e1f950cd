//! Memoized statistics with TTL and upward invalidation.
//!
//! Keys are `"<pootle_path>:<operation>"`. A change to a store invalidates
//! the store's keys, the keys of every ancestor directory and the project
//! aggregate `/projects/<name>/`, where `<name>` is the path segment chosen
//! by [`CacheConfig::project_segment`]. Concurrent writers may briefly leave
//! a stale value behind; the TTL bounds how long.

use super::Counts;
use crate::config::CacheConfig;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

struct CacheEntry {
    value: Counts,
    stored_at: Instant,
}

pub struct StatsCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    config: CacheConfig,
}

impl StatsCache {
    pub fn new(ttl: Duration, config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            config,
        }
    }

    pub fn key(pootle_path: &str, operation: &str) -> String {
        format!("{}:{}", pootle_path, operation)
    }

    pub fn get(&self, pootle_path: &str, operation: &str) -> Option<Counts> {
        let key = Self::key(pootle_path, operation);
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, pootle_path: &str, operation: &str, value: Counts) {
        self.entries.lock().insert(
            Self::key(pootle_path, operation),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Cached value, or `compute()` stored and returned. Errors are not cached.
    pub fn get_or_compute<F>(&self, pootle_path: &str, operation: &str, compute: F) -> Result<Counts>
    where
        F: FnOnce() -> Result<Counts>,
    {
        if let Some(hit) = self.get(pootle_path, operation) {
            return Ok(hit);
        }
        trace!(pootle_path, operation, "stats cache miss");
        let value = compute()?;
        self.put(pootle_path, operation, value.clone());
        Ok(value)
    }

    /// Every key a change to `pootle_path` must drop.
    pub fn invalidation_keys(&self, pootle_path: &str, operations: &[&str]) -> Vec<String> {
        let mut paths = vec![pootle_path.to_string()];

        let trimmed = pootle_path.trim_end_matches('/');
        let mut ancestors = Vec::new();
        let mut rest = trimmed;
        while let Some(idx) = rest.rfind('/') {
            rest = &rest[..idx];
            ancestors.push(format!("{}/", rest));
        }
        if let Some(depth) = self.config.max_invalidation_depth {
            ancestors.truncate(depth);
        }
        paths.extend(ancestors);

        let parts: Vec<&str> = pootle_path.split('/').collect();
        if let Some(project) = parts.get(self.config.project_segment).filter(|p| !p.is_empty()) {
            paths.push(format!("/projects/{}/", project));
        }

        let mut keys = Vec::with_capacity(paths.len() * operations.len());
        for path in &paths {
            for op in operations {
                keys.push(Self::key(path, op));
            }
        }
        keys.dedup();
        keys
    }

    pub fn invalidate(&self, pootle_path: &str, operations: &[&str]) {
        let keys = self.invalidation_keys(pootle_path, operations);
        let mut entries = self.entries.lock();
        for key in &keys {
            entries.remove(key);
        }
        trace!(pootle_path, keys = keys.len(), "invalidated stats");
    }

    /// Drops every key under `prefix`. Used when a directory disappears.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.lock().retain(|k, _| !k.starts_with(prefix));
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::QUICK_STATS;
    use std::cell::Cell;

    fn cache() -> StatsCache {
        StatsCache::new(Duration::from_secs(60), CacheConfig::default())
    }

    fn counts(total: u64) -> Counts {
        let mut c = Counts::new();
        c.set("total", total);
        c
    }

    #[test]
    fn test_get_or_compute_memoizes() {
        let cache = cache();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(counts(3))
        };
        assert_eq!(cache.get_or_compute("/sw/demo/", QUICK_STATS, compute).unwrap().get("total"), 3);
        assert_eq!(cache.get_or_compute("/sw/demo/", QUICK_STATS, compute).unwrap().get("total"), 3);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_expired_entries_are_recomputed() {
        let cache = StatsCache::new(Duration::ZERO, CacheConfig::default());
        cache.put("/sw/demo/", QUICK_STATS, counts(1));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get("/sw/demo/", QUICK_STATS).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidation_keys_walk_ancestors_and_project() {
        let keys = cache().invalidation_keys("/sw/demo/sub/app.po", &[QUICK_STATS]);
        assert_eq!(
            keys,
            vec![
                "/sw/demo/sub/app.po:quick_stats",
                "/sw/demo/sub/:quick_stats",
                "/sw/demo/:quick_stats",
                "/sw/:quick_stats",
                "/:quick_stats",
                "/projects/demo/:quick_stats",
            ]
        );
    }

    #[test]
    fn test_invalidation_depth_is_configurable() {
        let config = CacheConfig {
            project_segment: 1,
            max_invalidation_depth: Some(1),
        };
        let cache = StatsCache::new(Duration::from_secs(60), config);
        let keys = cache.invalidation_keys("/sw/demo/app.po", &[QUICK_STATS]);
        assert_eq!(
            keys,
            vec![
                "/sw/demo/app.po:quick_stats",
                "/sw/demo/:quick_stats",
                "/projects/sw/:quick_stats",
            ]
        );
    }

    #[test]
    fn test_invalidate_drops_ancestors_but_not_siblings() {
        let cache = cache();
        cache.put("/sw/demo/app.po", QUICK_STATS, counts(1));
        cache.put("/sw/demo/", QUICK_STATS, counts(2));
        cache.put("/sw/demo/other.po", QUICK_STATS, counts(3));

        cache.invalidate("/sw/demo/app.po", &[QUICK_STATS]);

        assert!(cache.get("/sw/demo/app.po", QUICK_STATS).is_none());
        assert!(cache.get("/sw/demo/", QUICK_STATS).is_none());
        assert_eq!(cache.get("/sw/demo/other.po", QUICK_STATS).unwrap().get("total"), 3);
    }
}

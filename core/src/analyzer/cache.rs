use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::digest::sha256_hex;

use super::result::CtvpResult;

pub fn cache_key(code: &str, tool_name: &str) -> String {
    sha256_hex(&[code, tool_name])
}

struct CacheEntry {
    result: CtvpResult,
    inserted_at: Instant,
}

/// TTL-bounded result cache. Eviction is coarse: when full, expired entries
/// go first, then roughly a tenth of the rest in arbitrary order.
pub struct ResultCache {
    enabled: bool,
    max_entries: usize,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    pub fn new(enabled: bool, max_entries: usize, ttl: Duration) -> Self {
        Self {
            enabled,
            max_entries: max_entries.max(1),
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<CtvpResult> {
        if !self.enabled {
            return None;
        }
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.result.clone())
    }

    pub fn insert(&self, key: String, result: CtvpResult) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let ttl = self.ttl;
            entries.retain(|_, e| e.inserted_at.elapsed() <= ttl);
            if entries.len() >= self.max_entries {
                let drop_count = (self.max_entries / 10).max(1);
                let victims: Vec<String> = entries.keys().take(drop_count).cloned().collect();
                for k in victims {
                    entries.remove(&k);
                }
            }
            tracing::debug!(target: "ctvp.analyzer", remaining = entries.len(), "cache evicted");
        }
        entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(tool: &str) -> CtvpResult {
        CtvpResult::fail_open("echo hi", tool, "test", std::time::Duration::ZERO)
    }

    #[test]
    fn key_depends_on_code_and_tool() {
        assert_eq!(cache_key("a", "Bash"), cache_key("a", "Bash"));
        assert_ne!(cache_key("a", "Bash"), cache_key("a", "Write"));
        assert_ne!(cache_key("ab", "c"), cache_key("a", "bc"));
    }

    #[test]
    fn entries_expire() {
        let cache = ResultCache::new(true, 10, Duration::from_millis(20));
        cache.insert("k".into(), result("Bash"));
        assert!(cache.get("k").is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let cache = ResultCache::new(false, 10, Duration::from_secs(60));
        cache.insert("k".into(), result("Bash"));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn eviction_keeps_size_bounded() {
        let cache = ResultCache::new(true, 20, Duration::from_secs(60));
        for i in 0..50 {
            cache.insert(format!("k{i}"), result("Bash"));
        }
        assert!(cache.len() <= 20);
        assert!(cache.get("k49").is_some());
    }
}

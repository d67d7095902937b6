use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    content_hash: String,
    vector: Vec<f32>,
    byte_size: u64,
    last_used: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCacheConfig {
    pub max_size_mb: u64,
    pub max_age_days: u32,
}

impl Default for EmbeddingCacheConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 100,
            max_age_days: 30,
        }
    }
}

/// Content-hash-keyed embedding cache (C12, §4.12). Key is
/// `(provider, model, sha256(content))`; eviction is LRU by timestamp
/// under a byte budget, plus an age-based purge at initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCache {
    config: EmbeddingCacheConfig,
    entries: HashMap<String, CacheEntry>,
}

fn cache_key(provider: &str, model: &str, content: &str) -> (String, String) {
    let content_hash = format!("{:x}", Sha256::digest(content.as_bytes()));
    (format!("{provider}::{model}::{content_hash}"), content_hash)
}

impl EmbeddingCache {
    pub fn new(config: EmbeddingCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    /// Purges entries older than `maxAgeDays`. Called once at startup
    /// against a snapshot loaded from disk.
    pub fn purge_stale(&mut self, now: i64) {
        let cutoff = now - self.config.max_age_days as i64 * 86_400;
        self.entries.retain(|_, e| e.last_used >= cutoff);
    }

    /// Reads a cached vector, validating the stored hash still matches
    /// the current content (§4.12 "Validation").
    pub fn get(&mut self, provider: &str, model: &str, content: &str, now: i64) -> Option<Vec<f32>> {
        let (key, content_hash) = cache_key(provider, model, content);
        let hit = self.entries.get(&key)?;
        if hit.content_hash != content_hash {
            self.entries.remove(&key);
            return None;
        }
        let vector = hit.vector.clone();
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_used = now;
        }
        Some(vector)
    }

    pub fn put(&mut self, provider: &str, model: &str, content: &str, vector: Vec<f32>, now: i64) {
        let (key, content_hash) = cache_key(provider, model, content);
        let byte_size = (vector.len() * std::mem::size_of::<f32>()) as u64;
        self.entries.insert(
            key,
            CacheEntry {
                content_hash,
                vector,
                byte_size,
                last_used: now,
            },
        );
        self.evict_over_budget();
    }

    fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.byte_size).sum()
    }

    fn evict_over_budget(&mut self) {
        let budget = self.config.max_size_mb * 1024 * 1024;
        if self.total_bytes() <= budget {
            return;
        }
        let mut by_age: Vec<(String, i64)> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.last_used))
            .collect();
        by_age.sort_by_key(|(_, last_used)| *last_used);

        for (key, _) in by_age {
            if self.total_bytes() <= budget {
                break;
            }
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get_roundtrips() {
        let mut cache = EmbeddingCache::new(EmbeddingCacheConfig::default());
        cache.put("mock", "m1", "fn foo() {}", vec![0.1, 0.2], 100);
        let hit = cache.get("mock", "m1", "fn foo() {}", 101);
        assert_eq!(hit, Some(vec![0.1, 0.2]));
    }

    #[test]
    fn test_content_change_invalidates_entry() {
        let mut cache = EmbeddingCache::new(EmbeddingCacheConfig::default());
        cache.put("mock", "m1", "fn foo() {}", vec![0.1, 0.2], 100);
        let miss = cache.get("mock", "m1", "fn bar() {}", 101);
        assert!(miss.is_none());
    }

    #[test]
    fn test_purge_stale_removes_old_entries() {
        let mut cache = EmbeddingCache::new(EmbeddingCacheConfig {
            max_size_mb: 100,
            max_age_days: 1,
        });
        cache.put("mock", "m1", "x", vec![0.1], 0);
        cache.purge_stale(86_400 * 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_respects_byte_budget() {
        let mut cache = EmbeddingCache::new(EmbeddingCacheConfig {
            max_size_mb: 0,
            max_age_days: 30,
        });
        cache.put("mock", "m1", "a", vec![0.1; 10], 1);
        cache.put("mock", "m1", "b", vec![0.1; 10], 2);
        assert_eq!(cache.len(), 1);
    }
}

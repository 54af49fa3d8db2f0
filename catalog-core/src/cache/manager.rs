//! Cache manager coordinating the in-process (L1) caches used across the read and
//! collection paths: classifier category mappings, trending lists, and precomputed
//! recommendation neighbor sets.
//!
//! Each cache is a `moka` future cache storing JSON-encoded values so callers can share
//! the same manager across differently-typed payloads without a type parameter leaking
//! into `Services`. Entries expire on a per-cache TTL; there is no L2 (Redis) tier here,
//! since the batch jobs that populate these caches write straight through to Postgres
//! and the L1 caches exist purely to avoid re-hitting the database on every read.

use std::time::Duration;

use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};

use crate::Result;

/// Configuration for the three L1 caches.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub mapping_max_capacity: u64,
    pub mapping_ttl: Duration,
    pub trending_max_capacity: u64,
    pub trending_ttl: Duration,
    pub recommendation_max_capacity: u64,
    pub recommendation_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mapping_max_capacity: 10_000,
            mapping_ttl: Duration::from_secs(300),
            trending_max_capacity: 1_000,
            trending_ttl: Duration::from_secs(600),
            recommendation_max_capacity: 10_000,
            recommendation_ttl: Duration::from_secs(600),
        }
    }
}

/// Coordinates the classifier-mapping, trending, and recommendation L1 caches.
#[derive(Clone)]
pub struct CacheManager {
    mapping: Cache<String, String>,
    trending: Cache<String, String>,
    recommendation: Cache<String, String>,
    config: CacheConfig,
}

impl CacheManager {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let mapping = Cache::builder()
            .max_capacity(config.mapping_max_capacity)
            .time_to_live(config.mapping_ttl)
            .build();
        let trending = Cache::builder()
            .max_capacity(config.trending_max_capacity)
            .time_to_live(config.trending_ttl)
            .build();
        let recommendation = Cache::builder()
            .max_capacity(config.recommendation_max_capacity)
            .time_to_live(config.recommendation_ttl)
            .build();

        Self {
            mapping,
            trending,
            recommendation,
            config,
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Look up a cached, deserialized classifier mapping result.
    pub async fn get_mapping<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        Self::decode(self.mapping.get(key).await)
    }

    /// Cache a classifier mapping result (§4.C, 5-minute default TTL).
    pub async fn put_mapping<T: Serialize>(&self, key: String, value: &T) -> Result<()> {
        let encoded = Self::encode(value)?;
        self.mapping.insert(key, encoded).await;
        Ok(())
    }

    /// Invalidate cached classifier mappings, e.g. after category table edits.
    pub fn clear_mapping_cache(&self) {
        self.mapping.invalidate_all();
    }

    /// Look up a cached trending list for a category/window pair.
    pub async fn get_trending<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        Self::decode(self.trending.get(key).await)
    }

    /// Cache a trending list (§4.K).
    pub async fn put_trending<T: Serialize>(&self, key: String, value: &T) -> Result<()> {
        let encoded = Self::encode(value)?;
        self.trending.insert(key, encoded).await;
        Ok(())
    }

    /// Look up cached precomputed recommendation neighbors.
    pub async fn get_recommendation<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        Self::decode(self.recommendation.get(key).await)
    }

    /// Cache precomputed recommendation neighbors (§4.K batch precompute).
    pub async fn put_recommendation<T: Serialize>(&self, key: String, value: &T) -> Result<()> {
        let encoded = Self::encode(value)?;
        self.recommendation.insert(key, encoded).await;
        Ok(())
    }

    pub fn invalidate_recommendation(&self, key: &str) {
        self.recommendation.invalidate(key);
    }

    /// Drop every entry from all three L1 caches. Useful for tests and for reacting to a
    /// cache-invalidation pub/sub notification (see `KeyBuilder::cache_invalidation_channel`).
    pub fn clear_all(&self) {
        self.mapping.invalidate_all();
        self.trending.invalidate_all();
        self.recommendation.invalidate_all();
    }

    #[must_use]
    pub fn aggregated_stats(&self) -> AggregatedCacheStats {
        AggregatedCacheStats {
            mapping_entries: self.mapping.entry_count(),
            trending_entries: self.trending.entry_count(),
            recommendation_entries: self.recommendation.entry_count(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn encode<T: Serialize>(value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(Into::into)
    }

    fn decode<T: DeserializeOwned>(raw: Option<String>) -> Option<T> {
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("config", &self.config)
            .finish()
    }
}

/// Snapshot of entry counts across the three L1 caches, surfaced via the metrics endpoint.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AggregatedCacheStats {
    pub mapping_entries: u64,
    pub trending_entries: u64,
    pub recommendation_entries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_manager_mapping_roundtrip() {
        let manager = CacheManager::with_defaults();
        manager.put_mapping("src1:动作片".to_string(), &42i64).await.unwrap();
        let value: Option<i64> = manager.get_mapping("src1:动作片").await;
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn test_clear_all_is_idempotent() {
        let manager = CacheManager::with_defaults();
        manager.clear_all();
        manager.clear_all();
    }

    #[tokio::test]
    async fn test_aggregated_stats_starts_empty() {
        let manager = CacheManager::with_defaults();
        let stats = manager.aggregated_stats();
        assert_eq!(stats.mapping_entries, 0);
    }
}

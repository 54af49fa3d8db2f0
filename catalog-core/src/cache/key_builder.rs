//! Unified Redis key builder
//!
//! Centralizes construction of every Redis key used by the catalog platform so that
//! naming stays consistent across the collection engine, catalog store, and read path.
//!
//! # Design Principles
//!
//! - All keys use a configurable prefix (default: "catalog")
//! - Consistent naming convention for easy debugging
//! - Support for multi-environment isolation

use crate::Config;

/// Unified Redis key builder
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    /// Create a new `KeyBuilder` with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Create `KeyBuilder` from configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.redis.key_prefix.clone())
    }

    /// Create default `KeyBuilder` (for testing)
    #[must_use]
    pub fn default() -> Self {
        Self::new("catalog")
    }

    // ==================== Distributed Locking ====================

    /// Per-fingerprint catalog write lock, serializing merges of the same video.
    #[must_use]
    pub fn video_fingerprint_lock(&self, fingerprint_hash: &str) -> String {
        format!("{}:lock:video:{}", self.prefix, fingerprint_hash)
    }

    /// Task-manager dispatcher lock, ensuring only one scheduler runner dispatches at a time.
    #[must_use]
    pub fn task_dispatch_lock(&self) -> String {
        format!("{}:lock:task-dispatch", self.prefix)
    }

    // ==================== Classifier cache ====================

    /// Cached category mapping for an upstream `(source_id, type_name)` pair.
    #[must_use]
    pub fn classifier_mapping(&self, source_id: &str, type_name: &str) -> String {
        format!("{}:classifier:mapping:{}:{}", self.prefix, source_id, type_name)
    }

    // ==================== Trending / recommendation cache ====================

    /// Trending list cache, keyed by category + window.
    #[must_use]
    pub fn trending(&self, category: &str, window: &str) -> String {
        format!("{}:trending:{}:{}", self.prefix, category, window)
    }

    /// Precomputed recommendation cache for a given video and strategy.
    #[must_use]
    pub fn recommendation(&self, video_id: &str, strategy: &str) -> String {
        format!("{}:recommend:{}:{}", self.prefix, strategy, video_id)
    }

    // ==================== Rating enrichment ====================

    /// Rate-limit bucket key for third-party rating lookups.
    #[must_use]
    pub fn rating_rate_limit(&self, provider: &str) -> String {
        format!("{}:ratelimit:rating:{}", self.prefix, provider)
    }

    // ==================== Generic API rate limiting ====================

    /// API rate limiting
    ///
    /// identifier: client id, IP, etc.
    /// window: "1s", "1m", "1h", etc.
    #[must_use]
    pub fn rate_limit(&self, identifier: &str, window: &str) -> String {
        format!("{}:ratelimit:api:{}:{}", self.prefix, identifier, window)
    }

    // ==================== Cache invalidation ====================

    /// Cache invalidation pub/sub channel, used to drop stale L1 entries across replicas.
    #[must_use]
    pub fn cache_invalidation_channel(&self) -> String {
        format!("{}:cache:invalidate", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builder_default() {
        let builder = KeyBuilder::default();

        assert_eq!(
            builder.video_fingerprint_lock("abc123"),
            "catalog:lock:video:abc123"
        );

        assert_eq!(
            builder.classifier_mapping("src1", "动作片"),
            "catalog:classifier:mapping:src1:动作片"
        );
    }

    #[test]
    fn test_key_builder_custom_prefix() {
        let builder = KeyBuilder::new("prod");

        assert_eq!(
            builder.task_dispatch_lock(),
            "prod:lock:task-dispatch"
        );
    }

    #[test]
    fn test_rate_limit_keys() {
        let builder = KeyBuilder::default();

        assert_eq!(
            builder.rate_limit("client_123", "1m"),
            "catalog:ratelimit:api:client_123:1m"
        );
        assert_eq!(
            builder.rate_limit("192.168.1.1", "1s"),
            "catalog:ratelimit:api:192.168.1.1:1s"
        );
    }

    #[test]
    fn test_trending_and_recommendation_keys() {
        let builder = KeyBuilder::default();
        assert_eq!(builder.trending("movie", "daily"), "catalog:trending:movie:daily");
        assert_eq!(
            builder.recommendation("vid1", "content_based"),
            "catalog:recommend:content_based:vid1"
        );
    }
}

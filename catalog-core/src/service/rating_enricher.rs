//! Third-party rating enrichment (§4.I).
//!
//! Fetches ratings for videos that have none cached, or whose cached rating is stale
//! (30-day freshness) or a retryable failure (24h backoff). Requests are paced
//! `request_pacing_ms` apart to stay polite to the rating provider's API.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::RatingConfig;
use crate::models::{Rating, RatingStatus, VideoId};
use crate::repository::RatingRepository;
use crate::Result;

/// Abstraction over the actual third-party rating lookup, so the pacing/caching
/// policy in this module can be tested without a live provider.
#[async_trait::async_trait]
pub trait RatingProvider: Send + Sync {
    async fn lookup(&self, video_id: &VideoId, name: &str, year: &str) -> std::result::Result<(f64, i64, String), String>;
}

pub struct RatingEnricher {
    repository: Arc<RatingRepository>,
    provider: Arc<dyn RatingProvider>,
    config: RatingConfig,
}

impl RatingEnricher {
    #[must_use]
    pub fn new(repository: Arc<RatingRepository>, provider: Arc<dyn RatingProvider>, config: RatingConfig) -> Self {
        Self { repository, provider, config }
    }

    /// Fetch (or return cached) rating for a single video from one provider.
    pub async fn fetch_single(&self, provider_name: &str, video_id: &VideoId, name: &str, year: &str) -> Result<Rating> {
        let now = Utc::now();
        if let Some(existing) = self.repository.get(video_id, provider_name).await? {
            if existing.is_fresh(now) || (existing.status == RatingStatus::Failed && !existing.is_retryable(now)) {
                return Ok(existing);
            }
        }

        let rating = match self.provider.lookup(video_id, name, year).await {
            Ok((score, votes, external_id)) => Rating {
                video_id: video_id.clone(),
                provider: provider_name.to_string(),
                score: Some(score),
                votes: Some(votes),
                external_id: Some(external_id),
                status: RatingStatus::Success,
                checked_at: now,
            },
            Err(_) => Rating {
                video_id: video_id.clone(),
                provider: provider_name.to_string(),
                score: None,
                votes: None,
                external_id: None,
                status: RatingStatus::Failed,
                checked_at: now,
            },
        };

        self.repository.upsert(&rating).await
    }

    /// Batch-fetch ratings for every video due for a lookup (no cached rating, or
    /// a stale/retryable one), pacing requests `request_pacing_ms` apart.
    pub async fn batch_fetch(&self, provider_name: &str, names: &[(VideoId, String, String)]) -> Result<Vec<Rating>> {
        let due = self.repository.due_for_lookup(provider_name, names.len() as i64).await?;
        let due_set: std::collections::HashSet<_> = due.into_iter().collect();

        let mut results = Vec::new();
        for (idx, (video_id, name, year)) in names.iter().enumerate() {
            if !due_set.contains(video_id) {
                continue;
            }
            if idx > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.request_pacing_ms)).await;
            }
            results.push(self.fetch_single(provider_name, video_id, name, year).await?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_gate_uses_30_day_window() {
        let now = Utc::now();
        let fresh = Rating {
            video_id: VideoId::from_string("v1".into()),
            provider: "demo".into(),
            score: Some(8.0),
            votes: Some(100),
            external_id: None,
            status: RatingStatus::Success,
            checked_at: now - chrono::Duration::days(10),
        };
        assert!(fresh.is_fresh(now));

        let stale = Rating { checked_at: now - chrono::Duration::days(31), ..fresh };
        assert!(!stale.is_fresh(now));
    }

    #[test]
    fn test_retry_gate_uses_24h_window() {
        let now = Utc::now();
        let recent_failure = Rating {
            video_id: VideoId::from_string("v1".into()),
            provider: "demo".into(),
            score: None,
            votes: None,
            external_id: None,
            status: RatingStatus::Failed,
            checked_at: now - chrono::Duration::hours(1),
        };
        assert!(!recent_failure.is_retryable(now));

        let old_failure = Rating { checked_at: now - chrono::Duration::hours(25), ..recent_failure };
        assert!(old_failure.is_retryable(now));
    }
}

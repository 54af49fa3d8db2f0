use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::VideoId;

/// Outcome of an external rating lookup (§4.I Rating Enricher).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingStatus {
    Success,
    Failed,
}

/// A third-party rating record for one video (§4.I).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub video_id: VideoId,
    pub provider: String,
    pub score: Option<f64>,
    pub votes: Option<i64>,
    pub external_id: Option<String>,
    pub status: RatingStatus,
    pub checked_at: DateTime<Utc>,
}

impl Rating {
    /// 30-day cache: is this rating still fresh enough to skip re-fetching?
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.checked_at) < chrono::Duration::days(30)
    }

    /// Failures are retried only after 24h (§4.I).
    #[must_use]
    pub fn is_retryable(&self, now: DateTime<Utc>) -> bool {
        self.status == RatingStatus::Failed
            && now.signed_duration_since(self.checked_at) >= chrono::Duration::hours(24)
    }
}

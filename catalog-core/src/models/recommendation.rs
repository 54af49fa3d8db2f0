use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::VideoId;

/// A single precomputed similarity neighbor (§3 RecommendationCache).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub video_id: VideoId,
    pub algorithm: String,
    pub similar_video_id: VideoId,
    pub confidence: f64,
    pub computed_at: DateTime<Utc>,
}

/// A recommendation list for one `(video_id, algorithm)` pair, as replaced wholesale
/// by batch precompute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub video_id: VideoId,
    pub algorithm: String,
    pub neighbors: Vec<(VideoId, f64)>,
    pub computed_at: DateTime<Utc>,
}

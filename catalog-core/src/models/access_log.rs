use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::id::VideoId;

/// One durable per-day hit count row, the aggregation target of `aggregate_hits`
/// (§3 HitCounter, §4.H).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub video_id: VideoId,
    pub day: NaiveDate,
    pub hits: i64,
    pub updated_at: DateTime<Utc>,
}

/// Rolled-up hit totals for a video (§4.H `calculate_stats`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitStats {
    pub day: i64,
    pub week: i64,
    pub month: i64,
    pub all_time: i64,
}

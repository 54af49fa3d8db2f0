use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::SourceId;

/// Rolling health status of an upstream source (§3 SourceHealth).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Slow,
    Error,
    Timeout,
    Unknown,
}

impl HealthStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Slow => "slow",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

/// Per-source rolling health record (§3 SourceHealth).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source_id: SourceId,
    pub status: HealthStatus,
    pub last_response_time_ms: i64,
    pub avg_response_time_ms: f64,
    pub success_rate: f64,
    pub total_checks: i64,
    pub success_checks: i64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i32,
    pub last_video_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl SourceHealth {
    #[must_use]
    pub fn unknown(source_id: SourceId) -> Self {
        Self {
            source_id,
            status: HealthStatus::Unknown,
            last_response_time_ms: 0,
            avg_response_time_ms: 0.0,
            success_rate: 0.0,
            total_checks: 0,
            success_checks: 0,
            last_error: None,
            last_error_at: None,
            consecutive_failures: 0,
            last_video_count: 0,
            updated_at: Utc::now(),
        }
    }

    /// EMA update (α = 0.3, §8 P8): `avg' = round(0.7·avg + 0.3·r)`.
    #[must_use]
    pub fn next_avg_response_time(&self, sample_ms: i64) -> f64 {
        (0.7 * self.avg_response_time_ms + 0.3 * sample_ms as f64).round()
    }

    /// Is this source eligible to be picked by `get_healthy_sources` (§4.D)?
    #[must_use]
    pub fn is_serviceable(&self, max_consecutive_failures: i32) -> bool {
        matches!(
            self.status,
            HealthStatus::Healthy | HealthStatus::Slow | HealthStatus::Unknown
        ) && self.consecutive_failures < max_consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_rounds_per_spec() {
        let mut health = SourceHealth::unknown(SourceId::new());
        health.avg_response_time_ms = 100.0;
        // 0.7*100 + 0.3*200 = 130
        assert_eq!(health.next_avg_response_time(200), 130.0);
    }

    #[test]
    fn test_serviceable_requires_status_and_failures() {
        let mut health = SourceHealth::unknown(SourceId::new());
        assert!(health.is_serviceable(3));
        health.consecutive_failures = 3;
        assert!(!health.is_serviceable(3));
        health.consecutive_failures = 0;
        health.status = HealthStatus::Error;
        assert!(!health.is_serviceable(3));
    }
}

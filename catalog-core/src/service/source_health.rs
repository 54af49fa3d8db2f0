//! Source health tracking (§4.D).
//!
//! Keeps a rolling EMA of response time and a consecutive-failure counter per
//! upstream, used both to gate which sources the collection engine may dispatch to
//! (`get_healthy_sources`) and to drive the scheduler's health-summary alert.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SourceHealthConfig;
use crate::models::{HealthStatus, Source, SourceHealth};
use crate::repository::{SourceHealthRepository, SourceRepository};
use crate::Result;

/// Outcome of one upstream probe, fed into `SourceHealth`'s EMA update.
pub struct CheckOutcome {
    pub success: bool,
    pub response_time_ms: i64,
    pub video_count: i64,
    pub error: Option<String>,
}

/// Tracks and updates per-source health state.
pub struct SourceHealthTracker {
    sources: Arc<SourceRepository>,
    health: Arc<SourceHealthRepository>,
    config: SourceHealthConfig,
}

impl SourceHealthTracker {
    #[must_use]
    pub fn new(sources: Arc<SourceRepository>, health: Arc<SourceHealthRepository>, config: SourceHealthConfig) -> Self {
        Self { sources, health, config }
    }

    /// Probe one source's `ac=list&pg=1` endpoint and persist the updated health record.
    pub async fn check_one(&self, source: &Source) -> Result<SourceHealth> {
        let started = Instant::now();
        let outcome = self.probe(source).await;
        let elapsed_ms = started.elapsed().as_millis() as i64;

        let previous = self
            .health
            .get(&source.id)
            .await?
            .unwrap_or_else(|| SourceHealth::unknown(source.id.clone()));

        let response_time_ms = outcome.as_ref().map(|_| elapsed_ms).unwrap_or(elapsed_ms);
        let next_avg = previous.next_avg_response_time(response_time_ms);

        let status = match &outcome {
            Ok(o) if !o.success => HealthStatus::Error,
            Ok(_) if response_time_ms >= self.config.error_response_ms as i64 => HealthStatus::Error,
            Ok(_) if response_time_ms >= self.config.slow_response_ms as i64 => HealthStatus::Slow,
            Ok(_) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Timeout,
        };

        let succeeded = matches!(outcome, Ok(ref o) if o.success);
        let total_checks = previous.total_checks + 1;
        let success_checks = previous.success_checks + i64::from(succeeded);
        let consecutive_failures = if succeeded { 0 } else { previous.consecutive_failures + 1 };

        // §4.D: consecutive failures at or above the cap force `error` regardless of
        // what the latency-based classification above decided.
        let status = if consecutive_failures >= self.config.max_consecutive_failures {
            HealthStatus::Error
        } else {
            status
        };

        let (last_error, last_error_at, video_count) = match &outcome {
            Ok(o) if !o.success => (o.error.clone(), Some(chrono::Utc::now()), previous.last_video_count),
            Ok(o) => (None, previous.last_error_at, o.video_count),
            Err(e) => (Some(e.clone()), Some(chrono::Utc::now()), previous.last_video_count),
        };

        let updated = SourceHealth {
            source_id: source.id.clone(),
            status,
            last_response_time_ms: response_time_ms,
            avg_response_time_ms: next_avg,
            success_rate: success_checks as f64 / total_checks as f64,
            total_checks,
            success_checks,
            last_error,
            last_error_at,
            consecutive_failures,
            last_video_count: video_count,
            updated_at: chrono::Utc::now(),
        };

        self.health.upsert(&updated).await
    }

    /// Probe every active source, pacing requests `check_pacing_ms` apart so a large
    /// source list doesn't burst-load every upstream simultaneously.
    pub async fn check_all(&self) -> Result<Vec<SourceHealth>> {
        let sources = self.sources.list_active().await?;
        let mut results = Vec::with_capacity(sources.len());
        for (idx, source) in sources.iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.check_pacing_ms)).await;
            }
            results.push(self.check_one(source).await?);
        }
        Ok(results)
    }

    /// Sources eligible for dispatch: active, and serviceable per their latest health
    /// record (unknown/healthy/slow with consecutive failures below the configured cap).
    pub async fn get_healthy_sources(&self) -> Result<Vec<Source>> {
        let sources = self.sources.list_active().await?;
        let mut healthy = Vec::new();
        for source in sources {
            let serviceable = match self.health.get(&source.id).await? {
                Some(h) => h.is_serviceable(self.config.max_consecutive_failures),
                None => true,
            };
            if serviceable {
                healthy.push(source);
            }
        }
        Ok(healthy)
    }

    async fn probe(&self, source: &Source) -> std::result::Result<CheckOutcome, String> {
        let url = source.list_url(1, None);
        let client = reqwest::Client::new();
        let response = tokio::time::timeout(Duration::from_millis(self.config.error_response_ms), client.get(&url).send())
            .await
            .map_err(|_| "probe timed out".to_string())?
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Ok(CheckOutcome {
                success: false,
                response_time_ms: 0,
                video_count: 0,
                error: Some(format!("HTTP {}", response.status())),
            });
        }

        let body = response.text().await.map_err(|e| e.to_string())?;
        match super::response_parser::ResponseParser::parse(&body) {
            Ok(parsed) => Ok(CheckOutcome {
                success: true,
                response_time_ms: 0,
                video_count: parsed.videos.len() as i64,
                error: None,
            }),
            Err(e) => Ok(CheckOutcome {
                success: false,
                response_time_ms: 0,
                video_count: 0,
                error: Some(e.0),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_drive_thresholds() {
        let config = SourceHealthConfig::default();
        assert!(config.slow_response_ms < config.error_response_ms);
        assert!(config.max_consecutive_failures > 0);
    }
}

//! Wall-clock routine dispatcher (§4.M).
//!
//! A single `tick(now)` call decides which periodic routines are due this minute:
//! hourly source-health checks, a 2am daily duplicate-merge pass, a Sunday 3am weekly
//! GC sweep, and a 6-hourly health-summary alert. `run` drives this off a
//! `tokio::time::interval`; `tick` is exposed standalone so the decision logic is
//! testable against arbitrary timestamps without waiting on a clock.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::cache::KeyBuilder;
use crate::config::SchedulerConfig;
use crate::service::catalog_store::CatalogStore;
use crate::service::distributed_lock::DistributedLock;
use crate::service::hit_tracker::HitTracker;
use crate::service::source_health::SourceHealthTracker;
use crate::Result;

/// The routines a single `tick` may decide to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueRoutine {
    HourlyHealthCheck,
    DailyDuplicateMerge,
    WeeklyGc,
    HealthSummaryAlert,
}

/// Decide which routines are due for the given wall-clock time (§4.M trigger conditions).
#[must_use]
pub fn due_routines(now: DateTime<Utc>) -> Vec<DueRoutine> {
    let mut due = Vec::new();
    if now.minute() == 0 {
        due.push(DueRoutine::HourlyHealthCheck);
    }
    if now.hour() == 2 && now.minute() == 0 {
        due.push(DueRoutine::DailyDuplicateMerge);
    }
    if now.weekday() == chrono::Weekday::Sun && now.hour() == 3 && now.minute() == 0 {
        due.push(DueRoutine::WeeklyGc);
    }
    if now.minute() == 0 && now.hour() % 6 == 0 {
        due.push(DueRoutine::HealthSummaryAlert);
    }
    due
}

pub struct Scheduler {
    config: SchedulerConfig,
    health: Arc<SourceHealthTracker>,
    catalog: Arc<CatalogStore>,
    hits: Arc<HitTracker>,
    lock: Arc<DistributedLock>,
    keys: KeyBuilder,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        health: Arc<SourceHealthTracker>,
        catalog: Arc<CatalogStore>,
        hits: Arc<HitTracker>,
        lock: Arc<DistributedLock>,
        keys: KeyBuilder,
    ) -> Self {
        Self { config, health, catalog, hits, lock, keys }
    }

    /// Run one dispatch decision for `now`, serialized across replicas by the
    /// task-dispatch lock so only one runner executes the due routines this minute.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let due = due_routines(now);
        if due.is_empty() {
            return Ok(());
        }

        let lock_key = self.keys.task_dispatch_lock();
        let outcome = self
            .lock
            .try_with_lock(&lock_key, 300, || self.run_due(due))
            .await?;

        if outcome.is_none() {
            tracing::debug!("scheduler tick skipped: another replica holds the dispatch lock");
        }
        Ok(())
    }

    async fn run_due(&self, due: Vec<DueRoutine>) -> Result<()> {
        for routine in due {
            match routine {
                DueRoutine::HourlyHealthCheck => {
                    self.health.check_all().await?;
                }
                DueRoutine::DailyDuplicateMerge => {
                    self.catalog.merge_duplicates().await?;
                }
                DueRoutine::WeeklyGc => {
                    self.catalog.cleanup_duplicates(30).await?;
                    self.hits.cleanup_old(365).await?;
                }
                DueRoutine::HealthSummaryAlert => {
                    self.send_health_summary_alert().await;
                }
            }
        }
        Ok(())
    }

    async fn send_health_summary_alert(&self) {
        let Some(webhook) = &self.config.alert_webhook_url else { return };
        let client = reqwest::Client::new();
        let body = serde_json::json!({ "text": "catalog source health summary due" });
        if let Err(e) = client.post(webhook).json(&body).send().await {
            tracing::warn!(error = %e, "failed to deliver health summary alert");
        }
    }

    /// Drive `tick` off the configured interval for the process lifetime.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.config.tick_interval_seconds));
        loop {
            interval.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::error!(error = %e, "scheduler tick failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hourly_check_due_on_the_hour() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 14, 0, 0).unwrap();
        assert!(due_routines(now).contains(&DueRoutine::HourlyHealthCheck));
    }

    #[test]
    fn test_daily_merge_due_at_2am() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 2, 0, 0).unwrap();
        assert!(due_routines(now).contains(&DueRoutine::DailyDuplicateMerge));
        let not_due = Utc.with_ymd_and_hms(2026, 7, 28, 3, 0, 0).unwrap();
        assert!(!due_routines(not_due).contains(&DueRoutine::DailyDuplicateMerge));
    }

    #[test]
    fn test_weekly_gc_due_sunday_3am() {
        // 2026-08-02 is a Sunday.
        let now = Utc.with_ymd_and_hms(2026, 8, 2, 3, 0, 0).unwrap();
        assert_eq!(now.weekday(), chrono::Weekday::Sun);
        assert!(due_routines(now).contains(&DueRoutine::WeeklyGc));
    }

    #[test]
    fn test_health_summary_every_6_hours() {
        for hour in [0, 6, 12, 18] {
            let now = Utc.with_ymd_and_hms(2026, 7, 28, hour, 0, 0).unwrap();
            assert!(due_routines(now).contains(&DueRoutine::HealthSummaryAlert), "hour {hour} should be due");
        }
        let not_due = Utc.with_ymd_and_hms(2026, 7, 28, 7, 0, 0).unwrap();
        assert!(!due_routines(not_due).contains(&DueRoutine::HealthSummaryAlert));
    }

    #[test]
    fn test_non_boundary_minute_triggers_nothing() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 14, 30, 0).unwrap();
        assert!(due_routines(now).is_empty());
    }
}

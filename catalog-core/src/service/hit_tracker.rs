//! View-count tracking (§4.H).
//!
//! Hits accumulate in memory under a `parking_lot::Mutex` and are flushed to
//! `AccessLogRepository` either when the in-memory batch reaches `hits_batch_size` or
//! when `hits_flush_interval_ms` elapses, whichever comes first (§8 P7: no hit is lost
//! across a flush, `force_flush` drains to zero).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;

use crate::config::HitTrackerConfig;
use crate::models::{HitStats, VideoId};
use crate::repository::AccessLogRepository;
use crate::Result;

#[derive(Default)]
struct PendingHits {
    counts: HashMap<VideoId, i64>,
}

pub struct HitTracker {
    repository: Arc<AccessLogRepository>,
    config: HitTrackerConfig,
    pending: Mutex<PendingHits>,
}

impl HitTracker {
    #[must_use]
    pub fn new(repository: Arc<AccessLogRepository>, config: HitTrackerConfig) -> Self {
        Self {
            repository,
            config,
            pending: Mutex::new(PendingHits::default()),
        }
    }

    /// Record one hit for a video. Triggers an immediate flush if the in-memory
    /// batch has reached `hits_batch_size`.
    pub async fn track(&self, video_id: &VideoId) -> Result<()> {
        let should_flush = {
            let mut pending = self.pending.lock();
            *pending.counts.entry(video_id.clone()).or_insert(0) += 1;
            pending.counts.values().map(|c| *c as u32).sum::<u32>() >= self.config.hits_batch_size
        };
        if should_flush {
            self.force_flush().await?;
        }
        Ok(())
    }

    /// Drain every pending count to `AccessLogRepository`, regardless of batch size.
    /// Called on the interval timer and on graceful shutdown.
    pub async fn force_flush(&self) -> Result<()> {
        let drained: Vec<(VideoId, i64)> = {
            let mut pending = self.pending.lock();
            pending.counts.drain().collect()
        };
        if drained.is_empty() {
            return Ok(());
        }

        let today = Utc::now().date_naive();
        for (video_id, delta) in drained {
            self.repository.add_hits(&video_id, today, delta).await?;
        }
        Ok(())
    }

    /// Number of hits currently buffered but not yet flushed (for tests/metrics).
    pub fn pending_count(&self) -> i64 {
        self.pending.lock().counts.values().sum()
    }

    /// §4.H `calculate_stats`: day/week/month/all-time rollup for a video, reading
    /// only durable (flushed) state.
    pub async fn calculate_stats(&self, video_id: &VideoId) -> Result<HitStats> {
        let today = Utc::now().date_naive();
        self.repository.stats_for_video(video_id, today).await
    }

    /// Run the periodic flush loop; intended to be spawned as a background task for
    /// the process lifetime.
    pub async fn run_flush_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(self.config.hits_flush_interval_ms));
        loop {
            interval.tick().await;
            if let Err(e) = self.force_flush().await {
                tracing::error!(error = %e, "hit tracker flush failed");
            }
        }
    }

    /// GC target: delete durable access-log rows older than `older_than_days`.
    pub async fn cleanup_old(&self, older_than_days: i64) -> Result<usize> {
        let today = Utc::now().date_naive();
        self.repository.delete_older_than(older_than_days, today).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_pending_count_accumulates() {
        // Exercised at the unit level without a database: the batching logic lives
        // entirely in the in-memory map, independent of the repository flush.
        let pending = Mutex::new(PendingHits::default());
        {
            let mut p = pending.lock();
            *p.counts.entry(VideoId::from_string("v1".to_string())).or_insert(0) += 1;
            *p.counts.entry(VideoId::from_string("v1".to_string())).or_insert(0) += 1;
        }
        let total: i64 = pending.lock().counts.values().sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_naive_date_used_for_bucketing() {
        let d: NaiveDate = Utc::now().date_naive();
        assert!(d.year() > 2000);
    }
}

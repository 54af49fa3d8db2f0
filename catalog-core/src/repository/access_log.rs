use chrono::NaiveDate;
use sqlx::PgPool;

use crate::{
    models::{AccessLogEntry, HitStats, VideoId},
    Result,
};

#[derive(Clone)]
pub struct AccessLogRepository {
    pool: PgPool,
}

impl AccessLogRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `aggregate_hits` (§4.H): upsert one day's delta onto the durable access log.
    pub async fn add_hits(&self, video_id: &VideoId, day: NaiveDate, delta: i64) -> Result<AccessLogEntry> {
        let row: (String, NaiveDate, i64, chrono::DateTime<chrono::Utc>) = sqlx::query_as(
            r"
            INSERT INTO access_log (video_id, day, hits, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (video_id, day) DO UPDATE SET hits = access_log.hits + $3, updated_at = now()
            RETURNING video_id, day, hits, updated_at
            ",
        )
        .bind(video_id.as_str())
        .bind(day)
        .bind(delta)
        .fetch_one(&self.pool)
        .await?;

        Ok(AccessLogEntry {
            video_id: VideoId::from_string(row.0),
            day: row.1,
            hits: row.2,
            updated_at: row.3,
        })
    }

    /// `calculate_stats` (§4.H): day/week/month/all-time totals from the last 30 days.
    pub async fn stats_for_video(&self, video_id: &VideoId, today: NaiveDate) -> Result<HitStats> {
        let day: Option<i64> = sqlx::query_scalar("SELECT hits FROM access_log WHERE video_id = $1 AND day = $2")
            .bind(video_id.as_str())
            .bind(today)
            .fetch_optional(&self.pool)
            .await?;

        let week: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(hits) FROM access_log WHERE video_id = $1 AND day > $2 - 7",
        )
        .bind(video_id.as_str())
        .bind(today)
        .fetch_one(&self.pool)
        .await?;

        let month: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(hits) FROM access_log WHERE video_id = $1 AND day > $2 - 30",
        )
        .bind(video_id.as_str())
        .bind(today)
        .fetch_one(&self.pool)
        .await?;

        let all_time: Option<i64> = sqlx::query_scalar("SELECT SUM(hits) FROM access_log WHERE video_id = $1")
            .bind(video_id.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(HitStats {
            day: day.unwrap_or(0),
            week: week.unwrap_or(0),
            month: month.unwrap_or(0),
            all_time: all_time.unwrap_or(0),
        })
    }

    /// Delete access-log rows older than 30 days (§4.H, §4.M daily routine).
    pub async fn delete_older_than(&self, days: i64, today: NaiveDate) -> Result<usize> {
        let cutoff = today - chrono::Duration::days(days);
        let result = sqlx::query("DELETE FROM access_log WHERE day < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }
}

use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{CollectLogEntry, LogLevel, TaskId},
    Result,
};

#[derive(Clone)]
pub struct CollectLogRepository {
    pool: PgPool,
}

impl CollectLogRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Flush a buffered batch of log entries in one round trip (§3 CollectLog buffering).
    pub async fn insert_batch(&self, entries: &[CollectLogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r"
                INSERT INTO collect_logs (
                    id, task_id, level, action, message, source_name, video_id,
                    video_name, details, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(entry.id.as_str())
            .bind(entry.task_id.as_str())
            .bind(Self::level_str(entry.level))
            .bind(&entry.action)
            .bind(&entry.message)
            .bind(&entry.source_name)
            .bind(&entry.video_id)
            .bind(&entry.video_name)
            .bind(&entry.details)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_for_task(&self, task_id: &TaskId, limit: i64) -> Result<Vec<CollectLogEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM collect_logs WHERE task_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(task_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    /// 7-day retention (§3 CollectLog).
    pub async fn delete_older_than(&self, days: i64) -> Result<usize> {
        let result = sqlx::query("DELETE FROM collect_logs WHERE created_at < now() - ($1 || ' days')::interval")
            .bind(days.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }

    const fn level_str(level: LogLevel) -> &'static str {
        match level {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    fn row_to_entry(row: PgRow) -> Result<CollectLogEntry> {
        let level_str: String = row.try_get("level")?;
        let level = match level_str.as_str() {
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        };

        Ok(CollectLogEntry {
            id: crate::models::LogId::from_string(row.try_get("id")?),
            task_id: TaskId::from_string(row.try_get("task_id")?),
            level,
            action: row.try_get("action")?,
            message: row.try_get("message")?,
            source_name: row.try_get("source_name")?,
            video_id: row.try_get("video_id")?,
            video_name: row.try_get("video_name")?,
            details: row.try_get("details")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

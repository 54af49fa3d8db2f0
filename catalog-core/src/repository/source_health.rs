use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{HealthStatus, SourceHealth, SourceId},
    Result,
};

#[derive(Clone)]
pub struct SourceHealthRepository {
    pool: PgPool,
}

impl SourceHealthRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert the rolling health row (§4.D `check_one`).
    pub async fn upsert(&self, health: &SourceHealth) -> Result<SourceHealth> {
        let row = sqlx::query(
            r"
            INSERT INTO source_health (
                source_id, status, last_response_time_ms, avg_response_time_ms,
                success_rate, total_checks, success_checks, last_error, last_error_at,
                consecutive_failures, last_video_count, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (source_id) DO UPDATE SET
                status = EXCLUDED.status,
                last_response_time_ms = EXCLUDED.last_response_time_ms,
                avg_response_time_ms = EXCLUDED.avg_response_time_ms,
                success_rate = EXCLUDED.success_rate,
                total_checks = EXCLUDED.total_checks,
                success_checks = EXCLUDED.success_checks,
                last_error = EXCLUDED.last_error,
                last_error_at = EXCLUDED.last_error_at,
                consecutive_failures = EXCLUDED.consecutive_failures,
                last_video_count = EXCLUDED.last_video_count,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            ",
        )
        .bind(health.source_id.as_str())
        .bind(Self::status_str(health.status))
        .bind(health.last_response_time_ms)
        .bind(health.avg_response_time_ms)
        .bind(health.success_rate)
        .bind(health.total_checks)
        .bind(health.success_checks)
        .bind(&health.last_error)
        .bind(health.last_error_at)
        .bind(health.consecutive_failures)
        .bind(health.last_video_count)
        .bind(health.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_health(row)
    }

    pub async fn get(&self, source_id: &SourceId) -> Result<Option<SourceHealth>> {
        let row = sqlx::query("SELECT * FROM source_health WHERE source_id = $1")
            .bind(source_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_health).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<SourceHealth>> {
        let rows = sqlx::query("SELECT * FROM source_health").fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_health).collect()
    }

    const fn status_str(status: HealthStatus) -> &'static str {
        status.as_str()
    }

    fn row_to_health(row: PgRow) -> Result<SourceHealth> {
        let status_str: String = row.try_get("status")?;
        let status = match status_str.as_str() {
            "healthy" => HealthStatus::Healthy,
            "slow" => HealthStatus::Slow,
            "error" => HealthStatus::Error,
            "timeout" => HealthStatus::Timeout,
            _ => HealthStatus::Unknown,
        };

        Ok(SourceHealth {
            source_id: SourceId::from_string(row.try_get("source_id")?),
            status,
            last_response_time_ms: row.try_get("last_response_time_ms")?,
            avg_response_time_ms: row.try_get("avg_response_time_ms")?,
            success_rate: row.try_get("success_rate")?,
            total_checks: row.try_get("total_checks")?,
            success_checks: row.try_get("success_checks")?,
            last_error: row.try_get("last_error")?,
            last_error_at: row.try_get("last_error_at")?,
            consecutive_failures: row.try_get("consecutive_failures")?,
            last_video_count: row.try_get("last_video_count")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_upsert_placeholder() {}
}

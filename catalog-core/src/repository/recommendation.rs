use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{RecommendationEntry, VideoId},
    Result,
};

#[derive(Clone)]
pub struct RecommendationRepository {
    pool: PgPool,
}

impl RecommendationRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace the full neighbor set for `(video_id, algorithm)` (§3 RecommendationCache:
    /// "replaced by batch precompute").
    pub async fn replace_neighbors(
        &self,
        video_id: &VideoId,
        algorithm: &str,
        neighbors: &[(VideoId, f64)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recommendations WHERE video_id = $1 AND algorithm = $2")
            .bind(video_id.as_str())
            .bind(algorithm)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        for (neighbor_id, confidence) in neighbors {
            sqlx::query(
                r"
                INSERT INTO recommendations (video_id, algorithm, similar_video_id, confidence, computed_at)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(video_id.as_str())
            .bind(algorithm)
            .bind(neighbor_id.as_str())
            .bind(confidence)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_neighbors(&self, video_id: &VideoId, algorithm: &str) -> Result<Vec<RecommendationEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM recommendations WHERE video_id = $1 AND algorithm = $2 ORDER BY confidence DESC",
        )
        .bind(video_id.as_str())
        .bind(algorithm)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    /// Hottest videos whose cache predates `older_than`, target of the batch precompute.
    pub async fn stale_hot_videos(&self, algorithm: &str, older_than: DateTime<Utc>, limit: i64) -> Result<Vec<VideoId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT v.id FROM videos v
            LEFT JOIN (
                SELECT video_id, MAX(computed_at) AS computed_at
                FROM recommendations WHERE algorithm = $1
                GROUP BY video_id
            ) r ON r.video_id = v.id
            WHERE v.is_valid AND (r.computed_at IS NULL OR r.computed_at < $2)
            ORDER BY v.rating DESC
            LIMIT $3
            ",
        )
        .bind(algorithm)
        .bind(older_than)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| VideoId::from_string(id)).collect())
    }

    fn row_to_entry(row: PgRow) -> Result<RecommendationEntry> {
        Ok(RecommendationEntry {
            video_id: VideoId::from_string(row.try_get("video_id")?),
            algorithm: row.try_get("algorithm")?,
            similar_video_id: VideoId::from_string(row.try_get("similar_video_id")?),
            confidence: row.try_get("confidence")?,
            computed_at: row.try_get("computed_at")?,
        })
    }
}

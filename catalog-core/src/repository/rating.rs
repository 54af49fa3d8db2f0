use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{Rating, RatingStatus, VideoId},
    Result,
};

#[derive(Clone)]
pub struct RatingRepository {
    pool: PgPool,
}

impl RatingRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, video_id: &VideoId, provider: &str) -> Result<Option<Rating>> {
        let row = sqlx::query("SELECT * FROM ratings WHERE video_id = $1 AND provider = $2")
            .bind(video_id.as_str())
            .bind(provider)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_rating).transpose()
    }

    pub async fn upsert(&self, rating: &Rating) -> Result<Rating> {
        let row = sqlx::query(
            r"
            INSERT INTO ratings (video_id, provider, score, votes, external_id, status, checked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (video_id, provider) DO UPDATE SET
                score = EXCLUDED.score, votes = EXCLUDED.votes, external_id = EXCLUDED.external_id,
                status = EXCLUDED.status, checked_at = EXCLUDED.checked_at
            RETURNING *
            ",
        )
        .bind(rating.video_id.as_str())
        .bind(&rating.provider)
        .bind(rating.score)
        .bind(rating.votes)
        .bind(&rating.external_id)
        .bind(Self::status_str(rating.status))
        .bind(rating.checked_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_rating(row)
    }

    /// Candidates for `batch_fetch`: videos never rated, or failed > 24h ago.
    pub async fn due_for_lookup(&self, provider: &str, limit: i64) -> Result<Vec<VideoId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT v.id FROM videos v
            LEFT JOIN ratings r ON r.video_id = v.id AND r.provider = $1
            WHERE v.is_valid AND (
                r.video_id IS NULL
                OR (r.status = 'failed' AND r.checked_at < now() - interval '24 hours')
            )
            LIMIT $2
            ",
        )
        .bind(provider)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| VideoId::from_string(id)).collect())
    }

    const fn status_str(status: RatingStatus) -> &'static str {
        match status {
            RatingStatus::Success => "success",
            RatingStatus::Failed => "failed",
        }
    }

    fn row_to_rating(row: PgRow) -> Result<Rating> {
        let status_str: String = row.try_get("status")?;
        let status = if status_str == "success" {
            RatingStatus::Success
        } else {
            RatingStatus::Failed
        };

        Ok(Rating {
            video_id: VideoId::from_string(row.try_get("video_id")?),
            provider: row.try_get("provider")?,
            score: row.try_get("score")?,
            votes: row.try_get("votes")?,
            external_id: row.try_get("external_id")?,
            status,
            checked_at: row.try_get("checked_at")?,
        })
    }
}

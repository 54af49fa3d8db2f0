//! Video repository for database operations
//!
//! Backs the Catalog Store's `find_existing` match ladder (§4.G) and the read path.

use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{Video, VideoId},
    Result,
};

/// Sort facet for the cache-first list read path (§4.J).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSortOrder {
    Hits,
    Score,
    Recency,
}

/// Filter facets accepted by `list_filtered` (§4.J: `type_id`, sub-type/tag, area
/// `LIKE`, year).
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub type_id: Option<i16>,
    pub sub_type_id: Option<i32>,
    pub tag: Option<String>,
    pub area: Option<String>,
    pub year: Option<String>,
}

#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create(&self, video: &Video) -> Result<Video> {
        self.create_with_executor(video, &self.pool).await
    }

    pub async fn create_with_executor<'e, E>(&self, video: &Video, executor: E) -> Result<Video>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let play_urls_json = serde_json::to_value(&video.play_urls)?;

        let row = sqlx::query(
            r"
            INSERT INTO videos (
                id, name, year, area, language, actors, directors, synopsis, tags,
                cover_url, thumb_url, remarks, rating, type_id, sub_type_id,
                source_names, source_priority, quality_score, is_valid, play_urls,
                preview_episode_index, preview_url, shorts_category, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                      $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
            RETURNING *
            ",
        )
        .bind(video.id.as_str())
        .bind(&video.name)
        .bind(&video.year)
        .bind(&video.area)
        .bind(&video.language)
        .bind(&video.actors)
        .bind(&video.directors)
        .bind(&video.synopsis)
        .bind(&video.tags)
        .bind(&video.cover_url)
        .bind(&video.thumb_url)
        .bind(&video.remarks)
        .bind(video.rating)
        .bind(video.type_id)
        .bind(video.sub_type_id)
        .bind(&video.source_names)
        .bind(video.source_priority)
        .bind(video.quality_score)
        .bind(video.is_valid)
        .bind(&play_urls_json)
        .bind(video.preview_episode_index)
        .bind(&video.preview_url)
        .bind(&video.shorts_category)
        .bind(video.created_at)
        .bind(video.updated_at)
        .fetch_one(executor)
        .await?;

        self.row_to_video(row)
    }

    pub async fn update(&self, video: &Video) -> Result<Video> {
        self.update_with_executor(video, &self.pool).await
    }

    pub async fn update_with_executor<'e, E>(&self, video: &Video, executor: E) -> Result<Video>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let play_urls_json = serde_json::to_value(&video.play_urls)?;

        let row = sqlx::query(
            r"
            UPDATE videos SET
                name = $2, year = $3, area = $4, language = $5, actors = $6, directors = $7,
                synopsis = $8, tags = $9, cover_url = $10, thumb_url = $11, remarks = $12,
                rating = $13, type_id = $14, sub_type_id = $15, source_names = $16,
                source_priority = $17, quality_score = $18, is_valid = $19, play_urls = $20,
                preview_episode_index = $21, preview_url = $22, shorts_category = $23,
                updated_at = $24
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(video.id.as_str())
        .bind(&video.name)
        .bind(&video.year)
        .bind(&video.area)
        .bind(&video.language)
        .bind(&video.actors)
        .bind(&video.directors)
        .bind(&video.synopsis)
        .bind(&video.tags)
        .bind(&video.cover_url)
        .bind(&video.thumb_url)
        .bind(&video.remarks)
        .bind(video.rating)
        .bind(video.type_id)
        .bind(video.sub_type_id)
        .bind(&video.source_names)
        .bind(video.source_priority)
        .bind(video.quality_score)
        .bind(video.is_valid)
        .bind(&play_urls_json)
        .bind(video.preview_episode_index)
        .bind(&video.preview_url)
        .bind(&video.shorts_category)
        .bind(video.updated_at)
        .fetch_one(executor)
        .await?;

        self.row_to_video(row)
    }

    pub async fn get_by_id(&self, id: &VideoId) -> Result<Option<Video>> {
        let row = sqlx::query("SELECT * FROM videos WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| self.row_to_video(r)).transpose()
    }

    /// §4.G step 1: exact match on `(name, year, area)`, both non-empty.
    pub async fn find_exact(&self, name: &str, year: &str, area: &str) -> Result<Option<Video>> {
        let row = sqlx::query(
            "SELECT * FROM videos WHERE name = $1 AND year = $2 AND area = $3 AND is_valid LIMIT 1",
        )
        .bind(name)
        .bind(year)
        .bind(area)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| self.row_to_video(r)).transpose()
    }

    /// §4.G step 2: year-only match on `(name, year)`.
    pub async fn find_by_name_year(&self, name: &str, year: &str) -> Result<Option<Video>> {
        let row = sqlx::query("SELECT * FROM videos WHERE name = $1 AND year = $2 AND is_valid LIMIT 1")
            .bind(name)
            .bind(year)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| self.row_to_video(r)).transpose()
    }

    /// §4.G step 3: director-only match, ordered by `quality_score DESC`.
    pub async fn find_by_name_director(&self, name: &str, first_director: &str) -> Result<Option<Video>> {
        let pattern = format!("%{first_director}%");
        let row = sqlx::query(
            r"
            SELECT * FROM videos
            WHERE name = $1 AND directors::text LIKE $2 AND is_valid
            ORDER BY quality_score DESC
            LIMIT 1
            ",
        )
        .bind(name)
        .bind(pattern)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| self.row_to_video(r)).transpose()
    }

    /// §4.G step 4/5: loose name-only match, ordered `quality_score DESC, updated_at DESC`.
    pub async fn find_by_name_loose(&self, name: &str) -> Result<Vec<Video>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM videos
            WHERE name = $1 AND is_valid
            ORDER BY quality_score DESC, updated_at DESC
            ",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| self.row_to_video(r)).collect()
    }

    /// §4.G step 5: same-name row whose year is still blank, best quality first. A
    /// backfill target for an incoming record that has a year but matched nothing
    /// above — not a full match, so callers rely on `merge`'s year-backfill to fill it.
    pub async fn find_by_name_year_empty(&self, name: &str) -> Result<Option<Video>> {
        let row = sqlx::query(
            r"
            SELECT * FROM videos
            WHERE name = $1 AND year = '' AND is_valid
            ORDER BY quality_score DESC
            LIMIT 1
            ",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| self.row_to_video(r)).transpose()
    }

    /// All valid rows sharing a name, for the housekeeping merge (§4.G `merge_duplicates`).
    pub async fn find_all_by_name(&self, name: &str) -> Result<Vec<Video>> {
        let rows = sqlx::query(
            "SELECT * FROM videos WHERE name = $1 AND is_valid ORDER BY quality_score DESC, updated_at DESC",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| self.row_to_video(r)).collect()
    }

    /// Distinct names with more than one valid row, input to `cleanup_duplicates`.
    pub async fn names_with_duplicates(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM videos WHERE is_valid GROUP BY name HAVING COUNT(*) > 1",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(n,)| n).collect())
    }

    /// Rows sharing a normalized base name and matching year (or empty year), for
    /// `find_all_versions` (§4.G language/quality grouping).
    pub async fn find_by_base_name(&self, base_name_pattern: &str, year: &str) -> Result<Vec<Video>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM videos
            WHERE name LIKE $1 AND is_valid AND (year = $2 OR year = '')
            ORDER BY quality_score DESC
            ",
        )
        .bind(base_name_pattern)
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| self.row_to_video(r)).collect()
    }

    pub async fn delete(&self, id: &VideoId) -> Result<bool> {
        let result = sqlx::query("UPDATE videos SET is_valid = false, updated_at = now() WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_batch_with_executor<'e, E>(&self, ids: &[VideoId], executor: E) -> Result<usize>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        if ids.is_empty() {
            return Ok(0);
        }
        let id_strs: Vec<&str> = ids.iter().map(VideoId::as_str).collect();
        let result = sqlx::query("DELETE FROM videos WHERE id = ANY($1)")
            .bind(&id_strs)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() as usize)
    }

    /// GC target: rows invalid for more than 30 days.
    pub async fn find_stale_invalid(&self, older_than_days: i64) -> Result<Vec<VideoId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT id FROM videos
            WHERE NOT is_valid AND updated_at < now() - ($1 || ' days')::interval
            ",
        )
        .bind(older_than_days.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| VideoId::from_string(id)).collect())
    }

    /// Paginated, filtered list for the read path (Aggregator cache-miss backstop).
    pub async fn list_by_type(&self, type_id: i16, page: i64, page_size: i64) -> Result<(Vec<Video>, i64)> {
        let offset = (page.max(1) - 1) * page_size;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos WHERE type_id = $1 AND is_valid")
            .bind(type_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            r"
            SELECT * FROM videos
            WHERE type_id = $1 AND is_valid
            ORDER BY updated_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(type_id)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let items = rows.into_iter().map(|r| self.row_to_video(r)).collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    /// Cache-first list-browsing read (§4.J): `type_id`, sub-type/tag, area `LIKE`,
    /// year, plus a `sort ∈ {hits, score, recency}` facet. `hits` sorts by the trailing
    /// 30-day sum from `access_log`, computed per row via a correlated subquery since
    /// hit totals are not denormalized onto `videos`.
    pub async fn list_filtered(
        &self,
        filters: &ListFilters,
        sort: ListSortOrder,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Video>, i64)> {
        const WHERE: &str = r"
            is_valid
            AND ($1::smallint IS NULL OR type_id = $1)
            AND ($2::integer IS NULL OR sub_type_id = $2)
            AND ($3::text IS NULL OR tags::text ILIKE '%' || $3 || '%')
            AND ($4::text IS NULL OR area ILIKE '%' || $4 || '%')
            AND ($5::text IS NULL OR year = $5)
        ";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM videos WHERE {WHERE}"))
            .bind(filters.type_id)
            .bind(filters.sub_type_id)
            .bind(&filters.tag)
            .bind(&filters.area)
            .bind(&filters.year)
            .fetch_one(&self.pool)
            .await?;

        let order_column = match sort {
            ListSortOrder::Score => "quality_score DESC",
            ListSortOrder::Recency => "updated_at DESC",
            ListSortOrder::Hits => "hits_30d DESC",
        };

        let offset = (page.max(1) - 1) * page_size;
        let select_sql = format!(
            r"
            SELECT *, COALESCE((
                SELECT SUM(a.hits) FROM access_log a
                WHERE a.video_id = videos.id AND a.day >= CURRENT_DATE - INTERVAL '30 days'
            ), 0) AS hits_30d
            FROM videos
            WHERE {WHERE}
            ORDER BY {order_column}
            LIMIT $6 OFFSET $7
            "
        );
        let rows = sqlx::query(&select_sql)
            .bind(filters.type_id)
            .bind(filters.sub_type_id)
            .bind(&filters.tag)
            .bind(&filters.area)
            .bind(&filters.year)
            .bind(page_size)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let items = rows.into_iter().map(|r| self.row_to_video(r)).collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    fn row_to_video(&self, row: PgRow) -> Result<Video> {
        let play_urls_json: serde_json::Value = row.try_get("play_urls")?;
        Ok(Video {
            id: VideoId::from_string(row.try_get("id")?),
            name: row.try_get("name")?,
            year: row.try_get("year")?,
            area: row.try_get("area")?,
            language: row.try_get("language")?,
            actors: row.try_get("actors")?,
            directors: row.try_get("directors")?,
            synopsis: row.try_get("synopsis")?,
            tags: row.try_get("tags")?,
            cover_url: row.try_get("cover_url")?,
            thumb_url: row.try_get("thumb_url")?,
            remarks: row.try_get("remarks")?,
            rating: row.try_get("rating")?,
            type_id: row.try_get("type_id")?,
            sub_type_id: row.try_get("sub_type_id")?,
            source_names: row.try_get("source_names")?,
            source_priority: row.try_get("source_priority")?,
            quality_score: row.try_get("quality_score")?,
            is_valid: row.try_get("is_valid")?,
            play_urls: serde_json::from_value(play_urls_json)?,
            preview_episode_index: row.try_get("preview_episode_index")?,
            preview_url: row.try_get("preview_url")?,
            shorts_category: row.try_get("shorts_category")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_find_exact_placeholder() {}
}

use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{Video, VideoId},
    Result,
};

/// Order options for `advanced_search` (§4.L).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOrderBy {
    Score,
    Time,
    Name,
}

/// Facets accepted by `advanced_search` (§4.L).
#[derive(Debug, Clone, Default)]
pub struct AdvancedSearchParams {
    pub keyword: Option<String>,
    pub type_id: Option<i16>,
    pub year: Option<String>,
    pub area: Option<String>,
    pub actor: Option<String>,
    pub director: Option<String>,
}

#[derive(Clone)]
pub struct SearchRepository {
    pool: PgPool,
}

impl SearchRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Primary `tsvector`-backed full text search over `(name, actor, director, content)`.
    pub async fn fts_search(&self, keyword: &str, limit: i64) -> Result<Vec<Video>> {
        let rows = sqlx::query(
            r"
            SELECT v.* FROM videos v
            JOIN search_index s ON s.video_id = v.id
            WHERE v.is_valid AND s.tsv @@ plainto_tsquery('simple', $1)
            ORDER BY ts_rank(s.tsv, plainto_tsquery('simple', $1)) DESC
            LIMIT $2
            ",
        )
        .bind(keyword)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_video).collect()
    }

    /// `LIKE` fallback when FTS returns nothing (§4.L).
    pub async fn like_search(&self, keyword: &str, limit: i64) -> Result<Vec<Video>> {
        let pattern = format!("%{keyword}%");
        let rows = sqlx::query(
            r"
            SELECT * FROM videos
            WHERE is_valid AND (name ILIKE $1 OR actors::text ILIKE $1 OR directors::text ILIKE $1)
            ORDER BY quality_score DESC, updated_at DESC
            LIMIT $2
            ",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_video).collect()
    }

    /// `advanced_search`: composable WHERE clause over optional facets, two-query
    /// (count, page) execution. Each facet is a `$n::type IS NULL OR …` guard so a
    /// single prepared statement serves every combination of present/absent filters.
    pub async fn advanced_search(
        &self,
        params: &AdvancedSearchParams,
        order_by: SearchOrderBy,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Video>, i64)> {
        let order_column = match order_by {
            SearchOrderBy::Score => "quality_score DESC",
            SearchOrderBy::Time => "updated_at DESC",
            SearchOrderBy::Name => "name ASC",
        };

        const WHERE: &str = r"
            is_valid
            AND ($1::smallint IS NULL OR type_id = $1)
            AND ($2::text IS NULL OR year = $2)
            AND ($3::text IS NULL OR area ILIKE '%' || $3 || '%')
            AND ($4::text IS NULL OR actors::text ILIKE '%' || $4 || '%')
            AND ($5::text IS NULL OR directors::text ILIKE '%' || $5 || '%')
            AND ($6::text IS NULL OR name ILIKE '%' || $6 || '%')
        ";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM videos WHERE {WHERE}"))
            .bind(params.type_id)
            .bind(&params.year)
            .bind(&params.area)
            .bind(&params.actor)
            .bind(&params.director)
            .bind(&params.keyword)
            .fetch_one(&self.pool)
            .await?;

        let offset = (page.max(1) - 1) * page_size;
        let select_sql = format!("SELECT * FROM videos WHERE {WHERE} ORDER BY {order_column} LIMIT $7 OFFSET $8");
        let rows = sqlx::query(&select_sql)
            .bind(params.type_id)
            .bind(&params.year)
            .bind(&params.area)
            .bind(&params.actor)
            .bind(&params.director)
            .bind(&params.keyword)
            .bind(page_size)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let items = rows.into_iter().map(Self::row_to_video).collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    /// `suggestions(prefix, limit)`: distinct names matching `prefix%`, ordered by quality.
    pub async fn suggestions(&self, prefix: &str, limit: i64) -> Result<Vec<String>> {
        let pattern = format!("{prefix}%");
        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT DISTINCT ON (name) name FROM videos
            WHERE is_valid AND name LIKE $1
            ORDER BY name, quality_score DESC
            LIMIT $2
            ",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(n,)| n).collect())
    }

    /// Upsert the `tsvector` row for one video after write (keeps `search_index` current).
    pub async fn reindex(&self, video: &Video) -> Result<()> {
        let text = format!(
            "{} {} {} {}",
            video.name,
            video.actors.join(" "),
            video.directors.join(" "),
            video.synopsis
        );

        sqlx::query(
            r"
            INSERT INTO search_index (video_id, tsv)
            VALUES ($1, to_tsvector('simple', $2))
            ON CONFLICT (video_id) DO UPDATE SET tsv = EXCLUDED.tsv
            ",
        )
        .bind(video.id.as_str())
        .bind(text)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_video(row: PgRow) -> Result<Video> {
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

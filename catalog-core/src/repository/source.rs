use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{ResponseFormat, Source, SourceId},
    Result,
};

#[derive(Clone)]
pub struct SourceRepository {
    pool: PgPool,
}

impl SourceRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, source: &Source) -> Result<Source> {
        let row = sqlx::query(
            r"
            INSERT INTO sources (id, name, base_url, weight, active, format, welfare)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            ",
        )
        .bind(source.id.as_str())
        .bind(&source.name)
        .bind(&source.base_url)
        .bind(source.weight)
        .bind(source.active)
        .bind(source.format.as_str())
        .bind(source.welfare)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_source(row)
    }

    pub async fn get_by_id(&self, id: &SourceId) -> Result<Option<Source>> {
        let row = sqlx::query("SELECT * FROM sources WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_source).transpose()
    }

    /// All active sources, ordered by weight descending.
    pub async fn list_active(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query("SELECT * FROM sources WHERE active ORDER BY weight DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_source).collect()
    }

    pub async fn list_all(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query("SELECT * FROM sources ORDER BY weight DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_source).collect()
    }

    pub async fn update(&self, source: &Source) -> Result<Source> {
        let row = sqlx::query(
            r"
            UPDATE sources SET name = $2, base_url = $3, weight = $4, active = $5,
                format = $6, welfare = $7
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(source.id.as_str())
        .bind(&source.name)
        .bind(&source.base_url)
        .bind(source.weight)
        .bind(source.active)
        .bind(source.format.as_str())
        .bind(source.welfare)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_source(row)
    }

    fn row_to_source(row: PgRow) -> Result<Source> {
        Ok(Source {
            id: SourceId::from_string(row.try_get("id")?),
            name: row.try_get("name")?,
            base_url: row.try_get("base_url")?,
            weight: row.try_get("weight")?,
            active: row.try_get("active")?,
            format: ResponseFormat::from_str(row.try_get("format")?),
            welfare: row.try_get("welfare")?,
        })
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_list_active_placeholder() {}
}

use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{CategoryMapping, SubCategory},
    Result,
};

/// Backs the Classifier's DB-loaded mapping tables (§4.C method 3 / sub-category lookup).
#[derive(Clone)]
pub struct ClassifierRepository {
    pool: PgPool,
}

impl ClassifierRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_category_mappings(&self) -> Result<Vec<CategoryMapping>> {
        let rows = sqlx::query("SELECT * FROM category_mappings").fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_mapping).collect()
    }

    pub async fn list_sub_categories(&self, parent_type_id: i16) -> Result<Vec<SubCategory>> {
        let rows = sqlx::query("SELECT * FROM sub_categories WHERE parent_type_id = $1")
            .bind(parent_type_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_sub_category).collect()
    }

    fn row_to_mapping(row: PgRow) -> Result<CategoryMapping> {
        Ok(CategoryMapping {
            source_family: row.try_get("source_family")?,
            upstream_type_id: row.try_get("upstream_type_id")?,
            upstream_type_name: row.try_get("upstream_type_name")?,
            internal_type_id: row.try_get("internal_type_id")?,
        })
    }

    fn row_to_sub_category(row: PgRow) -> Result<SubCategory> {
        Ok(SubCategory {
            id: row.try_get("id")?,
            parent_type_id: row.try_get("parent_type_id")?,
            name: row.try_get("name")?,
        })
    }
}

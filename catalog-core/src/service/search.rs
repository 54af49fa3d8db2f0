//! Search service (§4.L).
//!
//! Tries full text search first; if it returns nothing (a common outcome for very
//! short or punctuation-heavy queries against `tsvector`), falls back to a `LIKE` scan.

use std::sync::Arc;

use crate::models::Video;
use crate::repository::search::{AdvancedSearchParams, SearchOrderBy};
use crate::repository::SearchRepository;
use crate::Result;

pub struct SearchService {
    repository: Arc<SearchRepository>,
}

impl SearchService {
    #[must_use]
    pub fn new(repository: Arc<SearchRepository>) -> Self {
        Self { repository }
    }

    /// FTS first, `LIKE` fallback when FTS comes back empty (§4.L).
    pub async fn search(&self, keyword: &str, limit: i64) -> Result<Vec<Video>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(Vec::new());
        }

        let hits = self.repository.fts_search(keyword, limit).await?;
        if !hits.is_empty() {
            return Ok(hits);
        }
        self.repository.like_search(keyword, limit).await
    }

    pub async fn advanced_search(
        &self,
        params: &AdvancedSearchParams,
        order_by: SearchOrderBy,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Video>, i64)> {
        self.repository.advanced_search(params, order_by, page, page_size).await
    }

    pub async fn suggestions(&self, prefix: &str, limit: i64) -> Result<Vec<String>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        self.repository.suggestions(prefix, limit).await
    }

    pub async fn reindex(&self, video: &Video) -> Result<()> {
        self.repository.reindex(video).await
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_empty_keyword_guard_is_checked_before_query() {
        // search()/suggestions() both short-circuit on an empty/whitespace-only input
        // without issuing a query; covered at the integration level against a real pool.
        assert_eq!("".trim(), "");
        assert_eq!("   ".trim(), "");
    }
}

//! Search endpoints (§4.L): FTS-first keyword search, advanced multi-facet query,
//! and prefix suggestions.

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use catalog_core::models::Video;
use catalog_core::repository::{AdvancedSearchParams, SearchOrderBy};
use serde::{Deserialize, Serialize};

use super::error::AppResult;
use super::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/search/advanced", get(advanced_search))
        .route("/api/search/suggestions", get(suggestions))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

/// `GET /api/search?q=&limit=`
async fn search(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> AppResult<Json<Vec<Video>>> {
    Ok(Json(state.services.search.search(&q.q, q.limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct AdvancedSearchQuery {
    pub keyword: Option<String>,
    pub type_id: Option<i16>,
    pub year: Option<String>,
    pub area: Option<String>,
    pub actor: Option<String>,
    pub director: Option<String>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub items: Vec<Video>,
    pub total: i64,
}

/// `GET /api/search/advanced` — facet query over `{keyword, type_id, year, area, actor, director}`.
async fn advanced_search(State(state): State<AppState>, Query(q): Query<AdvancedSearchQuery>) -> AppResult<Json<SearchResponse>> {
    let params = AdvancedSearchParams {
        keyword: q.keyword,
        type_id: q.type_id,
        year: q.year,
        area: q.area,
        actor: q.actor,
        director: q.director,
    };
    let order_by = match q.order_by.as_deref() {
        Some("time") => SearchOrderBy::Time,
        Some("name") => SearchOrderBy::Name,
        _ => SearchOrderBy::Score,
    };
    let (items, total) = state.services.search.advanced_search(&params, order_by, q.page, q.page_size).await?;
    Ok(Json(SearchResponse { items, total }))
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    pub prefix: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// `GET /api/search/suggestions?prefix=`
async fn suggestions(State(state): State<AppState>, Query(q): Query<SuggestQuery>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.services.search.suggestions(&q.prefix, q.limit).await?))
}

//! Catalog read endpoints (§4.J Aggregator + direct video lookups).

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use catalog_core::models::{Video, VideoId};
use serde::{Deserialize, Serialize};

use super::error::{AppError, AppResult};
use super::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/videos", get(list_videos))
        .route("/api/videos/{id}", get(get_video))
}

#[derive(Debug, Deserialize)]
pub struct ListVideosQuery {
    pub type_id: i16,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct ListVideosResponse {
    pub items: Vec<Video>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// `GET /api/videos?type_id=&page=&page_size=` — cache-first list by type (§4.J).
async fn list_videos(State(state): State<AppState>, Query(q): Query<ListVideosQuery>) -> AppResult<Json<ListVideosResponse>> {
    let (items, total) = state.services.aggregator.list_by_type(q.type_id, q.page, q.page_size).await?;
    Ok(Json(ListVideosResponse { items, total, page: q.page, page_size: q.page_size }))
}

/// `GET /api/videos/{id}` — direct lookup by stable `video_id`.
async fn get_video(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Video>> {
    let video_id = VideoId(id);
    state
        .services
        .videos
        .get_by_id(&video_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("video {} not found", video_id.0)))
}

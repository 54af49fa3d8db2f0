//! Recommendation dispatcher (§4.K).
//!
//! `catalog_core::service::Recommender` implements the scoring primitives (similarity,
//! trending composite, personalized blending, precomputed-neighbor lookup) but, per the
//! platform's no-persisted-user-accounts non-goal, has no notion of "the current
//! request". This handler is where a request's `strategy` is dispatched to the right
//! primitive and any watch history / seed video is resolved from caller-supplied ids,
//! exactly as the module doc of `recommender.rs` anticipates. Every strategy falls back
//! to `trending` on internal failure, per §4.K's "gracefully degrade" clause.

use axum::{extract::State, response::Json, routing::post, Router};
use catalog_core::models::{TypeId, Video, VideoId};
use catalog_core::service::RecommendationStrategy;
use serde::{Deserialize, Serialize};

use super::error::AppResult;
use super::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/recommend", post(recommend))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ContentBased,
    Similar,
    ShortsSimilar,
    Trending,
    Personalized,
    Collaborative,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub strategy: Strategy,
    /// Seed video for `content_based`/`similar`/`shorts_similar`.
    pub video_id: Option<String>,
    /// Category to rank within for `trending` (defaults to Movie).
    pub type_id: Option<i16>,
    /// Caller-supplied ephemeral watch history, oldest-first, for `personalized`/`collaborative`.
    #[serde(default)]
    pub watch_history: Vec<String>,
    #[serde(default)]
    pub exclude_ids: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct RecommendedItem {
    pub video_id: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub strategy: &'static str,
    pub items: Vec<RecommendedItem>,
}

/// `POST /api/recommend` — dispatch on `strategy`, degrading to `trending` on any
/// internal failure so a caller never sees a bare 500 for a recommendation request.
async fn recommend(State(state): State<AppState>, Json(req): Json<RecommendRequest>) -> AppResult<Json<RecommendResponse>> {
    let result = dispatch(&state, &req).await;
    match result {
        Ok((strategy, items)) => Ok(Json(RecommendResponse { strategy, items })),
        Err(_) => {
            let type_id = req.type_id.unwrap_or(TypeId::Movie.as_i16());
            let candidates = candidates_for_type(&state, type_id).await.unwrap_or_default();
            let ranked = state.services.recommender.trending(&type_id.to_string(), &candidates, req.limit).await.unwrap_or_default();
            Ok(Json(RecommendResponse { strategy: "trending", items: to_items(ranked, &req.exclude_ids) }))
        }
    }
}

async fn candidates_for_type(state: &AppState, type_id: i16) -> catalog_core::Result<Vec<Video>> {
    let (items, _) = state.services.aggregator.list_by_type(type_id, 1, 200).await?;
    Ok(items)
}

fn to_items(ranked: Vec<(VideoId, f64)>, exclude_ids: &[String]) -> Vec<RecommendedItem> {
    ranked
        .into_iter()
        .filter(|(id, _)| !exclude_ids.iter().any(|x| x == &id.0))
        .map(|(id, score)| RecommendedItem { video_id: id.0, score })
        .collect()
}

async fn dispatch(state: &AppState, req: &RecommendRequest) -> catalog_core::Result<(&'static str, Vec<RecommendedItem>)> {
    match req.strategy {
        Strategy::ContentBased | Strategy::Similar => {
            let strategy = RecommendationStrategy::ContentBased;
            let (label, ranked) = content_based(state, req, strategy, false).await?;
            Ok((label, ranked))
        }
        Strategy::ShortsSimilar => {
            let strategy = RecommendationStrategy::ShortsSimilar;
            let (label, ranked) = content_based(state, req, strategy, true).await?;
            Ok((label, ranked))
        }
        Strategy::Trending => {
            let type_id = req.type_id.unwrap_or(TypeId::Movie.as_i16());
            let candidates = candidates_for_type(state, type_id).await?;
            let ranked = state.services.recommender.trending(&type_id.to_string(), &candidates, req.limit).await?;
            Ok(("trending", to_items(ranked, &req.exclude_ids)))
        }
        Strategy::Personalized | Strategy::Collaborative => {
            // No persisted multi-user profiles exist (§1 non-goal), so `collaborative`
            // collapses onto the same ephemeral-history blend `personalized` uses.
            if req.watch_history.is_empty() {
                let type_id = req.type_id.unwrap_or(TypeId::Movie.as_i16());
                let candidates = candidates_for_type(state, type_id).await?;
                let ranked = state.services.recommender.trending(&type_id.to_string(), &candidates, req.limit).await?;
                return Ok(("trending", to_items(ranked, &req.exclude_ids)));
            }
            let mut watched = Vec::with_capacity(req.watch_history.len());
            for id in &req.watch_history {
                if let Some(v) = state.services.videos.get_by_id(&VideoId(id.clone())).await? {
                    watched.push(v);
                }
            }
            let type_id = watched.last().map_or(TypeId::Movie.as_i16(), |v| v.type_id);
            let candidates = candidates_for_type(state, type_id).await?;
            let ranked = state.services.recommender.personalized(&watched, &candidates, req.limit).await;
            Ok(("personalized", to_items(ranked, &req.exclude_ids)))
        }
    }
}

/// Shared body for `content_based`/`similar`/`shorts_similar`: try precomputed
/// neighbors first, else compute on the fly from same-type (same-`ShortDrama`, if
/// `shorts_only`) candidates and persist the neighbor set for next time.
async fn content_based(
    state: &AppState,
    req: &RecommendRequest,
    strategy: RecommendationStrategy,
    shorts_only: bool,
) -> catalog_core::Result<(&'static str, Vec<RecommendedItem>)> {
    let video_id = req
        .video_id
        .clone()
        .ok_or_else(|| catalog_core::Error::InvalidInput("video_id is required for this strategy".to_string()))?;
    let seed_id = VideoId(video_id);

    let precomputed = state.services.recommender.neighbors(&seed_id, strategy).await?;
    let filtered: Vec<_> = precomputed.into_iter().filter(|(id, _)| !req.exclude_ids.iter().any(|x| x == &id.0)).collect();
    if filtered.len() >= req.limit {
        return Ok((strategy.as_str(), to_items(filtered, &[])));
    }

    let seed = state
        .services
        .videos
        .get_by_id(&seed_id)
        .await?
        .ok_or_else(|| catalog_core::Error::NotFound(format!("video {} not found", seed_id.0)))?;

    let type_id = if shorts_only { TypeId::ShortDrama.as_i16() } else { seed.type_id };
    let (candidates, _) = state.services.aggregator.list_by_type(type_id, 1, 200).await?;
    let ranked = state
        .services
        .recommender
        .precompute_content_based(&seed, &candidates, strategy, req.limit)
        .await?;
    Ok((strategy.as_str(), to_items(ranked, &req.exclude_ids)))
}

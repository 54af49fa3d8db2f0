//! Task admin endpoints (§4.E Task Manager), exposed for operator/scheduler tooling
//! rather than end-user traffic.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use catalog_core::models::{Task, TaskConfig, TaskId, TaskKind, TaskStatus};
use serde::Deserialize;

use super::error::{AppError, AppResult};
use super::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", get(get_task))
        .route("/api/tasks/{id}/start", post(start_task))
        .route("/api/tasks/{id}/pause", post(pause_task))
        .route("/api/tasks/{id}/resume", post(resume_task))
        .route("/api/tasks/{id}/cancel", post(cancel_task))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub kind: TaskKind,
    #[serde(default)]
    pub priority: i16,
    #[serde(default)]
    pub config: TaskConfig,
}

/// `POST /api/tasks` — enqueue a new collection task in `Pending` status.
async fn create_task(State(state): State<AppState>, Json(req): Json<CreateTaskRequest>) -> AppResult<Json<Task>> {
    let task = state.services.task_manager.create(req.kind, req.priority, req.config).await?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
    pub kind: Option<TaskKind>,
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

#[derive(Debug, serde::Serialize)]
pub struct ListTasksResponse {
    pub items: Vec<Task>,
    pub total: i64,
}

/// `GET /api/tasks?status=&kind=&page=&page_size=`
async fn list_tasks(State(state): State<AppState>, Query(q): Query<ListTasksQuery>) -> AppResult<Json<ListTasksResponse>> {
    let (items, total) = state.services.task_manager.list(q.status, q.kind, q.page, q.page_size).await?;
    Ok(Json(ListTasksResponse { items, total }))
}

async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Task>> {
    state
        .services
        .task_manager
        .get(&TaskId(id.clone()))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("task {id} not found")))
}

async fn start_task(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Task>> {
    Ok(Json(state.services.task_manager.start(&TaskId(id)).await?))
}

async fn pause_task(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Task>> {
    Ok(Json(state.services.task_manager.pause(&TaskId(id)).await?))
}

async fn resume_task(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Task>> {
    Ok(Json(state.services.task_manager.resume(&TaskId(id)).await?))
}

async fn cancel_task(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Task>> {
    Ok(Json(state.services.task_manager.cancel(&TaskId(id)).await?))
}

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;

use crate::db::{Task, UserSummary};
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::services::sharing::{ShareRequest, SharingService};
use crate::services::tasks::{NewTask, TaskChanges, TaskListQuery, TaskService, TaskStats};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/shared", get(shared_with_me))
        .route("/summary/stats", get(task_stats))
        .route("/:id/share", put(share_task))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub message: String,
    pub newly_shared: Vec<UserSummary>,
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(input): Json<NewTask>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let task = TaskService::create(&state, &user, input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Owned and shared tasks, `?search=` and `?status=` narrow the list.
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<TaskListQuery>,
) -> AppResult<Json<Vec<Task>>> {
    let tasks = TaskService::list(&state, &user, query).await?;
    Ok(Json(tasks))
}

async fn shared_with_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<Task>>> {
    let tasks = TaskService::shared_with_me(&state, &user).await?;
    Ok(Json(tasks))
}

async fn task_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<TaskStats>> {
    let stats = TaskService::stats(&state, &user).await?;
    Ok(Json(stats))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Task>> {
    let task = TaskService::get(&state, &user, &id).await?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(changes): Json<TaskChanges>,
) -> AppResult<Json<Task>> {
    let task = TaskService::update(&state, &user, &id, changes).await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    TaskService::delete(&state, &user, &id).await?;
    Ok(Json(MessageResponse {
        message: "Task removed".to_string(),
    }))
}

async fn share_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ShareRequest>,
) -> AppResult<Json<ShareResponse>> {
    let targets = request.into_targets()?;
    let outcome = SharingService::share(&state, &user, &id, targets).await?;

    Ok(Json(ShareResponse {
        message: outcome.message(),
        newly_shared: outcome.newly_shared,
        task: outcome.task,
    }))
}

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{NotificationRepository, NotificationView};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/mark-read", put(mark_read))
        .route("/mark-all-read", put(mark_all_read))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub notification_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub message: String,
    pub modified: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// The caller's notifications, newest first, with related task and actor.
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<NotificationView>>> {
    let notifications = NotificationRepository::list_for_recipient(&state.db, &user.id).await?;
    Ok(Json(notifications))
}

/// Mark some of the caller's notifications as read. Ids that belong to other
/// users or are already read are ignored; if nothing changed the answer is 404.
async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<MarkReadRequest>,
) -> AppResult<Json<MarkReadResponse>> {
    let ids = match request.notification_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => {
            return Err(AppError::Validation(
                "Notification IDs are required as an array.".to_string(),
            ))
        }
    };

    let modified = NotificationRepository::mark_read(&state.db, &user.id, &ids).await?;
    if modified == 0 {
        return Err(AppError::NotFound(
            "No unread notifications found matching the provided IDs for this user".to_string(),
        ));
    }

    tracing::debug!("User {} marked {} notification(s) read", user.id, modified);
    Ok(Json(MarkReadResponse {
        message: format!("{} notifications marked as read.", modified),
        modified,
    }))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<MarkReadResponse>> {
    let modified = NotificationRepository::mark_all_read(&state.db, &user.id).await?;
    Ok(Json(MarkReadResponse {
        message: format!("{} notifications marked as read.", modified),
        modified,
    }))
}

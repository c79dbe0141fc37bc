use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::{User, UserRepository, UserSummary};
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::AppState;

/// Authenticated user endpoints. Register and login live in `routes::auth`
/// and are merged into the same prefix.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(profile))
        .route("/list", get(list_users))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

impl From<User> for ProfileResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            created_at: u.created_at,
        }
    }
}

async fn profile(AuthUser(user): AuthUser) -> Json<ProfileResponse> {
    Json(user.into())
}

/// Everyone except the caller, for picking share targets.
async fn list_users(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<UserSummary>>> {
    let users = UserRepository::list_except(&state.db, &user.id).await?;
    Ok(Json(users))
}

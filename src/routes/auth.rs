use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::User;
use crate::error::{AppError, AppErrorWithDetails};
use crate::routes::validate_request;
use crate::services::auth::{AuthService, Registration};
use crate::AppState;

/// Public account endpoints. Mounted next to the user routes, behind the
/// auth rate limiter in production.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    #[serde(default)]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    #[serde(default)]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    #[serde(default)]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[serde(default)]
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub token: String,
}

impl AuthResponse {
    fn new(user: User, token: String) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            token,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppErrorWithDetails> {
    validate_request(&request)?;

    let (user, token) = AuthService::register(
        &state,
        Registration {
            name: request.name,
            email: request.email,
            password: request.password,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(AuthResponse::new(user, token))))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppErrorWithDetails> {
    validate_request(&request)?;

    let (user, token) = AuthService::login(&state, &request.email, request.password).await?;
    tracing::info!("User {} logged in", user.id);

    Ok(Json(AuthResponse::new(user, token)))
}

// ============================================================================
// Auth Extractor
// ============================================================================

/// The authenticated caller, resolved from an `Authorization: Bearer <jwt>` header.
pub struct AuthUser(pub User);

/// Token part of a `Bearer` authorization header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    match header.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => {}
        _ => return None,
    }
    let token = header.get(7..)?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        let token = bearer_token(auth_header).ok_or_else(|| {
            tracing::debug!("Authorization header is not a non-empty Bearer token");
            AppError::Unauthorized
        })?;

        let user = AuthService::get_user_from_token(state, token)
            .await
            .map_err(|e| {
                tracing::debug!("Failed to get user from token: {:?}", e);
                e
            })?;

        Ok(AuthUser(user))
    }
}

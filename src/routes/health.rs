use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Liveness plus a trivial database round trip. Answers 503 when the pool
/// cannot serve a query.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ok = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Health check database probe failed: {:?}", e);
            false
        }
    };

    let response = HealthResponse {
        status: if db_ok { "healthy" } else { "degraded" },
        database: if db_ok { "up" } else { "down" },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

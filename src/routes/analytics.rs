use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::services::analytics::{AnalyticsService, Overview, Trend, TrendQuery};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/overview", get(overview))
        .route("/trends", get(trends))
}

async fn overview(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Overview>> {
    let overview = AnalyticsService::overview(&state, &user).await?;
    Ok(Json(overview))
}

/// `?period=last7days|last30days|thisMonth&dataType=created|completed`
async fn trends(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<TrendQuery>,
) -> AppResult<Json<Trend>> {
    let trend = AnalyticsService::trends(&state, &user, query).await?;
    Ok(Json(trend))
}

//! Multi-user task tracker: accounts, tasks shared between users, stored
//! notifications mirrored onto a live WebSocket channel, and per-user analytics.

use std::sync::Arc;

use axum::{routing::get, Router};
use http::HeaderValue;
use sqlx::SqlitePool;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;

use config::Config;
use services::live::LiveChannelRegistry;

pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub live: LiveChannelRegistry,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config) -> Self {
        Self {
            db,
            config,
            live: LiveChannelRegistry::new(),
        }
    }
}

/// Assemble the HTTP application.
///
/// `auth_routes` is the register/login router; the binary wraps it in the
/// per-IP rate limiter before passing it in.
pub fn build_router(state: Arc<AppState>, auth_routes: Router<Arc<AppState>>) -> Router {
    let origin = match state.config.server.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(
                "FRONTEND_URL {:?} is not a valid origin; cross-origin requests will be refused",
                state.config.server.frontend_url
            );
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/users", routes::users::router().merge(auth_routes))
        .nest("/api/tasks", routes::tasks::router())
        .nest("/api/notifications", routes::notifications::router())
        .nest("/api/analytics", routes::analytics::router())
        .merge(routes::live::router())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::csp::csp_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                ])
                .allow_credentials(true),
        )
}

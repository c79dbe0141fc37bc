use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{body::Body, response::IntoResponse};
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskboard::config::Config;
use taskboard::error::AppError;
use taskboard::services::init;
use taskboard::{build_router, routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting taskboard v{}", env!("CARGO_PKG_VERSION"));

    let pool = init::init_db(&config).await?;
    let app_state = Arc::new(AppState::new(pool, config.clone()));

    let thread_shutdown = Arc::new(AtomicBool::new(false));

    // Per-IP limiter for register/login.
    let mut auth_builder = GovernorConfigBuilder::default();
    auth_builder
        .per_second(config.rate_limit.auth_per_second.into())
        .burst_size(config.rate_limit.auth_burst);
    let mut auth_builder = auth_builder.key_extractor(SmartIpKeyExtractor);
    auth_builder.error_handler(rate_limit_response);

    let auth_gov_conf = Arc::new(
        auth_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build auth governor config"))?,
    );

    // Background cleanup for auth limiter storage
    let auth_cleaner = {
        let limiter = auth_gov_conf.limiter().clone();
        let interval = Duration::from_secs(60);
        let flag = thread_shutdown.clone();
        std::thread::spawn(move || {
            let tick = Duration::from_secs(1);
            loop {
                for _ in 0..interval.as_secs() {
                    if flag.load(Ordering::SeqCst) {
                        tracing::info!("Auth rate limiter cleanup thread exiting");
                        return;
                    }
                    std::thread::sleep(tick);
                }
                tracing::debug!("auth rate limiter size: {}", limiter.len());
                limiter.retain_recent();
            }
        })
    };

    let auth_routes = routes::auth::router().layer(GovernorLayer {
        config: auth_gov_conf.clone(),
    });

    let app = build_router(app_state.clone(), auth_routes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(app_state.clone(), thread_shutdown.clone()))
    .await?;

    if let Err(e) = auth_cleaner.join() {
        tracing::warn!("Auth cleanup thread join failed: {:?}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// `RUST_LOG` drives the filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskboard=debug,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Rate limiter rejections in the same error shape as every other endpoint.
fn rate_limit_response(error: GovernorError) -> http::Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            let mut resp = AppError::RateLimited
                .with_details(serde_json::json!({ "retry_after_seconds": wait_time }))
                .into_response();

            if let Some(hmap) = headers {
                for (name, value) in hmap.iter() {
                    resp.headers_mut().append(name.clone(), value.clone());
                }
            }
            resp.headers_mut()
                .insert(http::header::RETRY_AFTER, HeaderValue::from(wait_time));

            resp
        }
        GovernorError::UnableToExtractKey => {
            AppError::BadRequest("Unable to determine client IP for rate limiting".to_string())
                .into_response()
        }
        GovernorError::Other { code, msg, headers } => {
            let body = msg.unwrap_or_else(|| "Rate limiting error".to_string());
            let mut resp = http::Response::new(Body::from(body));
            *resp.status_mut() =
                StatusCode::from_u16(code.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if let Some(hmap) = headers {
                for (name, value) in hmap.iter() {
                    resp.headers_mut().append(name.clone(), value.clone());
                }
            }
            resp
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM. Clearing the live registry ends every
/// WebSocket session so the graceful shutdown does not wait on them.
async fn shutdown_signal(state: Arc<AppState>, thread_shutdown: Arc<AtomicBool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to bind SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, closing live connections");
    state.live.shutdown();
    thread_shutdown.store(true, Ordering::SeqCst);
}

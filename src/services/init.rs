//! Startup helpers: database connection and migrations.

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::Config;

/// Redact potentially sensitive information from a database URL before logging.
///
/// Userinfo (username:password) and query parameters are dropped. Falls back
/// to removing everything before '@' or returning "(redacted)".
pub fn redact_db_url(db_url: &str) -> String {
    if let Ok(url) = url::Url::parse(db_url) {
        let scheme = url.scheme();
        let host = url.host_str().unwrap_or("");
        let port_part = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
        let path = url.path();
        if host.is_empty() && !db_url.contains("://") {
            return format!("{}:{}", scheme, path);
        }
        format!("{}://{}{}{}", scheme, host, port_part, path)
    } else {
        if let Some(at_pos) = db_url.find('@') {
            let without_creds = &db_url[at_pos + 1..];
            return format!("(redacted){}", without_creds);
        }
        "(redacted)".to_string()
    }
}

/// Filesystem path of a SQLite URL, or `None` for in-memory databases.
fn sqlite_file_path(db_url: &str) -> Option<&str> {
    let path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
        .unwrap_or(db_url);
    let path = path.split('?').next().unwrap_or(path);

    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(path)
    }
}

/// Open the SQLite pool and run migrations.
///
/// For file databases the parent directory is created first and the file is
/// created if missing.
pub async fn init_db(config: &Config) -> Result<SqlitePool> {
    let db_url = &config.database.url;
    tracing::info!("Connecting to database: {}", redact_db_url(db_url));

    if let Some(db_path) = sqlite_file_path(db_url) {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    )
                })?;
                tracing::debug!("Database directory ready: {}", parent.display());
            }
        }
    }

    let connect_options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

fn user_from_row(r: &SqliteRow) -> User {
    User {
        id: r.get("id"),
        name: r.get("name"),
        email: r.get("email"),
        password_hash: r.get("password_hash"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

impl UserRepository {
    /// Insert a new user. A duplicate email surfaces as `AppError::Conflict`.
    pub async fn create(pool: &SqlitePool, user: CreateUser) -> AppResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let email = normalize_email(&user.email);

        let row = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, name, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(user.name.trim())
        .bind(&email)
        .bind(&user.password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("User already exists".to_string())
            }
            other => AppError::Database(other),
        })?;

        Ok(user_from_row(&row))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Case-insensitive lookup by email.
    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = ? COLLATE NOCASE
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Every user except `exclude_id`, ordered by name. Used to pick share targets.
    pub async fn list_except(pool: &SqlitePool, exclude_id: &str) -> AppResult<Vec<UserSummary>> {
        sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, name, email
            FROM users
            WHERE id != ?
            ORDER BY name COLLATE NOCASE, email
            "#,
        )
        .bind(exclude_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}

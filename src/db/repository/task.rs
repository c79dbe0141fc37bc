use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::db::models::*;
use crate::db::repository::MAX_BATCH_IDS;
use crate::error::{AppError, AppResult};

// ============================================================================
// Task Repository
// ============================================================================

pub struct TaskRepository;

/// Which timestamp a daily rollup is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyMetric {
    /// Tasks grouped by creation day.
    Created,
    /// Finished tasks grouped by the day they were last updated.
    Completed,
}

const TASK_COLUMNS: &str = r#"
    t.id, t.owner_id, o.name AS owner_name, o.email AS owner_email,
    t.title, t.description, t.status, t.due_date, t.created_at, t.updated_at
"#;

/// Task row without its share list.
fn task_from_row(r: &SqliteRow) -> AppResult<Task> {
    let status: String = r.get("status");
    let status = status
        .parse::<TaskStatus>()
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Task {
        id: r.get("id"),
        owner: UserSummary {
            id: r.get("owner_id"),
            name: r.get("owner_name"),
            email: r.get("owner_email"),
        },
        title: r.get("title"),
        description: r.get("description"),
        status,
        due_date: r.get::<Option<NaiveDate>, _>("due_date"),
        shared_with: Vec::new(),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

impl TaskRepository {
    pub async fn create(pool: &SqlitePool, task: CreateTask) -> AppResult<Task> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO tasks (id, owner_id, title, description, status, due_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&task.owner_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.due_date)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Self::find_by_id(pool, &id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("task {} vanished after insert", id)))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks t JOIN users o ON o.id = t.owner_id WHERE t.id = ?",
            TASK_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

        match row {
            Some(r) => {
                let mut tasks = Self::hydrate(pool, vec![task_from_row(&r)?]).await?;
                Ok(tasks.pop())
            }
            None => Ok(None),
        }
    }

    /// Tasks the user owns or has been shared on, narrowed by `filter`,
    /// newest first. `search` is a Unicode case-insensitive substring match on
    /// title or description.
    pub async fn list_visible_to(
        pool: &SqlitePool,
        user_id: &str,
        filter: &TaskFilter,
    ) -> AppResult<Vec<Task>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tasks t
            JOIN users o ON o.id = t.owner_id
            WHERE (t.owner_id = ?
                   OR EXISTS (SELECT 1 FROM task_shares s WHERE s.task_id = t.id AND s.user_id = ?))
            AND (? IS NULL OR t.status = ?)
            ORDER BY t.created_at DESC, t.rowid DESC
            "#,
            TASK_COLUMNS
        );
        let status = filter.status.map(|s| s.as_str());

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(user_id)
            .bind(status)
            .bind(status)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?;

        let mut tasks = rows.iter().map(task_from_row).collect::<AppResult<Vec<_>>>()?;
        // SQLite's lower() only folds ASCII, so the text match happens here.
        if let Some(search) = filter.search.as_deref() {
            let needle = search.to_lowercase();
            tasks.retain(|t| t.matches_search(&needle));
        }
        Self::hydrate(pool, tasks).await
    }

    /// Tasks shared with the user that they do not own, newest first.
    pub async fn list_shared_with(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<Task>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM tasks t
            JOIN users o ON o.id = t.owner_id
            WHERE t.owner_id != ?
            AND EXISTS (SELECT 1 FROM task_shares s WHERE s.task_id = t.id AND s.user_id = ?)
            ORDER BY t.created_at DESC, t.rowid DESC
            "#,
            TASK_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?;

        let tasks = rows.iter().map(task_from_row).collect::<AppResult<Vec<_>>>()?;
        Self::hydrate(pool, tasks).await
    }

    /// Overwrite the mutable columns of a task and bump `updated_at`.
    pub async fn update(pool: &SqlitePool, id: &str, update: &UpdateTask) -> AppResult<Task> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET title = ?, description = ?, status = ?, due_date = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.status.as_str())
        .bind(update.due_date)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Task not found".to_string()));
        }

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
    }

    /// Hard delete. Share rows cascade; notifications keep their dangling reference.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Append users to a task's share list and bump `updated_at`, all in one
    /// transaction. Rows that already exist are ignored. Returns the ids whose
    /// row this call inserted, in input order.
    pub async fn add_shares(
        pool: &SqlitePool,
        task_id: &str,
        user_ids: &[String],
    ) -> AppResult<Vec<String>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now().naive_utc();
        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let mut inserted = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO task_shares (task_id, user_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(task_id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
            if result.rows_affected() == 1 {
                inserted.push(user_id.clone());
            }
        }

        if !inserted.is_empty() {
            sqlx::query("UPDATE tasks SET updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(task_id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
        }

        tx.commit().await.map_err(AppError::Database)?;

        Ok(inserted)
    }

    /// Count tasks owned by a user, optionally restricted to one status.
    pub async fn count_by_owner(
        pool: &SqlitePool,
        owner_id: &str,
        status: Option<TaskStatus>,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks WHERE owner_id = ? AND (? IS NULL OR status = ?)",
        )
        .bind(owner_id)
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(count)
    }

    /// Counts of owned tasks grouped by status.
    pub async fn counts_by_status(
        pool: &SqlitePool,
        owner_id: &str,
    ) -> AppResult<HashMap<TaskStatus, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*)
            FROM tasks
            WHERE owner_id = ?
            GROUP BY status
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let mut map = HashMap::new();
        for (status, count) in rows {
            match status.parse::<TaskStatus>() {
                Ok(s) => {
                    map.insert(s, count);
                }
                Err(e) => tracing::warn!("Ignoring tasks with unexpected status: {}", e),
            }
        }

        Ok(map)
    }

    /// Per-day counts of owned tasks since `since` (inclusive), keyed by the
    /// calendar day of the metric's timestamp. Days without activity are absent.
    pub async fn daily_counts(
        pool: &SqlitePool,
        owner_id: &str,
        metric: DailyMetric,
        since: NaiveDateTime,
    ) -> AppResult<HashMap<NaiveDate, i64>> {
        let sql = match metric {
            DailyMetric::Created => {
                r#"
                SELECT substr(created_at, 1, 10) AS day, COUNT(*) AS count
                FROM tasks
                WHERE owner_id = ? AND created_at >= ?
                GROUP BY day
                "#
            }
            DailyMetric::Completed => {
                r#"
                SELECT substr(updated_at, 1, 10) AS day, COUNT(*) AS count
                FROM tasks
                WHERE owner_id = ? AND updated_at >= ? AND status = 'Finished'
                GROUP BY day
                "#
            }
        };

        let rows: Vec<(String, i64)> = sqlx::query_as(sql)
            .bind(owner_id)
            .bind(since)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?;

        let mut map = HashMap::new();
        for (day, count) in rows {
            match NaiveDate::parse_from_str(&day, "%Y-%m-%d") {
                Ok(date) => {
                    map.insert(date, count);
                }
                Err(e) => tracing::warn!("Skipping unparseable day bucket {:?}: {}", day, e),
            }
        }

        Ok(map)
    }

    /// Resolve the share lists of `tasks`, one query per batch of ids.
    async fn hydrate(pool: &SqlitePool, mut tasks: Vec<Task>) -> AppResult<Vec<Task>> {
        if tasks.is_empty() {
            return Ok(tasks);
        }

        let mut shares: HashMap<String, Vec<UserSummary>> = HashMap::new();
        for chunk in tasks.chunks(MAX_BATCH_IDS) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                r#"
                SELECT s.task_id, u.id, u.name, u.email
                FROM task_shares s
                JOIN users u ON u.id = s.user_id
                WHERE s.task_id IN ("#,
            );
            let mut separated = qb.separated(", ");
            for task in chunk {
                separated.push_bind(task.id.clone());
            }
            separated.push_unseparated(") ORDER BY s.created_at, s.rowid");

            let rows = qb
                .build()
                .fetch_all(pool)
                .await
                .map_err(AppError::Database)?;

            for r in rows {
                let task_id: String = r.get("task_id");
                shares.entry(task_id).or_default().push(UserSummary {
                    id: r.get("id"),
                    name: r.get("name"),
                    email: r.get("email"),
                });
            }
        }

        for task in &mut tasks {
            if let Some(list) = shares.remove(&task.id) {
                task.shared_with = list;
            }
        }

        Ok(tasks)
    }
}

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::db::models::*;
use crate::db::repository::MAX_BATCH_IDS;
use crate::error::{AppError, AppResult};

// ============================================================================
// Notification Repository
// ============================================================================

pub struct NotificationRepository;

fn notification_from_row(r: &SqliteRow) -> Notification {
    let notification_type: String = r.get("notification_type");
    Notification {
        id: r.get("id"),
        recipient_id: r.get("recipient_id"),
        message: r.get("message"),
        notification_type: NotificationType::from_db(&notification_type),
        is_read: r.get("is_read"),
        related_task_id: r.get("related_task_id"),
        related_user_id: r.get("related_user_id"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

impl NotificationRepository {
    pub async fn create(pool: &SqlitePool, notification: CreateNotification) -> AppResult<Notification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO notifications (
                id, recipient_id, message, notification_type, is_read,
                related_task_id, related_user_id, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?)
            RETURNING
                id, recipient_id, message, notification_type, is_read,
                related_task_id, related_user_id, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&notification.recipient_id)
        .bind(&notification.message)
        .bind(notification.notification_type.as_str())
        .bind(&notification.related_task_id)
        .bind(&notification.related_user_id)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(notification_from_row(&row))
    }

    /// All notifications of a recipient, newest first, with the related task
    /// and actor resolved when they still exist.
    pub async fn list_for_recipient(
        pool: &SqlitePool,
        recipient_id: &str,
    ) -> AppResult<Vec<NotificationView>> {
        let rows = sqlx::query(
            r#"
            SELECT
                n.id, n.recipient_id, n.message, n.notification_type, n.is_read,
                n.related_task_id, n.related_user_id, n.created_at, n.updated_at,
                t.title AS task_title,
                u.name AS actor_name,
                u.email AS actor_email
            FROM notifications n
            LEFT JOIN tasks t ON t.id = n.related_task_id
            LEFT JOIN users u ON u.id = n.related_user_id
            WHERE n.recipient_id = ?
            ORDER BY n.created_at DESC, n.rowid DESC
            "#,
        )
        .bind(recipient_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let notification = notification_from_row(&r);

            let task_title: Option<String> = r.get("task_title");
            let related_task = match (&notification.related_task_id, task_title) {
                (Some(id), Some(title)) => Some(RelatedTask {
                    id: id.clone(),
                    title,
                }),
                _ => None,
            };

            let actor_name: Option<String> = r.get("actor_name");
            let actor_email: Option<String> = r.get("actor_email");
            let related_user = match (&notification.related_user_id, actor_name, actor_email) {
                (Some(id), Some(name), Some(email)) => Some(UserSummary {
                    id: id.clone(),
                    name,
                    email,
                }),
                _ => None,
            };

            out.push(NotificationView {
                notification,
                related_task,
                related_user,
            });
        }

        Ok(out)
    }

    /// Flip `is_read` on the recipient's unread notifications among `ids`.
    /// Returns how many rows changed; foreign or already-read ids are not counted.
    /// At most [`MAX_BATCH_IDS`] ids are accepted per call.
    pub async fn mark_read(pool: &SqlitePool, recipient_id: &str, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        if ids.len() > MAX_BATCH_IDS {
            return Err(AppError::Validation(format!(
                "At most {} notification IDs can be marked read at once",
                MAX_BATCH_IDS
            )));
        }

        let now = Utc::now().naive_utc();
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE notifications SET is_read = 1, updated_at = ");
        qb.push_bind(now);
        qb.push(" WHERE recipient_id = ");
        qb.push_bind(recipient_id.to_string());
        qb.push(" AND is_read = 0 AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let result = qb
            .build()
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    pub async fn mark_all_read(pool: &SqlitePool, recipient_id: &str) -> AppResult<u64> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1, updated_at = ? WHERE recipient_id = ? AND is_read = 0",
        )
        .bind(now)
        .bind(recipient_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}

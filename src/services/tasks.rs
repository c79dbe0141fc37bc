use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::db::{CreateTask, Task, TaskFilter, TaskRepository, TaskStatus, UpdateTask, User};
use crate::error::{AppError, AppResult};
use crate::services::notifications::NotificationService;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<String>,
}

/// Partial update; absent fields are left untouched. An empty description or
/// due date clears the field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total_tasks: i64,
    pub completed_tasks: i64,
}

pub fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    Ok(title.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

pub fn parse_status(status: &str) -> AppResult<TaskStatus> {
    status
        .parse::<TaskStatus>()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (only the date is kept).
/// Blank input means "no due date".
pub fn parse_due_date(raw: &str) -> AppResult<Option<NaiveDate>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.date_naive()));
    }
    Err(AppError::Validation(format!(
        "Invalid due date '{}': must be YYYY-MM-DD or an ISO 8601 timestamp",
        raw
    )))
}

pub struct TaskService;

impl TaskService {
    pub async fn create(state: &Arc<AppState>, owner: &User, input: NewTask) -> AppResult<Task> {
        let title = validate_title(&input.title)?;
        let status = match input.status.as_deref() {
            Some(s) => parse_status(s)?,
            None => TaskStatus::default(),
        };
        let due_date = match input.due_date.as_deref() {
            Some(d) => parse_due_date(d)?,
            None => None,
        };

        let task = TaskRepository::create(
            &state.db,
            CreateTask {
                owner_id: owner.id.clone(),
                title,
                description: normalize_description(input.description),
                status,
                due_date,
            },
        )
        .await?;

        tracing::info!("User {} created task {}", owner.id, task.id);
        Ok(task)
    }

    /// Tasks the user owns or can see through sharing. An unknown status filter
    /// is ignored rather than rejected.
    pub async fn list(state: &Arc<AppState>, user: &User, query: TaskListQuery) -> AppResult<Vec<Task>> {
        let search = query
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let status = match query.status.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(raw) => match raw.parse::<TaskStatus>() {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!("Ignoring task list status filter: {}", e);
                    None
                }
            },
        };

        TaskRepository::list_visible_to(&state.db, &user.id, &TaskFilter { search, status }).await
    }

    /// Read access: the owner or anyone on the share list.
    pub async fn get(state: &Arc<AppState>, user: &User, task_id: &str) -> AppResult<Task> {
        let task = Self::find(state, task_id).await?;
        if !task.can_view(&user.id) {
            tracing::warn!("User {} denied read access to task {}", user.id, task_id);
            return Err(AppError::Forbidden);
        }
        Ok(task)
    }

    /// Load a task the user must own (update, delete, share).
    pub async fn get_owned(state: &Arc<AppState>, user: &User, task_id: &str) -> AppResult<Task> {
        let task = Self::find(state, task_id).await?;
        if !task.is_owner(&user.id) {
            tracing::warn!("User {} is not the owner of task {}", user.id, task_id);
            return Err(AppError::Forbidden);
        }
        Ok(task)
    }

    /// Apply the supplied fields. When the status actually changes, the other
    /// participants are notified after the update is stored; notification
    /// problems never fail the update.
    pub async fn update(
        state: &Arc<AppState>,
        actor: &User,
        task_id: &str,
        changes: TaskChanges,
    ) -> AppResult<Task> {
        // Validate everything before touching the store.
        let title = changes.title.as_deref().map(validate_title).transpose()?;
        let status = changes.status.as_deref().map(parse_status).transpose()?;
        let due_date = changes.due_date.as_deref().map(parse_due_date).transpose()?;

        let current = Self::get_owned(state, actor, task_id).await?;
        let previous_status = current.status;

        let update = UpdateTask {
            title: title.unwrap_or(current.title),
            description: match changes.description {
                Some(d) => normalize_description(Some(d)),
                None => current.description,
            },
            status: status.unwrap_or(previous_status),
            due_date: match due_date {
                Some(d) => d,
                None => current.due_date,
            },
        };

        let updated = TaskRepository::update(&state.db, task_id, &update).await?;

        if status.is_some_and(|s| s != previous_status) {
            NotificationService::new(state)
                .notify_status_change(&updated, actor)
                .await;
        }

        Ok(updated)
    }

    pub async fn delete(state: &Arc<AppState>, user: &User, task_id: &str) -> AppResult<()> {
        Self::get_owned(state, user, task_id).await?;
        if !TaskRepository::delete(&state.db, task_id).await? {
            return Err(AppError::NotFound("Task not found".to_string()));
        }
        tracing::info!("User {} deleted task {}", user.id, task_id);
        Ok(())
    }

    pub async fn stats(state: &Arc<AppState>, user: &User) -> AppResult<TaskStats> {
        let total_tasks = TaskRepository::count_by_owner(&state.db, &user.id, None).await?;
        let completed_tasks =
            TaskRepository::count_by_owner(&state.db, &user.id, Some(TaskStatus::Finished)).await?;
        Ok(TaskStats {
            total_tasks,
            completed_tasks,
        })
    }

    pub async fn shared_with_me(state: &Arc<AppState>, user: &User) -> AppResult<Vec<Task>> {
        TaskRepository::list_shared_with(&state.db, &user.id).await
    }

    async fn find(state: &Arc<AppState>, task_id: &str) -> AppResult<Task> {
        TaskRepository::find_by_id(&state.db, task_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_trimmed_and_required() {
        assert_eq!(validate_title("  Write report ").unwrap(), "Write report");
        assert!(matches!(validate_title("   "), Err(AppError::Validation(_))));
    }

    #[test]
    fn due_date_accepts_plain_dates_and_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 14);
        assert_eq!(parse_due_date("2026-03-14").unwrap(), expected);
        assert_eq!(parse_due_date("2026-03-14T09:30:00Z").unwrap(), expected);
        assert_eq!(parse_due_date("  ").unwrap(), None);
        assert!(parse_due_date("next tuesday").is_err());
    }

    #[test]
    fn description_blank_becomes_none() {
        assert_eq!(normalize_description(Some("  ".to_string())), None);
        assert_eq!(
            normalize_description(Some(" notes ".to_string())),
            Some("notes".to_string())
        );
    }
}

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::db::{Task, TaskRepository, User, UserRepository, UserSummary};
use crate::error::{AppError, AppResult};
use crate::services::notifications::{FanOutReport, NotificationService};
use crate::services::tasks::TaskService;
use crate::AppState;

/// A field that clients send either as a single value or as a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub user_id_to_share_with: Option<OneOrMany<String>>,
    pub emails: Option<OneOrMany<String>>,
}

/// Someone to share a task with, identified either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareTarget {
    ById(String),
    ByEmail(String),
}

impl ShareRequest {
    /// Turn the request into targets. A malformed user id rejects the whole
    /// request; an empty request is rejected as well.
    pub fn into_targets(self) -> AppResult<Vec<ShareTarget>> {
        let mut targets = Vec::new();

        for raw in self.user_id_to_share_with.map(OneOrMany::into_vec).unwrap_or_default() {
            let raw = raw.trim();
            let id = Uuid::parse_str(raw).map_err(|_| {
                AppError::Validation("Invalid user ID format provided for sharing.".to_string())
            })?;
            targets.push(ShareTarget::ById(id.to_string()));
        }

        for raw in self.emails.map(OneOrMany::into_vec).unwrap_or_default() {
            let email = raw.trim();
            if !email.is_empty() {
                targets.push(ShareTarget::ByEmail(email.to_string()));
            }
        }

        if targets.is_empty() {
            return Err(AppError::Validation(
                "Provide at least one user ID or email to share with".to_string(),
            ));
        }

        Ok(targets)
    }
}

#[derive(Debug, Clone)]
pub struct ShareOutcome {
    pub task: Task,
    /// Users added by this request, in request order.
    pub newly_shared: Vec<UserSummary>,
    pub skipped: usize,
    pub report: FanOutReport,
}

impl ShareOutcome {
    pub fn message(&self) -> String {
        match self.newly_shared.len() {
            0 => "Task is already shared with the specified users, or no valid users were found."
                .to_string(),
            1 => "Task shared with 1 user".to_string(),
            n => format!("Task shared with {} users", n),
        }
    }
}

pub struct SharingService;

impl SharingService {
    pub async fn resolve(state: &Arc<AppState>, target: &ShareTarget) -> AppResult<Option<User>> {
        match target {
            ShareTarget::ById(id) => UserRepository::find_by_id(&state.db, id).await,
            ShareTarget::ByEmail(email) => UserRepository::find_by_email(&state.db, email).await,
        }
    }

    /// Add `targets` to the share list of a task owned by `sharer`.
    ///
    /// Targets that do not resolve, the owner, and users already on the list
    /// are skipped; only users added by this call are notified. Sharing the
    /// same task twice is therefore harmless.
    pub async fn share(
        state: &Arc<AppState>,
        sharer: &User,
        task_id: &str,
        targets: Vec<ShareTarget>,
    ) -> AppResult<ShareOutcome> {
        let task = TaskService::get_owned(state, sharer, task_id).await?;

        let mut seen: HashSet<String> = task.shared_with.iter().map(|u| u.id.clone()).collect();
        let mut newly_shared: Vec<UserSummary> = Vec::new();
        let mut skipped = 0;

        for target in &targets {
            let user = match Self::resolve(state, target).await? {
                Some(user) => user,
                None => {
                    tracing::debug!("Share target {:?} of task {} not found", target, task.id);
                    skipped += 1;
                    continue;
                }
            };

            if task.is_owner(&user.id) || !seen.insert(user.id.clone()) {
                skipped += 1;
                continue;
            }

            newly_shared.push(UserSummary::from(&user));
        }

        if newly_shared.is_empty() {
            tracing::info!(
                "Share of task {} by {} added nobody ({} target(s) skipped)",
                task.id,
                sharer.id,
                skipped
            );
            return Ok(ShareOutcome {
                task,
                newly_shared,
                skipped,
                report: FanOutReport::default(),
            });
        }

        let ids: Vec<String> = newly_shared.iter().map(|u| u.id.clone()).collect();
        let inserted = TaskRepository::add_shares(&state.db, &task.id, &ids).await?;
        if inserted.len() != ids.len() {
            // A concurrent share added these users first and notifies them itself.
            tracing::debug!(
                "Task {}: {} of {} share rows were new",
                task.id,
                inserted.len(),
                ids.len()
            );
            skipped += ids.len() - inserted.len();
            newly_shared.retain(|u| inserted.contains(&u.id));
        }

        let task = TaskRepository::find_by_id(&state.db, &task.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;

        let report = if newly_shared.is_empty() {
            FanOutReport::default()
        } else {
            NotificationService::new(state)
                .notify_task_shared(&task, sharer, &newly_shared)
                .await
        };

        Ok(ShareOutcome {
            task,
            newly_shared,
            skipped,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> ShareRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn single_values_and_lists_are_both_accepted() {
        let id = Uuid::new_v4().to_string();
        let targets = request(serde_json::json!({
            "userIdToShareWith": id,
            "emails": ["b@example.com", " c@example.com "]
        }))
        .into_targets()
        .unwrap();

        assert_eq!(
            targets,
            vec![
                ShareTarget::ById(id),
                ShareTarget::ByEmail("b@example.com".to_string()),
                ShareTarget::ByEmail("c@example.com".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_id_rejects_the_request() {
        let err = request(serde_json::json!({
            "userIdToShareWith": ["not-a-uuid"],
            "emails": "b@example.com"
        }))
        .into_targets()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn empty_request_is_rejected() {
        assert!(request(serde_json::json!({})).into_targets().is_err());
        assert!(request(serde_json::json!({ "emails": [] })).into_targets().is_err());
    }
}

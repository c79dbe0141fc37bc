use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{
    CreateNotification, NotificationRepository, NotificationType, Task, TaskStatus, User,
    UserSummary,
};
use crate::services::live::LiveEvent;
use crate::AppState;

/// Live event emitted to a user a task was just shared with.
pub const EVENT_TASK_SHARED: &str = "newTaskShared";
/// Live event emitted to the other participants of a task whose status changed.
pub const EVENT_TASK_STATUS_UPDATED: &str = "taskStatusUpdated";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskSharedPayload<'a> {
    message: &'a str,
    task_id: &'a str,
    task_title: &'a str,
    shared_by: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskStatusUpdatedPayload<'a> {
    message: &'a str,
    task_id: &'a str,
    task_title: &'a str,
    new_status: TaskStatus,
    updated_by: &'a str,
}

/// Outcome of one fan-out. `persisted + failed == recipients`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOutReport {
    pub recipients: usize,
    /// Recipients that had at least one live connection accept the event.
    pub pushed_live: usize,
    pub persisted: usize,
    pub failed: usize,
}

pub fn task_shared_message(sharer: &str, title: &str) -> String {
    format!("{} shared the task \"{}\" with you", sharer, title)
}

pub fn status_updated_message(actor: &str, title: &str, status: TaskStatus) -> String {
    format!(
        "{} changed the status of \"{}\" to {}",
        actor, title, status
    )
}

/// Who hears about a status change made by `actor_id`: the owner and every
/// share-list member, minus the actor, each at most once.
pub fn status_change_recipients(task: &Task, actor_id: &str) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::with_capacity(task.shared_with.len() + 1);

    if task.owner.id != actor_id {
        recipients.push(task.owner.id.clone());
    }
    for member in &task.shared_with {
        if member.id != actor_id && !recipients.contains(&member.id) {
            recipients.push(member.id.clone());
        }
    }

    recipients
}

/// Persists task notifications and mirrors them onto the live channel.
///
/// For every recipient the live push and the notification insert are two
/// independent steps: a user without an open connection still gets the stored
/// notification, and a failed insert for one recipient is logged and skipped
/// without affecting the rest.
pub struct NotificationService {
    pool: SqlitePool,
    state: Arc<AppState>,
}

impl NotificationService {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self {
            pool: state.db.clone(),
            state: state.clone(),
        }
    }

    /// Notify each user in `recipients` that `sharer` shared `task` with them.
    pub async fn notify_task_shared(
        &self,
        task: &Task,
        sharer: &User,
        recipients: &[UserSummary],
    ) -> FanOutReport {
        let mut report = FanOutReport::default();
        let message = task_shared_message(&sharer.name, &task.title);

        let payload = TaskSharedPayload {
            message: &message,
            task_id: &task.id,
            task_title: &task.title,
            shared_by: &sharer.name,
        };
        let event = LiveEvent::new(
            EVENT_TASK_SHARED,
            serde_json::to_value(&payload).unwrap_or_default(),
        );

        for recipient in recipients {
            self.deliver(
                &mut report,
                &event,
                CreateNotification {
                    recipient_id: recipient.id.clone(),
                    message: message.clone(),
                    notification_type: NotificationType::TaskShared,
                    related_task_id: Some(task.id.clone()),
                    related_user_id: Some(sharer.id.clone()),
                },
            )
            .await;
        }

        tracing::info!(
            "Task {} shared by {}: {} recipient(s), {} live, {} stored, {} failed",
            task.id,
            sharer.id,
            report.recipients,
            report.pushed_live,
            report.persisted,
            report.failed
        );

        report
    }

    /// Notify the other participants of `task` that `actor` moved it to its
    /// current status.
    pub async fn notify_status_change(&self, task: &Task, actor: &User) -> FanOutReport {
        let mut report = FanOutReport::default();
        let recipients = status_change_recipients(task, &actor.id);
        if recipients.is_empty() {
            tracing::debug!("Status change on task {} has no one to notify", task.id);
            return report;
        }

        let message = status_updated_message(&actor.name, &task.title, task.status);
        let payload = TaskStatusUpdatedPayload {
            message: &message,
            task_id: &task.id,
            task_title: &task.title,
            new_status: task.status,
            updated_by: &actor.name,
        };
        let event = LiveEvent::new(
            EVENT_TASK_STATUS_UPDATED,
            serde_json::to_value(&payload).unwrap_or_default(),
        );

        for recipient_id in recipients {
            self.deliver(
                &mut report,
                &event,
                CreateNotification {
                    recipient_id,
                    message: message.clone(),
                    notification_type: NotificationType::TaskStatusUpdated,
                    related_task_id: Some(task.id.clone()),
                    related_user_id: Some(actor.id.clone()),
                },
            )
            .await;
        }

        tracing::info!(
            "Status of task {} changed to {} by {}: {} recipient(s), {} live, {} stored, {} failed",
            task.id,
            task.status,
            actor.id,
            report.recipients,
            report.pushed_live,
            report.persisted,
            report.failed
        );

        report
    }

    async fn deliver(
        &self,
        report: &mut FanOutReport,
        event: &LiveEvent,
        notification: CreateNotification,
    ) {
        report.recipients += 1;
        let recipient_id = notification.recipient_id.clone();

        let connections = self.state.live.push_to_user(&recipient_id, event);
        if connections > 0 {
            report.pushed_live += 1;
            tracing::debug!(
                "Pushed {} to {} live connection(s) of user {}",
                event.event,
                connections,
                recipient_id
            );
        } else {
            tracing::debug!(
                "User {} has no live connection; {} will be read from storage",
                recipient_id,
                event.event
            );
        }

        match NotificationRepository::create(&self.pool, notification).await {
            Ok(stored) => {
                report.persisted += 1;
                tracing::debug!(
                    "Stored {} notification {} for user {}",
                    stored.notification_type,
                    stored.id,
                    recipient_id
                );
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    "Failed to store {} notification for user {}: {:?}",
                    event.event,
                    recipient_id,
                    e
                );
            }
        }
    }
}

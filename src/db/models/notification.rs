use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::UserSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationType {
    TaskShared,
    TaskStatusUpdated,
    Generic,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::TaskShared => "taskShared",
            NotificationType::TaskStatusUpdated => "taskStatusUpdated",
            NotificationType::Generic => "generic",
        }
    }

    /// Unknown values read back from storage degrade to `Generic`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "taskShared" => NotificationType::TaskShared,
            "taskStatusUpdated" => NotificationType::TaskStatusUpdated,
            _ => NotificationType::Generic,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub related_task_id: Option<String>,
    pub related_user_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub recipient_id: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub related_task_id: Option<String>,
    pub related_user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedTask {
    pub id: String,
    pub title: String,
}

/// A notification with its back-references resolved for display. A referent
/// that no longer exists resolves to `None`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub related_task: Option<RelatedTask>,
    pub related_user: Option<UserSummary>,
}

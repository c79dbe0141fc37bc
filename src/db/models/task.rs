use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::UserSummary;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    Working,
    Finished,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Working => "Working",
            TaskStatus::Finished => "Finished",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid status '{0}': must be Pending, Working or Finished")]
pub struct InvalidStatus(pub String);

impl FromStr for TaskStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Pending" => Ok(TaskStatus::Pending),
            "Working" => Ok(TaskStatus::Working),
            "Finished" => Ok(TaskStatus::Finished),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// A task with its owner and share list resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub owner: UserSummary,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub shared_with: Vec<UserSummary>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Task {
    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner.id == user_id
    }

    pub fn is_shared_with(&self, user_id: &str) -> bool {
        self.shared_with.iter().any(|u| u.id == user_id)
    }

    pub fn can_view(&self, user_id: &str) -> bool {
        self.is_owner(user_id) || self.is_shared_with(user_id)
    }

    /// `needle` must already be lowercased.
    pub fn matches_search(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
}

/// Full replacement values for the mutable columns of a task.
#[derive(Debug, Clone)]
pub struct UpdateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
}

/// Filters for the task list query. `None` means "no constraint".
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub search: Option<String>,
    pub status: Option<TaskStatus>,
}

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{DailyMetric, TaskRepository, TaskStatus, User};
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_tasks: i64,
    pub pending_tasks: i64,
    pub in_progress_tasks: i64,
    pub finished_tasks: i64,
    pub completed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TrendPeriod {
    #[default]
    #[serde(rename = "last7days")]
    Last7Days,
    #[serde(rename = "last30days")]
    Last30Days,
    #[serde(rename = "thisMonth")]
    ThisMonth,
}

impl TrendPeriod {
    /// Unknown or missing values fall back to the last seven days.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("last30days") => TrendPeriod::Last30Days,
            Some("thisMonth") => TrendPeriod::ThisMonth,
            Some("last7days") | None => TrendPeriod::Last7Days,
            Some(other) => {
                tracing::debug!("Unknown trend period {:?}, using last7days", other);
                TrendPeriod::Last7Days
            }
        }
    }

    /// First day of the window ending on `today`, inclusive.
    pub fn window_start(self, today: NaiveDate) -> NaiveDate {
        match self {
            TrendPeriod::Last7Days => today - Duration::days(6),
            TrendPeriod::Last30Days => today - Duration::days(29),
            TrendPeriod::ThisMonth => today.with_day(1).unwrap_or(today),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrendType {
    Created,
    Completed,
}

impl TrendType {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(str::trim) {
            Some("created") => Ok(TrendType::Created),
            Some("completed") => Ok(TrendType::Completed),
            Some(other) => Err(AppError::Validation(format!(
                "Invalid dataType '{}'. Use 'created' or 'completed'",
                other
            ))),
            None => Err(AppError::Validation(
                "dataType is required ('created' or 'completed')".to_string(),
            )),
        }
    }

    fn metric(self) -> DailyMetric {
        match self {
            TrendType::Created => DailyMetric::Created,
            TrendType::Completed => DailyMetric::Completed,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendQuery {
    pub period: Option<String>,
    pub data_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub labels: Vec<String>,
    pub data: Vec<i64>,
    pub trend_type: TrendType,
    pub period: TrendPeriod,
}

/// One label and one count per day from `start` to `end` inclusive; days
/// missing from `counts` are zero.
pub fn fill_daily_series(
    start: NaiveDate,
    end: NaiveDate,
    counts: &HashMap<NaiveDate, i64>,
) -> (Vec<String>, Vec<i64>) {
    let mut labels = Vec::new();
    let mut data = Vec::new();

    let mut day = start;
    while day <= end {
        labels.push(day.format("%b %-d").to_string());
        data.push(counts.get(&day).copied().unwrap_or(0));
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    (labels, data)
}

pub struct AnalyticsService;

impl AnalyticsService {
    pub async fn overview(state: &Arc<AppState>, user: &User) -> AppResult<Overview> {
        let counts = TaskRepository::counts_by_status(&state.db, &user.id).await?;
        let count = |s: TaskStatus| counts.get(&s).copied().unwrap_or(0);

        let finished = count(TaskStatus::Finished);
        Ok(Overview {
            total_tasks: counts.values().sum(),
            pending_tasks: count(TaskStatus::Pending),
            in_progress_tasks: count(TaskStatus::Working),
            finished_tasks: finished,
            completed: finished,
        })
    }

    pub async fn trends(state: &Arc<AppState>, user: &User, query: TrendQuery) -> AppResult<Trend> {
        let trend_type = TrendType::parse(query.data_type.as_deref())?;
        let period = TrendPeriod::parse(query.period.as_deref());

        let today = Utc::now().date_naive();
        let start = period.window_start(today);
        let since = start.and_hms_opt(0, 0, 0).unwrap_or_default();

        let counts =
            TaskRepository::daily_counts(&state.db, &user.id, trend_type.metric(), since).await?;
        let (labels, data) = fill_daily_series(start, today, &counts);

        Ok(Trend {
            labels,
            data,
            trend_type,
            period,
        })
    }
}

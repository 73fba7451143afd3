//! Shared API response types
//!
//! Wire shapes for time entries and timesheets. Field names are camelCase;
//! timestamps are RFC 3339 in UTC and dates are `YYYY-MM-DD`.

use serde::{Deserialize, Serialize};

use crate::models::{ProjectSummary, TimeEntry, TimerState, Timesheet, TrackedEntry};

// ============================================================================
// Time Entry Response Types
// ============================================================================

/// A single time entry
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryResponse {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: Option<String>,
    /// Minutes, null while running
    pub duration: Option<i64>,
    pub is_running: bool,
    /// `running` or `stopped`
    pub state: TimerState,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskInfo>,
}

/// Task and project embedded in timesheet entries
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub id: i64,
    pub title: String,
    pub project_id: i64,
    pub project_name: String,
}

/// Paginated entry list
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryListResponse {
    pub time_entries: Vec<TimeEntryResponse>,
    pub page: i64,
    pub per_page: i64,
}

// ============================================================================
// Timesheet Response Types
// ============================================================================

/// Per-project block of a timesheet
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummaryResponse {
    pub project_id: i64,
    pub project_name: String,
    pub total_duration: i64,
    pub total_hours: f64,
    pub percentage: f64,
    pub time_entries: Vec<TimeEntryResponse>,
}

/// Timesheet over an inclusive date range
///
/// `byProject` is an array so that its order (largest project first) survives
/// JSON round trips.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetResponse {
    pub user_id: i64,
    pub start_date: String,
    pub end_date: String,
    pub total_duration: i64,
    pub total_hours: f64,
    pub by_project: Vec<ProjectSummaryResponse>,
    pub time_entries: Vec<TimeEntryResponse>,
    pub running_entry: Option<TimeEntryResponse>,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<TimeEntry> for TimeEntryResponse {
    fn from(entry: TimeEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id,
            task_id: entry.task_id,
            is_running: entry.is_running(),
            state: entry.state(),
            description: entry.description,
            start_time: entry.start_time.to_rfc3339(),
            end_time: entry.end_time.map(|dt| dt.to_rfc3339()),
            duration: entry.duration,
            created_at: entry.created_at.to_rfc3339(),
            updated_at: entry.updated_at.to_rfc3339(),
            task: None,
        }
    }
}

impl From<TrackedEntry> for TimeEntryResponse {
    fn from(tracked: TrackedEntry) -> Self {
        let task = TaskInfo {
            id: tracked.task.task_id,
            title: tracked.task.task_title,
            project_id: tracked.task.project_id,
            project_name: tracked.task.project_name,
        };
        Self {
            task: Some(task),
            ..tracked.entry.into()
        }
    }
}

impl From<ProjectSummary> for ProjectSummaryResponse {
    fn from(summary: ProjectSummary) -> Self {
        Self {
            project_id: summary.project_id,
            project_name: summary.project_name,
            total_duration: summary.total_duration,
            total_hours: summary.total_hours,
            percentage: summary.percentage,
            time_entries: summary.entries.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Timesheet> for TimesheetResponse {
    fn from(sheet: Timesheet) -> Self {
        Self {
            user_id: sheet.user_id,
            start_date: sheet.start_date.format("%Y-%m-%d").to_string(),
            end_date: sheet.end_date.format("%Y-%m-%d").to_string(),
            total_duration: sheet.total_duration,
            total_hours: sheet.total_hours,
            by_project: sheet.by_project.into_iter().map(Into::into).collect(),
            time_entries: sheet.entries.into_iter().map(Into::into).collect(),
            running_entry: sheet.running_entry.map(Into::into),
        }
    }
}

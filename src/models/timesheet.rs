//! Timesheet model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{TaskRef, TimeEntry};

/// A time entry joined with its task reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntry {
    pub entry: TimeEntry,
    pub task: TaskRef,
}

impl TrackedEntry {
    pub fn project_id(&self) -> i64 {
        self.task.project_id
    }
}

/// Totals for one project within a timesheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project_id: i64,
    pub project_name: String,
    /// Minutes
    pub total_duration: i64,
    pub total_hours: f64,
    /// Share of the grand total, 0 when the grand total is 0
    pub percentage: f64,
    pub entries: Vec<TrackedEntry>,
}

/// Aggregated report of a user's entries over an inclusive date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timesheet {
    pub user_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Minutes
    pub total_duration: i64,
    pub total_hours: f64,
    /// Sorted by total duration descending, ties by project id
    pub by_project: Vec<ProjectSummary>,
    pub entries: Vec<TrackedEntry>,
    /// Running timer started inside the range; not counted in totals
    pub running_entry: Option<TrackedEntry>,
}

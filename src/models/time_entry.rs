//! Time entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record of time spent on a task.
///
/// An entry without `end_time` is a running timer. Once stopped it carries
/// `duration` in whole minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: i64,
    pub user_id: i64,
    pub task_id: i64,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Minutes, absent while running
    pub duration: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }

    /// Lifecycle state of the entry, as seen by the timer state machine
    pub fn state(&self) -> TimerState {
        if self.is_running() {
            TimerState::Running
        } else {
            TimerState::Stopped
        }
    }
}

/// Timer state of a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Running,
    Stopped,
}

/// Row to insert into the time entry store
#[derive(Debug, Clone)]
pub struct NewTimeEntry {
    pub user_id: i64,
    pub task_id: i64,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    /// Becomes both `created_at` and `updated_at`
    pub recorded_at: DateTime<Utc>,
}

impl NewTimeEntry {
    /// A running entry started at `start_time`
    pub fn running(user_id: i64, task_id: i64, description: Option<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            user_id,
            task_id,
            description,
            start_time,
            end_time: None,
            duration: None,
            recorded_at: start_time,
        }
    }

    /// A closed entry covering `[start_time, start_time + duration]`
    pub fn closed(
        user_id: i64,
        task_id: i64,
        description: Option<String>,
        start_time: DateTime<Utc>,
        duration_minutes: i64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            task_id,
            description,
            start_time,
            end_time: Some(start_time + chrono::Duration::minutes(duration_minutes)),
            duration: Some(duration_minutes),
            recorded_at,
        }
    }
}

/// Input for starting a timer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerInput {
    #[serde(alias = "task_id")]
    pub task_id: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for recording a fixed-duration entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualEntryInput {
    #[serde(alias = "task_id")]
    pub task_id: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(alias = "duration_minutes")]
    pub duration_minutes: i64,
    /// Back-dates the entry; defaults to `now - duration`
    #[serde(default, alias = "start_time")]
    pub start_time: Option<DateTime<Utc>>,
}

/// Explicit edit of an existing entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimeEntryInput {
    /// `Some(None)` clears the description
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, alias = "start_time")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "end_time")]
    pub end_time: Option<DateTime<Utc>>,
}

impl UpdateTimeEntryInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }
}

/// Filter for listing a user's entries
#[derive(Debug, Clone)]
pub struct TimeEntryFilter {
    pub task_id: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: i64,
    pub per_page: i64,
}

impl Default for TimeEntryFilter {
    fn default() -> Self {
        Self {
            task_id: None,
            from: None,
            to: None,
            page: 1,
            per_page: 20,
        }
    }
}

impl TimeEntryFilter {
    /// Rows to skip for the requested page; `None` if it does not fit in an i64
    pub fn offset(&self) -> Option<i64> {
        (self.page.max(1) - 1).checked_mul(self.per_page)
    }
}

// Distinguishes a missing field from an explicit `null`
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_closed_entry_spans_duration() {
        let entry = NewTimeEntry::closed(1, 2, None, at(9, 0), 45, at(12, 0));
        assert_eq!(entry.end_time, Some(at(9, 45)));
        assert_eq!(entry.duration, Some(45));
        assert_eq!(entry.recorded_at, at(12, 0));
    }

    #[test]
    fn test_running_entry_has_no_end() {
        let entry = NewTimeEntry::running(1, 2, Some("x".to_string()), at(9, 0));
        assert!(entry.end_time.is_none());
        assert!(entry.duration.is_none());
    }

    #[test]
    fn test_update_input_distinguishes_null_description() {
        let missing: UpdateTimeEntryInput = serde_json::from_str("{}").unwrap();
        assert!(missing.description.is_none());

        let cleared: UpdateTimeEntryInput = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        let set: UpdateTimeEntryInput = serde_json::from_str(r#"{"description": "review"}"#).unwrap();
        assert_eq!(set.description, Some(Some("review".to_string())));
    }

    #[test]
    fn test_manual_input_accepts_snake_case() {
        let input: ManualEntryInput =
            serde_json::from_str(r#"{"task_id": 3, "duration_minutes": 15}"#).unwrap();
        assert_eq!(input.task_id, 3);
        assert_eq!(input.duration_minutes, 15);
        assert!(input.start_time.is_none());
    }

    #[test]
    fn test_filter_offset() {
        let filter = TimeEntryFilter { page: 3, per_page: 10, ..Default::default() };
        assert_eq!(filter.offset(), Some(20));
        let filter = TimeEntryFilter { page: 0, ..Default::default() };
        assert_eq!(filter.offset(), Some(0));
        let filter = TimeEntryFilter { page: i64::MAX, per_page: 20, ..Default::default() };
        assert_eq!(filter.offset(), None);
    }
}

//! Timer service
//!
//! Owns the lifecycle of time entries:
//! - Running timers (`start`, `stop`, `get_running`)
//! - Manual fixed-duration entries
//! - Listing, editing and deleting a user's own entries
//!
//! A user has at most one running timer. The check is not done here but by
//! the store: `create_running` refuses a second running row, and `close`
//! only stops rows that are still running, so concurrent requests resolve to
//! exactly one winner.

use crate::db::repositories::{TaskRepository, TimeEntryRepository};
use crate::hooks::{hook_names, HookManager};
use crate::models::{
    ManualEntryInput, NewTimeEntry, StartTimerInput, TaskRef, TimeEntry, TimeEntryFilter,
    UpdateTimeEntryInput,
};
use crate::services::clock::Clock;
use crate::services::error::TimeTrackingError;
use chrono::{DateTime, SubsecRound, Utc};
use serde_json::json;
use std::sync::Arc;

/// Upper bound for a single manual entry (one week)
pub const MAX_MANUAL_DURATION_MINUTES: i64 = 7 * 24 * 60;

/// Largest page size accepted by `list`
pub const MAX_PER_PAGE: i64 = 100;

/// Whole minutes between two instants, rounded half up on seconds.
///
/// 185 s is 3 minutes, 149 s is 2. Negative spans count as zero.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let secs = (end - start).num_seconds().max(0);
    (secs + 30) / 60
}

/// Timer service for time entries
pub struct TimerService {
    entries: Arc<dyn TimeEntryRepository>,
    tasks: Arc<dyn TaskRepository>,
    clock: Arc<dyn Clock>,
    hook_manager: Option<Arc<HookManager>>,
}

impl TimerService {
    pub fn new(
        entries: Arc<dyn TimeEntryRepository>,
        tasks: Arc<dyn TaskRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entries,
            tasks,
            clock,
            hook_manager: None,
        }
    }

    /// Create a timer service that announces activity through `hook_manager`
    pub fn with_hooks(
        entries: Arc<dyn TimeEntryRepository>,
        tasks: Arc<dyn TaskRepository>,
        clock: Arc<dyn Clock>,
        hook_manager: Arc<HookManager>,
    ) -> Self {
        Self {
            entries,
            tasks,
            clock,
            hook_manager: Some(hook_manager),
        }
    }

    /// Announce an event with the entry and its project
    ///
    /// When the caller has no resolved task at hand the project is looked up;
    /// a failed lookup leaves `project_id` null rather than failing the operation.
    async fn trigger_hook(&self, name: &str, entry: &TimeEntry, task: Option<&TaskRef>) {
        let Some(ref manager) = self.hook_manager else {
            return;
        };
        if !manager.has_handlers(name) {
            return;
        }

        let project_id = match task {
            Some(task) => Some(task.project_id),
            None => match self.tasks.resolve(entry.task_id).await {
                Ok(task) => task.map(|t| t.project_id),
                Err(e) => {
                    tracing::warn!("Failed to resolve task {} for '{}': {:#}", entry.task_id, name, e);
                    None
                }
            },
        };

        let mut data = serde_json::to_value(entry).unwrap_or_else(|_| json!({}));
        if let Some(obj) = data.as_object_mut() {
            obj.insert("project_id".to_string(), json!(project_id));
        }
        manager.trigger(name, &data);
    }

    async fn resolve_task(&self, task_id: i64) -> Result<TaskRef, TimeTrackingError> {
        if task_id <= 0 {
            return Err(TimeTrackingError::validation("task id must be positive"));
        }
        self.tasks
            .resolve(task_id)
            .await?
            .ok_or_else(|| TimeTrackingError::not_found(format!("task {}", task_id)))
    }

    /// Fetch an entry if it belongs to `user_id`
    async fn owned_entry(&self, user_id: i64, entry_id: i64) -> Result<TimeEntry, TimeTrackingError> {
        match self.entries.get_by_id(entry_id).await? {
            Some(entry) if entry.user_id == user_id => Ok(entry),
            _ => Err(TimeTrackingError::not_found(format!("time entry {}", entry_id))),
        }
    }

    /// Start a timer on a task
    ///
    /// # Errors
    /// - `Validation` if the task id is not positive
    /// - `NotFound` if the task does not exist
    /// - `Conflict` if the user already has a running timer; it is never stopped implicitly
    ///
    /// # Hooks
    /// - `timer_started`
    pub async fn start(&self, user_id: i64, input: StartTimerInput) -> Result<TimeEntry, TimeTrackingError> {
        let task = self.resolve_task(input.task_id).await?;

        if let Some(running) = self.entries.find_running(user_id).await? {
            return Err(TimeTrackingError::Conflict(format!(
                "timer {} is already running",
                running.id
            )));
        }

        let now = self.clock.now();
        let new_entry = NewTimeEntry::running(user_id, task.task_id, normalize(input.description), now);

        // a concurrent start can still win between the check and the insert
        let entry = self
            .entries
            .create_running(&new_entry)
            .await?
            .ok_or_else(|| TimeTrackingError::Conflict("a timer is already running".to_string()))?;

        tracing::debug!(user_id, entry_id = entry.id, task_id = task.task_id, "Timer started");
        self.trigger_hook(hook_names::TIMER_STARTED, &entry, Some(&task)).await;
        Ok(entry)
    }

    /// Stop a running timer
    ///
    /// The end time is never earlier than the start time, and the duration is
    /// rounded to whole minutes with [`duration_minutes`].
    ///
    /// # Errors
    /// - `NotFound` if the entry does not exist or belongs to another user
    /// - `InvalidState` if the entry is already stopped
    ///
    /// # Hooks
    /// - `timer_stopped`
    pub async fn stop(&self, user_id: i64, entry_id: i64) -> Result<TimeEntry, TimeTrackingError> {
        let mut entry = self.owned_entry(user_id, entry_id).await?;
        if !entry.is_running() {
            return Err(already_stopped(entry_id));
        }

        let end_time = self.clock.now().max(entry.start_time);
        let duration = duration_minutes(entry.start_time, end_time);

        if !self.entries.close(entry_id, user_id, end_time, duration).await? {
            // lost a race: stopped or deleted since it was read
            return match self.entries.get_by_id(entry_id).await? {
                Some(_) => Err(already_stopped(entry_id)),
                None => Err(TimeTrackingError::not_found(format!("time entry {}", entry_id))),
            };
        }

        entry.end_time = Some(end_time);
        entry.duration = Some(duration);
        entry.updated_at = end_time;

        tracing::debug!(user_id, entry_id, duration, "Timer stopped");
        self.trigger_hook(hook_names::TIMER_STOPPED, &entry, None).await;
        Ok(entry)
    }

    /// The user's running timer, if any. Read-only.
    pub async fn get_running(&self, user_id: i64) -> Result<Option<TimeEntry>, TimeTrackingError> {
        Ok(self.entries.find_running(user_id).await?)
    }

    /// Record a fixed-duration entry
    ///
    /// Without a start time the entry ends now. With one, it ends
    /// `duration_minutes` later, which may not be in the future. Manual
    /// entries never touch the running timer.
    ///
    /// # Errors
    /// - `Validation` for a non-positive or over-long duration, a bad task id
    ///   or an end time in the future
    /// - `NotFound` if the task does not exist
    ///
    /// # Hooks
    /// - `time_entry_created`
    pub async fn create_manual(&self, user_id: i64, input: ManualEntryInput) -> Result<TimeEntry, TimeTrackingError> {
        if input.duration_minutes <= 0 {
            return Err(TimeTrackingError::validation("duration must be a positive number of minutes"));
        }
        if input.duration_minutes > MAX_MANUAL_DURATION_MINUTES {
            return Err(TimeTrackingError::validation(format!(
                "duration may not exceed {} minutes",
                MAX_MANUAL_DURATION_MINUTES
            )));
        }
        let task = self.resolve_task(input.task_id).await?;

        let now = self.clock.now();
        let length = chrono::Duration::minutes(input.duration_minutes);
        let start_time = match input.start_time {
            Some(start) => {
                let start = start.trunc_subsecs(0);
                if start + length > now {
                    return Err(TimeTrackingError::validation("entry may not end in the future"));
                }
                start
            }
            None => now - length,
        };

        let new_entry = NewTimeEntry::closed(
            user_id,
            task.task_id,
            normalize(input.description),
            start_time,
            input.duration_minutes,
            now,
        );
        let entry = self.entries.create_closed(&new_entry).await?;

        tracing::debug!(user_id, entry_id = entry.id, duration = input.duration_minutes, "Manual entry created");
        self.trigger_hook(hook_names::TIME_ENTRY_CREATED, &entry, Some(&task)).await;
        Ok(entry)
    }

    /// Get one of the user's entries
    pub async fn get(&self, user_id: i64, entry_id: i64) -> Result<TimeEntry, TimeTrackingError> {
        self.owned_entry(user_id, entry_id).await
    }

    /// List the user's entries, newest first
    pub async fn list(&self, user_id: i64, filter: &TimeEntryFilter) -> Result<Vec<TimeEntry>, TimeTrackingError> {
        if filter.page < 1 {
            return Err(TimeTrackingError::validation("page must be at least 1"));
        }
        if !(1..=MAX_PER_PAGE).contains(&filter.per_page) {
            return Err(TimeTrackingError::validation(format!(
                "perPage must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }
        if filter.offset().is_none() {
            return Err(TimeTrackingError::validation("page is out of range"));
        }
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if to < from {
                return Err(TimeTrackingError::validation("'to' must not be before 'from'"));
            }
        }

        Ok(self.entries.list_by_user(user_id, filter).await?)
    }

    /// Edit description and times of an entry
    ///
    /// A running entry keeps running: its end time can only be set through
    /// [`Self::stop`], and its start may not move into the future. A stopped
    /// entry gets its duration recomputed from the new times.
    ///
    /// # Hooks
    /// - `time_entry_updated`
    pub async fn update(
        &self,
        user_id: i64,
        entry_id: i64,
        input: UpdateTimeEntryInput,
    ) -> Result<TimeEntry, TimeTrackingError> {
        let mut entry = self.owned_entry(user_id, entry_id).await?;
        let now = self.clock.now();

        if let Some(description) = input.description {
            entry.description = normalize(description);
        }
        if let Some(start) = input.start_time {
            entry.start_time = start.trunc_subsecs(0);
        }

        if entry.is_running() {
            if input.end_time.is_some() {
                return Err(TimeTrackingError::InvalidState(format!(
                    "time entry {} is running; stop it instead of setting an end time",
                    entry_id
                )));
            }
            if entry.start_time > now {
                return Err(TimeTrackingError::validation("start time may not be in the future"));
            }
        } else {
            if let Some(end) = input.end_time {
                entry.end_time = Some(end.trunc_subsecs(0));
            }
            let end = entry.end_time.unwrap_or(entry.start_time);
            if end < entry.start_time {
                return Err(TimeTrackingError::validation("end time must not be before start time"));
            }
            entry.duration = Some(duration_minutes(entry.start_time, end));
        }
        entry.updated_at = now;

        if !self.entries.update(&entry).await? {
            return match self.entries.get_by_id(entry_id).await? {
                Some(_) => Err(TimeTrackingError::InvalidState(format!(
                    "time entry {} changed state during the update",
                    entry_id
                ))),
                None => Err(TimeTrackingError::not_found(format!("time entry {}", entry_id))),
            };
        }

        self.trigger_hook(hook_names::TIME_ENTRY_UPDATED, &entry, None).await;
        Ok(entry)
    }

    /// Delete one of the user's entries
    ///
    /// Deleting the running entry frees the user to start a new timer.
    ///
    /// # Hooks
    /// - `time_entry_deleted`
    pub async fn delete(&self, user_id: i64, entry_id: i64) -> Result<(), TimeTrackingError> {
        let entry = self.owned_entry(user_id, entry_id).await?;

        if !self.entries.delete(entry_id, user_id).await? {
            return Err(TimeTrackingError::not_found(format!("time entry {}", entry_id)));
        }

        tracing::debug!(user_id, entry_id, "Time entry deleted");
        self.trigger_hook(hook_names::TIME_ENTRY_DELETED, &entry, None).await;
        Ok(())
    }
}

fn already_stopped(entry_id: i64) -> TimeTrackingError {
    TimeTrackingError::InvalidState(format!("time entry {} is already stopped", entry_id))
}

/// Trim a description; blank becomes absent
fn normalize(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

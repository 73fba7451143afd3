//! Data models
//!
//! This module contains the data structures used throughout timetrack:
//! - Database entities (TimeEntry)
//! - Task references resolved from the project store
//! - Timesheet aggregates
//! - API input types

mod task;
mod time_entry;
mod timesheet;

pub use task::TaskRef;
pub use time_entry::{
    ManualEntryInput, NewTimeEntry, StartTimerInput, TimeEntry, TimeEntryFilter, TimerState,
    UpdateTimeEntryInput,
};
pub use timesheet::{ProjectSummary, Timesheet, TrackedEntry};

//! Database repositories
//!
//! Repository pattern implementations for database access.

pub mod task;
pub mod time_entry;

pub use task::{SqlxTaskRepository, TaskRepository};
pub use time_entry::{SqlxTimeEntryRepository, TimeEntryRepository};

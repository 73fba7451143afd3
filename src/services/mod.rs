//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Enforcing the timer lifecycle rules
//! - Aggregating timesheets
//! - Mapping storage results onto `TimeTrackingError`

pub mod clock;
pub mod error;
pub mod timer;
pub mod timesheet;

pub use clock::{Clock, SystemClock};
pub use error::TimeTrackingError;
pub use timer::{duration_minutes, TimerService, MAX_MANUAL_DURATION_MINUTES, MAX_PER_PAGE};
pub use timesheet::{aggregate, TimesheetService, MAX_RANGE_DAYS};

//! Time source
//!
//! Services never call `Utc::now()` directly; they ask a [`Clock`], which
//! lets tests pin and advance time.

use chrono::{DateTime, SubsecRound, Utc};

pub trait Clock: Send + Sync {
    /// Current instant, truncated to whole seconds
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}

#[cfg(test)]
pub use manual::ManualClock;

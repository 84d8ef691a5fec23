//! Injectable clock for deterministic scheduling tests

use chrono::{DateTime, Utc};

/// Time source for the decision engine and scheduler.
///
/// Production code uses `SystemClock`; tests inject a manual clock so
/// cooldown and cadence logic can be driven step by step.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

use std::time::Duration;

use chrono::TimeDelta;

/// Tunables of the ledger and recurring services.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long after creation an entry may still be edited in place.
    pub editable_window: TimeDelta,
    /// How long before `next_due` a reminder is dated.
    pub reminder_lead_time: TimeDelta,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            editable_window: TimeDelta::minutes(15),
            reminder_lead_time: TimeDelta::days(3),
        }
    }
}

/// Timer settings of the recurrence processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub interval: Duration,
    /// Upper bound of a single tick.
    pub tick_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            tick_timeout: Duration::from_secs(5 * 60),
        }
    }
}

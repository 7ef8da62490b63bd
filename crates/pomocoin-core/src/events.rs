use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Mode, Recovery, TimerState};

/// Every state transition of the timer produces an Event.
/// Observers receive it together with the resulting [`TimerState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        mode: Mode,
        remaining_seconds: u64,
        /// Epoch milliseconds at which this run reaches zero.
        ends_at_ms: i64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        mode: Mode,
        remaining_seconds: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: Mode,
        remaining_seconds: u64,
        at: DateTime<Utc>,
    },
    ModeChanged {
        from: Mode,
        to: Mode,
        at: DateTime<Utc>,
    },
    Ticked {
        mode: Mode,
        remaining_seconds: u64,
    },
    /// A mode finished, either by reaching zero or by being skipped.
    SessionCompleted {
        mode: Mode,
        skipped: bool,
        coins_earned: u64,
        next_mode: Mode,
        auto_started: bool,
        at: DateTime<Utc>,
    },
    SettingsChanged {
        at: DateTime<Utc>,
    },
    Recovered {
        recovery: Recovery,
        at: DateTime<Utc>,
    },
    /// Full state, for observers that attach mid-session.
    StateSnapshot {
        state: TimerState,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Short machine name, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerPaused { .. } => "timer_paused",
            Event::TimerReset { .. } => "timer_reset",
            Event::ModeChanged { .. } => "mode_changed",
            Event::Ticked { .. } => "ticked",
            Event::SessionCompleted { .. } => "session_completed",
            Event::SettingsChanged { .. } => "settings_changed",
            Event::Recovered { .. } => "recovered",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }
}

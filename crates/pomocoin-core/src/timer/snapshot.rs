//! Persisted projections of the timer state.
//!
//! A [`SessionSnapshot`] describes an in-flight session: either an absolute
//! end time (running) or a relative remaining time (paused). Absence of the
//! snapshot document means there is no in-flight session. The
//! [`TimerPosition`] document remembers where an idle timer sits in the
//! focus/break cycle.

use serde::{Deserialize, Serialize};

use super::Mode;
use crate::error::Result;
use crate::storage::{self, keys, KvStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionSnapshot {
    #[serde(rename_all = "camelCase")]
    Running {
        /// Epoch milliseconds at which the countdown reaches zero.
        #[serde(alias = "endTime")]
        end_timestamp: i64,
        mode: Mode,
        #[serde(default, alias = "pomodoroCount")]
        completed_focus_count: u32,
    },
    #[serde(rename_all = "camelCase")]
    Paused {
        #[serde(alias = "remainingTime")]
        remaining_seconds: u64,
        mode: Mode,
        #[serde(default, alias = "pomodoroCount")]
        completed_focus_count: u32,
    },
}

impl SessionSnapshot {
    pub fn mode(&self) -> Mode {
        match self {
            SessionSnapshot::Running { mode, .. } | SessionSnapshot::Paused { mode, .. } => *mode,
        }
    }

    pub fn completed_focus_count(&self) -> u32 {
        match self {
            SessionSnapshot::Running {
                completed_focus_count,
                ..
            }
            | SessionSnapshot::Paused {
                completed_focus_count,
                ..
            } => *completed_focus_count,
        }
    }

    pub fn load(store: &dyn KvStore) -> Result<Option<Self>> {
        storage::read_document(store, keys::TIMER_SNAPSHOT)
    }

    pub fn save(&self, store: &dyn KvStore) -> Result<()> {
        storage::write_document(store, keys::TIMER_SNAPSHOT, self)
    }

    pub fn clear(store: &dyn KvStore) -> Result<()> {
        store.remove(keys::TIMER_SNAPSHOT)?;
        Ok(())
    }
}

/// Cycle position of the timer, independent of any in-flight session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerPosition {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub completed_focus_count: u32,
}

impl TimerPosition {
    pub fn load(store: &dyn KvStore) -> Result<Option<Self>> {
        storage::read_document(store, keys::TIMER_POSITION)
    }

    pub fn save(&self, store: &dyn KvStore) -> Result<()> {
        storage::write_document(store, keys::TIMER_POSITION, self)
    }
}

/// What the engine found when it was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recovery {
    /// No snapshot; started idle.
    Fresh,
    /// A running session was still in progress and keeps counting down.
    Resumed { mode: Mode, remaining_seconds: u64 },
    /// A paused session was restored.
    Paused { mode: Mode, remaining_seconds: u64 },
    /// The running session ended while nothing was watching; it was
    /// completed once on load.
    CompletedWhileAway { mode: Mode, next_mode: Mode },
}

/// Whole seconds between `now_ms` and `end_ms`, rounded to nearest.
/// Zero or negative gaps yield `None`.
pub(crate) fn seconds_until(end_ms: i64, now_ms: i64) -> Option<u64> {
    let diff = end_ms.saturating_sub(now_ms);
    if diff <= 0 {
        return None;
    }
    let secs = (diff + 500) / 1000;
    (secs > 0).then_some(secs as u64)
}

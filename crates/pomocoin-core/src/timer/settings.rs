//! User-facing timer settings.
//!
//! Persisted as the `settings` JSON document. A stored document with missing
//! fields takes defaults field by field; an invalid one (zero durations) is
//! replaced by the defaults as a whole.

use serde::{Deserialize, Serialize};

use super::Mode;
use crate::error::{Result, ValidationError};
use crate::storage::{self, json_path, keys, KvStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u64,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u64,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u64,
    #[serde(default = "default_coins_per_focus_session")]
    pub coins_per_focus_session: u64,
    #[serde(default = "default_sessions_until_long_break")]
    pub sessions_until_long_break: u32,
    #[serde(default)]
    pub auto_start_focus: bool,
    #[serde(default)]
    pub auto_start_breaks: bool,
}

fn default_focus_minutes() -> u64 {
    25
}
fn default_short_break_minutes() -> u64 {
    5
}
fn default_long_break_minutes() -> u64 {
    15
}
fn default_coins_per_focus_session() -> u64 {
    10
}
fn default_sessions_until_long_break() -> u32 {
    4
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            coins_per_focus_session: default_coins_per_focus_session(),
            sessions_until_long_break: default_sessions_until_long_break(),
            auto_start_focus: false,
            auto_start_breaks: false,
        }
    }
}

impl Settings {
    /// # Errors
    /// Returns the first zero-valued duration or cycle length.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let checks = [
            ("focusMinutes", self.focus_minutes),
            ("shortBreakMinutes", self.short_break_minutes),
            ("longBreakMinutes", self.long_break_minutes),
            ("sessionsUntilLongBreak", u64::from(self.sessions_until_long_break)),
        ];
        match checks.iter().find(|(_, v)| *v == 0) {
            Some(&(field, _)) => Err(ValidationError::ZeroDuration { field }),
            None => Ok(()),
        }
    }

    /// Configured length of `mode` in minutes.
    pub fn minutes_for(&self, mode: Mode) -> u64 {
        match mode {
            Mode::Focus => self.focus_minutes,
            Mode::ShortBreak => self.short_break_minutes,
            Mode::LongBreak => self.long_break_minutes,
        }
    }

    /// Configured length of `mode` in seconds.
    pub fn duration_secs(&self, mode: Mode) -> u64 {
        self.minutes_for(mode).saturating_mul(60)
    }

    /// Whether the auto-start policy covers `mode`'s category.
    pub fn auto_starts(&self, mode: Mode) -> bool {
        if mode.is_break() {
            self.auto_start_breaks
        } else {
            self.auto_start_focus
        }
    }

    /// Load the settings document, falling back to defaults when it is
    /// absent, corrupt, or fails validation.
    ///
    /// # Errors
    /// Returns a store read error.
    pub fn load(store: &dyn KvStore) -> Result<Self> {
        Ok(match storage::read_document::<Settings>(store, keys::SETTINGS)? {
            Some(settings) => match settings.validate() {
                Ok(()) => settings,
                Err(e) => {
                    tracing::warn!(error = %e, "stored settings invalid, using defaults");
                    Self::default()
                }
            },
            None => Self::default(),
        })
    }

    /// Validate and persist.
    ///
    /// # Errors
    /// Returns a validation error or a store write error.
    pub fn save(&self, store: &dyn KvStore) -> Result<()> {
        self.validate()?;
        storage::write_document(store, keys::SETTINGS, self)
    }

    /// Get a value as string by key (`focusMinutes`, `autoStartBreaks`, ...).
    pub fn get(&self, key: &str) -> Option<String> {
        json_path::get_value(self, key)
    }

    /// Return a validated copy with one key changed.
    ///
    /// # Errors
    /// Returns an error if the key is unknown, the value does not parse, or
    /// the result fails validation.
    pub fn with(&self, key: &str, value: &str) -> Result<Self> {
        let updated: Settings = json_path::with_value(self, key, value)?;
        updated.validate()?;
        Ok(updated)
    }
}

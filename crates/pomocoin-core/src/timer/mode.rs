use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// The three countdown modes of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    Focus,
    ShortBreak,
    LongBreak,
}

impl Mode {
    pub fn is_break(self) -> bool {
        matches!(self, Mode::ShortBreak | Mode::LongBreak)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Focus => "focus",
            Mode::ShortBreak => "shortBreak",
            Mode::LongBreak => "longBreak",
        }
    }

    /// Lenient lookup used for persisted documents: anything unknown is focus.
    fn from_stored(name: &str) -> Self {
        match name {
            "focus" | "pomodoro" => Mode::Focus,
            "shortBreak" => Mode::ShortBreak,
            "longBreak" => Mode::LongBreak,
            other => {
                tracing::warn!(mode = other, "unknown stored mode, using focus");
                Mode::Focus
            }
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Focus
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parsing for user input.
impl FromStr for Mode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(Mode::Focus),
            "short-break" | "shortBreak" | "short" => Ok(Mode::ShortBreak),
            "long-break" | "longBreak" | "long" => Ok(Mode::LongBreak),
            other => Err(ValidationError::InvalidValue {
                field: "mode".into(),
                message: format!("unknown mode '{other}'"),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Mode::from_stored(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        assert_eq!(serde_json::to_string(&Mode::ShortBreak).unwrap(), "\"shortBreak\"");
        assert_eq!(serde_json::to_string(&Mode::LongBreak).unwrap(), "\"longBreak\"");
    }

    #[test]
    fn unknown_stored_mode_falls_back_to_focus() {
        let mode: Mode = serde_json::from_str("\"siesta\"").unwrap();
        assert_eq!(mode, Mode::Focus);
        let legacy: Mode = serde_json::from_str("\"pomodoro\"").unwrap();
        assert_eq!(legacy, Mode::Focus);
    }

    #[test]
    fn user_input_is_strict() {
        assert_eq!("short-break".parse::<Mode>().unwrap(), Mode::ShortBreak);
        assert!("siesta".parse::<Mode>().is_err());
    }
}

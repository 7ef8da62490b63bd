use clap::Subcommand;
use pomocoin_core::{Config, CoreError, Settings, ValidationError};

use super::{load_engine, print_json, CommandResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Get a setting (e.g. "focusMinutes", "autoStartBreaks")
    Get {
        key: String,
    },
    /// Change a setting. Stops the timer and rewinds the current mode.
    Set {
        key: String,
        value: String,
    },
    /// List all settings
    List,
    /// Restore the default settings
    Reset,
}

pub fn run(action: SettingsAction, config: &Config) -> CommandResult {
    let mut engine = load_engine(config)?;
    match action {
        SettingsAction::Get { key } => match engine.settings().get(&key) {
            Some(value) => println!("{value}"),
            None => {
                return Err(CoreError::from(ValidationError::InvalidValue {
                    field: key,
                    message: "unknown setting".into(),
                })
                .into())
            }
        },
        SettingsAction::Set { key, value } => {
            let updated = engine.settings().with(&key, &value)?;
            engine.update_settings(updated)?;
            print_json(engine.settings())?;
        }
        SettingsAction::List => {
            print_json(engine.settings())?;
        }
        SettingsAction::Reset => {
            engine.update_settings(Settings::default())?;
            print_json(engine.settings())?;
        }
    }
    Ok(())
}

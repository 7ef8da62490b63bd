pub mod completions;
pub mod config;
pub mod ledger;
pub mod reward;
pub mod settings;
pub mod task;
pub mod timer;

use std::sync::Arc;

use pomocoin_core::timer::Detached;
use pomocoin_core::{
    Config, CoreError, Database, Event, KvStore, ProgressLedger, Recovery, SystemClock,
    TimerEngine,
};
use serde::Serialize;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

pub fn open_store(config: &Config) -> Result<Arc<dyn KvStore>, CoreError> {
    Ok(Arc::new(Database::open_in_data_dir(&config.storage.database)?))
}

pub fn open_ledger(config: &Config, store: Arc<dyn KvStore>) -> ProgressLedger {
    ProgressLedger::new(store, Arc::new(SystemClock), config.ledger.clone())
}

/// Engine for a one-shot command. There is no in-process tick; the saved end
/// timestamp carries a running countdown until the next invocation.
pub fn load_engine(config: &Config) -> Result<TimerEngine, CoreError> {
    let store = open_store(config)?;
    let ledger = open_ledger(config, store.clone());
    let engine = TimerEngine::load(store, ledger, Arc::new(SystemClock), Box::new(Detached))?;
    report_recovery(&engine)?;
    Ok(engine)
}

/// Ledger for a command that does not drive the timer. Every command that
/// opens the store loads the engine first, so a session that ran out since
/// the last invocation is paid before anything is read or written.
pub fn settled_ledger(config: &Config) -> Result<ProgressLedger, CoreError> {
    Ok(load_engine(config)?.ledger().clone())
}

/// A session that ran out between invocations is worth telling about.
pub fn report_recovery(engine: &TimerEngine) -> Result<(), serde_json::Error> {
    let recovery = engine.recovery();
    if matches!(recovery, Recovery::CompletedWhileAway { .. }) {
        print_json(&Event::Recovered {
            recovery,
            at: chrono::Utc::now(),
        })?;
    }
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! # Pomocoin Core Library
//!
//! Core business logic for the Pomocoin focus timer: a Pomodoro cycle that
//! pays coins for finished focus sessions, a ledger of daily progress and
//! rewards, and reload-safe recovery of an in-flight countdown. The CLI is a
//! thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a synchronous state machine; ticks come from a
//!   cancellable [`Ticker`] schedule the engine manages itself
//! - **Snapshot Recovery**: the engine constructor restores a running or
//!   paused session from the store, completing it once if it ran out while
//!   nothing was watching
//! - **Progress Ledger**: read-modify-persist bookkeeping of coins, per-day
//!   stats, rewards and tasks
//! - **Storage**: a [`KvStore`] of named JSON documents (SQLite or in-memory)
//!   and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerDriver`]: tokio event loop that owns an engine
//! - [`ProgressLedger`]: Coins, history, rewards, tasks
//! - [`Database`]: SQLite document store
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod ledger;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::Event;
pub use ledger::{
    DailyStats, DayActivity, ProgressDocument, ProgressLedger, ProgressSummary, Redemption, Reward,
    Task,
};
pub use storage::{Config, Database, KvStore, MemoryStore};
pub use timer::{
    Mode, Recovery, SessionSnapshot, Settings, TimerDriver, TimerEngine, TimerState, Ticker,
};

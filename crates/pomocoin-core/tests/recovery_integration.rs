//! Integration tests for reload-safe session recovery.
//!
//! Each "reload" builds a fresh engine over the same store, the way a new
//! process (or a page reload) would.

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::FlakyStore;
use pomocoin_core::storage::{keys, LedgerConfig};
use pomocoin_core::timer::{ManualTicker, TimerPosition};
use pomocoin_core::{
    Clock, CoreError, Database, KvStore, ManualClock, MemoryStore, Mode, ProgressLedger, Recovery,
    SessionSnapshot, Settings, StorageError, TimerEngine,
};

struct World {
    store: Arc<dyn KvStore>,
    clock: Arc<ManualClock>,
    ticker: ManualTicker,
}

impl World {
    fn new(settings: &Settings) -> Self {
        Self::over(Arc::new(MemoryStore::new()), settings)
    }

    fn over(store: Arc<dyn KvStore>, settings: &Settings) -> Self {
        settings.save(store.as_ref()).unwrap();
        Self {
            store,
            clock: Arc::new(ManualClock::default()),
            ticker: ManualTicker::new(),
        }
    }

    fn ledger(&self) -> ProgressLedger {
        ProgressLedger::new(self.store.clone(), self.clock.clone(), LedgerConfig::default())
    }

    fn load(&self) -> TimerEngine {
        TimerEngine::load(
            self.store.clone(),
            self.ledger(),
            self.clock.clone(),
            Box::new(self.ticker.clone()),
        )
        .unwrap()
    }
}

#[test]
fn running_session_resumes_with_elapsed_time_removed() {
    let world = World::new(&Settings::default());
    let mut engine = world.load();
    engine.start().unwrap();
    drop(engine);

    world.clock.advance_secs(600);
    let engine = world.load();
    let state = engine.state();
    assert!(state.running);
    assert_eq!(state.mode, Mode::Focus);
    assert_eq!(state.remaining_seconds, 1500 - 600);
    assert_eq!(
        engine.recovery(),
        Recovery::Resumed {
            mode: Mode::Focus,
            remaining_seconds: 900
        }
    );
    assert!(engine.active_tick().is_some());
    assert_eq!(world.ticker.live(), 1);
}

#[test]
fn resume_rounds_to_nearest_second() {
    let world = World::new(&Settings::default());
    let mut engine = world.load();
    engine.start().unwrap();
    drop(engine);

    world.clock.advance(Duration::milliseconds(10_400));
    let engine = world.load();
    assert_eq!(engine.state().remaining_seconds, 1490);
}

#[test]
fn expired_session_completes_exactly_once() {
    let world = World::new(&Settings::default());
    let mut engine = world.load();
    engine.start().unwrap();
    drop(engine);

    // an hour past the end: one completion, not one per missed second
    world.clock.advance_secs(1500 + 3600);
    let engine = world.load();
    assert_eq!(
        engine.recovery(),
        Recovery::CompletedWhileAway {
            mode: Mode::Focus,
            next_mode: Mode::ShortBreak
        }
    );
    let state = engine.state();
    assert_eq!(state.mode, Mode::ShortBreak);
    assert!(!state.running);
    assert_eq!(state.completed_focus_count, 1);
    assert!(SessionSnapshot::load(world.store.as_ref()).unwrap().is_none());

    let doc = engine.ledger().document().unwrap();
    assert_eq!(doc.coins, 110);
    assert_eq!(doc.day(world.clock.today()).focus_sessions, 1);
    drop(engine);

    // loading again must not count the same session twice
    let engine = world.load();
    assert_eq!(engine.recovery(), Recovery::Fresh);
    assert_eq!(engine.state().mode, Mode::ShortBreak);
    assert_eq!(engine.ledger().document().unwrap().coins, 110);
}

#[test]
fn failed_snapshot_clear_never_pays_twice() {
    let store = Arc::new(FlakyStore::new());
    let settings = Settings {
        focus_minutes: 1,
        ..Settings::default()
    };
    let world = World::over(store.clone(), &settings);
    let mut engine = world.load();
    engine.start().unwrap();
    for _ in 0..59 {
        engine.tick().unwrap();
    }

    store.fail_next_remove();
    let err = engine.tick().unwrap_err();
    assert!(matches!(err, CoreError::Storage(StorageError::Locked)));
    // the session was not paid because its snapshot is still there
    assert_eq!(world.ledger().document().unwrap().coins, 100);
    drop(engine);

    world.clock.advance_secs(61);
    let engine = world.load();
    assert!(matches!(engine.recovery(), Recovery::CompletedWhileAway { .. }));
    let doc = engine.ledger().document().unwrap();
    assert_eq!(doc.coins, 110);
    assert_eq!(doc.day(world.clock.today()).focus_sessions, 1);
    assert_eq!(engine.state().completed_focus_count, 1);
}

#[test]
fn expired_session_with_auto_start_runs_next_mode() {
    let settings = Settings {
        auto_start_breaks: true,
        ..Settings::default()
    };
    let world = World::new(&settings);
    let mut engine = world.load();
    engine.start().unwrap();
    drop(engine);

    world.clock.advance_secs(1500);
    let engine = world.load();
    let state = engine.state();
    assert_eq!(state.mode, Mode::ShortBreak);
    assert!(state.running);
    assert_eq!(state.remaining_seconds, 300);
    assert_eq!(world.ticker.live(), 1);
    assert_eq!(
        SessionSnapshot::load(world.store.as_ref()).unwrap(),
        Some(SessionSnapshot::Running {
            end_timestamp: world.clock.now_ms() + 300_000,
            mode: Mode::ShortBreak,
            completed_focus_count: 1,
        })
    );
}

#[test]
fn paused_session_restores_remaining() {
    let world = World::new(&Settings::default());
    let mut engine = world.load();
    engine.change_mode(Mode::LongBreak).unwrap();
    engine.start().unwrap();
    for _ in 0..42 {
        engine.tick().unwrap();
    }
    engine.pause().unwrap();
    drop(engine);

    world.clock.advance_secs(10_000);
    let engine = world.load();
    let state = engine.state();
    assert!(!state.running);
    assert_eq!(state.mode, Mode::LongBreak);
    assert_eq!(state.remaining_seconds, 900 - 42);
    assert_eq!(engine.active_tick(), None);
}

#[test]
fn legacy_snapshot_is_recovered() {
    let world = World::new(&Settings::default());
    let end = world.clock.now_ms() + 120_000;
    world
        .store
        .set(
            keys::TIMER_SNAPSHOT,
            &format!(r#"{{"endTime":{end},"mode":"pomodoro","pomodoroCount":2}}"#),
        )
        .unwrap();
    let engine = world.load();
    let state = engine.state();
    assert!(state.running);
    assert_eq!(state.remaining_seconds, 120);
    assert_eq!(state.completed_focus_count, 2);
}

#[test]
fn corrupt_snapshot_falls_back_to_position() {
    let world = World::new(&Settings::default());
    TimerPosition {
        mode: Mode::ShortBreak,
        completed_focus_count: 3,
    }
    .save(world.store.as_ref())
    .unwrap();
    world.store.set(keys::TIMER_SNAPSHOT, "{{{").unwrap();

    let engine = world.load();
    assert_eq!(engine.recovery(), Recovery::Fresh);
    let state = engine.state();
    assert_eq!(state.mode, Mode::ShortBreak);
    assert_eq!(state.remaining_seconds, 300);
    assert_eq!(state.completed_focus_count, 3);
    assert!(!state.running);
}

#[test]
fn empty_store_gives_initial_state() {
    let world = World::new(&Settings::default());
    let engine = world.load();
    let state = engine.state();
    assert_eq!(state.mode, Mode::Focus);
    assert_eq!(state.remaining_seconds, 1500);
    assert!(!state.running);
    assert_eq!(state.completed_focus_count, 0);
}

#[test]
fn sqlite_store_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pomocoin.db");
    let clock = Arc::new(ManualClock::default());

    let load = |clock: &Arc<ManualClock>| {
        let store: Arc<dyn KvStore> = Arc::new(Database::open(&path).unwrap());
        let ledger = ProgressLedger::new(store.clone(), clock.clone(), LedgerConfig::default());
        TimerEngine::load(store, ledger, clock.clone(), Box::new(ManualTicker::new())).unwrap()
    };

    let mut engine = load(&clock);
    engine.start().unwrap();
    drop(engine);

    clock.advance_secs(60);
    let engine = load(&clock);
    assert_eq!(engine.state().remaining_seconds, 1440);
    drop(engine);

    clock.advance_secs(1440);
    let engine = load(&clock);
    assert!(matches!(
        engine.recovery(),
        Recovery::CompletedWhileAway { mode: Mode::Focus, .. }
    ));
    assert_eq!(engine.ledger().document().unwrap().coins, 110);
}

//! Timer engine implementation.
//!
//! The engine is a synchronous state machine over three modes. It does not
//! run a thread: ticks come from a [`Ticker`] schedule that the engine arms
//! and cancels itself, and the owner feeds them back through
//! [`TimerEngine::on_tick`].
//!
//! ## Cycle
//!
//! ```text
//! focus -> shortBreak -> focus -> ... -> focus -> longBreak -> focus
//!          (every `sessions_until_long_break` focus completions)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::load(store, ledger, clock, Box::new(ticker))?;
//! engine.start()?;
//! // for each tick delivered by the ticker:
//! engine.on_tick(id)?;
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::snapshot::{seconds_until, Recovery, SessionSnapshot, TimerPosition};
use super::ticker::{TickHandle, TickId, Ticker, TICK_PERIOD};
use super::{Mode, Settings};
use crate::clock::Clock;
use crate::error::Result;
use crate::events::Event;
use crate::ledger::ProgressLedger;
use crate::storage::KvStore;

/// Observable timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub mode: Mode,
    pub remaining_seconds: u64,
    pub running: bool,
    pub completed_focus_count: u32,
}

impl TimerState {
    fn idle(settings: &Settings, mode: Mode, completed_focus_count: u32) -> Self {
        Self {
            mode,
            remaining_seconds: settings.duration_secs(mode),
            running: false,
            completed_focus_count,
        }
    }

    /// `MM:SS`, as a countdown display would show it.
    pub fn display(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.remaining_seconds / 60,
            self.remaining_seconds % 60
        )
    }
}

/// Mode that follows `mode` once it finishes.
///
/// `completed_focus_count` is the count after the finishing session has been
/// accounted for.
pub fn next_mode(mode: Mode, completed_focus_count: u32, sessions_until_long_break: u32) -> Mode {
    match mode {
        Mode::Focus => {
            if completed_focus_count % sessions_until_long_break.max(1) == 0 {
                Mode::LongBreak
            } else {
                Mode::ShortBreak
            }
        }
        Mode::ShortBreak | Mode::LongBreak => Mode::Focus,
    }
}

pub type Observer = Box<dyn FnMut(&Event, &TimerState) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Core timer engine.
///
/// Owns the [`TimerState`]; every mutation goes through one of the command
/// methods, which persist the snapshot/position documents and notify
/// observers before returning.
pub struct TimerEngine {
    settings: Settings,
    state: TimerState,
    store: Arc<dyn KvStore>,
    ledger: ProgressLedger,
    clock: Arc<dyn Clock>,
    ticker: Box<dyn Ticker>,
    tick: Option<TickHandle>,
    next_tick_id: u64,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
    recovery: Recovery,
}

impl TimerEngine {
    /// Build the engine from persisted settings and recover any in-flight
    /// session. Recovery happens here and only here, before any tick is
    /// armed.
    ///
    /// # Errors
    /// Returns an error if a store write fails while recovering (including
    /// the ledger update for a session that finished while nothing was
    /// running).
    pub fn load(
        store: Arc<dyn KvStore>,
        ledger: ProgressLedger,
        clock: Arc<dyn Clock>,
        ticker: Box<dyn Ticker>,
    ) -> Result<Self> {
        let settings = Settings::load(store.as_ref())?;
        let position = TimerPosition::load(store.as_ref())?.unwrap_or_default();
        let mut engine = Self {
            state: TimerState::idle(&settings, position.mode, position.completed_focus_count),
            settings,
            store,
            ledger,
            clock,
            ticker,
            tick: None,
            next_tick_id: 0,
            observers: Vec::new(),
            next_subscription: 0,
            recovery: Recovery::Fresh,
        };
        engine.recovery = engine.recover()?;
        engine.save_position()?;
        Ok(engine)
    }

    fn recover(&mut self) -> Result<Recovery> {
        let Some(snapshot) = SessionSnapshot::load(self.store.as_ref())? else {
            return Ok(Recovery::Fresh);
        };
        self.state.mode = snapshot.mode();
        self.state.completed_focus_count = snapshot.completed_focus_count();

        let recovery = match snapshot {
            SessionSnapshot::Running { end_timestamp, mode, .. } => {
                match seconds_until(end_timestamp, self.clock.now_ms()) {
                    Some(remaining) => {
                        self.state.remaining_seconds = remaining;
                        self.state.running = true;
                        self.arm();
                        Recovery::Resumed {
                            mode,
                            remaining_seconds: remaining,
                        }
                    }
                    None => {
                        self.state.remaining_seconds = 0;
                        self.state.running = true;
                        self.complete(false)?;
                        Recovery::CompletedWhileAway {
                            mode,
                            next_mode: self.state.mode,
                        }
                    }
                }
            }
            SessionSnapshot::Paused {
                remaining_seconds,
                mode,
                ..
            } => {
                self.state.remaining_seconds = remaining_seconds;
                self.state.running = false;
                Recovery::Paused {
                    mode,
                    remaining_seconds,
                }
            }
        };
        tracing::info!(?recovery, "timer recovered");
        Ok(recovery)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    /// What [`TimerEngine::load`] found.
    pub fn recovery(&self) -> Recovery {
        self.recovery
    }

    /// Id of the live tick schedule, if the timer is running.
    pub fn active_tick(&self) -> Option<TickId> {
        self.tick.as_ref().map(TickHandle::id)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            at: Utc::now(),
        }
    }

    // ── Observers ────────────────────────────────────────────────────

    pub fn subscribe(
        &mut self,
        observer: impl FnMut(&Event, &TimerState) + Send + 'static,
    ) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start (or re-arm, if already running) the countdown.
    pub fn start(&mut self) -> Result<Event> {
        let ends_at_ms = self.run()?;
        self.commit(Event::TimerStarted {
            mode: self.state.mode,
            remaining_seconds: self.state.remaining_seconds,
            ends_at_ms,
            at: Utc::now(),
        })
    }

    pub fn pause(&mut self) -> Result<Event> {
        self.disarm();
        self.state.running = false;
        SessionSnapshot::Paused {
            remaining_seconds: self.state.remaining_seconds,
            mode: self.state.mode,
            completed_focus_count: self.state.completed_focus_count,
        }
        .save(self.store.as_ref())?;
        self.commit(Event::TimerPaused {
            mode: self.state.mode,
            remaining_seconds: self.state.remaining_seconds,
            at: Utc::now(),
        })
    }

    /// Stop and rewind the current mode to its full duration.
    pub fn reset(&mut self) -> Result<Event> {
        self.stop_and_clear()?;
        self.state.remaining_seconds = self.settings.duration_secs(self.state.mode);
        self.commit(Event::TimerReset {
            mode: self.state.mode,
            remaining_seconds: self.state.remaining_seconds,
            at: Utc::now(),
        })
    }

    /// Switch modes by hand. Switching to the current mode does nothing.
    pub fn change_mode(&mut self, mode: Mode) -> Result<Option<Event>> {
        if mode == self.state.mode {
            return Ok(None);
        }
        let from = self.state.mode;
        self.stop_and_clear()?;
        self.state.mode = mode;
        self.state.remaining_seconds = self.settings.duration_secs(mode);
        self.commit(Event::ModeChanged {
            from,
            to: mode,
            at: Utc::now(),
        })
        .map(Some)
    }

    /// Finish the current mode without recording it.
    pub fn skip(&mut self) -> Result<Event> {
        self.complete(true)
    }

    /// Advance the countdown by one second. Reaching zero while running
    /// completes the session; ticks while stopped are ignored.
    pub fn tick(&mut self) -> Result<Option<Event>> {
        if !self.state.running {
            return Ok(None);
        }
        self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
        if self.state.remaining_seconds == 0 {
            return self.complete(false).map(Some);
        }
        let event = Event::Ticked {
            mode: self.state.mode,
            remaining_seconds: self.state.remaining_seconds,
        };
        self.notify(&event);
        Ok(Some(event))
    }

    /// Deliver a tick from the ticker. Ticks from a cancelled schedule are
    /// dropped.
    pub fn on_tick(&mut self, id: TickId) -> Result<Option<Event>> {
        if self.active_tick() != Some(id) {
            tracing::trace!(?id, "dropping stale tick");
            return Ok(None);
        }
        self.tick()
    }

    /// Validate and persist new settings, then rewind the current mode to
    /// its new duration.
    pub fn update_settings(&mut self, settings: Settings) -> Result<Event> {
        settings.save(self.store.as_ref())?;
        self.settings = settings;
        self.stop_and_clear()?;
        self.state.remaining_seconds = self.settings.duration_secs(self.state.mode);
        self.commit(Event::SettingsChanged { at: Utc::now() })
    }

    /// Cancel any live tick schedule. The persisted snapshot is left alone
    /// so a running session can be recovered by the next load.
    pub fn teardown(&mut self) {
        self.disarm();
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// The snapshot goes before the ledger is touched, so a failure between
    /// the two can lose a session but never pay for it twice.
    fn complete(&mut self, skipped: bool) -> Result<Event> {
        self.disarm();
        self.state.running = false;
        SessionSnapshot::clear(self.store.as_ref())?;

        let mode = self.state.mode;
        let mut coins_earned = 0;
        if !skipped {
            match mode {
                Mode::Focus => {
                    coins_earned = self.settings.coins_per_focus_session;
                    self.ledger
                        .record_focus_session(self.settings.focus_minutes, coins_earned)?;
                    self.state.completed_focus_count =
                        self.state.completed_focus_count.saturating_add(1);
                }
                Mode::ShortBreak => {
                    self.ledger.record_break(self.settings.short_break_minutes)?;
                }
                Mode::LongBreak => {
                    self.ledger.record_break(self.settings.long_break_minutes)?;
                    self.state.completed_focus_count = 0;
                }
            }
        }

        let next = next_mode(
            mode,
            self.state.completed_focus_count,
            self.settings.sessions_until_long_break,
        );
        self.state.mode = next;
        self.state.remaining_seconds = self.settings.duration_secs(next);

        let auto_started = self.settings.auto_starts(next);
        if auto_started {
            self.run()?;
        }

        tracing::info!(
            %mode,
            skipped,
            coins_earned,
            next_mode = %next,
            auto_started,
            completed_focus_count = self.state.completed_focus_count,
            "session completed"
        );
        self.commit(Event::SessionCompleted {
            mode,
            skipped,
            coins_earned,
            next_mode: next,
            auto_started,
            at: Utc::now(),
        })
    }

    /// Set running, persist the absolute end time and arm a fresh tick
    /// schedule. Returns the end time in epoch milliseconds.
    fn run(&mut self) -> Result<i64> {
        self.state.running = true;
        let remaining_ms = i64::try_from(self.state.remaining_seconds.saturating_mul(1000))
            .unwrap_or(i64::MAX);
        let ends_at_ms = self.clock.now_ms().saturating_add(remaining_ms);
        SessionSnapshot::Running {
            end_timestamp: ends_at_ms,
            mode: self.state.mode,
            completed_focus_count: self.state.completed_focus_count,
        }
        .save(self.store.as_ref())?;
        self.arm();
        Ok(ends_at_ms)
    }

    fn stop_and_clear(&mut self) -> Result<()> {
        self.disarm();
        self.state.running = false;
        SessionSnapshot::clear(self.store.as_ref())
    }

    /// Replace the tick schedule. The old handle is always cancelled first.
    fn arm(&mut self) {
        self.disarm();
        self.next_tick_id += 1;
        let id = TickId(self.next_tick_id);
        self.tick = Some(self.ticker.schedule(id, TICK_PERIOD));
    }

    fn disarm(&mut self) {
        if let Some(handle) = self.tick.take() {
            handle.cancel();
        }
    }

    fn save_position(&self) -> Result<()> {
        TimerPosition {
            mode: self.state.mode,
            completed_focus_count: self.state.completed_focus_count,
        }
        .save(self.store.as_ref())
    }

    fn commit(&mut self, event: Event) -> Result<Event> {
        self.save_position()?;
        tracing::debug!(event = event.kind(), state = ?self.state, "timer transition");
        self.notify(&event);
        Ok(event)
    }

    fn notify(&mut self, event: &Event) {
        let state = self.state;
        for (_, observer) in self.observers.iter_mut() {
            observer(event, &state);
        }
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{keys, LedgerConfig, MemoryStore};
    use crate::timer::ManualTicker;
    use std::sync::Mutex;

    struct Harness {
        engine: TimerEngine,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        ticker: ManualTicker,
    }

    fn harness_with(settings: Settings) -> Harness {
        let store = Arc::new(MemoryStore::new());
        settings.save(store.as_ref()).unwrap();
        let clock = Arc::new(ManualClock::default());
        let ticker = ManualTicker::new();
        let ledger = ProgressLedger::new(store.clone(), clock.clone(), LedgerConfig::default());
        let engine =
            TimerEngine::load(store.clone(), ledger, clock.clone(), Box::new(ticker.clone()))
                .unwrap();
        Harness {
            engine,
            store,
            clock,
            ticker,
        }
    }

    fn short_settings() -> Settings {
        Settings {
            focus_minutes: 1,
            short_break_minutes: 1,
            long_break_minutes: 2,
            ..Settings::default()
        }
    }

    fn run_out(engine: &mut TimerEngine) -> Event {
        loop {
            match engine.tick().unwrap() {
                Some(event @ Event::SessionCompleted { .. }) => return event,
                Some(_) => continue,
                None => panic!("timer stopped before completing"),
            }
        }
    }

    #[test]
    fn initial_state() {
        let h = harness_with(Settings::default());
        let state = h.engine.state();
        assert_eq!(state.mode, Mode::Focus);
        assert_eq!(state.remaining_seconds, 1500);
        assert!(!state.running);
        assert_eq!(state.completed_focus_count, 0);
        assert_eq!(h.engine.recovery(), Recovery::Fresh);
        assert_eq!(state.display(), "25:00");
    }

    #[test]
    fn start_persists_absolute_end_time() {
        let mut h = harness_with(Settings::default());
        h.engine.start().unwrap();
        let snap = SessionSnapshot::load(h.store.as_ref()).unwrap().unwrap();
        assert_eq!(
            snap,
            SessionSnapshot::Running {
                end_timestamp: h.clock.now_ms() + 1_500_000,
                mode: Mode::Focus,
                completed_focus_count: 0,
            }
        );
        assert!(h.engine.state().running);
        assert_eq!(h.ticker.live(), 1);
    }

    #[test]
    fn start_twice_rearms_single_tick() {
        let mut h = harness_with(Settings::default());
        h.engine.start().unwrap();
        h.engine.start().unwrap();
        assert_eq!(h.ticker.live(), 1);
        assert_eq!(h.ticker.scheduled(), 2);
    }

    #[test]
    fn pause_persists_remaining_and_cancels_tick() {
        let mut h = harness_with(Settings::default());
        h.engine.start().unwrap();
        for _ in 0..10 {
            h.engine.tick().unwrap();
        }
        h.engine.pause().unwrap();
        assert_eq!(h.ticker.live(), 0);
        assert_eq!(
            SessionSnapshot::load(h.store.as_ref()).unwrap(),
            Some(SessionSnapshot::Paused {
                remaining_seconds: 1490,
                mode: Mode::Focus,
                completed_focus_count: 0,
            })
        );
        // ticks while paused are ignored
        assert!(h.engine.tick().unwrap().is_none());
        assert_eq!(h.engine.state().remaining_seconds, 1490);
    }

    #[test]
    fn reset_rewinds_and_clears_snapshot() {
        let mut h = harness_with(Settings::default());
        h.engine.start().unwrap();
        h.engine.tick().unwrap();
        h.engine.reset().unwrap();
        let state = h.engine.state();
        assert!(!state.running);
        assert_eq!(state.remaining_seconds, 1500);
        assert!(SessionSnapshot::load(h.store.as_ref()).unwrap().is_none());
        assert_eq!(h.ticker.live(), 0);
    }

    #[test]
    fn change_mode_to_same_mode_is_noop() {
        let mut h = harness_with(Settings::default());
        h.engine.start().unwrap();
        assert!(h.engine.change_mode(Mode::Focus).unwrap().is_none());
        assert!(h.engine.state().running);
        assert_eq!(h.ticker.live(), 1);
    }

    #[test]
    fn change_mode_stops_and_keeps_count() {
        let mut h = harness_with(short_settings());
        h.engine.start().unwrap();
        run_out(&mut h.engine);
        assert_eq!(h.engine.state().completed_focus_count, 1);
        h.engine.start().unwrap();
        h.engine.change_mode(Mode::LongBreak).unwrap();
        let state = h.engine.state();
        assert_eq!(state.mode, Mode::LongBreak);
        assert_eq!(state.remaining_seconds, 120);
        assert!(!state.running);
        assert_eq!(state.completed_focus_count, 1);
        assert!(SessionSnapshot::load(h.store.as_ref()).unwrap().is_none());
        assert_eq!(h.ticker.live(), 0);
    }

    #[test]
    fn focus_completion_records_and_moves_to_short_break() {
        let mut h = harness_with(short_settings());
        h.engine.start().unwrap();
        let event = run_out(&mut h.engine);
        assert!(matches!(
            event,
            Event::SessionCompleted {
                mode: Mode::Focus,
                skipped: false,
                coins_earned: 10,
                next_mode: Mode::ShortBreak,
                auto_started: false,
                ..
            }
        ));
        let state = h.engine.state();
        assert_eq!(state.mode, Mode::ShortBreak);
        assert_eq!(state.remaining_seconds, 60);
        assert!(!state.running);
        assert_eq!(h.engine.ledger().document().unwrap().coins, 110);
        assert!(SessionSnapshot::load(h.store.as_ref()).unwrap().is_none());
        assert_eq!(h.ticker.live(), 0);
    }

    #[test]
    fn completion_fires_once_per_zero_crossing() {
        let mut h = harness_with(short_settings());
        h.engine.start().unwrap();
        run_out(&mut h.engine);
        for _ in 0..5 {
            assert!(h.engine.tick().unwrap().is_none());
        }
        let today = h.engine.ledger().today().unwrap();
        assert_eq!(today.focus_sessions, 1);
    }

    #[test]
    fn auto_start_breaks_rearms() {
        let mut h = harness_with(Settings {
            auto_start_breaks: true,
            ..short_settings()
        });
        h.engine.start().unwrap();
        let first = h.ticker.last_id();
        run_out(&mut h.engine);
        let state = h.engine.state();
        assert_eq!(state.mode, Mode::ShortBreak);
        assert!(state.running);
        assert_eq!(h.ticker.live(), 1);
        assert_ne!(h.ticker.last_id(), first);
        assert!(matches!(
            SessionSnapshot::load(h.store.as_ref()).unwrap(),
            Some(SessionSnapshot::Running { mode: Mode::ShortBreak, .. })
        ));
        // the break runs out, but focus does not auto-start
        run_out(&mut h.engine);
        assert_eq!(h.engine.state().mode, Mode::Focus);
        assert!(!h.engine.state().running);
        assert_eq!(h.ticker.live(), 0);
    }

    #[test]
    fn stale_tick_ids_are_dropped() {
        let mut h = harness_with(Settings::default());
        h.engine.start().unwrap();
        let old = h.ticker.last_id().unwrap();
        h.engine.pause().unwrap();
        h.engine.start().unwrap();
        assert!(h.engine.on_tick(old).unwrap().is_none());
        assert_eq!(h.engine.state().remaining_seconds, 1500);
        let current = h.engine.active_tick().unwrap();
        assert!(h.engine.on_tick(current).unwrap().is_some());
        assert_eq!(h.engine.state().remaining_seconds, 1499);
    }

    #[test]
    fn skip_focus_records_nothing() {
        let mut h = harness_with(Settings::default());
        h.engine.start().unwrap();
        let event = h.engine.skip().unwrap();
        assert!(matches!(
            event,
            Event::SessionCompleted {
                skipped: true,
                coins_earned: 0,
                ..
            }
        ));
        assert_eq!(h.engine.state().completed_focus_count, 0);
        let doc = h.engine.ledger().document().unwrap();
        assert_eq!(doc.coins, 100);
        assert!(doc.history.is_empty());
    }

    #[test]
    fn update_settings_rewinds_current_mode() {
        let mut h = harness_with(Settings::default());
        h.engine.start().unwrap();
        h.engine.tick().unwrap();
        let settings = Settings {
            focus_minutes: 50,
            ..Settings::default()
        };
        h.engine.update_settings(settings.clone()).unwrap();
        assert_eq!(h.engine.state().remaining_seconds, 3000);
        assert!(!h.engine.state().running);
        assert_eq!(Settings::load(h.store.as_ref()).unwrap(), settings);
        assert!(h
            .engine
            .update_settings(Settings {
                focus_minutes: 0,
                ..Settings::default()
            })
            .is_err());
    }

    #[test]
    fn observers_see_every_transition() {
        let mut h = harness_with(short_settings());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = h.engine.subscribe(move |event, state| {
            sink.lock().unwrap().push((event.kind(), state.running));
        });
        h.engine.start().unwrap();
        h.engine.tick().unwrap();
        h.engine.pause().unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("timer_started", true),
                ("ticked", true),
                ("timer_paused", false)
            ]
        );
        assert!(h.engine.unsubscribe(id));
        h.engine.reset().unwrap();
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn position_document_tracks_cycle() {
        let mut h = harness_with(short_settings());
        h.engine.start().unwrap();
        run_out(&mut h.engine);
        let position = TimerPosition::load(h.store.as_ref()).unwrap().unwrap();
        assert_eq!(position.mode, Mode::ShortBreak);
        assert_eq!(position.completed_focus_count, 1);
        assert!(h.store.get(keys::TIMER_POSITION).unwrap().is_some());
    }

    #[test]
    fn drop_cancels_tick() {
        let mut h = harness_with(Settings::default());
        h.engine.start().unwrap();
        let ticker = h.ticker.clone();
        drop(h);
        assert_eq!(ticker.live(), 0);
    }

    #[test]
    fn next_mode_rule() {
        assert_eq!(next_mode(Mode::Focus, 1, 4), Mode::ShortBreak);
        assert_eq!(next_mode(Mode::Focus, 4, 4), Mode::LongBreak);
        assert_eq!(next_mode(Mode::Focus, 0, 4), Mode::LongBreak);
        assert_eq!(next_mode(Mode::Focus, 3, 1), Mode::LongBreak);
        assert_eq!(next_mode(Mode::ShortBreak, 2, 4), Mode::Focus);
        assert_eq!(next_mode(Mode::LongBreak, 0, 4), Mode::Focus);
    }
}

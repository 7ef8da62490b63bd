//! Cancellable one-second tick sources.
//!
//! The engine never owns a thread. It asks a [`Ticker`] for a periodic tick
//! and gets back a [`TickHandle`]; the handle must be cancelled before a
//! replacement is scheduled, so at most one tick source is live per engine.
//! Every tick carries the [`TickId`] of the schedule that produced it, which
//! lets the engine drop ticks that were already in flight when their schedule
//! was cancelled.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

/// Cancellation token for one scheduled tick source.
#[must_use = "a dropped TickHandle leaves its tick source running"]
pub struct TickHandle {
    id: TickId,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TickHandle {
    pub fn new(id: TickId, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> TickId {
        self.id
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickHandle").field("id", &self.id).finish()
    }
}

pub trait Ticker: Send {
    /// Start delivering ticks tagged with `id` every `period`.
    fn schedule(&mut self, id: TickId, period: Duration) -> TickHandle;
}

/// Ticks from a tokio interval task, delivered over an unbounded channel to
/// whoever owns the engine (see [`super::TimerDriver`]).
///
/// Must be used from inside a tokio runtime.
pub struct TokioTicker {
    tx: mpsc::UnboundedSender<TickId>,
}

impl TokioTicker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TickId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Ticker for TokioTicker {
    fn schedule(&mut self, id: TickId, period: Duration) -> TickHandle {
        let tx = self.tx.clone();
        let task: JoinHandle<()> = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if tx.send(id).is_err() {
                    break;
                }
            }
        });
        TickHandle::new(id, move || task.abort())
    }
}

/// No in-process ticks. Used by one-shot processes (the CLI) where the
/// persisted end timestamp carries the countdown between runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Detached;

impl Ticker for Detached {
    fn schedule(&mut self, id: TickId, _period: Duration) -> TickHandle {
        TickHandle::new(id, || {})
    }
}

/// Records schedules without producing ticks; the caller feeds ticks by hand.
///
/// Clones share counters, so a test can keep one clone while the engine
/// owns the other.
#[derive(Debug, Default, Clone)]
pub struct ManualTicker {
    live: Arc<AtomicUsize>,
    scheduled: Arc<AtomicUsize>,
    last_id: Arc<std::sync::Mutex<Option<TickId>>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules not yet cancelled.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Total schedules ever made.
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Id of the most recent schedule.
    pub fn last_id(&self) -> Option<TickId> {
        *self.last_id.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Ticker for ManualTicker {
    fn schedule(&mut self, id: TickId, _period: Duration) -> TickHandle {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.scheduled.fetch_add(1, Ordering::SeqCst);
        *self.last_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(id);
        let live = Arc::clone(&self.live);
        TickHandle::new(id, move || {
            live.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

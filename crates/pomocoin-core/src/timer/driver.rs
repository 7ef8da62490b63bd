//! Single-task event loop around a [`TimerEngine`].
//!
//! The driver owns the engine outright. User commands and tick messages
//! arrive on channels and are applied strictly one at a time, so a completion
//! (including any auto-start re-arm) finishes before the next message is
//! looked at.

use tokio::sync::{mpsc, oneshot};

use super::ticker::TickId;
use super::{Mode, Settings, TimerEngine, TimerState};
use crate::error::Result;

#[derive(Debug)]
pub enum Command {
    Start,
    Pause,
    Reset,
    Skip,
    ChangeMode(Mode),
    UpdateSettings(Settings),
    State(oneshot::Sender<TimerState>),
    Shutdown,
}

/// Cheap, cloneable sender side of a running driver.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: mpsc::Sender<Command>,
}

impl DriverHandle {
    /// Queue a command. Returns false once the driver has stopped.
    pub async fn send(&self, command: Command) -> bool {
        self.tx.send(command).await.is_ok()
    }

    /// Queue a command without waiting; usable from synchronous observers.
    pub fn try_send(&self, command: Command) -> bool {
        self.tx.try_send(command).is_ok()
    }

    /// Current engine state, or `None` if the driver has stopped.
    pub async fn state(&self) -> Option<TimerState> {
        let (tx, rx) = oneshot::channel();
        if !self.send(Command::State(tx)).await {
            return None;
        }
        rx.await.ok()
    }
}

pub struct TimerDriver {
    engine: TimerEngine,
    commands: mpsc::Receiver<Command>,
    ticks: mpsc::UnboundedReceiver<TickId>,
}

impl TimerDriver {
    /// `ticks` is the receiver paired with the engine's
    /// [`super::TokioTicker`].
    pub fn new(engine: TimerEngine, ticks: mpsc::UnboundedReceiver<TickId>) -> (Self, DriverHandle) {
        let (tx, commands) = mpsc::channel(32);
        (
            Self {
                engine,
                commands,
                ticks,
            },
            DriverHandle { tx },
        )
    }

    pub fn engine_mut(&mut self) -> &mut TimerEngine {
        &mut self.engine
    }

    /// Run until `Shutdown` or until every handle is dropped. The engine is
    /// torn down (tick cancelled) and handed back.
    pub async fn run(mut self) -> TimerEngine {
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => {
                        if let Err(e) = self.apply(command) {
                            tracing::error!(error = %e, "timer command failed");
                        }
                    }
                },
                Some(id) = self.ticks.recv() => {
                    if let Err(e) = self.engine.on_tick(id) {
                        tracing::error!(error = %e, "timer tick failed");
                    }
                }
            }
        }
        self.engine.teardown();
        self.engine
    }

    fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Start => {
                self.engine.start()?;
            }
            Command::Pause => {
                self.engine.pause()?;
            }
            Command::Reset => {
                self.engine.reset()?;
            }
            Command::Skip => {
                self.engine.skip()?;
            }
            Command::ChangeMode(mode) => {
                self.engine.change_mode(mode)?;
            }
            Command::UpdateSettings(settings) => {
                self.engine.update_settings(settings)?;
            }
            Command::State(reply) => {
                let _ = reply.send(self.engine.state());
            }
            Command::Shutdown => {}
        }
        Ok(())
    }
}

use std::io::Write;
use std::sync::Arc;

use clap::Subcommand;
use pomocoin_core::timer::{Command, TokioTicker};
use pomocoin_core::{Config, Event, Mode, SystemClock, TimerDriver, TimerEngine};
use serde::Serialize;

use super::{load_engine, open_ledger, open_store, print_json, report_recovery, CommandResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start (or resume) the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Stop and rewind the current mode
    Reset,
    /// Finish the current mode without earning anything
    Skip,
    /// Print current timer state as JSON
    Status,
    /// Switch to another mode (focus, short-break, long-break)
    Mode {
        mode: Mode,
    },
    /// Run the timer in the foreground until interrupted
    Run {
        /// Start the countdown if it is not already running
        #[arg(long)]
        start: bool,
        /// Exit after the first completed session
        #[arg(long)]
        once: bool,
    },
}

#[derive(Serialize)]
struct Status {
    #[serde(flatten)]
    state: pomocoin_core::TimerState,
    display: String,
}

fn status(engine: &TimerEngine) -> Status {
    let state = engine.state();
    Status {
        state,
        display: state.display(),
    }
}

pub fn run(action: TimerAction, config: &Config) -> CommandResult {
    if let TimerAction::Run { start, once } = action {
        return run_foreground(config, start, once);
    }

    let mut engine = load_engine(config)?;
    match action {
        TimerAction::Start => {
            print_json(&engine.start()?)?;
        }
        TimerAction::Pause => {
            print_json(&engine.pause()?)?;
        }
        TimerAction::Reset => {
            print_json(&engine.reset()?)?;
        }
        TimerAction::Skip => {
            print_json(&engine.skip()?)?;
        }
        TimerAction::Status => {
            print_json(&status(&engine))?;
        }
        TimerAction::Mode { mode } => match engine.change_mode(mode)? {
            Some(event) => print_json(&event)?,
            None => print_json(&status(&engine))?,
        },
        TimerAction::Run { .. } => {}
    }
    Ok(())
}

/// Drive the engine on a tokio runtime. Events go to stdout as JSON lines and
/// the countdown is redrawn on stderr. Ctrl-C leaves a running session's
/// snapshot in place, so the next invocation picks it up.
fn run_foreground(config: &Config, start: bool, once: bool) -> CommandResult {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let store = open_store(config)?;
        let ledger = open_ledger(config, store.clone());
        let (ticker, ticks) = TokioTicker::new();
        let engine = TimerEngine::load(store, ledger, Arc::new(SystemClock), Box::new(ticker))?;
        report_recovery(&engine)?;

        let (mut driver, handle) = TimerDriver::new(engine, ticks);
        let shutdown = handle.clone();
        driver.engine_mut().subscribe(move |event, state| match event {
            Event::Ticked { .. } => {
                eprint!("\r{} {}", state.mode, state.display());
                let _ = std::io::stderr().flush();
            }
            event => {
                eprintln!();
                if let Ok(line) = serde_json::to_string(event) {
                    println!("{line}");
                }
                if once && matches!(event, Event::SessionCompleted { .. }) {
                    shutdown.try_send(Command::Shutdown);
                }
            }
        });
        if start && !driver.engine_mut().state().running {
            driver.engine_mut().start()?;
        }

        let mut task = tokio::spawn(driver.run());
        let engine = tokio::select! {
            finished = &mut task => finished?,
            interrupted = tokio::signal::ctrl_c() => {
                interrupted?;
                tracing::info!("interrupted, leaving session for the next run");
                handle.send(Command::Shutdown).await;
                task.await?
            }
        };
        eprintln!();
        println!("{}", serde_json::to_string(&engine.snapshot())?);
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}

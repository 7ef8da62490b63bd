mod driver;
mod engine;
mod mode;
mod settings;
mod snapshot;
mod ticker;

pub use driver::{Command, DriverHandle, TimerDriver};
pub use engine::{next_mode, Observer, SubscriptionId, TimerEngine, TimerState};
pub use mode::Mode;
pub use settings::Settings;
pub use snapshot::{Recovery, SessionSnapshot, TimerPosition};
pub use ticker::{Detached, ManualTicker, TickHandle, TickId, Ticker, TokioTicker, TICK_PERIOD};

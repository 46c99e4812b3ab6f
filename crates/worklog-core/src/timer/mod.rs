mod clock;
mod controller;
mod engine;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::TimerController;
pub use engine::{SessionTimer, TimerContext, TimerSnapshot, TimerState};

pub mod clock;
pub mod pomodoro;
pub mod ticker;

pub use clock::{Clock, SystemClock};
pub use pomodoro::{
    CompletionCallback, DEFAULT_DURATION_MS, LONGEST_DURATION_MS, PomodoroTimer, Recompute,
    TimerSnapshot, TimerStatus, format_remaining,
};
pub use ticker::Ticker;

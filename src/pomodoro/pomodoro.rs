use std::sync::Arc;

use serde::Serialize;

use super::clock::Clock;
use super::ticker::Ticker;
use crate::notify::Notifier;
use crate::store::{self, KeyValueStore};

pub const DEFAULT_DURATION_MS: u64 = 25 * 60 * 1000; // Classic pomodoro
/// Longest accepted session: one year. Longer requests are clamped to it.
pub const LONGEST_DURATION_MS: u64 = 365 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Completed,
}

impl TimerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TimerStatus::Idle => "IDLE",
            TimerStatus::Running => "RUNNING",
            TimerStatus::Paused => "PAUSED",
            TimerStatus::Completed => "COMPLETED",
        }
    }

    pub fn emoji(&self) -> &str {
        match self {
            TimerStatus::Idle => "🍅",
            TimerStatus::Running => "⏳",
            TimerStatus::Paused => "⏸",
            TimerStatus::Completed => "🎉",
        }
    }
}

/// Outcome of checking a running timer against its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recompute {
    NotRunning,
    Ticking { remaining_ms: u64 },
    Completed,
}

/// Everything a UI collaborator renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub remaining_ms: u64,
    pub duration_ms: u64,
    pub completed_cycles: u64,
    pub deadline_epoch_ms: Option<i64>,
    pub progress: f64,
    pub display: String,
}

pub type CompletionCallback = Box<dyn FnMut(&TimerSnapshot) + Send>;

/// Deadline-based focus timer.
///
/// While running, remaining time is always `deadline - now` and never a
/// decremented counter, so missed ticks and process suspension cannot skew
/// it. `deadline_epoch_ms` is `Some` exactly when the status is `Running`,
/// and the tick interval is armed under the same condition.
pub struct PomodoroTimer {
    status: TimerStatus,
    duration_ms: u64,
    remaining_ms: u64,
    deadline_epoch_ms: Option<i64>,
    completed_cycles: u64,
    clock: Arc<dyn Clock>,
    notifier: Box<dyn Notifier>,
    store: Box<dyn KeyValueStore>,
    ticker: Ticker,
    on_complete: Option<CompletionCallback>,
}

impl PomodoroTimer {
    /// Builds an idle timer from whatever the store remembers, falling back
    /// to `default_duration_ms` and a zero count.
    pub fn restore(
        clock: Arc<dyn Clock>,
        store: Box<dyn KeyValueStore>,
        notifier: Box<dyn Notifier>,
        ticker: Ticker,
        default_duration_ms: u64,
    ) -> Self {
        let duration_ms = clamp_duration(store::load_duration(
            store.as_ref(),
            default_duration_ms,
        ));
        let completed_cycles = store::load_completed_cycles(store.as_ref());
        tracing::debug!(duration_ms, completed_cycles, "restored timer state");

        Self {
            status: TimerStatus::Idle,
            duration_ms,
            remaining_ms: duration_ms,
            deadline_epoch_ms: None,
            completed_cycles,
            clock,
            notifier,
            store,
            ticker,
            on_complete: None,
        }
    }

    pub fn with_completion_callback(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles
    }

    pub fn deadline_epoch_ms(&self) -> Option<i64> {
        self.deadline_epoch_ms
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn is_tick_armed(&self) -> bool {
        self.ticker.is_armed()
    }

    /// Fraction of the session already elapsed, `0.0` for a zero duration.
    pub fn progress(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        1.0 - self.remaining_ms as f64 / self.duration_ms as f64
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            status: self.status,
            remaining_ms: self.remaining_ms,
            duration_ms: self.duration_ms,
            completed_cycles: self.completed_cycles,
            deadline_epoch_ms: self.deadline_epoch_ms,
            progress: self.progress(),
            display: format_remaining(self.remaining_ms),
        }
    }

    pub fn start(&mut self) {
        if self.status == TimerStatus::Running {
            return;
        }
        if self.remaining_ms == 0 {
            self.reset();
            return;
        }

        let deadline = i64::try_from(self.remaining_ms)
            .map_or(i64::MAX, |remaining| self.clock.now_ms().saturating_add(remaining));
        self.deadline_epoch_ms = Some(deadline);
        self.transition(TimerStatus::Running);
        self.ticker.arm();

        self.notifier.cancel_all();
        self.notifier.schedule(deadline);
    }

    pub fn pause(&mut self) {
        let Some(deadline) = self.deadline_epoch_ms.filter(|_| self.is_running()) else {
            return;
        };

        self.remaining_ms = self.remaining_until(deadline);
        self.deadline_epoch_ms = None;
        self.transition(TimerStatus::Paused);
        self.ticker.disarm();
        self.notifier.cancel_all();
    }

    pub fn reset(&mut self) {
        self.remaining_ms = self.duration_ms;
        self.deadline_epoch_ms = None;
        self.transition(TimerStatus::Idle);
        self.ticker.disarm();
        self.notifier.cancel_all();
    }

    /// Pauses a running timer, starts it otherwise.
    pub fn toggle(&mut self) {
        if self.is_running() {
            self.pause();
        } else {
            self.start();
        }
    }

    /// Returns `false` (and changes nothing) while running. Durations above
    /// [`LONGEST_DURATION_MS`] are clamped.
    pub fn set_duration(&mut self, duration_ms: u64) -> bool {
        if self.is_running() {
            tracing::debug!(duration_ms, "ignoring duration change while running");
            return false;
        }

        let duration_ms = clamp_duration(duration_ms);
        self.duration_ms = duration_ms;
        self.remaining_ms = duration_ms;
        self.transition(TimerStatus::Idle);
        store::save_duration(self.store.as_mut(), duration_ms);
        true
    }

    /// Recomputes remaining time from the deadline and completes the timer
    /// once it is due. Safe to call any number of times: completion leaves
    /// `Running`, so a second call after the deadline is a no-op.
    pub fn refresh(&mut self) -> Recompute {
        let Some(deadline) = self.deadline_epoch_ms.filter(|_| self.is_running()) else {
            return Recompute::NotRunning;
        };

        let remaining = deadline.saturating_sub(self.clock.now_ms());
        if remaining <= 0 {
            self.complete();
            return Recompute::Completed;
        }

        self.remaining_ms = (remaining as u64).min(self.duration_ms);
        Recompute::Ticking {
            remaining_ms: self.remaining_ms,
        }
    }

    /// Waits for the next tick of the running timer. Pending forever while
    /// the timer is not running.
    pub async fn next_tick(&mut self) {
        self.ticker.tick().await;
    }

    fn complete(&mut self) {
        self.remaining_ms = 0;
        self.deadline_epoch_ms = None;
        self.transition(TimerStatus::Completed);
        self.ticker.disarm();

        self.completed_cycles += 1;
        store::save_completed_cycles(self.store.as_mut(), self.completed_cycles);
        tracing::info!(
            completed_cycles = self.completed_cycles,
            "focus cycle completed"
        );

        let snapshot = self.snapshot();
        if let Some(callback) = self.on_complete.as_mut() {
            callback(&snapshot);
        }
    }

    fn remaining_until(&self, deadline: i64) -> u64 {
        let remaining = deadline.saturating_sub(self.clock.now_ms()).max(0) as u64;
        remaining.min(self.duration_ms)
    }

    fn transition(&mut self, next: TimerStatus) {
        if self.status != next {
            tracing::debug!(
                from = self.status.as_str(),
                to = next.as_str(),
                remaining_ms = self.remaining_ms,
                "timer transition"
            );
        }
        self.status = next;
    }
}

fn clamp_duration(duration_ms: u64) -> u64 {
    if duration_ms > LONGEST_DURATION_MS {
        tracing::warn!(duration_ms, "duration too long; clamping");
    }
    duration_ms.min(LONGEST_DURATION_MS)
}

/// `MM:SS`, rounding partial seconds up so the display never shows `00:00`
/// while time remains.
pub fn format_remaining(ms: u64) -> String {
    let total_secs = ms.div_ceil(1000);
    let m = total_secs / 60;
    let s = total_secs % 60;
    format!("{:02}:{:02}", m, s)
}

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, interval};

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
const MIN_TICK_INTERVAL_MS: u64 = 10;

/// The one repeating tick a running timer owns.
///
/// `arm` always drops any previous interval first, so at most one is ever
/// live no matter how often it is called.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    interval: Option<Interval>,
}

impl Ticker {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period: Duration::from_millis(period_ms.max(MIN_TICK_INTERVAL_MS)),
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Must be called from within a Tokio runtime.
    pub fn arm(&mut self) {
        if self.interval.take().is_some() {
            tracing::debug!("replacing armed tick interval");
        }
        let mut ticks = interval(self.period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.interval = Some(ticks);
    }

    pub fn disarm(&mut self) {
        self.interval = None;
    }

    /// Resolves on the next tick; never resolves while disarmed.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(ticks) => {
                ticks.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL_MS)
    }
}

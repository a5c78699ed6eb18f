use serde::Deserialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppPhase {
    Active,
    Inactive,
    Background,
}

/// Tracks the host's foreground state and reports only the transitions
/// that bring the app back to `Active`.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleWatcher {
    current: AppPhase,
}

impl LifecycleWatcher {
    pub fn new() -> Self {
        Self {
            current: AppPhase::Active,
        }
    }

    pub fn current(&self) -> AppPhase {
        self.current
    }

    /// Records `next` and returns `true` if the app just became active after
    /// being inactive or in the background.
    pub fn transition(&mut self, next: AppPhase) -> bool {
        let resumed = matches!(self.current, AppPhase::Inactive | AppPhase::Background)
            && next == AppPhase::Active;
        self.current = next;
        resumed
    }
}

impl Default for LifecycleWatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards `SIGCONT` (the process was stopped and is running again) as a
/// resume event.
#[cfg(unix)]
pub fn resume_signals() -> std::io::Result<mpsc::UnboundedReceiver<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigcont = signal(SignalKind::from_raw(libc::SIGCONT))?;
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while sigcont.recv().await.is_some() {
            tracing::debug!("received SIGCONT");
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

#[cfg(not(unix))]
pub fn resume_signals() -> std::io::Result<mpsc::UnboundedReceiver<()>> {
    let (_tx, rx) = mpsc::unbounded_channel();
    Ok(rx)
}

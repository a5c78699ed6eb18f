use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify_rust::Notification;
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::pomodoro::Clock;

const APP_NAME: &str = "Giro";
/// Longest single sleep while waiting for a deadline. The monotonic timer
/// stops during system suspend, so the wall clock is re-read at least this
/// often.
const DEADLINE_RECHECK: Duration = Duration::from_secs(1);

/// Fixed completion message shown when a focus cycle ends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

impl Default for NotificationContent {
    fn default() -> Self {
        Self {
            title: "Time's up! \u{1F389}".to_string(),
            body: "Your focus cycle is over. Time to rest!".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Undetermined,
    Granted,
    Denied,
}

/// Side channel for the single completion notification.
///
/// Both calls return immediately; whatever work they kick off happens in
/// the background and must never hold up a timer transition.
pub trait Notifier: Send {
    /// Arrange for the completion message to appear at `deadline_epoch_ms`.
    fn schedule(&mut self, deadline_epoch_ms: i64);
    /// Drop every pending notification, including schedules still in flight.
    fn cancel_all(&mut self);
}

/// Desktop notifications via the session's notification server.
///
/// Desktop servers cannot hold a notification for later delivery, so each
/// schedule is a task that waits for the deadline. Aborting the task is how
/// a pending notification gets cancelled.
pub struct DesktopNotifier {
    content: NotificationContent,
    permission: Arc<Mutex<Permission>>,
    clock: Arc<dyn Clock>,
    pending: Vec<JoinHandle<()>>,
}

impl DesktopNotifier {
    pub fn new(content: NotificationContent, enabled: bool, clock: Arc<dyn Clock>) -> Self {
        let permission = if enabled {
            Permission::Undetermined
        } else {
            Permission::Denied
        };
        Self {
            content,
            permission: Arc::new(Mutex::new(permission)),
            clock,
            pending: Vec::new(),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn schedule(&mut self, deadline_epoch_ms: i64) {
        self.pending.retain(|handle| !handle.is_finished());

        let content = self.content.clone();
        let permission = Arc::clone(&self.permission);
        let clock = Arc::clone(&self.clock);
        let handle = tokio::spawn(async move {
            if !ensure_permission(&permission).await {
                tracing::debug!("notification permission denied; skipping schedule");
                return;
            }

            wait_until_epoch(clock.as_ref(), deadline_epoch_ms).await;

            let shown = tokio::task::spawn_blocking(move || show(&content)).await;
            match shown {
                Ok(Ok(())) => tracing::debug!("completion notification shown"),
                Ok(Err(err)) => tracing::warn!("system notification failed: {err}"),
                Err(err) => tracing::warn!(%err, "notification task failed"),
            }
        });

        tracing::debug!(deadline_epoch_ms, "scheduled completion notification");
        self.pending.push(handle);
    }

    fn cancel_all(&mut self) {
        let cancelled = self.pending.len();
        for handle in self.pending.drain(..) {
            handle.abort();
        }
        if cancelled > 0 {
            tracing::debug!(cancelled, "cancelled pending notifications");
        }
    }
}

impl Drop for DesktopNotifier {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Sleeps in short steps until the wall clock reaches `deadline_epoch_ms`.
async fn wait_until_epoch(clock: &dyn Clock, deadline_epoch_ms: i64) {
    loop {
        let wait_ms = deadline_epoch_ms.saturating_sub(clock.now_ms());
        if wait_ms <= 0 {
            return;
        }
        let wait = Duration::from_millis(wait_ms as u64).min(DEADLINE_RECHECK);
        tokio::time::sleep(wait).await;
    }
}

async fn ensure_permission(permission: &Mutex<Permission>) -> bool {
    let current = match permission.lock() {
        Ok(guard) => *guard,
        Err(_) => return false,
    };

    let resolved = match current {
        Permission::Granted => return true,
        Permission::Denied => return false,
        Permission::Undetermined => request_permission().await,
    };

    if let Ok(mut guard) = permission.lock() {
        *guard = resolved;
    }
    resolved == Permission::Granted
}

/// A reachable notification server counts as a grant.
#[cfg(all(unix, not(target_os = "macos")))]
async fn request_permission() -> Permission {
    match tokio::task::spawn_blocking(notify_rust::get_server_information).await {
        Ok(Ok(info)) => {
            tracing::debug!(server = %info.name, "notification server available");
            Permission::Granted
        }
        Ok(Err(err)) => {
            tracing::warn!("no notification server; completion alerts disabled: {err}");
            Permission::Denied
        }
        Err(err) => {
            tracing::warn!(%err, "notification server probe failed");
            Permission::Denied
        }
    }
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
async fn request_permission() -> Permission {
    Permission::Granted
}

fn show(content: &NotificationContent) -> Result<(), notify_rust::error::Error> {
    Notification::new()
        .appname(APP_NAME)
        .summary(&content.title)
        .body(&content.body)
        .timeout(0) // No auto-dismiss
        .show()?;
    Ok(())
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierCall {
    Schedule(i64),
    CancelAll,
}

/// Test double that keeps every call and the set of pending deadlines.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<NotifierCall>>>,
    pending: Arc<Mutex<Vec<i64>>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pending(&self) -> Vec<i64> {
        self.pending.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn schedule(&mut self, deadline_epoch_ms: i64) {
        self.calls
            .lock()
            .unwrap()
            .push(NotifierCall::Schedule(deadline_epoch_ms));
        self.pending.lock().unwrap().push(deadline_epoch_ms);
    }

    fn cancel_all(&mut self) {
        self.calls.lock().unwrap().push(NotifierCall::CancelAll);
        self.pending.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pomodoro::clock::ManualClock;

    fn notifier(enabled: bool, clock: &ManualClock) -> DesktopNotifier {
        DesktopNotifier::new(
            NotificationContent::default(),
            enabled,
            Arc::new(clock.clone()),
        )
    }

    #[tokio::test]
    async fn denied_permission_skips_without_waiting_for_the_deadline() {
        let clock = ManualClock::at(0);
        let mut notifier = notifier(false, &clock);
        notifier.schedule(60 * 60_000);
        assert_eq!(notifier.pending.len(), 1);

        let task = notifier.pending.pop().unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("skipped schedule should end at once")
            .unwrap();
        assert_eq!(*notifier.permission.lock().unwrap(), Permission::Denied);
    }

    #[tokio::test]
    async fn denied_permission_is_not_requested_again() {
        let permission = Mutex::new(Permission::Denied);
        assert!(!ensure_permission(&permission).await);
        assert_eq!(*permission.lock().unwrap(), Permission::Denied);

        let permission = Mutex::new(Permission::Granted);
        assert!(ensure_permission(&permission).await);
    }

    #[tokio::test]
    async fn cancel_all_stops_an_in_flight_schedule() {
        let clock = ManualClock::at(0);
        let mut notifier = notifier(true, &clock);
        *notifier.permission.lock().unwrap() = Permission::Granted;
        notifier.schedule(60_000);
        let task = notifier.pending[0].abort_handle();

        // Waiting on a deadline a minute away.
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        notifier.cancel_all();
        assert!(notifier.pending.is_empty());
        for _ in 0..10 {
            if task.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_wakes_when_the_wall_clock_jumps_past_the_deadline() {
        let clock = ManualClock::at(0);
        let deadline = 25 * 60_000;
        let wall = clock.clone();
        let waiter = tokio::spawn(async move { wait_until_epoch(&wall, deadline).await });

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!waiter.is_finished());

        // Suspended through the deadline: wall time moved, monotonic time did not.
        clock.set(deadline + 1);
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("wait should notice the deadline passed")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn wait_holds_until_the_deadline() {
        let clock = ManualClock::at(0);
        let wall = clock.clone();
        let waiter = tokio::spawn(async move { wait_until_epoch(&wall, 10_000).await });

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!waiter.is_finished());

        clock.set(10_000);
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("wait should end at the deadline")
            .unwrap();
    }

    #[test]
    fn default_content_is_fixed_completion_message() {
        let content = NotificationContent::default();
        assert!(content.title.starts_with("Time's up!"));
        assert_eq!(content.body, "Your focus cycle is over. Time to rest!");
    }
}

use serde::Serialize;

use super::command::Command;
use crate::config::Preset;
use crate::dial::{CircularDial, DragUpdate};
use crate::lifecycle::{AppPhase, LifecycleWatcher};
use crate::pomodoro::{PomodoroTimer, Recompute, TimerSnapshot, TimerStatus};

/// Events pushed to UI collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    State(TimerSnapshot),
    Dial(DragUpdate),
    /// Haptic/audible tick: the dial crossed into a new whole minute.
    MinuteTick { minute: u64 },
    Completed { completed_cycles: u64 },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Reply(Vec<ServerMessage>),
    Quit,
}

/// Owns the timer and the controls around it, and is the only thing that
/// mutates them. Hosts feed it commands, ticks and resume events from a
/// single task.
pub struct Controller {
    timer: PomodoroTimer,
    dial: CircularDial,
    lifecycle: LifecycleWatcher,
    presets: Vec<Preset>,
}

impl Controller {
    pub fn new(timer: PomodoroTimer, dial: CircularDial, presets: Vec<Preset>) -> Self {
        let mut controller = Self {
            timer,
            dial,
            lifecycle: LifecycleWatcher::new(),
            presets,
        };
        controller.dial.sync(controller.timer.duration_ms());
        controller.sync_dial_lock();
        controller
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.timer.snapshot()
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn handle(&mut self, command: Command) -> Dispatch {
        tracing::debug!(?command, "handling command");
        let mut messages = Vec::new();

        match command {
            Command::Start => self.timer.start(),
            Command::Pause => self.timer.pause(),
            Command::Toggle => self.timer.toggle(),
            Command::Reset => self.timer.reset(),
            Command::SetDuration { ms } => self.set_duration(ms),
            Command::Preset { name } => match self.find_preset(&name) {
                Some(duration_ms) => self.set_duration(duration_ms),
                None => messages.push(ServerMessage::Error {
                    message: format!("no preset named {name:?}"),
                }),
            },
            Command::Drag { x, y } => self.drag(x, y, &mut messages),
            Command::Lifecycle { phase } => {
                if self.lifecycle.transition(phase) {
                    tracing::debug!("app became active; recomputing remaining time");
                    self.recompute(&mut messages);
                }
            }
            Command::Status => {}
            Command::Quit => return Dispatch::Quit,
        }

        self.sync_dial_lock();
        messages.push(ServerMessage::State(self.timer.snapshot()));
        Dispatch::Reply(messages)
    }

    /// The host resumed us after a stop; same path as a lifecycle message.
    pub fn resume(&mut self) -> Vec<ServerMessage> {
        self.lifecycle.transition(AppPhase::Background);
        match self.handle(Command::Lifecycle {
            phase: AppPhase::Active,
        }) {
            Dispatch::Reply(messages) => messages,
            Dispatch::Quit => Vec::new(),
        }
    }

    /// Resolves on the next tick of a running timer.
    pub async fn next_tick(&mut self) {
        self.timer.next_tick().await;
    }

    pub fn on_tick(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        self.recompute(&mut messages);
        self.sync_dial_lock();
        messages.push(ServerMessage::State(self.timer.snapshot()));
        messages
    }

    fn recompute(&mut self, messages: &mut Vec<ServerMessage>) {
        if self.timer.refresh() == Recompute::Completed {
            messages.push(ServerMessage::Completed {
                completed_cycles: self.timer.completed_cycles(),
            });
        }
    }

    fn set_duration(&mut self, duration_ms: u64) {
        if self.timer.set_duration(duration_ms) {
            self.dial.sync(self.timer.duration_ms());
        }
    }

    fn drag(&mut self, x: f64, y: f64, messages: &mut Vec<ServerMessage>) {
        let Some(update) = self.dial.drag(x, y) else {
            return;
        };
        if let Some(minute) = update.minute_crossed {
            messages.push(ServerMessage::MinuteTick { minute });
        }
        self.timer.set_duration(update.duration_ms);
        messages.push(ServerMessage::Dial(update));
    }

    /// Presets match by 1-based position or by label, ignoring case.
    fn find_preset(&self, name: &str) -> Option<u64> {
        let name = name.trim();
        if let Ok(index) = name.parse::<usize>() {
            return index
                .checked_sub(1)
                .and_then(|i| self.presets.get(i))
                .map(Preset::duration_ms);
        }
        self.presets
            .iter()
            .find(|preset| preset.label.eq_ignore_ascii_case(name))
            .map(Preset::duration_ms)
    }

    /// Gestures only ever set up a fresh session.
    fn sync_dial_lock(&mut self) {
        self.dial.set_disabled(self.timer.status() != TimerStatus::Idle);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::AppConfig;
    use crate::dial::DialGeometry;
    use crate::notify::RecordingNotifier;
    use crate::pomodoro::clock::ManualClock;
    use crate::pomodoro::{LONGEST_DURATION_MS, Ticker};
    use crate::store::MemoryStore;

    fn controller(duration_ms: u64) -> (Controller, ManualClock) {
        let config = AppConfig::default();
        let clock = ManualClock::at(0);
        let timer = PomodoroTimer::restore(
            Arc::new(clock.clone()),
            Box::new(MemoryStore::default()),
            Box::new(RecordingNotifier::default()),
            Ticker::new(config.tick_interval_ms),
            duration_ms,
        );
        let dial = CircularDial::new(config.dial, config.max_duration_ms, duration_ms);
        (Controller::new(timer, dial, config.presets), clock)
    }

    fn reply(dispatch: Dispatch) -> Vec<ServerMessage> {
        match dispatch {
            Dispatch::Reply(messages) => messages,
            Dispatch::Quit => panic!("unexpected quit"),
        }
    }

    fn last_state(messages: &[ServerMessage]) -> TimerSnapshot {
        match messages.last() {
            Some(ServerMessage::State(snapshot)) => snapshot.clone(),
            other => panic!("expected trailing state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resume_after_missed_ticks_completes_once() {
        let (mut controller, clock) = controller(1_000);
        controller.handle(Command::Start);

        clock.set(500);
        let state = last_state(&controller.on_tick());
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.remaining_ms, 500);

        controller.handle(Command::Lifecycle {
            phase: AppPhase::Background,
        });
        clock.set(1_200);
        let messages = reply(controller.handle(Command::Lifecycle {
            phase: AppPhase::Active,
        }));
        assert!(messages.contains(&ServerMessage::Completed {
            completed_cycles: 1
        }));
        let state = last_state(&messages);
        assert_eq!(state.status, TimerStatus::Completed);
        assert_eq!(state.remaining_ms, 0);

        // A tick racing in right after the resume changes nothing.
        let messages = controller.on_tick();
        assert_eq!(messages.len(), 1);
        assert_eq!(last_state(&messages).completed_cycles, 1);
    }

    #[tokio::test]
    async fn resume_signal_recomputes_running_timer() {
        let (mut controller, clock) = controller(10_000);
        controller.handle(Command::Start);
        clock.set(4_000);

        let state = last_state(&controller.resume());
        assert_eq!(state.remaining_ms, 6_000);
    }

    #[tokio::test]
    async fn active_to_active_does_not_recompute() {
        let (mut controller, clock) = controller(10_000);
        controller.handle(Command::Start);
        clock.set(4_000);

        let state = last_state(&reply(controller.handle(Command::Lifecycle {
            phase: AppPhase::Active,
        })));
        assert_eq!(state.remaining_ms, 10_000);
    }

    #[tokio::test]
    async fn drag_sets_duration_and_signals_minutes_when_idle() {
        let (mut controller, _clock) = controller(0);
        let geometry = DialGeometry::default();
        let center = geometry.center();

        let messages = reply(controller.handle(Command::Drag {
            x: center + geometry.radius,
            y: center,
        }));
        assert_eq!(messages[0], ServerMessage::MinuteTick { minute: 15 });
        assert!(matches!(messages[1], ServerMessage::Dial(_)));
        let state = last_state(&messages);
        assert_eq!(state.duration_ms, 900_000);
        assert_eq!(state.status, TimerStatus::Idle);
    }

    #[tokio::test]
    async fn drag_while_running_is_ignored() {
        let (mut controller, _clock) = controller(600_000);
        controller.handle(Command::Start);

        let messages = reply(controller.handle(Command::Drag { x: 0.0, y: 0.0 }));
        assert_eq!(messages.len(), 1);
        assert_eq!(last_state(&messages).duration_ms, 600_000);
    }

    #[tokio::test]
    async fn drag_keeps_a_paused_session() {
        let (mut controller, clock) = controller(1_500_000);
        controller.handle(Command::Start);
        clock.set(600_000);
        controller.handle(Command::Pause);

        let geometry = DialGeometry::default();
        let center = geometry.center();
        let messages = reply(controller.handle(Command::Drag {
            x: center + geometry.radius,
            y: center,
        }));
        assert_eq!(messages.len(), 1);
        let state = last_state(&messages);
        assert_eq!(state.status, TimerStatus::Paused);
        assert_eq!(state.remaining_ms, 900_000);
        assert_eq!(state.duration_ms, 1_500_000);

        // Presets still replace a paused session.
        let state = last_state(&reply(controller.handle(Command::Preset {
            name: "Review".to_string(),
        })));
        assert_eq!(state.status, TimerStatus::Idle);
        assert_eq!(state.duration_ms, 15 * 60_000);
    }

    #[tokio::test]
    async fn drag_after_completion_is_ignored_until_reset() {
        let (mut controller, clock) = controller(1_000);
        controller.handle(Command::Start);
        clock.set(1_000);
        controller.on_tick();

        let geometry = DialGeometry::default();
        let center = geometry.center();
        let drag = Command::Drag {
            x: center + geometry.radius,
            y: center,
        };
        let messages = reply(controller.handle(drag.clone()));
        assert_eq!(messages.len(), 1);
        assert_eq!(last_state(&messages).status, TimerStatus::Completed);

        controller.handle(Command::Reset);
        let state = last_state(&reply(controller.handle(drag)));
        assert_eq!(state.status, TimerStatus::Idle);
        assert_eq!(state.duration_ms, 900_000);
    }

    #[tokio::test]
    async fn huge_duration_runs_without_completing() {
        let (mut controller, clock) = controller(1_000);
        clock.set(1_700_000_000_000);
        controller.handle(Command::SetDuration { ms: u64::MAX });
        controller.handle(Command::Start);
        clock.advance(1);

        let messages = controller.on_tick();
        assert_eq!(messages.len(), 1);
        let state = last_state(&messages);
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.completed_cycles, 0);
        assert_eq!(state.duration_ms, LONGEST_DURATION_MS);

        controller.handle(Command::Reset);
        controller.handle(Command::SetDuration {
            ms: i64::MAX as u64,
        });
        let state = last_state(&reply(controller.handle(Command::Start)));
        assert_eq!(state.status, TimerStatus::Running);
    }

    #[tokio::test]
    async fn presets_select_by_position_or_label() {
        let (mut controller, _clock) = controller(600_000);

        let state = last_state(&reply(controller.handle(Command::Preset {
            name: "1".to_string(),
        })));
        assert_eq!(state.duration_ms, 15 * 60_000);

        let state = last_state(&reply(controller.handle(Command::Preset {
            name: "deep focus".to_string(),
        })));
        assert_eq!(state.duration_ms, 50 * 60_000);

        let messages = reply(controller.handle(Command::Preset {
            name: "0".to_string(),
        }));
        assert!(matches!(messages[0], ServerMessage::Error { .. }));
    }

    #[tokio::test]
    async fn presets_are_ignored_while_running() {
        let (mut controller, _clock) = controller(600_000);
        controller.handle(Command::Start);
        let state = last_state(&reply(controller.handle(Command::Preset {
            name: "Classic".to_string(),
        })));
        assert_eq!(state.duration_ms, 600_000);
        assert_eq!(state.status, TimerStatus::Running);
    }

    #[tokio::test]
    async fn quit_is_reported_to_the_host() {
        let (mut controller, _clock) = controller(600_000);
        assert_eq!(controller.handle(Command::Quit), Dispatch::Quit);
    }

    #[test]
    fn server_messages_serialize_with_type_tags() {
        let json = serde_json::to_string(&ServerMessage::MinuteTick { minute: 3 }).unwrap();
        assert_eq!(json, r#"{"type":"minute_tick","minute":3}"#);

        let json = serde_json::to_string(&ServerMessage::Error {
            message: "nope".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"error\""));
    }
}

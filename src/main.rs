use std::fs::OpenOptions;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use giro::config::{self, AppConfig};
use giro::control::{self, CommandError, Controller, Dispatch, ServerMessage};
use giro::dial::CircularDial;
use giro::error::AppResult;
use giro::notify::DesktopNotifier;
use giro::pomodoro::{
    self, Clock, CompletionCallback, PomodoroTimer, SystemClock, Ticker, TimerSnapshot,
    TimerStatus,
};
use giro::store::FileStore;
use giro::{lifecycle, ws};

const FALLBACK_STATE_FILE: &str = "giro-state.json";

#[derive(Debug, Default)]
struct CliArgs {
    daemon: bool,
    verbose: bool,
    log_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl CliArgs {
    fn parse(args: &[String]) -> Self {
        let value_after = |names: &[&str]| {
            args.iter()
                .position(|a| names.contains(&a.as_str()))
                .and_then(|pos| args.get(pos + 1))
                .map(PathBuf::from)
        };
        Self {
            daemon: args.iter().any(|a| a == "--daemon"),
            verbose: args.iter().any(|a| a == "--verbose" || a == "-v"),
            log_file: value_after(&["--log", "-l"]),
            config_file: value_after(&["--config", "-c"]),
        }
    }
}

/// Prints what changed since the last render, one line per event.
#[derive(Debug, Default)]
struct TerminalView {
    last_shown: Option<(TimerStatus, String)>,
}

impl TerminalView {
    fn render(&mut self, messages: &[ServerMessage], force: bool) {
        for message in messages {
            match message {
                ServerMessage::State(snapshot) => {
                    let shown = (snapshot.status, snapshot.display.clone());
                    if !force && self.last_shown.as_ref() == Some(&shown) {
                        continue;
                    }
                    println!(
                        "{} {} {}  (duration {}, focus cycles: {})",
                        snapshot.status.emoji(),
                        snapshot.display,
                        snapshot.status.as_str(),
                        pomodoro::format_remaining(snapshot.duration_ms),
                        snapshot.completed_cycles
                    );
                    self.last_shown = Some(shown);
                }
                ServerMessage::Dial(update) => {
                    println!(
                        "  dial -> {} ({:.0}%)",
                        pomodoro::format_remaining(update.duration_ms),
                        update.progress * 100.0
                    );
                }
                ServerMessage::MinuteTick { minute } => println!("  · {minute} min"),
                ServerMessage::Completed { completed_cycles } => {
                    println!(
                        "\n🔔 Focus cycle complete! Time to rest. ({completed_cycles} so far)"
                    );
                }
                ServerMessage::Error { message } => eprintln!("{message}"),
            }
        }
    }
}

fn default_data_path(file: &str) -> PathBuf {
    PathBuf::from(format!(
        "{}/.local/share/giro/{}",
        std::env::var("HOME").unwrap_or_else(|_| ".".to_string()),
        file
    ))
}

fn init_logging(args: &CliArgs) -> AppResult<PathBuf> {
    let path = args
        .log_file
        .clone()
        .unwrap_or_else(|| default_data_path("giro.log"));

    // Create log directory if needed
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,giro={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(path)
}

fn build_controller(config: &AppConfig, on_complete: CompletionCallback) -> Controller {
    let store = FileStore::with_default_path().unwrap_or_else(|err| {
        tracing::warn!(%err, "no home directory; keeping state in the working directory");
        FileStore::at(FALLBACK_STATE_FILE)
    });
    tracing::debug!(path = ?store.path(), "using state file");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier = DesktopNotifier::new(
        config.notification.content.clone(),
        config.notification.enabled,
        Arc::clone(&clock),
    );
    let timer = PomodoroTimer::restore(
        clock,
        Box::new(store),
        Box::new(notifier),
        Ticker::new(config.tick_interval_ms),
        config.default_duration_ms,
    )
    .with_completion_callback(on_complete);

    let dial = CircularDial::new(config.dial, config.max_duration_ms, timer.duration_ms());
    Controller::new(timer, dial, config.presets.clone())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args: Vec<String> = std::env::args().collect();
    let args = CliArgs::parse(&args);

    let log_path = init_logging(&args)?;
    let config = config::load_app_config(args.config_file.as_deref());
    tracing::info!(daemon = args.daemon, "giro starting");

    // Check if running in daemon mode (WebSocket server)
    if args.daemon {
        return run_daemon_mode(&config).await;
    }

    println!("🍅 Giro - Focus Timer");
    println!("======================================================");
    println!("Logging to: {}", log_path.display());
    run_interactive(&config).await
}

async fn run_interactive(config: &AppConfig) -> AppResult<()> {
    let on_complete: CompletionCallback = Box::new(|_snapshot: &TimerSnapshot| {
        // Terminal bell
        print!("\x07");
        let _ = std::io::stdout().flush();
    });
    let mut controller = build_controller(config, on_complete);

    let presets = controller
        .presets()
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}) {} {}m", i + 1, p.label, p.minutes))
        .collect::<Vec<_>>()
        .join("  ");
    println!("Presets: {presets}");
    println!(
        "Commands: start | pause | toggle | reset | set <25m> | preset <n|label> | drag <x> <y> | background | active | status | quit\n"
    );

    let mut view = TerminalView::default();
    view.render(&[ServerMessage::State(controller.snapshot())], true);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut resumes = lifecycle::resume_signals()?;

    loop {
        tokio::select! {
            _ = controller.next_tick() => {
                let messages = controller.on_tick();
                view.render(&messages, false);
            }
            Some(()) = resumes.recv() => {
                let messages = controller.resume();
                view.render(&messages, false);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match control::parse_line(&line) {
                    Ok(command) => match controller.handle(command) {
                        Dispatch::Reply(messages) => view.render(&messages, true),
                        Dispatch::Quit => break,
                    },
                    Err(CommandError::Empty) => {}
                    Err(err) => eprintln!("{err}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!(
        "\nFocus cycles completed: {}",
        controller.snapshot().completed_cycles
    );
    tracing::info!("giro stopped");
    Ok(())
}

/// Run in daemon mode - WebSocket server in front of the timer
async fn run_daemon_mode(config: &AppConfig) -> AppResult<()> {
    let on_complete: CompletionCallback = Box::new(|snapshot: &TimerSnapshot| {
        tracing::info!(
            completed_cycles = snapshot.completed_cycles,
            "completion delivered to clients"
        );
    });
    let mut controller = build_controller(config, on_complete);

    let ws_addr: SocketAddr = config.websocket_addr.parse()?;
    println!("🍅 Giro - Daemon Mode");
    println!("======================================================");
    println!("Running WebSocket server on ws://{ws_addr}");

    let (command_tx, mut command_rx) = ws::create_command_channel();
    let events = ws::create_event_channel();

    // Spawn WebSocket server
    let server_events = events.clone();
    tokio::spawn(async move {
        if let Err(e) = ws::start_websocket_server(ws_addr, command_tx, server_events).await {
            tracing::error!("WebSocket server error: {e}");
        }
    });

    let mut resumes = lifecycle::resume_signals()?;

    // Main loop: the only place the timer is touched
    loop {
        let messages = tokio::select! {
            _ = controller.next_tick() => controller.on_tick(),
            Some(()) = resumes.recv() => controller.resume(),
            Some(command) = command_rx.recv() => match controller.handle(command) {
                Dispatch::Reply(messages) => messages,
                Dispatch::Quit => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };

        for message in messages {
            // No subscribers just means no client is connected.
            let _ = events.send(message);
        }
    }

    tracing::info!("giro daemon stopped");
    Ok(())
}

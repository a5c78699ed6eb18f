use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dial::{DEFAULT_MAX_DURATION_MS, DialGeometry};
use crate::notify::NotificationContent;
use crate::pomodoro::DEFAULT_DURATION_MS;
use crate::pomodoro::ticker::DEFAULT_TICK_INTERVAL_MS;

const APP_DIR: &str = "giro";
const APP_CONFIG_FILE: &str = "config.json";
const DEFAULT_WEBSOCKET_ADDR: &str = "127.0.0.1:8765";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Preset {
    pub label: String,
    pub minutes: u64,
}

impl Preset {
    fn new(label: &str, minutes: u64) -> Self {
        Self {
            label: label.to_string(),
            minutes,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.minutes.saturating_mul(60 * 1000)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub content: NotificationContent,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            content: NotificationContent::default(),
        }
    }
}

/// Application-level settings from `config.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_duration_ms: u64,
    pub max_duration_ms: u64,
    pub tick_interval_ms: u64,
    pub presets: Vec<Preset>,
    pub notification: NotificationConfig,
    pub dial: DialGeometry,
    pub websocket_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: DEFAULT_DURATION_MS,
            max_duration_ms: DEFAULT_MAX_DURATION_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            presets: vec![
                Preset::new("Review", 15),
                Preset::new("Classic", 25),
                Preset::new("Deep Focus", 50),
            ],
            notification: NotificationConfig::default(),
            dial: DialGeometry::default(),
            websocket_addr: DEFAULT_WEBSOCKET_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    fn sanitized(mut self) -> Self {
        if self.max_duration_ms == 0 {
            tracing::warn!("max_duration_ms must be positive; using default");
            self.max_duration_ms = DEFAULT_MAX_DURATION_MS;
        }
        self
    }
}

/// Reads `explicit`, or `config.json` under the giro config directory.
/// Anything missing or unreadable yields the defaults.
pub fn load_app_config(explicit: Option<&Path>) -> AppConfig {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => config_path(
            std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            std::env::var_os("HOME").map(PathBuf::from),
        ),
    };
    match path {
        Some(path) => load_app_config_from(&path),
        None => {
            tracing::debug!("no config directory; using defaults");
            AppConfig::default()
        }
    }
}

/// `$XDG_CONFIG_HOME/giro/config.json`, else `~/.config/giro/config.json`.
fn config_path(xdg_config_home: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    let root = xdg_config_home
        .filter(|dir| !dir.as_os_str().is_empty())
        .or_else(|| home.map(|home| home.join(".config")))?;
    Some(root.join(APP_DIR).join(APP_CONFIG_FILE))
}

fn load_app_config_from(path: &Path) -> AppConfig {
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str::<AppConfig>(&contents)
            .map(AppConfig::sanitized)
            .unwrap_or_else(|err| {
                tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
                AppConfig::default()
            }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

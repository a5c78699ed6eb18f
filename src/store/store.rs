use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const KEY_DURATION: &str = "duration";
pub const KEY_FOCUS_COUNT: &str = "focus_count";

const APP_DATA_DIR: &str = ".local/share/giro";
const STATE_FILE: &str = "state.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("missing HOME environment variable")]
    MissingHomeDirectory,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed state file: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(test)]
    #[error("store unavailable")]
    Unavailable,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// String key-value persistence for the handful of scalars the timer keeps.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> StoreResult<()>;
}

/// Flat JSON object on disk, read on every `get` and rewritten on every `set`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn with_default_path() -> StoreResult<Self> {
        let home = std::env::var("HOME").map_err(|_| StoreError::MissingHomeDirectory)?;
        let mut path = PathBuf::from(home);
        path.push(APP_DATA_DIR);
        path.push(STATE_FILE);
        Ok(Self::at(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> StoreResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        // A corrupt file is replaced rather than blocking every later write.
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

pub fn load_duration(store: &dyn KeyValueStore, default_ms: u64) -> u64 {
    load_u64(store, KEY_DURATION).unwrap_or(default_ms)
}

pub fn load_completed_cycles(store: &dyn KeyValueStore) -> u64 {
    load_u64(store, KEY_FOCUS_COUNT).unwrap_or(0)
}

pub fn save_duration(store: &mut dyn KeyValueStore, duration_ms: u64) {
    save_u64(store, KEY_DURATION, duration_ms);
}

pub fn save_completed_cycles(store: &mut dyn KeyValueStore, count: u64) {
    save_u64(store, KEY_FOCUS_COUNT, count);
}

fn load_u64(store: &dyn KeyValueStore, key: &str) -> Option<u64> {
    match store.get(key) {
        Ok(Some(raw)) => match raw.trim().parse::<u64>() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, raw = %raw, %err, "ignoring unparsable persisted value");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(key, %err, "failed to read persisted value; using default");
            None
        }
    }
}

fn save_u64(store: &mut dyn KeyValueStore, key: &str, value: u64) {
    if let Err(err) = store.set(key, &value.to_string()) {
        tracing::warn!(key, value, %err, "failed to persist value");
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: std::sync::Arc<std::sync::Mutex<BTreeMap<String, String>>>,
    failing: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_entry(self, key: &str, value: &str) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn entry(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        Ok(self.entry(key))
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

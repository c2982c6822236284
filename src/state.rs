//! Persisted charm bookkeeping

use crate::error::{CharmError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Name of the event lock file inside the state directory
pub const EVENT_LOCK_FILE: &str = "event.lock";

/// State carried across events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharmState {
    /// Last docker root seen in a config change
    #[serde(default)]
    pub docker_root: Option<PathBuf>,
}

/// Persistence for [`CharmState`]
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<CharmState>;
    fn save(&mut self, state: &CharmState) -> Result<()>;
}

/// State store backed by a JSON file
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<CharmState> {
        if !self.path.exists() {
            return Ok(CharmState::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&mut self, state: &CharmState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(state)?)?;
        Ok(())
    }
}

/// Exclusive claim on the state directory for the duration of one event
///
/// Hook processes run separately, so the in-process guard in the reconciler
/// cannot see them. The lock file is created with `create_new` and removed
/// when the lock is dropped. A process killed mid-event leaves the file
/// behind; it has to be removed by hand.
#[derive(Debug)]
pub struct EventLock {
    path: PathBuf,
}

impl EventLock {
    /// Take the lock, failing with [`CharmError::Busy`] if it is held
    pub fn acquire(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir)?;
        let path = state_dir.join(EVENT_LOCK_FILE);

        let mut file = match OpenOptions::new().create_new(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::warn!("{} is held by another event", path.display());
                return Err(CharmError::Busy);
            }
            Err(e) => return Err(e.into()),
        };
        let lock = Self { path };
        writeln!(file, "{}", std::process::id())?;
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EventLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

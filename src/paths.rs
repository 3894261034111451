//! Filesystem layout shared by the daemon, the CLI client and trigger
//! processes.
//!
//! Every process derives its paths from the same state directory so a
//! trigger process spawned by one daemon instance finds the record that
//! instance wrote, even after the daemon is gone.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

// ============================================================================
// Constants
// ============================================================================

/// State directory name under the home directory
const STATE_DIR_NAME: &str = ".pomodoro-alarm";

const SOCKET_FILE: &str = "pomodoro.sock";
const DEADLINE_FILE: &str = "deadline.json";
const DEADLINE_LOCK_FILE: &str = "deadline.lock";
const ACTIVE_ALARM_FILE: &str = "alarm.pid";

// ============================================================================
// StatePaths
// ============================================================================

/// Resolved locations of the runtime state files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    /// Creates paths rooted at an explicit state directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the default state directory (`~/.pomodoro-alarm`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().context("Could not determine the home directory")?;
        Ok(Self::new(home.join(STATE_DIR_NAME)))
    }

    /// Uses `root` when given, the default location otherwise.
    pub fn resolve(root: Option<PathBuf>) -> Result<Self> {
        match root {
            Some(root) => Ok(Self::new(root)),
            None => Self::default_location(),
        }
    }

    /// Creates the state directory if it does not exist.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// State directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Unix socket the daemon listens on.
    pub fn socket(&self) -> PathBuf {
        self.root.join(SOCKET_FILE)
    }

    /// Persisted pending deadline.
    pub fn deadline_record(&self) -> PathBuf {
        self.root.join(DEADLINE_FILE)
    }

    /// Advisory lock guarding the deadline record.
    pub fn deadline_lock(&self) -> PathBuf {
        self.root.join(DEADLINE_LOCK_FILE)
    }

    /// PID file of a trigger process that is currently ringing.
    pub fn active_alarm(&self) -> PathBuf {
        self.root.join(ACTIVE_ALARM_FILE)
    }
}

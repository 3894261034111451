//! Persisted pending-deadline record.
//!
//! The record is the only state a trigger process shares with the daemon
//! that armed it. Every read-modify-write holds an exclusive advisory lock
//! on a sibling lock file, and writes go through a temp file plus rename so
//! readers never observe a partial record.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::paths::StatePaths;
use crate::types::{AlarmRequest, IntervalKind};

use super::error::DeadlineError;

// ============================================================================
// PendingDeadline
// ============================================================================

/// An armed deadline as persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDeadline {
    /// Identifies the trigger process allowed to consume this record
    pub token: Uuid,
    /// Absolute wall-clock time the alarm is due
    pub fires_at: DateTime<Utc>,
    /// Kind of interval that ends at `fires_at`
    pub phase_at_expiry: IntervalKind,
    /// Selected alarm sound at arm time
    pub sound_ref: Option<String>,
    /// When the deadline was armed
    pub armed_at: DateTime<Utc>,
}

impl PendingDeadline {
    /// Creates a record for a freshly armed deadline.
    pub fn new(token: Uuid, fires_at: DateTime<Utc>, request: &AlarmRequest) -> Self {
        Self {
            token,
            fires_at,
            phase_at_expiry: request.phase_at_expiry,
            sound_ref: request.sound_ref.clone(),
            armed_at: Utc::now(),
        }
    }

    /// Returns the alarm payload carried by this record.
    pub fn request(&self) -> AlarmRequest {
        AlarmRequest::new(self.phase_at_expiry, self.sound_ref.clone())
    }

    /// Returns true once `now` has reached the fire time.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.fires_at
    }
}

// ============================================================================
// DeadlineStore
// ============================================================================

/// File-backed store holding at most one pending deadline.
#[derive(Debug, Clone)]
pub struct DeadlineStore {
    record_path: PathBuf,
    lock_path: PathBuf,
}

impl DeadlineStore {
    /// Creates a store inside the given state directory.
    pub fn new(paths: &StatePaths) -> Self {
        Self {
            record_path: paths.deadline_record(),
            lock_path: paths.deadline_lock(),
        }
    }

    /// Path of the record file.
    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    /// Reads the current record, if any.
    ///
    /// Does not take the lock: writes are atomic renames, so a reader sees
    /// either the old or the new record.
    pub fn load(&self) -> Result<Option<PendingDeadline>, DeadlineError> {
        match std::fs::read(&self.record_path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DeadlineError::from_io(e)),
        }
    }

    /// Replaces whatever record is stored with `record`.
    pub fn replace(&self, record: &PendingDeadline) -> Result<(), DeadlineError> {
        self.with_lock(|| self.write_atomic(record))
    }

    /// Removes the record if it still carries `token`.
    ///
    /// Returns false when the record is absent or belongs to another arm.
    pub fn clear_if(&self, token: Uuid) -> Result<bool, DeadlineError> {
        self.with_lock(|| Ok(self.take_matching(token)?.is_some()))
    }

    /// Removes and returns the record if it still carries `token`.
    ///
    /// Exactly one caller can claim a given record.
    pub fn claim(&self, token: Uuid) -> Result<Option<PendingDeadline>, DeadlineError> {
        self.with_lock(|| self.take_matching(token))
    }

    fn take_matching(&self, token: Uuid) -> Result<Option<PendingDeadline>, DeadlineError> {
        match self.load()? {
            Some(record) if record.token == token => {
                match std::fs::remove_file(&self.record_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(DeadlineError::from_io(e)),
                }
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }

    fn write_atomic(&self, record: &PendingDeadline) -> Result<(), DeadlineError> {
        let dir = self.parent_dir();
        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, record)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(&self.record_path)
            .map_err(|e| DeadlineError::from_io(e.error))?;
        Ok(())
    }

    fn with_lock<T>(
        &self,
        op: impl FnOnce() -> Result<T, DeadlineError>,
    ) -> Result<T, DeadlineError> {
        std::fs::create_dir_all(self.parent_dir())?;

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        FileExt::lock_exclusive(&lock_file)?;

        let result = op();
        release(&lock_file);
        result
    }

    fn parent_dir(&self) -> &Path {
        self.record_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
    }
}

fn release(lock_file: &File) {
    if let Err(e) = FileExt::unlock(lock_file) {
        tracing::debug!("Failed to release deadline lock: {}", e);
    }
}

// ============================================================================
// Tests
// ============================================================================

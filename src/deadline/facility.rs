//! Durable wall-clock trigger facilities.
//!
//! A facility registers "run the alarm at this instant" with something that
//! outlives the daemon. On a desktop host that is a detached trigger process
//! reading a persisted record; tests use [`MockTriggerFacility`].

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::paths::StatePaths;
use crate::types::AlarmRequest;

use super::error::DeadlineError;
use super::store::{DeadlineStore, PendingDeadline};

// ============================================================================
// TriggerToken
// ============================================================================

/// Identifies one registered trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerToken(Uuid);

impl TriggerToken {
    /// Generates a fresh token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing id.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying id.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TriggerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// TriggerFacility
// ============================================================================

/// Host facility for deferred callbacks that survive process death.
///
/// `schedule_at` returns only once the trigger is registered. Delivery may be
/// late but never early.
pub trait TriggerFacility: Send + Sync {
    /// Registers a trigger carrying `request` for `fires_at`.
    fn schedule_at(
        &self,
        fires_at: DateTime<Utc>,
        request: &AlarmRequest,
    ) -> Result<TriggerToken, DeadlineError>;

    /// Cancels a trigger. Cancelling a stale token is a no-op.
    fn cancel(&self, token: &TriggerToken) -> Result<(), DeadlineError>;
}

// ============================================================================
// SpawnTriggerFacility
// ============================================================================

/// Persists the deadline and spawns a detached `fire` process for it.
pub struct SpawnTriggerFacility {
    paths: StatePaths,
    store: DeadlineStore,
    program: Option<PathBuf>,
}

impl SpawnTriggerFacility {
    /// Creates a facility that re-executes the current binary.
    pub fn new(paths: StatePaths) -> Self {
        let store = DeadlineStore::new(&paths);
        Self {
            paths,
            store,
            program: None,
        }
    }

    /// Overrides the program spawned as the trigger process.
    pub fn with_program(mut self, program: PathBuf) -> Self {
        self.program = Some(program);
        self
    }

    /// Returns the backing store.
    pub fn store(&self) -> &DeadlineStore {
        &self.store
    }

    fn program(&self) -> Result<PathBuf, DeadlineError> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => std::env::current_exe().map_err(DeadlineError::from_spawn),
        }
    }

    fn spawn_trigger(&self, token: TriggerToken) -> Result<(), DeadlineError> {
        let mut command = Command::new(self.program()?);
        command
            .arg("--state-dir")
            .arg(self.paths.root())
            .arg("fire")
            .arg("--token")
            .arg(token.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Keep the trigger alive when the daemon's process group is signalled.
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(DeadlineError::from_spawn)?;
        let pid = child.id();

        // Reap the child so finished triggers do not linger as zombies.
        std::thread::spawn(move || match child.wait() {
            Ok(status) => tracing::debug!("Trigger process {} exited: {}", pid, status),
            Err(e) => tracing::debug!("Failed to wait for trigger process {}: {}", pid, e),
        });

        tracing::debug!("Spawned trigger process {} for {}", pid, token);
        Ok(())
    }
}

impl TriggerFacility for SpawnTriggerFacility {
    fn schedule_at(
        &self,
        fires_at: DateTime<Utc>,
        request: &AlarmRequest,
    ) -> Result<TriggerToken, DeadlineError> {
        let token = TriggerToken::generate();
        let record = PendingDeadline::new(token.as_uuid(), fires_at, request);
        self.store.replace(&record)?;

        if let Err(e) = self.spawn_trigger(token) {
            // A record without a trigger would never fire; leave nothing behind.
            if let Err(clear_err) = self.store.clear_if(token.as_uuid()) {
                tracing::warn!("Failed to remove orphaned deadline record: {}", clear_err);
            }
            return Err(e);
        }

        Ok(token)
    }

    fn cancel(&self, token: &TriggerToken) -> Result<(), DeadlineError> {
        if self.store.clear_if(token.as_uuid())? {
            tracing::debug!("Cancelled deadline {}", token);
        }
        Ok(())
    }
}

// ============================================================================
// MockTriggerFacility
// ============================================================================

/// A registered trigger as seen by [`MockTriggerFacility`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTrigger {
    /// Token handed back to the scheduler
    pub token: TriggerToken,
    /// Requested fire time
    pub fires_at: DateTime<Utc>,
    /// Payload
    pub request: AlarmRequest,
}

/// In-memory trigger facility for testing.
#[derive(Debug, Default)]
pub struct MockTriggerFacility {
    scheduled: Mutex<Vec<ScheduledTrigger>>,
    cancelled: Mutex<Vec<TriggerToken>>,
    deny_permission: AtomicBool,
}

impl MockTriggerFacility {
    /// Creates a new mock facility.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `schedule_at` calls fail with a permission error.
    pub fn set_deny_permission(&self, deny: bool) {
        self.deny_permission.store(deny, Ordering::SeqCst);
    }

    /// Returns every trigger ever scheduled, in order.
    pub fn scheduled(&self) -> Vec<ScheduledTrigger> {
        self.scheduled
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Returns every cancelled token, in order.
    pub fn cancelled(&self) -> Vec<TriggerToken> {
        self.cancelled
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Returns the triggers scheduled and not yet cancelled.
    pub fn outstanding(&self) -> Vec<ScheduledTrigger> {
        let cancelled = self.cancelled();
        self.scheduled()
            .into_iter()
            .filter(|t| !cancelled.contains(&t.token))
            .collect()
    }
}

impl TriggerFacility for MockTriggerFacility {
    fn schedule_at(
        &self,
        fires_at: DateTime<Utc>,
        request: &AlarmRequest,
    ) -> Result<TriggerToken, DeadlineError> {
        if self.deny_permission.load(Ordering::SeqCst) {
            return Err(DeadlineError::PermissionDenied(
                "exact alarms are not allowed".to_string(),
            ));
        }

        let token = TriggerToken::generate();
        if let Ok(mut scheduled) = self.scheduled.lock() {
            scheduled.push(ScheduledTrigger {
                token,
                fires_at,
                request: request.clone(),
            });
        }
        Ok(token)
    }

    fn cancel(&self, token: &TriggerToken) -> Result<(), DeadlineError> {
        if let Ok(mut cancelled) = self.cancelled.lock() {
            cancelled.push(*token);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Deadline scheduling error types.

use std::io;

use thiserror::Error;

/// Errors that can occur while arming or cancelling a durable deadline.
#[derive(Debug, Error)]
pub enum DeadlineError {
    /// The host refused to let us persist the deadline or spawn its trigger.
    #[error("Permission denied while scheduling the alarm: {0}")]
    PermissionDenied(String),

    /// Reading or writing the deadline record failed.
    #[error("Deadline record I/O failed: {0}")]
    Io(#[source] io::Error),

    /// The deadline record could not be encoded or decoded.
    #[error("Deadline record is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The trigger process could not be started.
    #[error("Failed to start the trigger process: {0}")]
    Spawn(String),

    /// The requested duration does not fit a wall-clock timestamp.
    #[error("Deadline is out of range")]
    OutOfRange,
}

impl DeadlineError {
    /// Classifies an I/O error, keeping permission failures distinct.
    pub fn from_io(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied(err.to_string())
        } else {
            Self::Io(err)
        }
    }

    /// Classifies a failure to spawn the trigger process.
    pub fn from_spawn(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied(err.to_string())
        } else {
            Self::Spawn(err.to_string())
        }
    }

    /// Returns true if the durable guarantee was lost because of permissions.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Returns a user-facing suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => {
                "Check that the state directory is writable; alarms only fire while the daemon runs"
            }
            Self::Io(_) | Self::Serialization(_) => "Remove the deadline record and restart the daemon",
            Self::Spawn(_) => "Check that the pomodoro-alarm binary is still installed",
            Self::OutOfRange => "Configure a shorter interval",
        }
    }
}

impl From<io::Error> for DeadlineError {
    fn from(err: io::Error) -> Self {
        Self::from_io(err)
    }
}

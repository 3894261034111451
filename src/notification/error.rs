//! Notification system error types.

use thiserror::Error;

/// Errors that can occur in the notification system.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Failed to send a notification.
    #[error("Failed to send notification: {0}")]
    SendFailed(String),

    /// Failed to close a notification.
    #[error("Failed to close notification: {0}")]
    CloseFailed(String),

    /// No notification server is reachable.
    #[error("Notification service is not available")]
    NotAvailable,
}

impl NotificationError {
    /// Returns true if the notification server itself is missing.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotAvailable)
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::SendFailed(_) | Self::CloseFailed(_) => {
                "Check that a notification daemon is running"
            }
            Self::NotAvailable => "Run inside a desktop session with a notification service",
        }
    }
}

impl From<notify_rust::error::Error> for NotificationError {
    fn from(err: notify_rust::error::Error) -> Self {
        Self::SendFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NotificationError::SendFailed("bus closed".to_string());
        assert!(err.to_string().contains("bus closed"));

        assert_eq!(
            NotificationError::NotAvailable.to_string(),
            "Notification service is not available"
        );
    }

    #[test]
    fn test_is_unavailable() {
        assert!(NotificationError::NotAvailable.is_unavailable());
        assert!(!NotificationError::SendFailed("x".into()).is_unavailable());
    }

    #[test]
    fn test_suggestion() {
        assert!(NotificationError::SendFailed("x".into())
            .suggestion()
            .contains("notification daemon"));
    }
}

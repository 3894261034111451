//! Alarm notification text.

use crate::types::IntervalKind;

/// Application name shown by the notification server.
pub const APP_NAME: &str = "Pomodoro Alarm";

/// Identifier of the action that silences the alarm.
pub const STOP_ACTION_ID: &str = "stop";

/// Label of the stop action button.
pub const STOP_ACTION_LABEL: &str = "Stop alarm";

/// What an alarm notification shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmContent {
    /// Notification title
    pub title: String,
    /// Notification body
    pub body: String,
    /// Label of the stop button
    pub stop_label: String,
}

impl AlarmContent {
    /// Builds the text for the end of an interval of the given kind.
    #[must_use]
    pub fn for_kind(kind: IntervalKind) -> Self {
        let (title, body) = match kind {
            IntervalKind::Work => (
                "Work Session Over!",
                "Work time is over! You can now take a break.",
            ),
            IntervalKind::Break => (
                "Break Over!",
                "Break time is over! You need to get back to work.",
            ),
        };

        Self {
            title: title.to_string(),
            body: body.to_string(),
            stop_label: STOP_ACTION_LABEL.to_string(),
        }
    }
}

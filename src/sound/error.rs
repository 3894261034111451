//! Sound system error types.
//!
//! None of these reach the timer: playback failures are logged and the
//! alarm degrades to silence or to the built-in tone.

use thiserror::Error;

/// Errors that can occur in the sound playback system.
#[derive(Debug, Error)]
pub enum SoundError {
    /// Audio device is not available (e.g., no speakers connected).
    #[error("Audio device is not available: {0}")]
    DeviceNotAvailable(String),

    /// Sound file was not found at the specified path.
    #[error("Sound file not found: {0}")]
    FileNotFound(String),

    /// Failed to decode the audio file.
    #[error("Failed to decode sound file: {0}")]
    DecodeError(String),

    /// The sound reference is not a path or `file://` URI.
    #[error("Unsupported sound reference: {0}")]
    InvalidUri(String),

    /// Failed to create the audio output stream.
    #[error("Failed to create audio stream: {0}")]
    StreamError(String),

    /// Generic sound playback error.
    #[error("Sound playback error: {0}")]
    PlaybackError(String),
}

impl SoundError {
    /// Returns true if this error is related to device availability.
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::DeviceNotAvailable(_) | Self::StreamError(_))
    }

    /// Returns true if the selected resource itself is unusable.
    ///
    /// Such errors are recovered by substituting the default alarm.
    #[must_use]
    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::DecodeError(_) | Self::InvalidUri(_)
        )
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::DeviceNotAvailable(_) => "Connect an audio output device",
            Self::FileNotFound(_) | Self::InvalidUri(_) => {
                "Select an existing sound file; the default alarm is used meanwhile"
            }
            Self::DecodeError(_) => "The sound file may be corrupt or in an unsupported format",
            Self::StreamError(_) => "Check the audio settings",
            Self::PlaybackError(_) => "Restart the daemon",
        }
    }
}

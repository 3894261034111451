//! Core data types for the Pomodoro alarm.
//!
//! This module defines the data structures used for:
//! - Cycle phases and the interval kind reported when an interval ends
//! - Cycle configuration with validation
//! - Cycle state owned by the timer engine
//! - The alarm payload carried by durable triggers
//! - IPC request/response serialization

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// CyclePhase
// ============================================================================

/// Represents the phase of the Pomodoro cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// No cycle has been started (or the cycle was reset)
    #[default]
    Idle,
    /// Currently in a work interval
    Work,
    /// Currently in a short break
    Break,
    /// Currently in a long break
    LongBreak,
}

impl CyclePhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Work => "work",
            CyclePhase::Break => "break",
            CyclePhase::LongBreak => "long_break",
        }
    }

    /// Returns the interval kind an alarm for this phase announces.
    ///
    /// Both break flavours end with the same "break over" alarm.
    pub fn interval_kind(&self) -> Option<IntervalKind> {
        match self {
            CyclePhase::Idle => None,
            CyclePhase::Work => Some(IntervalKind::Work),
            CyclePhase::Break | CyclePhase::LongBreak => Some(IntervalKind::Break),
        }
    }
}

// ============================================================================
// IntervalKind
// ============================================================================

/// The kind of interval whose end an alarm announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    /// A work interval ended
    Work,
    /// A short or long break ended
    Break,
}

impl IntervalKind {
    /// Returns true for the end of a work interval.
    pub fn is_work(&self) -> bool {
        matches!(self, IntervalKind::Work)
    }
}

// ============================================================================
// ConfigError
// ============================================================================

/// Errors raised when validating a cycle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A configured duration or cycle count was not positive.
    #[error("{field} must be positive")]
    InvalidDuration {
        /// Name of the rejected field
        field: &'static str,
    },
}

// ============================================================================
// CycleConfig
// ============================================================================

/// Durations and cycle count driving the Pomodoro cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleConfig {
    work: Duration,
    short_break: Duration,
    long_break: Duration,
    cycles_before_long_break: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            work: minutes(25),
            short_break: minutes(5),
            long_break: minutes(15),
            cycles_before_long_break: 4,
        }
    }
}

impl CycleConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDuration` if any duration is zero or
    /// the cycle count is zero. A zero-length interval would otherwise
    /// complete on its first tick and spin through transitions.
    pub fn new(
        work: Duration,
        short_break: Duration,
        long_break: Duration,
        cycles_before_long_break: u32,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            work,
            short_break,
            long_break,
            cycles_before_long_break,
        };
        config.validate()?;
        Ok(config)
    }

    /// Creates a validated configuration from whole minutes.
    pub fn from_minutes(
        work: u32,
        short_break: u32,
        long_break: u32,
        cycles_before_long_break: u32,
    ) -> Result<Self, ConfigError> {
        Self::new(
            minutes(work),
            minutes(short_break),
            minutes(long_break),
            cycles_before_long_break,
        )
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.work.is_zero() {
            return Err(ConfigError::InvalidDuration { field: "work" });
        }
        if self.short_break.is_zero() {
            return Err(ConfigError::InvalidDuration { field: "break" });
        }
        if self.long_break.is_zero() {
            return Err(ConfigError::InvalidDuration {
                field: "long break",
            });
        }
        if self.cycles_before_long_break == 0 {
            return Err(ConfigError::InvalidDuration { field: "cycles" });
        }
        Ok(())
    }

    /// Work interval length.
    pub fn work(&self) -> Duration {
        self.work
    }

    /// Short break length.
    pub fn short_break(&self) -> Duration {
        self.short_break
    }

    /// Long break length.
    pub fn long_break(&self) -> Duration {
        self.long_break
    }

    /// Number of work/break cycles before a long break.
    pub fn cycles_before_long_break(&self) -> u32 {
        self.cycles_before_long_break
    }

    /// Returns the interval length for a phase (zero for `Idle`).
    pub fn duration_for(&self, phase: CyclePhase) -> Duration {
        match phase {
            CyclePhase::Idle => Duration::ZERO,
            CyclePhase::Work => self.work,
            CyclePhase::Break => self.short_break,
            CyclePhase::LongBreak => self.long_break,
        }
    }
}

fn minutes(value: u32) -> Duration {
    Duration::from_secs(u64::from(value) * 60)
}

// ============================================================================
// CycleState
// ============================================================================

/// Observable state of the Pomodoro cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleState {
    /// Current phase
    pub phase: CyclePhase,
    /// Work/break pairs completed since the last long break
    pub cycle_count: u32,
    /// Time left in the current interval (frozen while paused)
    pub remaining: Duration,
    /// Whether the countdown is ticking
    pub running: bool,
    /// Whether a cycle has been started and not reset
    pub cycle_active: bool,
    /// Whether a durable deadline backs the running interval
    pub durable: bool,
}

impl CycleState {
    /// Creates an idle state showing a full work interval.
    pub fn idle(config: &CycleConfig) -> Self {
        Self {
            phase: CyclePhase::Idle,
            cycle_count: 0,
            remaining: config.work(),
            running: false,
            cycle_active: false,
            durable: false,
        }
    }

    /// Returns true if the cycle was started and is currently paused.
    pub fn is_paused(&self) -> bool {
        self.cycle_active && !self.running
    }
}

// ============================================================================
// AlarmRequest
// ============================================================================

/// Payload handed to the background alarm task.
///
/// This is the only data a durable trigger carries from the process that
/// armed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRequest {
    /// Selected sound resource (None = default alarm)
    #[serde(rename = "soundRef", skip_serializing_if = "Option::is_none")]
    pub sound_ref: Option<String>,
    /// Kind of interval that ended
    #[serde(rename = "phaseAtExpiry")]
    pub phase_at_expiry: IntervalKind,
}

impl AlarmRequest {
    /// Creates a new alarm request.
    pub fn new(phase_at_expiry: IntervalKind, sound_ref: Option<String>) -> Self {
        Self {
            sound_ref,
            phase_at_expiry,
        }
    }

    /// Returns true if the alarm announces the end of a work interval.
    pub fn phase_is_work(&self) -> bool {
        self.phase_at_expiry.is_work()
    }
}

// ============================================================================
// IPC Types
// ============================================================================

/// Raw field values for the configure command.
///
/// Values are kept as text so malformed input can be reverted to the last
/// known-good value instead of being rejected wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigureParams {
    /// Work duration in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work: Option<String>,
    /// Break duration in minutes
    #[serde(rename = "break", skip_serializing_if = "Option::is_none")]
    pub break_time: Option<String>,
    /// Long break duration in minutes
    #[serde(rename = "longBreak", skip_serializing_if = "Option::is_none")]
    pub long_break: Option<String>,
    /// Cycles before a long break
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles: Option<String>,
}

impl ConfigureParams {
    /// Returns true if no field was provided.
    pub fn is_empty(&self) -> bool {
        self.work.is_none()
            && self.break_time.is_none()
            && self.long_break.is_none()
            && self.cycles.is_none()
    }
}

/// IPC request from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum IpcRequest {
    /// Start the cycle, or resume a paused one
    Start,
    /// Pause the running interval
    Pause,
    /// Reset the cycle to idle
    Reset,
    /// Query the current status
    Status,
    /// Update durations and cycle count
    Configure {
        /// Raw field values
        #[serde(flatten)]
        params: ConfigureParams,
    },
    /// Select the alarm sound
    SelectSound {
        /// Sound path or `file://` URI (None = default)
        #[serde(skip_serializing_if = "Option::is_none")]
        uri: Option<String>,
    },
    /// Play the selected sound once
    PreviewSound,
    /// Stop any ringing alarm
    StopAlarm,
    /// Report whether a foreground client is attached
    SetVisibility {
        /// True while a client is watching
        foreground: bool,
    },
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    /// Current phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Remaining seconds
    #[serde(rename = "remainingSeconds", skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
    /// Cycles completed since the last long break
    #[serde(rename = "cycleCount", skip_serializing_if = "Option::is_none")]
    pub cycle_count: Option<u32>,
    /// Whether the countdown is ticking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
    /// Whether a cycle is in progress
    #[serde(rename = "cycleActive", skip_serializing_if = "Option::is_none")]
    pub cycle_active: Option<bool>,
    /// Whether the running interval has a durable deadline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durable: Option<bool>,
    /// Work duration in minutes
    #[serde(rename = "workMinutes", skip_serializing_if = "Option::is_none")]
    pub work_minutes: Option<u64>,
    /// Break duration in minutes
    #[serde(rename = "breakMinutes", skip_serializing_if = "Option::is_none")]
    pub break_minutes: Option<u64>,
    /// Long break duration in minutes
    #[serde(rename = "longBreakMinutes", skip_serializing_if = "Option::is_none")]
    pub long_break_minutes: Option<u64>,
    /// Cycles before a long break
    #[serde(
        rename = "cyclesBeforeLongBreak",
        skip_serializing_if = "Option::is_none"
    )]
    pub cycles_before_long_break: Option<u32>,
    /// Selected alarm sound
    #[serde(rename = "alarmUri", skip_serializing_if = "Option::is_none")]
    pub alarm_uri: Option<String>,
    /// Fields reverted to their last known-good value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverted: Option<Vec<String>>,
}

impl ResponseData {
    /// Creates response data from the engine's state and configuration.
    pub fn from_cycle(state: &CycleState, config: &CycleConfig) -> Self {
        Self {
            state: Some(state.phase.as_str().to_string()),
            remaining_seconds: Some(state.remaining.as_secs()),
            cycle_count: Some(state.cycle_count),
            running: Some(state.running),
            cycle_active: Some(state.cycle_active),
            durable: Some(state.durable),
            work_minutes: Some(config.work().as_secs() / 60),
            break_minutes: Some(config.short_break().as_secs() / 60),
            long_break_minutes: Some(config.long_break().as_secs() / 60),
            cycles_before_long_break: Some(config.cycles_before_long_break()),
            ..Self::default()
        }
    }

    /// Attaches the selected alarm sound.
    pub fn with_alarm_uri(mut self, uri: Option<String>) -> Self {
        self.alarm_uri = uri;
        self
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Returns true for an error response.
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // CyclePhase Tests
    // ------------------------------------------------------------------------

    mod cycle_phase_tests {
        use super::*;

        #[test]
        fn test_default_is_idle() {
            assert_eq!(CyclePhase::default(), CyclePhase::Idle);
        }

        #[test]
        fn test_as_str() {
            assert_eq!(CyclePhase::Idle.as_str(), "idle");
            assert_eq!(CyclePhase::Work.as_str(), "work");
            assert_eq!(CyclePhase::Break.as_str(), "break");
            assert_eq!(CyclePhase::LongBreak.as_str(), "long_break");
        }

        #[test]
        fn test_interval_kind() {
            assert_eq!(CyclePhase::Idle.interval_kind(), None);
            assert_eq!(CyclePhase::Work.interval_kind(), Some(IntervalKind::Work));
            assert_eq!(CyclePhase::Break.interval_kind(), Some(IntervalKind::Break));
            assert_eq!(
                CyclePhase::LongBreak.interval_kind(),
                Some(IntervalKind::Break)
            );
        }

        #[test]
        fn test_serialize() {
            let json = serde_json::to_string(&CyclePhase::LongBreak).unwrap();
            assert_eq!(json, "\"long_break\"");
        }
    }

    // ------------------------------------------------------------------------
    // CycleConfig Tests
    // ------------------------------------------------------------------------

    mod cycle_config_tests {
        use super::*;

        #[test]
        fn test_default_values() {
            let config = CycleConfig::default();
            assert_eq!(config.work(), Duration::from_secs(25 * 60));
            assert_eq!(config.short_break(), Duration::from_secs(5 * 60));
            assert_eq!(config.long_break(), Duration::from_secs(15 * 60));
            assert_eq!(config.cycles_before_long_break(), 4);
        }

        #[test]
        fn test_from_minutes() {
            let config = CycleConfig::from_minutes(30, 10, 20, 3).unwrap();
            assert_eq!(config.work(), Duration::from_secs(30 * 60));
            assert_eq!(config.short_break(), Duration::from_secs(10 * 60));
            assert_eq!(config.long_break(), Duration::from_secs(20 * 60));
            assert_eq!(config.cycles_before_long_break(), 3);
        }

        #[test]
        fn test_zero_work_rejected() {
            let result = CycleConfig::from_minutes(0, 5, 15, 4);
            assert_eq!(
                result.unwrap_err(),
                ConfigError::InvalidDuration { field: "work" }
            );
        }

        #[test]
        fn test_zero_break_rejected() {
            assert!(CycleConfig::from_minutes(25, 0, 15, 4).is_err());
        }

        #[test]
        fn test_zero_long_break_rejected() {
            assert!(CycleConfig::from_minutes(25, 5, 0, 4).is_err());
        }

        #[test]
        fn test_zero_cycles_rejected() {
            let err = CycleConfig::from_minutes(25, 5, 15, 0).unwrap_err();
            assert!(err.to_string().contains("cycles"));
        }

        #[test]
        fn test_sub_minute_durations_allowed() {
            let config = CycleConfig::new(
                Duration::from_secs(3),
                Duration::from_secs(2),
                Duration::from_secs(4),
                1,
            );
            assert!(config.is_ok());
        }

        #[test]
        fn test_duration_for() {
            let config = CycleConfig::from_minutes(1, 2, 3, 4).unwrap();
            assert_eq!(config.duration_for(CyclePhase::Idle), Duration::ZERO);
            assert_eq!(config.duration_for(CyclePhase::Work), Duration::from_secs(60));
            assert_eq!(config.duration_for(CyclePhase::Break), Duration::from_secs(120));
            assert_eq!(
                config.duration_for(CyclePhase::LongBreak),
                Duration::from_secs(180)
            );
        }
    }

    // ------------------------------------------------------------------------
    // CycleState Tests
    // ------------------------------------------------------------------------

    mod cycle_state_tests {
        use super::*;

        #[test]
        fn test_idle_state() {
            let config = CycleConfig::default();
            let state = CycleState::idle(&config);

            assert_eq!(state.phase, CyclePhase::Idle);
            assert_eq!(state.cycle_count, 0);
            assert_eq!(state.remaining, config.work());
            assert!(!state.running);
            assert!(!state.cycle_active);
            assert!(!state.is_paused());
        }

        #[test]
        fn test_is_paused() {
            let mut state = CycleState::idle(&CycleConfig::default());
            state.cycle_active = true;
            assert!(state.is_paused());

            state.running = true;
            assert!(!state.is_paused());
        }
    }

    // ------------------------------------------------------------------------
    // AlarmRequest Tests
    // ------------------------------------------------------------------------

    mod alarm_request_tests {
        use super::*;

        #[test]
        fn test_phase_is_work() {
            assert!(AlarmRequest::new(IntervalKind::Work, None).phase_is_work());
            assert!(!AlarmRequest::new(IntervalKind::Break, None).phase_is_work());
        }

        #[test]
        fn test_wire_format() {
            let request = AlarmRequest::new(IntervalKind::Work, Some("/tmp/bell.wav".into()));
            let json = serde_json::to_string(&request).unwrap();
            assert!(json.contains("\"phaseAtExpiry\":\"work\""));
            assert!(json.contains("\"soundRef\":\"/tmp/bell.wav\""));
        }

        #[test]
        fn test_unset_sound_ref_is_omitted() {
            let request = AlarmRequest::new(IntervalKind::Break, None);
            let json = serde_json::to_string(&request).unwrap();
            assert!(!json.contains("soundRef"));
        }
    }

    // ------------------------------------------------------------------------
    // IPC Type Tests
    // ------------------------------------------------------------------------

    mod ipc_tests {
        use super::*;

        #[test]
        fn test_request_start_serialize() {
            let json = serde_json::to_string(&IpcRequest::Start).unwrap();
            assert_eq!(json, r#"{"command":"start"}"#);
        }

        #[test]
        fn test_request_configure_flattened() {
            let request = IpcRequest::Configure {
                params: ConfigureParams {
                    work: Some("30".into()),
                    break_time: Some("abc".into()),
                    ..Default::default()
                },
            };
            let json = serde_json::to_string(&request).unwrap();
            assert!(json.contains(r#""command":"configure""#));
            assert!(json.contains(r#""work":"30""#));
            assert!(json.contains(r#""break":"abc""#));
            assert!(!json.contains("longBreak"));
        }

        #[test]
        fn test_request_select_sound_deserialize() {
            let request: IpcRequest =
                serde_json::from_str(r#"{"command":"select_sound","uri":"file:///a.wav"}"#)
                    .unwrap();
            match request {
                IpcRequest::SelectSound { uri } => {
                    assert_eq!(uri.as_deref(), Some("file:///a.wav"))
                }
                other => panic!("unexpected request: {:?}", other),
            }
        }

        #[test]
        fn test_request_set_visibility_deserialize() {
            let request: IpcRequest =
                serde_json::from_str(r#"{"command":"set_visibility","foreground":true}"#)
                    .unwrap();
            assert!(matches!(
                request,
                IpcRequest::SetVisibility { foreground: true }
            ));
        }

        #[test]
        fn test_configure_params_is_empty() {
            assert!(ConfigureParams::default().is_empty());
            let params = ConfigureParams {
                cycles: Some("2".into()),
                ..Default::default()
            };
            assert!(!params.is_empty());
        }

        #[test]
        fn test_response_data_from_cycle() {
            let config = CycleConfig::from_minutes(30, 10, 20, 3).unwrap();
            let mut state = CycleState::idle(&config);
            state.phase = CyclePhase::Work;
            state.remaining = Duration::from_secs(95);
            state.running = true;
            state.cycle_active = true;

            let data = ResponseData::from_cycle(&state, &config);
            assert_eq!(data.state.as_deref(), Some("work"));
            assert_eq!(data.remaining_seconds, Some(95));
            assert_eq!(data.work_minutes, Some(30));
            assert_eq!(data.break_minutes, Some(10));
            assert_eq!(data.long_break_minutes, Some(20));
            assert_eq!(data.cycles_before_long_break, Some(3));
            assert_eq!(data.running, Some(true));
            assert_eq!(data.durable, Some(false));
        }

        #[test]
        fn test_response_success_and_error() {
            let ok = IpcResponse::success("done", None);
            assert_eq!(ok.status, "success");
            assert!(!ok.is_error());

            let err = IpcResponse::error("boom");
            assert!(err.is_error());
            assert_eq!(err.message, "boom");
            assert!(err.data.is_none());
        }

        #[test]
        fn test_response_round_trip_keeps_camel_case() {
            let data = ResponseData {
                remaining_seconds: Some(10),
                alarm_uri: Some("x".into()),
                ..Default::default()
            };
            let json = serde_json::to_string(&IpcResponse::success("", Some(data))).unwrap();
            assert!(json.contains("remainingSeconds"));
            assert!(json.contains("alarmUri"));
        }
    }
}

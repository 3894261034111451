//! Pomodoro Alarm Library
//!
//! This library provides the core functionality for the Pomodoro alarm CLI.
//! It includes:
//! - Cycle state machine driving work, break and long break intervals
//! - Durable deadlines that ring the alarm from a detached trigger process
//! - Delivery arbitration between foreground playback and background alarms
//! - Bounded background alarm tasks with a stop action
//! - Sound selection and playback for alarms
//! - IPC server/client for daemon-CLI communication
//! - Persisted settings with revert-on-invalid updates

pub mod alarm;
pub mod cli;
pub mod daemon;
pub mod deadline;
pub mod notification;
pub mod paths;
pub mod settings;
pub mod sound;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    AlarmRequest, ConfigureParams, CycleConfig, CyclePhase, CycleState, IntervalKind, IpcRequest,
    IpcResponse, ResponseData,
};

pub use alarm::{AlarmOutcome, AlarmTask, StopHandle, TaskRunner, ALARM_CEILING};

pub use daemon::{
    AppVisibility, Delivery, DeliveryArbiter, DeliverySource, TimerEngine, TimerEvent,
    VisibilityFlag,
};

pub use deadline::{
    DeadlineError, DeadlineHandle, DeadlineScheduler, DeadlineStore, MockTriggerFacility,
    PendingDeadline, SpawnTriggerFacility, TriggerFacility, TriggerToken,
};

pub use notification::{
    AlarmContent, AlarmNotifier, DesktopNotifier, MockNotifier, NotificationError, NotificationId,
};

pub use paths::StatePaths;
pub use settings::{Settings, SettingsStore};

// Re-export sound types
pub use sound::{
    discover_system_sounds, get_default_sound, AlarmPlayer, MockSoundPlayer, RodioSoundPlayer,
    SoundError, SoundPlayer, SoundSelection, SoundSource,
};

//! Delivery arbitration.
//!
//! When an interval ends, the arbiter decides how the user hears about it:
//! a foreground client gets the alarm sound right away, anything else gets a
//! background alarm task with a notification and a bounded lifetime.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::alarm::{AlarmOutcome, AlarmTask, TaskRunner, ALARM_CEILING, ALARM_TAG};
use crate::notification::AlarmNotifier;
use crate::sound::AlarmPlayer;
use crate::types::{AlarmRequest, IntervalKind};

// ============================================================================
// AppVisibility
// ============================================================================

/// Answers whether the user is currently looking at the timer.
pub trait AppVisibility: Send + Sync {
    /// Returns true while a foreground client is attached.
    fn is_foreground(&self) -> bool;
}

/// How long a foreground claim lasts without being renewed.
pub const FOREGROUND_LEASE: Duration = Duration::from_secs(5);

/// Visibility leased over IPC by the `watch` client.
///
/// A foreground claim expires unless it is renewed, so a client that dies
/// without saying goodbye cannot keep alarms in the foreground.
#[derive(Debug)]
pub struct VisibilityFlag {
    lease: Duration,
    expires: Mutex<Option<Instant>>,
}

impl Default for VisibilityFlag {
    fn default() -> Self {
        Self::with_lease(FOREGROUND_LEASE)
    }
}

impl VisibilityFlag {
    /// Creates a flag in the background state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a flag whose foreground claims last `lease`.
    pub fn with_lease(lease: Duration) -> Self {
        Self {
            lease,
            expires: Mutex::new(None),
        }
    }

    /// Claims or renews the foreground, or gives it up.
    pub fn set_foreground(&self, foreground: bool) {
        let was_foreground = self.is_foreground();
        if let Ok(mut expires) = self.expires.lock() {
            *expires = foreground.then(|| Instant::now() + self.lease);
        }
        if was_foreground != foreground {
            tracing::debug!("Foreground: {}", foreground);
        }
    }
}

impl AppVisibility for VisibilityFlag {
    fn is_foreground(&self) -> bool {
        self.expires
            .lock()
            .map(|expires| expires.is_some_and(|at| Instant::now() < at))
            .unwrap_or(false)
    }
}

/// Visibility of a process without any UI.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysBackground;

impl AppVisibility for AlwaysBackground {
    fn is_foreground(&self) -> bool {
        false
    }
}

// ============================================================================
// DeliveryArbiter
// ============================================================================

/// Where an "interval ended" signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySource {
    /// The daemon's live countdown
    LiveClock,
    /// A durable trigger that outlived the countdown
    DurableTrigger,
}

/// How an alarm was delivered.
#[derive(Debug)]
pub enum Delivery {
    /// The sound was played directly
    Foreground,
    /// A background alarm task was dispatched
    Background(JoinHandle<AlarmOutcome>),
}

impl Delivery {
    /// Returns true for a foreground delivery.
    pub fn is_foreground(&self) -> bool {
        matches!(self, Delivery::Foreground)
    }
}

/// Chooses between direct playback and a background alarm task.
pub struct DeliveryArbiter {
    visibility: Arc<dyn AppVisibility>,
    player: Arc<AlarmPlayer>,
    notifier: Arc<dyn AlarmNotifier>,
    runner: TaskRunner,
    ceiling: Duration,
}

impl DeliveryArbiter {
    /// Creates an arbiter with the default alarm ceiling.
    pub fn new(
        visibility: Arc<dyn AppVisibility>,
        player: Arc<AlarmPlayer>,
        notifier: Arc<dyn AlarmNotifier>,
    ) -> Self {
        Self {
            visibility,
            player,
            notifier,
            runner: TaskRunner::new(),
            ceiling: ALARM_CEILING,
        }
    }

    /// Overrides the background alarm ceiling.
    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Runner holding in-flight alarm tasks.
    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// The shared alarm player.
    pub fn player(&self) -> &Arc<AlarmPlayer> {
        &self.player
    }

    /// Delivers the end of a `kind` interval.
    ///
    /// A durable trigger always goes to the background path, even if a
    /// client happens to be watching.
    pub fn deliver(
        &self,
        kind: IntervalKind,
        source: DeliverySource,
        sound_ref: Option<String>,
    ) -> Delivery {
        if source == DeliverySource::LiveClock && self.visibility.is_foreground() {
            tracing::info!("{:?} ended, playing alarm in the foreground", kind);
            self.player.play_uri(sound_ref.as_deref());
            return Delivery::Foreground;
        }

        // One ringing alarm at a time.
        self.runner.cancel_by_tag(ALARM_TAG);

        let task = AlarmTask::new(
            AlarmRequest::new(kind, sound_ref),
            self.player.clone(),
            self.notifier.clone(),
        )
        .with_ceiling(self.ceiling);
        tracing::info!("{:?} ended, dispatching background alarm ({:?})", kind, source);
        Delivery::Background(self.runner.enqueue(ALARM_TAG, task))
    }

    /// Stops the ringing alarm, wherever it plays.
    ///
    /// Returns the number of background tasks signalled.
    pub fn stop_alarms(&self) -> usize {
        self.player.stop();
        self.runner.cancel_by_tag(ALARM_TAG)
    }

    /// Waits until every notification clear requested so far has completed.
    pub async fn flush_notifications(&self) {
        let notifier = self.notifier.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || notifier.flush()).await {
            tracing::warn!("Notification flush failed: {}", e);
        }
    }
}

impl std::fmt::Debug for DeliveryArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryArbiter")
            .field("foreground", &self.visibility.is_foreground())
            .field("runner", &self.runner)
            .field("ceiling", &self.ceiling)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Background alarm task.
//!
//! An [`AlarmTask`] shows the alarm notification, starts the alarm sound and
//! then waits for the stop action or the ceiling, whichever comes first.
//! Cleanup (stop sound, clear notification) runs exactly once, also when the
//! task future is dropped or aborted mid-wait.

mod runner;
pub mod standalone;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

pub use runner::TaskRunner;

use crate::notification::{AlarmContent, AlarmNotifier, NotificationId};
use crate::sound::{AlarmPlayer, PlaybackTicket};
use crate::types::AlarmRequest;

/// Longest time an alarm rings without being stopped.
pub const ALARM_CEILING: Duration = Duration::from_secs(30);

/// Runner tag for alarm tasks.
pub const ALARM_TAG: &str = "pomodoro_alarm";

// ============================================================================
// StopHandle
// ============================================================================

#[derive(Debug, Default)]
struct StopSignal {
    raised: AtomicBool,
    notify: Notify,
}

/// A one-shot stop signal shared between an alarm and whoever may stop it.
///
/// Raising it more than once is harmless; every waiter is released.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopSignal>,
}

impl StopHandle {
    /// Creates a lowered stop signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal.
    pub fn stop(&self) {
        if !self.inner.raised.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Returns true once the signal was raised.
    pub fn is_stopped(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Waits until the signal is raised.
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

// ============================================================================
// AlarmOutcome
// ============================================================================

/// How an alarm task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmOutcome {
    /// Nobody stopped the alarm before the ceiling
    TimedOut,
    /// The stop signal was raised
    Stopped,
}

// ============================================================================
// AlarmTask
// ============================================================================

/// A bounded unit of work that rings the alarm for one ended interval.
pub struct AlarmTask {
    request: AlarmRequest,
    player: Arc<AlarmPlayer>,
    notifier: Arc<dyn AlarmNotifier>,
    ceiling: Duration,
}

impl AlarmTask {
    /// Creates a task for `request` with the default ceiling.
    pub fn new(
        request: AlarmRequest,
        player: Arc<AlarmPlayer>,
        notifier: Arc<dyn AlarmNotifier>,
    ) -> Self {
        Self {
            request,
            player,
            notifier,
            ceiling: ALARM_CEILING,
        }
    }

    /// Overrides the ceiling.
    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Returns the payload this task announces.
    pub fn request(&self) -> &AlarmRequest {
        &self.request
    }

    /// Rings the alarm until `stop` is raised or the ceiling passes.
    pub async fn run(self, stop: StopHandle) -> AlarmOutcome {
        let content = AlarmContent::for_kind(self.request.phase_at_expiry);
        let mut cleanup = Cleanup::new(self.player.clone(), self.notifier.clone());

        let on_stop = {
            let stop = stop.clone();
            Box::new(move || stop.stop())
        };
        match self.notifier.show(&content, on_stop) {
            Ok(id) => cleanup.notification = Some(id),
            Err(e) => {
                tracing::warn!("Failed to show alarm notification: {} ({})", e, e.suggestion())
            }
        }

        cleanup.ticket = Some(self.player.play_uri(self.request.sound_ref.as_deref()));
        tracing::info!("Alarm ringing: {}", content.title);

        tokio::select! {
            _ = stop.stopped() => {
                tracing::info!("Alarm stopped");
                AlarmOutcome::Stopped
            }
            _ = tokio::time::sleep(self.ceiling) => {
                tracing::info!("Alarm timed out after {:?}", self.ceiling);
                AlarmOutcome::TimedOut
            }
        }
    }
}

/// Stops this alarm's playback and clears its notification when dropped.
///
/// Playback started by someone else since is left alone.
struct Cleanup {
    player: Arc<AlarmPlayer>,
    notifier: Arc<dyn AlarmNotifier>,
    ticket: Option<PlaybackTicket>,
    notification: Option<NotificationId>,
}

impl Cleanup {
    fn new(player: Arc<AlarmPlayer>, notifier: Arc<dyn AlarmNotifier>) -> Self {
        Self {
            player,
            notifier,
            ticket: None,
            notification: None,
        }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            if !self.player.stop_if_current(ticket) {
                tracing::debug!("Alarm sound already superseded");
            }
        }
        if let Some(id) = self.notification.take() {
            self.notifier.clear(id);
        }
        tracing::debug!("Alarm resources released");
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Durable deadline scheduling.
//!
//! The [`DeadlineScheduler`] keeps at most one trigger outstanding for the
//! timer. Arming a new deadline cancels the previous one first, and the
//! computed fire time includes a small safety margin so the in-process clock
//! normally wins and cancels the trigger before it goes off.

mod error;
pub mod facility;
pub mod fire;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub use error::DeadlineError;
pub use facility::{
    MockTriggerFacility, ScheduledTrigger, SpawnTriggerFacility, TriggerFacility, TriggerToken,
};
pub use store::{DeadlineStore, PendingDeadline};

use crate::types::{AlarmRequest, IntervalKind};

/// Slack added to every armed deadline to absorb scheduling latency.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(2);

// ============================================================================
// DeadlineHandle
// ============================================================================

/// An armed deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineHandle {
    token: TriggerToken,
    fires_at: DateTime<Utc>,
    phase_at_expiry: IntervalKind,
}

impl DeadlineHandle {
    /// Token of the registered trigger.
    pub fn token(&self) -> TriggerToken {
        self.token
    }

    /// Absolute fire time, margin included.
    pub fn fires_at(&self) -> DateTime<Utc> {
        self.fires_at
    }

    /// Kind of interval the deadline ends.
    pub fn phase_at_expiry(&self) -> IntervalKind {
        self.phase_at_expiry
    }
}

// ============================================================================
// DeadlineScheduler
// ============================================================================

/// Arms and cancels the timer's single durable deadline.
pub struct DeadlineScheduler {
    facility: Arc<dyn TriggerFacility>,
    current: Option<DeadlineHandle>,
    margin: Duration,
}

impl DeadlineScheduler {
    /// Creates a scheduler over the given facility.
    pub fn new(facility: Arc<dyn TriggerFacility>) -> Self {
        Self {
            facility,
            current: None,
            margin: SAFETY_MARGIN,
        }
    }

    /// Overrides the safety margin.
    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Arms a deadline `duration` from now, superseding any armed one.
    ///
    /// # Errors
    ///
    /// Returns `DeadlineError::PermissionDenied` if the host refuses to
    /// register the trigger; the caller keeps running without a durable
    /// guarantee.
    pub fn arm(
        &mut self,
        duration: Duration,
        phase_at_expiry: IntervalKind,
        sound_ref: Option<String>,
    ) -> Result<DeadlineHandle, DeadlineError> {
        self.cancel_current();

        let delta = chrono::Duration::from_std(duration + self.margin)
            .map_err(|_| DeadlineError::OutOfRange)?;
        let fires_at = Utc::now()
            .checked_add_signed(delta)
            .ok_or(DeadlineError::OutOfRange)?;

        let request = AlarmRequest::new(phase_at_expiry, sound_ref);
        let token = self.facility.schedule_at(fires_at, &request)?;

        let handle = DeadlineHandle {
            token,
            fires_at,
            phase_at_expiry,
        };
        tracing::debug!("Armed {:?} deadline {} for {}", phase_at_expiry, token, fires_at);
        self.current = Some(handle.clone());
        Ok(handle)
    }

    /// Cancels a deadline. Failures are logged, never propagated.
    pub fn cancel(&mut self, handle: &DeadlineHandle) {
        if let Err(e) = self.facility.cancel(&handle.token) {
            tracing::warn!("Failed to cancel deadline {}: {}", handle.token, e);
        }
        if self.current.as_ref() == Some(handle) {
            self.current = None;
        }
    }

    /// Cancels the armed deadline, if any. Returns true if one was armed.
    pub fn cancel_current(&mut self) -> bool {
        match self.current.take() {
            Some(handle) => {
                self.cancel(&handle);
                true
            }
            None => false,
        }
    }

    /// Returns the armed deadline.
    pub fn current(&self) -> Option<&DeadlineHandle> {
        self.current.as_ref()
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Interval clock.
//!
//! A countdown that knows nothing about Pomodoro phases. The timer engine
//! advances it once per tick period and reacts to the events it returns.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Granularity of the live countdown.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Result of advancing the clock by one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Time is left on the countdown
    Tick(Duration),
    /// The countdown reached zero
    Finished,
}

/// A single countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalClock {
    remaining: Duration,
    period: Duration,
    running: bool,
}

impl IntervalClock {
    /// Creates a halted clock holding `duration`.
    pub fn new(duration: Duration) -> Self {
        Self {
            remaining: duration,
            period: TICK_PERIOD,
            running: false,
        }
    }

    /// Starts (or resumes) counting down from the held value.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Halts the countdown, keeping the remaining time.
    pub fn halt(&mut self) {
        self.running = false;
    }

    /// Halts and loads a new duration.
    pub fn reset(&mut self, duration: Duration) {
        self.running = false;
        self.remaining = duration;
    }

    /// Time left on the countdown.
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Returns true while counting down.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advances by one period. A halted clock yields nothing.
    ///
    /// `Finished` is returned exactly once; the clock halts with it.
    pub fn advance(&mut self) -> Option<ClockEvent> {
        if !self.running {
            return None;
        }

        self.remaining = self.remaining.saturating_sub(self.period);
        if self.remaining.is_zero() {
            self.running = false;
            Some(ClockEvent::Finished)
        } else {
            Some(ClockEvent::Tick(self.remaining))
        }
    }
}

/// Creates the ticker that drives [`IntervalClock::advance`].
///
/// The first tick comes one period from now. Missed ticks are skipped, not
/// burst, after the host was suspended.
pub fn ticker() -> Interval {
    let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

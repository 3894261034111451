//! Timer engine for the Pomodoro alarm.
//!
//! This module provides the cycle state machine:
//! - Work → Break → ... → LongBreak sequencing
//! - Pause/resume from the exact remaining time
//! - Reset and reconfiguration
//! - A durable deadline armed alongside every running interval
//! - Tick and phase-ended events for revocable observers

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, Mutex, Notify};

use crate::deadline::{DeadlineHandle, DeadlineScheduler};
use crate::types::{CycleConfig, CyclePhase, CycleState};

use super::clock::{self, ClockEvent, IntervalClock};

// ============================================================================
// TimerEvent
// ============================================================================

/// Events reported to observers.
///
/// `PhaseEnded` for an interval follows that interval's ticks and precedes
/// the first tick of the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// One tick elapsed
    Tick {
        /// Time left in the interval
        remaining: Duration,
    },
    /// An interval ran to completion
    PhaseEnded {
        /// The phase that just ended
        phase: CyclePhase,
    },
}

// ============================================================================
// ObserverRegistry
// ============================================================================

/// Registration handle returned by [`TimerEngine::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Non-owning observer list; a dropped receiver unregisters itself.
#[derive(Debug, Default)]
struct ObserverRegistry {
    next_id: u64,
    observers: Vec<(ObserverId, mpsc::UnboundedSender<TimerEvent>)>,
}

impl ObserverRegistry {
    fn register(&mut self) -> (ObserverId, mpsc::UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.next_id += 1;
        let id = ObserverId(self.next_id);
        self.observers.push((id, tx));
        (id, rx)
    }

    fn revoke(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    fn emit(&mut self, event: TimerEvent) {
        self.observers.retain(|(id, tx)| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                tracing::debug!("Observer {:?} went away", id);
            }
            alive
        });
    }

    fn len(&self) -> usize {
        self.observers.len()
    }
}

// ============================================================================
// TimerEngine
// ============================================================================

/// The cycle state machine.
pub struct TimerEngine {
    config: CycleConfig,
    state: CycleState,
    clock: IntervalClock,
    deadlines: DeadlineScheduler,
    observers: ObserverRegistry,
    sound_ref: Option<String>,
    degraded: Option<String>,
    /// Raised when a countdown starts or resumes off the tick grid.
    restarted: Arc<Notify>,
}

impl TimerEngine {
    /// Creates an idle engine.
    pub fn new(config: CycleConfig, deadlines: DeadlineScheduler) -> Self {
        Self {
            state: CycleState::idle(&config),
            clock: IntervalClock::new(config.work()),
            config,
            deadlines,
            observers: ObserverRegistry::default(),
            sound_ref: None,
            degraded: None,
            restarted: Arc::new(Notify::new()),
        }
    }

    /// Registers an observer for tick and phase-ended events.
    pub fn subscribe(&mut self) -> (ObserverId, mpsc::UnboundedReceiver<TimerEvent>) {
        self.observers.register()
    }

    /// Revokes an observer registration. Returns false if it was unknown.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.revoke(id)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Signal raised whenever [`run_cycles`](Self::run_cycles) starts a
    /// countdown; the ticker realigns its period to it.
    pub fn restarts(&self) -> Arc<Notify> {
        self.restarted.clone()
    }

    /// Starts a cycle from idle, or resumes a paused interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer is already running.
    pub fn run_cycles(&mut self) -> Result<()> {
        if self.state.running {
            anyhow::bail!("Timer is already running");
        }

        if self.state.cycle_active {
            tracing::info!(
                "Resuming {} with {}s left",
                self.state.phase.as_str(),
                self.state.remaining.as_secs()
            );
            self.clock.start();
            self.state.running = true;
            self.arm_current();
            self.restarted.notify_one();
            return Ok(());
        }

        self.state.cycle_count = 0;
        self.state.cycle_active = true;
        self.enter(CyclePhase::Work);
        self.restarted.notify_one();
        tracing::info!("Cycle started");
        Ok(())
    }

    /// Pauses the running interval, keeping the remaining time.
    ///
    /// Pausing a halted timer does nothing.
    pub fn stop_timer(&mut self) {
        if !self.state.running {
            return;
        }

        self.clock.halt();
        self.state.running = false;
        self.state.remaining = self.clock.remaining();
        self.deadlines.cancel_current();
        self.state.durable = false;
        tracing::info!(
            "Paused {} with {}s left",
            self.state.phase.as_str(),
            self.state.remaining.as_secs()
        );
    }

    /// Returns to idle from any phase.
    pub fn reset_timer(&mut self) {
        self.deadlines.cancel_current();
        self.clock.reset(self.config.work());
        self.state = CycleState::idle(&self.config);
        self.degraded = None;
        tracing::info!("Cycle reset");
    }

    /// Replaces the configuration.
    ///
    /// The interval in flight keeps its length; the new values apply from
    /// the next transition. An idle timer shows the new work length.
    pub fn update_times(&mut self, config: CycleConfig) {
        self.config = config;
        if !self.state.cycle_active {
            self.clock.reset(self.config.work());
            self.state.remaining = self.config.work();
        }
        tracing::debug!("Configuration updated: {:?}", self.config);
    }

    /// Sets the sound carried by deadlines armed from now on.
    pub fn set_sound_ref(&mut self, sound_ref: Option<String>) {
        self.sound_ref = sound_ref;
    }

    /// Sound carried by newly armed deadlines.
    pub fn sound_ref(&self) -> Option<&str> {
        self.sound_ref.as_deref()
    }

    /// Advances the live countdown by one tick.
    pub fn tick(&mut self) {
        match self.clock.advance() {
            Some(ClockEvent::Tick(remaining)) => {
                self.state.remaining = remaining;
                self.observers.emit(TimerEvent::Tick { remaining });
            }
            Some(ClockEvent::Finished) => self.complete_interval(),
            None => {}
        }
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Returns the current state.
    pub fn state(&self) -> &CycleState {
        &self.state
    }

    /// Returns the armed deadline, if any.
    pub fn deadline(&self) -> Option<&DeadlineHandle> {
        self.deadlines.current()
    }

    /// Why the running interval has no durable deadline, if it failed to arm.
    pub fn degraded_reason(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    fn complete_interval(&mut self) {
        let ended = self.state.phase;
        self.deadlines.cancel_current();
        self.state.remaining = Duration::ZERO;
        self.observers.emit(TimerEvent::PhaseEnded { phase: ended });

        let next = match ended {
            CyclePhase::Work => {
                // Read the threshold now so a reconfiguration mid-work counts.
                if self.state.cycle_count < self.config.cycles_before_long_break() {
                    self.state.cycle_count += 1;
                    CyclePhase::Break
                } else {
                    self.state.cycle_count = 0;
                    CyclePhase::LongBreak
                }
            }
            CyclePhase::Break => CyclePhase::Work,
            CyclePhase::LongBreak => {
                self.state.cycle_count = 0;
                CyclePhase::Work
            }
            CyclePhase::Idle => return,
        };

        tracing::info!(
            "{} ended, entering {} (cycle {})",
            ended.as_str(),
            next.as_str(),
            self.state.cycle_count
        );
        self.enter(next);
    }

    fn enter(&mut self, phase: CyclePhase) {
        let duration = self.config.duration_for(phase);
        self.state.phase = phase;
        self.state.remaining = duration;
        self.state.running = true;
        self.clock.reset(duration);
        self.clock.start();
        self.arm_current();
    }

    fn arm_current(&mut self) {
        let Some(kind) = self.state.phase.interval_kind() else {
            return;
        };

        match self
            .deadlines
            .arm(self.state.remaining, kind, self.sound_ref.clone())
        {
            Ok(_) => {
                self.state.durable = true;
                self.degraded = None;
            }
            Err(e) => {
                tracing::warn!(
                    "Alarm will only fire while the daemon runs: {} ({})",
                    e,
                    e.suggestion()
                );
                self.state.durable = false;
                self.degraded = Some(e.to_string());
            }
        }
    }
}

/// Drives the engine's live countdown until the task is dropped.
///
/// The first tick of a started or resumed interval comes one full period
/// after the start, so every interval runs its configured length.
pub async fn run_ticker(engine: Arc<Mutex<TimerEngine>>) {
    let restarted = engine.lock().await.restarts();
    let mut ticker = clock::ticker();
    loop {
        tokio::select! {
            biased;
            _ = restarted.notified() => ticker.reset(),
            _ = ticker.tick() => engine.lock().await.tick(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! The trigger process.
//!
//! `pomodoro-alarm fire --token <uuid>` is spawned detached when a deadline
//! is armed. It shares nothing with the daemon except the deadline record:
//! it sleeps until the record's fire time, claims the record and rings the
//! alarm as a background task. A record that vanished or carries another
//! token means the deadline was cancelled or superseded, and the process
//! exits without a sound.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::alarm::standalone::ActiveAlarmFile;
use crate::alarm::AlarmOutcome;
use crate::daemon::{shutdown_signal, AlwaysBackground, Delivery, DeliveryArbiter, DeliverySource};
use crate::notification::DesktopNotifier;
use crate::paths::StatePaths;
use crate::sound::{try_create_player, AlarmPlayer, SoundPlayer};

use super::error::DeadlineError;
use super::store::DeadlineStore;

/// Longest sleep between two checks of the deadline record.
///
/// Bounds how late the alarm rings after the host wakes from suspend.
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Sleeps until the deadline for `token` is due.
///
/// Returns false as soon as the record is gone or belongs to another arm.
/// Never returns true before the record's fire time.
pub async fn wait_until_due(store: &DeadlineStore, token: Uuid) -> Result<bool, DeadlineError> {
    loop {
        let record = match store.load()? {
            Some(record) if record.token == token => record,
            _ => return Ok(false),
        };

        let now = Utc::now();
        if record.is_due(now) {
            return Ok(true);
        }

        let left = (record.fires_at - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(left.min(POLL_INTERVAL)).await;
    }
}

/// Claims the due record for `token` and rings its alarm.
///
/// Returns None if someone else consumed or replaced the record first.
pub async fn fire_claimed(
    store: &DeadlineStore,
    token: Uuid,
    arbiter: &DeliveryArbiter,
) -> Result<Option<AlarmOutcome>> {
    let Some(record) = store.claim(token)? else {
        tracing::debug!("Deadline {} was claimed elsewhere", token);
        return Ok(None);
    };

    let request = record.request();
    tracing::info!(
        "Deadline {} fired {}s late",
        token,
        (Utc::now() - record.fires_at).num_seconds().max(0)
    );

    match arbiter.deliver(
        request.phase_at_expiry,
        DeliverySource::DurableTrigger,
        request.sound_ref,
    ) {
        Delivery::Background(handle) => {
            let outcome = handle.await;
            // The alarm's notification must be gone before this process exits.
            arbiter.flush_notifications().await;
            Ok(Some(outcome.context("Alarm task failed")?))
        }
        Delivery::Foreground => Ok(None),
    }
}

/// Waits for the deadline and rings it.
pub async fn fire_once(
    store: &DeadlineStore,
    token: Uuid,
    arbiter: &DeliveryArbiter,
) -> Result<Option<AlarmOutcome>> {
    if !wait_until_due(store, token).await? {
        tracing::debug!("Deadline {} was cancelled or superseded", token);
        return Ok(None);
    }
    fire_claimed(store, token, arbiter).await
}

/// Entry point of the trigger process.
///
/// SIGTERM and SIGINT stop a ringing alarm.
pub async fn run(paths: StatePaths, token: Uuid) -> Result<()> {
    let store = DeadlineStore::new(&paths);

    if !wait_until_due(&store, token).await? {
        tracing::debug!("Deadline {} was cancelled or superseded", token);
        return Ok(());
    }

    let backend = try_create_player(false).map(|player| player as Arc<dyn SoundPlayer>);
    let arbiter = Arc::new(DeliveryArbiter::new(
        Arc::new(AlwaysBackground),
        Arc::new(AlarmPlayer::new(backend)),
        Arc::new(DesktopNotifier::new()),
    ));

    let _active = match ActiveAlarmFile::create(&paths.active_alarm()) {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!("stop-alarm will not reach this alarm: {}", e);
            None
        }
    };

    let listener = tokio::spawn({
        let arbiter = arbiter.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Stop signal received");
            arbiter.stop_alarms();
        }
    });

    let outcome = fire_claimed(&store, token, &arbiter).await;
    listener.abort();

    if let Some(outcome) = outcome? {
        tracing::info!("Alarm finished: {:?}", outcome);
    }
    Ok(())
}

//! Daemon module for the Pomodoro alarm.
//!
//! This module contains the core daemon functionality:
//! - `clock`: Interval countdown and the one-second ticker
//! - `timer`: Cycle state machine with durable deadlines
//! - `arbiter`: Foreground/background alarm delivery
//! - `ipc`: Unix socket server and request handling

pub mod arbiter;
pub mod clock;
pub mod ipc;
pub mod timer;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex};

pub use arbiter::{
    AlwaysBackground, AppVisibility, Delivery, DeliveryArbiter, DeliverySource, VisibilityFlag,
    FOREGROUND_LEASE,
};
pub use clock::{ClockEvent, IntervalClock, TICK_PERIOD};
pub use ipc::{IpcError, IpcServer, RequestHandler};
pub use timer::{run_ticker, ObserverId, TimerEngine, TimerEvent};

use crate::alarm::ALARM_TAG;
use crate::deadline::{DeadlineScheduler, SpawnTriggerFacility};
use crate::notification::DesktopNotifier;
use crate::paths::StatePaths;
use crate::settings::SettingsStore;
use crate::sound::{try_create_player, AlarmPlayer, SoundPlayer};

/// How long shutdown waits for stopped alarms to clean up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Runs the daemon until SIGINT or SIGTERM.
///
/// An armed deadline is left in place on shutdown so its trigger process
/// still rings the alarm.
///
/// # Errors
///
/// Returns an error if settings cannot be loaded or the socket cannot be bound.
pub async fn run(paths: StatePaths, settings_store: SettingsStore) -> Result<()> {
    paths
        .ensure_root()
        .with_context(|| format!("Failed to create state directory: {:?}", paths.root()))?;

    let settings = settings_store.load()?;
    let config = settings
        .cycle_config()
        .context("Invalid cycle configuration")?;

    let backend = try_create_player(false).map(|player| player as Arc<dyn SoundPlayer>);
    let player = Arc::new(AlarmPlayer::with_selection(backend, settings.alarm_uri()));
    let visibility = Arc::new(VisibilityFlag::new());
    let arbiter = Arc::new(DeliveryArbiter::new(
        visibility.clone(),
        player,
        Arc::new(DesktopNotifier::new()),
    ));

    let facility = Arc::new(SpawnTriggerFacility::new(paths.clone()));
    let mut engine = TimerEngine::new(config, DeadlineScheduler::new(facility));
    engine.set_sound_ref(settings.alarm_uri().map(str::to_string));
    let (_observer, events) = engine.subscribe();
    let engine = Arc::new(Mutex::new(engine));

    let delivery = tokio::spawn(deliver_phase_ends(events, arbiter.clone()));
    let ticker = tokio::spawn(run_ticker(engine.clone()));

    let server = IpcServer::new(&paths.socket())?;
    let handler = RequestHandler::new(engine, arbiter.clone(), visibility, settings, settings_store);
    tracing::info!("Daemon listening on {:?}", server.socket_path());

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = server.accept() => match accepted {
                Ok(stream) => {
                    if let Err(e) = IpcServer::serve_connection(stream, &handler).await {
                        tracing::warn!("IPC exchange failed: {:#}", e);
                    }
                }
                Err(e) => tracing::warn!("{:#}", e),
            },
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    ticker.abort();
    delivery.abort();
    arbiter.stop_alarms();
    // Stopped alarms clear their notifications as they unwind.
    let grace = tokio::time::Instant::now() + SHUTDOWN_GRACE;
    while arbiter.runner().active(ALARM_TAG) > 0 && tokio::time::Instant::now() < grace {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    arbiter.flush_notifications().await;
    tracing::info!("Daemon stopped");
    Ok(())
}

/// Hands every phase end reported by the engine to the arbiter.
pub async fn deliver_phase_ends(
    mut events: mpsc::UnboundedReceiver<TimerEvent>,
    arbiter: Arc<DeliveryArbiter>,
) {
    while let Some(event) = events.recv().await {
        let TimerEvent::PhaseEnded { phase } = event else {
            continue;
        };
        let Some(kind) = phase.interval_kind() else {
            continue;
        };
        let sound_ref = arbiter.player().selection().uri;
        arbiter.deliver(kind, DeliverySource::LiveClock, sound_ref);
    }
}

/// Resolves on SIGINT, or SIGTERM where the platform has it.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

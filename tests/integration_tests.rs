//! Integration tests for Daemon-CLI IPC communication.
//!
//! These tests run the real IPC server and request handler on a temporary
//! socket and drive them with the CLI client:
//! - Timer start, pause, resume and reset via IPC
//! - Status queries
//! - Configuration with revert-on-invalid
//! - Sound selection and alarm control
//! - Connection error handling

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use pomodoro_alarm::cli::client::IpcClient;
use pomodoro_alarm::daemon::ipc::{IpcServer, RequestHandler};
use pomodoro_alarm::daemon::{AppVisibility, DeliveryArbiter, TimerEngine, VisibilityFlag};
use pomodoro_alarm::deadline::{DeadlineScheduler, MockTriggerFacility};
use pomodoro_alarm::notification::MockNotifier;
use pomodoro_alarm::settings::{Settings, SettingsStore};
use pomodoro_alarm::sound::{AlarmPlayer, MockSoundPlayer, SoundPlayer};
use pomodoro_alarm::types::{ConfigureParams, CycleConfig};

// ============================================================================
// Test Helpers
// ============================================================================

/// A daemon serving a temporary socket.
struct TestDaemon {
    _dir: tempfile::TempDir,
    socket_path: PathBuf,
    settings: SettingsStore,
    facility: Arc<MockTriggerFacility>,
    sound: Arc<MockSoundPlayer>,
    visibility: Arc<VisibilityFlag>,
    engine: Arc<Mutex<TimerEngine>>,
    server: JoinHandle<()>,
}

impl TestDaemon {
    fn client(&self) -> IpcClient {
        IpcClient::with_socket_path(self.socket_path.clone())
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Starts a daemon backed by mocks.
fn start_daemon() -> TestDaemon {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("integration_test.sock");
    let settings = SettingsStore::new(dir.path().join("settings.toml"));

    let facility = Arc::new(MockTriggerFacility::new());
    let engine = Arc::new(Mutex::new(TimerEngine::new(
        CycleConfig::default(),
        DeadlineScheduler::new(facility.clone()),
    )));
    let sound = Arc::new(MockSoundPlayer::new());
    let visibility = Arc::new(VisibilityFlag::new());
    let arbiter = Arc::new(DeliveryArbiter::new(
        visibility.clone(),
        Arc::new(AlarmPlayer::new(Some(sound.clone()))),
        Arc::new(MockNotifier::new()),
    ));
    let handler = RequestHandler::new(
        engine.clone(),
        arbiter,
        visibility.clone(),
        Settings::default(),
        settings.clone(),
    );

    let server = IpcServer::new(&socket_path).unwrap();
    let server = tokio::spawn(async move {
        loop {
            let Ok(stream) = server.accept().await else {
                continue;
            };
            let _ = IpcServer::serve_connection(stream, &handler).await;
        }
    });

    TestDaemon {
        _dir: dir,
        socket_path,
        settings,
        facility,
        sound,
        visibility,
        engine,
        server,
    }
}

// ============================================================================
// Timer Control via IPC
// ============================================================================

#[tokio::test]
async fn test_start_via_ipc() {
    let daemon = start_daemon();

    let response = daemon.client().start().await.unwrap();

    assert_eq!(response.message, "Timer started");
    let data = response.data.unwrap();
    assert_eq!(data.state.as_deref(), Some("work"));
    assert_eq!(data.running, Some(true));
    assert_eq!(data.durable, Some(true));
    assert_eq!(daemon.facility.outstanding().len(), 1);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let daemon = start_daemon();
    let client = daemon.client();

    client.start().await.unwrap();
    let err = client.start().await.unwrap_err();

    assert!(err.to_string().contains("already running"));
}

#[tokio::test]
async fn test_pause_and_resume_via_ipc() {
    let daemon = start_daemon();
    let client = daemon.client();

    client.start().await.unwrap();
    let paused = client.pause().await.unwrap();
    assert_eq!(paused.message, "Timer paused");
    assert_eq!(paused.data.as_ref().unwrap().running, Some(false));
    assert!(daemon.facility.outstanding().is_empty());

    let resumed = client.start().await.unwrap();
    assert_eq!(resumed.message, "Timer resumed");
    assert_eq!(resumed.data.unwrap().state.as_deref(), Some("work"));
    assert_eq!(daemon.facility.outstanding().len(), 1);
}

#[tokio::test]
async fn test_reset_via_ipc() {
    let daemon = start_daemon();
    let client = daemon.client();

    client.start().await.unwrap();
    let response = client.reset().await.unwrap();

    let data = response.data.unwrap();
    assert_eq!(data.state.as_deref(), Some("idle"));
    assert_eq!(data.cycle_count, Some(0));
    assert_eq!(data.remaining_seconds, Some(25 * 60));
    assert!(daemon.facility.outstanding().is_empty());
}

#[tokio::test]
async fn test_status_reflects_engine() {
    let daemon = start_daemon();
    daemon.engine.lock().await.run_cycles().unwrap();

    let response = daemon.client().status().await.unwrap();

    let data = response.data.unwrap();
    assert_eq!(data.state.as_deref(), Some("work"));
    assert_eq!(data.cycle_active, Some(true));
    assert_eq!(data.cycles_before_long_break, Some(4));
}

// ============================================================================
// Settings via IPC
// ============================================================================

#[tokio::test]
async fn test_configure_persists_and_reverts() {
    let daemon = start_daemon();

    let response = daemon
        .client()
        .configure(ConfigureParams {
            work: Some("40".to_string()),
            long_break: Some("soon".to_string()),
            ..ConfigureParams::default()
        })
        .await
        .unwrap();

    assert_eq!(response.message, "Invalid values reverted: longBreak");
    let data = response.data.unwrap();
    assert_eq!(data.work_minutes, Some(40));
    assert_eq!(data.long_break_minutes, Some(15));

    let saved = daemon.settings.load().unwrap();
    assert_eq!(saved.work_minutes, 40);
    assert_eq!(saved.long_break_minutes, 15);
}

#[tokio::test]
async fn test_configure_keeps_running_interval() {
    let daemon = start_daemon();
    let client = daemon.client();
    client.start().await.unwrap();

    let response = client
        .configure(ConfigureParams {
            work: Some("50".to_string()),
            ..ConfigureParams::default()
        })
        .await
        .unwrap();

    let data = response.data.unwrap();
    assert_eq!(data.work_minutes, Some(50));
    assert!(data.remaining_seconds.unwrap() <= 25 * 60);
}

#[tokio::test]
async fn test_select_unplayable_sound_falls_back() {
    let daemon = start_daemon();

    let response = daemon
        .client()
        .select_sound(Some("/nonexistent/alarm.ogg".to_string()))
        .await
        .unwrap();

    assert!(response.message.contains("default alarm"));
    // The choice is kept; playback falls back each time it is unplayable.
    assert_eq!(
        response.data.unwrap().alarm_uri.as_deref(),
        Some("/nonexistent/alarm.ogg")
    );
    assert_eq!(
        daemon.settings.load().unwrap().alarm_uri,
        "/nonexistent/alarm.ogg"
    );
}

// ============================================================================
// Alarm Control via IPC
// ============================================================================

#[tokio::test]
async fn test_preview_and_stop_alarm() {
    let daemon = start_daemon();
    let client = daemon.client();

    let preview = client.preview().await.unwrap();
    assert!(preview.message.starts_with("Playing"));
    assert_eq!(daemon.sound.play_count(), 1);

    let stop = client.stop_alarm().await.unwrap();
    assert_eq!(stop.message, "Alarm stopped");
    assert!(!daemon.sound.is_playing());
}

#[tokio::test]
async fn test_visibility_round_trip() {
    let daemon = start_daemon();
    let client = daemon.client();

    client.set_visibility(true).await.unwrap();
    assert!(daemon.visibility.is_foreground());

    client.set_visibility(false).await.unwrap();
    assert!(!daemon.visibility.is_foreground());
}

// ============================================================================
// Connection Errors
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_connection_error_without_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let client = IpcClient::with_socket_path(dir.path().join("missing.sock"));

    let err = client.status().await.unwrap_err();

    assert!(format!("{:#}", err).contains("Cannot connect to the daemon"));
}

#[tokio::test]
async fn test_sequential_clients() {
    let daemon = start_daemon();

    for _ in 0..5 {
        let response = daemon.client().status().await.unwrap();
        assert_eq!(response.status, "success");
    }
}

//! IPC Server for the Pomodoro alarm daemon.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for timer, settings and alarm commands
//! - Integration with TimerEngine and DeliveryArbiter for command execution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};

use crate::settings::{Settings, SettingsStore};
use crate::types::{ConfigureParams, IpcRequest, IpcResponse, ResponseData};

use super::arbiter::{DeliveryArbiter, VisibilityFlag};
use super::timer::TimerEngine;

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until the client shuts down its write side, bounded by the
    /// read timeout and the maximum request size.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let mut buffer = Vec::with_capacity(512);
        let mut limited = (&mut *stream).take(MAX_REQUEST_SIZE as u64 + 1);

        let read_result = timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            limited.read_to_end(&mut buffer),
        )
        .await;

        match read_result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string()).into()),
            Err(_) => return Err(IpcError::Timeout.into()),
        }

        if buffer.is_empty() {
            anyhow::bail!("Connection closed by client");
        }
        if buffer.len() > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge.into());
        }

        let request: IpcRequest = serde_json::from_slice(&buffer)
            .with_context(|| "Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;

        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;

        Ok(())
    }

    /// Serves one connection: reads a request, dispatches it, replies.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange with the client fails.
    pub async fn serve_connection(mut stream: UnixStream, handler: &RequestHandler) -> Result<()> {
        let response = match Self::receive_request(&mut stream).await {
            Ok(request) => {
                tracing::debug!("Request: {:?}", request);
                handler.handle(request).await
            }
            Err(e) => IpcResponse::error(format!("Invalid request: {}", e)),
        };
        Self::send_response(&mut stream, &response).await
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the engine, arbiter and settings.
pub struct RequestHandler {
    engine: Arc<Mutex<TimerEngine>>,
    arbiter: Arc<DeliveryArbiter>,
    visibility: Arc<VisibilityFlag>,
    settings: Mutex<Settings>,
    store: SettingsStore,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(
        engine: Arc<Mutex<TimerEngine>>,
        arbiter: Arc<DeliveryArbiter>,
        visibility: Arc<VisibilityFlag>,
        settings: Settings,
        store: SettingsStore,
    ) -> Self {
        Self {
            engine,
            arbiter,
            visibility,
            settings: Mutex::new(settings),
            store,
        }
    }

    /// Handles an IPC request and returns the appropriate response.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Start => self.handle_start().await,
            IpcRequest::Pause => self.handle_pause().await,
            IpcRequest::Reset => self.handle_reset().await,
            IpcRequest::Status => self.handle_status().await,
            IpcRequest::Configure { params } => self.handle_configure(params).await,
            IpcRequest::SelectSound { uri } => self.handle_select_sound(uri).await,
            IpcRequest::PreviewSound => self.handle_preview_sound().await,
            IpcRequest::StopAlarm => self.handle_stop_alarm().await,
            IpcRequest::SetVisibility { foreground } => {
                // Renewing the foreground lease doubles as a status poll.
                self.visibility.set_foreground(foreground);
                self.handle_status().await
            }
        }
    }

    /// Handles the start command.
    async fn handle_start(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        let resuming = engine.state().cycle_active;

        if let Err(e) = engine.run_cycles() {
            return IpcResponse::error(e.to_string());
        }

        let mut message = if resuming {
            "Timer resumed".to_string()
        } else {
            "Timer started".to_string()
        };
        if let Some(reason) = engine.degraded_reason() {
            message.push_str(&format!(
                " (alarm will only fire while the daemon runs: {})",
                reason
            ));
        }
        IpcResponse::success(message, Some(self.snapshot(&engine).await))
    }

    /// Handles the pause command.
    async fn handle_pause(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;

        let message = if engine.state().running {
            engine.stop_timer();
            "Timer paused"
        } else {
            "Timer is not running"
        };
        IpcResponse::success(message, Some(self.snapshot(&engine).await))
    }

    /// Handles the reset command.
    async fn handle_reset(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        engine.reset_timer();
        IpcResponse::success("Timer reset", Some(self.snapshot(&engine).await))
    }

    /// Handles the status command.
    async fn handle_status(&self) -> IpcResponse {
        let engine = self.engine.lock().await;
        IpcResponse::success("", Some(self.snapshot(&engine).await))
    }

    /// Handles the configure command.
    ///
    /// Malformed values are reverted to the last known-good value and
    /// reported back; valid ones are applied and persisted.
    async fn handle_configure(&self, params: ConfigureParams) -> IpcResponse {
        if params.is_empty() {
            return IpcResponse::error("No settings given");
        }

        let mut settings = self.settings.lock().await;
        let mut updated = settings.clone();
        let reverted: Vec<String> = updated
            .apply(&params)
            .into_iter()
            .filter(|(_, update)| update.is_reverted())
            .map(|(field, _)| field.as_str().to_string())
            .collect();

        let config = match updated.cycle_config() {
            Ok(config) => config,
            Err(e) => return IpcResponse::error(e.to_string()),
        };
        if let Err(e) = self.store.save(&updated) {
            tracing::error!("{:#}", e);
            return IpcResponse::error(format!("Failed to save settings: {}", e));
        }
        *settings = updated;
        drop(settings);

        let mut engine = self.engine.lock().await;
        engine.update_times(config);

        let message = if reverted.is_empty() {
            "Settings updated".to_string()
        } else {
            format!("Invalid values reverted: {}", reverted.join(", "))
        };
        let mut data = self.snapshot(&engine).await;
        data.reverted = Some(reverted);
        IpcResponse::success(message, Some(data))
    }

    /// Handles the select_sound command.
    async fn handle_select_sound(&self, uri: Option<String>) -> IpcResponse {
        let selection = self.arbiter.player().select(uri.as_deref());

        let mut settings = self.settings.lock().await;
        let mut updated = settings.clone();
        updated.set_alarm_uri(selection.uri.as_deref());
        if let Err(e) = self.store.save(&updated) {
            tracing::error!("{:#}", e);
            return IpcResponse::error(format!("Failed to save settings: {}", e));
        }
        *settings = updated;
        drop(settings);

        let mut engine = self.engine.lock().await;
        engine.set_sound_ref(selection.uri.clone());

        let message = if selection.substituted {
            format!(
                "Sound is not playable, the default alarm ({}) will be used",
                selection.source.name()
            )
        } else {
            format!("Alarm sound set to {}", selection.source.name())
        };
        IpcResponse::success(message, Some(self.snapshot(&engine).await))
    }

    /// Handles the preview_sound command.
    async fn handle_preview_sound(&self) -> IpcResponse {
        let player = self.arbiter.player();
        if !player.is_available() {
            return IpcResponse::error("No audio device available");
        }
        player.play();
        IpcResponse::success(
            format!("Playing {}", player.selection().source.name()),
            None,
        )
    }

    /// Handles the stop_alarm command.
    async fn handle_stop_alarm(&self) -> IpcResponse {
        let stopped = self.arbiter.stop_alarms();
        tracing::info!("Stopped {} background alarm(s)", stopped);
        IpcResponse::success("Alarm stopped", None)
    }

    async fn snapshot(&self, engine: &TimerEngine) -> ResponseData {
        let alarm_uri = self.settings.lock().await.alarm_uri().map(str::to_string);
        ResponseData::from_cycle(engine.state(), engine.config()).with_alarm_uri(alarm_uri)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::{DeadlineScheduler, MockTriggerFacility};
    use crate::notification::MockNotifier;
    use crate::sound::{write_test_wav, AlarmPlayer, MockSoundPlayer, SoundPlayer};
    use crate::types::CycleConfig;

    // ------------------------------------------------------------------------
    // Helper functions
    // ------------------------------------------------------------------------

    struct Fixture {
        _dir: tempfile::TempDir,
        handler: RequestHandler,
        facility: Arc<MockTriggerFacility>,
        sound: Arc<MockSoundPlayer>,
        visibility: Arc<VisibilityFlag>,
        store: SettingsStore,
    }

    fn create_handler() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        let facility = Arc::new(MockTriggerFacility::new());
        let engine = TimerEngine::new(
            CycleConfig::default(),
            DeadlineScheduler::new(facility.clone()),
        );
        let sound = Arc::new(MockSoundPlayer::new());
        let visibility = Arc::new(VisibilityFlag::new());
        let arbiter = DeliveryArbiter::new(
            visibility.clone(),
            Arc::new(AlarmPlayer::new(Some(sound.clone()))),
            Arc::new(MockNotifier::new()),
        );
        let handler = RequestHandler::new(
            Arc::new(Mutex::new(engine)),
            Arc::new(arbiter),
            visibility.clone(),
            Settings::default(),
            store.clone(),
        );
        Fixture {
            _dir: dir,
            handler,
            facility,
            sound,
            visibility,
            store,
        }
    }

    fn create_temp_socket_path() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        (dir, path)
    }

    // ------------------------------------------------------------------------
    // IpcServer Tests
    // ------------------------------------------------------------------------

    mod ipc_server_tests {
        use super::*;

        #[tokio::test]
        async fn test_server_removes_existing_socket() {
            let (_dir, socket_path) = create_temp_socket_path();
            std::fs::write(&socket_path, "dummy").unwrap();

            let server = IpcServer::new(&socket_path);
            assert!(server.is_ok());
        }

        #[tokio::test]
        async fn test_server_creates_parent_directory() {
            let dir = tempfile::tempdir().unwrap();
            let socket_path = dir.path().join("subdir").join("test.sock");

            let server = IpcServer::new(&socket_path);
            assert!(server.is_ok());
            assert!(socket_path.parent().unwrap().exists());
        }

        #[tokio::test]
        async fn test_receive_request_configure() {
            let (_dir, socket_path) = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let client_handle = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                let request = r#"{"command":"configure","work":"30","longBreak":"x"}"#;
                stream.write_all(request.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            });

            let mut stream = server.accept().await.unwrap();
            let request = IpcServer::receive_request(&mut stream).await.unwrap();

            let IpcRequest::Configure { params } = request else {
                panic!("Expected Configure request");
            };
            assert_eq!(params.work.as_deref(), Some("30"));
            assert_eq!(params.long_break.as_deref(), Some("x"));
            assert_eq!(params.cycles, None);

            client_handle.await.unwrap();
        }

        #[tokio::test]
        async fn test_receive_request_too_large() {
            let (_dir, socket_path) = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let client_handle = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                let padding = "x".repeat(MAX_REQUEST_SIZE);
                let request = format!(r#"{{"command":"select_sound","uri":"{}"}}"#, padding);
                let _ = stream.write_all(request.as_bytes()).await;
                let _ = stream.shutdown().await;
            });

            let mut stream = server.accept().await.unwrap();
            let error = IpcServer::receive_request(&mut stream).await.unwrap_err();

            assert!(error.to_string().contains("too large"));
            client_handle.await.unwrap();
        }

        #[tokio::test]
        async fn test_receive_request_invalid_json() {
            let (_dir, socket_path) = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let _client_handle = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                stream.write_all(b"not valid json").await.unwrap();
                stream.shutdown().await.unwrap();
            });

            let mut stream = server.accept().await.unwrap();
            assert!(IpcServer::receive_request(&mut stream).await.is_err());
        }

        #[tokio::test]
        async fn test_serve_connection_round_trip() {
            let (_dir, socket_path) = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();
            let fx = create_handler();

            let client_path = socket_path.clone();
            let client_handle = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                stream.write_all(br#"{"command":"status"}"#).await.unwrap();
                stream.shutdown().await.unwrap();
                let mut buffer = Vec::new();
                stream.read_to_end(&mut buffer).await.unwrap();
                serde_json::from_slice::<IpcResponse>(&buffer).unwrap()
            });

            let stream = server.accept().await.unwrap();
            IpcServer::serve_connection(stream, &fx.handler).await.unwrap();

            let response = client_handle.await.unwrap();
            assert_eq!(response.status, "success");
            assert_eq!(response.data.unwrap().state.as_deref(), Some("idle"));
        }

        #[tokio::test]
        async fn test_server_drop_cleanup() {
            let (_dir, socket_path) = create_temp_socket_path();

            {
                let _server = IpcServer::new(&socket_path).unwrap();
                assert!(socket_path.exists());
            }

            assert!(!socket_path.exists());
        }
    }

    // ------------------------------------------------------------------------
    // RequestHandler Tests
    // ------------------------------------------------------------------------

    mod request_handler_tests {
        use super::*;

        #[tokio::test]
        async fn test_handle_status_idle() {
            let fx = create_handler();

            let response = fx.handler.handle(IpcRequest::Status).await;

            let data = response.data.unwrap();
            assert_eq!(data.state.as_deref(), Some("idle"));
            assert_eq!(data.remaining_seconds, Some(25 * 60));
            assert_eq!(data.cycle_count, Some(0));
            assert_eq!(data.durable, Some(false));
            assert_eq!(data.alarm_uri, None);
        }

        #[tokio::test]
        async fn test_handle_start_then_resume() {
            let fx = create_handler();

            let started = fx.handler.handle(IpcRequest::Start).await;
            assert_eq!(started.message, "Timer started");
            assert_eq!(started.data.unwrap().durable, Some(true));

            let again = fx.handler.handle(IpcRequest::Start).await;
            assert!(again.is_error());

            let paused = fx.handler.handle(IpcRequest::Pause).await;
            assert_eq!(paused.message, "Timer paused");
            assert!(fx.facility.outstanding().is_empty());

            let resumed = fx.handler.handle(IpcRequest::Start).await;
            assert_eq!(resumed.message, "Timer resumed");
        }

        #[tokio::test]
        async fn test_handle_start_degraded() {
            let fx = create_handler();
            fx.facility.set_deny_permission(true);

            let response = fx.handler.handle(IpcRequest::Start).await;

            assert!(!response.is_error());
            assert!(response.message.contains("only fire while the daemon runs"));
            assert_eq!(response.data.unwrap().durable, Some(false));
        }

        #[tokio::test]
        async fn test_handle_pause_when_idle() {
            let fx = create_handler();
            let response = fx.handler.handle(IpcRequest::Pause).await;
            assert_eq!(response.message, "Timer is not running");
        }

        #[tokio::test]
        async fn test_handle_reset() {
            let fx = create_handler();
            fx.handler.handle(IpcRequest::Start).await;

            let response = fx.handler.handle(IpcRequest::Reset).await;

            let data = response.data.unwrap();
            assert_eq!(data.state.as_deref(), Some("idle"));
            assert_eq!(data.cycle_active, Some(false));
            assert!(fx.facility.outstanding().is_empty());
        }

        #[tokio::test]
        async fn test_handle_configure_reverts_malformed() {
            let fx = create_handler();

            let response = fx
                .handler
                .handle(IpcRequest::Configure {
                    params: ConfigureParams {
                        work: Some("50".into()),
                        break_time: Some("-1".into()),
                        long_break: None,
                        cycles: Some("abc".into()),
                    },
                })
                .await;

            assert!(!response.is_error());
            let data = response.data.unwrap();
            assert_eq!(data.work_minutes, Some(50));
            assert_eq!(data.break_minutes, Some(5));
            assert_eq!(data.cycles_before_long_break, Some(4));
            assert_eq!(data.remaining_seconds, Some(50 * 60));
            assert_eq!(
                data.reverted,
                Some(vec!["break".to_string(), "cycles".to_string()])
            );
            assert_eq!(fx.store.load().unwrap().work_minutes, 50);
        }

        #[tokio::test]
        async fn test_handle_configure_empty() {
            let fx = create_handler();
            let response = fx
                .handler
                .handle(IpcRequest::Configure {
                    params: ConfigureParams::default(),
                })
                .await;
            assert!(response.is_error());
        }

        #[tokio::test]
        async fn test_handle_select_sound_valid() {
            let fx = create_handler();
            let wav = fx.store.path().with_file_name("gong.wav");
            write_test_wav(&wav);
            let uri = wav.to_string_lossy().to_string();

            let response = fx
                .handler
                .handle(IpcRequest::SelectSound {
                    uri: Some(uri.clone()),
                })
                .await;

            assert!(response.message.contains("gong"));
            assert_eq!(response.data.unwrap().alarm_uri.as_deref(), Some(uri.as_str()));
            assert_eq!(fx.store.load().unwrap().alarm_uri, uri);

            fx.handler.handle(IpcRequest::Start).await;
            let engine = fx.handler.engine.lock().await;
            assert_eq!(engine.sound_ref(), Some(uri.as_str()));
        }

        #[tokio::test]
        async fn test_handle_select_sound_invalid_substitutes() {
            let fx = create_handler();

            let response = fx
                .handler
                .handle(IpcRequest::SelectSound {
                    uri: Some("/nonexistent/ring.wav".into()),
                })
                .await;

            assert!(!response.is_error());
            assert!(response.message.contains("default alarm"));
        }

        #[tokio::test]
        async fn test_handle_preview_and_stop() {
            let fx = create_handler();

            let preview = fx.handler.handle(IpcRequest::PreviewSound).await;
            assert!(!preview.is_error());
            assert_eq!(fx.sound.play_count(), 1);

            let stop = fx.handler.handle(IpcRequest::StopAlarm).await;
            assert!(!stop.is_error());
            assert!(!fx.sound.is_playing());
        }

        #[tokio::test]
        async fn test_handle_preview_without_device() {
            let fx = create_handler();
            fx.sound.set_available(false);
            let response = fx.handler.handle(IpcRequest::PreviewSound).await;
            assert!(response.is_error());
        }

        #[tokio::test]
        async fn test_handle_set_visibility() {
            let fx = create_handler();
            let response = fx
                .handler
                .handle(IpcRequest::SetVisibility { foreground: true })
                .await;
            assert!(crate::daemon::AppVisibility::is_foreground(
                fx.visibility.as_ref()
            ));
            assert_eq!(response.data.unwrap().state.as_deref(), Some("idle"));
        }
    }
}

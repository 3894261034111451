//! Sound player implementation using rodio.
//!
//! rodio's `OutputStream` must stay on the thread that created it, so the
//! player owns a dedicated audio thread and talks to it over a channel.
//! The thread holds at most one sink; starting a sound stops the previous
//! one, and a sink that has drained is released on the next idle poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, warn};

use super::embedded::DEFAULT_TONE;
use super::error::SoundError;
use super::source::{open_decoder, SoundSource};

/// How often the audio thread checks for a drained sink.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// How long `is_playing` waits for the audio thread to answer.
const QUERY_TIMEOUT: Duration = Duration::from_millis(500);

enum AudioCommand {
    Play(SoundSource),
    Stop,
    IsPlaying(Sender<bool>),
}

/// A sound player that uses rodio for audio playback.
///
/// This player is thread-safe and can be shared across threads using `Arc`.
/// Sound playback is non-blocking; sounds continue playing in the background.
pub struct RodioSoundPlayer {
    commands: Sender<AudioCommand>,
    disabled: AtomicBool,
}

impl RodioSoundPlayer {
    /// Creates a new sound player and its audio thread.
    ///
    /// # Arguments
    ///
    /// * `disabled` - If true, all sound playback will be silently skipped.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::DeviceNotAvailable` if no audio output device
    /// is available.
    pub fn new(disabled: bool) -> Result<Self, SoundError> {
        let (commands, receiver) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);

        std::thread::Builder::new()
            .name("pomodoro-audio".to_string())
            .spawn(move || audio_thread(receiver, ready_tx))
            .map_err(|e| SoundError::StreamError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!("Audio output stream initialized");
                Ok(Self {
                    commands,
                    disabled: AtomicBool::new(disabled),
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SoundError::DeviceNotAvailable(
                "audio thread exited during startup".to_string(),
            )),
        }
    }

    /// Starts playing `source`, stopping whatever was playing.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::PlaybackError` if the audio thread is gone.
    pub fn play(&self, source: &SoundSource) -> Result<(), SoundError> {
        if self.disabled.load(Ordering::Relaxed) {
            debug!("Sound playback disabled, skipping");
            return Ok(());
        }
        self.send(AudioCommand::Play(source.clone()))
    }

    /// Stops playback. Stopping a silent player is a no-op.
    pub fn stop(&self) {
        if let Err(e) = self.send(AudioCommand::Stop) {
            debug!("Stop ignored: {}", e);
        }
    }

    /// Returns true while a sound is audible.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        let (reply_tx, reply_rx) = bounded(1);
        if self.send(AudioCommand::IsPlaying(reply_tx)).is_err() {
            return false;
        }
        reply_rx.recv_timeout(QUERY_TIMEOUT).unwrap_or(false)
    }

    fn send(&self, command: AudioCommand) -> Result<(), SoundError> {
        self.commands
            .send(command)
            .map_err(|_| SoundError::PlaybackError("audio thread is not running".to_string()))
    }

    /// Returns true if sound playback is currently disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Enables sound playback.
    pub fn enable(&self) {
        self.disabled.store(false, Ordering::Relaxed);
        debug!("Sound playback enabled");
    }

    /// Disables sound playback.
    pub fn disable(&self) {
        self.disabled.store(true, Ordering::Relaxed);
        debug!("Sound playback disabled");
    }
}

impl std::fmt::Debug for RodioSoundPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioSoundPlayer")
            .field("disabled", &self.disabled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Audio thread
// ============================================================================

fn audio_thread(commands: Receiver<AudioCommand>, ready: Sender<Result<(), SoundError>>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(output) => output,
        Err(e) => {
            let _ = ready.send(Err(SoundError::DeviceNotAvailable(e.to_string())));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut current: Option<Sink> = None;

    loop {
        match commands.recv_timeout(IDLE_POLL) {
            Ok(AudioCommand::Play(source)) => {
                if let Some(sink) = current.take() {
                    sink.stop();
                }
                match start(&handle, &source) {
                    Ok(sink) => current = Some(sink),
                    Err(e) => warn!("Failed to play '{}': {}", source.name(), e),
                }
            }
            Ok(AudioCommand::Stop) => {
                if let Some(sink) = current.take() {
                    sink.stop();
                    debug!("Playback stopped");
                }
            }
            Ok(AudioCommand::IsPlaying(reply)) => {
                let playing = current.as_ref().is_some_and(|sink| !sink.empty());
                let _ = reply.send(playing);
            }
            Err(RecvTimeoutError::Timeout) => {
                if current.as_ref().is_some_and(Sink::empty) {
                    current = None;
                    debug!("Playback finished, sink released");
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("Audio thread exiting");
}

fn start(handle: &OutputStreamHandle, source: &SoundSource) -> Result<Sink, SoundError> {
    let sink = Sink::try_new(handle).map_err(|e| SoundError::StreamError(e.to_string()))?;

    match source {
        SoundSource::File { name, path } => match open_decoder(path) {
            Ok(decoder) => {
                debug!("Playing sound file: {}", name);
                sink.append(decoder);
            }
            Err(e) => {
                warn!("Failed to open '{}': {}, falling back to the built-in tone", name, e);
                DEFAULT_TONE.append_to(&sink);
            }
        },
        SoundSource::Embedded { name } => {
            debug!("Playing embedded sound: {}", name);
            DEFAULT_TONE.append_to(&sink);
        }
    }

    Ok(sink)
}

/// Creates a sound player, returning None if audio is unavailable.
///
/// If audio initialization fails, a warning is logged and None is returned.
#[must_use]
pub fn try_create_player(disabled: bool) -> Option<Arc<RodioSoundPlayer>> {
    match RodioSoundPlayer::new(disabled) {
        Ok(player) => Some(Arc::new(player)),
        Err(e) => {
            warn!("Audio not available, sound disabled: {}", e);
            None
        }
    }
}

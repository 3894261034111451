//! Sound playback system for the Pomodoro alarm.
//!
//! This module provides:
//!
//! - Validated sound selection with fallback to a default alarm
//! - System sound discovery and a synthesized fallback tone
//! - Non-blocking playback on a dedicated audio thread
//! - A single shared [`AlarmPlayer`] so previews and alarms never overlap
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   AlarmPlayer    │ ← selection + single-stream rule
//! └────────┬─────────┘
//!          │ SoundPlayer
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ RodioSoundPlayer │────▶│   audio thread   │
//! └──────────────────┘     │  (OutputStream)  │
//!                          └──────────────────┘
//! ```

mod alarm;
mod embedded;
mod error;
mod player;
mod source;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub use alarm::{AlarmPlayer, PlaybackTicket};
pub use embedded::{TonePattern, DEFAULT_TONE};
pub use error::SoundError;
pub use player::{try_create_player, RodioSoundPlayer};
pub use source::{
    discover_system_sounds, get_default_sound, SoundSelection, SoundSource, BUILT_IN_TONE,
};

#[cfg(test)]
pub(crate) use source::tests::write_test_wav;

/// Trait for sound playback implementations.
///
/// This trait abstracts the sound playback functionality, allowing for
/// different implementations (e.g., rodio-based, mock for testing).
pub trait SoundPlayer: Send + Sync {
    /// Plays a sound from the given source.
    ///
    /// This method should be non-blocking; the sound plays in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if playback fails.
    fn play(&self, source: &SoundSource) -> Result<(), SoundError>;

    /// Stops playback. Must be a no-op when nothing is playing.
    fn stop(&self);

    /// Returns true while a sound is playing.
    fn is_playing(&self) -> bool;

    /// Returns true if the audio system is available.
    fn is_available(&self) -> bool;

    /// Returns true if sound playback is disabled.
    fn is_disabled(&self) -> bool;

    /// Enables sound playback.
    fn enable(&self);

    /// Disables sound playback.
    fn disable(&self);
}

impl SoundPlayer for RodioSoundPlayer {
    fn play(&self, source: &SoundSource) -> Result<(), SoundError> {
        RodioSoundPlayer::play(self, source)
    }

    fn stop(&self) {
        RodioSoundPlayer::stop(self)
    }

    fn is_playing(&self) -> bool {
        RodioSoundPlayer::is_playing(self)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn is_disabled(&self) -> bool {
        RodioSoundPlayer::is_disabled(self)
    }

    fn enable(&self) {
        RodioSoundPlayer::enable(self)
    }

    fn disable(&self) {
        RodioSoundPlayer::disable(self)
    }
}

/// Mock sound player for testing.
///
/// Models streams literally: `play` opens a stream without closing the
/// previous one, so overlapping playback shows up in
/// [`max_concurrent_streams`](Self::max_concurrent_streams).
#[derive(Debug)]
pub struct MockSoundPlayer {
    play_calls: Mutex<Vec<SoundSource>>,
    active_streams: AtomicUsize,
    max_streams: AtomicUsize,
    stop_calls: AtomicUsize,
    available: AtomicBool,
    disabled: AtomicBool,
    should_fail: AtomicBool,
}

impl Default for MockSoundPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSoundPlayer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            play_calls: Mutex::new(Vec::new()),
            active_streams: AtomicUsize::new(0),
            max_streams: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            available: AtomicBool::new(true),
            disabled: AtomicBool::new(false),
            should_fail: AtomicBool::new(false),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn play_count(&self) -> usize {
        self.get_play_calls().len()
    }

    #[must_use]
    pub fn get_play_calls(&self) -> Vec<SoundSource> {
        self.play_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Highest number of streams that were ever playing at once.
    #[must_use]
    pub fn max_concurrent_streams(&self) -> usize {
        self.max_streams.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.play_calls.lock() {
            calls.clear();
        }
    }
}

impl SoundPlayer for MockSoundPlayer {
    fn play(&self, source: &SoundSource) -> Result<(), SoundError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SoundError::PlaybackError("Mock failure".to_string()));
        }
        if self.disabled.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Ok(mut calls) = self.play_calls.lock() {
            calls.push(source.clone());
        }
        let active = self.active_streams.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_streams.fetch_max(active, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.active_streams.store(0, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.active_streams.load(Ordering::SeqCst) > 0
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    fn enable(&self) {
        self.disabled.store(false, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.disabled.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        let _: fn(bool) -> Result<RodioSoundPlayer, SoundError> = RodioSoundPlayer::new;
        let _: fn() -> SoundSource = get_default_sound;
        let _: fn() -> Vec<SoundSource> = discover_system_sounds;
    }

    mod mock_tests {
        use super::*;

        #[test]
        fn test_mock_counts_overlapping_streams() {
            let mock = MockSoundPlayer::new();
            let source = SoundSource::built_in();

            mock.play(&source).unwrap();
            mock.play(&source).unwrap();
            assert_eq!(mock.max_concurrent_streams(), 2);

            mock.stop();
            assert!(!mock.is_playing());
        }

        #[test]
        fn test_mock_disabled_records_nothing() {
            let mock = MockSoundPlayer::new();
            mock.disable();

            mock.play(&SoundSource::built_in()).unwrap();

            assert_eq!(mock.play_count(), 0);
            assert!(mock.is_disabled());
        }

        #[test]
        fn test_mock_failure() {
            let mock = MockSoundPlayer::new();
            mock.set_should_fail(true);
            assert!(mock.play(&SoundSource::built_in()).is_err());
        }

        #[test]
        fn test_mock_clear_calls() {
            let mock = MockSoundPlayer::new();
            mock.play(&SoundSource::built_in()).unwrap();
            mock.clear_calls();
            assert_eq!(mock.play_count(), 0);
        }
    }
}

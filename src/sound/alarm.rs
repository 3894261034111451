//! The process-wide alarm player.
//!
//! Previews and alarms share one `AlarmPlayer`, so starting either stops the
//! other. Every start hands out a [`PlaybackTicket`]; an alarm that ends
//! stops playback only if nothing newer has started since. A missing backend
//! (no audio device) turns every call into a logged no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::source::{SoundSelection, SoundSource};
use super::SoundPlayer;

/// Identifies one started playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTicket(u64);

/// Plays the selected alarm sound through a single backend.
pub struct AlarmPlayer {
    backend: Option<Arc<dyn SoundPlayer>>,
    selection: RwLock<SoundSelection>,
    generation: AtomicU64,
}

impl AlarmPlayer {
    /// Creates a player with the default sound selected.
    pub fn new(backend: Option<Arc<dyn SoundPlayer>>) -> Self {
        Self::with_selection(backend, None)
    }

    /// Creates a player with `uri` selected.
    pub fn with_selection(backend: Option<Arc<dyn SoundPlayer>>, uri: Option<&str>) -> Self {
        Self {
            backend,
            selection: RwLock::new(SoundSelection::resolve(uri)),
            generation: AtomicU64::new(0),
        }
    }

    /// Creates a player without an audio backend.
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Selects the alarm sound, substituting the default if it is unplayable.
    pub fn select(&self, uri: Option<&str>) -> SoundSelection {
        let selection = SoundSelection::resolve(uri);
        match self.selection.write() {
            Ok(mut current) => *current = selection.clone(),
            Err(poisoned) => *poisoned.into_inner() = selection.clone(),
        }
        selection
    }

    /// Returns the current selection.
    pub fn selection(&self) -> SoundSelection {
        match self.selection.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Plays the selected sound.
    pub fn play(&self) -> PlaybackTicket {
        let source = self.selection().source;
        self.play_source(&source)
    }

    /// Plays `uri` without changing the selection.
    ///
    /// Used for alarms whose sound was fixed when their deadline was armed.
    pub fn play_uri(&self, uri: Option<&str>) -> PlaybackTicket {
        let source = SoundSelection::resolve(uri).source;
        self.play_source(&source)
    }

    /// Plays a resolved source, stopping any stream already playing.
    pub fn play_source(&self, source: &SoundSource) -> PlaybackTicket {
        let ticket = PlaybackTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1);

        let Some(backend) = &self.backend else {
            tracing::debug!("No audio device, skipping '{}'", source.name());
            return ticket;
        };

        backend.stop();
        if let Err(e) = backend.play(source) {
            tracing::warn!("Failed to play '{}': {}", source.name(), e);
        }
        ticket
    }

    /// Stops playback. Never fails.
    pub fn stop(&self) {
        if let Some(backend) = &self.backend {
            backend.stop();
        }
    }

    /// Stops playback if `ticket` is still the latest start.
    ///
    /// Returns false when a newer playback has taken over.
    pub fn stop_if_current(&self, ticket: PlaybackTicket) -> bool {
        if self.generation.load(Ordering::SeqCst) != ticket.0 {
            return false;
        }
        self.stop();
        true
    }

    /// Returns true while a sound is playing.
    pub fn is_playing(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_playing())
    }

    /// Returns true if an audio backend is present.
    pub fn is_available(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_available())
    }
}

impl std::fmt::Debug for AlarmPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmPlayer")
            .field("available", &self.backend.is_some())
            .field("selection", &self.selection())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::source::get_default_sound;
    use crate::sound::MockSoundPlayer;

    fn create_player() -> (Arc<MockSoundPlayer>, AlarmPlayer) {
        let mock = Arc::new(MockSoundPlayer::new());
        let player = AlarmPlayer::new(Some(mock.clone()));
        (mock, player)
    }

    #[test]
    fn test_play_twice_never_overlaps() {
        let (mock, player) = create_player();

        player.play();
        player.play();

        assert_eq!(mock.play_count(), 2);
        assert_eq!(mock.max_concurrent_streams(), 1);
        assert!(player.is_playing());
    }

    #[test]
    fn test_invalid_selection_plays_default() {
        let (mock, player) = create_player();

        let selection = player.select(Some("/nonexistent/ring.wav"));
        player.play();

        assert!(selection.substituted);
        assert_eq!(mock.get_play_calls(), vec![get_default_sound()]);
    }

    #[test]
    fn test_play_uri_keeps_selection() {
        let (mock, player) = create_player();
        player.select(None);

        player.play_uri(Some("/nonexistent/other.wav"));

        assert_eq!(player.selection().uri, None);
        assert_eq!(mock.play_count(), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mock, player) = create_player();

        player.stop();
        player.play();
        player.stop();
        player.stop();

        assert!(!player.is_playing());
        assert!(mock.stop_count() >= 3);
    }

    #[test]
    fn test_stop_if_current_ignores_superseded_ticket() {
        let (mock, player) = create_player();

        let old = player.play();
        let new = player.play();

        assert!(!player.stop_if_current(old));
        assert!(player.is_playing());
        assert!(player.stop_if_current(new));
        assert!(!mock.is_playing());
    }

    #[test]
    fn test_silent_player_is_noop() {
        let player = AlarmPlayer::silent();
        player.play();
        player.stop();
        assert!(!player.is_playing());
        assert!(!player.is_available());
    }

    #[test]
    fn test_backend_failure_is_swallowed() {
        let (mock, player) = create_player();
        mock.set_should_fail(true);

        player.play();

        assert_eq!(mock.play_count(), 0);
    }
}

//! Built-in alarm tone.
//!
//! Used when no system sound is available or the selected file cannot be
//! decoded. The tone is synthesized, so the binary carries no audio data.

use std::time::Duration;

use rodio::source::{SineWave, Source};
use rodio::Sink;

/// A repeating beep pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TonePattern {
    /// Beep frequency in Hz
    pub frequency_hz: f32,
    /// Length of each beep
    pub beep: Duration,
    /// Silence between beeps
    pub gap: Duration,
    /// Number of beeps
    pub repeats: u32,
    /// Output gain (0.0 - 1.0)
    pub volume: f32,
}

/// The default alarm: ten 880 Hz beeps.
pub const DEFAULT_TONE: TonePattern = TonePattern {
    frequency_hz: 880.0,
    beep: Duration::from_millis(400),
    gap: Duration::from_millis(250),
    repeats: 10,
    volume: 0.25,
};

impl TonePattern {
    /// Total playing time of the pattern.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        let beeps = self.beep * self.repeats;
        let gaps = self.gap * self.repeats.saturating_sub(1);
        beeps + gaps
    }

    /// Queues the pattern on a sink.
    pub fn append_to(&self, sink: &Sink) {
        for i in 0..self.repeats {
            let delay = if i == 0 { Duration::ZERO } else { self.gap };
            let beep = SineWave::new(self.frequency_hz)
                .take_duration(self.beep)
                .amplify(self.volume)
                .delay(delay);
            sink.append(beep);
        }
    }
}

impl Default for TonePattern {
    fn default() -> Self {
        DEFAULT_TONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tone() {
        let tone = TonePattern::default();
        assert_eq!(tone.frequency_hz, 880.0);
        assert_eq!(tone.repeats, 10);
    }

    #[test]
    fn test_total_duration() {
        let tone = TonePattern {
            frequency_hz: 440.0,
            beep: Duration::from_millis(100),
            gap: Duration::from_millis(50),
            repeats: 3,
            volume: 1.0,
        };
        assert_eq!(tone.total_duration(), Duration::from_millis(400));
    }

    #[test]
    fn test_total_duration_no_repeats() {
        let tone = TonePattern {
            repeats: 0,
            ..DEFAULT_TONE
        };
        assert_eq!(tone.total_duration(), Duration::ZERO);
    }

    #[test]
    fn test_default_tone_fits_alarm_ceiling() {
        assert!(DEFAULT_TONE.total_duration() < Duration::from_secs(30));
    }
}

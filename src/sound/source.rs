//! Sound sources and the user's sound selection.
//!
//! A selection is validated when it is made: a reference that does not
//! point at a decodable audio file resolves to the default alarm instead.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rodio::Decoder;

use super::error::SoundError;

/// Name of the synthesized alarm tone.
pub const BUILT_IN_TONE: &str = "built-in";

// ============================================================================
// SoundSource
// ============================================================================

/// Represents the source of a sound to be played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundSource {
    /// An audio file on disk.
    File {
        /// Display name (file stem).
        name: String,
        /// The full path to the sound file.
        path: PathBuf,
    },
    /// The synthesized tone built into the binary.
    Embedded {
        /// The name of the embedded sound.
        name: String,
    },
}

impl SoundSource {
    /// Creates a new file sound source without validating it.
    #[must_use]
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::File {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Creates a new embedded sound source.
    #[must_use]
    pub fn embedded(name: impl Into<String>) -> Self {
        Self::Embedded { name: name.into() }
    }

    /// The built-in alarm tone.
    #[must_use]
    pub fn built_in() -> Self {
        Self::embedded(BUILT_IN_TONE)
    }

    /// Parses a filesystem path or `file://` URI.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::InvalidUri` for empty references and for URIs
    /// with any other scheme.
    pub fn from_uri(uri: &str) -> Result<Self, SoundError> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(SoundError::InvalidUri("empty sound reference".to_string()));
        }

        let path = match trimmed.strip_prefix("file://") {
            Some(rest) => PathBuf::from(rest),
            None if trimmed.contains("://") => {
                return Err(SoundError::InvalidUri(trimmed.to_string()));
            }
            None => PathBuf::from(trimmed),
        };

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| SoundError::InvalidUri(trimmed.to_string()))?;

        Ok(Self::File { name, path })
    }

    /// Checks that the source can be played.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::FileNotFound` if the file cannot be opened and
    /// `SoundError::DecodeError` if it is not a supported audio format.
    pub fn validate(&self) -> Result<(), SoundError> {
        match self {
            Self::File { path, .. } => open_decoder(path).map(|_| ()),
            Self::Embedded { .. } => Ok(()),
        }
    }

    /// Returns the name of the sound source.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Embedded { name } => name,
        }
    }

    /// Returns true if this is an embedded sound.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded { .. })
    }

    /// Returns the file path if this is a file sound.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Embedded { .. } => None,
        }
    }
}

/// Opens and decodes an audio file.
pub(crate) fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, SoundError> {
    let file = File::open(path)
        .map_err(|e| SoundError::FileNotFound(format!("{}: {}", path.display(), e)))?;
    Decoder::new(BufReader::new(file)).map_err(|e| SoundError::DecodeError(e.to_string()))
}

// ============================================================================
// SoundSelection
// ============================================================================

/// The user's sound choice after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundSelection {
    /// Reference as chosen by the user (None = unset)
    pub uri: Option<String>,
    /// Source that will actually be played
    pub source: SoundSource,
    /// True if `uri` was rejected and the default took its place
    pub substituted: bool,
}

impl SoundSelection {
    /// Resolves a sound reference, falling back to the default alarm.
    ///
    /// An unset or empty reference selects the default without counting as
    /// a substitution.
    #[must_use]
    pub fn resolve(uri: Option<&str>) -> Self {
        let uri = uri.map(str::trim).filter(|u| !u.is_empty());

        let Some(uri) = uri else {
            return Self {
                uri: None,
                source: get_default_sound(),
                substituted: false,
            };
        };

        match SoundSource::from_uri(uri).and_then(|s| s.validate().map(|()| s)) {
            Ok(source) => Self {
                uri: Some(uri.to_string()),
                source,
                substituted: false,
            },
            Err(e) => {
                tracing::info!("Sound '{}' is not playable ({}), using the default alarm", uri, e);
                Self {
                    uri: Some(uri.to_string()),
                    source: get_default_sound(),
                    substituted: true,
                }
            }
        }
    }
}

// ============================================================================
// System sound discovery
// ============================================================================

/// Directories to search for system sounds, in order of priority.
const SYSTEM_SOUND_DIRS: &[&str] = &[
    "/System/Library/Sounds",
    "/Library/Sounds",
    "/usr/share/sounds/freedesktop/stereo",
];

/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &["aiff", "wav", "mp3", "flac", "ogg", "oga"];

/// Default sound names to try, in order of preference.
const DEFAULT_SOUND_NAMES: &[&str] = &["Glass", "Ping", "alarm-clock-elapsed", "complete", "bell"];

/// Discovers available system sounds.
///
/// Returns an empty vector if no sounds are found.
#[must_use]
pub fn discover_system_sounds() -> Vec<SoundSource> {
    let mut sounds = Vec::new();

    for dir in SYSTEM_SOUND_DIRS {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };

        for entry in entries.flatten() {
            let file_path = entry.path();
            let supported = file_path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()));
            if !supported {
                continue;
            }
            if let Some(stem) = file_path.file_stem() {
                sounds.push(SoundSource::File {
                    name: stem.to_string_lossy().into_owned(),
                    path: file_path,
                });
            }
        }
    }

    sounds.sort_by(|a, b| a.name().cmp(b.name()));
    sounds
}

/// Gets the default alarm sound.
///
/// Prefers a known system sound that decodes, then the built-in tone.
#[must_use]
pub fn get_default_sound() -> SoundSource {
    let system_sounds = discover_system_sounds();

    DEFAULT_SOUND_NAMES
        .iter()
        .filter_map(|preferred| system_sounds.iter().find(|s| s.name() == *preferred))
        .find(|sound| sound.validate().is_ok())
        .cloned()
        .unwrap_or_else(SoundSource::built_in)
}

// ============================================================================
// Tests
// ============================================================================

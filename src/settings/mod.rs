//! Persisted user settings.
//!
//! Settings live in `<config-dir>/pomodoro-alarm/settings.toml`. Missing
//! keys and a missing file fall back to the defaults (25/5/15/4 and no
//! custom sound). Field updates arrive as raw text; anything that is not a
//! positive integer is reverted to the last known-good value.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::types::{ConfigError, ConfigureParams, CycleConfig};

// ============================================================================
// Constants
// ============================================================================

const SETTINGS_DIR: &str = "pomodoro-alarm";
const SETTINGS_FILE: &str = "settings.toml";

// ============================================================================
// Settings
// ============================================================================

/// User preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Work interval in minutes
    pub work_minutes: u32,
    /// Short break in minutes
    pub break_minutes: u32,
    /// Long break in minutes
    pub long_break_minutes: u32,
    /// Work/break cycles before a long break
    pub cycles_before_long_break: u32,
    /// Selected alarm sound (empty = default)
    pub alarm_uri: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
            cycles_before_long_break: 4,
            alarm_uri: String::new(),
        }
    }
}

impl Settings {
    /// Builds the cycle configuration these settings describe.
    pub fn cycle_config(&self) -> Result<CycleConfig, ConfigError> {
        CycleConfig::from_minutes(
            self.work_minutes,
            self.break_minutes,
            self.long_break_minutes,
            self.cycles_before_long_break,
        )
    }

    /// Returns the selected sound, None if unset.
    pub fn alarm_uri(&self) -> Option<&str> {
        Some(self.alarm_uri.as_str()).filter(|uri| !uri.is_empty())
    }

    /// Stores the selected sound.
    pub fn set_alarm_uri(&mut self, uri: Option<&str>) {
        self.alarm_uri = uri.unwrap_or_default().to_string();
    }

    /// Replaces non-positive values (e.g. from a hand-edited file) with defaults.
    pub fn sanitized(mut self) -> Self {
        let mut defaults = Self::default();
        for field in SettingsField::ALL {
            if *self.slot(field) == 0 {
                let fallback = *defaults.slot(field);
                tracing::warn!(
                    "Setting '{}' must be positive, using default {}",
                    field.as_str(),
                    fallback
                );
                *self.slot(field) = fallback;
            }
        }
        self
    }

    /// Applies a raw text value to one field.
    pub fn apply_field(&mut self, field: SettingsField, raw: &str) -> FieldUpdate {
        let slot = self.slot(field);
        match raw.trim().parse::<u32>() {
            Ok(value) if value > 0 => {
                *slot = value;
                FieldUpdate::Applied(value)
            }
            _ => {
                tracing::debug!("Rejected {} value '{}', keeping {}", field.as_str(), raw, slot);
                FieldUpdate::Reverted(*slot)
            }
        }
    }

    /// Applies every field present in `params`.
    pub fn apply(&mut self, params: &ConfigureParams) -> Vec<(SettingsField, FieldUpdate)> {
        let raw_values = [
            (SettingsField::Work, params.work.as_deref()),
            (SettingsField::Break, params.break_time.as_deref()),
            (SettingsField::LongBreak, params.long_break.as_deref()),
            (SettingsField::Cycles, params.cycles.as_deref()),
        ];

        raw_values
            .into_iter()
            .filter_map(|(field, raw)| raw.map(|raw| (field, self.apply_field(field, raw))))
            .collect()
    }

    fn slot(&mut self, field: SettingsField) -> &mut u32 {
        match field {
            SettingsField::Work => &mut self.work_minutes,
            SettingsField::Break => &mut self.break_minutes,
            SettingsField::LongBreak => &mut self.long_break_minutes,
            SettingsField::Cycles => &mut self.cycles_before_long_break,
        }
    }
}

// ============================================================================
// SettingsField / FieldUpdate
// ============================================================================

/// A numeric setting editable from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    /// Work minutes
    Work,
    /// Break minutes
    Break,
    /// Long break minutes
    LongBreak,
    /// Cycles before a long break
    Cycles,
}

impl SettingsField {
    /// Every numeric field.
    pub const ALL: [SettingsField; 4] = [
        SettingsField::Work,
        SettingsField::Break,
        SettingsField::LongBreak,
        SettingsField::Cycles,
    ];

    /// Wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsField::Work => "work",
            SettingsField::Break => "break",
            SettingsField::LongBreak => "longBreak",
            SettingsField::Cycles => "cycles",
        }
    }
}

/// Result of applying a raw field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate {
    /// The value was accepted
    Applied(u32),
    /// The value was malformed; the previous value is kept
    Reverted(u32),
}

impl FieldUpdate {
    /// Returns true if the value was rejected.
    pub fn is_reverted(&self) -> bool {
        matches!(self, FieldUpdate::Reverted(_))
    }
}

// ============================================================================
// SettingsStore
// ============================================================================

/// Loads and saves [`Settings`] as TOML.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store for an explicit file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at the platform config location.
    pub fn default_location() -> Result<Self> {
        let config_dir = dirs::config_dir().context("Could not determine the config directory")?;
        Ok(Self::new(config_dir.join(SETTINGS_DIR).join(SETTINGS_FILE)))
    }

    /// Path of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the settings, defaulting when the file does not exist.
    pub fn load(&self) -> Result<Settings> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings at {:?}, using defaults", self.path);
                return Ok(Settings::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read settings: {:?}", self.path))
            }
        };

        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse settings: {:?}", self.path))?;
        Ok(settings.sanitized())
    }

    /// Saves the settings atomically.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let dir = self
            .path
            .parent()
            .context("Settings path has no parent directory")?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create settings directory: {:?}", dir))?;

        let content = toml::to_string_pretty(settings).context("Failed to serialize settings")?;
        let mut temp = NamedTempFile::new_in(dir).context("Failed to create temp file")?;
        temp.write_all(content.as_bytes())
            .context("Failed to write settings")?;
        temp.persist(&self.path)
            .with_context(|| format!("Failed to persist settings: {:?}", self.path))?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

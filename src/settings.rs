//! Session settings and tunable tables
//!
//! Persisted as JSON next to the schedule. Missing fields fall back to defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::Result;
use crate::sim::judge::AccuracyTable;
use crate::sim::score::ScoreWeights;

/// How a run is scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionMode {
    /// Play the chart through once
    #[default]
    Standard,
    /// Lives, regeneration and difficulty levels
    Endless,
    /// Required inputs must be cleared before moving on
    Practice,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Standard => "Standard",
            SessionMode::Endless => "Endless",
            SessionMode::Practice => "Practice",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "standard" | "std" => Some(SessionMode::Standard),
            "endless" => Some(SessionMode::Endless),
            "practice" => Some(SessionMode::Practice),
            _ => None,
        }
    }

    /// Whether misses cost lives in this mode
    pub fn uses_lives(&self) -> bool {
        matches!(self, SessionMode::Endless)
    }
}

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: SessionMode,
    /// Fail the run's perfect flag on the first miss
    pub going_for_perfect: bool,
    pub max_lives: i32,

    // === Timing ===
    /// Calibration added to every press timestamp (seconds)
    pub input_offset_sec: f64,
    pub accuracy: AccuracyTable,
    pub weights: ScoreWeights,

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    pub muted: bool,

    /// Seed for arc variance
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: SessionMode::Standard,
            going_for_perfect: false,
            max_lives: DEFAULT_MAX_LIVES,

            // Timing
            input_offset_sec: 0.0,
            accuracy: AccuracyTable::default(),
            weights: ScoreWeights::default(),

            // Audio
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,

            seed: 0x5eed,
        }
    }
}

impl Settings {
    /// Create settings for a session mode (applies mode defaults)
    pub fn for_mode(mode: SessionMode) -> Self {
        let mut settings = Self::default();
        settings.apply_mode(mode);
        settings
    }

    pub fn apply_mode(&mut self, mode: SessionMode) {
        self.mode = mode;
        // Practice is about learning the chart, not surviving it
        if mode == SessionMode::Practice {
            self.going_for_perfect = false;
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&json)?;
        settings.accuracy.validate()?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Using default settings ({}: {})", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Settings saved");
        Ok(())
    }
}

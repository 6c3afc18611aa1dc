//! Rod Rhythm - beat-accurate judging for a rod-bouncing rhythm game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (tempo map, lanes, rods, judging, scoring)
//! - `schedule`: Compiled block/target schedule loading
//! - `input`: Button events and the capture-thread input queue
//! - `audio`: Fire-and-forget sound effect requests
//! - `settings`: Session configuration and tunable tables
//! - `highscores`: Top-score table persisted at terminal events

pub mod audio;
pub mod error;
pub mod highscores;
pub mod input;
pub mod schedule;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, Result};
pub use highscores::HighScores;
pub use schedule::Schedule;
pub use settings::{SessionMode, Settings};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const SIM_DT: f64 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Widest timing error (seconds) that still counts as a hit
    pub const MAX_OFFSET_SEC: f64 = 0.05;
    /// Beats between a rod's deployment and its arrival at its origin block
    pub const LEAD_BEATS: f64 = 1.0;
    /// A rod is force-killed this many beats after deployment
    pub const ROD_LIFETIME_BEATS: f64 = 7.0;
    pub const DEFAULT_X_UNITS_PER_BEAT: f64 = 1.0;

    /// Lane geometry (block i is centred on x = i, one unit wide)
    pub const BASE_ROW_HEIGHT: f64 = 0.0;
    pub const PISTON_HEIGHT: f64 = 1.0;
    /// How long a triggered piston stays extended
    pub const PISTON_HOLD_BEATS: f64 = 0.5;
    /// Depth between lanes (z axis)
    pub const LANE_SPACING: f64 = 2.0;
    /// Fraction of a segment a rod must cross before a raised obstacle stops it
    pub const TRAILING_EDGE: f64 = 0.85;

    /// Free-fall acceleration (units/s²)
    pub const GRAVITY: f64 = 30.0;
    /// Landing overshoot per unit of signed accuracy
    pub const LANDING_SLOP: f64 = 0.1;
    /// Random spread applied to landing x and peak height
    pub const ARC_VARIANCE: f64 = 0.05;

    /// Lives
    pub const DEFAULT_MAX_LIVES: i32 = 3;
    /// Hits needed to regenerate one life in endless mode
    pub const LIFE_REGEN_INTERVAL: u32 = 8;
    /// Hits per endless difficulty level
    pub const ENDLESS_LEVEL_STEP: u32 = 16;
    /// Timing window lost per endless level
    pub const ENDLESS_WINDOW_STEP: f64 = 0.05;
    /// Narrowest endless window, as a fraction of the configured one
    pub const ENDLESS_MIN_WINDOW_SCALE: f64 = 0.6;

    /// Tolerance for comparing scheduled beats
    pub const BEAT_EPSILON: f64 = 1e-6;
}

/// True when two scheduled beats refer to the same moment
#[inline]
pub fn beats_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < consts::BEAT_EPSILON
}

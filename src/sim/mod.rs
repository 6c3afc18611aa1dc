//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No audio or platform dependencies beyond queued events

pub mod arc;
pub mod collision;
pub mod judge;
pub mod lane;
pub mod rod;
pub mod score;
pub mod state;
pub mod tempo;
pub mod tick;

pub use arc::BounceArc;
pub use collision::{CollisionResult, floor_height, rod_wall_collision};
pub use judge::{AccuracyClass, AccuracyTable, InputResult, judge};
pub use lane::{Lane, Target, TargetState};
pub use rod::{ExpectedState, Rod, RodKind};
pub use score::{PerfectChallenge, PracticeTracker, ScoreSession, ScoreWeights};
pub use state::{GameEvent, GamePhase, GameState};
pub use tempo::{TempoChange, TempoMap};
pub use tick::{TickInput, tick};

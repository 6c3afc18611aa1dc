//! Input judge
//!
//! Resolves a button press to the block a rod is over, measures the signed
//! timing error against the beat the rod should be there, and buckets it.
//! Presses that fail screening are dropped (logged at trace), never errors.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::arc::BounceArc;
use super::lane::TargetState;
use super::rod::{ExpectedState, Rod};
use super::state::{GameEvent, GameState};
use crate::audio::SoundEffect;
use crate::consts::*;
use crate::error::{ConfigError, Result};
use crate::input::InputType;

/// Slack on the window edge so a press exactly `max_offset_sec` away still
/// counts after float round-off
const WINDOW_EPSILON: f64 = 1e-9;

/// Timing quality, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccuracyClass {
    Ace,
    Good,
    Barely,
    Miss,
}

impl AccuracyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccuracyClass::Ace => "Ace",
            AccuracyClass::Good => "Good",
            AccuracyClass::Barely => "Barely",
            AccuracyClass::Miss => "Miss",
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        *self != AccuracyClass::Miss
    }
}

/// Class boundaries on |accuracy percent|. Tuned values, overridable via settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyTable {
    /// Widest error (seconds) that still hits
    pub max_offset_sec: f64,
    pub ace_max: f64,
    pub good_max: f64,
    pub barely_max: f64,
}

impl Default for AccuracyTable {
    fn default() -> Self {
        Self {
            max_offset_sec: MAX_OFFSET_SEC,
            ace_max: 0.3,
            good_max: 0.7,
            barely_max: 1.0,
        }
    }
}

impl AccuracyTable {
    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 < self.ace_max
            && self.ace_max <= self.good_max
            && self.good_max <= self.barely_max
            && self.barely_max <= 1.0;
        if ordered && self.max_offset_sec.is_finite() && self.max_offset_sec > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::InvalidAccuracyTable)
        }
    }

    #[inline]
    pub fn in_window(&self, difference_sec: f64) -> bool {
        difference_sec.abs() <= self.max_offset_sec + WINDOW_EPSILON
    }

    /// Signed error as a fraction of the window, clamped to [-1, 1]
    #[inline]
    pub fn accuracy_percent(&self, difference_sec: f64) -> f64 {
        (difference_sec / self.max_offset_sec).clamp(-1.0, 1.0)
    }

    pub fn classify(&self, accuracy_percent: f64) -> AccuracyClass {
        let magnitude = accuracy_percent.abs();
        if magnitude <= self.ace_max {
            AccuracyClass::Ace
        } else if magnitude <= self.good_max {
            AccuracyClass::Good
        } else if magnitude <= self.barely_max + WINDOW_EPSILON {
            AccuracyClass::Barely
        } else {
            AccuracyClass::Miss
        }
    }
}

/// One judged press. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputResult {
    pub rod_id: u32,
    pub lane: usize,
    pub perfect_beat: f64,
    pub input_type: InputType,
    /// Signed error / window, in [-1, 1] (positive = late)
    pub accuracy_percent: f64,
    /// Signed error in seconds
    pub accuracy_sec: f64,
    pub judged_index: usize,
    pub accuracy_class: AccuracyClass,
}

/// Why a press was not judged against a rod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Rod is wall-stopped, exploded or killed
    NotAccepting,
    OutOfRangeIndex,
    /// Already judged at this index
    DuplicateJudgment,
    /// Rod passes this block without needing a press
    NotExpected,
    WrongInputType,
    /// Lane has already moved past this block
    BehindActive,
}

/// Screen a press against one rod, returning the block index to judge
pub fn screen(
    state: &GameState,
    rod: &Rod,
    lane_slot: usize,
    input_type: InputType,
    at_beat: f64,
) -> std::result::Result<usize, Rejection> {
    if !rod.accepting_inputs() {
        return Err(Rejection::NotAccepting);
    }
    let index = rod
        .next_block_index(at_beat)
        .filter(|&i| i < rod.tracked_targets.len())
        .ok_or(Rejection::OutOfRangeIndex)?;

    let already_judged = state
        .results
        .iter()
        .any(|r| r.rod_id == rod.id && r.judged_index == index);
    if already_judged {
        return Err(Rejection::DuplicateJudgment);
    }
    match rod.tracked_targets[index] {
        ExpectedState::Pending => {}
        ExpectedState::NotExpected => return Err(Rejection::NotExpected),
        ExpectedState::Hit | ExpectedState::Missed => return Err(Rejection::DuplicateJudgment),
    }

    let lane = &state.lanes[lane_slot];
    if lane.targets[index].input_type != input_type {
        return Err(Rejection::WrongInputType);
    }
    if index < lane.active_index() {
        return Err(Rejection::BehindActive);
    }
    if lane.is_resolved(index) {
        return Err(Rejection::DuplicateJudgment);
    }
    Ok(index)
}

/// Judge a press of `input_type` at song time `at_seconds` against every
/// live rod on every lane of that type. Returns the first result produced.
pub fn judge(state: &mut GameState, input_type: InputType, at_seconds: f64) -> Option<InputResult> {
    let at_beat = state.tempo.seconds_to_beats(at_seconds);
    let mut first = None;

    for lane_slot in 0..state.lanes.len() {
        if state.lanes[lane_slot].input_type != input_type {
            continue;
        }
        let lane_id = state.lanes[lane_slot].id;

        for rod_slot in 0..state.rods.len() {
            if state.rods[rod_slot].lane != lane_id {
                continue;
            }
            let view: &GameState = state;
            let index = match screen(view, &view.rods[rod_slot], lane_slot, input_type, at_beat) {
                Ok(index) => index,
                Err(rejection) => {
                    log::trace!(
                        "press {} @ {:.4}s rejected for rod {}: {:?}",
                        input_type.as_str(),
                        at_seconds,
                        state.rods[rod_slot].id,
                        rejection
                    );
                    continue;
                }
            };

            let result =
                judge_index(state, lane_slot, rod_slot, index, input_type, at_seconds, at_beat);
            if first.is_none() {
                first = result;
            }
        }
    }

    first
}

fn judge_index(
    state: &mut GameState,
    lane_slot: usize,
    rod_slot: usize,
    index: usize,
    input_type: InputType,
    at_seconds: f64,
    at_beat: f64,
) -> Option<InputResult> {
    let active = state.lanes[lane_slot].front_unresolved();
    if index > active {
        // Too late for the lane's pending target
        forfeit_active(state, lane_slot);
        return None;
    }

    let rod = &state.rods[rod_slot];
    let lane_id = rod.lane;
    let perfect_beat = rod.perfect_beat(index);
    let perfect_seconds = state.tempo.beats_to_seconds(perfect_beat);
    let difference = at_seconds - perfect_seconds;

    // Screening rejects resolved blocks, so `index` is the lane's front here
    let table = state.effective_accuracy();
    let class = if table.in_window(difference) {
        table.classify(table.accuracy_percent(difference))
    } else {
        AccuracyClass::Miss
    };

    let result = InputResult {
        rod_id: rod.id,
        lane: lane_id,
        perfect_beat,
        input_type,
        accuracy_percent: table.accuracy_percent(difference),
        accuracy_sec: difference,
        judged_index: index,
        accuracy_class: class,
    };
    log::debug!(
        "rod {} block {}: {} ({:+.1}ms)",
        result.rod_id,
        index,
        class.as_str(),
        difference * 1000.0
    );

    state.events.push(GameEvent::Flash {
        lane: lane_id,
        class,
    });

    if class.is_hit() {
        state.rods[rod_slot].resolve(index, ExpectedState::Hit);
        state.lanes[lane_slot].post(index, TargetState::Hit);
        commit_bounce(state, lane_slot, rod_slot, index, result.accuracy_percent, at_beat);
        state.results.push(result.clone());
        state.events.push(GameEvent::PlaySound(SoundEffect::for_class(class)));
        state.session.record_hit(&result, &mut state.events);
        if class == AccuracyClass::Ace {
            state.session.try_skill_bonus(perfect_beat, &mut state.events);
        }
    } else {
        state.rods[rod_slot].resolve(index, ExpectedState::Missed);
        state.lanes[lane_slot].post(index, TargetState::Missed);
        state.results.push(result.clone());
        state.events.push(GameEvent::PlaySound(SoundEffect::Miss));
        state.session.missed(&mut state.events);
    }

    Some(result)
}

/// Score a miss against the lane's active target on behalf of a late press
fn forfeit_active(state: &mut GameState, lane_slot: usize) {
    let lane = &mut state.lanes[lane_slot];
    let active = lane.front_unresolved();
    if active >= lane.len() {
        return;
    }
    lane.post(active, TargetState::Missed);
    let lane_id = lane.id;

    // One miss per rod that was expecting the block
    let owners = state
        .rods
        .iter_mut()
        .filter(|r| r.lane == lane_id)
        .map(|rod| rod.resolve(active, ExpectedState::Missed))
        .filter(|&resolved| resolved)
        .count();
    if owners == 0 {
        return;
    }
    log::debug!("lane {} block {} forfeited by a late press", lane_id, active);

    state.events.push(GameEvent::Flash {
        lane: lane_id,
        class: AccuracyClass::Miss,
    });
    state.events.push(GameEvent::PlaySound(SoundEffect::Miss));
    for _ in 0..owners {
        state.session.missed(&mut state.events);
    }
}

/// Launch the rod on a bounce arc. Central blocks and accurate presses give
/// taller, truer arcs; late presses land slightly long.
fn commit_bounce(
    state: &mut GameState,
    lane_slot: usize,
    rod_slot: usize,
    index: usize,
    accuracy_percent: f64,
    at_beat: f64,
) {
    let lane = &state.lanes[lane_slot];
    let centrality = lane.centrality(index);
    let base = lane.base_height;
    let variance = state.rng.random_range(-ARC_VARIANCE..=ARC_VARIANCE);

    let rod = &mut state.rods[rod_slot];
    let kind = rod.kind;
    let (start_x, start_y) = (rod.position.x, rod.position.y);

    let end_x = index as f64 + kind.arc_span_blocks() + accuracy_percent * LANDING_SLOP + variance;
    let peak = base
        + kind.peak_height() * (0.9 + 0.2 * centrality) * (1.0 - 0.15 * accuracy_percent.abs())
        + variance;

    rod.collision.bounce_arc = Some(BounceArc::new(
        start_x,
        start_y,
        end_x,
        base,
        peak.max(start_y),
        at_beat,
    ));
}

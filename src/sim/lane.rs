//! Lane (row) of target blocks
//!
//! Block `i` is centred on x = i. Each block is one schedulable target slot.
//! The lane owns the only writer of `active_index`: other call sites post
//! resolutions to the inbox and the lane applies them during its own update.

use serde::{Deserialize, Serialize};

use super::tempo::TempoMap;
use crate::consts::*;
use crate::beats_equal;
use crate::input::InputType;

/// Resolution of a lane target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetState {
    Pending,
    Hit,
    Missed,
}

/// One expected-input slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Beat at which a rod should be pressed over this block
    pub beat: f64,
    pub input_type: InputType,
    pub state: TargetState,
    /// Beat the piston under this block extended (None = never triggered)
    #[serde(default)]
    pub extended_at: Option<f64>,
}

impl Target {
    pub fn new(beat: f64, input_type: InputType) -> Self {
        Self {
            beat,
            input_type,
            state: TargetState::Pending,
            extended_at: None,
        }
    }
}

/// A row of blocks judged with one button class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lane {
    pub id: usize,
    pub input_type: InputType,
    pub targets: Vec<Target>,
    /// Height of the row's block tops
    pub base_height: f64,
    /// First target still `Pending`, or `targets.len()`
    active_index: usize,
    /// Next target whose piston has not fired yet
    next_trigger: usize,
    /// Resolutions posted since the last update
    #[serde(skip)]
    inbox: Vec<(usize, TargetState)>,
}

impl Lane {
    /// Create a lane; targets are ordered by beat so index == block position
    pub fn new(id: usize, input_type: InputType, mut targets: Vec<Target>) -> Self {
        targets.sort_by(|a, b| a.beat.total_cmp(&b.beat));
        Self {
            id,
            input_type,
            targets,
            base_height: BASE_ROW_HEIGHT,
            active_index: 0,
            next_trigger: 0,
            inbox: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[inline]
    pub fn active_index(&self) -> usize {
        self.active_index
    }

    /// True once every target has been resolved
    pub fn is_exhausted(&self) -> bool {
        self.active_index >= self.targets.len()
    }

    /// Queue a resolution for the next update. First resolution wins.
    pub fn post(&mut self, index: usize, state: TargetState) {
        if index < self.targets.len() && state != TargetState::Pending {
            self.inbox.push((index, state));
        }
    }

    /// True if `index` is resolved or has a resolution waiting in the inbox
    pub fn is_resolved(&self, index: usize) -> bool {
        match self.targets.get(index) {
            Some(t) if t.state != TargetState::Pending => true,
            Some(_) => self.inbox.iter().any(|&(i, _)| i == index),
            None => true,
        }
    }

    /// First target that is neither resolved nor awaiting a posted
    /// resolution. Runs ahead of `active_index` between updates.
    pub fn front_unresolved(&self) -> usize {
        (self.active_index..self.targets.len())
            .find(|&i| !self.is_resolved(i))
            .unwrap_or(self.targets.len())
    }

    /// Apply posted resolutions, then move the cursor past resolved targets
    /// and past pending targets whose late window has closed.
    ///
    /// Returns the indices that timed out during this call; the caller
    /// reports each one as a miss.
    pub fn advance_active_index(
        &mut self,
        now_seconds: f64,
        tempo: &TempoMap,
        late_window_sec: f64,
    ) -> Vec<usize> {
        for (index, state) in self.inbox.drain(..) {
            let target = &mut self.targets[index];
            if target.state == TargetState::Pending {
                target.state = state;
            }
        }

        let mut timed_out = Vec::new();
        while let Some(target) = self.targets.get_mut(self.active_index) {
            if target.state == TargetState::Pending {
                let closes_at = tempo.beats_to_seconds(target.beat) + late_window_sec;
                if now_seconds <= closes_at {
                    break;
                }
                target.state = TargetState::Missed;
                timed_out.push(self.active_index);
            }
            self.active_index += 1;
        }
        timed_out
    }

    /// Extend the piston of the target scheduled at `at_beat`.
    /// Does not judge anything.
    pub fn trigger_target(&mut self, at_beat: f64) -> Option<usize> {
        let index = self
            .targets
            .partition_point(|t| t.beat < at_beat - BEAT_EPSILON);
        let target = self.targets.get_mut(index)?;
        if !beats_equal(target.beat, at_beat) {
            return None;
        }
        target.extended_at = Some(at_beat);
        Some(index)
    }

    /// Fire every piston whose beat has been reached
    pub fn trigger_due(&mut self, now_beat: f64) -> Vec<usize> {
        let mut fired = Vec::new();
        while let Some(target) = self.targets.get_mut(self.next_trigger) {
            if target.beat > now_beat {
                break;
            }
            target.extended_at = Some(target.beat);
            fired.push(self.next_trigger);
            self.next_trigger += 1;
        }
        fired
    }

    /// Top of the obstacle in `segment` at `beat`
    pub fn segment_height(&self, segment: i64, beat: f64) -> f64 {
        if segment < 0 {
            return self.base_height;
        }
        let raised = self
            .targets
            .get(segment as usize)
            .and_then(|t| t.extended_at)
            .is_some_and(|at| beat >= at && beat - at < PISTON_HOLD_BEATS);
        if raised {
            self.base_height + PISTON_HEIGHT
        } else {
            self.base_height
        }
    }

    /// 1.0 for the middle block, falling to 0.0 at either end
    pub fn centrality(&self, index: usize) -> f64 {
        if self.targets.len() <= 1 {
            return 1.0;
        }
        let t = index as f64 / (self.targets.len() - 1) as f64;
        (1.0 - (2.0 * t - 1.0).abs()).clamp(0.0, 1.0)
    }
}

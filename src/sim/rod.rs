//! Rod entity
//!
//! A rod travels along a lane at a fixed rate in x units per beat. Its
//! horizontal position is a pure function of the beat until it hits a wall;
//! the vertical position is integrated per tick (free fall or bounce arc).

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::arc::BounceArc;
use super::collision::segment_of;
use super::lane::{Lane, TargetState};
use crate::beats_equal;
use crate::consts::*;

/// Rod variants. Each supplies its own bounce shape and gravity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RodKind {
    /// Hops one block per bounce
    #[default]
    Standard,
    /// Hops two blocks per bounce with a high arc
    Lofty,
    /// Hops one block with a flat arc and falls fast
    Heavy,
}

impl RodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RodKind::Standard => "Standard",
            RodKind::Lofty => "Lofty",
            RodKind::Heavy => "Heavy",
        }
    }

    /// Blocks travelled by one bounce
    pub fn arc_span_blocks(&self) -> f64 {
        match self {
            RodKind::Standard | RodKind::Heavy => 1.0,
            RodKind::Lofty => 2.0,
        }
    }

    /// Nominal peak above the block tops
    pub fn peak_height(&self) -> f64 {
        match self {
            RodKind::Standard => 2.4,
            RodKind::Lofty => 3.6,
            RodKind::Heavy => 2.0,
        }
    }

    pub fn gravity_scale(&self) -> f64 {
        match self {
            RodKind::Standard => 1.0,
            RodKind::Lofty => 0.8,
            RodKind::Heavy => 1.6,
        }
    }
}

/// What the rod expects at each lane target (aligned by index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedState {
    /// The rod passes this block without needing a press
    NotExpected,
    Pending,
    Hit,
    Missed,
}

/// Wall/bounce sub-state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollisionState {
    /// Horizontal motion has stopped for good
    pub collided_with_wall: bool,
    pub velocity_y: f64,
    pub bounce_arc: Option<BounceArc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rod {
    pub id: u32,
    pub lane: usize,
    pub kind: RodKind,
    pub deploy_beat: f64,
    /// Block the rod reaches first, `LEAD_BEATS` after deployment
    pub origin_block: usize,
    pub x_units_per_beat: f64,
    pub position: DVec3,
    pub tracked_targets: Vec<ExpectedState>,
    pub collision: CollisionState,
    pub exploded: bool,
    pub killed: bool,
}

impl Rod {
    /// Deploy a rod onto `lane`. A target is expected exactly when its
    /// scheduled beat equals the beat this rod reaches that block.
    pub fn deploy(
        id: u32,
        lane: &Lane,
        deploy_beat: f64,
        origin_block: usize,
        x_units_per_beat: f64,
        kind: RodKind,
    ) -> Self {
        let mut rod = Self {
            id,
            lane: lane.id,
            kind,
            deploy_beat,
            origin_block,
            x_units_per_beat,
            position: DVec3::ZERO,
            tracked_targets: Vec::with_capacity(lane.len()),
            collision: CollisionState::default(),
            exploded: false,
            killed: false,
        };

        rod.tracked_targets = lane
            .targets
            .iter()
            .enumerate()
            .map(|(i, target)| {
                let arrives = i >= origin_block && beats_equal(target.beat, rod.perfect_beat(i));
                if arrives && target.state == TargetState::Pending {
                    ExpectedState::Pending
                } else {
                    ExpectedState::NotExpected
                }
            })
            .collect();

        rod.position = DVec3::new(
            rod.x_at(deploy_beat),
            lane.base_height,
            lane.id as f64 * LANE_SPACING,
        );
        rod
    }

    /// Unobstructed x position at `beat`
    #[inline]
    pub fn x_at(&self, beat: f64) -> f64 {
        self.origin_block as f64 + (beat - self.deploy_beat - LEAD_BEATS) * self.x_units_per_beat
    }

    /// Beat at which the rod is centred over block `index`
    #[inline]
    pub fn perfect_beat(&self, index: usize) -> f64 {
        self.deploy_beat
            + LEAD_BEATS
            + (index as f64 - self.origin_block as f64) / self.x_units_per_beat
    }

    /// Block the rod is over at `beat` (None before the lane starts)
    pub fn next_block_index(&self, beat: f64) -> Option<usize> {
        let segment = segment_of(self.x_at(beat));
        usize::try_from(segment).ok()
    }

    #[inline]
    pub fn beats_alive(&self, beat: f64) -> f64 {
        beat - self.deploy_beat
    }

    /// Wall-stopped, exploded or killed rods ignore presses
    #[inline]
    pub fn accepting_inputs(&self) -> bool {
        !self.collision.collided_with_wall && !self.exploded && !self.killed
    }

    pub fn expected_count(&self) -> usize {
        self.tracked_targets
            .iter()
            .filter(|s| **s != ExpectedState::NotExpected)
            .count()
    }

    pub fn has_successful_judgment(&self) -> bool {
        self.tracked_targets.contains(&ExpectedState::Hit)
    }

    /// Resolve a pending entry. Returns false if it was already resolved
    /// or not expected.
    pub fn resolve(&mut self, index: usize, state: ExpectedState) -> bool {
        match self.tracked_targets.get_mut(index) {
            Some(entry) if *entry == ExpectedState::Pending => {
                *entry = state;
                true
            }
            _ => false,
        }
    }

    pub fn pending_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.tracked_targets
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == ExpectedState::Pending)
            .map(|(i, _)| i)
    }

    pub fn is_airborne(&self) -> bool {
        self.collision.bounce_arc.is_some() || self.collision.velocity_y != 0.0
    }

    pub fn explode(&mut self) {
        self.exploded = true;
        self.collision.bounce_arc = None;
    }

    /// Retire the rod. An arc still in flight is abandoned.
    pub fn kill(&mut self) -> Option<BounceArc> {
        self.killed = true;
        self.collision.bounce_arc.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputType;
    use crate::sim::lane::Target;

    fn lane(beats: &[f64]) -> Lane {
        let targets = beats.iter().map(|&b| Target::new(b, InputType::A)).collect();
        Lane::new(0, InputType::A, targets)
    }

    #[test]
    fn test_deploy_aligns_tracking_with_arrival_beats() {
        // Rod deployed at beat 0 reaches block i at beat 1 + i
        let lane = lane(&[1.0, 2.0, 3.5, 4.0]);
        let rod = Rod::deploy(1, &lane, 0.0, 0, 1.0, RodKind::Standard);
        assert_eq!(
            rod.tracked_targets,
            vec![
                ExpectedState::Pending,
                ExpectedState::Pending,
                ExpectedState::NotExpected,
                ExpectedState::Pending,
            ]
        );
        assert_eq!(rod.expected_count(), 3);
        assert_eq!(rod.position.x, -LEAD_BEATS);
    }

    #[test]
    fn test_origin_block_offsets_arrival() {
        let lane = lane(&[1.0, 2.0, 5.0, 6.0]);
        let rod = Rod::deploy(2, &lane, 2.0, 2, 1.0, RodKind::Standard);
        assert_eq!(rod.perfect_beat(2), 3.0);
        assert_eq!(rod.tracked_targets[0], ExpectedState::NotExpected);
        assert_eq!(rod.tracked_targets[1], ExpectedState::NotExpected);
        assert_eq!(rod.x_at(3.0), 2.0);
    }

    #[test]
    fn test_next_block_index_rounds_to_nearest_block() {
        let lane = lane(&[1.0, 2.0]);
        let rod = Rod::deploy(1, &lane, 0.0, 0, 2.0, RodKind::Standard);
        // x = (beat - 1) * 2
        assert_eq!(rod.next_block_index(0.0), None);
        assert_eq!(rod.next_block_index(0.95), Some(0));
        assert_eq!(rod.next_block_index(1.3), Some(1));
        assert_eq!(rod.perfect_beat(1), 1.5);
    }

    #[test]
    fn test_resolve_only_from_pending() {
        let lane = lane(&[1.0, 2.0]);
        let mut rod = Rod::deploy(1, &lane, 0.0, 0, 1.0, RodKind::Standard);
        assert!(rod.resolve(0, ExpectedState::Hit));
        assert!(!rod.resolve(0, ExpectedState::Missed));
        assert!(!rod.resolve(9, ExpectedState::Hit));
        assert!(rod.has_successful_judgment());
        assert_eq!(rod.pending_indices().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_kill_abandons_arc() {
        let lane = lane(&[1.0]);
        let mut rod = Rod::deploy(1, &lane, 0.0, 0, 1.0, RodKind::Lofty);
        rod.collision.bounce_arc = Some(BounceArc::new(0.0, 0.0, 2.0, 0.0, 3.0, 1.0));
        assert!(rod.accepting_inputs());
        assert!(rod.kill().is_some());
        assert!(rod.collision.bounce_arc.is_none());
        assert!(!rod.accepting_inputs());
    }
}

//! Wall and floor checks against a lane's blocks
//!
//! Segment `s` spans x in [s - 0.5, s + 0.5). A raised obstacle only stops a
//! rod once the rod is `TRAILING_EDGE` of the way into the segment, so the rod
//! visibly overlaps the piston before it halts.

use super::lane::Lane;
use crate::consts::*;

/// Height tolerance when comparing a rod against a surface
const SURFACE_EPSILON: f64 = 1e-6;

/// Segment containing `x`
#[inline]
pub fn segment_of(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// x at which a rod in `segment` crosses the trailing-edge threshold
#[inline]
pub fn wall_stop_x(segment: i64) -> f64 {
    segment as f64 - 0.5 + TRAILING_EDGE
}

/// Result of a wall check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether the rod ran into an obstacle
    pub hit: bool,
    /// Segment holding the obstacle
    pub segment: i64,
    /// Where the rod stops
    pub clamp_x: f64,
    /// Top of the obstacle
    pub obstacle_height: f64,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            segment: 0,
            clamp_x: 0.0,
            obstacle_height: 0.0,
        }
    }
}

/// Check a rod moving from `from_x` to `to_x` at height `y` for a wall stop.
///
/// Every threshold crossed during the move is tested, so a fast rod cannot
/// step over an obstacle between ticks. A rod already past the threshold of
/// its current segment is still stopped if the obstacle rises around it.
pub fn rod_wall_collision(
    lane: &Lane,
    from_x: f64,
    to_x: f64,
    y: f64,
    beat: f64,
) -> CollisionResult {
    let first = segment_of(from_x.min(to_x));
    let last = segment_of(to_x);

    for segment in first..=last {
        let stop_x = wall_stop_x(segment);
        let crossed = stop_x < to_x && (stop_x >= from_x || segment == last);
        if !crossed {
            continue;
        }
        let height = lane.segment_height(segment, beat);
        if height > y + SURFACE_EPSILON {
            return CollisionResult {
                hit: true,
                segment,
                clamp_x: stop_x,
                obstacle_height: height,
            };
        }
    }

    CollisionResult::miss()
}

/// Floor under a rod at (`x`, `y`): the obstacle top if the rod is on or
/// above it, otherwise the base row (the rod is beside the obstacle)
pub fn floor_height(lane: &Lane, x: f64, y: f64, beat: f64) -> f64 {
    let height = lane.segment_height(segment_of(x), beat);
    if y + SURFACE_EPSILON >= height {
        height
    } else {
        lane.base_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputType;
    use crate::sim::lane::Target;

    fn raised_lane() -> Lane {
        let targets = vec![Target::new(1.0, InputType::A), Target::new(2.0, InputType::A)];
        let mut lane = Lane::new(0, InputType::A, targets);
        lane.trigger_due(1.0);
        lane
    }

    #[test]
    fn test_segment_math() {
        assert_eq!(segment_of(0.0), 0);
        assert_eq!(segment_of(0.49), 0);
        assert_eq!(segment_of(0.5), 1);
        assert_eq!(segment_of(-0.6), -1);
        assert!((wall_stop_x(2) - (1.5 + TRAILING_EDGE)).abs() < 1e-12);
    }

    #[test]
    fn test_low_rod_stops_at_raised_block() {
        let lane = raised_lane();
        let stop = wall_stop_x(0);

        // Not yet past the trailing edge
        let result = rod_wall_collision(&lane, stop - 0.2, stop - 0.05, BASE_ROW_HEIGHT, 1.1);
        assert!(!result.hit);

        let result = rod_wall_collision(&lane, stop - 0.05, stop + 0.05, BASE_ROW_HEIGHT, 1.1);
        assert!(result.hit);
        assert_eq!(result.segment, 0);
        assert_eq!(result.clamp_x, stop);
        assert_eq!(result.obstacle_height, BASE_ROW_HEIGHT + PISTON_HEIGHT);
    }

    #[test]
    fn test_high_rod_clears_raised_block() {
        let lane = raised_lane();
        let stop = wall_stop_x(0);
        let result = rod_wall_collision(&lane, stop - 0.05, stop + 0.05, PISTON_HEIGHT + 0.5, 1.1);
        assert!(!result.hit);
    }

    #[test]
    fn test_fast_rod_cannot_skip_threshold() {
        let lane = raised_lane();
        // One step from before block 0 into segment 1
        let result = rod_wall_collision(&lane, -0.4, 0.9, BASE_ROW_HEIGHT, 1.1);
        assert!(result.hit);
        assert_eq!(result.segment, 0);
    }

    #[test]
    fn test_obstacle_rising_around_parked_rod() {
        let lane = raised_lane();
        let x = wall_stop_x(0) + 0.05;
        let result = rod_wall_collision(&lane, x, x, BASE_ROW_HEIGHT, 1.1);
        assert!(result.hit);
    }

    #[test]
    fn test_floor_height() {
        let lane = raised_lane();
        // Beside the piston: base row
        assert_eq!(floor_height(&lane, 0.0, BASE_ROW_HEIGHT, 1.1), BASE_ROW_HEIGHT);
        // Above the piston: its top
        assert_eq!(floor_height(&lane, 0.0, 1.5, 1.1), BASE_ROW_HEIGHT + PISTON_HEIGHT);
        // After the hold window the piston is down again
        assert_eq!(floor_height(&lane, 0.0, 1.5, 2.0), BASE_ROW_HEIGHT);
    }
}

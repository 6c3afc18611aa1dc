//! Bounce arc geometry
//!
//! A bounce arc is the parabola through three points in the lane's x/y plane:
//! - start: where the rod was when the press was judged
//! - peak: height reached at the horizontal midpoint
//! - end: landing point
//!
//! It is fully determined at creation and queried by x, so the vertical motion
//! stays locked to the rod's beat-driven horizontal position.

use serde::{Deserialize, Serialize};

/// Shortest horizontal extent an arc may have
pub const MIN_ARC_SPAN: f64 = 0.25;

/// A committed parabolic trajectory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BounceArc {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    pub peak_y: f64,
    /// Beat at which the arc was committed
    pub origin_time: f64,
}

impl BounceArc {
    pub fn new(
        start_x: f64,
        start_y: f64,
        end_x: f64,
        end_y: f64,
        peak_y: f64,
        origin_time: f64,
    ) -> Self {
        Self {
            start_x,
            start_y,
            end_x: end_x.max(start_x + MIN_ARC_SPAN),
            end_y,
            peak_y,
            origin_time,
        }
    }

    /// Horizontal midpoint (where `peak_y` is reached)
    #[inline]
    pub fn mid_x(&self) -> f64 {
        (self.start_x + self.end_x) * 0.5
    }

    #[inline]
    pub fn span(&self) -> f64 {
        self.end_x - self.start_x
    }

    /// Height of the arc at `x`, clamped to the arc's horizontal extent
    pub fn y_at(&self, x: f64) -> f64 {
        let x = x.clamp(self.start_x, self.end_x);
        let (x0, x1, x2) = (self.start_x, self.mid_x(), self.end_x);

        // Lagrange basis through start, peak, end
        let l0 = (x - x1) * (x - x2) / ((x0 - x1) * (x0 - x2));
        let l1 = (x - x0) * (x - x2) / ((x1 - x0) * (x1 - x2));
        let l2 = (x - x0) * (x - x1) / ((x2 - x0) * (x2 - x1));

        self.start_y * l0 + self.peak_y * l1 + self.end_y * l2
    }

    /// True once `x` has reached the landing point
    #[inline]
    pub fn is_complete_at(&self, x: f64) -> bool {
        x >= self.end_x
    }
}

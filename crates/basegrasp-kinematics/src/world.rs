//! Planar obstacle world.
//!
//! Obstacles are vertical columns with a circular footprint; everything is
//! checked in the ground plane.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// A column obstacle with a circular footprint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Disc {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Disc {
    pub const fn new(x: f64, y: f64, radius: f64) -> Self {
        Self { x, y, radius }
    }

    pub fn center(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// Whether a disc of `radius` at `point` overlaps this one.
    pub fn overlaps_disc(&self, point: &Vector2<f64>, radius: f64) -> bool {
        (point - self.center()).norm() < self.radius + radius
    }

    /// Whether the segment `a`-`b`, thickened by `radius`, overlaps this disc.
    pub fn overlaps_segment(&self, a: &Vector2<f64>, b: &Vector2<f64>, radius: f64) -> bool {
        segment_distance(&self.center(), a, b) < self.radius + radius
    }
}

/// Distance from `p` to the segment `a`-`b`.
pub fn segment_distance(p: &Vector2<f64>, a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= f64::EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// The static environment around the robot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanarWorld {
    pub obstacles: Vec<Disc>,
}

impl PlanarWorld {
    pub const fn new(obstacles: Vec<Disc>) -> Self {
        Self { obstacles }
    }

    /// Whether a circular footprint collides with any obstacle.
    pub fn disc_collides(&self, center: &Vector2<f64>, radius: f64) -> bool {
        self.obstacles.iter().any(|o| o.overlaps_disc(center, radius))
    }

    /// Whether a thick polyline collides with any obstacle.
    pub fn polyline_collides(&self, points: &[Vector2<f64>], radius: f64) -> bool {
        points
            .windows(2)
            .any(|w| self.obstacles.iter().any(|o| o.overlaps_segment(&w[0], &w[1], radius)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn segment_distance_cases() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(2.0, 0.0);
        assert_relative_eq!(segment_distance(&Vector2::new(1.0, 1.0), &a, &b), 1.0);
        assert_relative_eq!(segment_distance(&Vector2::new(-1.0, 0.0), &a, &b), 1.0);
        assert_relative_eq!(segment_distance(&Vector2::new(3.0, 0.0), &a, &b), 1.0);
        assert_relative_eq!(segment_distance(&Vector2::new(1.0, 0.0), &a, &a), 1.0);
    }

    #[test]
    fn disc_collisions() {
        let world = PlanarWorld::new(vec![Disc::new(1.0, 0.0, 0.2)]);
        assert!(world.disc_collides(&Vector2::new(0.6, 0.0), 0.25));
        assert!(!world.disc_collides(&Vector2::new(0.5, 0.0), 0.25));
    }

    #[test]
    fn polyline_collisions() {
        let world = PlanarWorld::new(vec![Disc::new(1.0, 0.5, 0.2)]);
        let through = [Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0), Vector2::new(1.0, 1.0)];
        let clear = [Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0)];
        assert!(world.polyline_collides(&through, 0.05));
        assert!(!world.polyline_collides(&clear, 0.05));
        assert!(!PlanarWorld::default().polyline_collides(&through, 0.05));
    }
}

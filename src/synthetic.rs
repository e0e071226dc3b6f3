//! Simulated movement for demos and tests.
//!
//! Generates deterministic walks either along an existing course (to exercise
//! progress matching) or as a free random walk. Steps are small, which is why
//! simulated tracking uses the finer 0.5 m jitter threshold.
//!
//! # Example
//!
//! ```rust
//! use walk_tracker::GeoPoint;
//! use walk_tracker::synthetic::SimulatedWalk;
//!
//! let course = vec![GeoPoint::new(37.5, 127.0), GeoPoint::new(37.501, 127.0)];
//! let walk = SimulatedWalk { step_meters: 5.0, noise_meters: 0.0, seed: 7 };
//!
//! let fixes = walk.along(&course);
//! assert_eq!(fixes.first(), course.first());
//! assert_eq!(fixes.last(), course.last());
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::geo_utils::{haversine_distance, offset_meters};
use crate::GeoPoint;

/// Parameters for a simulated walk.
#[derive(Debug, Clone)]
pub struct SimulatedWalk {
    /// Distance between consecutive fixes in meters.
    pub step_meters: f64,
    /// Uniform GPS noise radius in meters (0 for exact points).
    pub noise_meters: f64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

impl Default for SimulatedWalk {
    fn default() -> Self {
        Self { step_meters: 3.0, noise_meters: 0.0, seed: 42 }
    }
}

impl SimulatedWalk {
    /// Walk a course from start to end, emitting a fix every `step_meters`.
    /// The course vertices themselves are always included, and the last fix
    /// is exactly the course end.
    pub fn along(&self, course: &[GeoPoint]) -> Vec<GeoPoint> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut fixes = Vec::new();

        let Some(first) = course.first() else {
            return fixes;
        };
        fixes.push(*first);

        for w in course.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            let seg = haversine_distance(a, b);
            let steps = (seg / self.step_meters.max(0.1)).floor() as usize;

            for i in 1..=steps {
                let t = (i as f64 * self.step_meters) / seg;
                if t >= 1.0 {
                    break;
                }
                let exact = GeoPoint::new(a.lat + t * (b.lat - a.lat), a.lng + t * (b.lng - a.lng));
                fixes.push(self.jitter(&mut rng, exact));
            }
            fixes.push(*b);
        }

        fixes
    }

    /// A free walk of `count` fixes starting at `origin`, turning by at most
    /// 30 degrees per step.
    pub fn wander(&self, origin: GeoPoint, count: usize) -> Vec<GeoPoint> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut heading: f64 = rng.gen_range(0.0..2.0 * PI);
        let mut current = origin;
        let mut fixes = Vec::with_capacity(count);

        for _ in 0..count {
            fixes.push(self.jitter(&mut rng, current));
            heading += rng.gen_range(-PI / 6.0..PI / 6.0);
            current = offset_meters(
                &current,
                self.step_meters * heading.cos(),
                self.step_meters * heading.sin(),
            );
        }

        fixes
    }

    fn jitter(&self, rng: &mut StdRng, point: GeoPoint) -> GeoPoint {
        if self.noise_meters <= 0.0 {
            return point;
        }
        let angle = rng.gen_range(0.0..2.0 * PI);
        let radius = rng.gen_range(0.0..self.noise_meters);
        offset_meters(&point, radius * angle.cos(), radius * angle.sin())
    }
}

/// A straight course of `count` points spaced `spacing_meters` apart heading north.
pub fn straight_course(origin: GeoPoint, count: usize, spacing_meters: f64) -> Vec<GeoPoint> {
    (0..count)
        .map(|i| offset_meters(&origin, i as f64 * spacing_meters, 0.0))
        .collect()
}

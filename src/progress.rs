//! Progress matching along an existing course.
//!
//! The walker's position is snapped to the nearest course point. Progress only
//! moves forward: GPS noise and short backtracking never erase what was
//! already completed, and a position more than the snap threshold away from
//! the course is ignored as off-course.
//!
//! A separate latch decides when to prompt "walk complete": near the course
//! end after having walked at least half the course length. The prompt fires
//! at most once per matcher (one matcher per walk attempt).

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::ProgressConfig;
use crate::geo_utils::{haversine_distance, polyline_length};
use crate::GeoPoint;

/// Result of feeding one position to the matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressOutcome {
    /// Course shorter than two points; matching is off.
    Disabled,
    /// Nearest course point is farther than the snap threshold.
    OffCourse { nearest_meters: f64 },
    /// Snapped at or behind the current progress.
    Unchanged { index: usize },
    /// Progress moved forward to `index`.
    Advanced { index: usize },
}

/// One-time "walk complete" confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CompletionPrompt {
    pub distance_to_end_meters: f64,
    pub walked_meters: f64,
    pub course_meters: f64,
}

/// Tracks forward progress along a reference path.
#[derive(Debug, Clone)]
pub struct ProgressMatcher {
    reference: Vec<GeoPoint>,
    reference_meters: f64,
    config: ProgressConfig,
    index: Option<usize>,
    completion_fired: bool,
}

impl ProgressMatcher {
    pub fn new(reference: Vec<GeoPoint>, config: ProgressConfig) -> Self {
        let reference_meters = polyline_length(&reference);
        Self {
            reference,
            reference_meters,
            config,
            index: None,
            completion_fired: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.reference.len() >= 2
    }

    /// Snap `position` to the course and advance progress if it moved forward.
    pub fn update(&mut self, position: &GeoPoint) -> ProgressOutcome {
        if !self.is_enabled() {
            return ProgressOutcome::Disabled;
        }

        let Some((found, nearest_meters)) = nearest_point(&self.reference, position) else {
            return ProgressOutcome::Disabled;
        };

        if nearest_meters > self.config.snap_threshold_meters {
            debug!("[ProgressMatcher] off course by {:.1}m", nearest_meters);
            return ProgressOutcome::OffCourse { nearest_meters };
        }

        match self.index {
            Some(current) if found <= current => ProgressOutcome::Unchanged { index: current },
            _ => {
                self.index = Some(found);
                ProgressOutcome::Advanced { index: found }
            }
        }
    }

    /// Check the completion policy. Returns the prompt once; later calls
    /// return `None` even if the position still qualifies.
    pub fn check_completion(&mut self, position: &GeoPoint, walked_meters: f64) -> Option<CompletionPrompt> {
        if self.completion_fired || !self.is_enabled() {
            return None;
        }
        let end = self.reference.last()?;

        let distance_to_end_meters = haversine_distance(position, end);
        if distance_to_end_meters > self.config.completion_radius_meters {
            return None;
        }
        if walked_meters < self.reference_meters * self.config.completion_min_ratio {
            return None;
        }

        self.completion_fired = true;
        info!(
            "[ProgressMatcher] completion reached: {:.0}m walked of {:.0}m course",
            walked_meters, self.reference_meters
        );
        Some(CompletionPrompt {
            distance_to_end_meters,
            walked_meters,
            course_meters: self.reference_meters,
        })
    }

    /// Furthest snapped index, -1 before any progress.
    pub fn progress_index(&self) -> i64 {
        self.index.map_or(-1, |i| i as i64)
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Course points `0..=index`, empty before any progress.
    pub fn completed_path(&self) -> &[GeoPoint] {
        match self.index {
            Some(i) => &self.reference[..=i],
            None => &[],
        }
    }

    pub fn reference(&self) -> &[GeoPoint] {
        &self.reference
    }

    pub fn reference_meters(&self) -> f64 {
        self.reference_meters
    }

    /// Completed share of the course length, 0.0 to 1.0.
    pub fn fraction(&self) -> f64 {
        if self.reference_meters <= 0.0 {
            return 0.0;
        }
        (polyline_length(self.completed_path()) / self.reference_meters).clamp(0.0, 1.0)
    }

    /// Course length not yet completed.
    pub fn remaining_meters(&self) -> f64 {
        (self.reference_meters - polyline_length(self.completed_path())).max(0.0)
    }

    pub fn completion_fired(&self) -> bool {
        self.completion_fired
    }
}

/// Index and distance of the nearest point. Ties keep the lowest index.
pub fn nearest_point(points: &[GeoPoint], position: &GeoPoint) -> Option<(usize, f64)> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, haversine_distance(p, position)))
        .fold(None, |best, (i, d)| match best {
            Some((_, best_d)) if best_d <= d => best,
            _ => Some((i, d)),
        })
}

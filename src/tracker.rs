//! Distance accumulator and path recorder.
//!
//! Every fix is compared to the last accepted point. Segments at or below the
//! jitter threshold are dropped, so standing still with a noisy receiver never
//! inflates the walked distance. While paused nothing is recorded.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{TrackerConfig, TrackingMode};
use crate::geo_utils::haversine_distance;
use crate::GeoPoint;

/// Emitted for every accepted fix so collaborators (map, sync, UI) can follow along.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TrackUpdate {
    pub point: GeoPoint,
    /// Length of the accepted segment (0 for the first point of a walk)
    pub segment_meters: f64,
    /// Cumulative distance after this fix
    pub total_meters: f64,
}

/// Running distance and recorded path of one walk attempt.
#[derive(Debug, Clone)]
pub struct WalkTracker {
    config: TrackerConfig,
    mode: TrackingMode,
    path: Vec<GeoPoint>,
    total_meters: f64,
    paused: bool,
}

impl WalkTracker {
    pub fn new(config: TrackerConfig, mode: TrackingMode) -> Self {
        Self {
            config,
            mode,
            path: Vec::new(),
            total_meters: 0.0,
            paused: false,
        }
    }

    /// Feed one fix. Returns the update when the fix was accepted.
    pub fn record(&mut self, point: GeoPoint) -> Option<TrackUpdate> {
        if self.paused || !point.is_fix() {
            return None;
        }

        let Some(last) = self.path.last() else {
            self.path.push(point);
            return Some(TrackUpdate { point, segment_meters: 0.0, total_meters: self.total_meters });
        };

        let segment = haversine_distance(last, &point);
        if segment <= self.min_segment_meters() {
            debug!("[WalkTracker] dropped {:.2}m jitter", segment);
            return None;
        }

        self.total_meters += segment;
        self.path.push(point);

        Some(TrackUpdate {
            point,
            segment_meters: segment,
            total_meters: self.total_meters,
        })
    }

    pub fn min_segment_meters(&self) -> f64 {
        self.config.min_segment_meters(self.mode)
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn path(&self) -> &[GeoPoint] {
        &self.path
    }

    pub fn last_point(&self) -> Option<GeoPoint> {
        self.path.last().copied()
    }

    pub fn distance_meters(&self) -> f64 {
        self.total_meters
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Clear path and distance for a fresh walk attempt.
    pub fn reset(&mut self) {
        self.path.clear();
        self.total_meters = 0.0;
        self.paused = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live() -> WalkTracker {
        WalkTracker::new(TrackerConfig::default(), TrackingMode::Live)
    }

    #[test]
    fn test_first_fix_seeds_path() {
        let mut tracker = live();
        let update = tracker.record(GeoPoint::new(37.0, 127.0)).unwrap();
        assert_eq!(update.segment_meters, 0.0);
        assert_eq!(tracker.path().len(), 1);
        assert_eq!(tracker.distance_meters(), 0.0);
    }

    #[test]
    fn test_sentinel_fix_ignored() {
        let mut tracker = live();
        assert!(tracker.record(GeoPoint::new(0.0, 0.0)).is_none());
        assert!(tracker.path().is_empty());
    }

    #[test]
    fn test_jitter_dropped() {
        let mut tracker = live();
        tracker.record(GeoPoint::new(37.0, 127.0));
        // ~0.9m east at this latitude
        assert!(tracker.record(GeoPoint::new(37.0, 127.00001)).is_none());
        assert_eq!(tracker.path().len(), 1);
        assert_eq!(tracker.distance_meters(), 0.0);
    }

    #[test]
    fn test_simulated_threshold_is_finer() {
        let mut tracker = WalkTracker::new(TrackerConfig::default(), TrackingMode::Simulated);
        tracker.record(GeoPoint::new(37.0, 127.0));
        let update = tracker.record(GeoPoint::new(37.0, 127.00001)).unwrap();
        assert!(update.segment_meters > 0.5 && update.segment_meters < 1.0);
    }

    #[test]
    fn test_paused_records_nothing() {
        let mut tracker = live();
        tracker.record(GeoPoint::new(37.0, 127.0));
        tracker.set_paused(true);
        assert!(tracker.record(GeoPoint::new(37.0, 127.001)).is_none());
        assert_eq!(tracker.path().len(), 1);
        assert_eq!(tracker.distance_meters(), 0.0);

        tracker.set_paused(false);
        assert!(tracker.record(GeoPoint::new(37.0, 127.001)).is_some());
        assert_eq!(tracker.path().len(), 2);
    }

    #[test]
    fn test_reset() {
        let mut tracker = live();
        tracker.record(GeoPoint::new(37.0, 127.0));
        tracker.record(GeoPoint::new(37.0, 127.001));
        tracker.set_paused(true);
        tracker.reset();
        assert!(tracker.path().is_empty());
        assert_eq!(tracker.distance_meters(), 0.0);
        assert!(!tracker.is_paused());
    }
}

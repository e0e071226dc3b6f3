//! # Walk Tracker
//!
//! Live GPS walk tracking for a dog-walking companion app.
//!
//! This library provides:
//! - Jitter-filtered distance accumulation and path recording
//! - Progress matching along an existing course with a one-shot completion prompt
//! - A `MapSurface` abstraction with path capture and a raster fallback
//! - Periodic best-effort track sync and a walk API client with token refresh
//!
//! ## Features
//!
//! - **`http`** - Enable the reqwest-backed walk API client
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`cli`** - Build the `walk-sim` command-line simulator
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use walk_tracker::{GeoPoint, ProgressMatcher, ProgressConfig, WalkTracker, TrackerConfig, TrackingMode};
//!
//! let course = vec![
//!     GeoPoint::new(37.5000, 127.0000),
//!     GeoPoint::new(37.5005, 127.0000),
//!     GeoPoint::new(37.5010, 127.0000),
//! ];
//!
//! let mut tracker = WalkTracker::new(TrackerConfig::default(), TrackingMode::Live);
//! let mut matcher = ProgressMatcher::new(course.clone(), ProgressConfig::default());
//!
//! for fix in &course {
//!     tracker.record(*fix);
//!     matcher.update(fix);
//! }
//!
//! assert_eq!(matcher.progress_index(), 2);
//! println!("Walked {:.0}m", tracker.distance_meters());
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, WalkError};

// Tunables and env loading
pub mod config;
pub use config::{ApiConfig, MapConfig, ProgressConfig, SyncConfig, TrackerConfig, TrackingMode};

pub mod geo_utils;

// Geolocation intake
pub mod position;
pub use position::{ChannelPositionSource, Fix, PositionError, PositionFeed, PositionSource, SimulatedPositionSource, WatchGuard};

// Distance accumulator and path recorder
pub mod tracker;
pub use tracker::{TrackUpdate, WalkTracker};

// Course progress matching
pub mod progress;
pub use progress::{CompletionPrompt, ProgressMatcher, ProgressOutcome};

pub mod session;
pub use session::{Marking, PauseTransition, WalkSession, WalkStatus, WalkSummary};

// Map overlays and capture
pub mod map;
pub use map::{Layer, MapRenderAdapter, MapSurface, MarkerKind, RecordingSurface};

pub mod snapshot;
pub use snapshot::{render_path_png, CapturedImage};

// Remote walk API contract
pub mod api;
pub use api::{DiaryEntry, PhotoUpload, PresignedUpload, TrackPayload, WalkApi};

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::WalkApiClient;

pub mod sync;
pub use sync::TrackSync;

pub mod controller;
pub use controller::{walk_channel, Course, FixOutcome, RunExit, WalkCommand, WalkCommands, WalkController, WalkEvent, WalkHandle};

pub mod synthetic;

#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("WalkTrackerRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS fix with latitude and longitude in degrees.
///
/// `(0, 0)` is used by geolocation hosts as "no fix yet" and is never
/// recorded.
///
/// # Example
/// ```
/// use walk_tracker::GeoPoint;
/// let point = GeoPoint::new(37.5665, 126.9780); // Seoul
/// assert!(point.is_fix());
/// assert!(!GeoPoint::new(0.0, 0.0).is_fix());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// A usable fix: valid and not the `(0, 0)` sentinel.
    pub fn is_fix(&self) -> bool {
        self.is_valid() && !(self.lat == 0.0 && self.lng == 0.0)
    }
}

/// Bounding box of a path.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. `None` for an empty slice.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lng = min_lng.min(p.lng);
            max_lng = max_lng.max(p.lng);
        }

        Some(Self { min_lat, max_lat, min_lng, max_lng })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(37.5665, 126.9780).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_zero_fix_is_sentinel() {
        assert!(GeoPoint::new(0.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 0.0).is_fix());
        assert!(GeoPoint::new(0.0, 0.5).is_fix());
    }

    #[test]
    fn test_bounds_from_points() {
        let points = vec![
            GeoPoint::new(37.50, 127.03),
            GeoPoint::new(37.51, 127.02),
            GeoPoint::new(37.505, 127.025),
        ];
        let bounds = Bounds::from_points(&points).unwrap();
        assert_eq!(bounds.min_lat, 37.50);
        assert_eq!(bounds.max_lat, 37.51);
        assert_eq!(bounds.min_lng, 127.02);
        assert_eq!(bounds.max_lng, 127.03);
        assert!(Bounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_geo_point_wire_format() {
        let json = serde_json::to_string(&GeoPoint::new(37.5, 127.0)).unwrap();
        assert_eq!(json, r#"{"lat":37.5,"lng":127.0}"#);
    }
}

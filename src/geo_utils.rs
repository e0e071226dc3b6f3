//! # Geographic Utilities
//!
//! Core geographic computation used by the tracker, the progress matcher and
//! the snapshot renderer.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two fixes |
//! | [`polyline_length`] | Total length of a path in meters |
//! | [`compute_center`] | Centroid of a path |
//! | [`offset_meters`] | Move a point by a north/east offset in meters |
//!
//! ## Example
//!
//! ```rust
//! use walk_tracker::{GeoPoint, geo_utils};
//!
//! let path = vec![
//!     GeoPoint::new(37.0, 127.0),
//!     GeoPoint::new(37.0, 127.0002),
//!     GeoPoint::new(37.0002, 127.0002),
//! ];
//!
//! let length = geo_utils::polyline_length(&path);
//! println!("Walked {:.0}m", length);
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a spherical Earth via the `geo`
//! crate. At walking scale the spherical error is far below GPS noise.
//! All functions expect WGS84 latitude/longitude in degrees.

use geo::{Distance, Haversine, Point};
use crate::GeoPoint;

/// Meters per degree of latitude (approximately constant).
const METERS_PER_DEG_LAT: f64 = 111_320.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two fixes using the Haversine formula.
///
/// Returns the distance in meters. Symmetric, and zero for identical points.
///
/// # Example
///
/// ```rust
/// use walk_tracker::{GeoPoint, geo_utils};
///
/// let a = GeoPoint::new(37.0, 127.0);
/// let b = GeoPoint::new(37.0, 127.0002);
///
/// let d = geo_utils::haversine_distance(&a, &b);
/// assert!((d - 17.8).abs() < 1.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.lng, p1.lat);
    let point2 = Point::new(p2.lng, p2.lat);
    Haversine::distance(point1, point2)
}

/// Calculate the total length of a path in meters.
///
/// Sums the haversine distance between consecutive points. Empty or single-point
/// paths return 0.0.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Center / Offsets
// =============================================================================

/// Compute the arithmetic centroid of a path.
///
/// Returns `None` for an empty path. Not meaningful for paths crossing the
/// antimeridian, which walks never do.
pub fn compute_center(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }

    let sum_lat: f64 = points.iter().map(|p| p.lat).sum();
    let sum_lng: f64 = points.iter().map(|p| p.lng).sum();
    let n = points.len() as f64;

    Some(GeoPoint::new(sum_lat / n, sum_lng / n))
}

/// Move `origin` by `north` and `east` meters using a local flat-earth
/// approximation. Accurate to well under a meter for offsets of a few
/// hundred meters, which is all the simulator needs.
pub fn offset_meters(origin: &GeoPoint, north: f64, east: f64) -> GeoPoint {
    let dlat = north / METERS_PER_DEG_LAT;
    let meters_per_deg_lng = METERS_PER_DEG_LAT * origin.lat.to_radians().cos().max(1e-6);
    let dlng = east / meters_per_deg_lng;
    GeoPoint::new(origin.lat + dlat, origin.lng + dlng)
}

// =============================================================================
// Unit Tests
// =============================================================================

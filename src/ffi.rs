//! UniFFI exports for the mobile hosts.
//!
//! The host keeps the geolocation watch and the map SDK; it feeds fixes into
//! a [`WalkTrackerHandle`] / [`ProgressMatcherHandle`] and asks Rust for
//! distances and the fallback path image.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::config::{MapConfig, ProgressConfig, TrackerConfig, TrackingMode};
use crate::progress::{CompletionPrompt, ProgressMatcher};
use crate::snapshot::{render_path_png, CapturedImage};
use crate::tracker::{TrackUpdate, WalkTracker};
use crate::{geo_utils, init_logging, GeoPoint};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Great-circle distance in meters.
#[uniffi::export]
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    geo_utils::haversine_distance(&a, &b)
}

/// Sum of segment distances along `points`.
#[uniffi::export]
pub fn path_length_meters(points: Vec<GeoPoint>) -> f64 {
    geo_utils::polyline_length(&points)
}

#[uniffi::export]
pub fn default_tracker_config() -> TrackerConfig {
    init_logging();
    info!("[WalkTrackerRust] default_tracker_config called");
    TrackerConfig::default()
}

#[uniffi::export]
pub fn default_progress_config() -> ProgressConfig {
    ProgressConfig::default()
}

/// Render the path as a PNG when the native map snapshot failed.
/// Returns `None` only if PNG encoding failed.
#[uniffi::export]
pub fn render_path_image(path: Vec<GeoPoint>, width: u32, height: u32) -> Option<CapturedImage> {
    init_logging();
    let config = MapConfig { canvas_width: width, canvas_height: height, ..MapConfig::default() };
    match render_path_png(&path, &config) {
        Ok(image) => {
            debug!("[WalkTrackerRust] rendered {} points into {} bytes", path.len(), image.png.len());
            Some(image)
        }
        Err(err) => {
            warn!("[WalkTrackerRust] path render failed: {}", err);
            None
        }
    }
}

// ============================================================================
// Stateful handles
// ============================================================================

#[derive(uniffi::Object)]
pub struct WalkTrackerHandle {
    inner: Mutex<WalkTracker>,
}

#[uniffi::export]
impl WalkTrackerHandle {
    #[uniffi::constructor]
    pub fn new(config: TrackerConfig, mode: TrackingMode) -> Arc<Self> {
        init_logging();
        info!("[WalkTrackerRust] tracker created ({:?})", mode);
        Arc::new(Self { inner: Mutex::new(WalkTracker::new(config, mode)) })
    }

    /// Feed one fix. Returns the accepted update, if any.
    pub fn record(&self, point: GeoPoint) -> Option<TrackUpdate> {
        lock(&self.inner).record(point)
    }

    pub fn set_paused(&self, paused: bool) {
        lock(&self.inner).set_paused(paused);
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.inner).is_paused()
    }

    pub fn distance_meters(&self) -> f64 {
        lock(&self.inner).distance_meters()
    }

    pub fn path(&self) -> Vec<GeoPoint> {
        lock(&self.inner).path().to_vec()
    }

    pub fn reset(&self) {
        lock(&self.inner).reset();
    }
}

/// Course progress for the host. While paused, `update` and
/// `check_completion` leave the matcher untouched.
#[derive(uniffi::Object)]
pub struct ProgressMatcherHandle {
    inner: Mutex<ProgressMatcher>,
    paused: AtomicBool,
}

#[uniffi::export]
impl ProgressMatcherHandle {
    #[uniffi::constructor]
    pub fn new(reference: Vec<GeoPoint>, config: ProgressConfig) -> Arc<Self> {
        init_logging();
        info!("[WalkTrackerRust] matcher created for {} course points", reference.len());
        Arc::new(Self {
            inner: Mutex::new(ProgressMatcher::new(reference, config)),
            paused: AtomicBool::new(false),
        })
    }

    pub fn set_paused(&self, paused: bool) {
        debug!("[WalkTrackerRust] matcher paused={}", paused);
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Feed one position. Returns the progress index (-1 before any progress).
    pub fn update(&self, position: GeoPoint) -> i64 {
        let mut matcher = lock(&self.inner);
        if !self.is_paused() {
            let _ = matcher.update(&position);
        }
        matcher.progress_index()
    }

    /// One-shot completion prompt. Never fires while paused.
    pub fn check_completion(&self, position: GeoPoint, walked_meters: f64) -> Option<CompletionPrompt> {
        if self.is_paused() {
            return None;
        }
        lock(&self.inner).check_completion(&position, walked_meters)
    }

    pub fn progress_index(&self) -> i64 {
        lock(&self.inner).progress_index()
    }

    pub fn completed_path(&self) -> Vec<GeoPoint> {
        lock(&self.inner).completed_path().to_vec()
    }

    pub fn fraction(&self) -> f64 {
        lock(&self.inner).fraction()
    }
}

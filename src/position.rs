//! Geolocation intake.
//!
//! A [`PositionSource`] pushes readings into a channel until the returned
//! [`WatchGuard`] is dropped. Dropping the guard is the only way to stop a
//! watch, so every exit path of the walk loop releases its subscription.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::GeoPoint;

/// A single sample from the geolocation provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Fix {
    pub point: GeoPoint,
    /// Horizontal accuracy in meters, when the provider reports it
    pub accuracy: Option<f64>,
    /// Heading in degrees clockwise from north
    pub heading: Option<f64>,
}

impl Fix {
    pub fn new(point: GeoPoint) -> Self {
        Self { point, accuracy: None, heading: None }
    }
}

impl From<GeoPoint> for Fix {
    fn from(point: GeoPoint) -> Self {
        Self::new(point)
    }
}

/// Errors the geolocation provider can report. The walk loop logs them and
/// keeps waiting for further samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location request timed out")]
    Timeout,
    #[error("location unavailable")]
    Unavailable,
}

/// What a watch delivers: a fix or a provider error.
pub type PositionReading = std::result::Result<Fix, PositionError>;

/// Stops the underlying watch when dropped.
#[must_use = "dropping the guard stops the position watch"]
pub struct WatchGuard {
    stop: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchGuard {
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        Self { stop: Some(Box::new(stop)) }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

/// Push-based position provider.
pub trait PositionSource: Send {
    /// Start delivering readings into `sink`. Readings stop once the guard drops.
    fn watch(&mut self, sink: UnboundedSender<PositionReading>) -> crate::Result<WatchGuard>;
}

// ============================================================================
// Channel source (host pushes fixes)
// ============================================================================

#[derive(Default)]
struct FeedState {
    sink: Option<UnboundedSender<PositionReading>>,
}

/// A source fed by the host through a [`PositionFeed`] handle, e.g. from a
/// platform geolocation callback.
#[derive(Clone, Default)]
pub struct ChannelPositionSource {
    state: Arc<Mutex<FeedState>>,
    active_watches: Arc<AtomicUsize>,
}

/// Host-side handle for [`ChannelPositionSource`].
#[derive(Clone)]
pub struct PositionFeed {
    state: Arc<Mutex<FeedState>>,
}

impl ChannelPositionSource {
    pub fn new() -> (Self, PositionFeed) {
        let source = Self::default();
        let feed = PositionFeed { state: Arc::clone(&source.state) };
        (source, feed)
    }

    /// Number of watches currently held open.
    pub fn active_watches(&self) -> usize {
        self.active_watches.load(Ordering::SeqCst)
    }
}

impl PositionSource for ChannelPositionSource {
    fn watch(&mut self, sink: UnboundedSender<PositionReading>) -> crate::Result<WatchGuard> {
        if let Ok(mut state) = self.state.lock() {
            state.sink = Some(sink);
        }
        self.active_watches.fetch_add(1, Ordering::SeqCst);
        debug!("[ChannelPositionSource] watch started");

        let state = Arc::clone(&self.state);
        let active = Arc::clone(&self.active_watches);
        Ok(WatchGuard::new(move || {
            if let Ok(mut state) = state.lock() {
                state.sink = None;
            }
            active.fetch_sub(1, Ordering::SeqCst);
            debug!("[ChannelPositionSource] watch stopped");
        }))
    }
}

impl PositionFeed {
    /// Deliver a fix. Returns `false` when nobody is watching.
    pub fn push(&self, fix: impl Into<Fix>) -> bool {
        self.deliver(Ok(fix.into()))
    }

    /// Deliver a provider error.
    pub fn push_error(&self, error: PositionError) -> bool {
        self.deliver(Err(error))
    }

    fn deliver(&self, reading: PositionReading) -> bool {
        match self.state.lock() {
            Ok(state) => state
                .sink
                .as_ref()
                .map(|sink| sink.send(reading).is_ok())
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

// ============================================================================
// Simulated source
// ============================================================================

/// Replays a precomputed list of points at a fixed cadence. Used for
/// simulated walks and demos.
pub struct SimulatedPositionSource {
    points: Vec<GeoPoint>,
    interval: Duration,
}

impl SimulatedPositionSource {
    pub fn new(points: Vec<GeoPoint>, interval: Duration) -> Self {
        Self { points, interval }
    }
}

impl PositionSource for SimulatedPositionSource {
    fn watch(&mut self, sink: UnboundedSender<PositionReading>) -> crate::Result<WatchGuard> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| PositionError::Unavailable)?;

        let points = self.points.clone();
        let interval = self.interval;
        info!("[SimulatedPositionSource] replaying {} points every {:?}", points.len(), interval);

        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            for point in points {
                ticker.tick().await;
                if sink.send(Ok(Fix::new(point))).is_err() {
                    break;
                }
            }
        });

        Ok(WatchGuard::new(move || task.abort()))
    }
}

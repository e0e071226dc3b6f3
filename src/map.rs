//! Map render adapter.
//!
//! The concrete mapping SDK stays on the host side behind [`MapSurface`]. The
//! adapter turns walk state into overlays and owns the capture sequence:
//! draw the whole path, let the map settle, hide UI chrome, snapshot, and
//! restore chrome no matter how the snapshot went. If the native snapshot
//! fails the path is rendered synthetically; capture never returns an error.

use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use log::{debug, warn};

use crate::config::MapConfig;
use crate::error::Result;
use crate::snapshot::{render_path_png, CapturedImage};
use crate::{Bounds, GeoPoint};

/// Polyline overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Layer {
    /// The path walked so far
    Live,
    /// The course being followed
    Reference,
    /// The completed part of the course
    Progress,
}

/// Point overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum MarkerKind {
    Position,
    Start,
    End,
    Marking { index: u32 },
}

/// Drawing surface provided by the host map.
#[async_trait]
pub trait MapSurface: Send {
    fn draw_path(&mut self, layer: Layer, points: &[GeoPoint]);

    fn clear_layer(&mut self, layer: Layer);

    fn set_marker(&mut self, kind: MarkerKind, point: GeoPoint);

    fn fit_bounds(&mut self, bounds: Bounds);

    /// Show or hide non-map UI (buttons, panels) for screenshots.
    fn set_chrome_visible(&mut self, visible: bool);

    /// Native screenshot of the current view.
    async fn capture(&mut self) -> Result<CapturedImage>;
}

/// Hides chrome for its lifetime.
struct ChromeGuard<'a, S: MapSurface + ?Sized> {
    surface: &'a mut S,
}

impl<'a, S: MapSurface + ?Sized> ChromeGuard<'a, S> {
    fn hide(surface: &'a mut S) -> Self {
        surface.set_chrome_visible(false);
        Self { surface }
    }
}

impl<S: MapSurface + ?Sized> Deref for ChromeGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.surface
    }
}

impl<S: MapSurface + ?Sized> DerefMut for ChromeGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.surface
    }
}

impl<S: MapSurface + ?Sized> Drop for ChromeGuard<'_, S> {
    fn drop(&mut self) {
        self.surface.set_chrome_visible(true);
    }
}

pub struct MapRenderAdapter<S: MapSurface> {
    surface: S,
    config: MapConfig,
}

impl<S: MapSurface> MapRenderAdapter<S> {
    pub fn new(surface: S, config: MapConfig) -> Self {
        Self { surface, config }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Draw the course and its end markers at the start of a course walk.
    pub fn show_course(&mut self, reference: &[GeoPoint]) {
        self.surface.draw_path(Layer::Reference, reference);
        self.surface.clear_layer(Layer::Progress);
        if let (Some(start), Some(end)) = (reference.first(), reference.last()) {
            self.surface.set_marker(MarkerKind::Start, *start);
            self.surface.set_marker(MarkerKind::End, *end);
        }
        if let Some(bounds) = Bounds::from_points(reference) {
            self.surface.fit_bounds(bounds);
        }
    }

    /// Forget overlays from a previous walk.
    pub fn reset(&mut self) {
        self.surface.clear_layer(Layer::Live);
        self.surface.clear_layer(Layer::Reference);
        self.surface.clear_layer(Layer::Progress);
    }

    pub fn show_position(&mut self, point: GeoPoint) {
        self.surface.set_marker(MarkerKind::Position, point);
    }

    pub fn show_live_path(&mut self, path: &[GeoPoint]) {
        self.surface.draw_path(Layer::Live, path);
    }

    pub fn show_progress(&mut self, completed: &[GeoPoint]) {
        self.surface.draw_path(Layer::Progress, completed);
    }

    pub fn show_marking(&mut self, index: u32, point: GeoPoint) {
        self.surface.set_marker(MarkerKind::Marking { index }, point);
    }

    /// Capture an image of the full `path`.
    ///
    /// Returns `None` only if both the native snapshot and the synthetic
    /// fallback failed.
    pub async fn capture(&mut self, path: &[GeoPoint]) -> Option<CapturedImage> {
        self.surface.draw_path(Layer::Live, path);
        if let Some(bounds) = Bounds::from_points(path) {
            self.surface.fit_bounds(bounds);
        }
        tokio::time::sleep(self.config.settle_delay).await;

        let native = {
            let mut chrome = ChromeGuard::hide(&mut self.surface);
            chrome.capture().await
        };

        match native {
            Ok(image) => {
                debug!("[MapRenderAdapter] native capture {}x{}", image.width, image.height);
                Some(image)
            }
            Err(err) => {
                warn!("[MapRenderAdapter] native capture failed, rendering fallback: {}", err);
                match render_path_png(path, &self.config) {
                    Ok(image) => Some(image),
                    Err(err) => {
                        warn!("[MapRenderAdapter] fallback render failed: {}", err);
                        None
                    }
                }
            }
        }
    }
}

// ============================================================================
// Recording surface
// ============================================================================

/// One call made against a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    DrawPath { layer: Layer, points: usize },
    ClearLayer(Layer),
    SetMarker(MarkerKind, GeoPoint),
    FitBounds(Bounds),
    Chrome(bool),
    Capture,
}

/// In-memory surface that records calls and keeps the latest overlays.
/// Capture renders the live layer synthetically, or fails on demand.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub calls: Vec<SurfaceCall>,
    pub live: Vec<GeoPoint>,
    pub reference: Vec<GeoPoint>,
    pub progress: Vec<GeoPoint>,
    pub position: Option<GeoPoint>,
    pub markings: Vec<GeoPoint>,
    pub chrome_visible: bool,
    pub fail_capture: bool,
    config: MapConfig,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self { chrome_visible: true, ..Self::default() }
    }

    /// A surface whose native capture always fails.
    pub fn failing() -> Self {
        Self { fail_capture: true, ..Self::new() }
    }

    fn layer_mut(&mut self, layer: Layer) -> &mut Vec<GeoPoint> {
        match layer {
            Layer::Live => &mut self.live,
            Layer::Reference => &mut self.reference,
            Layer::Progress => &mut self.progress,
        }
    }
}

#[async_trait]
impl MapSurface for RecordingSurface {
    fn draw_path(&mut self, layer: Layer, points: &[GeoPoint]) {
        self.calls.push(SurfaceCall::DrawPath { layer, points: points.len() });
        *self.layer_mut(layer) = points.to_vec();
    }

    fn clear_layer(&mut self, layer: Layer) {
        self.calls.push(SurfaceCall::ClearLayer(layer));
        self.layer_mut(layer).clear();
    }

    fn set_marker(&mut self, kind: MarkerKind, point: GeoPoint) {
        self.calls.push(SurfaceCall::SetMarker(kind, point));
        match kind {
            MarkerKind::Position => self.position = Some(point),
            MarkerKind::Marking { .. } => self.markings.push(point),
            MarkerKind::Start | MarkerKind::End => {}
        }
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.calls.push(SurfaceCall::FitBounds(bounds));
    }

    fn set_chrome_visible(&mut self, visible: bool) {
        self.calls.push(SurfaceCall::Chrome(visible));
        self.chrome_visible = visible;
    }

    async fn capture(&mut self) -> Result<CapturedImage> {
        self.calls.push(SurfaceCall::Capture);
        if self.fail_capture {
            return Err(crate::WalkError::Capture("screenshot unavailable".to_string()));
        }
        render_path_png(&self.live, &self.config)
    }
}

//! Synthetic path rendering used when the map cannot produce a screenshot.
//!
//! The path is projected onto a fixed-size canvas with an equirectangular
//! projection scaled by the cosine of the mean latitude, so the drawn shape
//! keeps its real aspect ratio. An empty path yields a blank canvas.

use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};

use crate::config::MapConfig;
use crate::error::{Result, WalkError};
use crate::{Bounds, GeoPoint};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PATH_COLOR: Rgba<u8> = Rgba([255, 107, 53, 255]);
const START_COLOR: Rgba<u8> = Rgba([46, 204, 113, 255]);
const END_COLOR: Rgba<u8> = Rgba([231, 76, 60, 255]);
const LINE_RADIUS: i32 = 2;
const MARKER_RADIUS: i32 = 8;
/// Largest canvas the fallback will allocate (4096 x 4096).
const MAX_CANVAS_PIXELS: u64 = 4096 * 4096;

type Canvas = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// A PNG image of the walked path.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CapturedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedImage {
    /// `data:image/png;base64,...` for hosts that upload data URLs.
    pub fn to_data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.png);
        format!("data:image/png;base64,{}", encoded)
    }
}

/// Render `path` as a polyline with start and end markers.
pub fn render_path_png(path: &[GeoPoint], config: &MapConfig) -> Result<CapturedImage> {
    let width = config.canvas_width.max(1);
    let height = config.canvas_height.max(1);
    if u64::from(width) * u64::from(height) > MAX_CANVAS_PIXELS {
        return Err(WalkError::Capture(format!("canvas {width}x{height} is too large")));
    }
    let mut canvas: Canvas = ImageBuffer::from_pixel(width, height, BACKGROUND);

    if let Some(projection) = Projection::fit(path, width, height, config.canvas_padding) {
        let pixels: Vec<(i32, i32)> = path.iter().map(|p| projection.project(p)).collect();

        for w in pixels.windows(2) {
            draw_line(&mut canvas, w[0], w[1], PATH_COLOR);
        }
        if let (Some(start), Some(end)) = (pixels.first(), pixels.last()) {
            fill_circle(&mut canvas, *start, MARKER_RADIUS, START_COLOR);
            fill_circle(&mut canvas, *end, MARKER_RADIUS, END_COLOR);
        }
    }

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|err| WalkError::Capture(format!("PNG encode failed: {err}")))?;

    Ok(CapturedImage { png, width, height })
}

struct Projection {
    bounds: Bounds,
    lng_scale: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Projection {
    fn fit(path: &[GeoPoint], width: u32, height: u32, padding: u32) -> Option<Self> {
        let bounds = Bounds::from_points(path)?;
        let lng_scale = bounds.center().lat.to_radians().cos().max(1e-6);

        let span_x = (bounds.max_lng - bounds.min_lng) * lng_scale;
        let span_y = bounds.max_lat - bounds.min_lat;
        let usable_w = (width as f64 - 2.0 * padding as f64).max(1.0);
        let usable_h = (height as f64 - 2.0 * padding as f64).max(1.0);

        let scale = match (span_x > 0.0, span_y > 0.0) {
            (true, true) => (usable_w / span_x).min(usable_h / span_y),
            (true, false) => usable_w / span_x,
            (false, true) => usable_h / span_y,
            (false, false) => 0.0,
        };

        // Center the drawn extent on the canvas
        let offset_x = (width as f64 - span_x * scale) / 2.0;
        let offset_y = (height as f64 - span_y * scale) / 2.0;

        Some(Self { bounds, lng_scale, scale, offset_x, offset_y })
    }

    fn project(&self, p: &GeoPoint) -> (i32, i32) {
        let x = self.offset_x + (p.lng - self.bounds.min_lng) * self.lng_scale * self.scale;
        let y = self.offset_y + (self.bounds.max_lat - p.lat) * self.scale;
        (x.round() as i32, y.round() as i32)
    }
}

fn draw_line(canvas: &mut Canvas, from: (i32, i32), to: (i32, i32), color: Rgba<u8>) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        fill_circle(canvas, (x0, y0), LINE_RADIUS, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn fill_circle(canvas: &mut Canvas, center: (i32, i32), radius: i32, color: Rgba<u8>) {
    let width = canvas.width() as i32;
    let height = canvas.height() as i32;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let x = center.0 + dx;
            let y = center.1 + dy;
            if x >= 0 && y >= 0 && x < width && y < height {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

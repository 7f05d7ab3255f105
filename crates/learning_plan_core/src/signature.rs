//! crates/learning_plan_core/src/signature.rs
//!
//! Freehand signature capture. Pointer events are traced into polylines in
//! CSS pixels and rasterized onto a backing store scaled by the device pixel
//! ratio, then encoded as a base64 PNG data URL.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

use crate::domain::SignerRole;

/// Pen width in CSS pixels.
pub const STROKE_WIDTH: f64 = 2.0;

const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Signature surface has no drawable area ({0}x{1})")]
    ZeroSized(u32, u32),
    #[error("Failed to encode signature image: {0}")]
    Encode(#[from] image::ImageError),
}

//=========================================================================================
// Geometry and Pointer Input
//=========================================================================================

/// The container's layout box, in CSS pixels, measured when the surface opens or resizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub width: f64,
    pub height: f64,
}

/// The surface's bounding rectangle in client coordinates at the time of an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClientRect {
    pub left: f64,
    pub top: f64,
}

/// A point in surface-local CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "device", rename_all = "camelCase")]
pub enum PointerInput {
    #[serde(rename_all = "camelCase")]
    Mouse { client_x: f64, client_y: f64 },
    /// Only the first touch point draws.
    Touch { touches: Vec<(f64, f64)> },
}

impl PointerInput {
    fn client_point(&self) -> Option<(f64, f64)> {
        match self {
            Self::Mouse { client_x, client_y } => Some((*client_x, *client_y)),
            Self::Touch { touches } => touches.first().copied(),
        }
    }

    fn local_point(&self, rect: ClientRect) -> Option<Point> {
        self.client_point().map(|(x, y)| Point {
            x: x - rect.left,
            y: y - rect.top,
        })
    }
}

//=========================================================================================
// The Drawing Surface
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureSurface {
    layout: LayoutBox,
    device_pixel_ratio: f64,
    backing_width: u32,
    backing_height: u32,
    strokes: Vec<Vec<Point>>,
    drawing: bool,
    has_strokes: bool,
}

impl SignatureSurface {
    /// Opens a surface sized from the container's current layout box.
    pub fn open(layout: LayoutBox, device_pixel_ratio: f64) -> Self {
        let mut surface = Self {
            layout,
            device_pixel_ratio: 1.0,
            backing_width: 0,
            backing_height: 0,
            strokes: Vec::new(),
            drawing: false,
            has_strokes: false,
        };
        surface.resize(layout, device_pixel_ratio);
        surface
    }

    /// Re-derives the backing store from a fresh layout measurement.
    ///
    /// Strokes are kept in CSS pixels, so they survive the rescale.
    pub fn resize(&mut self, layout: LayoutBox, device_pixel_ratio: f64) {
        let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        self.layout = layout;
        self.device_pixel_ratio = dpr;
        self.backing_width = scaled(layout.width, dpr);
        self.backing_height = scaled(layout.height, dpr);
        debug!(
            width = self.backing_width,
            height = self.backing_height,
            dpr,
            "Signature surface backing store sized"
        );
    }

    pub fn backing_size(&self) -> (u32, u32) {
        (self.backing_width, self.backing_height)
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// True once the backing store has a drawable area.
    pub fn is_ready(&self) -> bool {
        self.backing_width > 0 && self.backing_height > 0
    }

    pub fn strokes(&self) -> &[Vec<Point>] {
        &self.strokes
    }

    pub fn pointer_down(&mut self, input: &PointerInput, rect: ClientRect) {
        if !self.is_ready() {
            return;
        }
        let Some(point) = input.local_point(rect) else {
            return;
        };
        self.strokes.push(vec![point]);
        self.drawing = true;
        self.has_strokes = true;
    }

    pub fn pointer_move(&mut self, input: &PointerInput, rect: ClientRect) {
        if !self.drawing {
            return;
        }
        if let (Some(point), Some(stroke)) = (input.local_point(rect), self.strokes.last_mut()) {
            stroke.push(point);
        }
    }

    /// Pointer up, or the pointer leaving the surface.
    pub fn pointer_up(&mut self) {
        self.drawing = false;
    }

    /// Wipes the surface; confirming is blocked again until the next stroke.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.drawing = false;
        self.has_strokes = false;
    }

    pub fn can_confirm(&self) -> bool {
        self.has_strokes
    }

    /// Renders all strokes onto a transparent backing-store-sized image.
    pub fn rasterize(&self) -> RgbaImage {
        let mut canvas = RgbaImage::new(self.backing_width, self.backing_height);
        let dpr = self.device_pixel_ratio;
        let radius = STROKE_WIDTH * dpr / 2.0;
        let step = (radius / 2.0).max(0.5);

        let (width, height) = (f64::from(self.backing_width), f64::from(self.backing_height));

        for stroke in &self.strokes {
            for segment in stroke.windows(2) {
                let a = (segment[0].x * dpr, segment[0].y * dpr);
                let b = (segment[1].x * dpr, segment[1].y * dpr);
                // Only the part of the segment that can touch the canvas is sampled.
                let Some(((ax, ay), (bx, by))) = clip_segment(a, b, width, height, radius) else {
                    continue;
                };
                let length = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
                let samples = (length / step).ceil().max(1.0) as u32;
                for i in 0..=samples {
                    let t = f64::from(i) / f64::from(samples);
                    stamp_disc(&mut canvas, ax + (bx - ax) * t, ay + (by - ay) * t, radius);
                }
            }
        }
        canvas
    }

    /// Encodes the surface as a `data:image/png;base64,...` URL.
    pub fn to_data_url(&self) -> Result<String, SignatureError> {
        if !self.is_ready() {
            return Err(SignatureError::ZeroSized(self.backing_width, self.backing_height));
        }
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(self.rasterize())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png)))
    }
}

fn scaled(css: f64, dpr: f64) -> u32 {
    let px = (css * dpr).round();
    if px.is_finite() && px > 0.0 {
        px as u32
    } else {
        0
    }
}

/// Clips segment `a`-`b` to the rectangle `[-pad, width + pad] x [-pad, height + pad]`
/// (Liang-Barsky). `None` when nothing of it lies inside or a coordinate is not finite.
fn clip_segment(
    a: (f64, f64),
    b: (f64, f64),
    width: f64,
    height: f64,
    pad: f64,
) -> Option<((f64, f64), (f64, f64))> {
    if ![a.0, a.1, b.0, b.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let edges = [
        (-dx, a.0 + pad),
        (dx, width + pad - a.0),
        (-dy, a.1 + pad),
        (dy, height + pad - a.1),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }
    }
    Some((
        (a.0 + t0 * dx, a.1 + t0 * dy),
        (a.0 + t1 * dx, a.1 + t1 * dy),
    ))
}

fn stamp_disc(canvas: &mut RgbaImage, cx: f64, cy: f64, radius: f64) {
    let (width, height) = canvas.dimensions();
    let min_x = (cx - radius).floor().max(0.0) as u32;
    let min_y = (cy - radius).floor().max(0.0) as u32;
    let max_x = ((cx + radius).ceil().max(0.0) as u32).min(width);
    let max_y = ((cy + radius).ceil().max(0.0) as u32).min(height);
    for py in min_y..max_y {
        for px in min_x..max_x {
            let dx = f64::from(px) + 0.5 - cx;
            let dy = f64::from(py) + 0.5 - cy;
            if dx * dx + dy * dy <= radius * radius {
                canvas.put_pixel(px, py, INK);
            }
        }
    }
}

/// One recorded interaction with the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SurfaceEvent {
    Down { input: PointerInput, rect: ClientRect },
    Move { input: PointerInput, rect: ClientRect },
    /// Pointer released or left the surface.
    Up,
    Clear,
    #[serde(rename_all = "camelCase")]
    Resize { layout: LayoutBox, device_pixel_ratio: f64 },
}

impl SignatureSurface {
    pub fn apply(&mut self, event: &SurfaceEvent) {
        match event {
            SurfaceEvent::Down { input, rect } => self.pointer_down(input, *rect),
            SurfaceEvent::Move { input, rect } => self.pointer_move(input, *rect),
            SurfaceEvent::Up => self.pointer_up(),
            SurfaceEvent::Clear => self.clear(),
            SurfaceEvent::Resize { layout, device_pixel_ratio } => {
                self.resize(*layout, *device_pixel_ratio)
            }
        }
    }
}

//=========================================================================================
// Per-slot Capture
//=========================================================================================

/// An open capture dialog for one signer slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureCapture {
    role: SignerRole,
    surface: SignatureSurface,
}

impl SignatureCapture {
    pub fn open(role: SignerRole, layout: LayoutBox, device_pixel_ratio: f64) -> Self {
        Self {
            role,
            surface: SignatureSurface::open(layout, device_pixel_ratio),
        }
    }

    pub fn role(&self) -> SignerRole {
        self.role
    }

    pub fn surface(&self) -> &SignatureSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut SignatureSurface {
        &mut self.surface
    }

    /// Rasterizes the drawing for the slot. `Ok(None)` until a stroke has been started.
    pub fn confirm(&self) -> Result<Option<String>, SignatureError> {
        if !self.surface.can_confirm() {
            return Ok(None);
        }
        self.surface.to_data_url().map(Some)
    }
}

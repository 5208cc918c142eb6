//! Mapping between original-image pixels and the scaled preview viewport
//!
//! The preview shows the image shrunk to fit the viewport (never enlarged) and
//! centered inside it. Everything stored in a [`WatermarkSpec`] lives in
//! original-image space; this module converts pointer positions and overlay
//! coordinates between the two.
//!
//! [`WatermarkSpec`]: crate::models::WatermarkSpec

use crate::models::Position;
use tracing::debug;

/// Derived layout of an image inside a viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    /// Display pixels per original pixel, at most 1.0
    pub scale: f64,
    /// Width of the scaled image in display pixels
    pub width: u32,
    /// Height of the scaled image in display pixels
    pub height: u32,
    /// Left edge of the scaled image inside the viewport
    pub offset_x: i32,
    /// Top edge of the scaled image inside the viewport
    pub offset_y: i32,
    pub image_width: u32,
    pub image_height: u32,
}

impl DisplayGeometry {
    /// Compute the display layout for an image inside a viewport.
    ///
    /// Returns `None` while the viewport is not laid out yet (either side
    /// `<= 1`) or the image is empty; callers retry once real dimensions are
    /// known.
    pub fn compute(
        image_width: u32,
        image_height: u32,
        viewport_width: u32,
        viewport_height: u32,
    ) -> Option<Self> {
        if viewport_width <= 1 || viewport_height <= 1 || image_width == 0 || image_height == 0 {
            return None;
        }

        let scale_x = f64::from(viewport_width) / f64::from(image_width);
        let scale_y = f64::from(viewport_height) / f64::from(image_height);
        let scale = scale_x.min(scale_y).min(1.0);

        let width = ((f64::from(image_width) * scale).floor() as u32).max(1);
        let height = ((f64::from(image_height) * scale).floor() as u32).max(1);

        let offset_x = (i64::from(viewport_width) - i64::from(width)).div_euclid(2) as i32;
        let offset_y = (i64::from(viewport_height) - i64::from(height)).div_euclid(2) as i32;

        Some(Self {
            scale,
            width,
            height,
            offset_x,
            offset_y,
            image_width,
            image_height,
        })
    }

    /// Original-image point to viewport coordinates (unrounded)
    pub fn to_display(&self, px: f64, py: f64) -> (f64, f64) {
        (
            px * self.scale + f64::from(self.offset_x),
            py * self.scale + f64::from(self.offset_y),
        )
    }

    /// Viewport point to original-image pixels, clamped to the image
    pub fn to_original(&self, dx: f64, dy: f64) -> Position {
        let ox = (dx - f64::from(self.offset_x)) / self.scale;
        let oy = (dy - f64::from(self.offset_y)) / self.scale;
        Position::new(
            ox.round().clamp(0.0, f64::from(self.image_width)) as i32,
            oy.round().clamp(0.0, f64::from(self.image_height)) as i32,
        )
    }

    /// Whether the preview is rendered at full resolution
    pub fn is_unscaled(&self) -> bool {
        self.scale >= 1.0
    }
}

/// Tracks the current image and viewport sizes and keeps the derived
/// geometry up to date
#[derive(Debug, Clone, Default)]
pub struct CoordinateMapper {
    image_width: u32,
    image_height: u32,
    viewport_width: u32,
    viewport_height: u32,
    geometry: Option<DisplayGeometry>,
}

impl CoordinateMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_viewport(viewport_width: u32, viewport_height: u32) -> Self {
        let mut mapper = Self::new();
        mapper.set_viewport(viewport_width, viewport_height);
        mapper
    }

    /// Point the mapper at a new image
    pub fn set_image(&mut self, width: u32, height: u32) {
        self.image_width = width;
        self.image_height = height;
        self.recompute();
    }

    /// Record a viewport resize
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport_width = width;
        self.viewport_height = height;
        self.recompute();
    }

    /// Current geometry, `None` until both image and viewport are usable
    pub fn geometry(&self) -> Option<&DisplayGeometry> {
        self.geometry.as_ref()
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    fn recompute(&mut self) {
        self.geometry = DisplayGeometry::compute(
            self.image_width,
            self.image_height,
            self.viewport_width,
            self.viewport_height,
        );
        match &self.geometry {
            Some(g) => debug!(
                scale = g.scale,
                width = g.width,
                height = g.height,
                offset_x = g.offset_x,
                offset_y = g.offset_y,
                "Display geometry updated"
            ),
            None => debug!(
                viewport_width = self.viewport_width,
                viewport_height = self.viewport_height,
                "Display geometry not ready"
            ),
        }
    }
}

//! Watermark rendering
//!
//! The compositor turns a [`WatermarkSpec`] into pixels. The same spec can be
//! rendered at full resolution for export or into a scaled-down preview
//! frame; [`RenderMode`] says which, and every coordinate in the spec is
//! scaled accordingly so both outputs look the same.

use crate::blend::{composite_over, flatten_onto_white};
use crate::coords::DisplayGeometry;
use crate::font::{FontChain, WatermarkFont};
use crate::models::{Position, WatermarkSpec, MAX_FONT_SIZE};
use crate::rotation::{rotate_expand, rotated_bounds};
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, Rgba, RgbaImage};
use tracing::debug;

/// Transparent border around text before rotation, so glyph overhang
/// survives the rotation
pub const ROTATION_PADDING: u32 = 10;

/// Target space for a render
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderMode {
    /// Render into a downscaled frame; spec coordinates are multiplied by `scale`
    Preview { scale: f64 },
    /// Render at original resolution
    Export,
}

impl RenderMode {
    pub fn preview(geometry: &DisplayGeometry) -> Self {
        RenderMode::Preview {
            scale: geometry.scale,
        }
    }

    pub fn scale(&self) -> f64 {
        match self {
            RenderMode::Preview { scale } => *scale,
            RenderMode::Export => 1.0,
        }
    }
}

/// Where a rotated buffer should be pasted along one axis.
///
/// Centers a `rotated_extent` buffer on a `text_extent` box starting at
/// `position`, then keeps it inside `image_extent`. When the buffer is larger
/// than the image the offset collapses to 0.
pub fn paste_offset(position: i32, text_extent: u32, rotated_extent: u32, image_extent: u32) -> i32 {
    let centered =
        i64::from(position) - (i64::from(rotated_extent) - i64::from(text_extent)).div_euclid(2);
    let upper = i64::from(image_extent) - i64::from(rotated_extent);
    centered.min(upper).max(0) as i32
}

/// Renders watermark specs onto images
#[derive(Debug, Clone)]
pub struct Compositor {
    fonts: FontChain,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(FontChain::system())
    }
}

impl Compositor {
    pub fn new(fonts: FontChain) -> Self {
        Self { fonts }
    }

    /// Compositor that only uses the built-in bitmap font
    pub fn bitmap_only() -> Self {
        Self::new(FontChain::bitmap_only())
    }

    pub fn fonts(&self) -> &FontChain {
        &self.fonts
    }

    /// Unrotated text size in the target space of `mode`
    pub fn text_bounds(&self, spec: &WatermarkSpec, mode: RenderMode) -> (u32, u32) {
        if spec.is_disabled() {
            return (0, 0);
        }
        let font_size = Self::scaled_font_size(spec.font_size_px, mode.scale());
        self.fonts.resolve(font_size).measure(&spec.text)
    }

    /// Render `spec` onto a copy of `base`.
    ///
    /// The input is never modified. The result has the same dimensions and
    /// colour type as `base`.
    pub fn render(&self, base: &DynamicImage, spec: &WatermarkSpec, mode: RenderMode) -> DynamicImage {
        if spec.is_disabled() {
            return base.clone();
        }
        let alpha = spec.alpha();
        if alpha == 0 {
            return base.clone();
        }

        let scale = mode.scale();
        let origin = Self::scaled_position(spec.position, scale);
        let font_size = Self::scaled_font_size(spec.font_size_px, scale);
        let font = self.fonts.resolve(font_size);
        let color = Rgba([spec.color.r(), spec.color.g(), spec.color.b(), alpha]);

        debug!(
            mode = ?mode,
            x = origin.x,
            y = origin.y,
            font_size,
            rotation = spec.rotation_deg,
            font = %font.describe(),
            "Rendering watermark"
        );

        let mut canvas = base.to_rgba8();
        if spec.rotation_deg == 0 {
            font.draw(&mut canvas, &spec.text, origin.x, origin.y, color);
        } else {
            let layer = Self::rotated_layer(
                font.as_ref(),
                &spec.text,
                origin,
                spec.rotation_deg,
                color,
                canvas.dimensions(),
            );
            if let Some(layer) = layer {
                composite_over(&mut canvas, &layer);
            }
        }

        Self::restore_color_type(base.color(), canvas)
    }

    /// Downscale `full` to the geometry's display size and render a preview
    pub fn render_preview_frame(
        &self,
        full: &DynamicImage,
        spec: &WatermarkSpec,
        geometry: &DisplayGeometry,
    ) -> DynamicImage {
        let frame = if geometry.is_unscaled() {
            full.clone()
        } else {
            full.resize_exact(geometry.width, geometry.height, FilterType::Lanczos3)
        };
        self.render(&frame, spec, RenderMode::preview(geometry))
    }

    /// Full-size transparent layer holding the rotated text, or `None` when
    /// the text has no extent
    fn rotated_layer(
        font: &dyn WatermarkFont,
        text: &str,
        origin: Position,
        rotation_deg: i32,
        color: Rgba<u8>,
        (image_width, image_height): (u32, u32),
    ) -> Option<RgbaImage> {
        let (text_width, text_height) = font.measure(text);
        if text_width == 0 || text_height == 0 {
            return None;
        }

        let pad = ROTATION_PADDING;
        let mut buffer = RgbaImage::new(text_width + 2 * pad, text_height + 2 * pad);
        font.draw(&mut buffer, text, pad as i32, pad as i32, color);

        let rotated = rotate_expand(&buffer, f64::from(rotation_deg));
        debug_assert_eq!(
            rotated.dimensions(),
            rotated_bounds(buffer.width(), buffer.height(), f64::from(rotation_deg))
        );

        let paste_x = paste_offset(origin.x, text_width, rotated.width(), image_width);
        let paste_y = paste_offset(origin.y, text_height, rotated.height(), image_height);

        let mut layer = RgbaImage::new(image_width, image_height);
        imageops::replace(&mut layer, &rotated, i64::from(paste_x), i64::from(paste_y));
        Some(layer)
    }

    fn scaled_position(position: Position, scale: f64) -> Position {
        Position::new(
            (f64::from(position.x) * scale).round() as i32,
            (f64::from(position.y) * scale).round() as i32,
        )
    }

    fn scaled_font_size(font_size: u32, scale: f64) -> u32 {
        ((f64::from(font_size) * scale).round() as u32).clamp(1, MAX_FONT_SIZE)
    }

    fn restore_color_type(color_type: ColorType, canvas: RgbaImage) -> DynamicImage {
        let flattened = |canvas: &RgbaImage| DynamicImage::ImageRgb8(flatten_onto_white(canvas));

        match color_type {
            ColorType::Rgb8 => flattened(&canvas),
            ColorType::L8 => DynamicImage::ImageLuma8(flattened(&canvas).into_luma8()),
            ColorType::La8 => DynamicImage::ImageLumaA8(DynamicImage::ImageRgba8(canvas).into_luma_alpha8()),
            ColorType::Rgb16 => DynamicImage::ImageRgb16(flattened(&canvas).into_rgb16()),
            ColorType::Rgba16 => DynamicImage::ImageRgba16(DynamicImage::ImageRgba8(canvas).into_rgba16()),
            ColorType::L16 => DynamicImage::ImageLuma16(flattened(&canvas).into_luma16()),
            ColorType::La16 => {
                DynamicImage::ImageLumaA16(DynamicImage::ImageRgba8(canvas).into_luma_alpha16())
            }
            ColorType::Rgb32F => DynamicImage::ImageRgb32F(flattened(&canvas).into_rgb32f()),
            ColorType::Rgba32F => DynamicImage::ImageRgba32F(DynamicImage::ImageRgba8(canvas).into_rgba32f()),
            _ => DynamicImage::ImageRgba8(canvas),
        }
    }
}

//! Watermark placement in original-image space
//!
//! Two ways of positioning exist:
//!
//! - **Anchors**: a normalized `(fx, fy)` fraction of the usable area. The
//!   text box (before rotation) is kept inside the image with a fixed margin.
//! - **Drag**: a pointer position in the preview is mapped straight back to
//!   original pixels. No margin is applied, so the text can sit flush against
//!   an edge.

use crate::coords::DisplayGeometry;
use crate::font::FontChain;
use crate::models::{Anchor, AnchorPreset, Position};
use tracing::debug;

/// Distance kept between anchored text and the image edges
pub const MARGIN: i64 = 10;

/// Resolves anchors and drag gestures into stored watermark positions
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementResolver;

impl PlacementResolver {
    /// Resolve a normalized anchor into a top-left text position.
    ///
    /// `measure` returns the unrotated `(width, height)` of `text` at
    /// `font_size`. When the text is larger than the image minus margins the
    /// coordinate collapses to the margin and the text overflows.
    pub fn resolve_anchor<F>(
        anchor: Anchor,
        text: &str,
        font_size: u32,
        image_width: u32,
        image_height: u32,
        measure: F,
    ) -> Position
    where
        F: Fn(&str, u32) -> (u32, u32),
    {
        let (text_width, text_height) = measure(text, font_size);
        let x = Self::resolve_axis(anchor.fx(), image_width, text_width);
        let y = Self::resolve_axis(anchor.fy(), image_height, text_height);

        debug!(
            fx = anchor.fx(),
            fy = anchor.fy(),
            text_width,
            text_height,
            x,
            y,
            "Resolved anchor position"
        );
        Position::new(x, y)
    }

    /// Resolve one of the nine canonical anchors
    pub fn resolve_preset<F>(
        preset: AnchorPreset,
        text: &str,
        font_size: u32,
        image_width: u32,
        image_height: u32,
        measure: F,
    ) -> Position
    where
        F: Fn(&str, u32) -> (u32, u32),
    {
        Self::resolve_anchor(
            preset.anchor(),
            text,
            font_size,
            image_width,
            image_height,
            measure,
        )
    }

    /// Resolve an anchor measuring text with the fonts the compositor will use
    pub fn resolve_with_fonts(
        anchor: Anchor,
        text: &str,
        font_size: u32,
        image_width: u32,
        image_height: u32,
        fonts: &FontChain,
    ) -> Position {
        Self::resolve_anchor(anchor, text, font_size, image_width, image_height, |t, size| {
            fonts.resolve(size).measure(t)
        })
    }

    /// Map a pointer position in the preview back to original pixels.
    ///
    /// Bypasses the margin logic entirely; the result is only clamped into
    /// the image.
    pub fn resolve_drag(display_x: f64, display_y: f64, geometry: &DisplayGeometry) -> Position {
        geometry.to_original(display_x, display_y)
    }

    fn resolve_axis(fraction: f64, image_extent: u32, text_extent: u32) -> i32 {
        let image_extent = i64::from(image_extent);
        let text_extent = i64::from(text_extent);
        let available = image_extent - text_extent - 2 * MARGIN;
        let upper = image_extent - text_extent - MARGIN;

        let raw = (fraction * available as f64).round() as i64 + MARGIN;
        raw.min(upper).max(MARGIN) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed(width: u32, height: u32) -> impl Fn(&str, u32) -> (u32, u32) {
        move |_, _| (width, height)
    }

    #[test]
    fn test_corners_respect_margin() {
        let top_left =
            PlacementResolver::resolve_preset(AnchorPreset::TopLeft, "x", 24, 800, 600, fixed(100, 30));
        assert_eq!(top_left, Position::new(10, 10));

        let bottom_right = PlacementResolver::resolve_preset(
            AnchorPreset::BottomRight,
            "x",
            24,
            800,
            600,
            fixed(100, 30),
        );
        assert_eq!(bottom_right, Position::new(690, 560));
    }

    #[test]
    fn test_center_anchor() {
        let center =
            PlacementResolver::resolve_preset(AnchorPreset::Center, "x", 24, 800, 600, fixed(100, 30));
        // avail_w = 680, avail_h = 550
        assert_eq!(center, Position::new(350, 285));
    }

    #[test]
    fn test_text_wider_than_image_collapses_to_margin() {
        let position = PlacementResolver::resolve_anchor(
            Anchor::new(1.0, 1.0),
            "very long text",
            24,
            50,
            40,
            fixed(200, 100),
        );
        assert_eq!(position, Position::new(10, 10));
    }

    #[test]
    fn test_drag_bypasses_margin() {
        let g = DisplayGeometry::compute(800, 600, 400, 300).unwrap();
        assert_eq!(
            PlacementResolver::resolve_drag(0.0, 0.0, &g),
            Position::new(0, 0)
        );
        assert_eq!(
            PlacementResolver::resolve_drag(400.0, 300.0, &g),
            Position::new(800, 600)
        );
        assert_eq!(
            PlacementResolver::resolve_drag(-20.0, 1000.0, &g),
            Position::new(0, 600)
        );
    }

    #[test]
    fn test_measure_receives_text_and_size() {
        let position = PlacementResolver::resolve_anchor(
            Anchor::new(0.0, 0.0),
            "abc",
            32,
            400,
            400,
            |text, size| {
                assert_eq!(text, "abc");
                assert_eq!(size, 32);
                (10, 10)
            },
        );
        assert_eq!(position, Position::new(10, 10));
    }

    proptest! {
        #[test]
        fn prop_canonical_anchors_stay_inside(
            iw in 40u32..5000,
            ih in 40u32..5000,
            tw in 0u32..5000,
            th in 0u32..5000,
        ) {
            prop_assume!(tw + 20 < iw && th + 20 < ih);
            for preset in AnchorPreset::ALL {
                let p = PlacementResolver::resolve_preset(preset, "t", 12, iw, ih, fixed(tw, th));
                prop_assert!(p.x >= 0 && p.y >= 0);
                prop_assert!(i64::from(p.x) + i64::from(tw) <= i64::from(iw));
                prop_assert!(i64::from(p.y) + i64::from(th) <= i64::from(ih));
            }
        }

        #[test]
        fn prop_any_fraction_stays_inside(
            fx in 0.0f64..=1.0,
            fy in 0.0f64..=1.0,
            iw in 40u32..5000,
            ih in 40u32..5000,
            tw in 0u32..2000,
            th in 0u32..2000,
        ) {
            prop_assume!(tw + 20 < iw && th + 20 < ih);
            let p = PlacementResolver::resolve_anchor(Anchor::new(fx, fy), "t", 12, iw, ih, fixed(tw, th));
            prop_assert!(i64::from(p.x) >= MARGIN && i64::from(p.y) >= MARGIN);
            prop_assert!(i64::from(p.x) + i64::from(tw) + MARGIN <= i64::from(iw));
            prop_assert!(i64::from(p.y) + i64::from(th) + MARGIN <= i64::from(ih));
        }
    }
}

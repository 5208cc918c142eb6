//! Porter-Duff "over" compositing on RGBA8 pixels

use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// Scale a color's alpha by glyph coverage in `[0, 1]`
pub fn with_coverage(color: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let alpha = (f32::from(color[3]) * coverage.clamp(0.0, 1.0)).round() as u8;
    Rgba([color[0], color[1], color[2], alpha])
}

/// Blend `src` over `dst`.
///
/// Fully transparent sources leave `dst` untouched and fully opaque sources
/// replace it exactly.
pub fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    match src[3] {
        0 => return dst,
        255 => return src,
        _ => {}
    }

    let src_alpha = f32::from(src[3]) / 255.0;
    let dst_alpha = f32::from(dst[3]) / 255.0;
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |s: u8, d: u8| -> u8 {
        let value =
            (f32::from(s) * src_alpha + f32::from(d) * dst_alpha * (1.0 - src_alpha)) / out_alpha;
        value.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

/// Blend a single pixel into `canvas`, ignoring coordinates outside it
pub fn blend_at(canvas: &mut RgbaImage, x: i64, y: i64, src: Rgba<u8>) {
    if x < 0 || y < 0 || x >= i64::from(canvas.width()) || y >= i64::from(canvas.height()) {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    let blended = blend_pixel(*canvas.get_pixel(x, y), src);
    canvas.put_pixel(x, y, blended);
}

/// Composite a layer of the same size over `base` in one pass
pub fn composite_over(base: &mut RgbaImage, layer: &RgbaImage) {
    debug_assert_eq!(base.dimensions(), layer.dimensions());
    for (dst, src) in base.pixels_mut().zip(layer.pixels()) {
        *dst = blend_pixel(*dst, *src);
    }
}

/// Drop the alpha channel by compositing onto opaque white
pub fn flatten_onto_white(image: &RgbaImage) -> RgbImage {
    let mut flat = RgbImage::new(image.width(), image.height());
    for (dst, src) in flat.pixels_mut().zip(image.pixels()) {
        let alpha = u32::from(src[3]);
        let channel = |c: u8| -> u8 {
            ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8
        };
        *dst = Rgb([channel(src[0]), channel(src[1]), channel(src[2])]);
    }
    flat
}

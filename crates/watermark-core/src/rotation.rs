//! Rotation of RGBA buffers with canvas expansion.
//!
//! Positive angles rotate counter-clockwise as seen on screen. The output
//! canvas grows to the bounding box of the rotated rectangle, so corners are
//! never clipped; uncovered areas are transparent.
//!
//! Sampling uses inverse mapping with bilinear interpolation on premultiplied
//! color, which keeps transparent padding from darkening glyph edges.

use image::{Rgba, RgbaImage};

const ANGLE_EPSILON: f64 = 1e-3;

/// Angle folded into `[0, 360)`
fn normalize_degrees(angle_degrees: f64) -> f64 {
    angle_degrees.rem_euclid(360.0)
}

fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() < ANGLE_EPSILON
}

/// Dimensions of the axis-aligned box containing a `width × height`
/// rectangle rotated by `angle_degrees`.
///
/// Equivalent angles (`-180`/`180`, `0`/`360`) give identical results.
pub fn rotated_bounds(width: u32, height: u32, angle_degrees: f64) -> (u32, u32) {
    let angle = normalize_degrees(angle_degrees);

    if is_close(angle, 0.0) || is_close(angle, 360.0) || is_close(angle, 180.0) {
        return (width, height);
    }
    if is_close(angle, 90.0) || is_close(angle, 270.0) {
        return (height, width);
    }

    let radians = angle.to_radians();
    let cos = radians.cos().abs();
    let sin = radians.sin().abs();
    let (w, h) = (f64::from(width), f64::from(height));

    // Shave float noise before ceil so exact fits don't gain a pixel
    let new_w = (w * cos + h * sin - 1e-6).ceil() as u32;
    let new_h = (w * sin + h * cos - 1e-6).ceil() as u32;

    (new_w.max(1), new_h.max(1))
}

/// Rotate `image` by `angle_degrees` counter-clockwise, expanding the canvas
pub fn rotate_expand(image: &RgbaImage, angle_degrees: f64) -> RgbaImage {
    let angle = normalize_degrees(angle_degrees);
    if is_close(angle, 0.0) || is_close(angle, 360.0) {
        return image.clone();
    }

    let (src_w, src_h) = (f64::from(image.width()), f64::from(image.height()));
    let (dst_w, dst_h) = rotated_bounds(image.width(), image.height(), angle);

    let radians = angle.to_radians();
    let cos = radians.cos();
    let sin = radians.sin();

    let src_cx = src_w / 2.0;
    let src_cy = src_h / 2.0;
    let dst_cx = f64::from(dst_w) / 2.0;
    let dst_cy = f64::from(dst_h) / 2.0;

    let mut rotated = RgbaImage::new(dst_w, dst_h);

    for (dst_x, dst_y, pixel) in rotated.enumerate_pixels_mut() {
        // Pixel centers relative to the canvas center
        let dx = f64::from(dst_x) + 0.5 - dst_cx;
        let dy = f64::from(dst_y) + 0.5 - dst_cy;

        let src_x = dx * cos - dy * sin + src_cx - 0.5;
        let src_y = dx * sin + dy * cos + src_cy - 0.5;

        *pixel = sample_bilinear(image, src_x, src_y);
    }

    rotated
}

/// Premultiplied RGBA at integer coordinates, transparent outside the image
fn premultiplied(image: &RgbaImage, x: i64, y: i64) -> [f64; 4] {
    if x < 0 || y < 0 || x >= i64::from(image.width()) || y >= i64::from(image.height()) {
        return [0.0; 4];
    }
    let p = image.get_pixel(x as u32, y as u32);
    let a = f64::from(p[3]) / 255.0;
    [
        f64::from(p[0]) * a,
        f64::from(p[1]) * a,
        f64::from(p[2]) * a,
        f64::from(p[3]),
    ]
}

fn sample_bilinear(image: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (ix, iy) = (x0 as i64, y0 as i64);

    let taps = [
        (premultiplied(image, ix, iy), (1.0 - fx) * (1.0 - fy)),
        (premultiplied(image, ix + 1, iy), fx * (1.0 - fy)),
        (premultiplied(image, ix, iy + 1), (1.0 - fx) * fy),
        (premultiplied(image, ix + 1, iy + 1), fx * fy),
    ];

    let mut acc = [0.0f64; 4];
    for (value, weight) in taps {
        for (sum, component) in acc.iter_mut().zip(value) {
            *sum += component * weight;
        }
    }

    let alpha = acc[3];
    if alpha < 0.5 {
        return Rgba([0, 0, 0, 0]);
    }
    let unpremultiply = |c: f64| (c * 255.0 / alpha).round().clamp(0.0, 255.0) as u8;

    Rgba([
        unpremultiply(acc[0]),
        unpremultiply(acc[1]),
        unpremultiply(acc[2]),
        alpha.round().clamp(0.0, 255.0) as u8,
    ])
}

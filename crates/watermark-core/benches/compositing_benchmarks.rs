//! Benchmarks for watermark rendering

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, Rgb as RgbPixel, RgbImage, Rgba, RgbaImage};
use watermark_core::rotation::rotate_expand;
use watermark_core::{
    Compositor, DisplayGeometry, Position, RenderMode, Rgb, WatermarkSpec,
};

fn photo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, RgbPixel([90, 120, 150])))
}

fn spec(rotation_deg: i32) -> WatermarkSpec {
    WatermarkSpec {
        text: "© 2024 Studio".to_string(),
        font_size_px: 48,
        color: Rgb::new(255, 255, 255),
        opacity_pct: 60,
        position: Position::new(400, 300),
        rotation_deg,
    }
}

fn benchmark_export_render(c: &mut Criterion) {
    let compositor = Compositor::bitmap_only();
    let base = photo(1920, 1080);

    c.bench_function("render_export_unrotated", |b| {
        let spec = spec(0);
        b.iter(|| compositor.render(black_box(&base), black_box(&spec), RenderMode::Export));
    });

    c.bench_function("render_export_rotated_30", |b| {
        let spec = spec(30);
        b.iter(|| compositor.render(black_box(&base), black_box(&spec), RenderMode::Export));
    });
}

fn benchmark_preview_frame(c: &mut Criterion) {
    let compositor = Compositor::bitmap_only();
    let full = photo(1920, 1080);
    let geometry = DisplayGeometry::compute(1920, 1080, 600, 400).unwrap();

    c.bench_function("render_preview_frame", |b| {
        let spec = spec(-45);
        b.iter(|| compositor.render_preview_frame(black_box(&full), black_box(&spec), &geometry));
    });
}

fn benchmark_rotation(c: &mut Criterion) {
    let buffer = RgbaImage::from_pixel(400, 80, Rgba([255, 0, 0, 200]));

    c.bench_function("rotate_expand_45", |b| {
        b.iter(|| rotate_expand(black_box(&buffer), black_box(45.0)));
    });
}

criterion_group!(
    benches,
    benchmark_export_render,
    benchmark_preview_frame,
    benchmark_rotation
);
criterion_main!(benches);

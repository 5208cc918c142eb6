//! Font resolution and text rasterization.
//!
//! Fonts come from an ordered list of [`FontProvider`]s. The first provider
//! that loads wins; when every provider fails the chain falls back to a
//! built-in bitmap font, so rendering never fails for lack of fonts.

use crate::blend::{blend_at, with_coverage};
use crate::config::FontConfig;
use crate::error::{Result, WatermarkError};
use ab_glyph::{Font, FontVec, GlyphId, PxScale, ScaleFont};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Rgba, RgbaImage};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// A font at a fixed pixel size that can measure and draw text
pub trait WatermarkFont: Send + Sync {
    /// Unrotated `(width, height)` of `text` in pixels
    fn measure(&self, text: &str) -> (u32, u32);

    /// Blend `text` into `canvas` with its top-left corner at `(x, y)`
    fn draw(&self, canvas: &mut RgbaImage, text: &str, x: i32, y: i32, color: Rgba<u8>);

    /// Short human readable description, used in logs
    fn describe(&self) -> String;
}

/// A source of fonts, tried in order by [`FontChain`]
pub trait FontProvider: Send + Sync + fmt::Debug {
    fn name(&self) -> String;

    fn load(&self, size_px: u32) -> Result<Box<dyn WatermarkFont>>;
}

/// Outline (TrueType/OpenType) font rasterized with ab_glyph
pub struct OutlineFont {
    font: Arc<FontVec>,
    scale: PxScale,
    label: String,
}

impl OutlineFont {
    pub fn new(font: Arc<FontVec>, size_px: u32, label: impl Into<String>) -> Self {
        Self {
            font,
            scale: PxScale::from(size_px.max(1) as f32),
            label: label.into(),
        }
    }

    /// Parse font bytes directly
    pub fn from_bytes(data: Vec<u8>, size_px: u32) -> Result<Self> {
        let font = FontVec::try_from_vec(data).map_err(|e| WatermarkError::FontUnavailable {
            source_name: "memory".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::new(Arc::new(font), size_px, "memory"))
    }

    fn line_width(&self, line: &str) -> f32 {
        let scaled = self.font.as_scaled(self.scale);
        let mut width = 0.0f32;
        let mut prev: Option<GlyphId> = None;
        for c in line.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    fn line_advance(&self) -> f32 {
        let scaled = self.font.as_scaled(self.scale);
        scaled.height() + scaled.line_gap()
    }
}

impl WatermarkFont for OutlineFont {
    fn measure(&self, text: &str) -> (u32, u32) {
        if text.is_empty() {
            return (0, 0);
        }
        let scaled = self.font.as_scaled(self.scale);
        let lines: Vec<&str> = text.split('\n').collect();
        let width = lines
            .iter()
            .map(|line| self.line_width(line))
            .fold(0.0f32, f32::max);
        let height = scaled.height() + self.line_advance() * (lines.len() - 1) as f32;
        (width.ceil() as u32, height.ceil() as u32)
    }

    fn draw(&self, canvas: &mut RgbaImage, text: &str, x: i32, y: i32, color: Rgba<u8>) {
        let scaled = self.font.as_scaled(self.scale);
        let ascent = scaled.ascent();

        for (index, line) in text.split('\n').enumerate() {
            let baseline = y as f32 + self.line_advance() * index as f32 + ascent;
            let mut cursor = x as f32;
            let mut prev: Option<GlyphId> = None;

            for c in line.chars() {
                let id = scaled.glyph_id(c);
                if let Some(prev) = prev {
                    cursor += scaled.kern(prev, id);
                }
                let glyph = id.with_scale_and_position(self.scale, ab_glyph::point(cursor, baseline));
                if let Some(outlined) = self.font.outline_glyph(glyph) {
                    let bounds = outlined.px_bounds();
                    outlined.draw(|gx, gy, coverage| {
                        let px = i64::from(gx) + bounds.min.x as i64;
                        let py = i64::from(gy) + bounds.min.y as i64;
                        blend_at(canvas, px, py, with_coverage(color, coverage));
                    });
                }
                cursor += scaled.h_advance(id);
                prev = Some(id);
            }
        }
    }

    fn describe(&self) -> String {
        format!("{} @ {}px", self.label, self.scale.y)
    }
}

/// Glyph cell size of the built-in bitmap font
pub const BITMAP_CELL: u32 = 8;

/// Built-in 8×8 bitmap font, scaled by whole pixels to approximate the
/// requested size. Always available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapFont {
    scale: u32,
}

impl BitmapFont {
    pub fn new(size_px: u32) -> Self {
        let scale = ((f64::from(size_px) / f64::from(BITMAP_CELL)).round() as u32).max(1);
        Self { scale }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    fn glyph(c: char) -> [u8; 8] {
        BASIC_FONTS
            .get(c)
            .or_else(|| LATIN_FONTS.get(c))
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8])
    }
}

impl WatermarkFont for BitmapFont {
    fn measure(&self, text: &str) -> (u32, u32) {
        if text.is_empty() {
            return (0, 0);
        }
        let cell = BITMAP_CELL.saturating_mul(self.scale);
        let lines: Vec<&str> = text.split('\n').collect();
        let columns = lines
            .iter()
            .map(|line| u32::try_from(line.chars().count()).unwrap_or(u32::MAX))
            .max()
            .unwrap_or(0);
        let rows = u32::try_from(lines.len()).unwrap_or(u32::MAX);
        (columns.saturating_mul(cell), rows.saturating_mul(cell))
    }

    fn draw(&self, canvas: &mut RgbaImage, text: &str, x: i32, y: i32, color: Rgba<u8>) {
        let scale = i64::from(self.scale);
        let cell = i64::from(BITMAP_CELL) * scale;
        let (width, height) = (i64::from(canvas.width()), i64::from(canvas.height()));

        for (line_index, line) in text.split('\n').enumerate() {
            let top = i64::from(y) + line_index as i64 * cell;
            for (column, c) in line.chars().enumerate() {
                let left = i64::from(x) + column as i64 * cell;
                for (row, bits) in Self::glyph(c).into_iter().enumerate() {
                    for bit in 0..8i64 {
                        if (bits >> bit) & 1 == 0 {
                            continue;
                        }
                        let px = left + bit * scale;
                        let py = top + row as i64 * scale;
                        // Only the part of the scaled dot that lands on the canvas
                        let xs = px.max(0)..(px + scale).min(width);
                        let ys = py.max(0)..(py + scale).min(height);
                        for sy in ys {
                            for sx in xs.clone() {
                                blend_at(canvas, sx, sy, color);
                            }
                        }
                    }
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("built-in bitmap x{}", self.scale)
    }
}

/// Loads a single font file, parsing it at most once
pub struct FileFontProvider {
    path: PathBuf,
    parsed: OnceLock<std::result::Result<Arc<FontVec>, String>>,
}

impl FileFontProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            parsed: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn font(&self) -> Result<Arc<FontVec>> {
        let parsed = self.parsed.get_or_init(|| {
            let data = std::fs::read(&self.path).map_err(|e| e.to_string())?;
            FontVec::try_from_vec(data)
                .map(Arc::new)
                .map_err(|e| e.to_string())
        });
        parsed.clone().map_err(|message| WatermarkError::FontUnavailable {
            source_name: self.path.display().to_string(),
            message,
        })
    }
}

impl fmt::Debug for FileFontProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileFontProvider")
            .field("path", &self.path)
            .field("loaded", &matches!(self.parsed.get(), Some(Ok(_))))
            .finish()
    }
}

impl FontProvider for FileFontProvider {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self, size_px: u32) -> Result<Box<dyn WatermarkFont>> {
        let font = self.font()?;
        let label = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name());
        Ok(Box::new(OutlineFont::new(font, size_px, label)))
    }
}

/// Well-known system font files, in platform preference order
#[derive(Debug)]
pub struct SystemFontProvider {
    candidates: Vec<FileFontProvider>,
}

impl SystemFontProvider {
    pub fn new() -> Self {
        Self::with_candidates(Self::platform_candidates())
    }

    pub fn with_candidates(paths: Vec<PathBuf>) -> Self {
        Self {
            candidates: paths.into_iter().map(FileFontProvider::new).collect(),
        }
    }

    /// Candidate font files for the current platform
    pub fn platform_candidates() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = if cfg!(target_os = "windows") {
            let root = std::env::var_os("WINDIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(r"C:\Windows"))
                .join("Fonts");
            ["arial.ttf", "segoeui.ttf", "msyh.ttc", "simhei.ttf"]
                .iter()
                .map(|name| root.join(name))
                .collect()
        } else if cfg!(target_os = "macos") {
            [
                "/Library/Fonts/Arial.ttf",
                "/System/Library/Fonts/Supplemental/Arial.ttf",
                "/System/Library/Fonts/Helvetica.ttc",
                "/System/Library/Fonts/PingFang.ttc",
            ]
            .iter()
            .map(PathBuf::from)
            .collect()
        } else {
            [
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/TTF/DejaVuSans.ttf",
                "/usr/share/fonts/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
                "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
                "/usr/share/fonts/noto/NotoSans-Regular.ttf",
                "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
            ]
            .iter()
            .map(PathBuf::from)
            .collect()
        };

        if let Some(user_fonts) = dirs::font_dir() {
            for name in ["Arial.ttf", "arial.ttf", "DejaVuSans.ttf"] {
                paths.push(user_fonts.join(name));
            }
        }
        paths
    }
}

impl Default for SystemFontProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FontProvider for SystemFontProvider {
    fn name(&self) -> String {
        "system".to_string()
    }

    fn load(&self, size_px: u32) -> Result<Box<dyn WatermarkFont>> {
        for candidate in &self.candidates {
            match candidate.load(size_px) {
                Ok(font) => return Ok(font),
                Err(e) => debug!("Skipping system font candidate: {}", e),
            }
        }
        Err(WatermarkError::FontUnavailable {
            source_name: self.name(),
            message: format!("none of {} candidate files could be loaded", self.candidates.len()),
        })
    }
}

/// Ordered list of font providers with a guaranteed bitmap fallback
#[derive(Debug, Clone, Default)]
pub struct FontChain {
    providers: Vec<Arc<dyn FontProvider>>,
    fallback_reported: Arc<AtomicBool>,
}

impl FontChain {
    pub fn new(providers: Vec<Arc<dyn FontProvider>>) -> Self {
        Self {
            providers,
            fallback_reported: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A chain that always renders with the built-in bitmap font
    pub fn bitmap_only() -> Self {
        Self::new(Vec::new())
    }

    /// Installed system fonts, then the bitmap fallback
    pub fn system() -> Self {
        Self::new(vec![Arc::new(SystemFontProvider::new())])
    }

    /// User-configured font files first, then (optionally) system fonts
    pub fn from_config(config: &FontConfig) -> Self {
        let mut providers: Vec<Arc<dyn FontProvider>> = config
            .font_paths
            .iter()
            .map(|path| Arc::new(FileFontProvider::new(path.clone())) as Arc<dyn FontProvider>)
            .collect();
        if config.use_system_fonts {
            providers.push(Arc::new(SystemFontProvider::new()));
        }
        Self::new(providers)
    }

    pub fn with_provider(mut self, provider: Arc<dyn FontProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve a font at `size_px`; never fails
    pub fn resolve(&self, size_px: u32) -> Box<dyn WatermarkFont> {
        let size_px = size_px.max(1);
        for provider in &self.providers {
            match provider.load(size_px) {
                Ok(font) => return font,
                Err(e) => debug!(provider = %provider.name(), "Font provider failed: {}", e),
            }
        }

        if !self.providers.is_empty() && !self.fallback_reported.swap(true, Ordering::Relaxed) {
            warn!(
                providers = ?self.provider_names(),
                "No font provider succeeded, using built-in bitmap font"
            );
        }
        Box::new(BitmapFont::new(size_px))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FailingProvider;

    impl FontProvider for FailingProvider {
        fn name(&self) -> String {
            "failing".to_string()
        }

        fn load(&self, _size_px: u32) -> Result<Box<dyn WatermarkFont>> {
            Err(WatermarkError::FontUnavailable {
                source_name: self.name(),
                message: "always fails".to_string(),
            })
        }
    }

    #[derive(Debug)]
    struct FixedBitmapProvider(u32);

    impl FontProvider for FixedBitmapProvider {
        fn name(&self) -> String {
            "fixed".to_string()
        }

        fn load(&self, _size_px: u32) -> Result<Box<dyn WatermarkFont>> {
            Ok(Box::new(BitmapFont::new(self.0)))
        }
    }

    #[test]
    fn test_bitmap_measure() {
        let font = BitmapFont::new(16);
        assert_eq!(font.scale(), 2);
        assert_eq!(font.measure("ab"), (32, 16));
        assert_eq!(font.measure("abc\nd"), (48, 32));
        assert_eq!(font.measure(""), (0, 0));
        assert_eq!(BitmapFont::new(1).scale(), 1);
    }

    #[test]
    fn test_bitmap_draw_uses_color() {
        let font = BitmapFont::new(8);
        let mut canvas = RgbaImage::new(16, 8);
        font.draw(&mut canvas, "H", 0, 0, Rgba([10, 20, 30, 255]));
        let drawn: Vec<_> = canvas.pixels().filter(|p| p[3] > 0).collect();
        assert!(!drawn.is_empty());
        assert!(drawn.iter().all(|p| **p == Rgba([10, 20, 30, 255])));
        // Nothing spills past the first glyph cell
        for y in 0..8 {
            for x in 8..16 {
                assert_eq!(canvas.get_pixel(x, y)[3], 0);
            }
        }
    }

    #[test]
    fn test_bitmap_huge_scale_saturates() {
        let font = BitmapFont::new(u32::MAX);
        assert_eq!(font.measure("ab"), (u32::MAX, u32::MAX));

        let mut canvas = RgbaImage::new(4, 4);
        font.draw(&mut canvas, "A", -8, -8, Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_bitmap_draw_clips_offscreen() {
        let font = BitmapFont::new(8);
        let mut canvas = RgbaImage::new(4, 4);
        font.draw(&mut canvas, "WW", -6, -6, Rgba([255, 255, 255, 255]));
        font.draw(&mut canvas, "WW", 100, 100, Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_bitmap_has_copyright_glyph() {
        assert_ne!(BitmapFont::glyph('©'), [0; 8]);
        assert_eq!(BitmapFont::glyph('\u{4e2d}'), BitmapFont::glyph('?'));
    }

    #[test]
    fn test_chain_falls_back_to_bitmap() {
        let chain = FontChain::new(vec![Arc::new(FailingProvider)]);
        let font = chain.resolve(24);
        assert!(font.describe().contains("bitmap"));
        assert_eq!(font.measure("x"), BitmapFont::new(24).measure("x"));
    }

    #[test]
    fn test_chain_first_success_wins() {
        let chain = FontChain::new(vec![
            Arc::new(FailingProvider),
            Arc::new(FixedBitmapProvider(32)),
            Arc::new(FixedBitmapProvider(8)),
        ]);
        assert_eq!(chain.resolve(8).measure("x"), (32, 32));
    }

    #[test]
    fn test_missing_font_file_is_unavailable() {
        let provider = FileFontProvider::new("/definitely/not/here.ttf");
        let err = provider.load(12).err().unwrap();
        assert_eq!(err.error_type(), "font_unavailable");
        // The failure is cached, second call answers the same way
        assert!(provider.load(12).is_err());
    }

    #[test]
    fn test_invalid_font_bytes_rejected() {
        assert!(OutlineFont::from_bytes(vec![0, 1, 2, 3], 12).is_err());
    }

    #[test]
    fn test_chain_from_config() {
        let config = FontConfig {
            font_paths: vec![PathBuf::from("/nope/a.ttf")],
            use_system_fonts: false,
        };
        let chain = FontChain::from_config(&config);
        assert_eq!(chain.provider_names(), vec!["/nope/a.ttf".to_string()]);
        assert!(chain.resolve(16).describe().contains("bitmap"));
    }
}

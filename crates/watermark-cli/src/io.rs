//! Image discovery, decoding and encoding on the local filesystem

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;
use watermark_core::blend::flatten_onto_white;
use watermark_core::{output_file_name, ImageEntry, ImageSink, ImageSource, Result, WatermarkError};

/// File extensions accepted on import, lowercase
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// A single supported file, or every supported file below a directory,
/// sorted by path
pub fn discover_images(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        if !is_supported(input) {
            return Err(WatermarkError::InvalidInput {
                message: format!("Unsupported image format: {}", input.display()),
            });
        }
        return Ok(vec![input.to_path_buf()]);
    }

    let mut found = Vec::new();
    let mut pending = vec![input.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_supported(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    debug!("Discovered {} images under {:?}", found.len(), input);
    Ok(found)
}

/// Decodes batch entries straight from their source files
#[derive(Debug, Clone, Copy, Default)]
pub struct FileImageSource;

impl ImageSource for FileImageSource {
    fn open(&mut self, entry: &ImageEntry) -> Result<DynamicImage> {
        Ok(image::open(&entry.source)?)
    }
}

/// Writes rendered images next to each other in an output directory
#[derive(Debug, Clone)]
pub struct FileImageSink {
    output_dir: PathBuf,
    suffix: String,
    jpeg_quality: u8,
}

impl FileImageSink {
    pub fn new(output_dir: impl Into<PathBuf>, suffix: impl Into<String>, jpeg_quality: u8) -> Self {
        Self {
            output_dir: output_dir.into(),
            suffix: suffix.into(),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Where `source` will be written
    pub fn output_path(&self, source: &Path) -> Result<PathBuf> {
        Ok(self.output_dir.join(output_file_name(source, &self.suffix)?))
    }
}

impl ImageSink for FileImageSink {
    fn write(&mut self, entry: &ImageEntry, image: &DynamicImage) -> Result<PathBuf> {
        let path = self.output_path(&entry.source)?;
        if path == entry.source {
            return Err(WatermarkError::InvalidInput {
                message: format!("Refusing to overwrite source image {}", entry.source.display()),
            });
        }
        std::fs::create_dir_all(&self.output_dir)?;

        let format = ImageFormat::from_path(&path)?;
        if format == ImageFormat::Jpeg {
            let rgb = if image.color().has_alpha() {
                flatten_onto_white(&image.to_rgba8())
            } else {
                image.to_rgb8()
            };
            let writer = BufWriter::new(File::create(&path)?);
            let mut encoder = JpegEncoder::new_with_quality(writer, self.jpeg_quality);
            encoder.encode_image(&rgb)?;
        } else {
            image.save_with_format(&path, format)?;
        }

        debug!(image = %entry.id, "Wrote {:?}", path);
        Ok(path)
    }
}

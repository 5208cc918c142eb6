//! Sequential batch export
//!
//! Every image is decoded, rendered with its own spec at full resolution and
//! handed to a sink. A failure on one image is recorded and the run moves on;
//! cancellation is honoured between images, never halfway through one.

use crate::batch::{ImageBatch, ImageEntry, ImageId};
use crate::compositor::{Compositor, RenderMode};
use crate::error::{Result, WatermarkError};
use crate::store::ConfigStore;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Suffix appended to exported file stems by default
pub const DEFAULT_SUFFIX: &str = "_watermarked";

/// Decodes the full-resolution pixels of a batch entry
pub trait ImageSource {
    fn open(&mut self, entry: &ImageEntry) -> Result<DynamicImage>;
}

impl<F> ImageSource for F
where
    F: FnMut(&ImageEntry) -> Result<DynamicImage>,
{
    fn open(&mut self, entry: &ImageEntry) -> Result<DynamicImage> {
        self(entry)
    }
}

/// Persists a rendered image and reports where it went
pub trait ImageSink {
    fn write(&mut self, entry: &ImageEntry, image: &DynamicImage) -> Result<PathBuf>;
}

impl<F> ImageSink for F
where
    F: FnMut(&ImageEntry, &DynamicImage) -> Result<PathBuf>,
{
    fn write(&mut self, entry: &ImageEntry, image: &DynamicImage) -> Result<PathBuf> {
        self(entry, image)
    }
}

/// Reported after every image, successful or not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportProgress {
    pub completed: usize,
    pub total: usize,
    pub current: ImageId,
    pub succeeded: usize,
}

/// One image that could not be exported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    pub id: ImageId,
    pub source: PathBuf,
    pub error: String,
}

/// Outcome of a batch export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<ExportFailure>,
    pub cancelled: bool,
    pub outputs: Vec<PathBuf>,
}

impl ExportSummary {
    /// Images that were neither exported nor failed
    pub fn skipped(&self) -> usize {
        self.total - self.succeeded - self.failures.len()
    }

    pub fn is_complete_success(&self) -> bool {
        !self.cancelled && self.failures.is_empty() && self.succeeded == self.total
    }
}

/// Export every image in `batch` with its active spec.
///
/// Images without a stored spec get one seeded from the store's default.
pub fn export_batch<P>(
    batch: &ImageBatch,
    store: &mut ConfigStore,
    compositor: &Compositor,
    source: &mut dyn ImageSource,
    sink: &mut dyn ImageSink,
    cancel: &CancellationToken,
    mut on_progress: P,
) -> ExportSummary
where
    P: FnMut(&ExportProgress),
{
    let mut summary = ExportSummary {
        total: batch.len(),
        ..ExportSummary::default()
    };
    info!("Starting export of {} images", summary.total);

    for (index, entry) in batch.entries().enumerate() {
        if cancel.is_cancelled() {
            info!(
                "Export cancelled after {} of {} images",
                index, summary.total
            );
            summary.cancelled = true;
            break;
        }

        match export_one(entry, store, compositor, source, sink) {
            Ok(output) => {
                debug!(image = %entry.id, output = %output.display(), "Exported image");
                summary.succeeded += 1;
                summary.outputs.push(output);
            }
            Err(e) => {
                warn!(
                    image = %entry.id,
                    source = %entry.source.display(),
                    "Failed to export image: {}",
                    e
                );
                summary.failures.push(ExportFailure {
                    id: entry.id,
                    source: entry.source.clone(),
                    error: e.to_string(),
                });
            }
        }

        on_progress(&ExportProgress {
            completed: index + 1,
            total: summary.total,
            current: entry.id,
            succeeded: summary.succeeded,
        });
    }

    info!(
        "Export finished: {} succeeded, {} failed{}",
        summary.succeeded,
        summary.failures.len(),
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    summary
}

fn export_one(
    entry: &ImageEntry,
    store: &mut ConfigStore,
    compositor: &Compositor,
    source: &mut dyn ImageSource,
    sink: &mut dyn ImageSink,
) -> Result<PathBuf> {
    let base = source.open(entry)?;
    let spec = store.get_active(entry.id);
    let rendered = compositor.render(&base, &spec, RenderMode::Export);
    sink.write(entry, &rendered)
}

/// Batch exporter carrying its own cancellation handle
#[derive(Debug, Clone)]
pub struct BatchExporter {
    compositor: Compositor,
    cancel: CancellationToken,
}

impl BatchExporter {
    pub fn new(compositor: Compositor) -> Self {
        Self {
            compositor,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(compositor: Compositor, cancel: CancellationToken) -> Self {
        Self { compositor, cancel }
    }

    /// Handle that stops the run before the next image
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run<P>(
        &self,
        batch: &ImageBatch,
        store: &mut ConfigStore,
        source: &mut dyn ImageSource,
        sink: &mut dyn ImageSink,
        on_progress: P,
    ) -> ExportSummary
    where
        P: FnMut(&ExportProgress),
    {
        export_batch(
            batch,
            store,
            &self.compositor,
            source,
            sink,
            &self.cancel,
            on_progress,
        )
    }
}

/// Output file name for `source`: `{stem}{suffix}.{ext}`
pub fn output_file_name(source: &Path, suffix: &str) -> Result<String> {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .ok_or_else(|| {
            WatermarkError::invalid(format!("Path has no file name: {}", source.display()))
        })?;

    Ok(match source.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SpecDelta, WatermarkSpec};
    use image::{Rgb, RgbImage};

    fn batch_of(names: &[&str]) -> ImageBatch {
        let mut batch = ImageBatch::new();
        for name in names {
            batch.import(name, 64, 32);
        }
        batch
    }

    fn white_source(entry: &ImageEntry) -> Result<DynamicImage> {
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            entry.width,
            entry.height,
            Rgb([255, 255, 255]),
        )))
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(Path::new("/a/b/photo.jpg"), DEFAULT_SUFFIX).unwrap(),
            "photo_watermarked.jpg"
        );
        assert_eq!(
            output_file_name(Path::new("scan.tiff"), "-wm").unwrap(),
            "scan-wm.tiff"
        );
        assert_eq!(output_file_name(Path::new("README"), "_x").unwrap(), "README_x");
        assert!(output_file_name(Path::new("/"), DEFAULT_SUFFIX).is_err());
    }

    #[test]
    fn test_export_renders_each_image_with_its_spec() {
        let batch = batch_of(&["a.png", "b.png"]);
        let ids = batch.ids();
        let mut store = ConfigStore::default();
        store
            .apply_delta(ids[1], &SpecDelta::SetText(String::new()))
            .unwrap();
        store
            .apply_delta(ids[0], &SpecDelta::SetPosition(crate::models::Position::new(2, 2)))
            .unwrap();

        let mut written = Vec::new();
        let mut sink = |entry: &ImageEntry, image: &DynamicImage| -> Result<PathBuf> {
            written.push((entry.id, image.clone()));
            Ok(PathBuf::from(output_file_name(&entry.source, DEFAULT_SUFFIX)?))
        };
        let mut source = white_source;

        let summary = export_batch(
            &batch,
            &mut store,
            &Compositor::bitmap_only(),
            &mut source,
            &mut sink,
            &CancellationToken::new(),
            |_| {},
        );

        assert!(summary.is_complete_success());
        assert_eq!(
            summary.outputs,
            vec![PathBuf::from("a_watermarked.png"), PathBuf::from("b_watermarked.png")]
        );
        let blank = white_source(batch.get(ids[1]).unwrap()).unwrap();
        assert_ne!(written[0].1, blank);
        assert_eq!(written[1].1, blank);
    }

    #[test]
    fn test_failure_is_recorded_and_run_continues() {
        let batch = batch_of(&["ok1.png", "broken.png", "ok2.png"]);
        let mut store = ConfigStore::default();
        let mut source = |entry: &ImageEntry| -> Result<DynamicImage> {
            if entry.display_name() == "broken.png" {
                return Err(WatermarkError::invalid("corrupt data"));
            }
            white_source(entry)
        };
        let mut sink = |entry: &ImageEntry, _: &DynamicImage| -> Result<PathBuf> {
            Ok(entry.source.clone())
        };

        let mut progress = Vec::new();
        let summary = export_batch(
            &batch,
            &mut store,
            &Compositor::bitmap_only(),
            &mut source,
            &mut sink,
            &CancellationToken::new(),
            |p| progress.push(*p),
        );

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].source, PathBuf::from("broken.png"));
        assert!(summary.failures[0].error.contains("corrupt data"));
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[2].completed, 3);
        assert_eq!(progress[2].succeeded, 2);
        assert_eq!(summary.skipped(), 0);
    }

    #[test]
    fn test_cancel_between_images() {
        let batch = batch_of(&["1.png", "2.png", "3.png", "4.png"]);
        let mut store = ConfigStore::new(WatermarkSpec::default());
        let exporter = BatchExporter::new(Compositor::bitmap_only());
        let token = exporter.cancellation_token();

        let mut source = white_source;
        let mut sink = |entry: &ImageEntry, _: &DynamicImage| -> Result<PathBuf> {
            Ok(entry.source.clone())
        };

        let summary = exporter.run(&batch, &mut store, &mut source, &mut sink, |p| {
            if p.completed == 2 {
                token.cancel();
            }
        });

        assert!(summary.cancelled);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped(), 2);
        assert!(!summary.is_complete_success());
    }

    #[test]
    fn test_empty_batch() {
        let mut store = ConfigStore::default();
        let mut source = white_source;
        let mut sink = |entry: &ImageEntry, _: &DynamicImage| -> Result<PathBuf> {
            Ok(entry.source.clone())
        };
        let summary = export_batch(
            &ImageBatch::new(),
            &mut store,
            &Compositor::bitmap_only(),
            &mut source,
            &mut sink,
            &CancellationToken::new(),
            |_| {},
        );
        assert_eq!(summary, ExportSummary::default());
        assert!(summary.is_complete_success());
    }
}

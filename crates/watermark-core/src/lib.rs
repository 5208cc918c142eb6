//! # Watermark Core
//!
//! Placement and compositing engine for text watermarks on batches of
//! photos. A watermark's position and size are stored in original-image
//! pixels, so the scaled-down interactive preview and the full-resolution
//! export always agree. Each image carries its own spec, and named templates
//! can be applied to one image or the whole batch.

pub mod batch;
pub mod blend;
pub mod compositor;
pub mod config;
pub mod coords;
pub mod error;
pub mod export;
pub mod font;
pub mod logging;
pub mod models;
pub mod placement;
pub mod rotation;
pub mod session;
pub mod store;
pub mod template;

// Re-export commonly used types
pub use batch::{ImageBatch, ImageEntry, ImageId};
pub use compositor::{paste_offset, Compositor, RenderMode};
pub use config::*;
pub use coords::{CoordinateMapper, DisplayGeometry};
pub use error::*;
pub use export::{
    export_batch, output_file_name, BatchExporter, ExportFailure, ExportProgress, ExportSummary,
    ImageSink, ImageSource,
};
pub use font::{FontChain, FontProvider, WatermarkFont};
pub use logging::*;
pub use models::*;
pub use placement::{PlacementResolver, MARGIN};
pub use rotation::rotated_bounds;
pub use session::EditorSession;
pub use store::{ConfigStore, MemoryTemplateStorage, TemplateStorage};

/// Initialize the watermark core library
pub fn init(log_level: &str) -> Result<()> {
    logging::init_logging(log_level)?;

    tracing::info!("Watermark core {} initialized", version());
    Ok(())
}

/// Get the version of the watermark core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

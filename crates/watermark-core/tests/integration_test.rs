//! Integration tests for the watermark core

use image::{DynamicImage, Rgb as RgbPixel, RgbImage};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use watermark_core::{
    export_batch, init, output_file_name, version, AnchorPreset, Compositor, ConfigManager,
    ConfigStore, DisplayGeometry, EditorSession, ImageEntry, MemoryTemplateStorage, Position,
    RenderMode, Rgb, SpecDelta, TemplateStorage, WatermarkError, WatermarkSpec,
};

fn blank(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, RgbPixel([240, 240, 240])))
}

#[test]
fn test_core_initialization() {
    assert!(init("warn").is_ok(), "Core initialization should succeed");
}

#[test]
fn test_version_info() {
    assert_eq!(version(), "0.1.0", "Version should match workspace version");
}

#[test]
fn test_config_manager_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let manager = ConfigManager::with_path(temp_dir.path().join("config.toml")).unwrap();
    let config = manager.config();

    assert_eq!(config.watermark, WatermarkSpec::default());
    assert_eq!(config.export.jpeg_quality, 95);
    assert_eq!(config.preview.viewport_width, 600);
}

#[test]
fn test_session_edit_preview_export() {
    let store = ConfigStore::with_storage(
        WatermarkSpec::default(),
        Box::new(MemoryTemplateStorage::new()),
    );
    let mut session = EditorSession::new(store, Compositor::bitmap_only());
    let ids = session.import([("a.jpg", 800, 600), ("b.jpg", 800, 600), ("c.jpg", 400, 300)]);
    session.set_viewport(400, 300);

    session.apply(SpecDelta::SetText("© 2024".to_string())).unwrap();
    session.apply(SpecDelta::SetColor(Rgb::new(0, 0, 0))).unwrap();
    session.apply(SpecDelta::SetOpacity(100)).unwrap();
    let spec = session.place_at_anchor(AnchorPreset::BottomRight).unwrap();
    assert_eq!(spec.position, Position::new(800 - 144 - 10, 600 - 24 - 10));

    // Preview and export agree on where the text is
    let full = blank(800, 600);
    let preview = session.preview(&full).unwrap().unwrap();
    assert_eq!(preview.to_rgb8().dimensions(), (400, 300));
    let preview_dark = preview
        .to_rgb8()
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] < 100)
        .map(|(x, y, _)| (x, y))
        .collect::<Vec<_>>();
    assert!(!preview_dark.is_empty());
    assert!(preview_dark.iter().all(|(x, y)| *x >= 323 && *y >= 283));

    session.save_template("corner").unwrap();
    session.select(ids[2]).unwrap();
    assert_eq!(session.active_spec().unwrap(), WatermarkSpec::default());
    session.apply_template_to_all("corner").unwrap();

    let (batch, mut store, compositor) = session.into_parts();
    let mut source = |entry: &ImageEntry| -> watermark_core::Result<DynamicImage> {
        Ok(blank(entry.width, entry.height))
    };
    let mut outputs = Vec::new();
    let mut sink = |entry: &ImageEntry, image: &DynamicImage| -> watermark_core::Result<PathBuf> {
        outputs.push(image.clone());
        Ok(PathBuf::from(output_file_name(&entry.source, "_watermarked")?))
    };

    let summary = export_batch(
        &batch,
        &mut store,
        &compositor,
        &mut source,
        &mut sink,
        &CancellationToken::new(),
        |_| {},
    );
    assert!(summary.is_complete_success());
    assert_eq!(summary.outputs[2], PathBuf::from("c_watermarked.jpg"));

    // Export at full size puts the text at twice the preview coordinates
    let export_dark = outputs[0]
        .to_rgb8()
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] < 100)
        .count();
    assert!(export_dark > preview_dark.len());
}

#[test]
fn test_templates_persist_across_stores() {
    #[derive(Clone, Default)]
    struct Shared(std::sync::Arc<std::sync::Mutex<MemoryTemplateStorage>>);

    impl TemplateStorage for Shared {
        fn names(&self) -> watermark_core::Result<Vec<String>> {
            self.0.lock().unwrap().names()
        }
        fn load(&self, name: &str) -> watermark_core::Result<Option<serde_json::Value>> {
            self.0.lock().unwrap().load(name)
        }
        fn save(&mut self, name: &str, record: &serde_json::Value) -> watermark_core::Result<()> {
            self.0.lock().unwrap().save(name, record)
        }
        fn delete(&mut self, name: &str) -> watermark_core::Result<()> {
            self.0.lock().unwrap().delete(name)
        }
    }

    let shared = Shared::default();
    let mut first = ConfigStore::with_storage(WatermarkSpec::default(), Box::new(shared.clone()));
    let mut draft = WatermarkSpec::default();
    draft.text = "draft".to_string();
    draft.rotation_deg = -45;
    first.save_template("draft", &draft).unwrap();
    first.save_template("temp", &draft).unwrap();
    first.delete_template("temp").unwrap();

    let second = ConfigStore::with_storage(WatermarkSpec::default(), Box::new(shared));
    assert_eq!(second.list_templates(), vec!["draft".to_string()]);
    assert_eq!(second.template("draft"), Some(draft));
}

#[test]
fn test_preview_and_export_paths_match_at_full_scale() {
    let compositor = Compositor::bitmap_only();
    let base = blank(300, 200);
    let mut spec = WatermarkSpec::default();
    spec.position = Position::new(20, 30);

    let geometry = DisplayGeometry::compute(300, 200, 600, 400).unwrap();
    assert!(geometry.is_unscaled());
    assert_eq!(
        compositor.render(&base, &spec, RenderMode::preview(&geometry)),
        compositor.render(&base, &spec, RenderMode::Export)
    );
}

#[test]
fn test_user_errors_are_user_facing() {
    let mut session = EditorSession::new(ConfigStore::default(), Compositor::bitmap_only());
    let err = session.active_spec().unwrap_err();
    assert!(matches!(err, WatermarkError::NoSelection));
    assert!(err.is_user_facing());
}

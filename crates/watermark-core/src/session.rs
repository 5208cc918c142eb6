//! Editing session: the single entry point for interactive edits
//!
//! An [`EditorSession`] owns the batch, the per-image configuration, the
//! preview geometry and the compositor, and tracks which image is selected.
//! Every operation that needs a selection fails with
//! [`WatermarkError::NoSelection`] before mutating anything.

use crate::batch::{ImageBatch, ImageEntry, ImageId};
use crate::compositor::Compositor;
use crate::coords::{CoordinateMapper, DisplayGeometry};
use crate::error::{Result, WatermarkError};
use crate::models::{Anchor, Position, SpecDelta, WatermarkSpec};
use crate::placement::PlacementResolver;
use crate::store::ConfigStore;
use image::DynamicImage;
use std::path::Path;
use tracing::{debug, info};

/// Interactive editing state for one batch of images
#[derive(Debug)]
pub struct EditorSession {
    batch: ImageBatch,
    store: ConfigStore,
    mapper: CoordinateMapper,
    compositor: Compositor,
    selected: Option<ImageId>,
}

impl EditorSession {
    pub fn new(store: ConfigStore, compositor: Compositor) -> Self {
        Self {
            batch: ImageBatch::new(),
            store,
            mapper: CoordinateMapper::new(),
            compositor,
            selected: None,
        }
    }

    /// Add images as `(path, width, height)`; the first import selects the
    /// first new image
    pub fn import<I, P>(&mut self, images: I) -> Vec<ImageId>
    where
        I: IntoIterator<Item = (P, u32, u32)>,
        P: AsRef<Path>,
    {
        let ids: Vec<ImageId> = images
            .into_iter()
            .map(|(path, width, height)| self.batch.import(path, width, height))
            .collect();
        info!("Imported {} images ({} total)", ids.len(), self.batch.len());

        if self.selected.is_none() {
            if let Some(first) = ids.first() {
                self.focus(*first);
            }
        }
        ids
    }

    /// Remove an image and its configuration; the selection moves to the
    /// next image, or the previous one when the last image was removed
    pub fn remove(&mut self, id: ImageId) -> Result<ImageEntry> {
        let index = self
            .batch
            .position_of(id)
            .ok_or(WatermarkError::ImageNotFound { id })?;
        let entry = self
            .batch
            .remove(id)
            .ok_or(WatermarkError::ImageNotFound { id })?;
        self.store.forget_image(id);

        if self.selected == Some(id) {
            let ids = self.batch.ids();
            let replacement = ids.get(index).or_else(|| ids.last()).copied();
            match replacement {
                Some(next) => self.focus(next),
                None => {
                    self.selected = None;
                    self.mapper.set_image(0, 0);
                }
            }
        }
        Ok(entry)
    }

    pub fn select(&mut self, id: ImageId) -> Result<()> {
        if !self.batch.contains(id) {
            return Err(WatermarkError::ImageNotFound { id });
        }
        self.focus(id);
        Ok(())
    }

    /// Move to the next image; stays put at the end of the batch
    pub fn select_next(&mut self) -> Option<ImageId> {
        self.step(1)
    }

    /// Move to the previous image; stays put at the start of the batch
    pub fn select_prev(&mut self) -> Option<ImageId> {
        self.step(-1)
    }

    pub fn selected(&self) -> Option<&ImageEntry> {
        self.selected.and_then(|id| self.batch.get(id))
    }

    pub fn selected_id(&self) -> Option<ImageId> {
        self.selected
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.mapper.set_viewport(width, height);
    }

    /// Preview geometry, `None` until the viewport is laid out
    pub fn geometry(&self) -> Option<&DisplayGeometry> {
        self.mapper.geometry()
    }

    pub fn active_spec(&mut self) -> Result<WatermarkSpec> {
        let id = self.require_selection()?;
        Ok(self.store.get_active(id))
    }

    /// Apply one edit to the selected image's spec
    pub fn apply(&mut self, delta: SpecDelta) -> Result<WatermarkSpec> {
        let id = self.require_selection()?;
        self.store.apply_delta(id, &delta)
    }

    /// Move the watermark to a normalized anchor, keeping it inside the image
    pub fn place_at_anchor(&mut self, anchor: impl Into<Anchor>) -> Result<WatermarkSpec> {
        let entry = self.require_entry()?.clone();
        let spec = self.store.get_active(entry.id);
        let position = PlacementResolver::resolve_with_fonts(
            anchor.into(),
            &spec.text,
            spec.font_size_px,
            entry.width,
            entry.height,
            self.compositor.fonts(),
        );
        self.store
            .apply_delta(entry.id, &SpecDelta::SetPosition(position))
    }

    /// Move the watermark to a pointer position in the preview.
    ///
    /// Returns `Ok(None)` while the preview geometry is not ready.
    pub fn drag_to(&mut self, display_x: f64, display_y: f64) -> Result<Option<Position>> {
        let id = self.require_selection()?;
        let Some(geometry) = self.mapper.geometry().copied() else {
            debug!("Ignoring drag, preview geometry not ready");
            return Ok(None);
        };

        let position = PlacementResolver::resolve_drag(display_x, display_y, &geometry);
        self.store
            .apply_delta(id, &SpecDelta::SetPosition(position))?;
        Ok(Some(position))
    }

    /// Save the selected image's spec as a template
    pub fn save_template(&mut self, name: &str) -> Result<()> {
        let spec = self.active_spec()?;
        self.store.save_template(name, &spec)
    }

    /// Copy a template onto the selected image
    pub fn apply_template(&mut self, name: &str) -> Result<WatermarkSpec> {
        let id = self.require_selection()?;
        self.store.apply_template_to_one(name, id)?;
        Ok(self.store.get_active(id))
    }

    /// Copy a template onto every image in the batch
    pub fn apply_template_to_all(&mut self, name: &str) -> Result<usize> {
        let ids = self.batch.ids();
        self.store.apply_template_to_all(name, &ids)
    }

    /// Render the selected image's preview from its full-resolution pixels.
    ///
    /// Returns `Ok(None)` while the preview geometry is not ready.
    pub fn preview(&mut self, full: &DynamicImage) -> Result<Option<DynamicImage>> {
        let id = self.require_selection()?;
        let Some(geometry) = self.mapper.geometry().copied() else {
            return Ok(None);
        };
        let spec = self.store.get_active(id);
        Ok(Some(
            self.compositor.render_preview_frame(full, &spec, &geometry),
        ))
    }

    /// `"{n}/{total} - {file}"` for the selected image
    pub fn status_line(&self) -> String {
        match self.selected() {
            Some(entry) => {
                let index = self.batch.position_of(entry.id).unwrap_or(0);
                format!(
                    "{}/{} - {}",
                    index + 1,
                    self.batch.len(),
                    entry.display_name()
                )
            }
            None => "No images loaded".to_string(),
        }
    }

    pub fn batch(&self) -> &ImageBatch {
        &self.batch
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Hand the batch and configuration over, e.g. to a background export
    pub fn into_parts(self) -> (ImageBatch, ConfigStore, Compositor) {
        (self.batch, self.store, self.compositor)
    }

    fn focus(&mut self, id: ImageId) {
        if let Some(entry) = self.batch.get(id) {
            self.mapper.set_image(entry.width, entry.height);
            self.selected = Some(id);
            debug!(image = %id, "Selected image");
        }
    }

    fn step(&mut self, delta: isize) -> Option<ImageId> {
        let current = self.selected?;
        let ids = self.batch.ids();
        let index = self.batch.position_of(current)?;
        let target = index.checked_add_signed(delta)?;
        let next = *ids.get(target)?;
        self.focus(next);
        Some(next)
    }

    fn require_selection(&self) -> Result<ImageId> {
        self.selected.ok_or(WatermarkError::NoSelection)
    }

    fn require_entry(&self) -> Result<&ImageEntry> {
        let id = self.require_selection()?;
        self.batch.get(id).ok_or(WatermarkError::ImageNotFound { id })
    }
}

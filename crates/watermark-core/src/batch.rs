//! The set of images being watermarked
//!
//! Images are identified by an [`ImageId`] handed out at import time. Ids are
//! never reused, so per-image configuration keyed by id can't leak onto a
//! different picture after removals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable identity of an image within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An imported image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub id: ImageId,
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl ImageEntry {
    /// File name shown to the user
    pub fn display_name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// Ordered collection of imported images
#[derive(Debug, Clone, Default)]
pub struct ImageBatch {
    entries: BTreeMap<ImageId, ImageEntry>,
    next_id: u64,
}

impl ImageBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image and return its new id
    pub fn import(&mut self, source: impl AsRef<Path>, width: u32, height: u32) -> ImageId {
        let id = ImageId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            ImageEntry {
                id,
                source: source.as_ref().to_path_buf(),
                width,
                height,
            },
        );
        id
    }

    pub fn remove(&mut self, id: ImageId) -> Option<ImageEntry> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: ImageId) -> Option<&ImageEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Ids in import order
    pub fn ids(&self) -> Vec<ImageId> {
        self.entries.keys().copied().collect()
    }

    /// Entries in import order
    pub fn entries(&self) -> impl Iterator<Item = &ImageEntry> {
        self.entries.values()
    }

    /// Zero-based index of `id` in import order
    pub fn position_of(&self, id: ImageId) -> Option<usize> {
        self.entries.keys().position(|key| *key == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_order_and_ids() {
        let mut batch = ImageBatch::new();
        let a = batch.import("/photos/a.jpg", 800, 600);
        let b = batch.import("/photos/b.png", 1024, 768);
        let c = batch.import("/photos/c.bmp", 10, 10);

        assert_eq!(batch.ids(), vec![a, b, c]);
        assert_eq!(batch.position_of(b), Some(1));
        assert_eq!(batch.get(b).unwrap().display_name(), "b.png");
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut batch = ImageBatch::new();
        let a = batch.import("a.jpg", 1, 1);
        let removed = batch.remove(a).unwrap();
        assert_eq!(removed.id, a);
        assert!(batch.is_empty());

        let b = batch.import("a.jpg", 1, 1);
        assert_ne!(a, b);
        assert!(!batch.contains(a));
        assert_eq!(batch.position_of(a), None);
    }

    #[test]
    fn test_image_id_display() {
        assert_eq!(ImageId(7).to_string(), "#7");
    }
}

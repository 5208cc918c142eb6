//! Per-image watermark configuration and named templates
//!
//! Each image in a batch carries its own [`WatermarkSpec`], seeded lazily
//! from the default spec the first time it is asked for. Templates are named
//! specs that can be copied onto one image or broadcast to many; copies are
//! always deep, so later edits never flow back into a template.

use crate::batch::ImageId;
use crate::error::{Result, WatermarkError};
use crate::models::{SpecDelta, WatermarkSpec};
use crate::template::{decode_spec, encode_spec};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

/// Durable backing for templates, one JSON record per name
pub trait TemplateStorage: Send {
    fn names(&self) -> Result<Vec<String>>;

    fn load(&self, name: &str) -> Result<Option<Value>>;

    fn save(&mut self, name: &str, record: &Value) -> Result<()>;

    fn delete(&mut self, name: &str) -> Result<()>;
}

/// Template storage kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateStorage {
    records: BTreeMap<String, Value>,
}

impl MemoryTemplateStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw record, e.g. to simulate a hand-edited file
    pub fn with_record(mut self, name: impl Into<String>, record: Value) -> Self {
        self.records.insert(name.into(), record);
        self
    }

    pub fn records(&self) -> &BTreeMap<String, Value> {
        &self.records
    }
}

impl TemplateStorage for MemoryTemplateStorage {
    fn names(&self) -> Result<Vec<String>> {
        Ok(self.records.keys().cloned().collect())
    }

    fn load(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.records.get(name).cloned())
    }

    fn save(&mut self, name: &str, record: &Value) -> Result<()> {
        self.records.insert(name.to_string(), record.clone());
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        self.records.remove(name);
        Ok(())
    }
}

/// Owns every watermark spec in a session
pub struct ConfigStore {
    image_configs: HashMap<ImageId, WatermarkSpec>,
    default_config: WatermarkSpec,
    templates: BTreeMap<String, WatermarkSpec>,
    storage: Option<Box<dyn TemplateStorage>>,
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("image_configs", &self.image_configs.len())
            .field("default_config", &self.default_config)
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .field("persistent", &self.storage.is_some())
            .finish()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(WatermarkSpec::default())
    }
}

impl ConfigStore {
    /// In-memory store without template persistence
    pub fn new(default_config: WatermarkSpec) -> Self {
        Self {
            image_configs: HashMap::new(),
            default_config,
            templates: BTreeMap::new(),
            storage: None,
        }
    }

    /// Store backed by `storage`; existing templates are loaded leniently and
    /// unreadable entries are skipped
    pub fn with_storage(default_config: WatermarkSpec, storage: Box<dyn TemplateStorage>) -> Self {
        let mut templates = BTreeMap::new();

        match storage.names() {
            Ok(names) => {
                for name in names {
                    match storage.load(&name) {
                        Ok(Some(record)) => {
                            templates.insert(name, decode_spec(&record, &default_config));
                        }
                        Ok(None) => debug!(template = %name, "Template vanished while loading"),
                        Err(e) => warn!(template = %name, "Skipping unreadable template: {}", e),
                    }
                }
            }
            Err(e) => warn!("Could not list stored templates: {}", e),
        }

        info!("Loaded {} templates", templates.len());
        Self {
            image_configs: HashMap::new(),
            default_config,
            templates,
            storage: Some(storage),
        }
    }

    pub fn default_config(&self) -> WatermarkSpec {
        self.default_config.clone()
    }

    /// Replace the spec new images start from; existing images keep theirs
    pub fn set_default_config(&mut self, spec: WatermarkSpec) -> Result<()> {
        spec.validate()?;
        self.default_config = spec;
        Ok(())
    }

    /// Spec for `id`, seeding it from the default on first access
    pub fn get_active(&mut self, id: ImageId) -> WatermarkSpec {
        self.image_configs
            .entry(id)
            .or_insert_with(|| {
                debug!(image = %id, "Seeding image config from default");
                self.default_config.clone()
            })
            .clone()
    }

    /// Spec for `id` if one has been created
    pub fn peek(&self, id: ImageId) -> Option<WatermarkSpec> {
        self.image_configs.get(&id).cloned()
    }

    /// Replace the spec for `id`
    pub fn commit(&mut self, id: ImageId, spec: WatermarkSpec) -> Result<()> {
        spec.validate()?;
        self.image_configs.insert(id, spec);
        Ok(())
    }

    /// Apply one edit to the spec for `id` and return the result
    pub fn apply_delta(&mut self, id: ImageId, delta: &SpecDelta) -> Result<WatermarkSpec> {
        let current = self.get_active(id);
        let next = delta.apply(&current)?;
        self.image_configs.insert(id, next.clone());
        debug!(image = %id, ?delta, "Applied spec edit");
        Ok(next)
    }

    /// Drop the spec of an image that left the batch
    pub fn forget_image(&mut self, id: ImageId) {
        self.image_configs.remove(&id);
    }

    /// Save `spec` under `name`, overwriting any template with that name
    pub fn save_template(&mut self, name: &str, spec: &WatermarkSpec) -> Result<()> {
        let name = Self::normalize_name(name)?;
        spec.validate()?;

        if let Some(storage) = self.storage.as_mut() {
            storage.save(&name, &encode_spec(spec)?)?;
        }
        self.templates.insert(name.clone(), spec.clone());
        info!(template = %name, "Template saved");
        Ok(())
    }

    pub fn template(&self, name: &str) -> Option<WatermarkSpec> {
        self.templates.get(name.trim()).cloned()
    }

    /// Copy template `name` onto image `id`
    pub fn apply_template_to_one(&mut self, name: &str, id: ImageId) -> Result<()> {
        let spec = self.require_template(name)?;
        self.commit(id, spec)
    }

    /// Copy template `name` onto every image in `ids`.
    ///
    /// Fails before touching anything if the template is missing or `ids` is
    /// empty. Returns how many images were updated.
    pub fn apply_template_to_all(&mut self, name: &str, ids: &[ImageId]) -> Result<usize> {
        if ids.is_empty() {
            return Err(WatermarkError::EmptySelection);
        }
        let snapshot = self.require_template(name)?;
        snapshot.validate()?;

        for id in ids {
            self.image_configs.insert(*id, snapshot.clone());
        }
        info!(template = %name.trim(), images = ids.len(), "Template applied to batch");
        Ok(ids.len())
    }

    pub fn delete_template(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if !self.templates.contains_key(name) {
            return Err(WatermarkError::TemplateNotFound {
                name: name.to_string(),
            });
        }

        if let Some(storage) = self.storage.as_mut() {
            storage.delete(name)?;
        }
        self.templates.remove(name);
        info!(template = %name, "Template deleted");
        Ok(())
    }

    /// Template names in sorted order
    pub fn list_templates(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    fn require_template(&self, name: &str) -> Result<WatermarkSpec> {
        self.template(name)
            .ok_or_else(|| WatermarkError::TemplateNotFound {
                name: name.trim().to_string(),
            })
    }

    fn normalize_name(name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WatermarkError::invalid("Template name must not be empty"));
        }
        Ok(name.to_string())
    }
}

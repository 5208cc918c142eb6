//! Template storage backed by a single JSON file

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use watermark_core::{Result, TemplateStorage, WatermarkError};

/// All templates in one JSON object, `name → spec`.
///
/// Every change rewrites the whole file through a temporary file and a
/// rename, so a crash never leaves a half-written collection behind.
#[derive(Debug)]
pub struct JsonTemplateFile {
    path: PathBuf,
    records: Map<String, Value>,
}

impl JsonTemplateFile {
    /// Open `path`, treating a missing file as an empty collection
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(&text)? {
                    Value::Object(records) => records,
                    _ => {
                        return Err(WatermarkError::Persistence {
                            message: format!(
                                "{} does not contain a JSON object",
                                path.display()
                            ),
                        })
                    }
                }
            }
        } else {
            Map::new()
        };

        tracing::debug!("Opened template file {:?} ({} records)", path, records.len());
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.persistence_error(e))?;
            }
        }

        let text = serde_json::to_string_pretty(&Value::Object(self.records.clone()))?;
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        std::fs::write(&temp, text).map_err(|e| self.persistence_error(e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| self.persistence_error(e))?;
        Ok(())
    }

    fn persistence_error(&self, e: std::io::Error) -> WatermarkError {
        WatermarkError::Persistence {
            message: format!("Failed to write {}: {}", self.path.display(), e),
        }
    }
}

impl TemplateStorage for JsonTemplateFile {
    fn names(&self) -> Result<Vec<String>> {
        Ok(self.records.keys().cloned().collect())
    }

    fn load(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.records.get(name).cloned())
    }

    fn save(&mut self, name: &str, record: &Value) -> Result<()> {
        let previous = self.records.insert(name.to_string(), record.clone());
        if let Err(e) = self.flush() {
            match previous {
                Some(previous) => self.records.insert(name.to_string(), previous),
                None => self.records.remove(name),
            };
            return Err(e);
        }
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        let Some(previous) = self.records.remove(name) else {
            return Ok(());
        };
        if let Err(e) = self.flush() {
            self.records.insert(name.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

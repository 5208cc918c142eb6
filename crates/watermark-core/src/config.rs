//! Configuration management for the watermark engine

use crate::error::{Result, WatermarkError};
use crate::models::WatermarkSpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Spec every newly imported image starts from
    pub watermark: WatermarkSpec,
    pub fonts: FontConfig,
    pub preview: PreviewConfig,
    pub export: ExportConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfigSerde,
}

/// Where fonts are looked up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Font files tried first, in order
    pub font_paths: Vec<PathBuf>,
    /// Fall back to well-known system fonts after `font_paths`
    pub use_system_fonts: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            font_paths: Vec::new(),
            use_system_fonts: true,
        }
    }
}

/// Preview viewport size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            viewport_width: 600,
            viewport_height: 400,
        }
    }
}

/// Export naming and encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Appended to the file stem of every exported image
    pub suffix: String,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            suffix: "_watermarked".to_string(),
            jpeg_quality: 95,
        }
    }
}

/// Template storage location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub templates_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("watermark-studio");

        Self {
            templates_file: base_dir.join("templates.json"),
        }
    }
}

/// Serializable logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfigSerde {
    pub level: String,
}

impl Default for LoggingConfigSerde {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Reject settings that would make rendering or export misbehave
    pub fn validate(&self) -> Result<()> {
        self.watermark.validate()?;
        if !(1..=100).contains(&self.export.jpeg_quality) {
            return Err(WatermarkError::ConfigError {
                message: format!(
                    "JPEG quality must be between 1 and 100, got {}",
                    self.export.jpeg_quality
                ),
            });
        }
        Ok(())
    }
}

/// Configuration manager
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a configuration manager with a custom path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = Self::load_or_default(&config_path)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Update the configuration
    pub fn update_config(&mut self, config: AppConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.save()
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WatermarkError::ConfigError {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        let config_str =
            toml::to_string_pretty(&self.config).map_err(|e| WatermarkError::ConfigError {
                message: format!("Failed to serialize config: {}", e),
            })?;

        std::fs::write(&self.config_path, config_str).map_err(|e| {
            WatermarkError::ConfigError {
                message: format!("Failed to write config file: {}", e),
            }
        })?;

        tracing::info!("Configuration saved to {:?}", self.config_path);
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| WatermarkError::ConfigError {
                message: "Could not determine config directory".to_string(),
            })?
            .join("watermark-studio");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    fn load_or_default(path: &PathBuf) -> Result<AppConfig> {
        if !path.exists() {
            tracing::info!("Using default configuration");
            return Ok(AppConfig::default());
        }

        let config_str =
            std::fs::read_to_string(path).map_err(|e| WatermarkError::ConfigError {
                message: format!("Failed to read config file: {}", e),
            })?;

        let config: AppConfig =
            toml::from_str(&config_str).map_err(|e| WatermarkError::ConfigError {
                message: format!("Failed to parse config file: {}", e),
            })?;
        config.validate()?;

        tracing::info!("Configuration loaded from {:?}", path);
        Ok(config)
    }
}

//! Error types for the watermark engine

use crate::batch::ImageId;

/// Main error type for watermark operations
#[derive(Debug, thiserror::Error)]
pub enum WatermarkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Font unavailable from {source_name}: {message}")]
    FontUnavailable { source_name: String, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Template not found: {name}")]
    TemplateNotFound { name: String },

    #[error("No images selected")]
    EmptySelection,

    #[error("No image is currently selected")]
    NoSelection,

    #[error("Image not found in batch: {id}")]
    ImageNotFound { id: ImageId },

    #[error("Template storage failed: {message}")]
    Persistence { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Logging initialization failed: {message}")]
    LoggingError { message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl WatermarkError {
    /// Get the error type as a string for categorization
    pub fn error_type(&self) -> &'static str {
        match self {
            WatermarkError::Io(_) => "io_error",
            WatermarkError::Image(_) => "image_error",
            WatermarkError::Serialization(_) => "serialization_error",
            WatermarkError::FontUnavailable { .. } => "font_unavailable",
            WatermarkError::InvalidInput { .. } => "invalid_input",
            WatermarkError::TemplateNotFound { .. } => "template_not_found",
            WatermarkError::EmptySelection => "empty_selection",
            WatermarkError::NoSelection => "no_selection",
            WatermarkError::ImageNotFound { .. } => "image_not_found",
            WatermarkError::Persistence { .. } => "persistence_error",
            WatermarkError::ConfigError { .. } => "config_error",
            WatermarkError::LoggingError { .. } => "logging_error",
            WatermarkError::Cancelled => "cancelled",
        }
    }

    /// Check if the error stems from user input and should be shown as a message
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            WatermarkError::InvalidInput { .. }
                | WatermarkError::TemplateNotFound { .. }
                | WatermarkError::EmptySelection
                | WatermarkError::NoSelection
                | WatermarkError::ImageNotFound { .. }
        )
    }

    /// Check if the error is recoverable by skipping the affected item
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WatermarkError::Io(_)
                | WatermarkError::Image(_)
                | WatermarkError::FontUnavailable { .. }
        )
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        WatermarkError::InvalidInput {
            message: message.into(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, WatermarkError>;

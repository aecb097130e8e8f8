// ABOUTME: Error types for the hero-panel application
// ABOUTME: Provides structured error handling for loading, serving and relaying

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Failed to read file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Failed to fetch remote image: {0}")]
    FetchError(#[from] reqwest::Error),

    #[error("Invalid image source: {0}")]
    InvalidImageSource(String),

    #[error("Failed to decode image {source_ref}: {message}")]
    DecodeError { source_ref: String, message: String },

    #[error("{0}")]
    ValidationError(String),

    #[error("Path not found: {0}")]
    PathNotFoundError(PathBuf),

    #[error("No images found matching pattern: {0}")]
    NoImagesFoundError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Email sending failed: {0}")]
    DeliveryError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    UnknownError(String),
}

// Implement conversion from anyhow::Error to our PanelError
impl From<anyhow::Error> for PanelError {
    fn from(err: anyhow::Error) -> Self {
        PanelError::UnknownError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PanelError>;

// ABOUTME: Utility functions for the hero-panel application
// ABOUTME: Provides path validation and resolution helpers

use crate::errors::{PanelError, Result};
use std::path::{Path, PathBuf};

/// Validate that a file exists
pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(PanelError::PathNotFoundError(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(PanelError::ValidationError(format!(
            "Path is not a file: {:?}",
            path
        )));
    }
    Ok(())
}

/// Validate that a directory exists
pub fn validate_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(PanelError::PathNotFoundError(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(PanelError::ValidationError(format!(
            "Path is not a directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// Get the absolute path
pub fn get_absolute_path(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| {
        PanelError::ValidationError(format!("Failed to get absolute path for {:?}: {}", path, e))
    })
}

// ABOUTME: Watch module for monitoring the image directory
// ABOUTME: Rescans images on change and swaps the panel's image set

use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult};

use crate::errors::{PanelError, Result};
use crate::images::{self, ImageSet};
use crate::runtime::PanelHandle;
use crate::utils;

/// Configuration for watch mode
pub struct WatchConfig {
    /// Directory holding the panel images
    pub image_dir: PathBuf,

    /// Glob pattern the images must match
    pub pattern: String,

    /// URL prefix the images are published under
    pub url_prefix: String,

    /// Debounce time in milliseconds
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::new(),
            pattern: "*".to_string(),
            url_prefix: "/images".to_string(),
            debounce_ms: 500,
        }
    }
}

/// Scan the directory for the current image set. An empty or missing set of
/// images gives an empty `ImageSet`, which renders the fallback.
pub fn scan_image_set(config: &WatchConfig) -> Result<ImageSet> {
    match images::find_images(&config.image_dir, &config.pattern, &config.url_prefix) {
        Ok(sources) => Ok(ImageSet::new(sources)),
        Err(PanelError::NoImagesFoundError(pattern)) => {
            info!("No images match {}; showing the fallback panel", pattern);
            Ok(ImageSet::default())
        }
        Err(e) => Err(e),
    }
}

/// Watch the image directory and push every changed image set to the panel.
/// Blocks until the watcher's channel closes.
pub fn watch_images(config: &WatchConfig, panel: &PanelHandle) -> Result<()> {
    utils::validate_directory_exists(&config.image_dir)?;

    let (tx, rx) = mpsc::channel::<DebounceEventResult>();

    let mut debouncer = new_debouncer(Duration::from_millis(config.debounce_ms), None, tx)
        .map_err(|e| PanelError::WatchError(format!("Failed to create file watcher: {}", e)))?;

    let abs_watch_path = if config.image_dir.is_absolute() {
        config.image_dir.clone()
    } else {
        utils::get_absolute_path(&config.image_dir)?
    };

    debug!("Watching absolute path: {:?}", abs_watch_path);

    debouncer
        .watcher()
        .watch(&abs_watch_path, RecursiveMode::NonRecursive)
        .map_err(|e| {
            PanelError::WatchError(format!(
                "Failed to start watching directory {:?}: {}",
                abs_watch_path, e
            ))
        })?;

    info!("Watching for image changes in {:?}", config.image_dir);

    let mut current = scan_image_set(config)?;

    for result in rx {
        match result {
            Ok(events) => {
                let relevant_changes = events
                    .iter()
                    .any(|event| event.paths.iter().any(|path| is_relevant_path(path)));

                if !relevant_changes {
                    continue;
                }

                match scan_image_set(config) {
                    Ok(latest) if latest != current => {
                        info!("Image set changed: {} images", latest.len());
                        panel.set_images(latest.clone());
                        current = latest;
                    }
                    Ok(_) => debug!("Image directory changed but the image set did not"),
                    Err(e) => error!("Failed to rescan images: {}", e),
                }
            }
            Err(errors) => {
                for e in errors {
                    error!("Watch error: {:?}", e);
                }
            }
        }
    }

    Ok(())
}

/// Checks if a changed path can affect the image set
pub fn is_relevant_path(path: &Path) -> bool {
    images::is_image_path(path)
}

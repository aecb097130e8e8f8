// ABOUTME: Image source handling for the hero-panel application
// ABOUTME: Handles local and remote image references and image directory discovery

use crate::errors::{PanelError, Result};
use log::{debug, info};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use std::ops::Index;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// File extensions treated as displayable images
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Characters escaped in a published file name. Quotes and parentheses are
/// included because the name ends up inside a CSS `url('...')`.
const FILE_NAME: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode a file name for use as one URL path segment
pub fn encode_file_name(name: &str) -> String {
    utf8_percent_encode(name, FILE_NAME).to_string()
}

/// Decode a percent-encoded URL path. Returns `None` when the bytes are not UTF-8.
pub fn decode_url_path(path: &str) -> Option<String> {
    percent_decode_str(path)
        .decode_utf8()
        .ok()
        .map(|p| p.into_owned())
}

/// Represents an image that can be either local or remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSource {
    /// Where the loader reads the bytes from (URL or file path)
    pub reference: String,
    /// What the rendered page points at
    pub public_url: String,
    pub is_remote: bool,
}

impl ImageSource {
    /// Create a new ImageSource from a reference string.
    /// The reference can be either a local file path or an http(s) URL.
    pub fn new(reference: &str) -> Self {
        Self {
            reference: reference.to_string(),
            public_url: reference.to_string(),
            is_remote: is_remote_reference(reference),
        }
    }

    /// A local file published under a different URL
    pub fn local(path: &Path, public_url: &str) -> Self {
        Self {
            reference: path.to_string_lossy().to_string(),
            public_url: public_url.to_string(),
            is_remote: false,
        }
    }

    pub fn path(&self) -> Option<PathBuf> {
        if self.is_remote {
            None
        } else {
            Some(PathBuf::from(&self.reference))
        }
    }
}

fn is_remote_reference(reference: &str) -> bool {
    match Url::parse(reference) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// An ordered, immutable list of images. Clones share the same storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSet {
    sources: Arc<[ImageSource]>,
}

impl ImageSet {
    pub fn new(sources: Vec<ImageSource>) -> Self {
        Self {
            sources: sources.into(),
        }
    }

    pub fn from_references<I, S>(references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            references
                .into_iter()
                .map(|r| ImageSource::new(r.as_ref()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ImageSource> {
        self.sources.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageSource> {
        self.sources.iter()
    }
}

impl Default for ImageSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Index<usize> for ImageSet {
    type Output = ImageSource;

    fn index(&self, index: usize) -> &ImageSource {
        &self.sources[index]
    }
}

/// Check whether a path has one of the image extensions
pub fn is_image_path(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Find images matching a pattern in a directory, sorted by file name.
/// Each image is published as `<url_prefix>/<encoded file name>`.
pub fn find_images(dir: &Path, pattern: &str, url_prefix: &str) -> Result<Vec<ImageSource>> {
    if !dir.exists() || !dir.is_dir() {
        return Err(PanelError::PathNotFoundError(dir.to_path_buf()));
    }

    let glob_pattern = format!("{}/{}", dir.to_string_lossy(), pattern);
    let mut paths = Vec::new();

    for entry in (glob::glob(&glob_pattern)
        .map_err(|e| PanelError::ValidationError(format!("Invalid glob pattern: {}", e)))?)
    .flatten()
    {
        if entry.is_file() && is_image_path(&entry) {
            paths.push(entry);
        } else {
            debug!("Skipping non-image entry {:?}", entry);
        }
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if paths.is_empty() {
        return Err(PanelError::NoImagesFoundError(glob_pattern));
    }

    info!("Found {} images in {:?}", paths.len(), dir);

    let prefix = url_prefix.trim_end_matches('/');
    Ok(paths
        .iter()
        .map(|path| {
            let name = encode_file_name(&path.file_name().unwrap_or_default().to_string_lossy());
            let public_url = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", prefix, name)
            };
            ImageSource::local(path, &public_url)
        })
        .collect())
}

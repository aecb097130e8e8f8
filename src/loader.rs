// ABOUTME: Image loading for the hero-panel application
// ABOUTME: Fetches and decodes images and guards completions against stale panels

use crate::errors::{PanelError, Result};
use crate::images::ImageSource;
use log::info;
use reqwest::blocking::Client;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Loads an image until it is ready to paint.
///
/// Called from worker threads; a returned error means the image never
/// becomes visible.
pub trait ImageLoader: Send + Sync {
    fn load(&self, source: &ImageSource) -> Result<()>;
}

/// Fetches remote images over HTTP, reads local ones from disk, and
/// decodes the bytes to make sure they are a usable image.
pub struct FetchingLoader {
    client: Client,
}

impl FetchingLoader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PanelError::FetchError)?;
        Ok(Self { client })
    }

    fn fetch_remote_bytes(&self, source: &ImageSource) -> Result<Vec<u8>> {
        info!("Fetching remote image: {}", source.reference);
        let response = self
            .client
            .get(&source.reference)
            .send()
            .map_err(PanelError::FetchError)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PanelError::InvalidImageSource(format!(
                "HTTP error {} for {}",
                status, source.reference
            )));
        }

        let bytes = response.bytes().map_err(PanelError::FetchError)?;
        Ok(bytes.to_vec())
    }

    fn read_local_bytes(&self, source: &ImageSource) -> Result<Vec<u8>> {
        info!("Reading local image: {}", source.reference);
        let path = source
            .path()
            .ok_or_else(|| PanelError::InvalidImageSource(source.reference.clone()))?;
        if !path.exists() {
            return Err(PanelError::PathNotFoundError(path));
        }
        fs::read(&path).map_err(PanelError::FileReadError)
    }
}

impl ImageLoader for FetchingLoader {
    fn load(&self, source: &ImageSource) -> Result<()> {
        let bytes = if source.is_remote {
            self.fetch_remote_bytes(source)?
        } else {
            self.read_local_bytes(source)?
        };

        image::load_from_memory(&bytes).map_err(|e| PanelError::DecodeError {
            source_ref: source.reference.clone(),
            message: e.to_string(),
        })?;

        Ok(())
    }
}

/// Identifies one load request: the image index and the panel generation
/// it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    pub generation: u64,
    pub index: usize,
}

const DISPOSED: u64 = u64::MAX;

/// The generation a panel currently accepts load results for.
#[derive(Debug, Default)]
pub struct Liveness {
    generation: AtomicU64,
}

impl Liveness {
    pub fn new(generation: u64) -> Self {
        Self {
            generation: AtomicU64::new(generation),
        }
    }

    pub fn set_generation(&self, generation: u64) {
        // A disposed panel stays disposed
        let _ = self
            .generation
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == DISPOSED {
                    None
                } else {
                    Some(generation)
                }
            });
    }

    pub fn dispose(&self) {
        self.generation.store(DISPOSED, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.generation.load(Ordering::Acquire) == DISPOSED
    }

    pub fn accepts(&self, ticket: &LoadTicket) -> bool {
        self.generation.load(Ordering::Acquire) == ticket.generation
    }
}

/// A fire-and-forget load subscription. It goes stale once the panel is
/// reset or unmounted, after which its result must be dropped.
#[derive(Debug, Clone)]
pub struct LoadHandle {
    ticket: LoadTicket,
    liveness: Arc<Liveness>,
}

impl LoadHandle {
    pub fn new(ticket: LoadTicket, liveness: Arc<Liveness>) -> Self {
        Self { ticket, liveness }
    }

    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    pub fn is_stale(&self) -> bool {
        !self.liveness.accepts(&self.ticket)
    }
}

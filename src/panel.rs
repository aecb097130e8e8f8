// ABOUTME: The rotating image panel state machine
// ABOUTME: Schedules rotation and preloading, emitting effects for an executor to perform

use crate::config::{DEFAULT_INTERVAL_MS, DEFAULT_PRELOAD_DELAY_MS};
use crate::images::{ImageSet, ImageSource};
use crate::loader::LoadTicket;
use crate::state::DisplayState;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Configuration for one panel instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    /// Rotation cadence; zero or negative disables rotation
    pub auto_play_interval_ms: i64,
    /// Delay before the background preload of the remaining images
    pub preload_delay_ms: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            auto_play_interval_ms: DEFAULT_INTERVAL_MS,
            preload_delay_ms: DEFAULT_PRELOAD_DELAY_MS,
        }
    }
}

impl PanelConfig {
    pub fn rotation_interval(&self) -> Option<Duration> {
        if self.auto_play_interval_ms > 0 {
            Some(Duration::from_millis(self.auto_play_interval_ms as u64))
        } else {
            None
        }
    }

    pub fn preload_delay(&self) -> Duration {
        Duration::from_millis(self.preload_delay_ms)
    }
}

/// A request to load one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub source: ImageSource,
}

/// Side effects the panel asks its executor to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start loading an image; report back with the ticket
    Load(LoadRequest),
    /// After `delay`, deliver a background-preload signal for `generation`
    SchedulePreload { generation: u64, delay: Duration },
    /// Replace any running timer with one ticking every `interval`
    StartTimer { epoch: u64, interval: Duration },
    /// Clear the running timer
    StopTimer,
}

/// One image layer as it should be painted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub index: usize,
    pub src: String,
    pub opacity: f32,
    pub z_index: u8,
}

/// A point-in-time view of the panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSnapshot {
    pub generation: u64,
    pub current_index: Option<usize>,
    pub loaded: Vec<usize>,
    pub layers: Vec<Layer>,
    pub rotating: bool,
    pub interval_ms: i64,
    pub mounted: bool,
}

impl PanelSnapshot {
    /// The layer painted at full opacity, if any
    pub fn visible_layer(&self) -> Option<&Layer> {
        self.layers.iter().find(|l| l.opacity >= 1.0)
    }
}

/// The rotating image panel.
///
/// All mutation goes through `&mut self` from a single owner. Timers and
/// loads are not started here; each operation returns the effects an
/// executor must perform, and the executor feeds the outcomes back in
/// through `on_tick`, `on_background_preload`, `on_loaded` and
/// `on_load_failed`.
#[derive(Debug)]
pub struct RotatingPanel {
    images: ImageSet,
    config: PanelConfig,
    state: DisplayState,
    generation: u64,
    timer_epoch: u64,
    timer_running: bool,
    in_flight: BTreeSet<usize>,
    disposed: bool,
}

impl RotatingPanel {
    /// Create the panel and return the effects of mounting it
    pub fn mount(images: ImageSet, config: PanelConfig) -> (Self, Vec<Effect>) {
        let mut panel = Self {
            images: ImageSet::default(),
            config,
            state: DisplayState::new(0),
            generation: 0,
            timer_epoch: 0,
            timer_running: false,
            in_flight: BTreeSet::new(),
            disposed: false,
        };
        let effects = panel.reset(images);
        (panel, effects)
    }

    pub fn images(&self) -> &ImageSet {
        &self.images
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_mounted(&self) -> bool {
        !self.disposed
    }

    pub fn is_rotating(&self) -> bool {
        !self.disposed && self.timer_running
    }

    pub fn in_flight(&self) -> impl Iterator<Item = usize> + '_ {
        self.in_flight.iter().copied()
    }

    /// Swap the image set. An identical set keeps the current state.
    pub fn set_images(&mut self, images: ImageSet) -> Vec<Effect> {
        if self.disposed || images == self.images {
            return Vec::new();
        }
        self.reset(images)
    }

    /// Change the rotation cadence; takes effect from the next tick
    pub fn set_interval(&mut self, interval_ms: i64) -> Vec<Effect> {
        if self.disposed || interval_ms == self.config.auto_play_interval_ms {
            return Vec::new();
        }
        info!("Rotation interval changed to {} ms", interval_ms);
        self.config.auto_play_interval_ms = interval_ms;
        self.restart_timer()
    }

    /// Dispose the panel. Later events have no effect.
    pub fn unmount(&mut self) -> Vec<Effect> {
        if self.disposed {
            return Vec::new();
        }
        info!("Unmounting panel (generation {})", self.generation);
        self.disposed = true;
        self.timer_running = false;
        self.timer_epoch += 1;
        self.in_flight.clear();
        vec![Effect::StopTimer]
    }

    /// A timer tick: advance to the next image, loading it on demand
    pub fn on_tick(&mut self, epoch: u64) -> Vec<Effect> {
        if self.disposed || !self.timer_running || epoch != self.timer_epoch {
            debug!("Ignoring stale tick (epoch {})", epoch);
            return Vec::new();
        }

        let Some(next) = self.state.next_index() else {
            return Vec::new();
        };

        let effects: Vec<Effect> = self.request_load(next).into_iter().collect();
        self.state.advance();
        debug!(
            "Advanced to image {} (loaded: {})",
            next,
            self.state.is_loaded(next)
        );
        effects
    }

    /// The delayed background preload: request every image not yet loaded
    pub fn on_background_preload(&mut self, generation: u64) -> Vec<Effect> {
        if self.disposed || generation != self.generation {
            return Vec::new();
        }
        let effects: Vec<Effect> = (0..self.images.len())
            .filter_map(|index| self.request_load(index))
            .collect();
        debug!("Background preload requested {} images", effects.len());
        effects
    }

    /// A load finished. Returns true when the loaded set changed.
    pub fn on_loaded(&mut self, ticket: LoadTicket) -> bool {
        if !self.accepts(&ticket) {
            debug!("Ignoring stale load completion {:?}", ticket);
            return false;
        }
        self.in_flight.remove(&ticket.index);
        let added = self.state.mark_loaded(ticket.index);
        if added {
            debug!("Image {} loaded", ticket.index);
        }
        added
    }

    /// A load failed. The image stays blank; a later tick may ask again.
    pub fn on_load_failed(&mut self, ticket: LoadTicket) {
        if self.accepts(&ticket) {
            self.in_flight.remove(&ticket.index);
        }
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        let layers = self
            .images
            .iter()
            .enumerate()
            .map(|(index, source)| Layer {
                index,
                src: source.public_url.clone(),
                opacity: self.state.layer_opacity(index),
                z_index: self.state.layer_z_index(index),
            })
            .collect();

        PanelSnapshot {
            generation: self.generation,
            current_index: self.state.current_index(),
            loaded: self.state.loaded().collect(),
            layers,
            rotating: self.is_rotating(),
            interval_ms: self.config.auto_play_interval_ms,
            mounted: !self.disposed,
        }
    }

    fn accepts(&self, ticket: &LoadTicket) -> bool {
        !self.disposed && ticket.generation == self.generation
    }

    fn reset(&mut self, images: ImageSet) -> Vec<Effect> {
        self.generation += 1;
        self.state = DisplayState::new(images.len());
        self.images = images;
        self.in_flight.clear();
        info!(
            "Panel reset with {} images (generation {})",
            self.images.len(),
            self.generation
        );

        let mut effects = Vec::new();
        if !self.images.is_empty() {
            effects.extend(self.request_load(0));
        }
        if self.images.len() > 1 {
            effects.push(Effect::SchedulePreload {
                generation: self.generation,
                delay: self.config.preload_delay(),
            });
        }
        effects.extend(self.restart_timer());
        effects
    }

    fn restart_timer(&mut self) -> Vec<Effect> {
        self.timer_epoch += 1;
        let mut effects = vec![Effect::StopTimer];
        self.timer_running = false;

        if self.images.len() > 1 {
            if let Some(interval) = self.config.rotation_interval() {
                self.timer_running = true;
                effects.push(Effect::StartTimer {
                    epoch: self.timer_epoch,
                    interval,
                });
            }
        }
        effects
    }

    fn request_load(&mut self, index: usize) -> Option<Effect> {
        if self.state.is_loaded(index) || self.in_flight.contains(&index) {
            return None;
        }
        let source = self.images.get(index)?.clone();
        self.in_flight.insert(index);
        Some(Effect::Load(LoadRequest {
            ticket: LoadTicket {
                generation: self.generation,
                index,
            },
            source,
        }))
    }
}

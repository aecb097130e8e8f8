// ABOUTME: Synchronous executor for the rotating panel
// ABOUTME: Runs panel effects in virtual time for static renders and tests

use crate::images::ImageSet;
use crate::loader::ImageLoader;
use crate::panel::{Effect, LoadRequest, PanelConfig, PanelSnapshot, RotatingPanel};
use log::debug;
use std::collections::VecDeque;
use std::sync::Arc;

/// Drives a `RotatingPanel` without threads or wall-clock time.
///
/// Loads queue up until `complete_loads` runs them through the loader,
/// the background preload fires on `run_background_preload`, and each
/// `tick` stands in for one timer period.
pub struct Simulation {
    panel: RotatingPanel,
    loader: Arc<dyn ImageLoader>,
    pending: VecDeque<LoadRequest>,
    preload_due: Option<u64>,
    timer_epoch: Option<u64>,
}

impl Simulation {
    pub fn mount(images: ImageSet, config: PanelConfig, loader: Arc<dyn ImageLoader>) -> Self {
        let (panel, effects) = RotatingPanel::mount(images, config);
        let mut sim = Self {
            panel,
            loader,
            pending: VecDeque::new(),
            preload_due: None,
            timer_epoch: None,
        };
        sim.apply(effects);
        sim
    }

    pub fn panel(&self) -> &RotatingPanel {
        &self.panel
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.panel.snapshot()
    }

    pub fn has_timer(&self) -> bool {
        self.timer_epoch.is_some()
    }

    /// Indices with a load requested but not yet completed, in request order
    pub fn pending_loads(&self) -> Vec<usize> {
        self.pending.iter().map(|r| r.ticket.index).collect()
    }

    /// Fire one timer period. Returns false when no timer is armed.
    pub fn tick(&mut self) -> bool {
        let Some(epoch) = self.timer_epoch else {
            return false;
        };
        let effects = self.panel.on_tick(epoch);
        self.apply(effects);
        true
    }

    /// Fire the delayed background preload if one is scheduled
    pub fn run_background_preload(&mut self) {
        if let Some(generation) = self.preload_due.take() {
            let effects = self.panel.on_background_preload(generation);
            self.apply(effects);
        }
    }

    /// Run every queued load through the loader and report the outcomes
    pub fn complete_loads(&mut self) {
        while let Some(request) = self.pending.pop_front() {
            match self.loader.load(&request.source) {
                Ok(()) => {
                    self.panel.on_loaded(request.ticket);
                }
                Err(e) => {
                    debug!("Load of image {} failed: {}", request.ticket.index, e);
                    self.panel.on_load_failed(request.ticket);
                }
            }
        }
    }

    /// Remove a queued load without completing it, as if it never returned
    pub fn drop_load(&mut self, index: usize) -> Option<LoadRequest> {
        let position = self.pending.iter().position(|r| r.ticket.index == index)?;
        self.pending.remove(position)
    }

    /// Preload and complete everything outstanding
    pub fn settle(&mut self) {
        self.run_background_preload();
        self.complete_loads();
    }

    /// Advance `ticks` timer periods, settling loads after each one
    pub fn run_ticks(&mut self, ticks: usize) {
        for _ in 0..ticks {
            if !self.tick() {
                break;
            }
            self.complete_loads();
        }
    }

    pub fn set_images(&mut self, images: ImageSet) {
        let effects = self.panel.set_images(images);
        self.apply(effects);
    }

    pub fn set_interval(&mut self, interval_ms: i64) {
        let effects = self.panel.set_interval(interval_ms);
        self.apply(effects);
    }

    pub fn unmount(&mut self) {
        let effects = self.panel.unmount();
        self.apply(effects);
    }

    /// Deliver a completion directly, as a late callback would
    pub fn deliver_loaded(&mut self, request: &LoadRequest) -> bool {
        self.panel.on_loaded(request.ticket)
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Load(request) => self.pending.push_back(request),
                Effect::SchedulePreload { generation, .. } => self.preload_due = Some(generation),
                Effect::StartTimer { epoch, .. } => self.timer_epoch = Some(epoch),
                Effect::StopTimer => self.timer_epoch = None,
            }
        }
    }
}

// ABOUTME: Threaded runtime for the rotating panel
// ABOUTME: Owns the panel on an event-loop thread fed by timer and load worker threads

use crate::images::ImageSet;
use crate::loader::{ImageLoader, LoadHandle, LoadTicket, Liveness};
use crate::panel::{Effect, LoadRequest, PanelConfig, PanelSnapshot, RotatingPanel};
use log::{debug, error, info};
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Messages funnelled into the panel's event loop
#[derive(Debug)]
pub enum PanelEvent {
    Tick { epoch: u64 },
    BackgroundPreload { generation: u64 },
    Loaded(LoadTicket),
    LoadFailed(LoadTicket),
    SetImages(ImageSet),
    SetInterval(i64),
    Unmount,
}

/// Read-only access to the latest published snapshot
#[derive(Clone)]
pub struct PanelReader {
    snapshot: Arc<RwLock<PanelSnapshot>>,
}

impl PanelReader {
    pub fn new(snapshot: PanelSnapshot) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.snapshot.read().clone()
    }

    fn publish(&self, snapshot: PanelSnapshot) {
        *self.snapshot.write() = snapshot;
    }
}

/// A mounted panel running on its own event-loop thread.
///
/// Dropping the handle unmounts the panel.
pub struct PanelHandle {
    events: Sender<PanelEvent>,
    reader: PanelReader,
    thread: Option<JoinHandle<()>>,
}

impl PanelHandle {
    pub fn mount(images: ImageSet, config: PanelConfig, loader: Arc<dyn ImageLoader>) -> Self {
        let (tx, rx) = mpsc::channel();
        let (panel, effects) = RotatingPanel::mount(images, config);
        let reader = PanelReader::new(panel.snapshot());
        let liveness = Arc::new(Liveness::new(panel.generation()));

        let event_loop = EventLoop {
            panel,
            events: tx.clone(),
            reader: reader.clone(),
            loader,
            liveness,
            ticker: None,
        };

        let thread = thread::Builder::new()
            .name("hero-panel".to_string())
            .spawn(move || event_loop.run(rx, effects))
            .ok();

        if thread.is_none() {
            error!("Failed to spawn the panel event loop");
        }

        Self {
            events: tx,
            reader,
            thread,
        }
    }

    pub fn reader(&self) -> PanelReader {
        self.reader.clone()
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.reader.snapshot()
    }

    pub fn set_images(&self, images: ImageSet) {
        let _ = self.events.send(PanelEvent::SetImages(images));
    }

    pub fn set_interval(&self, interval_ms: i64) {
        let _ = self.events.send(PanelEvent::SetInterval(interval_ms));
    }

    /// Unmount and wait for the event loop to finish
    pub fn unmount(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.events.send(PanelEvent::Unmount);
            if thread.join().is_err() {
                error!("Panel event loop panicked");
            }
        }
    }
}

impl Drop for PanelHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct EventLoop {
    panel: RotatingPanel,
    events: Sender<PanelEvent>,
    reader: PanelReader,
    loader: Arc<dyn ImageLoader>,
    liveness: Arc<Liveness>,
    ticker: Option<Ticker>,
}

impl EventLoop {
    fn run(mut self, rx: Receiver<PanelEvent>, initial: Vec<Effect>) {
        self.execute(initial);

        for event in rx.iter() {
            let unmounting = matches!(event, PanelEvent::Unmount);
            let effects = match event {
                PanelEvent::Tick { epoch } => self.panel.on_tick(epoch),
                PanelEvent::BackgroundPreload { generation } => {
                    self.panel.on_background_preload(generation)
                }
                PanelEvent::Loaded(ticket) => {
                    self.panel.on_loaded(ticket);
                    Vec::new()
                }
                PanelEvent::LoadFailed(ticket) => {
                    self.panel.on_load_failed(ticket);
                    Vec::new()
                }
                PanelEvent::SetImages(images) => self.panel.set_images(images),
                PanelEvent::SetInterval(interval_ms) => self.panel.set_interval(interval_ms),
                PanelEvent::Unmount => self.panel.unmount(),
            };

            if unmounting {
                self.liveness.dispose();
            } else {
                self.liveness.set_generation(self.panel.generation());
            }

            self.execute(effects);
            self.reader.publish(self.panel.snapshot());

            if unmounting {
                break;
            }
        }

        // Stop ticking even if every sender went away without an unmount
        self.ticker = None;
        debug!("Panel event loop finished");
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Load(request) => self.spawn_load(request),
                Effect::SchedulePreload { generation, delay } => {
                    let events = self.events.clone();
                    thread::spawn(move || {
                        thread::sleep(delay);
                        let _ = events.send(PanelEvent::BackgroundPreload { generation });
                    });
                }
                Effect::StartTimer { epoch, interval } => {
                    self.ticker = Some(Ticker::start(epoch, interval, self.events.clone()));
                }
                Effect::StopTimer => {
                    self.ticker = None;
                }
            }
        }
    }

    fn spawn_load(&self, request: LoadRequest) {
        let handle = LoadHandle::new(request.ticket, self.liveness.clone());
        let loader = self.loader.clone();
        let events = self.events.clone();

        thread::spawn(move || {
            let outcome = loader.load(&request.source);
            if handle.is_stale() {
                debug!("Dropping stale load result for image {}", request.ticket.index);
                return;
            }
            let event = match outcome {
                Ok(()) => PanelEvent::Loaded(handle.ticket()),
                Err(e) => {
                    debug!("Failed to load image {}: {}", request.source.reference, e);
                    PanelEvent::LoadFailed(handle.ticket())
                }
            };
            // The event loop may already be gone
            let _ = events.send(event);
        });
    }
}

/// A repeating timer thread. Dropping it stops the thread.
struct Ticker {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Ticker {
    fn start(epoch: u64, interval: Duration, events: Sender<PanelEvent>) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        info!("Starting rotation timer every {:?}", interval);

        let thread = thread::spawn(move || {
            let mut deadline = Instant::now() + interval;
            loop {
                let wait = deadline.saturating_duration_since(Instant::now());
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {
                        if events.send(PanelEvent::Tick { epoch }).is_err() {
                            break;
                        }
                        deadline += interval;
                    }
                    // Stop requested or the ticker was dropped
                    _ => break,
                }
            }
        });

        Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

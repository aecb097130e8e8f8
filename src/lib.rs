// ABOUTME: Library module for the hero-panel program.
// ABOUTME: Contains the rotating panel, its runtimes, rendering, serving and the contact relay.

// Reexport modules
pub mod config;
pub mod contact;
pub mod errors;
pub mod images;
pub mod loader;
pub mod panel;
pub mod render;
pub mod runtime;
pub mod server;
pub mod simulate;
pub mod state;
pub mod utils;
pub mod watch;

// Reexport common types and functions
pub use config::{Config, ContactConfig};
pub use contact::{handle_submission, ContactSubmission, NotificationSink};
pub use errors::{PanelError, Result};
pub use images::{find_images, ImageSet, ImageSource};
pub use loader::{FetchingLoader, ImageLoader, LoadTicket};
pub use panel::{Effect, PanelConfig, PanelSnapshot, RotatingPanel};
pub use render::{generate_page, render_panel, write_html_to_file, RenderOptions};
pub use runtime::{PanelHandle, PanelReader};
pub use simulate::Simulation;
pub use state::DisplayState;
pub use watch::{watch_images, WatchConfig};

#[cfg(test)]
mod tests;

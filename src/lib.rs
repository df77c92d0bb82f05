//! ndiscope — NDI source monitor
//!
//! Discovers NDI sources on the local network, grabs single frames, and plays a
//! source back with video and audio kept in step by the runtime's frame-sync.
//!
//! # Features
//!
//! - **Discovery**: list sources announced on the network
//! - **Snapshot**: one RGBA frame from a source
//! - **Playback**: fixed-cadence video plus audio on a cpal output device
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ndiscope::{Config, LogDisplay, Monitor, NdiLibrary};
//!
//! #[tokio::main]
//! async fn main() -> ndiscope::Result<()> {
//!     let runtime = Arc::new(NdiLibrary::locate(None)?);
//!     let monitor = Monitor::new(runtime, Arc::new(LogDisplay::default()), Config::default());
//!
//!     let sources = monitor.discover().await;
//!     let handle = monitor.start_playback(sources.first())?;
//!     handle.wait().await;
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod ndi;
pub mod output;
pub mod playback;
pub mod processing;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use capture::{capture_one_frame, discover_sources};
pub use config::{AudioConfig, Config, PlaybackConfig, SnapshotConfig};
pub use error::{Error, Result};
pub use ndi::{NdiLibrary, NdiRuntime};
pub use output::{ChannelDisplay, DisplaySink, LogDisplay};
pub use playback::PlaybackEngine;
pub use session::{Monitor, PlaybackHandle};
pub use types::{Image, PlaybackStats, Quality, Resolution, Source};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

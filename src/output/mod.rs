//! Display output module
//!
//! Playback hands each scaled RGBA image to a [`DisplaySink`]. Sinks are
//! fire-and-forget and must never block the cadence loop.
//!
//! Provided sinks:
//! - [`ChannelDisplay`] forwards images to a UI thread over a bounded channel
//! - [`LogDisplay`] logs frame arrivals (CLI)

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::types::Image;

/// Receiver of ready-to-paint images
pub trait DisplaySink: Send + Sync {
    /// Present one image; must return promptly
    fn present(&self, image: Image);
}

/// Forwards images over a bounded channel, dropping them when the receiver lags
pub struct ChannelDisplay {
    tx: Sender<Image>,
    dropped: AtomicU64,
}

impl ChannelDisplay {
    /// Create a display and the receiving end for the UI
    pub fn new(capacity: usize) -> (Self, Receiver<Image>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Images dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl DisplaySink for ChannelDisplay {
    fn present(&self, image: Image) {
        match self.tx.try_send(image) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::trace!("Display receiver gone");
            }
        }
    }
}

/// Logs frame arrivals, one line every `every` frames
pub struct LogDisplay {
    every: u64,
    frames: AtomicU64,
}

impl LogDisplay {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            frames: AtomicU64::new(0),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl Default for LogDisplay {
    fn default() -> Self {
        Self::new(30)
    }
}

impl DisplaySink for LogDisplay {
    fn present(&self, image: Image) {
        let n = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if n == 1 || n % self.every == 0 {
            tracing::info!("Frame {}: {}x{}", n, image.width, image.height);
        }
    }
}

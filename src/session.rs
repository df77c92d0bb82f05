//! Monitor controller
//!
//! Dispatches discovery and snapshots to tokio's blocking pool and playback to a
//! dedicated thread, and checks the preconditions callers must not violate: a source
//! must be selected, only one playback runs at a time, and the output device cannot
//! change while playing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;

use crate::audio::OutputDevice;
use crate::capture;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ndi::NdiRuntime;
use crate::output::DisplaySink;
use crate::playback::PlaybackEngine;
use crate::types::{Image, PlaybackStats, Resolution, Source};

/// Completion of a playback started by [`Monitor::start_playback`]
pub struct PlaybackHandle {
    done: oneshot::Receiver<bool>,
}

impl PlaybackHandle {
    /// Wait for the session to end; `false` if it failed to start or panicked
    pub async fn wait(self) -> bool {
        match self.done.await {
            Ok(ok) => ok,
            Err(_) => {
                tracing::error!("Playback thread ended without a result");
                false
            }
        }
    }
}

/// Clears the playing flag when the playback thread ends, including by unwinding
struct PlayingReset(Arc<AtomicBool>);

impl Drop for PlayingReset {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Controller for discovery, snapshots and playback against one NDI runtime
pub struct Monitor {
    runtime: Arc<dyn NdiRuntime>,
    config: Config,
    display: Arc<dyn DisplaySink>,
    device: RwLock<Option<Arc<dyn OutputDevice>>>,
    stop: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    stats: Arc<Mutex<PlaybackStats>>,
}

impl Monitor {
    pub fn new(runtime: Arc<dyn NdiRuntime>, display: Arc<dyn DisplaySink>, config: Config) -> Self {
        Self {
            runtime,
            config,
            display,
            device: RwLock::new(None),
            stop: Arc::new(AtomicBool::new(false)),
            playing: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(Mutex::new(PlaybackStats::default())),
        }
    }

    pub fn with_output_device(self, device: Arc<dyn OutputDevice>) -> Self {
        *self.device.write() = Some(device);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Discover sources on the blocking pool
    pub async fn discover(&self) -> Vec<Source> {
        let runtime = self.runtime.clone();
        let timeout = self.config.discovery.timeout();

        tracing::info!("Discovering sources for {:?}", timeout);
        match tokio::task::spawn_blocking(move || {
            capture::discover_sources(runtime.as_ref(), timeout)
        })
        .await
        {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!("Discovery task failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Capture one frame from `source`, scaled to `region` when given
    pub async fn snapshot(
        &self,
        source: Option<&Source>,
        region: Option<Resolution>,
    ) -> Result<Option<Image>> {
        let source = source.cloned().ok_or(Error::NoSourceSelected)?;
        let runtime = self.runtime.clone();
        let config = self.config.snapshot.clone();

        let image = tokio::task::spawn_blocking(move || {
            capture::capture_one_frame(runtime.as_ref(), &source, &config)
        })
        .await
        .map_err(|e| Error::Internal(format!("Snapshot task failed: {}", e)))?;

        let Some(image) = image else {
            return Ok(None);
        };

        match region {
            Some(region) => {
                let scaled = image.scaled_to_fit(region)?;
                tracing::info!(
                    "Snapshot {} scaled to {}",
                    image.resolution(),
                    scaled.resolution()
                );
                Ok(Some(scaled))
            }
            None => Ok(Some(image)),
        }
    }

    /// Start playing `source` on a dedicated thread
    pub fn start_playback(&self, source: Option<&Source>) -> Result<PlaybackHandle> {
        let source = source.cloned().ok_or(Error::NoSourceSelected)?;

        if self
            .playing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::PlaybackActive);
        }
        // Cleared here rather than on the playback thread so an early stop() sticks
        self.stop.store(false, Ordering::SeqCst);

        let mut engine = PlaybackEngine::new(self.runtime.clone(), self.display.clone())
            .with_stop_flag(self.stop.clone())
            .with_stats(self.stats.clone());
        if let Some(device) = self.device.read().clone() {
            engine = engine.with_output_device(device);
        }

        let config = self.config.playback.clone();
        let playing = self.playing.clone();
        let (tx, rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name("ndiscope-playback".into())
            .spawn(move || {
                let reset = PlayingReset(playing);
                let ok = engine.play_until_stopped(&source, &config);
                drop(reset);
                let _ = tx.send(ok);
            });

        match thread {
            Ok(_) => Ok(PlaybackHandle { done: rx }),
            Err(e) => {
                self.playing.store(false, Ordering::SeqCst);
                Err(Error::Internal(format!("Failed to spawn playback thread: {}", e)))
            }
        }
    }

    /// Request the running playback to stop
    pub fn stop(&self) -> Result<()> {
        if !self.is_playing() {
            return Err(Error::PlaybackNotRunning);
        }
        tracing::info!("Playback stop requested");
        self.stop.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Switch audio output; rejected while playing
    pub fn select_output_device(&self, device: Arc<dyn OutputDevice>) -> Result<()> {
        if self.is_playing() {
            return Err(Error::PlaybackActive);
        }
        tracing::info!("Audio output device: {}", device.name());
        *self.device.write() = Some(device);
        Ok(())
    }

    pub fn output_device_name(&self) -> Option<String> {
        self.device.read().as_ref().map(|d| d.name())
    }

    /// Statistics of the current or last playback
    pub fn stats(&self) -> PlaybackStats {
        self.stats.lock().clone()
    }
}

//! Synchronized playback engine
//!
//! Opens a receive session plus a frame-sync on it and runs a fixed-cadence loop:
//! every `1 / fps` it pulls the current video frame, scales it into the display region
//! and hands it to the [`DisplaySink`], then pulls the audio that accumulated since the
//! previous tick into the [`AudioPipeline`]. Video and audio come from the same
//! frame-sync, so they stay close in wall-clock time without being frame-accurate.
//!
//! The loop spins between ticks (`std::hint::spin_loop`) and only checks the stop flag,
//! so it occupies one core for the whole session. Frame-sync captures return
//! immediately, which bounds the exit latency to one interval plus one tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::audio::{AudioPipeline, OutputDevice};
use crate::config::PlaybackConfig;
use crate::ndi::{
    DeleteGuard, FrameFormatType, FrameSyncInstance, NdiRuntime, RecvBandwidth, RecvSettings,
    VideoFrameV2,
};
use crate::output::DisplaySink;
use crate::processing;
use crate::types::{PlaybackStats, Source};

/// Playback engine for one source at a time
pub struct PlaybackEngine {
    runtime: Arc<dyn NdiRuntime>,
    display: Arc<dyn DisplaySink>,
    device: Option<Arc<dyn OutputDevice>>,
    stop: Arc<AtomicBool>,
    /// Reset the stop flag at session start; off for a flag handed in by a controller
    owns_stop: bool,
    stats: Arc<Mutex<PlaybackStats>>,
}

impl PlaybackEngine {
    pub fn new(runtime: Arc<dyn NdiRuntime>, display: Arc<dyn DisplaySink>) -> Self {
        Self {
            runtime,
            display,
            device: None,
            stop: Arc::new(AtomicBool::new(false)),
            owns_stop: true,
            stats: Arc::new(Mutex::new(PlaybackStats::default())),
        }
    }

    /// Audio goes to `device`; without one, audio capture is skipped
    pub fn with_output_device(mut self, device: Arc<dyn OutputDevice>) -> Self {
        self.device = Some(device);
        self
    }

    /// Share an existing stop flag.
    ///
    /// The engine never clears a shared flag: its owner clears it before starting a
    /// session, so a stop requested while the session is still opening is honored.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self.owns_stop = false;
        self
    }

    /// Publish statistics into an existing slot
    pub fn with_stats(mut self, stats: Arc<Mutex<PlaybackStats>>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Ask a running session to end after its current tick
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stats(&self) -> PlaybackStats {
        self.stats.lock().clone()
    }

    /// Play `source` until the stop flag is set.
    ///
    /// Returns `false` when the session could not be set up, `true` after a stopped
    /// session has released everything it opened.
    pub fn play_until_stopped(&self, source: &Source, config: &PlaybackConfig) -> bool {
        if config.fps == 0 {
            tracing::error!("Playback rate must be greater than 0 fps");
            return false;
        }
        let interval_us = config.framerate().frame_duration_us();
        let runtime = self.runtime.as_ref();

        let bandwidth = RecvBandwidth::from(config.quality);
        let settings = RecvSettings::rgba(source.name.clone(), bandwidth);
        let recv = DeleteGuard::new(|h| runtime.recv_destroy(h), runtime.recv_create(&settings));
        if recv.is_null() {
            tracing::error!("Failed to create NDI receiver for {}", source);
            return false;
        }

        // Declared after `recv`, so dropped before it
        let framesync = DeleteGuard::new(
            |h| runtime.framesync_destroy(h),
            runtime.framesync_create(recv.get()),
        );
        if framesync.is_null() {
            tracing::error!("Failed to create NDI frame-sync for {}", source);
            return false;
        }

        let mut audio = match (&self.device, config.capture_audio) {
            (Some(device), true) => Some(AudioPipeline::new(device.clone(), config.verbose)),
            (None, true) => {
                tracing::warn!("No audio output device, playing video only");
                None
            }
            _ => None,
        };

        tracing::info!(
            "Playback started: {} at {} ({:?} quality, audio {})",
            source,
            config.framerate(),
            config.quality,
            if audio.is_some() { "on" } else { "off" }
        );

        let mut stats = PlaybackStats::default();
        *self.stats.lock() = stats.clone();
        if self.owns_stop {
            self.stop.store(false, Ordering::SeqCst);
        }
        let mut last_sample = Instant::now();

        while !self.stop.load(Ordering::SeqCst) {
            let elapsed_us = last_sample.elapsed().as_micros() as u64;
            if elapsed_us < interval_us {
                std::hint::spin_loop();
                continue;
            }
            last_sample = Instant::now();
            stats.ticks += 1;

            self.pump_video(framesync.get(), config, &mut stats);

            if let Some(audio) = audio.as_mut() {
                audio.capture_audio_tick(runtime, framesync.get(), elapsed_us);
                let counters = audio.counters();
                stats.audio_bytes_written = counters.bytes_written;
                stats.audio_bytes_dropped = counters.bytes_dropped;
                stats.format_derivations = counters.format_derivations;
            }

            if config.verbose {
                tracing::debug!("Tick {}: {} us since last", stats.ticks, elapsed_us);
            }
            *self.stats.lock() = stats.clone();
        }

        // The sink belongs to this thread and goes before the sessions
        if let Some(mut audio) = audio.take() {
            audio.shutdown();
        }

        tracing::info!(
            "Playback stopped: {} ticks, {} frames displayed, {} empty",
            stats.ticks,
            stats.frames_displayed,
            stats.empty_frames
        );
        true
    }

    fn pump_video(
        &self,
        framesync: FrameSyncInstance,
        config: &PlaybackConfig,
        stats: &mut PlaybackStats,
    ) {
        let runtime = self.runtime.as_ref();
        let mut frame = VideoFrameV2::default();
        runtime.framesync_capture_video(framesync, &mut frame, FrameFormatType::Progressive);

        if frame.has_picture() {
            // SAFETY: captured above, freed below
            match unsafe { processing::process_frame(&frame, Some(config.display)) } {
                Ok(Some(image)) => {
                    if config.verbose {
                        tracing::debug!(
                            "Video {}x{} -> {}x{}",
                            frame.xres,
                            frame.yres,
                            image.width,
                            image.height
                        );
                    }
                    self.display.present(image);
                    stats.frames_displayed += 1;
                }
                Ok(None) => stats.empty_frames += 1,
                Err(e) => tracing::warn!("Dropping video frame: {}", e),
            }
        } else {
            stats.empty_frames += 1;
        }

        runtime.framesync_free_video(framesync, &frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;
    use crate::testing::{
        bgra_picture, Counters, MockDevice, MockPicture, MockRuntime, RecordingDisplay,
    };
    use crate::types::{Quality, Resolution};

    struct Rig {
        runtime: Arc<MockRuntime>,
        display: Arc<RecordingDisplay>,
        device: Arc<MockDevice>,
        engine: PlaybackEngine,
    }

    fn rig(runtime: MockRuntime) -> Rig {
        let runtime = Arc::new(runtime);
        let display = Arc::new(RecordingDisplay::default());
        let device = Arc::new(MockDevice::new(AudioFormat::f32(48_000, 2), 1 << 20));
        let engine = PlaybackEngine::new(runtime.clone(), display.clone())
            .with_output_device(device.clone());
        Rig {
            runtime,
            display,
            device,
            engine,
        }
    }

    fn source() -> Source {
        Source::new("STUDIO (Cam 1)")
    }

    #[test]
    fn test_single_tick_then_stop() {
        let rig = rig(
            MockRuntime::new()
                .with_picture(bgra_picture())
                .with_stream_audio(48_000, 2),
        );
        rig.runtime.stop_after(rig.engine.stop_flag(), 1);

        let started = Instant::now();
        assert!(rig.engine.play_until_stopped(&source(), &PlaybackConfig::default()));

        // One tick needs at least one 30 fps interval
        assert!(started.elapsed().as_micros() >= 33_333);
        let stats = rig.engine.stats();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.frames_displayed, 1);
        assert_eq!(stats.format_derivations, 1);
        assert_eq!(rig.display.count(), 1);
        assert_eq!(Counters::get(&rig.runtime.counters.video_frees), 1);
        assert_eq!(Counters::get(&rig.runtime.counters.audio_frees), 1);

        // Sink and both sessions released before returning
        assert_eq!(rig.device.opened.lock().len(), 1);
        assert_eq!(rig.device.dropped(), 1);
        assert_eq!(Counters::get(&rig.runtime.counters.framesync_destroyed), 1);
        assert_eq!(Counters::get(&rig.runtime.counters.recv_destroyed), 1);
    }

    #[test]
    fn test_frames_scaled_into_display_region() {
        let rig = rig(MockRuntime::new().with_picture(MockPicture::solid(
            64,
            36,
            crate::ndi::fourcc::BGRX,
            [1, 2, 3, 0],
        )));
        rig.runtime.stop_after(rig.engine.stop_flag(), 2);

        let config = PlaybackConfig::default()
            .with_fps(500)
            .with_audio(false)
            .with_display(32, 32);
        assert!(rig.engine.play_until_stopped(&source(), &config));

        let frames = rig.display.frames.lock();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].resolution(), Resolution::new(32, 18));
        assert_eq!(frames[0].pixel(0, 0), Some([3, 2, 1, 255]));
    }

    #[test]
    fn test_empty_frames_not_displayed_but_freed() {
        let rig = rig(MockRuntime::new());
        rig.runtime.stop_after(rig.engine.stop_flag(), 3);

        let config = PlaybackConfig::default().with_fps(500).with_audio(false);
        assert!(rig.engine.play_until_stopped(&source(), &config));

        assert_eq!(rig.display.count(), 0);
        assert_eq!(rig.engine.stats().empty_frames, 3);
        assert_eq!(Counters::get(&rig.runtime.counters.video_captures), 3);
        assert_eq!(Counters::get(&rig.runtime.counters.video_frees), 3);
    }

    #[test]
    fn test_audio_disabled_skips_audio() {
        let rig = rig(
            MockRuntime::new()
                .with_picture(bgra_picture())
                .with_stream_audio(48_000, 2),
        );
        rig.runtime.stop_after(rig.engine.stop_flag(), 2);

        let config = PlaybackConfig::default().with_fps(500).with_audio(false);
        assert!(rig.engine.play_until_stopped(&source(), &config));

        assert_eq!(Counters::get(&rig.runtime.counters.audio_captures), 0);
        assert!(rig.device.opened.lock().is_empty());
    }

    #[test]
    fn test_audio_flows_after_warm_up() {
        let rig = rig(
            MockRuntime::new()
                .with_picture(bgra_picture())
                .with_stream_audio(48_000, 2),
        );
        rig.runtime.stop_after(rig.engine.stop_flag(), 4);

        let config = PlaybackConfig::default().with_fps(200);
        assert!(rig.engine.play_until_stopped(&source(), &config));

        // Query, cold start, then two ticks of real audio
        let requests = rig.runtime.audio_requests.lock().clone();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0], (0, 0, 0));
        assert!(requests[1..].iter().all(|r| r.0 == 48_000 && r.1 == 2 && r.2 > 0));
        assert!(rig.engine.stats().audio_bytes_written > 0);
        assert_eq!(rig.device.dropped(), 1);
    }

    #[test]
    fn test_zero_fps_rejected() {
        let rig = rig(MockRuntime::new());
        let config = PlaybackConfig::default().with_fps(0);

        assert!(!rig.engine.play_until_stopped(&source(), &config));
        assert_eq!(Counters::get(&rig.runtime.counters.recv_created), 0);
    }

    #[test]
    fn test_receiver_failure() {
        let rig = rig(MockRuntime::new());
        rig.runtime.fail_recv.store(true, Ordering::SeqCst);

        assert!(!rig.engine.play_until_stopped(&source(), &PlaybackConfig::default()));
        assert_eq!(Counters::get(&rig.runtime.counters.framesync_created), 0);
    }

    #[test]
    fn test_framesync_failure_releases_receiver() {
        let rig = rig(MockRuntime::new());
        rig.runtime.fail_framesync.store(true, Ordering::SeqCst);

        assert!(!rig.engine.play_until_stopped(&source(), &PlaybackConfig::default()));
        assert_eq!(Counters::get(&rig.runtime.counters.recv_destroyed), 1);
        assert_eq!(Counters::get(&rig.runtime.counters.framesync_destroyed), 0);
    }

    #[test]
    fn test_quality_selects_bandwidth() {
        let rig = rig(MockRuntime::new());
        rig.runtime.stop_after(rig.engine.stop_flag(), 1);

        let config = PlaybackConfig::default()
            .with_fps(500)
            .with_audio(false)
            .with_quality(Quality::Low);
        assert!(rig.engine.play_until_stopped(&source(), &config));

        let settings = rig.runtime.recv_settings.lock()[0].clone();
        assert_eq!(settings.bandwidth, RecvBandwidth::Lowest);
        assert_eq!(settings.source_name, "STUDIO (Cam 1)");
    }

    #[test]
    fn test_shared_flag_set_before_start_is_honored() {
        let rig = rig(MockRuntime::new().with_picture(bgra_picture()));
        let stop = Arc::new(AtomicBool::new(true));
        let engine = rig.engine.with_stop_flag(stop.clone());

        let config = PlaybackConfig::default().with_fps(500).with_audio(false);
        assert!(engine.play_until_stopped(&source(), &config));

        assert_eq!(engine.stats().ticks, 0);
        assert!(stop.load(Ordering::SeqCst));
        assert_eq!(Counters::get(&rig.runtime.counters.framesync_destroyed), 1);
        assert_eq!(Counters::get(&rig.runtime.counters.recv_destroyed), 1);
    }

    #[test]
    fn test_own_flag_reset_at_start() {
        let rig = rig(MockRuntime::new());
        rig.engine.stop();
        rig.runtime.stop_after(rig.engine.stop_flag(), 1);

        let config = PlaybackConfig::default().with_fps(500).with_audio(false);
        assert!(rig.engine.play_until_stopped(&source(), &config));
        assert_eq!(rig.engine.stats().ticks, 1);
    }

    #[test]
    fn test_stop_from_another_thread() {
        let rig = rig(MockRuntime::new().with_picture(bgra_picture()));
        let engine = Arc::new(rig.engine);

        let worker = {
            let engine = engine.clone();
            std::thread::spawn(move || {
                let config = PlaybackConfig::default().with_fps(100).with_audio(false);
                engine.play_until_stopped(&source(), &config)
            })
        };

        while engine.stats().ticks < 2 {
            std::thread::yield_now();
        }
        engine.stop();

        assert!(worker.join().unwrap());
        assert_eq!(Counters::get(&rig.runtime.counters.recv_destroyed), 1);
    }
}

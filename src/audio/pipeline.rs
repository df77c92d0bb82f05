//! Per-session audio path: format negotiation, planar to interleaved conversion and
//! backpressure-aware writes into the output sink.

use std::sync::Arc;

use super::output::{AudioSink, OutputDevice, SinkState, SinkWriter};
use super::types::AudioFormat;
use crate::ndi::{AudioFrameV2, FrameSyncInstance, InterleavedDest, NdiRuntime};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Audio counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioCounters {
    pub bytes_written: u64,
    pub bytes_dropped: u64,
    pub format_derivations: u64,
}

/// Samples per channel covering `micros` at `sample_rate`, rounded to nearest
pub fn samples_for_elapsed(sample_rate: u32, micros: u64) -> usize {
    ((sample_rate as u128 * micros as u128 + 500_000) / 1_000_000) as usize
}

/// Audio state owned by one playback session.
///
/// Holds the output sink, so it must stay on the thread that created it.
pub struct AudioPipeline {
    device: Arc<dyn OutputDevice>,
    format: Option<AudioFormat>,
    sink: Option<Box<dyn AudioSink>>,
    writer: Option<SinkWriter>,
    scratch: Vec<f32>,
    counters: AudioCounters,
    verbose: bool,
}

impl AudioPipeline {
    pub fn new(device: Arc<dyn OutputDevice>, verbose: bool) -> Self {
        Self {
            device,
            format: None,
            sink: None,
            writer: None,
            scratch: Vec::new(),
            counters: AudioCounters::default(),
            verbose,
        }
    }

    /// Format established for this session, if any
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    pub fn counters(&self) -> AudioCounters {
        self.counters
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub fn has_writer(&self) -> bool {
        self.writer.is_some()
    }

    /// Interleaved floats the scratch buffer can hold
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.len()
    }

    /// One audio step of the playback cadence
    pub fn capture_audio_tick(
        &mut self,
        runtime: &dyn NdiRuntime,
        framesync: FrameSyncInstance,
        micros_since_last_capture: u64,
    ) {
        let mut frame = AudioFrameV2::default();

        match self.format {
            None => {
                // Zero rate/channels/samples reads the stream format without pulling audio
                runtime.framesync_capture_audio(framesync, &mut frame, 0, 0, 0);
                self.destroy_sink();
                self.derive_format(&frame);
            }
            Some(format) => {
                if let Some(sink) = self.sink.as_mut() {
                    if sink.state() == SinkState::Stopped {
                        match sink.start() {
                            Ok(writer) => {
                                tracing::info!(
                                    "Audio output started on {} ({})",
                                    self.device.name(),
                                    sink.format()
                                );
                                self.writer = Some(writer);
                            }
                            Err(e) => tracing::error!("Failed to start audio output: {}", e),
                        }
                    } else {
                        let samples =
                            samples_for_elapsed(format.sample_rate, micros_since_last_capture);
                        runtime.framesync_capture_audio(
                            framesync,
                            &mut frame,
                            format.sample_rate as i32,
                            format.channels as i32,
                            samples as i32,
                        );
                        self.convert_and_write(runtime, &frame, samples);
                    }
                }
            }
        }

        runtime.framesync_free_audio(framesync, &frame);
    }

    /// Interleave `frame` into the scratch buffer and write what the sink can take
    pub fn convert_and_write(
        &mut self,
        runtime: &dyn NdiRuntime,
        frame: &AudioFrameV2,
        samples_per_channel: usize,
    ) {
        let Some(format) = self.format else {
            return;
        };
        let channels = format.channels as usize;
        let needed = samples_per_channel * channels;

        if self.scratch.len() < needed {
            self.scratch.resize(needed, 0.0);
        }

        if needed > 0 {
            let mut dest = InterleavedDest {
                sample_rate: format.sample_rate as i32,
                channels: format.channels as i32,
                samples: samples_per_channel as i32,
                data: &mut self.scratch[..needed],
            };
            runtime.audio_to_interleaved_f32(frame, &mut dest);
        }

        let produced = needed * F32_BYTES;

        let Some(writer) = self.writer.as_ref() else {
            tracing::warn!("No audio writer, skipping {} bytes", produced);
            return;
        };

        let free = writer.bytes_free();
        let to_write = produced.min(free);
        if free < produced {
            tracing::debug!(
                "Audio output full: dropping {} of {} bytes",
                produced - free,
                produced
            );
            self.counters.bytes_dropped += (produced - free) as u64;
        }

        let written = writer.write(&self.scratch[..to_write / F32_BYTES]);
        self.counters.bytes_written += written as u64;

        if self.verbose {
            tracing::debug!(
                "Audio: {} samples/ch, {} bytes produced, {} written",
                samples_per_channel,
                produced,
                written
            );
        }
    }

    /// Establish the session's output format from the first frame with audio
    pub fn derive_format(&mut self, frame: &AudioFrameV2) {
        if !frame.has_audio() || frame.sample_rate <= 0 {
            tracing::info!("No audio captured");
            return;
        }

        let wanted = AudioFormat::f32(frame.sample_rate as u32, frame.no_channels as u16);
        let format = if self.device.is_format_supported(&wanted) {
            tracing::info!("Audio format: {}", wanted);
            wanted
        } else {
            let preferred = self.device.preferred_format();
            tracing::warn!(
                "Audio format {} not supported by {}, using preferred format {}",
                wanted,
                self.device.name(),
                preferred
            );
            preferred
        };

        self.destroy_sink();
        match self.device.open_sink(format) {
            Ok(sink) => self.sink = Some(sink),
            Err(e) => tracing::error!("Failed to open audio output ({}): {}", format, e),
        }

        self.format = Some(format);
        self.counters.format_derivations += 1;
    }

    /// Drop the writer, then the sink
    pub fn destroy_sink(&mut self) {
        self.writer = None;
        if self.sink.take().is_some() {
            tracing::debug!("Audio sink destroyed");
        }
    }

    /// End of session
    pub fn shutdown(&mut self) {
        self.destroy_sink();
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.destroy_sink();
    }
}

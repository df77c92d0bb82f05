//! Audio output: device and sink traits, the bounded sample queue and the cpal backend
//!
//! A sink is created for one negotiated [`AudioFormat`]. Starting it yields a
//! [`SinkWriter`] that pushes interleaved f32 samples into a bounded lock-free
//! [`SampleQueue`]; the device callback drains the queue and converts to the device's
//! sample type. Writes never block: the caller checks [`SinkWriter::bytes_free`] and
//! drops what does not fit.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam::queue::ArrayQueue;

use super::device;
use super::types::{AudioFormat, SampleEncoding};
use crate::error::{Error, Result};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Output sink state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Stopped,
    Started,
}

/// An audio output device the user picked
pub trait OutputDevice: Send + Sync {
    fn name(&self) -> String;

    fn is_format_supported(&self, format: &AudioFormat) -> bool;

    /// Fallback when the stream's own format is not supported
    fn preferred_format(&self) -> AudioFormat;

    /// Open a stopped sink for `format`
    fn open_sink(&self, format: AudioFormat) -> Result<Box<dyn AudioSink>>;
}

/// One open output stream.
///
/// Sinks are not `Send`: they must be destroyed on the thread that opened them.
pub trait AudioSink {
    fn format(&self) -> AudioFormat;

    fn state(&self) -> SinkState;

    /// Start playback and hand out the write side
    fn start(&mut self) -> Result<SinkWriter>;
}

/// Lock-free bounded FIFO of interleaved f32 samples.
///
/// Sizes and counts are in bytes so the writer can do byte-level backpressure; storage
/// is whole samples, drained one at a time by the device callback.
pub struct SampleQueue {
    samples: ArrayQueue<f32>,
}

impl SampleQueue {
    /// Capacity is rounded down to whole f32 samples (at least one)
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            samples: ArrayQueue::new((capacity_bytes / F32_BYTES).max(1)),
        }
    }

    /// Queue sized for `buffer_ms` of audio in `format`
    pub fn for_format(format: &AudioFormat, buffer_ms: u32) -> Self {
        let frames = format.sample_rate as usize * buffer_ms as usize / 1000;
        Self::new(frames * format.channels as usize * F32_BYTES)
    }

    pub fn capacity(&self) -> usize {
        self.samples.capacity() * F32_BYTES
    }

    /// Queued bytes
    pub fn len(&self) -> usize {
        self.samples.len() * F32_BYTES
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn bytes_free(&self) -> usize {
        (self.samples.capacity() - self.samples.len()) * F32_BYTES
    }

    /// Append as many of `samples` as fit, returning the number of bytes taken
    pub fn push(&self, samples: &[f32]) -> usize {
        let mut taken = 0;
        for &sample in samples {
            if self.samples.push(sample).is_err() {
                break;
            }
            taken += 1;
        }
        taken * F32_BYTES
    }

    pub fn pop(&self) -> Option<f32> {
        self.samples.pop()
    }

    pub fn clear(&self) {
        while self.samples.pop().is_some() {}
    }
}

impl std::fmt::Debug for SampleQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Write side of a started sink
#[derive(Debug, Clone)]
pub struct SinkWriter {
    queue: Arc<SampleQueue>,
}

impl SinkWriter {
    pub fn new(queue: Arc<SampleQueue>) -> Self {
        Self { queue }
    }

    pub fn bytes_free(&self) -> usize {
        self.queue.bytes_free()
    }

    /// Non-blocking write; returns the bytes accepted
    pub fn write(&self, samples: &[f32]) -> usize {
        self.queue.push(samples)
    }
}

/// cpal-backed output device, resolved by name each time a sink is opened
#[derive(Debug, Clone)]
pub struct CpalOutputDevice {
    name: String,
    buffer_ms: u32,
}

impl CpalOutputDevice {
    /// The host's default output device
    pub fn default_output(buffer_ms: u32) -> Result<Self> {
        let info = device::default_output_device()?;
        Ok(Self {
            name: info.name,
            buffer_ms,
        })
    }

    /// An output device by exact name
    pub fn by_name(name: &str, buffer_ms: u32) -> Result<Self> {
        // Fail early if the device is gone
        device::find_output_device(Some(name))?;
        Ok(Self {
            name: name.to_string(),
            buffer_ms,
        })
    }

    fn resolve(&self) -> Result<cpal::Device> {
        device::find_output_device(Some(&self.name))
    }
}

impl OutputDevice for CpalOutputDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_format_supported(&self, format: &AudioFormat) -> bool {
        let Ok(device) = self.resolve() else {
            return false;
        };
        let Ok(configs) = device.supported_output_configs() else {
            return false;
        };

        let rate = cpal::SampleRate(format.sample_rate);
        let sample_format = format.encoding.to_cpal();
        configs.into_iter().any(|range| {
            range.channels() == format.channels
                && range.sample_format() == sample_format
                && rate >= range.min_sample_rate()
                && rate <= range.max_sample_rate()
        })
    }

    fn preferred_format(&self) -> AudioFormat {
        let config = self
            .resolve()
            .and_then(|d| {
                d.default_output_config()
                    .map_err(|e| Error::AudioDevice(e.to_string()))
            });

        match config {
            Ok(config) => AudioFormat::new(
                config.sample_rate().0,
                config.channels(),
                SampleEncoding::from_cpal(config.sample_format()).unwrap_or_default(),
            ),
            Err(e) => {
                tracing::warn!("No default config for {}: {}", self.name, e);
                AudioFormat::default()
            }
        }
    }

    fn open_sink(&self, format: AudioFormat) -> Result<Box<dyn AudioSink>> {
        let device = self.resolve()?;
        let sink = CpalSink::open(&device, format, self.buffer_ms)?;
        Ok(Box::new(sink))
    }
}

/// Output stream on a cpal device
pub struct CpalSink {
    stream: cpal::Stream,
    format: AudioFormat,
    state: SinkState,
    queue: Arc<SampleQueue>,
    owner: ThreadId,
}

impl CpalSink {
    pub fn open(device: &cpal::Device, format: AudioFormat, buffer_ms: u32) -> Result<Self> {
        let config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let queue = Arc::new(SampleQueue::for_format(&format, buffer_ms));

        let stream = match format.encoding {
            SampleEncoding::U8 => build_stream::<u8>(device, &config, queue.clone())?,
            SampleEncoding::I16 => build_stream::<i16>(device, &config, queue.clone())?,
            SampleEncoding::I32 => build_stream::<i32>(device, &config, queue.clone())?,
            SampleEncoding::F32 => build_stream::<f32>(device, &config, queue.clone())?,
        };

        // Some hosts start streams on creation
        if let Err(e) = stream.pause() {
            tracing::debug!("Could not pause new stream: {}", e);
        }

        tracing::info!(
            "Opened audio sink: {} ({} byte queue)",
            format,
            queue.capacity()
        );

        Ok(Self {
            stream,
            format,
            state: SinkState::Stopped,
            queue,
            owner: thread::current().id(),
        })
    }
}

impl AudioSink for CpalSink {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn start(&mut self) -> Result<SinkWriter> {
        self.stream
            .play()
            .map_err(|e| Error::AudioStream(e.to_string()))?;
        self.state = SinkState::Started;
        Ok(SinkWriter::new(self.queue.clone()))
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "audio sink dropped off its owning thread"
        );
        let _ = self.stream.pause();
        self.queue.clear();
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: Arc<SampleQueue>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for out in data.iter_mut() {
                    *out = match queue.pop() {
                        Some(sample) => T::from_sample(sample),
                        // Underrun
                        None => T::EQUILIBRIUM,
                    };
                }
            },
            |e| tracing::error!("Audio output stream error: {}", e),
            None,
        )
        .map_err(|e| Error::AudioStream(e.to_string()))
}

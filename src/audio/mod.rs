//! Audio output module
//!
//! Provides:
//! - Output device enumeration (cpal)
//! - Format negotiation against the selected device
//! - The per-session audio pipeline fed from the frame-sync

pub mod device;
mod output;
mod pipeline;
mod types;

pub use device::{list_output_devices, OutputDeviceInfo};
pub use output::{
    AudioSink, CpalOutputDevice, CpalSink, OutputDevice, SampleQueue, SinkState, SinkWriter,
};
pub use pipeline::{samples_for_elapsed, AudioCounters, AudioPipeline};
pub use types::{AudioFormat, SampleEncoding};

use std::sync::Arc;

use crate::error::Result;

/// Open the configured output device, or the host default when `name` is `None`
pub fn open_output_device(name: Option<&str>, buffer_ms: u32) -> Result<Arc<dyn OutputDevice>> {
    let device = match name {
        Some(name) => CpalOutputDevice::by_name(name, buffer_ms)?,
        None => CpalOutputDevice::default_output(buffer_ms)?,
    };
    tracing::info!("Audio output device: {}", device.name());
    Ok(Arc::new(device))
}

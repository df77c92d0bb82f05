//! Output device enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An output device as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub is_default: bool,
    /// Common rates inside any supported range
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

const COMMON_RATES: [u32; 6] = [44_100, 48_000, 88_200, 96_000, 176_400, 192_000];

/// List all output devices on the default host
pub fn list_output_devices() -> Vec<OutputDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let devices = match host.output_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("Failed to enumerate output devices: {}", e);
            return Vec::new();
        }
    };

    let mut infos: Vec<OutputDeviceInfo> = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else {
            continue;
        };
        // Some hosts list the same device twice
        if infos.iter().any(|d| d.name == name) {
            continue;
        }

        let (sample_rates, channels) = capabilities(&device);
        infos.push(OutputDeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            sample_rates,
            channels,
        });
    }

    infos
}

/// The host's default output device
pub fn default_output_device() -> Result<OutputDeviceInfo> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::AudioDeviceNotFound("No default output device".to_string()))?;
    let name = device
        .name()
        .map_err(|e| Error::AudioDevice(e.to_string()))?;
    let (sample_rates, channels) = capabilities(&device);

    Ok(OutputDeviceInfo {
        name,
        is_default: true,
        sample_rates,
        channels,
    })
}

/// Find an output device by exact name, or the default device for `None`
pub fn find_output_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    let Some(name) = name else {
        return host
            .default_output_device()
            .ok_or_else(|| Error::AudioDeviceNotFound("No default output device".to_string()));
    };

    let devices = host
        .output_devices()
        .map_err(|e| Error::AudioDevice(e.to_string()))?;

    for device in devices {
        if device.name().ok().as_deref() == Some(name) {
            return Ok(device);
        }
    }

    Err(Error::AudioDeviceNotFound(name.to_string()))
}

fn capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    if let Ok(configs) = device.supported_output_configs() {
        for config in configs {
            for rate in COMMON_RATES {
                let sample_rate = cpal::SampleRate(rate);
                if sample_rate >= config.min_sample_rate()
                    && sample_rate <= config.max_sample_rate()
                    && !sample_rates.contains(&rate)
                {
                    sample_rates.push(rate);
                }
            }

            if !channels.contains(&config.channels()) {
                channels.push(config.channels());
            }
        }
    }

    sample_rates.sort_unstable();
    channels.sort_unstable();
    (sample_rates, channels)
}

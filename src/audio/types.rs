//! Audio types

use serde::{Deserialize, Serialize};

/// Sample encoding of an output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SampleEncoding {
    /// 8-bit unsigned integer
    U8,
    /// 16-bit signed integer
    I16,
    /// 32-bit signed integer
    I32,
    /// 32-bit float
    #[default]
    F32,
}

impl SampleEncoding {
    pub fn from_cpal(format: cpal::SampleFormat) -> Option<Self> {
        match format {
            cpal::SampleFormat::U8 => Some(SampleEncoding::U8),
            cpal::SampleFormat::I16 => Some(SampleEncoding::I16),
            cpal::SampleFormat::I32 => Some(SampleEncoding::I32),
            cpal::SampleFormat::F32 => Some(SampleEncoding::F32),
            _ => None,
        }
    }

    pub fn to_cpal(self) -> cpal::SampleFormat {
        match self {
            SampleEncoding::U8 => cpal::SampleFormat::U8,
            SampleEncoding::I16 => cpal::SampleFormat::I16,
            SampleEncoding::I32 => cpal::SampleFormat::I32,
            SampleEncoding::F32 => cpal::SampleFormat::F32,
        }
    }
}

impl std::fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SampleEncoding::U8 => "u8",
            SampleEncoding::I16 => "i16",
            SampleEncoding::I32 => "i32",
            SampleEncoding::F32 => "f32",
        };
        f.write_str(name)
    }
}

/// Negotiated output format: rate, channel count and sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Sample encoding
    pub encoding: SampleEncoding,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: u16, encoding: SampleEncoding) -> Self {
        Self {
            sample_rate,
            channels,
            encoding,
        }
    }

    /// 32-bit float format at the given rate and channel count
    pub const fn f32(sample_rate: u32, channels: u16) -> Self {
        Self::new(sample_rate, channels, SampleEncoding::F32)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::f32(48_000, 2)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}",
            self.sample_rate, self.channels, self.encoding
        )
    }
}

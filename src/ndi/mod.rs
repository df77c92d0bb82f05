//! NDI runtime boundary
//!
//! The network media protocol is provided by the NDI runtime library and treated as a
//! black box. Everything the engine needs from it goes through [`NdiRuntime`]:
//!
//! - find sessions (source discovery)
//! - receive sessions (single-frame capture)
//! - frame-sync sessions layered on a receive session (playback)
//! - the planar to interleaved audio utility
//!
//! Frame structs are `#[repr(C)]` mirrors of the SDK's v2 frame types so the dynamically
//! loaded runtime ([`NdiLibrary`]) can fill them in place.

pub mod guard;
mod library;

pub use guard::{DeleteGuard, NullableHandle};
pub use library::NdiLibrary;

use std::ffi::{c_char, c_void};
use std::ptr;

/// Opaque find (discovery) session
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindInstance(pub *mut c_void);

/// Opaque receive session
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvInstance(pub *mut c_void);

/// Opaque frame-sync session layered on a [`RecvInstance`]
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSyncInstance(pub *mut c_void);

impl FindInstance {
    pub const NULL: Self = Self(ptr::null_mut());
}

impl RecvInstance {
    pub const NULL: Self = Self(ptr::null_mut());
}

impl FrameSyncInstance {
    pub const NULL: Self = Self(ptr::null_mut());
}

/// Build a FourCC code the way the SDK does
pub const fn make_fourcc(a: u8, b: u8, c: u8, d: u8) -> i32 {
    (a as u32 | (b as u32) << 8 | (c as u32) << 16 | (d as u32) << 24) as i32
}

/// Video FourCC codes the engine understands
pub mod fourcc {
    use super::make_fourcc;

    pub const RGBA: i32 = make_fourcc(b'R', b'G', b'B', b'A');
    pub const RGBX: i32 = make_fourcc(b'R', b'G', b'B', b'X');
    pub const BGRA: i32 = make_fourcc(b'B', b'G', b'R', b'A');
    pub const BGRX: i32 = make_fourcc(b'B', b'G', b'R', b'X');
    pub const UYVY: i32 = make_fourcc(b'U', b'Y', b'V', b'Y');
}

/// Kind of frame returned by a receive capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    None,
    Video,
    Audio,
    Metadata,
    Error,
    StatusChange,
    Unknown(i32),
}

impl From<i32> for FrameType {
    fn from(value: i32) -> Self {
        match value {
            0 => FrameType::None,
            1 => FrameType::Video,
            2 => FrameType::Audio,
            3 => FrameType::Metadata,
            4 => FrameType::Error,
            100 => FrameType::StatusChange,
            other => FrameType::Unknown(other),
        }
    }
}

/// Field layout requested from a frame-sync video capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormatType {
    Interleaved,
    Progressive,
    Field0,
    Field1,
}

impl FrameFormatType {
    pub fn as_raw(self) -> i32 {
        match self {
            FrameFormatType::Interleaved => 0,
            FrameFormatType::Progressive => 1,
            FrameFormatType::Field0 => 2,
            FrameFormatType::Field1 => 3,
        }
    }
}

/// Pixel format a receive session should deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvColorFormat {
    BgrxBgra,
    UyvyBgra,
    RgbxRgba,
    UyvyRgba,
    Fastest,
    Best,
}

impl RecvColorFormat {
    pub fn as_raw(self) -> i32 {
        match self {
            RecvColorFormat::BgrxBgra => 0,
            RecvColorFormat::UyvyBgra => 1,
            RecvColorFormat::RgbxRgba => 2,
            RecvColorFormat::UyvyRgba => 3,
            RecvColorFormat::Fastest => 100,
            RecvColorFormat::Best => 101,
        }
    }
}

/// Bandwidth a receive session should request from the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvBandwidth {
    MetadataOnly,
    AudioOnly,
    Lowest,
    Highest,
}

impl RecvBandwidth {
    pub fn as_raw(self) -> i32 {
        match self {
            RecvBandwidth::MetadataOnly => -10,
            RecvBandwidth::AudioOnly => 10,
            RecvBandwidth::Lowest => 0,
            RecvBandwidth::Highest => 100,
        }
    }
}

impl From<crate::types::Quality> for RecvBandwidth {
    fn from(quality: crate::types::Quality) -> Self {
        match quality {
            crate::types::Quality::Full => RecvBandwidth::Highest,
            crate::types::Quality::Low => RecvBandwidth::Lowest,
        }
    }
}

/// Settings for opening a receive session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecvSettings {
    pub source_name: String,
    pub color_format: RecvColorFormat,
    pub bandwidth: RecvBandwidth,
    pub allow_video_fields: bool,
}

impl RecvSettings {
    /// 4-channel 8-bit, progressive only
    pub fn rgba(source_name: impl Into<String>, bandwidth: RecvBandwidth) -> Self {
        Self {
            source_name: source_name.into(),
            color_format: RecvColorFormat::RgbxRgba,
            bandwidth,
            allow_video_fields: false,
        }
    }
}

/// Mirror of `NDIlib_video_frame_v2_t`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VideoFrameV2 {
    pub xres: i32,
    pub yres: i32,
    pub fourcc: i32,
    pub frame_rate_n: i32,
    pub frame_rate_d: i32,
    pub picture_aspect_ratio: f32,
    pub frame_format_type: i32,
    pub timecode: i64,
    pub p_data: *mut u8,
    /// `line_stride_in_bytes` for uncompressed formats
    pub line_stride_in_bytes: i32,
    pub p_metadata: *const c_char,
    pub timestamp: i64,
}

impl Default for VideoFrameV2 {
    fn default() -> Self {
        Self {
            xres: 0,
            yres: 0,
            fourcc: 0,
            frame_rate_n: 0,
            frame_rate_d: 0,
            picture_aspect_ratio: 0.0,
            frame_format_type: 0,
            timecode: 0,
            p_data: ptr::null_mut(),
            line_stride_in_bytes: 0,
            p_metadata: ptr::null(),
            timestamp: 0,
        }
    }
}

impl VideoFrameV2 {
    /// Did the capture produce a picture?
    pub fn has_picture(&self) -> bool {
        self.yres > 0
    }

    /// Raw pixel rows (`line_stride * yres` bytes), or `None` for an empty frame.
    ///
    /// # Safety
    ///
    /// The frame must have been filled by an [`NdiRuntime`] capture call and not yet
    /// passed to the matching free call.
    pub unsafe fn pixels(&self) -> Option<&[u8]> {
        if self.p_data.is_null() || self.yres <= 0 || self.line_stride_in_bytes <= 0 {
            return None;
        }
        let len = self.line_stride_in_bytes as usize * self.yres as usize;
        Some(std::slice::from_raw_parts(self.p_data, len))
    }
}

/// Mirror of `NDIlib_audio_frame_v2_t` (planar 32-bit float)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AudioFrameV2 {
    pub sample_rate: i32,
    pub no_channels: i32,
    pub no_samples: i32,
    pub timecode: i64,
    pub p_data: *mut f32,
    pub channel_stride_in_bytes: i32,
    pub p_metadata: *const c_char,
    pub timestamp: i64,
}

impl Default for AudioFrameV2 {
    fn default() -> Self {
        Self {
            sample_rate: 0,
            no_channels: 0,
            no_samples: 0,
            timecode: 0,
            p_data: ptr::null_mut(),
            channel_stride_in_bytes: 0,
            p_metadata: ptr::null(),
            timestamp: 0,
        }
    }
}

impl AudioFrameV2 {
    /// Zero channels means nothing was captured, as opposed to captured silence
    pub fn has_audio(&self) -> bool {
        self.no_channels > 0
    }
}

/// Destination for [`NdiRuntime::audio_to_interleaved_f32`]
#[derive(Debug)]
pub struct InterleavedDest<'a> {
    pub sample_rate: i32,
    pub channels: i32,
    /// Samples per channel
    pub samples: i32,
    /// Exactly `samples * channels` floats
    pub data: &'a mut [f32],
}

/// The NDI runtime as seen by the engine.
///
/// Implementations follow the SDK contract: creation calls return a null handle on
/// failure, every capture must be paired with the matching free on the same session,
/// and frame-sync captures return immediately.
pub trait NdiRuntime: Send + Sync {
    /// Open a discovery session with default settings
    fn find_create(&self) -> FindInstance;

    fn find_destroy(&self, instance: FindInstance);

    /// Block up to `timeout_ms` for the visible source set to change
    fn find_wait_for_sources(&self, instance: FindInstance, timeout_ms: u32) -> bool;

    /// Names of the currently visible sources, in runtime order
    fn find_current_sources(&self, instance: FindInstance) -> Vec<String>;

    fn recv_create(&self, settings: &RecvSettings) -> RecvInstance;

    fn recv_destroy(&self, instance: RecvInstance);

    /// Blocking capture of the next video frame; other frame kinds may be reported
    fn recv_capture_video(
        &self,
        instance: RecvInstance,
        frame: &mut VideoFrameV2,
        timeout_ms: u32,
    ) -> FrameType;

    fn recv_free_video(&self, instance: RecvInstance, frame: &VideoFrameV2);

    fn framesync_create(&self, recv: RecvInstance) -> FrameSyncInstance;

    fn framesync_destroy(&self, instance: FrameSyncInstance);

    /// Capture the best video frame for "now"; a zeroed frame means none yet
    fn framesync_capture_video(
        &self,
        instance: FrameSyncInstance,
        frame: &mut VideoFrameV2,
        format: FrameFormatType,
    );

    fn framesync_free_video(&self, instance: FrameSyncInstance, frame: &VideoFrameV2);

    /// Pull `samples` per channel resampled to the requested rate/channels.
    ///
    /// All zeros queries the stream's current format without pulling audio.
    fn framesync_capture_audio(
        &self,
        instance: FrameSyncInstance,
        frame: &mut AudioFrameV2,
        sample_rate: i32,
        channels: i32,
        samples: i32,
    );

    fn framesync_free_audio(&self, instance: FrameSyncInstance, frame: &AudioFrameV2);

    /// Planar float to interleaved float conversion utility
    fn audio_to_interleaved_f32(&self, src: &AudioFrameV2, dst: &mut InterleavedDest<'_>);
}

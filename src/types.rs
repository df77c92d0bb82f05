//! Common types used throughout ndiscope

use serde::{Deserialize, Serialize};

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    // Common resolutions
    pub const QHD_540P: Self = Self::new(960, 540);
    pub const HD_720P: Self = Self::new(1280, 720);
    pub const FHD_1080P: Self = Self::new(1920, 1080);

    /// Is either dimension zero?
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Largest resolution with this aspect ratio that fits inside `region`.
    ///
    /// Each dimension is at least one pixel. An empty `self` or `region` yields `self`.
    pub fn fit_within(&self, region: Resolution) -> Resolution {
        if self.is_empty() || region.is_empty() {
            return *self;
        }

        // Compare w_region * h_self against h_region * w_self to pick the limiting side
        let lhs = region.width as u64 * self.height as u64;
        let rhs = region.height as u64 * self.width as u64;

        if lhs <= rhs {
            let height = (self.height as u64 * region.width as u64 + self.width as u64 / 2)
                / self.width as u64;
            Resolution::new(region.width, (height as u32).max(1))
        } else {
            let width = (self.width as u64 * region.height as u64 + self.height as u64 / 2)
                / self.height as u64;
            Resolution::new((width as u32).max(1), region.height)
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::QHD_540P
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Byte order of a 4-channel, 8-bit pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelLayout {
    /// R, G, B, A
    Rgba,
    /// R, G, B, unused
    Rgbx,
    /// B, G, R, A
    Bgra,
    /// B, G, R, unused
    Bgrx,
}

impl PixelLayout {
    /// Bytes per pixel
    pub const fn bytes_per_pixel(&self) -> usize {
        4
    }

    /// Is blue stored before red?
    pub fn is_blue_first(&self) -> bool {
        matches!(self, PixelLayout::Bgra | PixelLayout::Bgrx)
    }

    /// Does the fourth byte carry alpha?
    pub fn has_alpha(&self) -> bool {
        matches!(self, PixelLayout::Rgba | PixelLayout::Bgra)
    }
}

impl Default for PixelLayout {
    fn default() -> Self {
        PixelLayout::Rgba
    }
}

/// A ready-to-paint image handed to display sinks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Tightly packed pixel rows
    pub data: Vec<u8>,
    /// Image width
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Pixel layout
    pub layout: PixelLayout,
}

impl Image {
    /// Create an image from packed pixel data
    pub fn from_data(data: Vec<u8>, width: u32, height: u32, layout: PixelLayout) -> Self {
        Self {
            data,
            width,
            height,
            layout,
        }
    }

    /// Get resolution
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Row stride in bytes
    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }

    /// Is the image empty?
    pub fn is_empty(&self) -> bool {
        self.resolution().is_empty()
    }

    /// Pixel at (x, y) as four bytes
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.stride() + x as usize * 4;
        self.data
            .get(idx..idx + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// Framerate representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framerate {
    pub num: u32,
    pub den: u32,
}

impl Framerate {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    // Common framerates
    pub const FPS_30: Self = Self::new(30, 1);

    /// Get framerate as f64
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Capture interval in whole microseconds (truncated)
    pub fn frame_duration_us(&self) -> u64 {
        if self.num == 0 {
            return 0;
        }
        (1_000_000 * self.den as u64) / self.num as u64
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.den == 1 {
            write!(f, "{} fps", self.num)
        } else {
            write!(f, "{:.2} fps", self.as_f64())
        }
    }
}

/// An NDI source as reported by discovery
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    /// Full NDI name, e.g. `"STUDIO-PC (Camera 1)"`
    pub name: String,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Receive quality preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Quality {
    /// Full-resolution stream
    #[default]
    Full,
    /// Low-bandwidth preview stream
    Low,
}

/// Statistics for one playback session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    /// Cadence ticks executed
    pub ticks: u64,
    /// Frames handed to the display sink
    pub frames_displayed: u64,
    /// Ticks where the frame-sync returned no picture
    pub empty_frames: u64,
    /// Audio bytes written to the output sink
    pub audio_bytes_written: u64,
    /// Audio bytes dropped for lack of sink space
    pub audio_bytes_dropped: u64,
    /// Times the audio format was derived
    pub format_derivations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_within_keeps_aspect() {
        let hd = Resolution::FHD_1080P;
        assert_eq!(hd.fit_within(Resolution::new(960, 960)), Resolution::new(960, 540));
        assert_eq!(hd.fit_within(Resolution::new(4000, 540)), Resolution::new(960, 540));

        let portrait = Resolution::new(1080, 1920);
        assert_eq!(
            portrait.fit_within(Resolution::new(640, 480)),
            Resolution::new(270, 480)
        );
    }

    #[test]
    fn test_fit_within_upscales_and_degenerate() {
        let small = Resolution::new(320, 240);
        assert_eq!(small.fit_within(Resolution::new(640, 640)), Resolution::new(640, 480));

        let sliver = Resolution::new(4000, 1);
        assert_eq!(sliver.fit_within(Resolution::new(100, 100)), Resolution::new(100, 1));

        assert_eq!(small.fit_within(Resolution::new(0, 100)), small);
    }

    #[test]
    fn test_frame_duration_truncates() {
        assert_eq!(Framerate::FPS_30.frame_duration_us(), 33_333);
        assert_eq!(Framerate::new(7, 1).frame_duration_us(), 142_857);
        assert_eq!(Framerate::new(30000, 1001).frame_duration_us(), 33_366);
        assert_eq!(Framerate::new(0, 1).frame_duration_us(), 0);
    }

    #[test]
    fn test_image_pixel_access() {
        let image = Image::from_data(
            vec![1, 2, 3, 4, 5, 6, 7, 8],
            2,
            1,
            PixelLayout::Rgba,
        );
        assert_eq!(image.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(image.pixel(2, 0), None);
        assert_eq!(image.stride(), 8);
    }
}

//! Configuration types for ndiscope

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Framerate, Quality, Resolution};

/// Top-level configuration, read from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub snapshot: SnapshotConfig,
    pub playback: PlaybackConfig,
    pub audio: AudioConfig,
    pub runtime: RuntimeConfig,
}

/// Source discovery configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// How long to wait for the source list to settle
    pub timeout_ms: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms as u64)
    }
}

/// Single-frame capture configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Capture attempts before giving up
    pub max_attempts: u32,
    /// Wait per attempt
    pub attempt_timeout_ms: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            attempt_timeout_ms: 5000,
        }
    }
}

/// Playback configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Capture cadence in frames per second
    pub fps: u32,
    /// Receive bandwidth preference
    pub quality: Quality,
    /// Pull audio alongside video
    pub capture_audio: bool,
    /// Log every tick
    pub verbose: bool,
    /// Region frames are scaled to fit
    pub display: Resolution,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            quality: Quality::Full,
            capture_audio: true,
            verbose: false,
            display: Resolution::QHD_540P,
        }
    }
}

impl PlaybackConfig {
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_audio(mut self, capture_audio: bool) -> Self {
        self.capture_audio = capture_audio;
        self
    }

    pub fn with_display(mut self, width: u32, height: u32) -> Self {
        self.display = Resolution::new(width, height);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn framerate(&self) -> Framerate {
        Framerate::new(self.fps, 1)
    }
}

/// Audio output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name (None = host default)
    pub device: Option<String>,
    /// Output queue length
    pub buffer_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            buffer_ms: 250,
        }
    }
}

/// NDI runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Explicit path to the NDI runtime library
    pub library_path: Option<PathBuf>,
}

impl Config {
    /// Default config file location (`<config dir>/ndiscope/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.config_dir().join("ndiscope").join("config.toml"))
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the default location, falling back to defaults when absent
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Write as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.playback.fps == 0 {
            return Err(Error::Config("playback.fps must be greater than 0".into()));
        }
        if self.snapshot.max_attempts == 0 {
            return Err(Error::Config(
                "snapshot.max_attempts must be greater than 0".into(),
            ));
        }
        if self.audio.buffer_ms == 0 {
            return Err(Error::Config("audio.buffer_ms must be greater than 0".into()));
        }
        if self.playback.display.is_empty() {
            return Err(Error::Config(format!(
                "playback.display must not be empty (got {})",
                self.playback.display
            )));
        }
        Ok(())
    }

    pub fn with_playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    pub fn with_audio_device(mut self, device: impl Into<String>) -> Self {
        self.audio.device = Some(device.into());
        self
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime.library_path = Some(path.into());
        self
    }
}

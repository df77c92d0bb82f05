//! Error types for ndiscope

use thiserror::Error;

/// Result type alias for ndiscope operations
pub type Result<T> = std::result::Result<T, Error>;

/// ndiscope error type
#[derive(Error, Debug)]
pub enum Error {
    // NDI runtime errors
    #[error("NDI runtime not found: {0}")]
    RuntimeNotFound(String),

    #[error("NDI runtime error: {0}")]
    Runtime(String),

    #[error("NDI runtime failed to initialize (unsupported CPU?)")]
    RuntimeInit,

    // Controller preconditions
    #[error("No source selected")]
    NoSourceSelected,

    #[error("Playback already running")]
    PlaybackActive,

    #[error("Playback not running")]
    PlaybackNotRunning,

    // Audio output errors
    #[error("Audio device not found: {0}")]
    AudioDeviceNotFound(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio stream error: {0}")]
    AudioStream(String),

    // Processing errors
    #[error("Scaling error: {0}")]
    Scaling(String),

    #[error("Pixel conversion error: {0}")]
    PixelConversion(String),

    // General errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::AudioStream(_) | Error::AudioDevice(_) | Error::Scaling(_)
        )
    }

    /// Check if this error comes from a precondition checked before an operation starts
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::NoSourceSelected | Error::PlaybackActive | Error::PlaybackNotRunning
        )
    }

    /// Check if this is a missing or broken NDI runtime
    pub fn is_runtime_issue(&self) -> bool {
        matches!(
            self,
            Error::RuntimeNotFound(_) | Error::Runtime(_) | Error::RuntimeInit
        )
    }
}

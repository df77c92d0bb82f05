//! ndiscope CLI
//!
//! Command-line front end for discovering, grabbing and playing NDI sources.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use ndiscope::{
    audio::{self, device},
    Config, LogDisplay, Monitor, NdiLibrary, Quality, Resolution, Source,
};

/// Receive quality for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum QualityArg {
    /// Full-resolution stream
    #[default]
    Full,
    /// Low-bandwidth preview stream
    Low,
}

impl From<QualityArg> for Quality {
    fn from(q: QualityArg) -> Self {
        match q {
            QualityArg::Full => Quality::Full,
            QualityArg::Low => Quality::Low,
        }
    }
}

#[derive(Parser)]
#[command(name = "ndiscope")]
#[command(about = "NDI source monitor - Discover, Snapshot, Play")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List NDI sources on the network
    Sources {
        /// Discovery timeout in milliseconds
        #[arg(short, long)]
        timeout: Option<u32>,
    },

    /// Grab one frame from a source
    Snapshot {
        /// Source name, e.g. "HOST (Camera 1)"
        source: String,

        /// Fit the frame into this region (e.g., 960x540)
        #[arg(short, long)]
        resolution: Option<String>,
    },

    /// Play a source until Ctrl+C
    Play {
        /// Source name, e.g. "HOST (Camera 1)"
        source: String,

        /// Capture cadence
        #[arg(short, long)]
        fps: Option<u32>,

        /// Receive quality
        #[arg(short, long, value_enum)]
        quality: Option<QualityArg>,

        /// Video only
        #[arg(long)]
        no_audio: bool,

        /// Audio output device name
        #[arg(short, long)]
        device: Option<String>,
    },

    /// List audio output devices
    Devices,

    /// Show NDI runtime and configuration details
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "ndiscope=debug" } else { "ndiscope=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .init();

    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Sources { timeout } => cmd_sources(config, timeout).await,
        Commands::Snapshot { source, resolution } => {
            cmd_snapshot(config, source, resolution).await
        }
        Commands::Play {
            source,
            fps,
            quality,
            no_audio,
            device,
        } => cmd_play(config, source, fps, quality, no_audio, device, cli.verbose).await,
        Commands::Devices => cmd_devices(),
        Commands::Info => cmd_info(config, cli.config.as_deref()),
    }
}

fn monitor(config: Config) -> anyhow::Result<Monitor> {
    let runtime = NdiLibrary::locate(config.runtime.library_path.as_deref())?;
    Ok(Monitor::new(
        Arc::new(runtime),
        Arc::new(LogDisplay::default()),
        config,
    ))
}

fn parse_resolution(text: &str) -> anyhow::Result<Resolution> {
    let (w, h) = text
        .split_once('x')
        .ok_or_else(|| anyhow::anyhow!("Invalid resolution: {} (expected WxH)", text))?;
    Ok(Resolution::new(w.trim().parse()?, h.trim().parse()?))
}

async fn cmd_sources(mut config: Config, timeout: Option<u32>) -> anyhow::Result<()> {
    if let Some(timeout) = timeout {
        config.discovery.timeout_ms = timeout;
    }
    let monitor = monitor(config)?;

    let sources = monitor.discover().await;
    if sources.is_empty() {
        println!("No NDI sources found.");
        return Ok(());
    }

    println!("NDI Sources");
    println!("===========\n");
    for (i, source) in sources.iter().enumerate() {
        println!("  [{}] {}", i, source);
    }
    Ok(())
}

async fn cmd_snapshot(
    config: Config,
    source: String,
    resolution: Option<String>,
) -> anyhow::Result<()> {
    let region = resolution.as_deref().map(parse_resolution).transpose()?;
    let monitor = monitor(config)?;
    let source = Source::new(source);

    let Some(image) = monitor.snapshot(Some(&source), region).await? else {
        anyhow::bail!("No video frame received from {}", source);
    };

    match region {
        Some(region) => println!(
            "Captured frame from {}, scaled to {} (region {})",
            source,
            image.resolution(),
            region
        ),
        None => println!("Captured {} frame from {}", image.resolution(), source),
    }
    Ok(())
}

async fn cmd_play(
    mut config: Config,
    source: String,
    fps: Option<u32>,
    quality: Option<QualityArg>,
    no_audio: bool,
    device: Option<String>,
    verbose: bool,
) -> anyhow::Result<()> {
    if let Some(fps) = fps {
        config.playback.fps = fps;
    }
    if let Some(quality) = quality {
        config.playback.quality = quality.into();
    }
    if device.is_some() {
        config.audio.device = device;
    }
    config.playback.capture_audio = config.playback.capture_audio && !no_audio;
    config.playback.verbose = config.playback.verbose || verbose;
    config.validate()?;

    let monitor = monitor(config)?;

    if monitor.config().playback.capture_audio {
        let audio = &monitor.config().audio;
        match audio::open_output_device(audio.device.as_deref(), audio.buffer_ms) {
            Ok(device) => monitor.select_output_device(device)?,
            Err(e) => eprintln!("Audio disabled: {}", e),
        }
    }

    let playback = &monitor.config().playback;
    println!("Configuration:");
    println!("  Source: {}", source);
    println!("  FPS: {}", playback.fps);
    println!("  Quality: {:?}", playback.quality);
    println!(
        "  Audio: {}",
        monitor.output_device_name().unwrap_or_else(|| "off".into())
    );
    println!();

    let source = Source::new(source);
    let handle = monitor.start_playback(Some(&source))?;
    println!("Playback started. Press Ctrl+C to stop.\n");

    let wait = handle.wait();
    tokio::pin!(wait);

    // Every Ctrl+C re-issues the stop request until the session ends
    let ok = loop {
        tokio::select! {
            ok = &mut wait => break ok,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                println!("\nStopping...");
                if let Err(e) = monitor.stop() {
                    tracing::debug!("Stop after exit: {}", e);
                }
            }
        }
    };

    let stats = monitor.stats();
    println!("\nStatistics:");
    println!("  Ticks: {}", stats.ticks);
    println!("  Frames displayed: {}", stats.frames_displayed);
    println!("  Empty frames: {}", stats.empty_frames);
    println!("  Audio bytes written: {}", stats.audio_bytes_written);
    println!("  Audio bytes dropped: {}", stats.audio_bytes_dropped);

    if !ok {
        anyhow::bail!("Playback of {} could not start", source);
    }
    Ok(())
}

fn cmd_devices() -> anyhow::Result<()> {
    println!("Audio Output Devices");
    println!("====================\n");

    let devices = device::list_output_devices();
    if devices.is_empty() {
        println!("No output devices found.");
        return Ok(());
    }

    for d in devices {
        println!(
            "  {}{}",
            d.name,
            if d.is_default { " (default)" } else { "" }
        );
        println!("      Rates: {:?}", d.sample_rates);
        println!("      Channels: {:?}", d.channels);
    }
    Ok(())
}

fn cmd_info(config: Config, config_path: Option<&Path>) -> anyhow::Result<()> {
    println!("ndiscope {}", ndiscope::VERSION);
    println!("==============\n");

    println!("=== NDI Runtime ===");
    match NdiLibrary::locate(config.runtime.library_path.as_deref()) {
        Ok(runtime) => {
            println!("Path: {}", runtime.path().display());
            println!("Version: {}", runtime.version());
        }
        Err(e) => println!("Not available: {}", e),
    }

    println!("\n=== Audio ===");
    match device::default_output_device() {
        Ok(d) => println!("Default output: {}", d.name),
        Err(e) => println!("Default output: none ({})", e),
    }

    println!("\n=== Configuration ===");
    let path = config_path
        .map(Path::to_path_buf)
        .or_else(Config::default_path);
    if let Some(path) = path {
        println!("File: {}", path.display());
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

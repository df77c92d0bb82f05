//! Single-frame capture

use crate::config::SnapshotConfig;
use crate::ndi::{DeleteGuard, FrameType, NdiRuntime, RecvBandwidth, RecvSettings, VideoFrameV2};
use crate::processing;
use crate::types::{Image, Source};

/// Grab one video frame from `source` as an RGBA image.
///
/// Opens a short-lived receive session and makes up to `config.max_attempts` blocking
/// captures of `config.attempt_timeout_ms` each. Only video frames are accepted. Returns
/// `None` when the session cannot be opened or no video arrives in time.
pub fn capture_one_frame(
    runtime: &dyn NdiRuntime,
    source: &Source,
    config: &SnapshotConfig,
) -> Option<Image> {
    let settings = RecvSettings::rgba(source.name.clone(), RecvBandwidth::Highest);
    let recv = DeleteGuard::new(|h| runtime.recv_destroy(h), runtime.recv_create(&settings));
    if recv.is_null() {
        tracing::error!("Failed to create NDI receiver for {}", source);
        return None;
    }

    for attempt in 1..=config.max_attempts {
        let mut frame = VideoFrameV2::default();
        let kind = runtime.recv_capture_video(recv.get(), &mut frame, config.attempt_timeout_ms);

        match kind {
            FrameType::Video => {
                // SAFETY: the frame was just filled by the capture and is freed right after
                let image = unsafe { processing::process_frame(&frame, None) };
                runtime.recv_free_video(recv.get(), &frame);

                return match image {
                    Ok(Some(image)) => {
                        tracing::info!(
                            "Captured {}x{} frame from {} (attempt {})",
                            image.width,
                            image.height,
                            source,
                            attempt
                        );
                        Some(image)
                    }
                    Ok(None) => {
                        tracing::warn!("Video frame from {} had no picture", source);
                        None
                    }
                    Err(e) => {
                        tracing::error!("Failed to convert frame from {}: {}", source, e);
                        None
                    }
                };
            }
            FrameType::None => {
                tracing::debug!("No frame from {} (attempt {})", source, attempt);
            }
            other => {
                tracing::debug!("Skipping {:?} from {} (attempt {})", other, source, attempt);
            }
        }
    }

    tracing::warn!(
        "No video from {} after {} attempts",
        source,
        config.max_attempts
    );
    None
}

//! Source discovery

use std::time::{Duration, Instant};

use crate::ndi::{DeleteGuard, NdiRuntime};
use crate::types::Source;

/// List the sources visible on the network.
///
/// Waits up to `timeout` for the source set to change, then returns whatever is visible.
/// A failed session open yields an empty list without waiting.
pub fn discover_sources(runtime: &dyn NdiRuntime, timeout: Duration) -> Vec<Source> {
    let find = DeleteGuard::new(|h| runtime.find_destroy(h), runtime.find_create());
    if find.is_null() {
        tracing::error!("Failed to create NDI find instance");
        return Vec::new();
    }

    let timeout_ms = timeout.as_millis().min(u32::MAX as u128) as u32;
    let started = Instant::now();
    if !runtime.find_wait_for_sources(find.get(), timeout_ms) {
        tracing::info!("No source changes within {} ms", timeout_ms);
    }

    let sources: Vec<Source> = runtime
        .find_current_sources(find.get())
        .into_iter()
        .map(Source::new)
        .collect();

    tracing::info!(
        "Found {} source(s) in {:?}",
        sources.len(),
        started.elapsed()
    );
    for source in &sources {
        tracing::debug!("  {}", source);
    }

    sources
}

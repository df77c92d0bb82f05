//! Capture module
//!
//! Short-lived NDI operations:
//! - Source discovery
//! - Single-frame snapshot from one source

mod discovery;
mod snapshot;

pub use discovery::discover_sources;
pub use snapshot::capture_one_frame;

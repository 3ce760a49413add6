//! Save flow
//!
//! Turns finished capture takes into the final recording and inspects the result.

pub mod merger;
pub mod probe;
pub mod types;

pub use merger::Merger;
pub use probe::{probe_media, ProbeError};
pub use types::{FinalArtifact, MediaInfo, SaveError};

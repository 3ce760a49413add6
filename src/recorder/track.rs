//! One capture channel and the takes it produced

use crate::capture::{CaptureProcess, CaptureResult, TrackKind};
use std::path::PathBuf;

/// A capture channel owned by the session controller
///
/// `process` is set exactly while the channel is capturing. Every process
/// started since the last successful save leaves its file in `takes`.
pub struct Track {
    kind: TrackKind,
    process: Option<Box<dyn CaptureProcess>>,
    takes: Vec<PathBuf>,
}

impl Track {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            process: None,
            takes: Vec::new(),
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        self.process.is_some()
    }

    /// Take ownership of a freshly started process
    pub fn attach(&mut self, process: Box<dyn CaptureProcess>) {
        self.takes.push(process.target().to_path_buf());
        self.process = Some(process);
    }

    /// Give up the live process, keeping its take
    pub fn detach(&mut self) -> Option<Box<dyn CaptureProcess>> {
        self.process.take()
    }

    /// Signal the live process to finish and give it up for reaping
    pub fn terminate(&mut self) -> Option<Box<dyn CaptureProcess>> {
        let mut process = self.detach()?;
        if let Err(e) = process.terminate() {
            tracing::warn!("Failed to terminate {} capture: {}", self.kind, e);
        }
        Some(process)
    }

    /// Hand over all takes to the save flow
    pub fn drain_takes(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.takes)
    }

    pub fn suspend(&mut self) -> CaptureResult<()> {
        match self.process.as_mut() {
            Some(process) => process.suspend(),
            None => Ok(()),
        }
    }

    pub fn resume(&mut self) -> CaptureResult<()> {
        match self.process.as_mut() {
            Some(process) => process.resume(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("kind", &self.kind)
            .field("pid", &self.process.as_ref().and_then(|p| p.pid()))
            .field("takes", &self.takes)
            .finish()
    }
}

/// Wait for a terminated process to exit
///
/// Failures are logged; the take stays on disk either way.
pub async fn reap(kind: TrackKind, mut process: Box<dyn CaptureProcess>) {
    match process.wait().await {
        Ok(code) => tracing::debug!("{} capture exited with {:?}", kind, code),
        Err(e) => tracing::warn!("Failed to wait for {} capture: {}", kind, e),
    }
}

//! Capture trait definitions
//!
//! Platform-agnostic types describing capture sources and process lifecycle.

use super::command::CommandSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while controlling a capture process
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send {signal} to pid {pid}: {message}")]
    Signal {
        signal: &'static str,
        pid: u32,
        message: String,
    },

    #[error("Capture area unavailable: {0}")]
    Geometry(String),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Logical capture channel kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Screen capture
    Video,
    /// Microphone capture
    Audio,
    /// Webcam capture
    Camera,
}

impl TrackKind {
    /// File extension written by this kind's capture program
    pub fn extension(&self) -> &'static str {
        match self {
            TrackKind::Video | TrackKind::Camera => "mp4",
            TrackKind::Audio => "wav",
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Camera => write!(f, "camera"),
        }
    }
}

/// Information about a display/screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    /// Output name (e.g. "eDP-1") or the X display for the fallback entry
    pub name: String,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Horizontal offset inside the X screen
    pub x: i32,

    /// Vertical offset inside the X screen
    pub y: i32,

    /// Whether this is the primary display
    pub is_primary: bool,
}

impl DisplayInfo {
    /// `WxH` string for the capture program
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Grab target in x11grab syntax (`:0.0+X+Y`)
    pub fn grab_target(&self, x_display: &str) -> String {
        format!("{}+{}+{}", x_display, self.x, self.y)
    }
}

/// A running external capture process
///
/// Implementations own the OS process exclusively. `suspend`, `resume` and
/// `terminate` only deliver control signals and return immediately; they are
/// no-ops once the process has exited. Use [`CaptureProcess::wait`] to observe
/// the exit.
#[async_trait]
pub trait CaptureProcess: Send {
    /// OS process id while the process is alive
    fn pid(&self) -> Option<u32>;

    /// File the process is writing to
    fn target(&self) -> &Path;

    /// Stop the process from making progress
    fn suspend(&mut self) -> CaptureResult<()>;

    /// Let a suspended process continue
    fn resume(&mut self) -> CaptureResult<()>;

    /// Ask the process to finish its output and exit
    fn terminate(&mut self) -> CaptureResult<()>;

    /// Non-blocking exit check
    fn has_exited(&mut self) -> bool;

    /// Wait for the process to exit, returning its exit code if any
    async fn wait(&mut self) -> CaptureResult<Option<i32>>;
}

/// Starts capture processes from fully formed invocations
pub trait ProcessLauncher: Send + Sync {
    fn start(&self, spec: &CommandSpec) -> CaptureResult<Box<dyn CaptureProcess>>;
}

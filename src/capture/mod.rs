//! Capture process control
//!
//! This module wraps the external capture programs (screen, microphone,
//! webcam) behind the `CaptureProcess` trait.

pub mod command;
pub mod display;
pub mod process;
pub mod traits;

pub use command::{CommandSpec, CommandTemplate};
pub use display::{
    capture_area, default_display, desktop_display, find_display, get_displays, select_display,
    select_window, x_display, CaptureSource,
};
pub use process::SignalLauncher;
pub use traits::{
    CaptureError, CaptureProcess, CaptureResult, DisplayInfo, ProcessLauncher, TrackKind,
};

//! Recording command handlers
//!
//! Thin wrappers over [`SessionController`] that turn session errors into the
//! `ErrorResponse` notifications shown by the front-end.

use crate::export::FinalArtifact;
use crate::recorder::{SessionController, SessionState, SessionStatus};
use crate::utils::ErrorResponse;
use std::str::FromStr;

/// Console input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start a recording, or stop and save the current one
    ToggleRecording,
    TogglePause,
    ToggleAudio,
    ToggleCamera,
    Status,
    /// Save the takes kept by a failed save
    RetrySave,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" | "record" | "stop" => Ok(ConsoleCommand::ToggleRecording),
            "p" | "pause" | "resume" => Ok(ConsoleCommand::TogglePause),
            "a" | "audio" | "mic" => Ok(ConsoleCommand::ToggleAudio),
            "c" | "camera" | "cam" => Ok(ConsoleCommand::ToggleCamera),
            "s" | "status" => Ok(ConsoleCommand::Status),
            "retry" => Ok(ConsoleCommand::RetrySave),
            "h" | "help" | "?" => Ok(ConsoleCommand::Help),
            "q" | "quit" | "exit" => Ok(ConsoleCommand::Quit),
            other => Err(format!("Unknown command: {} (h for help)", other)),
        }
    }
}

pub const HELP: &str = "\
Commands:
  r       start / stop recording
  p       pause / resume
  a       microphone on / off
  c       webcam on / off
  s       show status
  retry   save a recording whose save failed
  q       quit";

/// Start recording in the background
pub fn start_recording(controller: &SessionController) -> Result<(), ErrorResponse> {
    controller.start()?;
    Ok(())
}

/// Stop recording and save it under `name`, or the next default name
pub async fn stop_recording(
    controller: &SessionController,
    name: Option<String>,
) -> Result<FinalArtifact, ErrorResponse> {
    Ok(controller.stop(name).await?)
}

/// Pause or resume; returns the new state
pub async fn pause_recording(controller: &SessionController) -> Result<SessionState, ErrorResponse> {
    Ok(controller.pause().await?)
}

pub async fn toggle_audio(controller: &SessionController) -> Result<bool, ErrorResponse> {
    Ok(controller.toggle_audio().await?)
}

pub async fn toggle_camera(controller: &SessionController) -> Result<bool, ErrorResponse> {
    Ok(controller.toggle_camera().await?)
}

pub async fn retry_save(
    controller: &SessionController,
    name: Option<String>,
) -> Result<FinalArtifact, ErrorResponse> {
    Ok(controller.retry_save(name).await?)
}

pub fn get_recording_status(controller: &SessionController) -> SessionStatus {
    controller.status()
}

/// Human-readable summary of a saved recording
pub fn describe_artifact(artifact: &FinalArtifact) -> String {
    let mut text = format!("Saved {}", artifact.path.display());
    if let Some(media) = &artifact.media {
        text.push_str(&format!(
            "\n  {:.1}s, {}x{} @ {:.0}fps, video {}, audio {}",
            media.duration_secs,
            media.width,
            media.height,
            media.fps,
            media.video_codec,
            media.audio_codec.as_deref().unwrap_or("none")
        ));
    }
    for companion in &artifact.companions {
        text.push_str(&format!("\n  also saved {}", companion.display()));
    }
    text
}

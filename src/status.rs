//! Periodic status ticker
//!
//! Polls the controller's read-only snapshot on a fixed period and hands it to
//! a callback. The controller itself never schedules display updates.

use crate::recorder::{SessionController, SessionState, SessionStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Owns the ticker task; the task stops when this is dropped
pub struct StatusReporter {
    handle: JoinHandle<()>,
}

impl StatusReporter {
    pub fn spawn<F>(controller: Arc<SessionController>, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(&SessionStatus) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                on_tick(&controller.status());
            }
        });
        Self { handle }
    }
}

impl Drop for StatusReporter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One-line status, e.g. `REC 00:01:05 | 12.4 MB | mic hw:0,7 | cam off`
pub fn format_status(status: &SessionStatus) -> String {
    let label = match status.state {
        SessionState::Recording => "REC",
        SessionState::Paused => "PAUSED",
        SessionState::Stopped => "SAVING",
        SessionState::Idle => "IDLE",
    };
    let mic = match (&status.audio_device, status.audio_enabled) {
        (Some(device), _) => format!("mic {}", device),
        (None, true) => "mic on".to_string(),
        (None, false) => "mic off".to_string(),
    };
    format!(
        "{} {} | {} | {} | cam {}",
        label,
        format_duration(status.elapsed),
        format_bytes(status.video_bytes),
        mic,
        if status.camera_enabled { "on" } else { "off" }
    )
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

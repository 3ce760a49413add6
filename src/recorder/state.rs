//! Recording state management
//!
//! Defines the session state machine, the pause-aware session clock and the
//! read-only snapshots handed to status consumers.

use crate::capture::TrackKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Current state of the recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Video and audio are suspended
    Paused,
    /// Capture finished, save flow running
    Stopped,
}

impl SessionState {
    /// Recording or paused
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Recording | SessionState::Paused)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Recording => write!(f, "Recording"),
            SessionState::Paused => write!(f, "Paused"),
            SessionState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// One uninterrupted stretch of recording
///
/// A new span starts each time recording is resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSpan {
    /// Span index (0, 1, 2, ...)
    pub index: usize,

    /// Duration of this span in milliseconds
    pub duration_ms: f64,

    /// Process time when the span started (relative to session start)
    pub process_time_start_ms: f64,

    /// Process time when the span ended
    pub process_time_end_ms: f64,

    /// Unix timestamp when the span started
    pub unix_start_ms: u64,

    /// Unix timestamp when the span ended
    pub unix_end_ms: u64,
}

impl RecordingSpan {
    /// Create a new span starting now
    pub fn new(index: usize, process_time_ms: f64) -> Self {
        let now = Utc::now();
        Self {
            index,
            duration_ms: 0.0,
            process_time_start_ms: process_time_ms,
            process_time_end_ms: process_time_ms,
            unix_start_ms: now.timestamp_millis() as u64,
            unix_end_ms: now.timestamp_millis() as u64,
        }
    }

    /// End the span
    pub fn end(&mut self, process_time_ms: f64) {
        self.process_time_end_ms = process_time_ms;
        self.duration_ms = self.process_time_end_ms - self.process_time_start_ms;
        self.unix_end_ms = Utc::now().timestamp_millis() as u64;
    }
}

/// Elapsed-time bookkeeping for one recording run
///
/// `start_time` is fixed for the run. Elapsed time is the sum of the recording
/// spans, so paused intervals do not count.
#[derive(Debug, Default)]
pub struct SessionClock {
    start_time: Option<DateTime<Utc>>,
    origin: Option<Instant>,
    spans: Vec<RecordingSpan>,
    running: bool,
}

impl SessionClock {
    fn process_time_ms(&self) -> f64 {
        self.origin
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    pub fn start(&mut self) {
        self.start_time = Some(Utc::now());
        self.origin = Some(Instant::now());
        self.spans = vec![RecordingSpan::new(0, 0.0)];
        self.running = true;
    }

    pub fn pause(&mut self) {
        if !self.running {
            return;
        }
        let now = self.process_time_ms();
        if let Some(span) = self.spans.last_mut() {
            span.end(now);
        }
        self.running = false;
    }

    pub fn resume(&mut self) {
        if self.running || self.origin.is_none() {
            return;
        }
        let span = RecordingSpan::new(self.spans.len(), self.process_time_ms());
        self.spans.push(span);
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.pause();
    }

    /// Wall-clock start of the run
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn spans(&self) -> &[RecordingSpan] {
        &self.spans
    }

    /// Recorded time, excluding pauses
    pub fn elapsed(&self) -> Duration {
        let closed: f64 = if self.running {
            self.spans
                .iter()
                .take(self.spans.len().saturating_sub(1))
                .map(|s| s.duration_ms)
                .sum()
        } else {
            self.spans.iter().map(|s| s.duration_ms).sum()
        };

        let current = if self.running {
            self.spans
                .last()
                .map(|s| self.process_time_ms() - s.process_time_start_ms)
                .unwrap_or(0.0)
        } else {
            0.0
        };

        Duration::from_secs_f64(((closed + current) / 1000.0).max(0.0))
    }
}

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Video capture confirmed running
    Started,
    /// Video and audio suspended
    Paused,
    /// Video and audio continued
    Resumed,
    /// All capture processes terminated, save flow starting
    Stopped,
    /// A track's capture process started
    TrackStarted { kind: TrackKind, path: PathBuf },
    /// A track's capture process was terminated mid-session
    TrackStopped { kind: TrackKind },
    /// Degraded but non-fatal condition
    Warning(String),
    /// Final recording written
    Saved(PathBuf),
    /// Error occurred
    Error(String),
}

/// Read-only view of the session for status displays
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: SessionState,
    /// Identifier of the current recording run
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed: Duration,
    /// Temp file of the running screen capture
    pub video_path: Option<PathBuf>,
    /// Current size of the video temp file in bytes
    pub video_bytes: u64,
    pub audio_enabled: bool,
    /// Device the microphone track is capturing from
    pub audio_device: Option<String>,
    pub camera_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_span_end_sets_duration() {
        let mut span = RecordingSpan::new(2, 1000.0);
        span.end(1750.0);
        assert_eq!(span.index, 2);
        assert_eq!(span.duration_ms, 750.0);
        assert!(span.unix_end_ms >= span.unix_start_ms);
    }

    #[test]
    fn test_clock_excludes_paused_time() {
        let mut clock = SessionClock::default();
        assert_eq!(clock.elapsed(), Duration::ZERO);

        clock.start();
        sleep(Duration::from_millis(40));
        clock.pause();
        let at_pause = clock.elapsed();
        assert!(at_pause >= Duration::from_millis(40));

        sleep(Duration::from_millis(300));
        assert_eq!(clock.elapsed(), at_pause);

        clock.resume();
        sleep(Duration::from_millis(20));
        clock.stop();
        let total = clock.elapsed();
        assert!(total >= at_pause + Duration::from_millis(20));
        assert!(total < at_pause + Duration::from_millis(300));
        assert_eq!(clock.spans().len(), 2);
        assert!(clock.start_time().is_some());
    }

    #[test]
    fn test_resume_without_start_is_ignored() {
        let mut clock = SessionClock::default();
        clock.resume();
        assert!(clock.spans().is_empty());
    }

    #[test]
    fn test_active_states() {
        assert!(SessionState::Recording.is_active());
        assert!(SessionState::Paused.is_active());
        assert!(!SessionState::Idle.is_active());
        assert!(!SessionState::Stopped.is_active());
    }
}

//! Recording session
//!
//! This module implements the session side of the recorder:
//! - `SessionController` owning the capture processes and the state machine
//! - `TrackStore` for temp and final file naming
//! - `Track` bookkeeping of takes per capture channel

pub mod controller;
pub mod settings;
pub mod state;
pub mod store;
pub mod track;

pub use controller::{SessionController, SessionError, SessionResult};
pub use settings::CaptureSettings;
pub use state::{RecordingSpan, SessionClock, SessionEvent, SessionState, SessionStatus};
pub use store::TrackStore;
pub use track::Track;

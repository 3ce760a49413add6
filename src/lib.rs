//! screenrecord - screen, microphone and webcam recording sessions.
//!
//! This is the library crate behind the `screenrecord` binary. It drives
//! external capture programs through a session controller and muxes their
//! output into one final file per recording.

pub mod capture;
pub mod commands;
pub mod config;
pub mod export;
pub mod recorder;
pub mod status;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `level`; logs go to stderr so they never interleave
/// with console prompts on stdout.
pub fn init_tracing(level: Option<&str>) {
    let fallback = level.unwrap_or("screenrecord=info,screenrecord_lib=info");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

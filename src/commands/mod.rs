//! Front-end command handlers
//!
//! `recording` maps user commands onto the session controller and `console`
//! reads them from a terminal.

pub mod console;
pub mod recording;

pub use console::{describe_event, spawn_event_printer, Console};
pub use recording::ConsoleCommand;

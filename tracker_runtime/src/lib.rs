//! Shared runtime utilities for the tracker.
//!
//! This crate re-exports the decoded session contracts from `tracker_schema`
//! and carries the console command surface, so front-ends can parse and
//! forward commands without depending on the engine in `tracker_core`.

pub use tracker_schema::*;

mod command_text;
mod commands;

pub use command_text::{parse_command_line, CommandParseError};
pub use commands::{InventoryView, MapSelector, TrackerCommand};

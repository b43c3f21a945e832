//! Line-oriented tracker report.

use serde::{Deserialize, Serialize};

pub const BANNER: &str = concat!("Tracker v", env!("CARGO_PKG_VERSION"), " Initializing");
pub const FAILED_MESSAGE: &str = "Check Player files for error";
pub const NO_WORLD_MESSAGE: &str =
    "Internal world was not able to be generated, check your player files and relaunch";
pub const UNLISTED_PLAYER_MESSAGE: &str = "Player's file not in tracker's list";

pub fn item_not_created(item: impl std::fmt::Display) -> String {
    format!("Item id {item} not able to be created")
}

pub fn location_failed(location: &str) -> String {
    format!("ERROR: location {location} broke something, check the game definition")
}

pub fn all_checked(checked: usize) -> String {
    format!("All {checked} accessible locations have been checked! Congrats!")
}

/// How reachable locations are written to the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// `Region | Location`
    #[default]
    Both,
    Location,
    /// One line per region holding something reachable.
    Region,
}

impl OutputFormat {
    pub fn from_flags(include_location_name: bool, include_region_name: bool) -> Self {
        match (include_location_name, include_region_name) {
            (true, true) => OutputFormat::Both,
            (true, false) => OutputFormat::Location,
            (false, _) => OutputFormat::Region,
        }
    }
}

/// Receiver of report lines. `resort` asks the sink to keep its lines sorted.
pub trait ReportSink: Send {
    fn clear(&mut self);
    fn add_line(&mut self, text: &str, resort: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLog {
    lines: Vec<String>,
}

impl Default for ReportLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportLog {
    /// A log holding only the start-up banner.
    pub fn new() -> Self {
        Self {
            lines: vec![BANNER.to_string()],
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, text: &str) -> bool {
        self.lines.iter().any(|line| line == text)
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl ReportSink for ReportLog {
    fn clear(&mut self) {
        self.lines.clear();
    }

    fn add_line(&mut self, text: &str, resort: bool) {
        self.lines.push(text.to_string());
        if resort {
            self.lines.sort();
        }
    }
}

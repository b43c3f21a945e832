use std::fmt;

use serde::{Deserialize, Serialize};

/// Which slice of the current inventory an inventory command lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryView {
    /// Every received item that has a server code.
    All,
    /// Items classified as progression (including skip-balancing).
    Progression,
    /// Event items granted by event locations.
    Events,
}

/// How a map is picked out of the loaded map catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapSelector {
    Index(usize),
    Name(String),
}

impl fmt::Display for MapSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapSelector::Index(index) => write!(f, "#{index}"),
            MapSelector::Name(name) => f.write_str(name),
        }
    }
}

/// Console commands accepted by a running tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerCommand {
    Inventory(InventoryView),
    ManuallyCollect { item: String },
    ResetManuallyCollect,
    LoadMap(MapSelector),
    ListMaps,
    Refresh,
    Quit,
}

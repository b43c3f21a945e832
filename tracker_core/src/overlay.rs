//! Map coordinate overlay.
//!
//! A map binds pins at `(x, y)` to one or more location names. After every
//! cycle each pin of the active map is recoloured from its locations.

use std::{
    collections::{HashMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracker_runtime::MapSelector;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("failed to read map catalog from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse map catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no map named '{0}'")]
    UnknownMap(String),
    #[error("map index {index} is out of range ({available} maps loaded)")]
    IndexOutOfRange { index: usize, available: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapPin {
    pub x: i32,
    pub y: i32,
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDefinition {
    pub name: String,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default = "default_pin_size")]
    pub location_size: u32,
    #[serde(default)]
    pub locations: Vec<MapPin>,
}

fn default_pin_size() -> u32 {
    20
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct MapCatalog {
    maps: Vec<MapDefinition>,
}

impl MapCatalog {
    pub fn new(maps: Vec<MapDefinition>) -> Self {
        Self { maps }
    }

    pub fn from_json_str(json: &str) -> Result<Self, OverlayError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, OverlayError> {
        let contents = fs::read_to_string(path).map_err(|source| OverlayError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn maps(&self) -> &[MapDefinition] {
        &self.maps
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn select(&self, selector: &MapSelector) -> Result<usize, OverlayError> {
        match selector {
            MapSelector::Index(index) if *index < self.maps.len() => Ok(*index),
            MapSelector::Index(index) => Err(OverlayError::IndexOutOfRange {
                index: *index,
                available: self.maps.len(),
            }),
            MapSelector::Name(name) => self
                .maps
                .iter()
                .position(|map| &map.name == name)
                .ok_or_else(|| OverlayError::UnknownMap(name.clone())),
        }
    }
}

/// Per-location status fed into the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationStatus {
    Checked,
    InLogic,
    OutOfLogic,
}

/// Colour of one pin, most interesting first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PinStatus {
    Mixed,
    InLogic,
    OutOfLogic,
    /// Nothing left to do, or nothing known.
    Cleared,
}

pub fn pin_status(statuses: impl IntoIterator<Item = LocationStatus>) -> PinStatus {
    let (mut in_logic, mut out_of_logic) = (false, false);
    for status in statuses {
        match status {
            LocationStatus::InLogic => in_logic = true,
            LocationStatus::OutOfLogic => out_of_logic = true,
            LocationStatus::Checked => {}
        }
    }
    match (in_logic, out_of_logic) {
        (true, true) => PinStatus::Mixed,
        (true, false) => PinStatus::InLogic,
        (false, true) => PinStatus::OutOfLogic,
        (false, false) => PinStatus::Cleared,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinUpdate {
    pub x: i32,
    pub y: i32,
    pub status: PinStatus,
    pub locations: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Overlay {
    catalog: MapCatalog,
    active: Option<usize>,
    unknown_warned: HashSet<(usize, String)>,
}

impl Overlay {
    pub fn new(catalog: MapCatalog) -> Self {
        Self {
            catalog,
            active: None,
            unknown_warned: HashSet::new(),
        }
    }

    pub fn catalog(&self) -> &MapCatalog {
        &self.catalog
    }

    /// `"<index>: <name>"` per loaded map.
    pub fn list_maps(&self) -> Vec<String> {
        self.catalog
            .maps()
            .iter()
            .enumerate()
            .map(|(index, map)| format!("{index}: {}", map.name))
            .collect()
    }

    pub fn load_map(&mut self, selector: &MapSelector) -> Result<&MapDefinition, OverlayError> {
        let index = self.catalog.select(selector)?;
        self.active = Some(index);
        let map = &self.catalog.maps()[index];
        tracing::info!(target: "tracker::overlay", map = %map.name, index, "overlay.map_loaded");
        Ok(map)
    }

    pub fn active_map(&self) -> Option<&MapDefinition> {
        self.active.map(|index| &self.catalog.maps()[index])
    }

    /// Recolour every pin of the active map. Location names missing from
    /// `statuses` are skipped and warned about once per map.
    pub fn refresh(&mut self, statuses: &HashMap<String, LocationStatus>) -> Vec<PinUpdate> {
        let Some(index) = self.active else {
            return Vec::new();
        };
        let map = &self.catalog.maps[index];
        let mut updates = Vec::with_capacity(map.locations.len());
        for pin in &map.locations {
            let mut known = Vec::with_capacity(pin.locations.len());
            for name in &pin.locations {
                match statuses.get(name) {
                    Some(&status) => known.push(status),
                    None => {
                        if self.unknown_warned.insert((index, name.clone())) {
                            tracing::warn!(
                                target: "tracker::overlay",
                                map = %map.name,
                                location = %name,
                                x = pin.x,
                                y = pin.y,
                                "overlay.unknown_location"
                            );
                        }
                    }
                }
            }
            updates.push(PinUpdate {
                x: pin.x,
                y: pin.y,
                status: pin_status(known),
                locations: pin.locations.clone(),
            });
        }
        updates
    }
}

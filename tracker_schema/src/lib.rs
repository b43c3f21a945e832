//! Decoded session payloads consumed by the tracker.
//!
//! These mirror the packets a multiworld server pushes to a connected client
//! after the transport layer has decoded them. Nothing here performs I/O; the
//! engine in `tracker_core` only ever sees these already-decoded values.

use std::collections::HashMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Classification bits carried alongside an item on the wire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ItemFlags: u8 {
        const PROGRESSION = 0b001;
        const USEFUL = 0b010;
        const TRAP = 0b100;
    }
}

/// Key under which the server stores the hint list for one slot.
pub fn hint_storage_key(team: u32, slot: u32) -> String {
    format!("_read_hints_{team}_{slot}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkItem {
    pub item: i64,
    pub location: i64,
    pub player: u32,
    #[serde(default)]
    pub flags: u8,
}

impl NetworkItem {
    pub fn item_flags(&self) -> ItemFlags {
        ItemFlags::from_bits_truncate(self.flags)
    }
}

/// A server-declared hint revealing where an item sits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hint {
    pub receiving_player: u32,
    pub finding_player: u32,
    pub location: i64,
    pub item: i64,
    pub found: bool,
    #[serde(default)]
    pub entrance: String,
    #[serde(default)]
    pub item_flags: u8,
}

impl Hint {
    pub fn item_flags(&self) -> ItemFlags {
        ItemFlags::from_bits_truncate(self.item_flags)
    }

    /// Entrance label shown to the player; empty entrances are vanilla.
    pub fn entrance_label(&self) -> &str {
        if self.entrance.is_empty() {
            "Vanilla"
        } else {
            &self.entrance
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotInfo {
    pub name: String,
    pub game: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectedPacket {
    pub team: u32,
    pub slot: u32,
    #[serde(default)]
    pub slot_info: HashMap<String, SlotInfo>,
    #[serde(default)]
    pub slot_data: serde_json::Value,
    #[serde(default)]
    pub checked_locations: Vec<i64>,
    #[serde(default)]
    pub missing_locations: Vec<i64>,
}

impl ConnectedPacket {
    /// Slot info for the connected slot itself.
    pub fn own_slot(&self) -> Option<&SlotInfo> {
        self.slot_info.get(&self.slot.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomUpdatePacket {
    #[serde(default)]
    pub checked_locations: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceivedItemsPacket {
    pub index: usize,
    pub items: Vec<NetworkItem>,
}

/// Reply to a stored-data write or watch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetReplyPacket {
    pub key: String,
    pub value: serde_json::Value,
}

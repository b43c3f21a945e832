//! Session buffers fed by the transport layer.
//!
//! The network side writes decoded packets into a [`SessionFeed`]; the update
//! cycle reads a [`SessionState`] snapshot at its start. Every write raises the
//! change signal.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracker_schema::{
    hint_storage_key, ConnectedPacket, Hint, NetworkItem, ReceivedItemsPacket, RoomUpdatePacket,
    SetReplyPacket, SlotInfo,
};

use crate::{error::GenerationError, scheduler::ChangeSignal};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub connected: bool,
    pub team: u32,
    pub slot: u32,
    pub slot_info: HashMap<String, SlotInfo>,
    pub slot_data: serde_json::Value,
    pub items_received: Vec<NetworkItem>,
    pub checked_locations: BTreeSet<i64>,
    pub missing_locations: BTreeSet<i64>,
    pub stored_data: HashMap<String, serde_json::Value>,
}

impl SessionState {
    pub fn apply_connected(&mut self, packet: &ConnectedPacket) {
        self.connected = true;
        self.team = packet.team;
        self.slot = packet.slot;
        self.slot_info = packet.slot_info.clone();
        self.slot_data = packet.slot_data.clone();
        self.checked_locations = packet.checked_locations.iter().copied().collect();
        self.missing_locations = packet.missing_locations.iter().copied().collect();
        self.items_received.clear();
    }

    /// Index 0 replaces the list. Otherwise only items past what is already
    /// held are appended, so a resent tail is not counted twice.
    pub fn apply_received_items(&mut self, packet: &ReceivedItemsPacket) {
        if packet.index == 0 {
            self.items_received = packet.items.clone();
            return;
        }
        let held = self.items_received.len();
        if packet.index > held {
            tracing::warn!(
                target: "tracker::session",
                index = packet.index,
                held,
                "received_items.gap"
            );
        }
        let skip = held.saturating_sub(packet.index);
        self.items_received
            .extend(packet.items.iter().skip(skip).cloned());
    }

    pub fn apply_room_update(&mut self, packet: &RoomUpdatePacket) {
        for &location in &packet.checked_locations {
            self.missing_locations.remove(&location);
            self.checked_locations.insert(location);
        }
    }

    pub fn set_stored(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.stored_data.insert(key.into(), value);
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn slot_name(&self) -> Option<&str> {
        self.own_slot().map(|slot| slot.name.as_str())
    }

    pub fn own_slot(&self) -> Option<&SlotInfo> {
        self.slot_info.get(&self.slot.to_string())
    }

    pub fn hint_key(&self) -> String {
        hint_storage_key(self.team, self.slot)
    }

    /// Hints stored for this slot. `None` when the server has sent none.
    pub fn hints(&self) -> Option<Result<Vec<Hint>, serde_json::Error>> {
        self.stored_data
            .get(&self.hint_key())
            .map(|value| serde_json::from_value(value.clone()))
    }
}

/// A decoded packet as it arrives from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum SessionEvent {
    Connected(ConnectedPacket),
    ReceivedItems(ReceivedItemsPacket),
    RoomUpdate(RoomUpdatePacket),
    SetReply(SetReplyPacket),
    Disconnected,
}

/// Shared, signalling handle on the session buffers.
#[derive(Debug, Clone, Default)]
pub struct SessionFeed {
    state: Arc<RwLock<SessionState>>,
    signal: ChangeSignal,
}

impl SessionFeed {
    pub fn new(signal: ChangeSignal) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            signal,
        }
    }

    pub fn signal(&self) -> &ChangeSignal {
        &self.signal
    }

    pub fn apply(&self, event: &SessionEvent) {
        {
            let mut state = self.state.write();
            match event {
                SessionEvent::Connected(packet) => state.apply_connected(packet),
                SessionEvent::ReceivedItems(packet) => state.apply_received_items(packet),
                SessionEvent::RoomUpdate(packet) => state.apply_room_update(packet),
                SessionEvent::SetReply(packet) => {
                    state.set_stored(packet.key.clone(), packet.value.clone())
                }
                SessionEvent::Disconnected => state.disconnect(),
            }
        }
        self.signal.notify();
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }
}

/// A recorded session replayed into a feed for headless runs and tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFixture {
    pub events: Vec<SessionEvent>,
}

impl SessionFixture {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, GenerationError> {
        let contents = fs::read_to_string(path).map_err(|source| GenerationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents).map_err(|source| GenerationError::Parse {
            path: PathBuf::from(path),
            source,
        })
    }

    pub fn replay(&self, feed: &SessionFeed) {
        for event in &self.events {
            feed.apply(event);
        }
    }

    /// Fold every event into a fresh state without a feed.
    pub fn to_state(&self) -> SessionState {
        let feed = SessionFeed::new(ChangeSignal::new());
        self.replay(&feed);
        feed.snapshot()
    }
}

//! Region graph model: regions, guarded entrances and locations per player.
//!
//! The graph is assembled once per session through [`WorldGraphBuilder`] and
//! is immutable afterwards, so any number of collection states may read it
//! concurrently without locking.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    catalog::{GameCatalog, GameData, ItemDefinition},
    error::{GraphError, LookupError},
    predicate::{always, Rule},
};

/// Slot number of a player in the multiworld.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntranceId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressType {
    #[default]
    Default,
    Priority,
    Excluded,
}

/// What checking a location yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationKind {
    /// Reported to the server under this address when checked.
    Checkable(i64),
    /// Grants the named item automatically once reachable; never reported.
    Event(String),
}

impl LocationKind {
    pub fn address(&self) -> Option<i64> {
        match self {
            LocationKind::Checkable(address) => Some(*address),
            LocationKind::Event(_) => None,
        }
    }

    pub fn event_item(&self) -> Option<&str> {
        match self {
            LocationKind::Checkable(_) => None,
            LocationKind::Event(item) => Some(item),
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, LocationKind::Event(_))
    }
}

#[derive(Debug)]
pub struct Region {
    pub name: String,
    pub player: PlayerId,
    pub exits: Vec<EntranceId>,
    pub entrances: Vec<EntranceId>,
    pub locations: Vec<LocationId>,
}

#[derive(Debug)]
pub struct Entrance {
    pub name: String,
    pub player: PlayerId,
    pub source: RegionId,
    pub target: RegionId,
    pub rule: Rule,
}

#[derive(Debug)]
pub struct Location {
    pub name: String,
    pub player: PlayerId,
    pub region: RegionId,
    pub kind: LocationKind,
    pub rule: Rule,
    pub progress_type: ProgressType,
}

/// Per-player slice of the graph.
#[derive(Debug)]
pub struct PlayerWorld {
    pub id: PlayerId,
    pub name: String,
    pub game: String,
    pub start_region: RegionId,
    regions: Vec<RegionId>,
    locations: Vec<LocationId>,
    precollected: Vec<String>,
    event_items: HashSet<String>,
}

impl PlayerWorld {
    pub fn regions(&self) -> &[RegionId] {
        &self.regions
    }

    pub fn locations(&self) -> &[LocationId] {
        &self.locations
    }

    /// Items every fresh collection state starts out holding.
    pub fn precollected(&self) -> &[String] {
        &self.precollected
    }

    pub fn is_event_item(&self, item: &str) -> bool {
        self.event_items.contains(item)
    }
}

#[derive(Debug)]
pub struct WorldGraph {
    catalog: Arc<GameCatalog>,
    players: BTreeMap<PlayerId, PlayerWorld>,
    regions: Vec<Region>,
    entrances: Vec<Entrance>,
    locations: Vec<Location>,
    region_index: HashMap<(PlayerId, String), RegionId>,
    entrance_index: HashMap<(PlayerId, String), EntranceId>,
    location_index: HashMap<(PlayerId, String), LocationId>,
    address_index: HashMap<(PlayerId, i64), LocationId>,
}

impl WorldGraph {
    pub fn catalog(&self) -> &GameCatalog {
        &self.catalog
    }

    pub fn player(&self, player: PlayerId) -> Result<&PlayerWorld, LookupError> {
        self.players
            .get(&player)
            .ok_or(LookupError::UnknownPlayer(player))
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerWorld> {
        self.players.values()
    }

    /// Lowest-numbered player whose slot name matches `name`.
    pub fn player_by_name(&self, name: &str) -> Option<PlayerId> {
        self.players
            .values()
            .find(|world| world.name == name)
            .map(|world| world.id)
    }

    pub fn game_data(&self, player: PlayerId) -> Result<&GameData, LookupError> {
        let world = self.player(player)?;
        self.catalog.game(&world.game)
    }

    /// Catalog definition for `item`, or `None` for an event item that only
    /// exists inside the graph.
    pub fn item_definition(
        &self,
        item: &str,
        player: PlayerId,
    ) -> Result<Option<&ItemDefinition>, LookupError> {
        let world = self.player(player)?;
        let data = self.catalog.game(&world.game)?;
        match data.item(item) {
            Ok(definition) => Ok(Some(definition)),
            Err(_) if world.is_event_item(item) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0]
    }

    pub fn entrance(&self, id: EntranceId) -> &Entrance {
        &self.entrances[id.0]
    }

    pub fn location(&self, id: LocationId) -> &Location {
        &self.locations[id.0]
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// All locations of all players in insertion order.
    pub fn locations(&self) -> impl Iterator<Item = (LocationId, &Location)> {
        self.locations
            .iter()
            .enumerate()
            .map(|(index, location)| (LocationId(index), location))
    }

    pub fn region_id(&self, player: PlayerId, name: &str) -> Result<RegionId, LookupError> {
        self.region_index
            .get(&(player, name.to_string()))
            .copied()
            .ok_or_else(|| LookupError::UnknownRegion {
                player,
                name: name.to_string(),
            })
    }

    pub fn entrance_id(&self, player: PlayerId, name: &str) -> Result<EntranceId, LookupError> {
        self.entrance_index
            .get(&(player, name.to_string()))
            .copied()
            .ok_or_else(|| LookupError::UnknownEntrance {
                player,
                name: name.to_string(),
            })
    }

    pub fn location_id(&self, player: PlayerId, name: &str) -> Result<LocationId, LookupError> {
        self.location_index
            .get(&(player, name.to_string()))
            .copied()
            .ok_or_else(|| LookupError::UnknownLocation {
                player,
                name: name.to_string(),
            })
    }

    pub fn location_by_address(&self, player: PlayerId, address: i64) -> Option<LocationId> {
        self.address_index.get(&(player, address)).copied()
    }
}

#[derive(Debug)]
struct PlayerDraft {
    name: String,
    game: String,
    start_region: Option<RegionId>,
    regions: Vec<RegionId>,
    locations: Vec<LocationId>,
    precollected: Vec<String>,
    event_items: HashSet<String>,
}

/// Incremental construction of a [`WorldGraph`].
#[derive(Debug)]
pub struct WorldGraphBuilder {
    catalog: Arc<GameCatalog>,
    players: BTreeMap<PlayerId, PlayerDraft>,
    regions: Vec<Region>,
    entrances: Vec<Entrance>,
    locations: Vec<Location>,
    region_index: HashMap<(PlayerId, String), RegionId>,
    entrance_index: HashMap<(PlayerId, String), EntranceId>,
    location_index: HashMap<(PlayerId, String), LocationId>,
}

impl WorldGraphBuilder {
    pub fn new(catalog: Arc<GameCatalog>) -> Self {
        Self {
            catalog,
            players: BTreeMap::new(),
            regions: Vec::new(),
            entrances: Vec::new(),
            locations: Vec::new(),
            region_index: HashMap::new(),
            entrance_index: HashMap::new(),
            location_index: HashMap::new(),
        }
    }

    pub fn add_player(
        &mut self,
        player: PlayerId,
        name: impl Into<String>,
        game: impl Into<String>,
    ) -> Result<(), GraphError> {
        let game = game.into();
        self.catalog.game(&game)?;
        if self.players.contains_key(&player) {
            return Err(GraphError::DuplicatePlayer(player));
        }
        self.players.insert(
            player,
            PlayerDraft {
                name: name.into(),
                game,
                start_region: None,
                regions: Vec::new(),
                locations: Vec::new(),
                precollected: Vec::new(),
                event_items: HashSet::new(),
            },
        );
        Ok(())
    }

    /// Add a region. The first region added for a player is its start region
    /// unless [`set_start_region`](Self::set_start_region) says otherwise.
    pub fn add_region(
        &mut self,
        player: PlayerId,
        name: impl Into<String>,
    ) -> Result<RegionId, GraphError> {
        let name = name.into();
        let draft = self
            .players
            .get_mut(&player)
            .ok_or(LookupError::UnknownPlayer(player))?;
        let key = (player, name.clone());
        if self.region_index.contains_key(&key) {
            return Err(GraphError::DuplicateRegion { player, name });
        }
        let id = RegionId(self.regions.len());
        self.regions.push(Region {
            name,
            player,
            exits: Vec::new(),
            entrances: Vec::new(),
            locations: Vec::new(),
        });
        self.region_index.insert(key, id);
        draft.regions.push(id);
        draft.start_region.get_or_insert(id);
        Ok(id)
    }

    pub fn set_start_region(&mut self, player: PlayerId, region: RegionId) -> Result<(), GraphError> {
        let draft = self
            .players
            .get_mut(&player)
            .ok_or(LookupError::UnknownPlayer(player))?;
        draft.start_region = Some(region);
        Ok(())
    }

    pub fn connect(
        &mut self,
        source: RegionId,
        target: RegionId,
        name: impl Into<String>,
        rule: Rule,
    ) -> Result<EntranceId, GraphError> {
        let name = name.into();
        let player = self.regions[source.0].player;
        if self.regions[target.0].player != player {
            return Err(GraphError::CrossPlayerEntrance { name });
        }
        let key = (player, name.clone());
        if self.entrance_index.contains_key(&key) {
            return Err(GraphError::DuplicateEntrance { player, name });
        }
        let id = EntranceId(self.entrances.len());
        self.entrance_index.insert(key, id);
        self.entrances.push(Entrance {
            name,
            player,
            source,
            target,
            rule,
        });
        self.regions[source.0].exits.push(id);
        self.regions[target.0].entrances.push(id);
        Ok(id)
    }

    pub fn add_location(
        &mut self,
        region: RegionId,
        name: impl Into<String>,
        kind: LocationKind,
        rule: Rule,
    ) -> Result<LocationId, GraphError> {
        let name = name.into();
        let player = self.regions[region.0].player;
        let key = (player, name.clone());
        if self.location_index.contains_key(&key) {
            return Err(GraphError::DuplicateLocation { player, name });
        }
        let draft = self
            .players
            .get_mut(&player)
            .ok_or(LookupError::UnknownPlayer(player))?;
        if let LocationKind::Event(item) = &kind {
            draft.event_items.insert(item.clone());
        }
        let id = LocationId(self.locations.len());
        self.locations.push(Location {
            name,
            player,
            region,
            kind,
            rule,
            progress_type: ProgressType::Default,
        });
        self.location_index.insert(key, id);
        self.regions[region.0].locations.push(id);
        draft.locations.push(id);
        Ok(id)
    }

    /// Add a location with no guard.
    pub fn add_open_location(
        &mut self,
        region: RegionId,
        name: impl Into<String>,
        kind: LocationKind,
    ) -> Result<LocationId, GraphError> {
        self.add_location(region, name, kind, always())
    }

    pub fn set_location_rule(&mut self, location: LocationId, rule: Rule) {
        self.locations[location.0].rule = rule;
    }

    pub fn set_progress_type(&mut self, location: LocationId, progress_type: ProgressType) {
        self.locations[location.0].progress_type = progress_type;
    }

    pub fn progress_type(&self, location: LocationId) -> ProgressType {
        self.locations[location.0].progress_type
    }

    pub fn precollect(&mut self, player: PlayerId, item: impl Into<String>) -> Result<(), GraphError> {
        let item = item.into();
        let draft = self
            .players
            .get(&player)
            .ok_or(LookupError::UnknownPlayer(player))?;
        if !draft.event_items.contains(&item) {
            self.catalog.game(&draft.game)?.item(&item)?;
        }
        if let Some(draft) = self.players.get_mut(&player) {
            draft.precollected.push(item);
        }
        Ok(())
    }

    pub fn region_id(&self, player: PlayerId, name: &str) -> Result<RegionId, LookupError> {
        self.region_index
            .get(&(player, name.to_string()))
            .copied()
            .ok_or_else(|| LookupError::UnknownRegion {
                player,
                name: name.to_string(),
            })
    }

    pub fn location_id(&self, player: PlayerId, name: &str) -> Result<LocationId, LookupError> {
        self.location_index
            .get(&(player, name.to_string()))
            .copied()
            .ok_or_else(|| LookupError::UnknownLocation {
                player,
                name: name.to_string(),
            })
    }

    pub fn build(self) -> Result<WorldGraph, GraphError> {
        let mut players = BTreeMap::new();
        for (id, draft) in self.players {
            let start_region = draft
                .start_region
                .ok_or(GraphError::MissingStartRegion(id))?;
            players.insert(
                id,
                PlayerWorld {
                    id,
                    name: draft.name,
                    game: draft.game,
                    start_region,
                    regions: draft.regions,
                    locations: draft.locations,
                    precollected: draft.precollected,
                    event_items: draft.event_items,
                },
            );
        }

        let address_index = self
            .locations
            .iter()
            .enumerate()
            .filter_map(|(index, location)| {
                location
                    .kind
                    .address()
                    .map(|address| ((location.player, address), LocationId(index)))
            })
            .collect();

        Ok(WorldGraph {
            catalog: self.catalog,
            players,
            regions: self.regions,
            entrances: self.entrances,
            locations: self.locations,
            region_index: self.region_index,
            entrance_index: self.entrance_index,
            location_index: self.location_index,
            address_index,
        })
    }
}

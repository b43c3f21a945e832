//! World generation from game definitions and player files.
//!
//! Game definitions declare items, regions, exits and locations with rule
//! trees; player files name a slot, its game and its options. Generation turns
//! the pair into a [`WorldGraph`] without placing any items: tracking only
//! needs the graph and the rules.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    catalog::{GameCatalog, GameData, ItemDefinition},
    error::GenerationError,
    graph::{LocationKind, PlayerId, ProgressType, WorldGraph, WorldGraphBuilder},
    predicate::RuleSpec,
};

/// Authoritative settings from the server, keyed by game name.
pub type Passthrough = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitDefinition {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub rule: RuleSpec,
    /// Only created when every listed option has the given value.
    #[serde(default)]
    pub enabled_if: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDefinition {
    pub name: String,
    #[serde(default)]
    pub address: Option<i64>,
    #[serde(default)]
    pub event_item: Option<String>,
    #[serde(default)]
    pub rule: RuleSpec,
    #[serde(default)]
    pub enabled_if: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDefinition {
    pub name: String,
    #[serde(default)]
    pub exits: Vec<ExitDefinition>,
    #[serde(default)]
    pub locations: Vec<LocationDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDefinition {
    pub game: String,
    /// Defaults to the first region.
    #[serde(default)]
    pub start_region: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemDefinition>,
    pub regions: Vec<RegionDefinition>,
    /// Slot data keys that feed back into regeneration.
    #[serde(default)]
    pub slot_data_options: Vec<String>,
}

impl GameDefinition {
    pub fn game_data(&self) -> GameData {
        let mut data = GameData::new(self.game.clone());
        for item in &self.items {
            data.add_item(item.clone());
        }
        for region in &self.regions {
            for location in &region.locations {
                if let Some(address) = location.address {
                    data.add_location(location.name.clone(), address);
                }
            }
        }
        data
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    pub exclude_locations: BTreeSet<String>,
    pub priority_locations: BTreeSet<String>,
    pub start_inventory: BTreeMap<String, u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl PlayerOptions {
    /// Fields present in `overrides` replace ours; extra keys are merged.
    fn merged(&self, game: &str, overrides: &Value) -> Result<Self, GenerationError> {
        let parsed: PlayerOptions = serde_json::from_value(overrides.clone()).map_err(|source| {
            GenerationError::Passthrough {
                game: game.to_string(),
                source,
            }
        })?;
        let has = |key: &str| overrides.get(key).is_some();
        let mut merged = self.clone();
        if has("exclude_locations") {
            merged.exclude_locations = parsed.exclude_locations;
        }
        if has("priority_locations") {
            merged.priority_locations = parsed.priority_locations;
        }
        if has("start_inventory") {
            merged.start_inventory = parsed.start_inventory;
        }
        merged.extra.extend(parsed.extra);
        Ok(merged)
    }

    fn enables(&self, conditions: &BTreeMap<String, Value>) -> bool {
        conditions
            .iter()
            .all(|(key, value)| self.extra.get(key) == Some(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerFile {
    pub name: String,
    pub game: String,
    #[serde(default)]
    pub options: PlayerOptions,
}

/// The rule-authoring layer as seen by the tracker.
pub trait WorldGenerator: Send + Sync {
    fn generate(&self, passthrough: Option<&Passthrough>) -> Result<WorldGraph, GenerationError>;

    /// Slot data worth regenerating with, or `None` to keep the local world.
    fn interpret_slot_data(&self, player: PlayerId, slot_data: &Value) -> Option<Value>;
}

#[derive(Debug, Clone)]
pub struct DefinitionGenerator {
    catalog: Arc<GameCatalog>,
    definitions: BTreeMap<String, GameDefinition>,
    players: Vec<PlayerFile>,
}

impl DefinitionGenerator {
    pub fn new(definitions: Vec<GameDefinition>, players: Vec<PlayerFile>) -> Self {
        let catalog = build_catalog(&definitions);
        let definitions = definitions
            .into_iter()
            .map(|definition| (definition.game.clone(), definition))
            .collect();
        Self {
            catalog: Arc::new(catalog),
            definitions,
            players,
        }
    }

    pub fn from_dirs(games: &Path, players: &Path) -> Result<Self, GenerationError> {
        let definitions = load_game_definitions(games)?;
        let players = load_player_files(players)?;
        Ok(Self::new(definitions, players))
    }

    pub fn catalog(&self) -> &Arc<GameCatalog> {
        &self.catalog
    }

    pub fn players(&self) -> &[PlayerFile] {
        &self.players
    }

    fn player_file(&self, player: PlayerId) -> Option<&PlayerFile> {
        let index = usize::try_from(player.0).ok()?.checked_sub(1)?;
        self.players.get(index)
    }

    fn add_player(
        &self,
        builder: &mut WorldGraphBuilder,
        id: PlayerId,
        file: &PlayerFile,
        passthrough: Option<&Passthrough>,
    ) -> Result<(), GenerationError> {
        let definition =
            self.definitions
                .get(&file.game)
                .ok_or_else(|| GenerationError::UnknownGame {
                    player: file.name.clone(),
                    game: file.game.clone(),
                })?;
        let options = match passthrough.and_then(|values| values.get(&file.game)) {
            Some(overrides) => file.options.merged(&file.game, overrides)?,
            None => file.options.clone(),
        };

        builder.add_player(id, file.name.clone(), file.game.clone())?;
        for region in &definition.regions {
            builder.add_region(id, region.name.clone())?;
        }
        if let Some(start) = &definition.start_region {
            let region = builder.region_id(id, start).map_err(|_| GenerationError::UnknownRegion {
                game: definition.game.clone(),
                region: start.clone(),
            })?;
            builder.set_start_region(id, region)?;
        }

        for region in &definition.regions {
            let source = builder.region_id(id, &region.name)?;
            for exit in region.exits.iter().filter(|exit| options.enables(&exit.enabled_if)) {
                let target = builder.region_id(id, &exit.target).map_err(|_| {
                    GenerationError::UnknownRegion {
                        game: definition.game.clone(),
                        region: exit.target.clone(),
                    }
                })?;
                builder.connect(source, target, exit.name.clone(), exit.rule.compile())?;
            }
            for location in region
                .locations
                .iter()
                .filter(|location| options.enables(&location.enabled_if))
            {
                let kind = match (location.address, &location.event_item) {
                    (Some(address), _) => LocationKind::Checkable(address),
                    (None, Some(item)) => LocationKind::Event(item.clone()),
                    (None, None) => {
                        return Err(GenerationError::LocationWithoutKind {
                            game: definition.game.clone(),
                            location: location.name.clone(),
                        })
                    }
                };
                builder.add_location(source, location.name.clone(), kind, location.rule.compile())?;
            }
        }

        for name in &options.exclude_locations {
            let location = builder.location_id(id, name).map_err(|_| {
                GenerationError::UnknownExcludedLocation {
                    player: file.name.clone(),
                    location: name.clone(),
                }
            })?;
            builder.set_progress_type(location, ProgressType::Excluded);
        }
        for name in options.priority_locations.difference(&options.exclude_locations) {
            let location = builder.location_id(id, name).map_err(|_| {
                GenerationError::UnknownPriorityLocation {
                    player: file.name.clone(),
                    location: name.clone(),
                }
            })?;
            builder.set_progress_type(location, ProgressType::Priority);
        }

        // The server resends coded start items as received items.
        let data = self.catalog.game(&file.game)?;
        for (item, &count) in &options.start_inventory {
            if data.item(item)?.code.is_some() {
                continue;
            }
            for _ in 0..count {
                builder.precollect(id, item.clone())?;
            }
        }
        Ok(())
    }
}

impl WorldGenerator for DefinitionGenerator {
    fn generate(&self, passthrough: Option<&Passthrough>) -> Result<WorldGraph, GenerationError> {
        let mut builder = WorldGraphBuilder::new(Arc::clone(&self.catalog));
        for (index, file) in self.players.iter().enumerate() {
            let id = PlayerId(index as u32 + 1);
            self.add_player(&mut builder, id, file, passthrough)?;
        }
        let graph = builder.build()?;
        tracing::info!(
            target: "tracker::generation",
            players = self.players.len(),
            regions = graph.region_count(),
            passthrough = passthrough.is_some(),
            "world.generated"
        );
        Ok(graph)
    }

    fn interpret_slot_data(&self, player: PlayerId, slot_data: &Value) -> Option<Value> {
        let file = self.player_file(player)?;
        let definition = self.definitions.get(&file.game)?;
        let object = slot_data.as_object()?;
        let kept: serde_json::Map<String, Value> = definition
            .slot_data_options
            .iter()
            .filter_map(|key| object.get(key).map(|value| (key.clone(), value.clone())))
            .collect();
        if kept.is_empty() {
            None
        } else {
            Some(Value::Object(kept))
        }
    }
}

pub fn build_catalog(definitions: &[GameDefinition]) -> GameCatalog {
    let mut catalog = GameCatalog::new();
    for definition in definitions {
        catalog.insert(definition.game_data());
    }
    catalog
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, GenerationError> {
    let read_err = |source| GenerationError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, GenerationError> {
    let contents = fs::read_to_string(path).map_err(|source| GenerationError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| GenerationError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_game_definitions(dir: &Path) -> Result<Vec<GameDefinition>, GenerationError> {
    json_files(dir)?.iter().map(|path| read_json(path)).collect()
}

/// Player files in file-name order; slot numbers follow that order from 1.
pub fn load_player_files(dir: &Path) -> Result<Vec<PlayerFile>, GenerationError> {
    let players: Vec<PlayerFile> = json_files(dir)?
        .iter()
        .map(|path| read_json(path))
        .collect::<Result<_, _>>()?;
    if players.is_empty() {
        return Err(GenerationError::NoPlayers(dir.to_path_buf()));
    }
    Ok(players)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionState;
    use crate::error::{GraphError, LookupError};

    const GAME: &str = r#"{
        "game": "Test",
        "items": [
            {"name": "Key", "code": 1, "classification": "progression"},
            {"name": "Map", "classification": "useful"}
        ],
        "regions": [
            {"name": "Menu", "exits": [{"name": "Menu -> Hall", "target": "Hall", "rule": {"has": {"item": "Key"}}}],
             "locations": [
                {"name": "Well", "address": 10},
                {"name": "Secret", "address": 11, "enabled_if": {"secrets": true}}
             ]},
            {"name": "Hall", "locations": [
                {"name": "Chest", "address": 12},
                {"name": "Boss", "event_item": "Victory"}
             ]}
        ],
        "slot_data_options": ["secrets"]
    }"#;

    fn generator(options: PlayerOptions) -> DefinitionGenerator {
        let definition: GameDefinition = serde_json::from_str(GAME).unwrap();
        DefinitionGenerator::new(
            vec![definition],
            vec![PlayerFile {
                name: "Ana".into(),
                game: "Test".into(),
                options,
            }],
        )
    }

    #[test]
    fn generates_regions_locations_and_progress_types() {
        let mut options = PlayerOptions::default();
        options.exclude_locations.insert("Well".into());
        options.priority_locations.extend(["Well".to_string(), "Chest".to_string()]);
        let graph = generator(options).generate(None).unwrap();
        let p = PlayerId(1);

        let well = graph.location_id(p, "Well").unwrap();
        let chest = graph.location_id(p, "Chest").unwrap();
        assert_eq!(graph.location(well).progress_type, ProgressType::Excluded);
        assert_eq!(graph.location(chest).progress_type, ProgressType::Priority);
        assert!(graph.location_id(p, "Secret").is_err());
        assert!(graph.location(graph.location_id(p, "Boss").unwrap()).kind.is_event());
        assert_eq!(graph.catalog().game("Test").unwrap().location_id("Chest"), Some(12));
    }

    #[test]
    fn only_local_start_items_are_precollected() {
        let mut options = PlayerOptions::default();
        options.start_inventory.insert("Key".into(), 1);
        options.start_inventory.insert("Map".into(), 2);
        let graph = generator(options).generate(None).unwrap();
        let state = CollectionState::new(&graph);
        assert_eq!(state.count("Map", PlayerId(1)).unwrap(), 2);
        assert_eq!(state.count("Key", PlayerId(1)).unwrap(), 0);
    }

    #[test]
    fn bad_option_names_fail_generation() {
        let mut options = PlayerOptions::default();
        options.priority_locations.insert("Nowhere".into());
        assert!(matches!(
            generator(options).generate(None),
            Err(GenerationError::UnknownPriorityLocation { .. })
        ));

        let mut options = PlayerOptions::default();
        options.start_inventory.insert("Menhir".into(), 1);
        assert!(matches!(
            generator(options).generate(None),
            Err(GenerationError::Lookup(LookupError::UnknownItem { .. }))
                | Err(GenerationError::Graph(GraphError::Lookup(_)))
        ));
    }

    #[test]
    fn slot_data_passthrough_regenerates_with_server_options() {
        let generator = generator(PlayerOptions::default());
        let slot_data = serde_json::json!({"secrets": true, "seed_name": "abc"});
        let payload = generator.interpret_slot_data(PlayerId(1), &slot_data).unwrap();
        assert_eq!(payload, serde_json::json!({"secrets": true}));
        assert!(generator
            .interpret_slot_data(PlayerId(1), &serde_json::json!({"seed_name": "abc"}))
            .is_none());

        let passthrough: Passthrough = [("Test".to_string(), payload)].into_iter().collect();
        let graph = generator.generate(Some(&passthrough)).unwrap();
        assert!(graph.location_id(PlayerId(1), "Secret").is_ok());

        let broken: Passthrough = [("Test".to_string(), serde_json::json!({"exclude_locations": 5}))]
            .into_iter()
            .collect();
        assert!(matches!(
            generator.generate(Some(&broken)),
            Err(GenerationError::Passthrough { .. })
        ));
    }
}

//! Immutable id/name tables for every game in a session.
//!
//! A [`GameCatalog`] is built once at startup and shared by reference with the
//! region graph, the update cycle and the hint table. There is no ambient
//! registry: every id-to-name translation goes through a catalog value.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::LookupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemClassification {
    #[default]
    Filler,
    Progression,
    Useful,
    Trap,
    ProgressionSkipBalancing,
}

impl ItemClassification {
    pub fn is_progression(self) -> bool {
        matches!(
            self,
            ItemClassification::Progression | ItemClassification::ProgressionSkipBalancing
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub name: String,
    /// Server code; `None` for local-only helper items.
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub classification: ItemClassification,
}

/// Items and location ids for a single game.
#[derive(Debug, Clone)]
pub struct GameData {
    game: String,
    items: Vec<ItemDefinition>,
    item_by_name: HashMap<String, usize>,
    item_id_to_name: HashMap<i64, String>,
    location_id_to_name: HashMap<i64, String>,
    location_name_to_id: HashMap<String, i64>,
}

impl GameData {
    pub fn new(game: impl Into<String>) -> Self {
        Self {
            game: game.into(),
            items: Vec::new(),
            item_by_name: HashMap::new(),
            item_id_to_name: HashMap::new(),
            location_id_to_name: HashMap::new(),
            location_name_to_id: HashMap::new(),
        }
    }

    pub fn with_item(mut self, item: ItemDefinition) -> Self {
        self.add_item(item);
        self
    }

    pub fn with_location(mut self, name: impl Into<String>, id: i64) -> Self {
        self.add_location(name, id);
        self
    }

    /// Register an item. A later definition with the same name replaces the
    /// earlier one.
    pub fn add_item(&mut self, item: ItemDefinition) {
        if let Some(code) = item.code {
            self.item_id_to_name.insert(code, item.name.clone());
        }
        match self.item_by_name.get(&item.name) {
            Some(&index) => self.items[index] = item,
            None => {
                self.item_by_name.insert(item.name.clone(), self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn add_location(&mut self, name: impl Into<String>, id: i64) {
        let name = name.into();
        self.location_name_to_id.insert(name.clone(), id);
        self.location_id_to_name.insert(id, name);
    }

    pub fn game(&self) -> &str {
        &self.game
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemDefinition> {
        self.items.iter()
    }

    pub fn contains_item(&self, name: &str) -> bool {
        self.item_by_name.contains_key(name)
    }

    pub fn item(&self, name: &str) -> Result<&ItemDefinition, LookupError> {
        self.item_by_name
            .get(name)
            .map(|&index| &self.items[index])
            .ok_or_else(|| LookupError::UnknownItem {
                game: self.game.clone(),
                name: name.to_string(),
            })
    }

    pub fn item_name(&self, id: i64) -> Result<&str, LookupError> {
        self.item_id_to_name
            .get(&id)
            .map(String::as_str)
            .ok_or_else(|| LookupError::UnknownItemId {
                game: self.game.clone(),
                id,
            })
    }

    pub fn location_name(&self, id: i64) -> Result<&str, LookupError> {
        self.location_id_to_name
            .get(&id)
            .map(String::as_str)
            .ok_or_else(|| LookupError::UnknownLocationId {
                game: self.game.clone(),
                id,
            })
    }

    pub fn location_id(&self, name: &str) -> Option<i64> {
        self.location_name_to_id.get(name).copied()
    }

    pub fn has_location_name(&self, name: &str) -> bool {
        self.location_name_to_id.contains_key(name)
    }
}

/// Every game known to the session, keyed by game name.
#[derive(Debug, Clone, Default)]
pub struct GameCatalog {
    games: BTreeMap<String, GameData>,
}

impl GameCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_game(mut self, data: GameData) -> Self {
        self.insert(data);
        self
    }

    pub fn insert(&mut self, data: GameData) {
        self.games.insert(data.game.clone(), data);
    }

    pub fn game(&self, game: &str) -> Result<&GameData, LookupError> {
        self.games
            .get(game)
            .ok_or_else(|| LookupError::UnknownGame(game.to_string()))
    }

    pub fn games(&self) -> impl Iterator<Item = &GameData> {
        self.games.values()
    }
}

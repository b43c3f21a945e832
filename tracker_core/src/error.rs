use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{config::ConfigError, graph::PlayerId, overlay::OverlayError};

/// A name or id that does not resolve against the catalog or graph.
///
/// Returned instead of `false` so a data-package mismatch with the server is
/// visible rather than silently treated as "not held".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("player {0} is not part of this multiworld")]
    UnknownPlayer(PlayerId),
    #[error("game '{0}' is not in the catalog")]
    UnknownGame(String),
    #[error("item '{name}' is unknown to {game}")]
    UnknownItem { game: String, name: String },
    #[error("item id {id} is unknown to {game}")]
    UnknownItemId { game: String, id: i64 },
    #[error("location '{name}' does not exist for player {player}")]
    UnknownLocation { player: PlayerId, name: String },
    #[error("location id {id} is unknown to {game}")]
    UnknownLocationId { game: String, id: i64 },
    #[error("region '{name}' does not exist for player {player}")]
    UnknownRegion { player: PlayerId, name: String },
    #[error("entrance '{name}' does not exist for player {player}")]
    UnknownEntrance { player: PlayerId, name: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("rule '{rule}' failed: {message}")]
    Failed { rule: String, message: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("player {0} registered twice")]
    DuplicatePlayer(PlayerId),
    #[error("player {0} has no start region")]
    MissingStartRegion(PlayerId),
    #[error("region '{name}' registered twice for player {player}")]
    DuplicateRegion { player: PlayerId, name: String },
    #[error("location '{name}' registered twice for player {player}")]
    DuplicateLocation { player: PlayerId, name: String },
    #[error("entrance '{name}' registered twice for player {player}")]
    DuplicateEntrance { player: PlayerId, name: String },
    #[error("entrance '{name}' connects regions owned by different players")]
    CrossPlayerEntrance { name: String },
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no player files found in {0:?}")]
    NoPlayers(PathBuf),
    #[error("player '{player}' plays '{game}', which has no definition")]
    UnknownGame { player: String, game: String },
    #[error("unable to prioritize location '{location}' in {player}'s world")]
    UnknownPriorityLocation { player: String, location: String },
    #[error("unable to exclude location '{location}' in {player}'s world")]
    UnknownExcludedLocation { player: String, location: String },
    #[error("location '{location}' in {game} has neither an address nor an event item")]
    LocationWithoutKind { game: String, location: String },
    #[error("region '{region}' referenced by {game} is not defined")]
    UnknownRegion { game: String, region: String },
    #[error("slot data passthrough for {game} is malformed: {source}")]
    Passthrough {
        game: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no map catalog is loaded")]
    NoMaps,
    #[error("update cycle panicked: {0}")]
    Panicked(String),
}

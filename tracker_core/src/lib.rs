//! Progress-tracking engine for a multiworld item randomizer.
//!
//! Given a region graph with guarded entrances and locations, and the items a
//! player has received so far, answers which locations are reachable now and
//! which events have fired as a consequence. Each [`Tracker::update`] rebuilds
//! a [`CollectionState`], runs the reachability sweep to a fixed point and
//! publishes the classified locations to a report, a map overlay and any
//! registered [`TrackerEventSink`].

pub mod catalog;
pub mod collection;
pub mod config;
pub mod cycle;
mod error;
pub mod generation;
pub mod graph;
pub mod hints;
pub mod overlay;
pub mod predicate;
pub mod publish;
pub mod report;
pub mod scheduler;
pub mod session;
pub mod sweep;

pub use catalog::{GameCatalog, GameData, ItemClassification, ItemDefinition};
pub use collection::{CollectionState, ReachKind, RuleFailure, RuleSubject, TraversalOrder};
pub use config::{load_tracker_config, load_tracker_config_from_env, ConfigError, TrackerConfig};
pub use cycle::{
    CallbackSink, CycleOutcome, CycleStatus, Tracker, TrackerEventSink, TrackerSettings,
};
pub use error::{GenerationError, GraphError, LookupError, RuleError, TrackerError};
pub use generation::{DefinitionGenerator, Passthrough, WorldGenerator};
pub use graph::{
    LocationId, LocationKind, PlayerId, ProgressType, RegionId, WorldGraph, WorldGraphBuilder,
};
pub use hints::{HintRow, HintStatus};
pub use overlay::{LocationStatus, MapCatalog, Overlay, OverlayError, PinStatus, PinUpdate};
pub use predicate::{Predicate, Rule, RuleSpec};
pub use report::{OutputFormat, ReportLog, ReportSink};
pub use scheduler::{spawn_watcher, ChangeSignal, ShutdownFlag, WatcherStats};
pub use session::{SessionEvent, SessionFeed, SessionFixture, SessionState};
pub use sweep::{EventSweep, SweepOutcome};

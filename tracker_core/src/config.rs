//! Tracker settings.
//!
//! Loaded from `tracker_config.json`, with `TRACKER_CONFIG_PATH` overriding the
//! bundled file and the embedded copy as the last resort.

use std::{
    env, fs, io,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::report::OutputFormat;

pub const BUILTIN_TRACKER_CONFIG: &str = include_str!("data/tracker_config.json");
pub const CONFIG_PATH_ENV: &str = "TRACKER_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Directory of game definition files.
    pub games_path: PathBuf,
    /// Directory of player files, one per slot.
    pub player_files_path: PathBuf,
    /// Map catalog file. Tracking works without one.
    pub maps_path: Option<PathBuf>,
    pub include_region_name: bool,
    pub include_location_name: bool,
    pub hide_excluded_locations: bool,
    pub watcher_poll_ms: u64,
    pub command_bind: SocketAddr,
    pub publish_bind: SocketAddr,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            games_path: PathBuf::from("data/games"),
            player_files_path: PathBuf::from("data/players"),
            maps_path: None,
            include_region_name: false,
            include_location_name: true,
            hide_excluded_locations: false,
            watcher_poll_ms: 125,
            command_bind: SocketAddr::from(([127, 0, 0, 1], 42001)),
            publish_bind: SocketAddr::from(([127, 0, 0, 1], 42000)),
        }
    }
}

impl TrackerConfig {
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_TRACKER_CONFIG).expect("builtin tracker config should parse")
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = TrackerConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_flags(self.include_location_name, self.include_region_name)
    }

    pub fn watcher_poll(&self) -> Duration {
        Duration::from_millis(self.watcher_poll_ms.max(1))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse tracker config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read tracker config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the active configuration came from. `None` means the builtin copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerConfigMetadata {
    path: Option<PathBuf>,
}

impl TrackerConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

pub fn load_tracker_config_from_env() -> (TrackerConfig, TrackerConfigMetadata) {
    load_tracker_config(env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
}

/// Load from `override_path` if given, else the bundled file, else builtin.
pub fn load_tracker_config(override_path: Option<PathBuf>) -> (TrackerConfig, TrackerConfigMetadata) {
    let path = override_path.unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/tracker_config.json")
    });

    match TrackerConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "tracker::config",
                path = %path.display(),
                "tracker_config.loaded=file"
            );
            return (config, TrackerConfigMetadata::new(Some(path)));
        }
        Err(err) => {
            tracing::warn!(
                target: "tracker::config",
                path = %path.display(),
                error = %err,
                "tracker_config.load_failed"
            );
        }
    }

    tracing::info!(target: "tracker::config", "tracker_config.loaded=builtin");
    (TrackerConfig::builtin(), TrackerConfigMetadata::new(None))
}

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Once};

use tracker_core::{
    load_tracker_config_from_env, DefinitionGenerator, MapCatalog, Overlay, ReportLog,
    SessionFixture, SessionState, Tracker, TrackerConfig, TrackerSettings,
};
use tracker_schema::{ConnectedPacket, NetworkItem, ReceivedItemsPacket, SlotInfo};

static INIT: Once = Once::new();

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixtures_dir().join("test_tracker_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test tracker config at {}",
            config_path.display()
        );

        std::env::set_var("TRACKER_CONFIG_PATH", &config_path);
    });
}

/// The test config with every path resolved against the crate root.
pub fn test_config() -> TrackerConfig {
    ensure_test_config();
    let (mut config, metadata) = load_tracker_config_from_env();
    assert!(metadata.path().is_some(), "test config fell back to builtin");
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    config.games_path = root.join(&config.games_path);
    config.player_files_path = root.join(&config.player_files_path);
    config.maps_path = config.maps_path.map(|path| root.join(path));
    config
}

pub fn generator() -> DefinitionGenerator {
    let config = test_config();
    DefinitionGenerator::from_dirs(&config.games_path, &config.player_files_path)
        .expect("fixture definitions load")
}

pub fn tracker() -> Tracker {
    let config = test_config();
    tracker_with(TrackerSettings::from(&config))
}

pub fn tracker_with(settings: TrackerSettings) -> Tracker {
    let config = test_config();
    let maps = config
        .maps_path
        .as_deref()
        .map(|path| MapCatalog::from_file(path).expect("fixture maps load"))
        .unwrap_or_default();
    Tracker::new(Arc::new(generator()), settings, ReportLog::new()).with_overlay(Overlay::new(maps))
}

pub fn fixture_session() -> SessionFixture {
    SessionFixture::from_file(&fixtures_dir().join("session.json")).expect("fixture session loads")
}

/// Ana connected with the given locations missing and item codes received.
pub fn session(missing: &[i64], items: &[i64]) -> SessionState {
    let mut state = SessionState::default();
    state.apply_connected(&ConnectedPacket {
        team: 0,
        slot: 1,
        slot_info: [(
            "1".to_string(),
            SlotInfo {
                name: "Ana".into(),
                game: "Grim Dawn".into(),
            },
        )]
        .into_iter()
        .collect(),
        slot_data: serde_json::Value::Null,
        checked_locations: Vec::new(),
        missing_locations: missing.to_vec(),
    });
    state.apply_received_items(&ReceivedItemsPacket {
        index: 0,
        items: items
            .iter()
            .map(|&item| NetworkItem {
                item,
                location: 0,
                player: 1,
                flags: 0,
            })
            .collect(),
    });
    state
}

pub const ALL_ADDRESSES: [i64; 7] = [1000, 1001, 1002, 1003, 1004, 1005, 1006];

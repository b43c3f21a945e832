mod common;

use tracker_core::generation::{load_game_definitions, load_player_files};
use tracker_core::{
    load_tracker_config, GenerationError, MapCatalog, OutputFormat, PlayerId, TrackerConfig,
    WorldGenerator,
};

#[test]
fn test_config_resolves_fixture_paths() {
    let config = common::test_config();
    assert_eq!(config.output_format(), OutputFormat::Both);
    assert!(config.hide_excluded_locations);
    assert!(config.games_path.is_dir());
    assert!(config.player_files_path.is_dir());
    assert!(config.maps_path.as_deref().is_some_and(|path| path.is_file()));
}

#[test]
fn bundled_config_is_used_without_an_override() {
    let (config, metadata) = load_tracker_config(None);
    assert!(metadata.path().is_some());
    assert_eq!(config.output_format(), OutputFormat::Location);
    assert_eq!(config.watcher_poll_ms, TrackerConfig::builtin().watcher_poll_ms);
}

#[test]
fn fixture_files_load_in_name_order() -> anyhow::Result<()> {
    let dir = common::fixtures_dir();
    let games = load_game_definitions(&dir.join("games"))?;
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].game, "Grim Dawn");
    assert_eq!(games[0].slot_data_options, vec!["burrwitch"]);

    let players = load_player_files(&dir.join("players"))?;
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].name, "Ana");
    assert!(players[0].options.exclude_locations.contains("Supply Cache"));
    Ok(())
}

#[test]
fn generated_world_matches_the_definitions() {
    let generator = common::generator();
    let graph = generator.generate(None).unwrap();
    let ana = PlayerId(1);

    assert_eq!(graph.player_by_name("Ana"), Some(ana));
    assert_eq!(graph.player(ana).unwrap().game, "Grim Dawn");
    assert_eq!(
        graph.location_by_address(ana, 1004).map(|id| graph.location(id).name.as_str()),
        Some("Depraved Sanctuary Chest")
    );
    let data = graph.game_data(ana).unwrap();
    assert_eq!(data.item_name(2).unwrap(), "Cultist Orders");
    assert_eq!(data.location_id("Sanctuary Altar"), Some(1005));
    assert!(data.location_id("Direni Falls").is_none());
    assert!(graph
        .player(ana)
        .unwrap()
        .is_event_item("Direni Slain"));
}

#[test]
fn a_directory_without_player_files_is_an_error() {
    let empty = common::fixtures_dir().join("..").join("common");
    assert!(matches!(
        load_player_files(&empty),
        Err(GenerationError::NoPlayers(_))
    ));
    assert!(matches!(
        load_game_definitions(&common::fixtures_dir().join("missing")),
        Err(GenerationError::Read { .. })
    ));
}

#[test]
fn map_fixture_parses() -> anyhow::Result<()> {
    let maps = MapCatalog::from_file(&common::fixtures_dir().join("maps.json"))?;
    assert_eq!(maps.maps().len(), 2);
    assert_eq!(maps.maps()[0].location_size, 24);
    assert_eq!(maps.maps()[1].location_size, 20);
    assert!(maps.maps()[1].locations.is_empty());
    Ok(())
}

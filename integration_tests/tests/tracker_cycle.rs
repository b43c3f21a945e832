mod common;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tracker_core::generation::{load_game_definitions, load_player_files};
use tracker_core::report::{BANNER, FAILED_MESSAGE, NO_WORLD_MESSAGE, UNLISTED_PLAYER_MESSAGE};
use tracker_core::{
    CycleOutcome, CycleStatus, DefinitionGenerator, GenerationError, HintRow, HintStatus, OutputFormat, OverlayError,
    Passthrough, PinStatus, PlayerId, ProgressType, ReportLog, Tracker, TrackerError,
    TrackerEventSink, TrackerSettings, WorldGenerator, WorldGraph,
};
use tracker_runtime::{parse_command_line, InventoryView, MapSelector, TrackerCommand};
use tracker_schema::ItemFlags;

#[derive(Clone, Default)]
struct Recorder {
    connected: Arc<Mutex<Vec<(PlayerId, String)>>>,
    rooms: Arc<Mutex<Vec<CycleOutcome>>>,
    hints: Arc<Mutex<Vec<HintRow>>>,
}

impl TrackerEventSink for Recorder {
    fn on_session_connected(&mut self, player: PlayerId, game: &str) {
        self.connected.lock().unwrap().push((player, game.to_string()));
    }

    fn on_room_update(&mut self, outcome: &CycleOutcome) {
        self.rooms.lock().unwrap().push(outcome.clone());
    }

    fn on_hints_updated(&mut self, rows: &[HintRow]) {
        *self.hints.lock().unwrap() = rows.to_vec();
    }
}

fn outcome(tracker: &Tracker) -> &CycleOutcome {
    tracker.last_outcome().expect("a cycle was published")
}

#[test]
fn recorded_session_reports_reachable_locations() {
    let mut tracker = common::tracker();
    let recorder = Recorder::default();
    tracker.add_sink(recorder.clone());
    let session = common::fixture_session().to_state();

    assert_eq!(tracker.update(&session).unwrap(), CycleStatus::Updated);

    let outcome = outcome(&tracker);
    assert_eq!(outcome.player, Some(PlayerId(1)));
    assert_eq!(outcome.locations, vec!["Confront Direni", "Sanctuary Altar"]);
    assert_eq!(outcome.regions, vec!["Devil's Crossing", "Depraved Sanctuary"]);
    assert_eq!(outcome.events, vec!["Direni Slain", "Sanctuary Sealed"]);
    assert_eq!(outcome.in_logic, BTreeSet::from([1003, 1005]));
    assert_eq!(
        tracker.report().lines(),
        [
            "Depraved Sanctuary | Sanctuary Altar",
            "Devil's Crossing | Confront Direni",
        ]
    );
    assert_eq!(outcome.report, tracker.report().lines());
    assert_eq!(
        recorder.connected.lock().unwrap().as_slice(),
        [(PlayerId(1), "Grim Dawn".to_string())]
    );
    assert_eq!(recorder.rooms.lock().unwrap().len(), 1);
}

#[test]
fn slot_data_regenerates_the_world() {
    let mut tracker = common::tracker();
    let burrwitch_open = |graph: &WorldGraph| {
        graph
            .entrance_id(PlayerId(1), "Crossing -> Burrwitch")
            .is_ok()
    };
    assert!(!burrwitch_open(tracker.graph().unwrap()));

    let mut session = common::fixture_session().to_state();
    tracker.update(&session).unwrap();
    assert!(burrwitch_open(tracker.graph().unwrap()));
    let expected: Passthrough = [(
        "Grim Dawn".to_string(),
        serde_json::json!({"burrwitch": true}),
    )]
    .into_iter()
    .collect();
    assert_eq!(tracker.passthrough(), Some(&expected));

    // Menhir opens Burrwitch only in the regenerated world.
    session
        .items_received
        .push(tracker_schema::NetworkItem {
            item: 3,
            location: 2003,
            player: 2,
            flags: 1,
        });
    tracker.update(&session).unwrap();
    let outcome = outcome(&tracker);
    assert!(outcome.locations.contains(&"Burrwitch Outskirts".to_string()));
    assert!(outcome.locations.contains(&"Deliver Menhir".to_string()));
}

#[test]
fn failed_regeneration_keeps_tracking_the_local_world() {
    let config = common::test_config();
    let mut games = load_game_definitions(&config.games_path).unwrap();
    games[0].slot_data_options.push("exclude_locations".into());
    let players = load_player_files(&config.player_files_path).unwrap();
    let generator = DefinitionGenerator::new(games, players);
    let mut tracker = Tracker::new(
        Arc::new(generator),
        TrackerSettings::from(&config),
        ReportLog::new(),
    );
    let local = Arc::clone(tracker.graph().unwrap());

    let mut session = common::fixture_session().to_state();
    session.slot_data = serde_json::json!({
        "burrwitch": true,
        "exclude_locations": ["Renamed Well"],
    });

    assert_eq!(tracker.update(&session).unwrap(), CycleStatus::Updated);
    assert!(!tracker.is_failed());
    assert!(Arc::ptr_eq(tracker.graph().unwrap(), &local));
    assert_eq!(tracker.passthrough(), None);
    assert_eq!(
        outcome(&tracker).locations,
        vec!["Confront Direni", "Sanctuary Altar"]
    );
    assert!(!tracker
        .report()
        .lines()
        .iter()
        .any(|line| line.as_str() == FAILED_MESSAGE));
}

#[test]
fn hints_are_classified_against_the_tracked_player() {
    let mut tracker = common::tracker();
    let recorder = Recorder::default();
    tracker.add_sink(recorder.clone());
    tracker
        .update(&common::fixture_session().to_state())
        .unwrap();

    let rows = recorder.hints.lock().unwrap().clone();
    let summary: Vec<(&str, &str, HintStatus)> = rows
        .iter()
        .map(|row| (row.item.as_str(), row.location.as_str(), row.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Strange Key", "Depraved Sanctuary Chest", HintStatus::NotFound),
            ("Menhir", "Sanctuary Altar", HintStatus::InLogic),
            ("Menhir", "Confront Direni", HintStatus::Found),
        ]
    );
    assert_eq!(rows[0].finding_player, "Ana");
    assert_eq!(rows[0].receiving_player, "Bo");
    assert_eq!(rows[2].entrance, "Vanilla");
    assert_eq!(rows[0].item_flags, ItemFlags::PROGRESSION | ItemFlags::USEFUL);
    assert_eq!(rows[1].item_flags, ItemFlags::PROGRESSION);
    assert!(rows[0].striped && !rows[1].striped);
}

#[test]
fn excluded_locations_are_hidden_but_stay_in_logic() {
    let session = common::session(&common::ALL_ADDRESSES, &[2]);

    let mut hiding = common::tracker();
    hiding.update(&session).unwrap();
    let outcome = outcome(&hiding);
    assert!(!outcome.locations.contains(&"Supply Cache".to_string()));
    assert!(outcome.in_logic.contains(&1000));
    assert!(outcome.locations.contains(&"Sanctuary Altar".to_string()));

    // Supply Cache is listed as both; exclusion wins.
    let graph = hiding.graph().unwrap();
    let progress = |name: &str| {
        graph
            .location(graph.location_id(PlayerId(1), name).unwrap())
            .progress_type
    };
    assert_eq!(progress("Supply Cache"), ProgressType::Excluded);
    assert_eq!(progress("Sanctuary Altar"), ProgressType::Priority);

    let mut showing = common::tracker_with(TrackerSettings {
        output_format: OutputFormat::Location,
        hide_excluded: false,
    });
    showing.update(&session).unwrap();
    assert_eq!(
        showing.report().lines(),
        ["Confront Direni", "Sanctuary Altar", "Supply Cache"]
    );
}

#[test]
fn event_locations_never_reach_the_report() {
    let mut tracker = common::tracker_with(TrackerSettings {
        output_format: OutputFormat::Location,
        hide_excluded: false,
    });
    let session = common::session(&common::ALL_ADDRESSES, &[1, 2, 3, 4]);
    tracker.update(&session).unwrap();

    let outcome = outcome(&tracker);
    for event in ["Direni Falls", "Sanctuary Seal"] {
        assert!(!tracker.report().contains(event));
        assert!(!outcome.locations.contains(&event.to_string()));
    }
    assert_eq!(outcome.in_logic, BTreeSet::from([1000, 1001, 1002, 1003, 1004, 1005]));
}

#[test]
fn region_format_writes_each_region_once() {
    let mut tracker = common::tracker_with(TrackerSettings {
        output_format: OutputFormat::Region,
        hide_excluded: true,
    });
    tracker
        .update(&common::session(&common::ALL_ADDRESSES, &[1, 2, 4]))
        .unwrap();
    assert_eq!(
        tracker.report().lines(),
        ["Depraved Sanctuary", "Devil's Crossing"]
    );
}

#[test]
fn all_checked_is_reported_when_nothing_is_left() {
    let mut tracker = common::tracker();
    let mut session = common::session(&[1001, 1002], &[]);
    session.checked_locations = BTreeSet::from([1000, 1003, 1005]);
    tracker.update(&session).unwrap();
    assert_eq!(
        tracker.report().lines(),
        ["All 3 accessible locations have been checked! Congrats!"]
    );
}

#[test]
fn manual_collection_adds_and_resets() {
    let mut tracker = common::tracker();
    let session = common::fixture_session().to_state();
    tracker.update(&session).unwrap();
    let before = outcome(&tracker).in_logic.clone();

    let unknown = tracker
        .execute(&parse_command_line("manually_collect Excalibur").unwrap(), &session)
        .unwrap();
    assert_eq!(unknown, vec!["Item id Excalibur not able to be created"]);
    assert!(tracker.manual_items().is_empty());
    tracker.update(&session).unwrap();
    assert_eq!(outcome(&tracker).in_logic, before);

    let added = tracker
        .execute(
            &TrackerCommand::ManuallyCollect {
                item: "Strange Key".into(),
            },
            &session,
        )
        .unwrap();
    assert_eq!(added, vec!["Added Strange Key to manually collect."]);
    assert!(outcome(&tracker)
        .locations
        .contains(&"Depraved Sanctuary Chest".to_string()));

    let reset = tracker
        .execute(&TrackerCommand::ResetManuallyCollect, &session)
        .unwrap();
    assert_eq!(reset, vec!["Reset manually collect."]);
    assert!(!outcome(&tracker)
        .locations
        .contains(&"Depraved Sanctuary Chest".to_string()));
}

#[test]
fn inventory_commands_list_counts() {
    let mut tracker = common::tracker();
    let session = common::fixture_session().to_state();

    let all = tracker
        .execute(&TrackerCommand::Inventory(InventoryView::All), &session)
        .unwrap();
    assert_eq!(
        all,
        vec!["Current Inventory:", "1x: Aether Crystal", "1x: Cultist Orders"]
    );
    let progression = tracker
        .execute(&TrackerCommand::Inventory(InventoryView::Progression), &session)
        .unwrap();
    assert_eq!(progression, vec!["Current Inventory:", "1x: Cultist Orders"]);
    let events = tracker
        .execute(&TrackerCommand::Inventory(InventoryView::Events), &session)
        .unwrap();
    assert_eq!(
        events,
        vec!["Current Inventory:", "Direni Slain", "Sanctuary Sealed"]
    );
}

#[test]
fn map_commands_drive_the_overlay() {
    let mut tracker = common::tracker();
    let session = common::fixture_session().to_state();
    tracker.update(&session).unwrap();

    let maps = tracker.execute(&TrackerCommand::ListMaps, &session).unwrap();
    assert_eq!(maps, vec!["0: Act 1", "1: Act 2"]);

    let loaded = tracker
        .execute(
            &TrackerCommand::LoadMap(MapSelector::Name("Act 1".into())),
            &session,
        )
        .unwrap();
    assert_eq!(loaded, vec!["Loaded map Act 1"]);
    let pins: Vec<PinStatus> = outcome(&tracker).pins.iter().map(|pin| pin.status).collect();
    assert_eq!(
        pins,
        vec![
            PinStatus::OutOfLogic,
            PinStatus::Mixed,
            PinStatus::Mixed,
            PinStatus::OutOfLogic,
        ]
    );

    let missing = tracker.execute(&TrackerCommand::LoadMap(MapSelector::Index(7)), &session);
    assert!(matches!(
        missing,
        Err(TrackerError::Overlay(OverlayError::IndexOutOfRange {
            index: 7,
            available: 2
        }))
    ));
}

struct BrokenGenerator;

impl WorldGenerator for BrokenGenerator {
    fn generate(&self, _: Option<&Passthrough>) -> Result<WorldGraph, GenerationError> {
        Err(GenerationError::NoPlayers("players".into()))
    }

    fn interpret_slot_data(&self, _: PlayerId, _: &serde_json::Value) -> Option<serde_json::Value> {
        None
    }
}

#[test]
fn missing_world_fails_once_and_stays_failed() {
    let mut tracker: Tracker =
        Tracker::new(Arc::new(BrokenGenerator), TrackerSettings::default(), ReportLog::new());
    let session = common::session(&common::ALL_ADDRESSES, &[]);

    assert_eq!(tracker.update(&session).unwrap(), CycleStatus::Failed);
    assert_eq!(tracker.update(&session).unwrap(), CycleStatus::Failed);
    assert!(tracker.is_failed());
    let lines = tracker.report().lines();
    assert_eq!(lines[0], BANNER);
    assert_eq!(
        lines.iter().filter(|line| *line == FAILED_MESSAGE).count(),
        1
    );
    assert!(tracker.report().contains(NO_WORLD_MESSAGE));
    assert!(tracker.last_outcome().is_none());
}

#[test]
fn unlisted_slot_fails_the_cycle() {
    let mut tracker = common::tracker();
    let mut session = common::session(&common::ALL_ADDRESSES, &[]);
    session.slot_info.get_mut("1").unwrap().name = "Zed".into();

    assert_eq!(tracker.update(&session).unwrap(), CycleStatus::Failed);
    assert!(tracker.report().contains(UNLISTED_PLAYER_MESSAGE));
    assert!(tracker.report().contains(FAILED_MESSAGE));
}

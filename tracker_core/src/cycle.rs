//! Tracker update cycle.
//!
//! Each cycle rebuilds a collection state from scratch: pre-sweep events,
//! fold in received and manually collected items, sweep again, then classify
//! every location of the tracked player and publish the result to the report
//! sink, the overlay and any registered [`TrackerEventSink`]s.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracker_runtime::{InventoryView, TrackerCommand};

use crate::{
    collection::{CollectionState, RuleSubject},
    config::TrackerConfig,
    error::TrackerError,
    generation::{Passthrough, WorldGenerator},
    graph::{PlayerId, ProgressType, WorldGraph},
    hints::{hint_rows, HintNames, HintRow},
    overlay::{LocationStatus, Overlay, PinUpdate},
    report::{self, OutputFormat, ReportLog, ReportSink},
    scheduler::ShutdownFlag,
    session::SessionState,
    sweep,
};

/// Outbound notifications. Every method defaults to doing nothing.
pub trait TrackerEventSink: Send {
    fn on_session_connected(&mut self, _player: PlayerId, _game: &str) {}
    fn on_room_update(&mut self, _outcome: &CycleOutcome) {}
    fn on_hints_updated(&mut self, _rows: &[HintRow]) {}
}

type NamesCallback = Box<dyn FnMut(&[String]) + Send>;

/// Sink forwarding each cycle's location, region and event names to plain
/// callbacks.
#[derive(Default)]
pub struct CallbackSink {
    update: Option<NamesCallback>,
    region: Option<NamesCallback>,
    events: Option<NamesCallback>,
}

impl CallbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_update_callback(mut self, callback: impl FnMut(&[String]) + Send + 'static) -> Self {
        self.update = Some(Box::new(callback));
        self
    }

    pub fn with_region_callback(mut self, callback: impl FnMut(&[String]) + Send + 'static) -> Self {
        self.region = Some(Box::new(callback));
        self
    }

    pub fn with_events_callback(mut self, callback: impl FnMut(&[String]) + Send + 'static) -> Self {
        self.events = Some(Box::new(callback));
        self
    }
}

impl TrackerEventSink for CallbackSink {
    fn on_room_update(&mut self, outcome: &CycleOutcome) {
        if let Some(callback) = self.update.as_mut() {
            callback(&outcome.locations);
        }
        if let Some(callback) = self.region.as_mut() {
            callback(&outcome.regions);
        }
        if let Some(callback) = self.events.as_mut() {
            callback(&outcome.events);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub output_format: OutputFormat,
    pub hide_excluded: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Both,
            hide_excluded: false,
        }
    }
}

impl From<&TrackerConfig> for TrackerSettings {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            output_format: config.output_format(),
            hide_excluded: config.hide_excluded_locations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Updated,
    /// No session has connected yet.
    Waiting,
    /// No world or player; nothing is computed until restart.
    Failed,
    /// Shutdown was requested before publishing.
    Cancelled,
}

/// What one successful cycle published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub player: Option<PlayerId>,
    /// Lines written to the report this cycle, in report order.
    pub report: Vec<String>,
    /// Reachable unchecked locations shown in the report.
    pub locations: Vec<String>,
    /// Regions holding at least one of `locations`, first-seen order.
    pub regions: Vec<String>,
    /// Event items granted to the tracked player.
    pub events: Vec<String>,
    /// Addresses of every reachable unchecked location, hidden ones included.
    pub in_logic: BTreeSet<i64>,
    pub pins: Vec<PinUpdate>,
    /// Held items with a server code.
    pub all_items: BTreeMap<String, u32>,
    pub prog_items: BTreeMap<String, u32>,
}

pub struct Tracker<R: ReportSink = ReportLog> {
    generator: Arc<dyn WorldGenerator>,
    graph: Option<Arc<WorldGraph>>,
    settings: TrackerSettings,
    report: R,
    sinks: Vec<Box<dyn TrackerEventSink>>,
    overlay: Overlay,
    cancel: ShutdownFlag,
    player: Option<PlayerId>,
    game: String,
    passthrough: Option<Passthrough>,
    handled_slot: Option<(u32, u32)>,
    manual_items: Vec<String>,
    failed: bool,
    statuses: HashMap<String, LocationStatus>,
    last: Option<CycleOutcome>,
}

impl<R: ReportSink> Tracker<R> {
    /// Generate the local world and start tracking into `report`. A failed
    /// generation is written to the report; the first cycle then fails.
    pub fn new(generator: Arc<dyn WorldGenerator>, settings: TrackerSettings, mut report: R) -> Self {
        let graph = match generator.generate(None) {
            Ok(graph) => Some(Arc::new(graph)),
            Err(err) => {
                tracing::error!(target: "tracker::cycle", error = %err, "world.generation_failed");
                report.add_line(&err.to_string(), false);
                None
            }
        };
        Self {
            generator,
            graph,
            settings,
            report,
            sinks: Vec::new(),
            overlay: Overlay::default(),
            cancel: ShutdownFlag::new(),
            player: None,
            game: String::new(),
            passthrough: None,
            handled_slot: None,
            manual_items: Vec::new(),
            failed: false,
            statuses: HashMap::new(),
            last: None,
        }
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_cancel(mut self, cancel: ShutdownFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn add_sink(&mut self, sink: impl TrackerEventSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn report(&self) -> &R {
        &self.report
    }

    pub fn graph(&self) -> Option<&Arc<WorldGraph>> {
        self.graph.as_ref()
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    pub fn game(&self) -> &str {
        &self.game
    }

    pub fn passthrough(&self) -> Option<&Passthrough> {
        self.passthrough.as_ref()
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn last_outcome(&self) -> Option<&CycleOutcome> {
        self.last.as_ref()
    }

    pub fn manual_items(&self) -> &[String] {
        &self.manual_items
    }

    /// Resolve the connected slot to a local player, regenerating with the
    /// server's slot data when the world asks for it.
    pub fn handle_connected(&mut self, session: &SessionState) {
        self.handled_slot = Some((session.team, session.slot));
        let Some(graph) = self.graph.clone() else {
            self.report.add_line(report::NO_WORLD_MESSAGE, false);
            return;
        };
        let Some(player) = session.slot_name().and_then(|name| graph.player_by_name(name)) else {
            tracing::warn!(
                target: "tracker::cycle",
                slot = session.slot,
                name = session.slot_name().unwrap_or_default(),
                "session.unlisted_player"
            );
            self.report.add_line(report::UNLISTED_PLAYER_MESSAGE, false);
            return;
        };
        self.player = Some(player);
        self.game = session
            .own_slot()
            .map(|slot| slot.game.clone())
            .unwrap_or_default();

        if let Some(payload) = self.generator.interpret_slot_data(player, &session.slot_data) {
            let passthrough: Passthrough = [(self.game.clone(), payload)].into_iter().collect();
            match self.generator.generate(Some(&passthrough)) {
                Ok(graph) => {
                    self.graph = Some(Arc::new(graph));
                    self.passthrough = Some(passthrough);
                }
                // The locally generated world stays tracked.
                Err(err) => {
                    tracing::error!(target: "tracker::cycle", error = %err, "world.regeneration_failed");
                    self.report.add_line(&err.to_string(), false);
                }
            }
        }

        tracing::info!(target: "tracker::cycle", %player, game = %self.game, "session.connected");
        for sink in &mut self.sinks {
            sink.on_session_connected(player, &self.game);
        }
    }

    pub fn disconnect(&mut self) {
        self.game.clear();
        self.passthrough = None;
        self.handled_slot = None;
        tracing::info!(target: "tracker::cycle", "session.disconnected");
    }

    /// Run one cycle against a session snapshot.
    pub fn update(&mut self, session: &SessionState) -> Result<CycleStatus, TrackerError> {
        if self.failed {
            return Ok(CycleStatus::Failed);
        }
        if session.connected {
            if self.handled_slot != Some((session.team, session.slot)) {
                self.handle_connected(session);
            }
        } else {
            if self.handled_slot.is_some() {
                self.disconnect();
            }
            if self.player.is_none() {
                return Ok(CycleStatus::Waiting);
            }
        }

        let (Some(graph), Some(player)) = (self.graph.clone(), self.player) else {
            tracing::error!(target: "tracker::cycle", "cycle.no_world_or_player");
            self.report.add_line(report::FAILED_MESSAGE, false);
            self.failed = true;
            return Ok(CycleStatus::Failed);
        };

        let computed = self.compute(&graph, player, session)?;
        if self.cancel.is_set() {
            tracing::info!(target: "tracker::cycle", "cycle.cancelled");
            return Ok(CycleStatus::Cancelled);
        }
        self.publish(&graph, player, session, computed);
        Ok(CycleStatus::Updated)
    }

    /// Handle a console command. Returns the lines to show the user.
    pub fn execute(
        &mut self,
        command: &TrackerCommand,
        session: &SessionState,
    ) -> Result<Vec<String>, TrackerError> {
        match command {
            TrackerCommand::Inventory(view) => {
                self.update(session)?;
                let mut lines = vec!["Current Inventory:".to_string()];
                if let Some(outcome) = &self.last {
                    match view {
                        InventoryView::All => lines.extend(inventory_lines(&outcome.all_items)),
                        InventoryView::Progression => {
                            lines.extend(inventory_lines(&outcome.prog_items))
                        }
                        InventoryView::Events => {
                            let mut events = outcome.events.clone();
                            events.sort();
                            lines.extend(events);
                        }
                    }
                }
                Ok(lines)
            }
            TrackerCommand::ManuallyCollect { item } => {
                if !self.knows_item(item) {
                    return Ok(vec![report::item_not_created(item)]);
                }
                self.manual_items.push(item.clone());
                self.update(session)?;
                Ok(vec![format!("Added {item} to manually collect.")])
            }
            TrackerCommand::ResetManuallyCollect => {
                self.manual_items.clear();
                self.update(session)?;
                Ok(vec!["Reset manually collect.".to_string()])
            }
            TrackerCommand::LoadMap(selector) => {
                if self.overlay.catalog().is_empty() {
                    return Err(TrackerError::NoMaps);
                }
                let name = self.overlay.load_map(selector)?.name.clone();
                let pins = self.overlay.refresh(&self.statuses);
                if let Some(outcome) = self.last.as_mut() {
                    outcome.pins = pins;
                }
                Ok(vec![format!("Loaded map {name}")])
            }
            TrackerCommand::ListMaps => {
                if self.overlay.catalog().is_empty() {
                    return Err(TrackerError::NoMaps);
                }
                Ok(self.overlay.list_maps())
            }
            TrackerCommand::Refresh => {
                let status = self.update(session)?;
                Ok(vec![format!("Refresh: {status:?}")])
            }
            TrackerCommand::Quit => {
                self.cancel.trigger();
                Ok(vec!["Shutting down.".to_string()])
            }
        }
    }

    fn knows_item(&self, item: &str) -> bool {
        match (&self.graph, self.player) {
            (Some(graph), Some(player)) => graph.item_definition(item, player).is_ok(),
            _ => false,
        }
    }

    fn compute(
        &self,
        graph: &WorldGraph,
        player: PlayerId,
        session: &SessionState,
    ) -> Result<Computed, TrackerError> {
        let mut state = CollectionState::new(graph);
        sweep::sweep_for_events(&mut state, sweep::event_locations(graph));

        let data = graph.game_data(player)?;
        let mut computed = Computed::default();
        let received = session
            .items_received
            .iter()
            .map(|item| data.item_name(item.item).map_err(|_| item.item.to_string()));
        let manual = self
            .manual_items
            .iter()
            .map(|name| Ok::<&str, String>(name.as_str()));
        for name in received.chain(manual) {
            let name = match name {
                Ok(name) => name,
                Err(id) => {
                    computed.diagnostics.push(report::item_not_created(id));
                    continue;
                }
            };
            match graph.item_definition(name, player) {
                Ok(definition) => {
                    state.collect(name, player)?;
                    if let Some(definition) = definition {
                        if definition.classification.is_progression() {
                            *computed.outcome.prog_items.entry(name.to_string()).or_insert(0) += 1;
                        }
                        if definition.code.is_some() {
                            *computed.outcome.all_items.entry(name.to_string()).or_insert(0) += 1;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(target: "tracker::cycle", item = %name, error = %err, "item.unknown");
                    computed.diagnostics.push(report::item_not_created(name));
                }
            }
        }

        let swept = sweep::run(&mut state, player)?;
        for failure in &swept.failures {
            if let RuleSubject::Location(location) = failure.subject {
                let location = graph.location(location);
                if location.player == player {
                    tracing::warn!(
                        target: "tracker::cycle",
                        location = %location.name,
                        error = %failure.error,
                        "location.rule_failed"
                    );
                    computed
                        .diagnostics
                        .push(report::location_failed(&location.name));
                }
            }
        }

        let reachable: BTreeSet<_> = swept.locations.iter().copied().collect();
        let world = graph.player(player)?;
        for &id in world.locations() {
            let location = graph.location(id);
            let Some(address) = location.kind.address() else {
                continue;
            };
            let status = if session.checked_locations.contains(&address) {
                LocationStatus::Checked
            } else if reachable.contains(&id) {
                LocationStatus::InLogic
            } else {
                LocationStatus::OutOfLogic
            };
            computed.statuses.insert(location.name.clone(), status);

            if !reachable.contains(&id) || !session.missing_locations.contains(&address) {
                continue;
            }
            computed.outcome.in_logic.insert(address);
            if self.settings.hide_excluded && location.progress_type == ProgressType::Excluded {
                continue;
            }
            let region = &graph.region(location.region).name;
            match self.settings.output_format {
                OutputFormat::Both => computed
                    .lines
                    .push(format!("{region} | {}", location.name)),
                OutputFormat::Location => computed.lines.push(location.name.clone()),
                OutputFormat::Region => {}
            }
            if !computed.outcome.regions.contains(region) {
                computed.outcome.regions.push(region.clone());
                if self.settings.output_format == OutputFormat::Region {
                    computed.lines.push(region.clone());
                }
            }
            computed.outcome.locations.push(location.name.clone());
        }

        computed.outcome.player = Some(player);
        computed.outcome.events = swept
            .events
            .iter()
            .filter_map(|&id| graph.location(id).kind.event_item().map(str::to_string))
            .collect();
        Ok(computed)
    }

    fn publish(&mut self, graph: &WorldGraph, player: PlayerId, session: &SessionState, computed: Computed) {
        let Computed {
            mut outcome,
            mut lines,
            diagnostics,
            statuses,
        } = computed;

        self.report.clear();
        for line in &lines {
            self.report.add_line(line, true);
        }
        for line in &diagnostics {
            self.report.add_line(line, false);
        }
        lines.sort();
        lines.extend(diagnostics);
        if outcome.locations.is_empty() {
            let line = report::all_checked(session.checked_locations.len());
            self.report.add_line(&line, false);
            lines.push(line);
        }
        outcome.report = lines;

        outcome.pins = self.overlay.refresh(&statuses);
        self.statuses = statuses;

        if let Some(hints) = session.hints() {
            match hints {
                Ok(hints) => {
                    let names = HintNames {
                        slot_info: &session.slot_info,
                        catalog: graph.catalog(),
                    };
                    let rows = hint_rows(&hints, Some(player), &outcome.in_logic, &names);
                    for sink in &mut self.sinks {
                        sink.on_hints_updated(&rows);
                    }
                }
                Err(err) => {
                    tracing::warn!(target: "tracker::cycle", error = %err, "hints.malformed");
                }
            }
        }

        for sink in &mut self.sinks {
            sink.on_room_update(&outcome);
        }

        tracing::debug!(
            target: "tracker::cycle",
            %player,
            in_logic = outcome.in_logic.len(),
            shown = outcome.locations.len(),
            events = outcome.events.len(),
            "cycle.completed"
        );
        self.last = Some(outcome);
    }
}

#[derive(Debug, Default)]
struct Computed {
    outcome: CycleOutcome,
    lines: Vec<String>,
    diagnostics: Vec<String>,
    statuses: HashMap<String, LocationStatus>,
}

fn inventory_lines(items: &BTreeMap<String, u32>) -> impl Iterator<Item = String> + '_ {
    items.iter().map(|(item, count)| format!("{count}x: {item}"))
}

//! Reachability sweep.
//!
//! Alternates region expansion with event granting until neither produces
//! anything new. Pending events are visited in location insertion order (or
//! its reverse, following the state's [`TraversalOrder`]); the fixed point is
//! the same either way.

use crate::{
    collection::{CollectionState, RuleFailure, RuleSubject, TraversalOrder},
    error::{LookupError, RuleError},
    graph::{LocationId, PlayerId, RegionId, WorldGraph},
};

/// Events fired by one call to [`sweep_for_events`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSweep {
    pub triggered: Vec<LocationId>,
    pub failures: Vec<RuleFailure>,
}

/// Everything one player can reach under a swept state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub regions: Vec<RegionId>,
    /// Reachable locations of the player, events included, in graph order.
    pub locations: Vec<LocationId>,
    /// Every triggered event location of the player.
    pub events: Vec<LocationId>,
    /// Events fired during this sweep, in firing order.
    pub newly_triggered: Vec<LocationId>,
    pub failures: Vec<RuleFailure>,
}

/// Every event location in the graph, in insertion order.
pub fn event_locations(graph: &WorldGraph) -> Vec<LocationId> {
    graph
        .locations()
        .filter(|(_, location)| location.kind.is_event())
        .map(|(id, _)| id)
        .collect()
}

/// Fire every reachable event among `candidates` until a pass fires nothing.
pub fn sweep_for_events(
    state: &mut CollectionState<'_>,
    candidates: impl IntoIterator<Item = LocationId>,
) -> EventSweep {
    let mut pending: Vec<LocationId> = candidates
        .into_iter()
        .filter(|&location| !state.is_triggered(location))
        .collect();
    if state.order() == TraversalOrder::Reverse {
        pending.reverse();
    }

    let mut sweep = EventSweep::default();
    loop {
        let mut fired = false;
        pending.retain(|&location| {
            match state.can_reach_location(location) {
                Ok(false) => true,
                Ok(true) => match state.collect_event(location) {
                    Ok(_) => {
                        sweep.triggered.push(location);
                        fired = true;
                        false
                    }
                    Err(error) => {
                        record(&mut sweep.failures, location, error.into());
                        false
                    }
                },
                Err(error) => {
                    record(&mut sweep.failures, location, error);
                    true
                }
            }
        });
        if !fired {
            break;
        }
    }

    if !sweep.triggered.is_empty() {
        tracing::debug!(
            target: "tracker::sweep",
            fired = sweep.triggered.len(),
            pending = pending.len(),
            "sweep.events_fired"
        );
    }
    sweep
}

/// Reachable locations of `player`, with the locations whose rule failed.
pub fn reachable_locations(
    state: &CollectionState<'_>,
    player: PlayerId,
) -> Result<(Vec<LocationId>, Vec<RuleFailure>), LookupError> {
    let world = state.graph().player(player)?;
    let mut reachable = Vec::new();
    let mut failures = Vec::new();
    for &location in world.locations() {
        match state.can_reach_location(location) {
            Ok(true) => reachable.push(location),
            Ok(false) => {}
            Err(error) => record(&mut failures, location, error),
        }
    }
    Ok((reachable, failures))
}

/// Sweep every event in the graph, then report what `player` can reach.
pub fn run(state: &mut CollectionState<'_>, player: PlayerId) -> Result<SweepOutcome, LookupError> {
    let graph = state.graph();
    graph.player(player)?;

    let events = sweep_for_events(state, event_locations(graph));
    let regions = state.reachable_regions(player)?;
    let (locations, location_failures) = reachable_locations(state, player)?;

    let mut failures = state.entrance_failures();
    for failure in events.failures.into_iter().chain(location_failures) {
        if !failures.iter().any(|known| known.subject == failure.subject) {
            failures.push(failure);
        }
    }

    Ok(SweepOutcome {
        regions,
        locations,
        events: state
            .triggered_events()
            .filter(|&location| graph.location(location).player == player)
            .collect(),
        newly_triggered: events.triggered,
        failures,
    })
}

fn record(failures: &mut Vec<RuleFailure>, location: LocationId, error: RuleError) {
    let subject = RuleSubject::Location(location);
    if failures.iter().all(|failure| failure.subject != subject) {
        failures.push(RuleFailure { subject, error });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{GameCatalog, GameData, ItemClassification, ItemDefinition};
    use crate::graph::{LocationKind, WorldGraphBuilder};
    use crate::predicate::{has, Predicate};

    const P: PlayerId = PlayerId(1);

    #[derive(Debug)]
    struct Broken;

    impl Predicate for Broken {
        fn evaluate(&self, _: &CollectionState<'_>, _: PlayerId) -> Result<bool, RuleError> {
            Err(RuleError::Failed {
                rule: "broken".into(),
                message: "no".into(),
            })
        }
    }

    /// A -> B (Key). B holds "Open Door" (grants "Key Confirmed").
    /// B -> C needs "Key Confirmed"; C holds "Lever" (grants "Gate Open").
    /// A -> D needs "Gate Open"; D holds a checkable chest.
    fn chain() -> WorldGraph {
        let data = GameData::new("Test").with_item(ItemDefinition {
            name: "Key".into(),
            code: Some(1),
            classification: ItemClassification::Progression,
        });
        let mut builder = WorldGraphBuilder::new(Arc::new(GameCatalog::new().with_game(data)));
        builder.add_player(P, "Tester", "Test").unwrap();
        let a = builder.add_region(P, "A").unwrap();
        let b = builder.add_region(P, "B").unwrap();
        let c = builder.add_region(P, "C").unwrap();
        let d = builder.add_region(P, "D").unwrap();
        builder.connect(a, b, "A -> B", has("Key")).unwrap();
        builder.connect(b, c, "B -> C", has("Key Confirmed")).unwrap();
        builder.connect(a, d, "A -> D", has("Gate Open")).unwrap();
        builder
            .add_open_location(c, "Lever", LocationKind::Event("Gate Open".into()))
            .unwrap();
        builder
            .add_open_location(b, "Open Door", LocationKind::Event("Key Confirmed".into()))
            .unwrap();
        builder
            .add_open_location(d, "Chest", LocationKind::Checkable(100))
            .unwrap();
        builder
            .add_location(a, "Shrine", LocationKind::Checkable(101), Arc::new(Broken))
            .unwrap();
        builder.build().unwrap()
    }

    fn names(graph: &WorldGraph, ids: &[LocationId]) -> Vec<String> {
        ids.iter().map(|&id| graph.location(id).name.clone()).collect()
    }

    #[test]
    fn empty_state_reaches_only_the_start() {
        let graph = chain();
        let mut state = CollectionState::new(&graph);
        let outcome = run(&mut state, P).unwrap();
        assert_eq!(outcome.regions, vec![graph.region_id(P, "A").unwrap()]);
        assert!(outcome.events.is_empty());
        assert!(outcome.locations.is_empty());
    }

    #[test]
    fn events_unlock_further_events() {
        let graph = chain();
        let mut state = CollectionState::new(&graph);
        state.collect("Key", P).unwrap();
        let outcome = run(&mut state, P).unwrap();
        assert_eq!(outcome.regions.len(), 4);
        assert_eq!(names(&graph, &outcome.newly_triggered), vec!["Open Door", "Lever"]);
        assert_eq!(names(&graph, &outcome.events), vec!["Lever", "Open Door"]);
        assert_eq!(names(&graph, &outcome.locations), vec!["Lever", "Open Door", "Chest"]);
        assert!(state.has("Key Confirmed", P, 1).unwrap());
    }

    #[test]
    fn second_sweep_changes_nothing() {
        let graph = chain();
        let mut state = CollectionState::new(&graph);
        state.collect("Key", P).unwrap();
        let first = run(&mut state, P).unwrap();
        let second = run(&mut state, P).unwrap();
        assert!(second.newly_triggered.is_empty());
        assert_eq!(first.regions, second.regions);
        assert_eq!(first.locations, second.locations);
        assert_eq!(first.events, second.events);
    }

    #[test]
    fn reverse_order_reaches_the_same_fixed_point() {
        let graph = chain();
        let mut forward = CollectionState::new(&graph);
        let mut backward = CollectionState::new(&graph).with_order(TraversalOrder::Reverse);
        forward.collect("Key", P).unwrap();
        backward.collect("Key", P).unwrap();
        let a = run(&mut forward, P).unwrap();
        let b = run(&mut backward, P).unwrap();
        assert_eq!(a.regions, b.regions);
        assert_eq!(a.locations, b.locations);
        assert_eq!(a.events, b.events);
    }

    #[test]
    fn failing_location_rule_is_reported_not_fatal() {
        let graph = chain();
        let mut state = CollectionState::new(&graph);
        let outcome = run(&mut state, P).unwrap();
        assert_eq!(outcome.failures.len(), 1);
        let shrine = graph.location_id(P, "Shrine").unwrap();
        assert_eq!(outcome.failures[0].subject, RuleSubject::Location(shrine));
        assert!(!outcome.locations.contains(&shrine));
    }

    #[test]
    fn unknown_player_is_an_error() {
        let graph = chain();
        let mut state = CollectionState::new(&graph);
        assert_eq!(
            run(&mut state, PlayerId(7)).unwrap_err(),
            LookupError::UnknownPlayer(PlayerId(7))
        );
    }
}

//! Collection state: what a player holds and which regions that opens up.
//!
//! Region reachability is memoized per player. `collect` keeps the previous
//! region bits as the seed for the next expansion, which is sound because
//! gaining items never closes an entrance. `remove` throws the bits away and
//! forces a rebuild from the start region.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::mem;

use crate::{
    error::{LookupError, RuleError},
    graph::{EntranceId, LocationId, LocationKind, PlayerId, RegionId, WorldGraph},
};

/// Order in which regions and exits are visited during expansion.
///
/// The reachable set does not depend on it; tests flip it to check that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    #[default]
    Insertion,
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachKind {
    Region,
    Location,
    Entrance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSubject {
    Entrance(EntranceId),
    Location(LocationId),
}

/// A guard that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub subject: RuleSubject,
    pub error: RuleError,
}

#[derive(Debug, Clone)]
enum RegionCache {
    /// Bits from before the last `collect`; still a valid lower bound.
    Stale(Vec<bool>),
    /// Expansion in progress. Nested queries read the partial set.
    Building(Vec<bool>),
    Ready(Vec<bool>),
}

impl RegionCache {
    fn bits(&self) -> &[bool] {
        match self {
            RegionCache::Stale(bits) | RegionCache::Building(bits) | RegionCache::Ready(bits) => {
                bits
            }
        }
    }

    fn bits_mut(&mut self) -> &mut Vec<bool> {
        match self {
            RegionCache::Stale(bits) | RegionCache::Building(bits) | RegionCache::Ready(bits) => {
                bits
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectionState<'g> {
    graph: &'g WorldGraph,
    order: TraversalOrder,
    items: HashMap<PlayerId, HashMap<String, u32>>,
    events: BTreeSet<LocationId>,
    regions: RefCell<HashMap<PlayerId, RegionCache>>,
    entrance_failures: RefCell<Vec<RuleFailure>>,
}

impl<'g> CollectionState<'g> {
    /// Fresh state holding only each player's precollected items.
    pub fn new(graph: &'g WorldGraph) -> Self {
        let mut items: HashMap<PlayerId, HashMap<String, u32>> = HashMap::new();
        for world in graph.players() {
            let held = items.entry(world.id).or_default();
            for item in world.precollected() {
                *held.entry(item.clone()).or_insert(0) += 1;
            }
        }
        Self {
            graph,
            order: TraversalOrder::default(),
            items,
            events: BTreeSet::new(),
            regions: RefCell::new(HashMap::new()),
            entrance_failures: RefCell::new(Vec::new()),
        }
    }

    pub fn with_order(mut self, order: TraversalOrder) -> Self {
        self.order = order;
        self
    }

    pub fn graph(&self) -> &'g WorldGraph {
        self.graph
    }

    pub fn order(&self) -> TraversalOrder {
        self.order
    }

    pub fn count(&self, item: &str, player: PlayerId) -> Result<u32, LookupError> {
        self.graph.item_definition(item, player)?;
        Ok(self
            .items
            .get(&player)
            .and_then(|held| held.get(item))
            .copied()
            .unwrap_or(0))
    }

    pub fn has(&self, item: &str, player: PlayerId, count: u32) -> Result<bool, LookupError> {
        Ok(self.count(item, player)? >= count)
    }

    /// Held items of one player, sorted by name.
    pub fn items(&self, player: PlayerId) -> Vec<(&str, u32)> {
        let mut held: Vec<(&str, u32)> = self
            .items
            .get(&player)
            .map(|held| held.iter().map(|(name, &count)| (name.as_str(), count)).collect())
            .unwrap_or_default();
        held.sort_unstable();
        held
    }

    pub fn collect(&mut self, item: &str, player: PlayerId) -> Result<(), LookupError> {
        self.graph.item_definition(item, player)?;
        *self
            .items
            .entry(player)
            .or_default()
            .entry(item.to_string())
            .or_insert(0) += 1;
        self.mark_stale();
        Ok(())
    }

    /// Grant the item of an event location and mark it triggered.
    ///
    /// Returns `false` when the location was already triggered or is not an
    /// event location; triggering is idempotent per location.
    pub fn collect_event(&mut self, location: LocationId) -> Result<bool, LookupError> {
        let graph = self.graph;
        let target = graph.location(location);
        let LocationKind::Event(item) = &target.kind else {
            return Ok(false);
        };
        if self.events.contains(&location) {
            return Ok(false);
        }
        self.collect(item, target.player)?;
        self.events.insert(location);
        Ok(true)
    }

    /// Drop one copy of `item`. Only meant for what-if probing.
    pub fn remove(&mut self, item: &str, player: PlayerId) -> Result<bool, LookupError> {
        self.graph.item_definition(item, player)?;
        let Some(held) = self.items.get_mut(&player) else {
            return Ok(false);
        };
        let Some(count) = held.get_mut(item) else {
            return Ok(false);
        };
        *count -= 1;
        if *count == 0 {
            held.remove(item);
        }
        self.regions.get_mut().clear();
        self.entrance_failures.get_mut().clear();
        Ok(true)
    }

    pub fn is_triggered(&self, location: LocationId) -> bool {
        self.events.contains(&location)
    }

    /// Triggered event locations in location order.
    pub fn triggered_events(&self) -> impl Iterator<Item = LocationId> + '_ {
        self.events.iter().copied()
    }

    pub fn entrance_failures(&self) -> Vec<RuleFailure> {
        self.entrance_failures.borrow().clone()
    }

    pub fn can_reach(&self, name: &str, kind: ReachKind, player: PlayerId) -> Result<bool, RuleError> {
        match kind {
            ReachKind::Region => self.can_reach_region(self.graph.region_id(player, name)?),
            ReachKind::Location => self.can_reach_location(self.graph.location_id(player, name)?),
            ReachKind::Entrance => self.can_reach_entrance(self.graph.entrance_id(player, name)?),
        }
    }

    pub fn can_reach_region(&self, region: RegionId) -> Result<bool, RuleError> {
        let player = self.graph.region(region).player;
        if let Some(reachable) = self.cached_region(player, region) {
            return Ok(reachable);
        }
        self.update_reachable_regions(player)?;
        Ok(self.region_bit(player, region))
    }

    pub fn can_reach_location(&self, location: LocationId) -> Result<bool, RuleError> {
        let target = self.graph.location(location);
        if !self.can_reach_region(target.region)? {
            return Ok(false);
        }
        target.rule.evaluate(self, target.player)
    }

    pub fn can_reach_entrance(&self, entrance: EntranceId) -> Result<bool, RuleError> {
        let target = self.graph.entrance(entrance);
        if !self.can_reach_region(target.source)? {
            return Ok(false);
        }
        target.rule.evaluate(self, target.player)
    }

    /// Reachable regions of `player` in graph order.
    pub fn reachable_regions(&self, player: PlayerId) -> Result<Vec<RegionId>, LookupError> {
        let world = self.graph.player(player)?;
        if self.cached_region(player, world.start_region).is_none() {
            self.update_reachable_regions(player)?;
        }
        Ok(world
            .regions()
            .iter()
            .copied()
            .filter(|&region| self.region_bit(player, region))
            .collect())
    }

    fn mark_stale(&mut self) {
        for cache in self.regions.get_mut().values_mut() {
            let bits = mem::take(cache.bits_mut());
            *cache = RegionCache::Stale(bits);
        }
    }

    fn cached_region(&self, player: PlayerId, region: RegionId) -> Option<bool> {
        match self.regions.borrow().get(&player) {
            Some(RegionCache::Ready(bits)) | Some(RegionCache::Building(bits)) => {
                Some(bits[region.0])
            }
            _ => None,
        }
    }

    fn region_bit(&self, player: PlayerId, region: RegionId) -> bool {
        self.regions
            .borrow()
            .get(&player)
            .map(|cache| cache.bits()[region.0])
            .unwrap_or(false)
    }

    fn set_region_bit(&self, player: PlayerId, region: RegionId) {
        if let Some(cache) = self.regions.borrow_mut().get_mut(&player) {
            cache.bits_mut()[region.0] = true;
        }
    }

    fn update_reachable_regions(&self, player: PlayerId) -> Result<(), LookupError> {
        let world = self.graph.player(player)?;
        let mut seed = match self.regions.borrow_mut().remove(&player) {
            Some(RegionCache::Stale(bits)) => bits,
            _ => vec![false; self.graph.region_count()],
        };
        seed[world.start_region.0] = true;
        self.regions
            .borrow_mut()
            .insert(player, RegionCache::Building(seed));

        self.expand_regions(player, world.regions());

        if let Some(cache) = self.regions.borrow_mut().get_mut(&player) {
            let bits = mem::take(cache.bits_mut());
            *cache = RegionCache::Ready(bits);
        }
        Ok(())
    }

    /// Worklist passes over reachable regions until no exit opens anything new.
    fn expand_regions(&self, player: PlayerId, regions: &[RegionId]) {
        loop {
            let mut changed = false;
            for region in ordered(regions, self.order) {
                if !self.region_bit(player, region) {
                    continue;
                }
                for exit in ordered(&self.graph.region(region).exits, self.order) {
                    let target = self.graph.entrance(exit).target;
                    if self.region_bit(player, target) {
                        continue;
                    }
                    if self.entrance_open(exit, player) {
                        self.set_region_bit(player, target);
                        changed = true;
                    }
                }
            }
            if !changed {
                return;
            }
        }
    }

    fn entrance_open(&self, exit: EntranceId, player: PlayerId) -> bool {
        match self.graph.entrance(exit).rule.evaluate(self, player) {
            Ok(open) => open,
            Err(error) => {
                let mut failures = self.entrance_failures.borrow_mut();
                let subject = RuleSubject::Entrance(exit);
                if !failures.iter().any(|failure| failure.subject == subject) {
                    tracing::warn!(
                        target: "tracker::collection",
                        entrance = %self.graph.entrance(exit).name,
                        %error,
                        "entrance.rule_failed"
                    );
                    failures.push(RuleFailure { subject, error });
                }
                false
            }
        }
    }
}

fn ordered<T: Copy>(items: &[T], order: TraversalOrder) -> Vec<T> {
    match order {
        TraversalOrder::Insertion => items.to_vec(),
        TraversalOrder::Reverse => items.iter().rev().copied().collect(),
    }
}

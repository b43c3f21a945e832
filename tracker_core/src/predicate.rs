//! Guard predicates for entrances and locations.
//!
//! Rules are capability objects rather than closures: each shape (has-item,
//! has-count, any-of, all-of, region reachability) is a concrete type behind
//! the [`Predicate`] trait, and the graph stores them as shared [`Rule`]s.
//! Game-specific rules implement the trait directly.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{collection::CollectionState, error::RuleError, graph::PlayerId};

/// A pure test against a collection state, evaluated on behalf of `player`.
pub trait Predicate: fmt::Debug + Send + Sync {
    fn evaluate(&self, state: &CollectionState<'_>, player: PlayerId) -> Result<bool, RuleError>;
}

pub type Rule = Arc<dyn Predicate>;

#[derive(Debug, Clone, Copy)]
pub struct Always;

impl Predicate for Always {
    fn evaluate(&self, _state: &CollectionState<'_>, _player: PlayerId) -> Result<bool, RuleError> {
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct HasItem {
    pub item: String,
    pub count: u32,
}

impl Predicate for HasItem {
    fn evaluate(&self, state: &CollectionState<'_>, player: PlayerId) -> Result<bool, RuleError> {
        Ok(state.has(&self.item, player, self.count)?)
    }
}

#[derive(Debug, Clone)]
pub struct HasAll(pub Vec<String>);

impl Predicate for HasAll {
    fn evaluate(&self, state: &CollectionState<'_>, player: PlayerId) -> Result<bool, RuleError> {
        for item in &self.0 {
            if !state.has(item, player, 1)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct HasAny(pub Vec<String>);

impl Predicate for HasAny {
    fn evaluate(&self, state: &CollectionState<'_>, player: PlayerId) -> Result<bool, RuleError> {
        for item in &self.0 {
            if state.has(item, player, 1)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// At least `count` items in total drawn from `items`.
#[derive(Debug, Clone)]
pub struct HasFromList {
    pub items: Vec<String>,
    pub count: u32,
}

impl Predicate for HasFromList {
    fn evaluate(&self, state: &CollectionState<'_>, player: PlayerId) -> Result<bool, RuleError> {
        let mut total = 0u32;
        for item in &self.items {
            total = total.saturating_add(state.count(item, player)?);
            if total >= self.count {
                return Ok(true);
            }
        }
        Ok(total >= self.count)
    }
}

#[derive(Debug, Clone)]
pub struct AllOf(pub Vec<Rule>);

impl Predicate for AllOf {
    fn evaluate(&self, state: &CollectionState<'_>, player: PlayerId) -> Result<bool, RuleError> {
        for rule in &self.0 {
            if !rule.evaluate(state, player)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct AnyOf(pub Vec<Rule>);

impl Predicate for AnyOf {
    fn evaluate(&self, state: &CollectionState<'_>, player: PlayerId) -> Result<bool, RuleError> {
        for rule in &self.0 {
            if rule.evaluate(state, player)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// True once the named region of the same player is reachable.
#[derive(Debug, Clone)]
pub struct CanReachRegion(pub String);

impl Predicate for CanReachRegion {
    fn evaluate(&self, state: &CollectionState<'_>, player: PlayerId) -> Result<bool, RuleError> {
        let region = state.graph().region_id(player, &self.0)?;
        state.can_reach_region(region)
    }
}

pub fn always() -> Rule {
    Arc::new(Always)
}

pub fn has(item: impl Into<String>) -> Rule {
    has_count(item, 1)
}

pub fn has_count(item: impl Into<String>, count: u32) -> Rule {
    Arc::new(HasItem {
        item: item.into(),
        count,
    })
}

pub fn all_of(rules: Vec<Rule>) -> Rule {
    Arc::new(AllOf(rules))
}

pub fn any_of(rules: Vec<Rule>) -> Rule {
    Arc::new(AnyOf(rules))
}

pub fn can_reach(region: impl Into<String>) -> Rule {
    Arc::new(CanReachRegion(region.into()))
}

/// Declarative rule tree as it appears in game definition files.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSpec {
    #[default]
    Always,
    Has {
        item: String,
        #[serde(default = "default_count")]
        count: u32,
    },
    HasAll(Vec<String>),
    HasAny(Vec<String>),
    HasFromList {
        items: Vec<String>,
        count: u32,
    },
    AllOf(Vec<RuleSpec>),
    AnyOf(Vec<RuleSpec>),
    CanReach {
        region: String,
    },
}

fn default_count() -> u32 {
    1
}

impl RuleSpec {
    pub fn compile(&self) -> Rule {
        match self {
            RuleSpec::Always => always(),
            RuleSpec::Has { item, count } => has_count(item.clone(), *count),
            RuleSpec::HasAll(items) => Arc::new(HasAll(items.clone())),
            RuleSpec::HasAny(items) => Arc::new(HasAny(items.clone())),
            RuleSpec::HasFromList { items, count } => Arc::new(HasFromList {
                items: items.clone(),
                count: *count,
            }),
            RuleSpec::AllOf(rules) => all_of(rules.iter().map(RuleSpec::compile).collect()),
            RuleSpec::AnyOf(rules) => any_of(rules.iter().map(RuleSpec::compile).collect()),
            RuleSpec::CanReach { region } => can_reach(region.clone()),
        }
    }
}

//! Hint table rows, classified against the last reachable set.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;
use tracker_schema::{Hint, ItemFlags, SlotInfo};

use crate::{catalog::GameCatalog, graph::PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HintStatus {
    Found,
    InLogic,
    NotFound,
}

impl fmt::Display for HintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HintStatus::Found => "Found",
            HintStatus::InLogic => "In Logic",
            HintStatus::NotFound => "Not Found",
        })
    }
}

/// Found hints are `Found`. Otherwise a hint is in logic only when the
/// tracked player finds it and its location is in `available`.
pub fn classify(hint: &Hint, tracked: Option<PlayerId>, available: &BTreeSet<i64>) -> HintStatus {
    if hint.found {
        return HintStatus::Found;
    }
    let in_logic = tracked == Some(PlayerId(hint.finding_player))
        && available.contains(&hint.location);
    if in_logic {
        HintStatus::InLogic
    } else {
        HintStatus::NotFound
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HintRow {
    pub receiving_player: String,
    pub item: String,
    pub item_flags: ItemFlags,
    pub finding_player: String,
    pub location: String,
    pub entrance: String,
    pub status: HintStatus,
    pub striped: bool,
}

/// Resolves slot, item and location ids to display names. Ids that do not
/// resolve are shown as numbers.
#[derive(Debug, Clone, Copy)]
pub struct HintNames<'a> {
    pub slot_info: &'a HashMap<String, SlotInfo>,
    pub catalog: &'a GameCatalog,
}

impl<'a> HintNames<'a> {
    fn slot(&self, player: u32) -> Option<&'a SlotInfo> {
        self.slot_info.get(&player.to_string())
    }

    pub fn player(&self, player: u32) -> String {
        self.slot(player)
            .map(|slot| slot.name.clone())
            .unwrap_or_else(|| format!("Player {player}"))
    }

    pub fn item(&self, player: u32, item: i64) -> String {
        self.slot(player)
            .and_then(|slot| self.catalog.game(&slot.game).ok())
            .and_then(|data| data.item_name(item).ok())
            .map(str::to_string)
            .unwrap_or_else(|| item.to_string())
    }

    pub fn location(&self, player: u32, location: i64) -> String {
        self.slot(player)
            .and_then(|slot| self.catalog.game(&slot.game).ok())
            .and_then(|data| data.location_name(location).ok())
            .map(str::to_string)
            .unwrap_or_else(|| location.to_string())
    }
}

/// Rows sorted found-last, then by finding player, then by location.
pub fn hint_rows(
    hints: &[Hint],
    tracked: Option<PlayerId>,
    available: &BTreeSet<i64>,
    names: &HintNames<'_>,
) -> Vec<HintRow> {
    let mut ordered: Vec<&Hint> = hints.iter().collect();
    ordered.sort_by_key(|hint| (hint.found, hint.finding_player, hint.location));
    ordered
        .into_iter()
        .enumerate()
        .map(|(index, hint)| HintRow {
            receiving_player: names.player(hint.receiving_player),
            item: names.item(hint.receiving_player, hint.item),
            item_flags: hint.item_flags(),
            finding_player: names.player(hint.finding_player),
            location: names.location(hint.finding_player, hint.location),
            entrance: hint.entrance_label().to_string(),
            status: classify(hint, tracked, available),
            striped: index % 2 == 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{GameData, ItemClassification, ItemDefinition};

    fn hint(finding_player: u32, location: i64, found: bool) -> Hint {
        Hint {
            receiving_player: 2,
            finding_player,
            location,
            item: 7,
            found,
            entrance: String::new(),
            item_flags: 1,
        }
    }

    #[test]
    fn status_depends_on_finder_and_reachability() {
        let available: BTreeSet<i64> = [500].into_iter().collect();
        let me = Some(PlayerId(1));
        assert_eq!(classify(&hint(1, 500, false), me, &available), HintStatus::InLogic);
        assert_eq!(classify(&hint(1, 501, false), me, &available), HintStatus::NotFound);
        assert_eq!(classify(&hint(2, 500, false), me, &available), HintStatus::NotFound);
        assert_eq!(classify(&hint(1, 500, true), me, &available), HintStatus::Found);
        assert_eq!(classify(&hint(1, 500, false), None, &available), HintStatus::NotFound);
        assert_eq!(HintStatus::InLogic.to_string(), "In Logic");
    }

    #[test]
    fn rows_sort_found_last_and_resolve_names() {
        let catalog = GameCatalog::new().with_game(
            GameData::new("Grim Dawn")
                .with_item(ItemDefinition {
                    name: "Strange Key".into(),
                    code: Some(7),
                    classification: ItemClassification::Progression,
                })
                .with_location("Depraved Sanctuary Chest", 500),
        );
        let slot_info: HashMap<String, SlotInfo> = [
            ("1".to_string(), SlotInfo { name: "Ana".into(), game: "Grim Dawn".into() }),
            ("2".to_string(), SlotInfo { name: "Bo".into(), game: "Grim Dawn".into() }),
        ]
        .into_iter()
        .collect();
        let names = HintNames {
            slot_info: &slot_info,
            catalog: &catalog,
        };
        let mut hints = vec![hint(1, 500, true), hint(2, 900, false), hint(1, 500, false)];
        hints[1].item_flags = 0b100;
        let available: BTreeSet<i64> = [500].into_iter().collect();

        let rows = hint_rows(&hints, Some(PlayerId(1)), &available, &names);
        let summary: Vec<(String, String, HintStatus)> = rows
            .iter()
            .map(|row| (row.finding_player.clone(), row.location.clone(), row.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Ana".into(), "Depraved Sanctuary Chest".into(), HintStatus::InLogic),
                ("Bo".into(), "900".into(), HintStatus::NotFound),
                ("Ana".into(), "Depraved Sanctuary Chest".into(), HintStatus::Found),
            ]
        );
        assert_eq!(rows[0].item, "Strange Key");
        assert_eq!(rows[0].receiving_player, "Bo");
        assert_eq!(rows[0].entrance, "Vanilla");
        assert_eq!(rows[0].item_flags, ItemFlags::PROGRESSION);
        assert_eq!(rows[1].item_flags, ItemFlags::TRAP);
        assert!(rows[0].striped && !rows[1].striped);
    }
}

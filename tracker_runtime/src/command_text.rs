use thiserror::Error;

use crate::{InventoryView, MapSelector, TrackerCommand};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("unexpected argument '{value}' for {command}")]
    UnexpectedArgument {
        value: String,
        command: &'static str,
    },
}

/// Parse one console line.
///
/// The verb is case-insensitive. `manually_collect` and `load_map` take the
/// remainder of the line verbatim so item and map names may contain spaces; a
/// purely numeric `load_map` argument selects a map by index.
pub fn parse_command_line(input: &str) -> Result<TrackerCommand, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let (verb, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (trimmed, ""),
    };
    let verb = verb.trim_start_matches('/').to_ascii_lowercase();

    match verb.as_str() {
        "inventory" => no_argument(rest, "inventory", TrackerCommand::Inventory(InventoryView::All)),
        "prog_inventory" => no_argument(
            rest,
            "prog_inventory",
            TrackerCommand::Inventory(InventoryView::Progression),
        ),
        "event_inventory" => no_argument(
            rest,
            "event_inventory",
            TrackerCommand::Inventory(InventoryView::Events),
        ),
        "manually_collect" => {
            if rest.is_empty() {
                return Err(CommandParseError::MissingArgument("item"));
            }
            Ok(TrackerCommand::ManuallyCollect {
                item: rest.to_string(),
            })
        }
        "reset_manually_collect" => no_argument(
            rest,
            "reset_manually_collect",
            TrackerCommand::ResetManuallyCollect,
        ),
        "load_map" => {
            if rest.is_empty() {
                return Err(CommandParseError::MissingArgument("map"));
            }
            let selector = match rest.parse::<usize>() {
                Ok(index) => MapSelector::Index(index),
                Err(_) => MapSelector::Name(rest.to_string()),
            };
            Ok(TrackerCommand::LoadMap(selector))
        }
        "list_maps" => no_argument(rest, "list_maps", TrackerCommand::ListMaps),
        "refresh" => no_argument(rest, "refresh", TrackerCommand::Refresh),
        "quit" | "exit" => Ok(TrackerCommand::Quit),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn no_argument(
    rest: &str,
    command: &'static str,
    parsed: TrackerCommand,
) -> Result<TrackerCommand, CommandParseError> {
    if rest.is_empty() {
        Ok(parsed)
    } else {
        Err(CommandParseError::UnexpectedArgument {
            value: rest.to_string(),
            command,
        })
    }
}

//! Parser for the local operator console: one line of stdin, one
//! [`Command`]. This is a developer/debug surface, not a network
//! protocol — malformed input is reported and ignored rather than
//! treated as fatal.

use freeserf_sim::Command;
use freeserf_types::{BuildingType, Direction, FlagId, Resource};

/// Parse one console line into a [`Command`].
///
/// Recognized forms (whitespace-separated, first word is the verb):
///
/// - `flag <player> <pos>`
/// - `road <player> <from_flag> <dir,dir,...>` (directions 0..6)
/// - `build <player> <pos> <building_type_index>`
/// - `demolish <player> <pos>`
/// - `priority <player> <resource_index> <value>`
/// - `occupation <player> <level> <min> <max>`
/// - `geologist <flag>`
/// - `attack <player> <target_flag> <knights>`
/// - `pause` / `resume`
/// - `speed <game_speed>`
///
/// # Errors
///
/// Returns a description of what was wrong with the line.
pub fn parse_line(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(|| "empty command".to_owned())?;

    match verb {
        "flag" => {
            let player = next_u8(&mut words, "player")?;
            let pos = next_u32(&mut words, "pos")?;
            Ok(Command::BuildFlag { player, pos })
        }
        "road" => {
            let player = next_u8(&mut words, "player")?;
            let from = FlagId::from_index(next_u32(&mut words, "from_flag")?);
            let dirs = words
                .next()
                .ok_or_else(|| "missing direction list".to_owned())?;
            let directions = dirs
                .split(',')
                .map(|d| {
                    d.trim()
                        .parse::<u8>()
                        .ok()
                        .and_then(Direction::from_index)
                        .ok_or_else(|| format!("bad direction: {d}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Command::BuildRoad {
                player,
                from,
                directions,
            })
        }
        "build" => {
            let player = next_u8(&mut words, "player")?;
            let pos = next_u32(&mut words, "pos")?;
            let kind_idx = next_u8(&mut words, "building_type")?;
            let kind = BuildingType::from_index(kind_idx)
                .ok_or_else(|| format!("unknown building type index: {kind_idx}"))?;
            Ok(Command::BuildBuilding { player, pos, kind })
        }
        "demolish" => {
            let player = next_u8(&mut words, "player")?;
            let pos = next_u32(&mut words, "pos")?;
            Ok(Command::Demolish { player, pos })
        }
        "priority" => {
            let player = next_u8(&mut words, "player")?;
            let resource_idx = next_u8(&mut words, "resource")?;
            let resource = Resource::from_index(resource_idx)
                .ok_or_else(|| format!("unknown resource index: {resource_idx}"))?;
            let value = next_u8(&mut words, "value")?;
            Ok(Command::SetPriority {
                player,
                resource,
                value,
            })
        }
        "occupation" => {
            let player = next_u8(&mut words, "player")?;
            let level = next_u8(&mut words, "level")?;
            let min = next_u8(&mut words, "min")?;
            let max = next_u8(&mut words, "max")?;
            Ok(Command::SetKnightOccupation {
                player,
                level,
                min,
                max,
            })
        }
        "geologist" => {
            let flag = FlagId::from_index(next_u32(&mut words, "flag")?);
            Ok(Command::SendGeologist { flag })
        }
        "attack" => {
            let player = next_u8(&mut words, "player")?;
            let target_flag = FlagId::from_index(next_u32(&mut words, "target_flag")?);
            let knights = next_u8(&mut words, "knights")?;
            Ok(Command::Attack {
                player,
                target_flag,
                knights,
            })
        }
        "pause" => Ok(Command::Pause { on: true }),
        "resume" => Ok(Command::Pause { on: false }),
        "speed" => {
            let speed = next_u32(&mut words, "speed")?;
            Ok(Command::SetGameSpeed { speed })
        }
        other => Err(format!("unrecognized command: {other}")),
    }
}

fn next_u8<'a>(words: &mut impl Iterator<Item = &'a str>, field: &str) -> Result<u8, String> {
    words
        .next()
        .ok_or_else(|| format!("missing {field}"))?
        .parse()
        .map_err(|_| format!("bad {field}"))
}

fn next_u32<'a>(words: &mut impl Iterator<Item = &'a str>, field: &str) -> Result<u32, String> {
    words
        .next()
        .ok_or_else(|| format!("missing {field}"))?
        .parse()
        .map_err(|_| format!("bad {field}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_pause_and_resume() {
        assert_eq!(parse_line("pause").unwrap(), Command::Pause { on: true });
        assert_eq!(parse_line("resume").unwrap(), Command::Pause { on: false });
    }

    #[test]
    fn parses_build_flag() {
        let cmd = parse_line("flag 0 1234").unwrap();
        assert_eq!(cmd, Command::BuildFlag { player: 0, pos: 1234 });
    }

    #[test]
    fn parses_road_with_direction_list() {
        let cmd = parse_line("road 0 5 0,1,2").unwrap();
        match cmd {
            Command::BuildRoad { directions, .. } => assert_eq!(directions.len(), 3),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!(parse_line("frobnicate 1 2 3").is_err());
    }

    #[test]
    fn rejects_missing_arguments() {
        assert!(parse_line("flag 0").is_err());
    }
}

//! Match event log.
//!
//! The rules engine buffers the side effects of the acting team's calls in a
//! [`TurnDeltas`]; the orchestrator drains that buffer once per turn into an
//! [`EventLog`]. The finished [`MatchRecord`] is plain serde data:
//!
//! ```text
//! {
//!   "metadata":    { game_name, map_name, map_height, map_width, red_bot,
//!                    blue_bot, initial_metal, winner, win_reason },
//!   "initial_map": { passability, metal, terraformed, visible },
//!   "turns":       [ { team, turn_number, metal, num_robots, time_left,
//!                      tiles_explored, tiles_terraformed, robot_changes,
//!                      timed_out }, ... ]
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::{Coord, Map, Robot, RobotId, RobotKind, Team, Terrain};

/// Error reading or writing a match record.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Filesystem failure.
    #[error("replay io: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization failure.
    #[error("replay json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why the winner won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    /// The opponent exhausted its time budget.
    Timeout,
    /// More tiles terraformed at the turn limit.
    Terraformed,
    /// Tied on tiles, more surviving robots.
    Robots,
    /// Tied on robots, more metal.
    Metal,
    /// Tied on metal, more time left.
    Time,
    /// Fully tied; Red wins by default.
    Default,
}

/// A robot appearing, moving or disappearing.
///
/// Removed robots are recorded with row and col `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotChange {
    /// Robot id.
    pub id: RobotId,
    /// New row, or -1 if removed.
    pub row: i32,
    /// New column, or -1 if removed.
    pub col: i32,
    /// Kind tag.
    pub kind: RobotKind,
    /// Battery after the change.
    pub battery: u32,
    /// Owner.
    pub team: Team,
}

impl RobotChange {
    /// Record `robot` at its current position.
    #[must_use]
    pub const fn placed(robot: &Robot) -> Self {
        Self {
            id: robot.id,
            row: robot.coord.row,
            col: robot.coord.col,
            kind: robot.kind,
            battery: robot.battery,
            team: robot.team,
        }
    }

    /// Record `robot` as removed.
    #[must_use]
    pub const fn removed(robot: &Robot) -> Self {
        Self {
            id: robot.id,
            row: -1,
            col: -1,
            kind: robot.kind,
            battery: robot.battery,
            team: robot.team,
        }
    }

    /// Whether this change removes the robot.
    #[must_use]
    pub const fn is_removal(&self) -> bool {
        self.row < 0 && self.col < 0
    }
}

/// Side effects accumulated during one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnDeltas {
    /// Tiles whose fog was cleared, in order.
    pub explored: Vec<Coord>,
    /// Tiles terraformed, one entry per step.
    pub terraformed: Vec<Coord>,
    /// Robot changes, in order.
    pub robot_changes: Vec<RobotChange>,
}

impl TurnDeltas {
    /// Append explored tiles.
    pub fn add_explored(&mut self, tiles: &[Coord]) {
        self.explored.extend_from_slice(tiles);
    }

    /// Append a terraformed tile.
    pub fn add_terraformed(&mut self, coord: Coord) {
        self.terraformed.push(coord);
    }

    /// Append a robot placement.
    pub fn add_robot(&mut self, robot: &Robot) {
        self.robot_changes.push(RobotChange::placed(robot));
    }

    /// Append a robot removal.
    pub fn add_removal(&mut self, robot: &Robot) {
        self.robot_changes.push(RobotChange::removed(robot));
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.explored.is_empty() && self.terraformed.is_empty() && self.robot_changes.is_empty()
    }
}

/// Match-level facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Game name.
    pub game_name: String,
    /// Map name.
    pub map_name: String,
    /// Map height.
    pub map_height: u16,
    /// Map width.
    pub map_width: u16,
    /// Red bot name.
    pub red_bot: String,
    /// Blue bot name.
    pub blue_bot: String,
    /// Metal each team starts with.
    pub initial_metal: u32,
    /// Winner, once decided.
    pub winner: Option<Team>,
    /// Why the winner won.
    pub win_reason: Option<WinReason>,
}

/// Static map facts at match start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialMap {
    /// Impassable tiles as `(row, col)`.
    pub passability: Vec<(i32, i32)>,
    /// Mining tiles as `(row, col, yield)`.
    pub metal: Vec<(i32, i32, u32)>,
    /// Nonzero terraform levels as `(row, col, level)`.
    pub terraformed: Vec<(i32, i32, i32)>,
    /// Initially visible tiles as `(row, col, team number)`.
    pub visible: Vec<(i32, i32, u8)>,
}

impl InitialMap {
    /// Collect the initial facts of `map`.
    #[must_use]
    pub fn from_map(map: &Map) -> Self {
        let mut initial = Self::default();
        for (coord, tile) in map.iter() {
            let (row, col) = coord.into();
            match tile.terrain {
                Terrain::Impassable => initial.passability.push((row, col)),
                Terrain::Mining => initial.metal.push((row, col, tile.mining)),
                Terrain::Terraformable if tile.terraform != 0 => {
                    initial.terraformed.push((row, col, tile.terraform));
                }
                Terrain::Terraformable => {}
            }
            for team in [Team::Red, Team::Blue] {
                if !tile.is_fogged(team) {
                    initial.visible.push((row, col, team.number()));
                }
            }
        }
        initial
    }
}

/// One team's half of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Acting team.
    pub team: Team,
    /// 1-based turn number.
    pub turn_number: u32,
    /// Metal after the turn.
    pub metal: u32,
    /// Robots owned after the turn.
    pub num_robots: usize,
    /// Seconds of budget left after the turn.
    pub time_left: f64,
    /// Tiles whose fog was cleared.
    pub tiles_explored: Vec<Coord>,
    /// Tiles terraformed.
    pub tiles_terraformed: Vec<Coord>,
    /// Robot changes.
    pub robot_changes: Vec<RobotChange>,
    /// The team ran out of time during this turn.
    #[serde(default)]
    pub timed_out: bool,
}

/// Complete serialized match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Match-level facts.
    pub metadata: Metadata,
    /// Static map facts.
    pub initial_map: InitialMap,
    /// Turn records in play order.
    pub turns: Vec<TurnRecord>,
}

impl MatchRecord {
    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid record.
    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the record to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ReplayError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a record from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

/// Builder for a [`MatchRecord`], fed by the orchestrator.
#[derive(Debug, Clone)]
pub struct EventLog {
    record: MatchRecord,
}

impl EventLog {
    /// Start a log.
    #[must_use]
    pub const fn new(metadata: Metadata, initial_map: InitialMap) -> Self {
        Self {
            record: MatchRecord {
                metadata,
                initial_map,
                turns: Vec::new(),
            },
        }
    }

    /// Append a completed turn with its drained deltas.
    pub fn push_turn(
        &mut self,
        team: Team,
        turn_number: u32,
        metal: u32,
        num_robots: usize,
        time_left: Duration,
        deltas: TurnDeltas,
    ) {
        self.record.turns.push(TurnRecord {
            team,
            turn_number,
            metal,
            num_robots,
            time_left: time_left.as_secs_f64(),
            tiles_explored: deltas.explored,
            tiles_terraformed: deltas.terraformed,
            robot_changes: deltas.robot_changes,
            timed_out: false,
        });
    }

    /// Append the record of a turn that ran out of time. Its deltas are
    /// discarded.
    pub fn push_timeout(&mut self, team: Team, turn_number: u32, metal: u32, num_robots: usize) {
        self.record.turns.push(TurnRecord {
            team,
            turn_number,
            metal,
            num_robots,
            time_left: 0.0,
            tiles_explored: Vec::new(),
            tiles_terraformed: Vec::new(),
            robot_changes: Vec::new(),
            timed_out: true,
        });
    }

    /// Record the result.
    pub fn set_winner(&mut self, team: Team, reason: WinReason) {
        self.record.metadata.winner = Some(team);
        self.record.metadata.win_reason = Some(reason);
    }

    /// Turns so far.
    #[must_use]
    pub fn turns(&self) -> &[TurnRecord] {
        &self.record.turns
    }

    /// Finish and return the record.
    #[must_use]
    pub fn finish(self) -> MatchRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Coord;

    fn metadata() -> Metadata {
        Metadata {
            game_name: "g".to_string(),
            map_name: "m".to_string(),
            map_height: 3,
            map_width: 5,
            red_bot: "r".to_string(),
            blue_bot: "b".to_string(),
            initial_metal: 200,
            winner: None,
            win_reason: None,
        }
    }

    fn robot() -> Robot {
        Robot::new(RobotId(3), RobotKind::Explorer, Team::Red, Coord::new(1, 2))
    }

    #[test]
    fn test_removal_sentinel() {
        let change = RobotChange::removed(&robot());
        assert_eq!((change.row, change.col), (-1, -1));
        assert!(change.is_removal());
        assert!(!RobotChange::placed(&robot()).is_removal());
    }

    #[test]
    fn test_deltas_accumulate_in_order() {
        let mut deltas = TurnDeltas::default();
        assert!(deltas.is_empty());
        deltas.add_explored(&[Coord::new(0, 0), Coord::new(0, 1)]);
        deltas.add_terraformed(Coord::new(2, 2));
        deltas.add_robot(&robot());
        deltas.add_removal(&robot());
        assert_eq!(deltas.explored, vec![Coord::new(0, 0), Coord::new(0, 1)]);
        assert_eq!(deltas.robot_changes.len(), 2);
        assert!(deltas.robot_changes[1].is_removal());
        assert_eq!(std::mem::take(&mut deltas).terraformed.len(), 1);
        assert!(deltas.is_empty());
    }

    #[test]
    fn test_initial_map_facts() {
        let json = r#"[[["T",5,0],["M",0,12]],[["I",0,0],["T",-5,0]]]"#;
        let map = Map::from_json(json, 1).unwrap();
        let initial = InitialMap::from_map(&map);
        assert_eq!(initial.passability, vec![(1, 0)]);
        assert_eq!(initial.metal, vec![(0, 1, 12)]);
        assert_eq!(initial.terraformed, vec![(0, 0, 5), (1, 1, -5)]);
        // 2x2 map: both bases see everything.
        assert_eq!(initial.visible.len(), 8);
        assert_eq!(initial.visible[0], (0, 0, 1));
        assert_eq!(initial.visible[1], (0, 0, 2));
    }

    #[test]
    fn test_timeout_record() {
        let mut log = EventLog::new(metadata(), InitialMap::default());
        log.push_timeout(Team::Blue, 4, 230, 2);
        log.set_winner(Team::Red, WinReason::Timeout);
        let record = log.finish();
        let turn = &record.turns[0];
        assert!(turn.timed_out);
        assert!(turn.time_left.abs() < f64::EPSILON);
        assert!(turn.robot_changes.is_empty());
        assert_eq!(record.metadata.winner, Some(Team::Red));
    }

    #[test]
    fn test_record_json_roundtrip() {
        let mut log = EventLog::new(metadata(), InitialMap::default());
        let mut deltas = TurnDeltas::default();
        let explored = [Coord::new(3, 1), Coord::new(0, 2), Coord::new(2, 0)];
        deltas.add_explored(&explored);
        deltas.add_terraformed(Coord::new(2, 2));
        deltas.add_terraformed(Coord::new(1, 0));
        let mut moved = robot();
        deltas.add_robot(&moved);
        moved.coord = Coord::new(0, 0);
        deltas.add_robot(&moved);
        deltas.add_removal(&moved);
        log.push_turn(Team::Blue, 1, 150, 1, Duration::from_millis(1500), deltas);
        log.set_winner(Team::Blue, WinReason::Terraformed);
        let record = log.finish();

        let json = record.to_json().unwrap();
        assert!(json.contains("\"win_reason\":\"terraformed\""));
        assert!(json.contains("\"kind\":\"e\""));
        assert!(json.contains("\"tiles_explored\":[[3,1],[0,2],[2,0]]"));
        let loaded = MatchRecord::from_json(&json).unwrap();
        assert_eq!(loaded, record);

        let turn = &loaded.turns[0];
        assert_eq!(turn.tiles_explored, explored.to_vec());
        assert_eq!(turn.tiles_terraformed, vec![Coord::new(2, 2), Coord::new(1, 0)]);
        let positions: Vec<_> = turn.robot_changes.iter().map(|c| (c.row, c.col)).collect();
        assert_eq!(positions[1..], [(0, 0), (-1, -1)]);
        assert!(turn.robot_changes[2].is_removal());
    }

    #[test]
    fn test_save_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.json");
        let record = EventLog::new(metadata(), InitialMap::default()).finish();
        record.save(&path).unwrap();
        assert_eq!(MatchRecord::load(&path).unwrap(), record);
        assert!(matches!(
            MatchRecord::load(&dir.path().join("missing.json")),
            Err(ReplayError::Io(_))
        ));
    }
}

//! Robots and their per-kind behaviour.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ActionError, Fault, Illegal};
use crate::game::constants::{
    EXPLORER_ACTION_COST, MAX_BATTERY, MINER_ACTION_COST, TERRAFORMER_ACTION_COST, TERRAFORM_MAX,
};
use crate::game::{Coord, Map, Team, TileState};

/// Unique robot identifier, allocated by the rules engine and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RobotId(pub u32);

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "robot_{}", self.0)
    }
}

/// Robot specialisation.
///
/// Serialized with the single-letter tags used by the replay format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RobotKind {
    /// Mines metal from mining tiles.
    #[serde(rename = "m")]
    Miner,
    /// Clears fog around itself.
    #[serde(rename = "e")]
    Explorer,
    /// Pushes the terraform level of its tile toward its team.
    #[serde(rename = "t")]
    Terraformer,
}

/// What a successful action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Metal mined, to be credited to the owner.
    Mined(u32),
    /// The tile that was terraformed.
    Terraformed(Coord),
    /// Tiles whose fog was cleared.
    Explored(Vec<Coord>),
}

impl RobotKind {
    /// All kinds.
    pub const ALL: [RobotKind; 3] = [RobotKind::Miner, RobotKind::Explorer, RobotKind::Terraformer];

    /// Battery spent per action.
    #[must_use]
    pub const fn action_cost(self) -> u32 {
        match self {
            RobotKind::Miner => MINER_ACTION_COST,
            RobotKind::Explorer => EXPLORER_ACTION_COST,
            RobotKind::Terraformer => TERRAFORMER_ACTION_COST,
        }
    }

    /// Kind-specific preconditions for `robot` acting on `map`.
    ///
    /// # Errors
    ///
    /// Returns the first violated precondition.
    pub fn check_action(self, robot: &Robot, map: &Map) -> Result<(), Illegal> {
        robot.check_ready()?;
        let coord = robot.coord;
        match self {
            RobotKind::Miner => {
                if map.tile_state(coord, robot.team) != TileState::Mining {
                    return Err(Illegal::NotMining(coord));
                }
            }
            RobotKind::Terraformer => {
                if map.tile_state(coord, robot.team) != TileState::Terraformable {
                    return Err(Illegal::NotTerraformable(coord));
                }
                let level = map.get(coord).map_or(0, |tile| tile.terraform);
                if (level + robot.team.sign()).abs() > TERRAFORM_MAX {
                    return Err(Illegal::TerraformCapped(coord));
                }
            }
            RobotKind::Explorer => {
                if !map.has_fog_around(coord, robot.team) {
                    return Err(Illegal::NothingToExplore(coord));
                }
            }
        }
        Ok(())
    }

    /// Check, then apply this kind's action and debit the battery.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Illegal`] if a precondition fails, or
    /// [`ActionError::Fault`] if the map rejects an already validated action.
    pub fn perform(self, robot: &mut Robot, map: &mut Map) -> Result<ActionOutcome, ActionError> {
        self.check_action(robot, map)?;

        robot.acted = true;
        robot.battery -= self.action_cost();

        let coord = robot.coord;
        let team = robot.team;
        let outcome = match self {
            RobotKind::Miner => {
                let mined = map.mine(coord, team)?;
                ActionOutcome::Mined(mined.ok_or(Fault::InvalidMine { coord, team })?)
            }
            RobotKind::Terraformer => {
                if !map.terraform(coord, team)? {
                    return Err(Fault::InvalidTerraform { coord, team }.into());
                }
                ActionOutcome::Terraformed(coord)
            }
            RobotKind::Explorer => ActionOutcome::Explored(map.explore(coord, team)?),
        };
        Ok(outcome)
    }
}

impl fmt::Display for RobotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotKind::Miner => write!(f, "Miner"),
            RobotKind::Explorer => write!(f, "Explorer"),
            RobotKind::Terraformer => write!(f, "Terraformer"),
        }
    }
}

/// A robot owned by the rules engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Robot {
    /// Identifier.
    pub id: RobotId,
    /// Specialisation.
    pub kind: RobotKind,
    /// Owner.
    pub team: Team,
    /// Position.
    pub coord: Coord,
    /// Remaining battery, within `[0, MAX_BATTERY]`.
    pub battery: u32,
    /// Whether the robot moved this turn.
    pub moved: bool,
    /// Whether the robot acted this turn.
    pub acted: bool,
}

impl Robot {
    /// Create a fully charged robot that cannot move or act until its
    /// owner's next turn.
    #[must_use]
    pub const fn new(id: RobotId, kind: RobotKind, team: Team, coord: Coord) -> Self {
        Self {
            id,
            kind,
            team,
            coord,
            battery: MAX_BATTERY,
            moved: true,
            acted: true,
        }
    }

    /// Add charge, capped at [`MAX_BATTERY`].
    pub fn charge(&mut self, amount: u32) {
        self.battery = self.battery.saturating_add(amount).min(MAX_BATTERY);
    }

    /// Clear the per-turn flags.
    pub fn reset_turn(&mut self) {
        self.moved = false;
        self.acted = false;
    }

    /// Checks shared by every kind: not yet acted and enough battery.
    ///
    /// # Errors
    ///
    /// Returns the violated precondition.
    pub fn check_ready(&self) -> Result<(), Illegal> {
        if self.acted {
            return Err(Illegal::AlreadyActed(self.id));
        }
        let cost = self.kind.action_cost();
        if self.battery < cost {
            return Err(Illegal::LowBattery {
                robot: self.id,
                has: self.battery,
                needs: cost,
            });
        }
        Ok(())
    }

    /// Snapshot handed to players.
    #[must_use]
    pub const fn info(&self) -> RobotInfo {
        RobotInfo {
            id: self.id,
            kind: self.kind,
            team: self.team,
            coord: self.coord,
            battery: self.battery,
            action_cost: self.kind.action_cost(),
            moved: self.moved,
            acted: self.acted,
        }
    }
}

impl fmt::Display for Robot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}, {}, B:{}", self.id, self.coord, self.team, self.battery)
    }
}

/// Read-only copy of a robot's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotInfo {
    /// Identifier.
    pub id: RobotId,
    /// Specialisation.
    pub kind: RobotKind,
    /// Owner.
    pub team: Team,
    /// Position.
    pub coord: Coord,
    /// Remaining battery.
    pub battery: u32,
    /// Battery spent per action.
    pub action_cost: u32,
    /// Whether it moved this turn.
    pub moved: bool,
    /// Whether it acted this turn.
    pub acted: bool,
}

//! Error types for the simulation kernel.
//!
//! Two disjoint families:
//! - [`Illegal`]: a player attempted something the rules forbid. Never fatal.
//! - [`Fault`]: an engine invariant broke. Fatal for the current match.

use thiserror::Error;

use crate::game::{Coord, RobotId, Team};

/// A rule violation caused by the calling player.
///
/// Every mutating call on the rules engine has a matching `can_*` predicate
/// that reports these without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Illegal {
    /// The robot id is not one of the caller's robots.
    #[error("unknown robot {0}")]
    UnknownRobot(RobotId),
    /// The robot already moved this turn.
    #[error("{0} has already moved this turn")]
    AlreadyMoved(RobotId),
    /// The robot already acted this turn.
    #[error("{0} has already acted this turn")]
    AlreadyActed(RobotId),
    /// The robot's battery cannot cover its action cost.
    #[error("{robot} has {has} battery, needs {needs}")]
    LowBattery {
        /// Robot attempting the action.
        robot: RobotId,
        /// Current battery.
        has: u32,
        /// Action cost.
        needs: u32,
    },
    /// The tile is off the map or hidden by fog of war.
    #[error("tile {0} is out of bounds or not visible")]
    IllegalTile(Coord),
    /// The tile cannot be entered or built on.
    #[error("tile {0} is impassable")]
    ImpassableTile(Coord),
    /// The tile is not terraformed in the caller's favour.
    #[error("tile {0} is not terraformed by your team")]
    NotTerraformed(Coord),
    /// Another robot stands on the tile.
    #[error("tile {0} is occupied")]
    Occupied(Coord),
    /// Not enough metal to pay for the operation.
    #[error("not enough metal: has {has}, needs {needs}")]
    InsufficientMetal {
        /// Current metal.
        has: u32,
        /// Operation cost.
        needs: u32,
    },
    /// A miner tried to mine off a mining tile.
    #[error("tile {0} is not a mining tile")]
    NotMining(Coord),
    /// A terraformer stands on a tile that cannot be terraformed.
    #[error("tile {0} is not terraformable")]
    NotTerraformable(Coord),
    /// The tile is already at the caller's terraform cap.
    #[error("tile {0} is already fully terraformed")]
    TerraformCapped(Coord),
    /// An explorer has no fogged tile around it.
    #[error("no fogged tiles around {0}")]
    NothingToExplore(Coord),
    /// The view was used outside of the turn it was issued for.
    #[error("{0} view used outside of its turn")]
    InactiveView(Team),
}

/// A broken engine invariant.
///
/// These indicate a kernel bug rather than a player mistake: the rules
/// engine validated the request before reaching the code that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// Terraform applied to a tile that should have been rejected.
    #[error("terraform on invalid tile {coord} for {team}")]
    InvalidTerraform {
        /// Target tile.
        coord: Coord,
        /// Acting team.
        team: Team,
    },
    /// Explore centred on a tile that should have been rejected.
    #[error("explore on invalid tile {coord} for {team}")]
    InvalidExplore {
        /// Centre tile.
        coord: Coord,
        /// Acting team.
        team: Team,
    },
    /// Mine on a tile that should have been rejected.
    #[error("mine on invalid tile {coord} for {team}")]
    InvalidMine {
        /// Target tile.
        coord: Coord,
        /// Acting team.
        team: Team,
    },
    /// A robot id referenced internally is absent from the arena.
    #[error("robot {0} missing from the arena")]
    UnknownRobot(RobotId),
    /// A world invariant was violated after a turn.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

/// Error returned by mutating calls made through a team view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The player broke a rule.
    #[error(transparent)]
    Illegal(#[from] Illegal),
    /// The engine broke an invariant.
    #[error("internal fault: {0}")]
    Fault(#[from] Fault),
}

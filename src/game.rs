//! Game layer for Terra.
//!
//! Implements the rules of the simulation:
//! - Map with tiles (terraformable, mining, impassable) and per-team fog
//! - Robots (miners, explorers, terraformers) with batteries
//! - Rules engine validating and applying every mutation
//! - Pathfinding under partial information
//! - Team-scoped views handed to player strategies

pub mod constants;
pub mod invariants;
mod map;
pub mod pathfinding;
mod player;
mod robot;
mod rules;
mod team;
mod view;

pub use invariants::{check_invariants, InvariantViolation};
pub use map::{Coord, Direction, Map, MapError, RawTile, Terrain, Tile, TileInfo, TileState};
pub use pathfinding::Route;
pub use player::{Idle, Player};
pub use robot::{ActionOutcome, Robot, RobotId, RobotInfo, RobotKind};
pub use rules::{Economy, GameInfo, MoveOutcome, RulesEngine, Standing};
pub use team::Team;
pub use view::TeamView;

// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Terra: a two-team, turn-based robot terraforming simulation.
//!
//! Each team starts with a few base tiles and a pool of metal. Robots are
//! spawned next to terraformed tiles, move across a fogged grid, mine metal
//! and push tile terraform levels toward their own side. After the last turn
//! the team with more terraformed tiles wins.
//!
//! Player strategies never touch the world directly. They receive a
//! [`TeamView`] scoped to their team and to the current turn, and every
//! mutation is checked by the [`RulesEngine`] before it is applied.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Arena (turn loop, time budget)    │
//! ├──────────────────┬──────────────────┤
//! │  Player threads  │    Event log     │
//! │   (TeamView)     │    (replay)      │
//! ├──────────────────┴──────────────────┤
//! │  Rules engine (check_ / can_ / do)  │
//! ├─────────────────────────────────────┤
//! │  Map, fog, robots, pathfinding      │
//! └─────────────────────────────────────┘
//! ```

pub mod arena;
pub mod error;
pub mod game;
pub mod replay;

pub use arena::{Arena, MatchConfig, MatchError};
pub use error::{ActionError, Fault, Illegal};

// Re-export key game types at crate root for convenience
pub use game::{
    Coord, Direction, Map, Player, RobotId, RobotInfo, RobotKind, RulesEngine, Team, TeamView,
};
pub use replay::{MatchRecord, WinReason};

//! Breadth-first pathfinding under fog of war.
//!
//! Searches only tiles the team can currently see and walk on, expanding
//! neighbours in [`Direction::ALL`] order so ties resolve the same way every
//! time.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::game::{Coord, Direction, Map, Team};

/// Result of a successful search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// First step to take; `None` when already at the goal.
    pub first_step: Option<Direction>,
    /// Number of steps to the goal.
    pub hops: u32,
}

/// Find the shortest route from `start` to the first tile satisfying
/// `is_goal`.
///
/// Tiles for which `blocked` returns `true` are never entered. Returns
/// `None` if `start` is not a visible passable tile or no goal is
/// reachable.
pub fn search(
    map: &Map,
    team: Team,
    start: Coord,
    is_goal: impl Fn(Coord) -> bool,
    blocked: impl Fn(Coord) -> bool,
) -> Option<Route> {
    if !map.tile_state(start, team).is_passable() {
        return None;
    }

    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([(start, None, 0u32)]);

    while let Some((coord, first_step, hops)) = queue.pop_front() {
        if is_goal(coord) {
            return Some(Route { first_step, hops });
        }
        for direction in Direction::ALL {
            let next = coord.step(direction);
            if !map.tile_state(next, team).is_passable() || blocked(next) {
                continue;
            }
            if visited.insert(next) {
                queue.push_back((next, first_step.or(Some(direction)), hops + 1));
            }
        }
    }

    None
}

/// Shortest route between two coordinates.
///
/// `None` if either end is not a visible passable tile or no path exists.
pub fn optimal_path(
    map: &Map,
    team: Team,
    start: Coord,
    goal: Coord,
    blocked: impl Fn(Coord) -> bool,
) -> Option<Route> {
    if !map.tile_state(goal, team).is_passable() {
        return None;
    }
    search(map, team, start, |c| c == goal, blocked)
}

/// Shortest route to the nearest tile terraformed in `team`'s favour.
pub fn nearest_base(
    map: &Map,
    team: Team,
    start: Coord,
    blocked: impl Fn(Coord) -> bool,
) -> Option<Route> {
    search(
        map,
        team,
        start,
        |c| map.is_terraformed(team, c).unwrap_or(false),
        blocked,
    )
}

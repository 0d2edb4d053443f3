//! World invariants - sanity checks that detect engine bugs.
//!
//! None of these can be broken through the rules engine's public mutators.
//! The orchestrator runs them after every turn and treats a violation as an
//! internal fault.

use std::collections::HashMap;

use crate::game::constants::{MAX_BATTERY, TERRAFORM_MAX};
use crate::game::{Coord, Map, Robot, RobotId, RulesEngine, Terrain};

/// Invariant violation error.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

fn violation(violations: &mut Vec<InvariantViolation>, message: String) {
    violations.push(InvariantViolation { message });
}

/// Check all invariants of the engine's world.
#[must_use]
pub fn check_invariants(engine: &RulesEngine) -> Vec<InvariantViolation> {
    let occupancy: HashMap<Coord, RobotId> = engine.occupancy().collect();
    check_world(engine.map(), engine.robots(), &occupancy)
}

/// Check map, robot and occupancy invariants.
///
/// Returns every violation found, or an empty list.
#[must_use]
pub fn check_world<'a>(
    map: &Map,
    robots: impl IntoIterator<Item = &'a Robot>,
    occupancy: &HashMap<Coord, RobotId>,
) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (coord, tile) in map.iter() {
        if tile.terraform.abs() > TERRAFORM_MAX {
            violation(
                &mut violations,
                format!("Tile {coord} has terraform {} beyond ±{TERRAFORM_MAX}", tile.terraform),
            );
        }
        if tile.terraform != 0 && tile.terrain != Terrain::Terraformable {
            violation(
                &mut violations,
                format!("Non-terraformable tile {coord} has terraform {}", tile.terraform),
            );
        }
        if tile.mining != 0 && tile.terrain != Terrain::Mining {
            violation(
                &mut violations,
                format!("Non-mining tile {coord} has mining {}", tile.mining),
            );
        }
    }

    let mut seen: HashMap<Coord, RobotId> = HashMap::new();
    let mut count = 0usize;
    for robot in robots {
        count += 1;
        if robot.battery > MAX_BATTERY {
            violation(
                &mut violations,
                format!("{} battery {} > max {MAX_BATTERY}", robot.id, robot.battery),
            );
        }
        match map.get(robot.coord) {
            None => violation(
                &mut violations,
                format!("{} is off the map at {}", robot.id, robot.coord),
            ),
            Some(tile) if tile.terrain == Terrain::Impassable => violation(
                &mut violations,
                format!("{} stands on impassable tile {}", robot.id, robot.coord),
            ),
            Some(_) => {}
        }
        if let Some(other) = seen.insert(robot.coord, robot.id) {
            violation(
                &mut violations,
                format!("{} and {other} share tile {}", robot.id, robot.coord),
            );
        }
        if occupancy.get(&robot.coord) != Some(&robot.id) {
            violation(
                &mut violations,
                format!("Occupancy index does not place {} at {}", robot.id, robot.coord),
            );
        }
    }

    if occupancy.len() != count {
        violation(
            &mut violations,
            format!("Occupancy index has {} entries for {count} robots", occupancy.len()),
        );
    }

    violations
}

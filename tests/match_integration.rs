//! Whole-match tests driving the arena with scripted players.
//!
//! Run with: cargo test match_integration

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use terra::arena::{Arena, MatchConfig};
use terra::error::{ActionError, Illegal};
use terra::game::{Idle, Map, MoveOutcome, Player};
use terra::replay::{MatchRecord, WinReason};
use terra::{Coord, Direction, RobotKind, Team, TeamView};

fn config(max_turns: u32) -> MatchConfig {
    MatchConfig {
        max_turns,
        time_limit_secs: 10.0,
        ..MatchConfig::default()
    }
}

/// Blue base, a 12-metal mine, open ground, Red base.
fn strip() -> Map {
    Map::from_json(r#"[[["T",5,0],["M",0,12],["T",0,0],["T",-5,0]]]"#, 1).unwrap()
}

fn play(map: Map, config: MatchConfig, blue: Box<dyn Player>, red: Box<dyn Player>) -> MatchRecord {
    Arena::new(map, config, blue, red).run().unwrap()
}

#[test]
fn test_idle_match_plays_every_half_turn() {
    let record = play(strip(), config(5), Box::new(Idle), Box::new(Idle));

    assert_eq!(record.turns.len(), 10);
    let order: Vec<_> = record.turns.iter().map(|t| (t.turn_number, t.team)).collect();
    assert_eq!(order[0], (1, Team::Blue));
    assert_eq!(order[1], (1, Team::Red));
    assert_eq!(order[9], (5, Team::Red));

    // Income arrives from turn 2 on.
    assert_eq!(record.turns[0].metal, 200);
    assert_eq!(record.turns[2].metal, 210);
    assert_eq!(record.turns[9].metal, 240);

    // Only the time budgets can differ.
    assert!(matches!(
        record.metadata.win_reason,
        Some(WinReason::Default | WinReason::Time)
    ));
}

#[test]
fn test_miner_spawns_moves_and_mines() {
    let blue = |view: &TeamView| -> Result<(), ActionError> {
        match view.turn()? {
            1 => {
                view.spawn_robot(RobotKind::Miner, Coord::new(0, 0))?;
            }
            2 => {
                let id = view.ally_robots()?[0].id;
                view.move_robot(id, Direction::Right)?;
                view.robot_action(id)?;
            }
            _ => {}
        }
        Ok(())
    };
    let record = play(strip(), config(2), Box::new(blue), Box::new(Idle));

    let blue_turns: Vec<_> = record.turns.iter().filter(|t| t.team == Team::Blue).collect();
    assert_eq!(blue_turns[0].metal, 150);
    assert_eq!(blue_turns[0].num_robots, 1);
    assert_eq!(blue_turns[0].robot_changes.len(), 1);
    // 150 + 10 income + 12 mined.
    assert_eq!(blue_turns[1].metal, 172);

    let moved = blue_turns[1].robot_changes[0];
    assert_eq!((moved.row, moved.col), (0, 1));
    assert_eq!(moved.kind, RobotKind::Miner);

    // One base each, but Blue has the only robot.
    assert_eq!(record.metadata.winner, Some(Team::Blue));
    assert_eq!(record.metadata.win_reason, Some(WinReason::Robots));
}

#[test]
fn test_terraformer_wins_on_tiles() {
    let map = Map::from_json(r#"[[["T",5,0],["T",0,0],["M",0,12],["T",-5,0]]]"#, 1).unwrap();
    let blue = |view: &TeamView| -> Result<(), ActionError> {
        match view.turn()? {
            1 => {
                view.spawn_robot(RobotKind::Terraformer, Coord::new(0, 0))?;
            }
            2 => {
                let id = view.ally_robots()?[0].id;
                view.move_robot(id, Direction::Right)?;
                assert!(!view.can_move_robot(id, Direction::Right));
                view.robot_action(id)?;
            }
            _ => {}
        }
        Ok(())
    };
    let red = |view: &TeamView| -> Result<(), ActionError> {
        if view.turn()? == 1 {
            view.spawn_robot(RobotKind::Explorer, Coord::new(0, 3))?;
        }
        Ok(())
    };
    let record = play(map, config(2), Box::new(blue), Box::new(red));

    let last_blue = record.turns.iter().rev().find(|t| t.team == Team::Blue).unwrap();
    assert_eq!(last_blue.tiles_terraformed, vec![Coord::new(0, 1)]);
    assert_eq!(record.metadata.winner, Some(Team::Blue));
    assert_eq!(record.metadata.win_reason, Some(WinReason::Terraformed));
}

#[test]
fn test_same_team_collision_destroys_both() {
    let map = Map::from_json(r#"[[["T",5,0],["T",5,0],["T",-5,0]]]"#, 1).unwrap();
    let outcome = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&outcome);
    let blue = move |view: &TeamView| -> Result<(), ActionError> {
        match view.turn()? {
            1 => {
                view.spawn_robot(RobotKind::Explorer, Coord::new(0, 0))?;
                view.spawn_robot(RobotKind::Explorer, Coord::new(0, 1))?;
            }
            2 => {
                let mover = view.robot_at(Coord::new(0, 0))?.unwrap().id;
                *seen.lock() = Some(view.move_robot(mover, Direction::Right)?);
            }
            _ => {}
        }
        Ok(())
    };
    let record = play(map, config(2), Box::new(blue), Box::new(Idle));

    let outcome = outcome.lock().take().unwrap();
    assert!(matches!(outcome, MoveOutcome::Collided { .. }));

    let turn_two = &record.turns[2];
    assert_eq!(turn_two.num_robots, 0);
    assert_eq!(turn_two.robot_changes.len(), 2);
    assert!(turn_two.robot_changes.iter().all(|c| c.is_removal()));
}

#[test]
fn test_overrunning_the_budget_forfeits() {
    let blue = |_view: &TeamView| -> Result<(), ActionError> {
        thread::sleep(Duration::from_millis(600));
        Ok(())
    };
    let config = MatchConfig {
        time_limit_secs: 0.2,
        ..config(10)
    };
    let record = play(strip(), config, Box::new(blue), Box::new(Idle));

    assert_eq!(record.turns.len(), 1);
    let turn = &record.turns[0];
    assert!(turn.timed_out);
    assert_eq!(turn.team, Team::Blue);
    assert!(turn.time_left.abs() < f64::EPSILON);
    assert_eq!(record.metadata.winner, Some(Team::Red));
    assert_eq!(record.metadata.win_reason, Some(WinReason::Timeout));
}

#[test]
fn test_time_is_debited_across_turns() {
    let blue = |_view: &TeamView| -> Result<(), ActionError> {
        thread::sleep(Duration::from_millis(30));
        Ok(())
    };
    let config = MatchConfig {
        time_limit_secs: 5.0,
        ..config(3)
    };
    let record = play(strip(), config, Box::new(blue), Box::new(Idle));

    let left: Vec<f64> = record
        .turns
        .iter()
        .filter(|t| t.team == Team::Blue)
        .map(|t| t.time_left)
        .collect();
    assert_eq!(left.len(), 3);
    assert!(left.windows(2).all(|w| w[1] < w[0]));
    assert!(left[2] <= 5.0 - 0.09);
    assert!(record.turns.iter().all(|t| !t.timed_out));
}

#[test]
fn test_player_errors_and_panics_only_abort_the_turn() {
    let blue = |view: &TeamView| -> Result<(), ActionError> {
        if view.turn()? == 1 {
            view.spawn_robot(RobotKind::Miner, Coord::new(0, 0))?;
            // Illegal: the tile is now occupied.
            view.spawn_robot(RobotKind::Miner, Coord::new(0, 0))?;
            unreachable!();
        }
        Ok(())
    };
    let red = |view: &TeamView| -> Result<(), ActionError> {
        assert!(view.turn()? > 2, "red gives up early");
        Ok(())
    };
    let record = play(strip(), config(4), Box::new(blue), Box::new(red));

    assert_eq!(record.turns.len(), 8);
    // The first spawn stands.
    assert_eq!(record.turns[0].num_robots, 1);
    assert_eq!(record.turns[0].metal, 150);
    assert!(record.turns.iter().all(|t| !t.timed_out));
}

#[test]
fn test_stale_view_is_refused() {
    let stash: Arc<Mutex<Option<TeamView>>> = Arc::new(Mutex::new(None));
    let result = Arc::new(Mutex::new(None));
    let (kept, seen) = (Arc::clone(&stash), Arc::clone(&result));

    let blue = move |view: &TeamView| -> Result<(), ActionError> {
        *kept.lock() = Some(view.clone());
        Ok(())
    };
    let red = move |_view: &TeamView| -> Result<(), ActionError> {
        if let Some(old) = stash.lock().as_ref() {
            *seen.lock() = Some(old.spawn_robot(RobotKind::Miner, Coord::new(0, 0)));
        }
        Ok(())
    };
    play(strip(), config(1), Box::new(blue), Box::new(red));

    let result = result.lock().take().unwrap();
    assert!(matches!(
        result,
        Err(ActionError::Illegal(Illegal::InactiveView(Team::Blue)))
    ));
}

#[test]
fn test_record_survives_json() {
    let blue = |view: &TeamView| -> Result<(), ActionError> {
        if view.turn()? == 1 {
            view.spawn_robot(RobotKind::Explorer, Coord::new(0, 0))?;
        }
        Ok(())
    };
    let record = play(strip(), config(2), Box::new(blue), Box::new(Idle));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("match.json");
    record.save(&path).unwrap();
    let loaded = MatchRecord::load(&path).unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.metadata.map_width, 4);
    assert_eq!(loaded.initial_map.metal, vec![(0, 1, 12)]);
}

#[test]
fn test_five_second_budget_six_second_sleep() {
    let blue = |_view: &TeamView| -> Result<(), ActionError> {
        thread::sleep(Duration::from_secs(6));
        Ok(())
    };
    let config = MatchConfig {
        time_limit_secs: 5.0,
        ..config(200)
    };
    let started = std::time::Instant::now();
    let record = play(strip(), config, Box::new(blue), Box::new(Idle));

    // The arena stops waiting at the deadline, not when the sleeper wakes.
    assert!(started.elapsed() < Duration::from_millis(5900));
    assert_eq!(record.turns.len(), 1);
    assert!(record.turns[0].timed_out);
    assert_eq!(record.metadata.winner, Some(Team::Red));
    assert_eq!(record.metadata.win_reason, Some(WinReason::Timeout));
}

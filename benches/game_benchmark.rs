//! Benchmarks for pathfinding and complete matches.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use terra::arena::{Arena, MatchConfig, generate_map};
use terra::error::ActionError;
use terra::game::pathfinding::optimal_path;
use terra::game::{Direction, Idle, Map, RobotKind, Team, TeamView};

/// Generate a map and lift all of Blue's fog by exploring from every base.
fn explored_map(seed: u64, size: u16) -> Map {
    let mut map = generate_map(seed, size, size, 1).unwrap();
    loop {
        let frontier: Vec<_> = map
            .iter()
            .map(|(coord, _)| coord)
            .filter(|&c| map.tile_state(c, Team::Blue).is_passable() && map.has_fog_around(c, Team::Blue))
            .collect();
        if frontier.is_empty() {
            return map;
        }
        for coord in frontier {
            map.explore(coord, Team::Blue).unwrap();
        }
    }
}

fn bench_pathfinding(c: &mut Criterion) {
    let map = explored_map(42, 48);
    let passable: Vec<_> = map
        .iter()
        .map(|(coord, _)| coord)
        .filter(|&c| map.tile_state(c, Team::Blue).is_passable())
        .collect();
    let (start, goal) = (passable[0], passable[passable.len() - 1]);

    c.bench_function("optimal_path_48x48", |b| {
        b.iter(|| optimal_path(black_box(&map), Team::Blue, black_box(start), black_box(goal), |_| false));
    });
}

/// Spawns an explorer each turn and walks every robot one step.
fn wanderer(view: &TeamView) -> Result<(), ActionError> {
    let info = view.info()?;
    let bases: Vec<_> = info
        .map
        .iter()
        .flatten()
        .flatten()
        .filter(|tile| tile.terraform > 0)
        .map(|tile| tile.coord)
        .collect();
    if let Some(&base) = bases.iter().find(|&&b| view.can_spawn_robot(b)) {
        view.spawn_robot(RobotKind::Explorer, base)?;
    }
    for robot in view.ally_robots()? {
        if let Some(&dir) = Direction::ALL.iter().find(|&&d| view.can_move_robot(robot.id, d)) {
            view.move_robot(robot.id, dir)?;
        }
        if view.can_robot_action(robot.id) {
            view.robot_action(robot.id)?;
        }
    }
    Ok(())
}

fn bench_full_match(c: &mut Criterion) {
    let config = MatchConfig {
        max_turns: 50,
        ..MatchConfig::default()
    };

    c.bench_function("match_50_turns_idle", |b| {
        b.iter(|| {
            let map = generate_map(black_box(7), 32, 32, 1).unwrap();
            Arena::new(map, config.clone(), Box::new(Idle), Box::new(Idle)).run().unwrap()
        });
    });

    c.bench_function("match_50_turns_wanderers", |b| {
        b.iter(|| {
            let map = generate_map(black_box(7), 32, 32, 1).unwrap();
            Arena::new(map, config.clone(), Box::new(wanderer), Box::new(wanderer)).run().unwrap()
        });
    });
}

criterion_group!(benches, bench_pathfinding, bench_full_match);
criterion_main!(benches);

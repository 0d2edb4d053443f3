//! The rules engine: sole owner and mutator of the world state.
//!
//! Every mutator comes in three flavours: `check_*` reports the specific
//! [`Illegal`] reason, `can_*` folds it to a `bool`, and the mutator itself
//! re-runs the check before applying anything. A failed check never changes
//! state.
//!
//! The engine is team-agnostic; [`TeamView`](crate::game::TeamView) pins
//! calls to the acting team and the current turn.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ActionError, Fault, Illegal};
use crate::game::pathfinding::{self, Route};
use crate::game::{ActionOutcome, Coord, Direction, Map, Robot, RobotId, RobotInfo, RobotKind};
use crate::game::{Team, TileInfo, TileState};
use crate::replay::TurnDeltas;

/// Economy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Economy {
    /// Metal each team starts with.
    pub initial_metal: u32,
    /// Metal granted at the start of each of a team's turns after the first.
    pub income: u32,
    /// Battery granted to robots standing on own-terraformed ground.
    pub charge: u32,
    /// Metal cost of a spawn.
    pub spawn_cost: u32,
    /// Metal cost of a transform.
    pub transform_cost: u32,
}

impl Default for Economy {
    fn default() -> Self {
        Self {
            initial_metal: 200,
            income: 10,
            charge: 30,
            spawn_cost: 50,
            transform_cost: 40,
        }
    }
}

/// Result of a successful move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The robot now stands on the destination.
    Moved(RobotInfo),
    /// The destination was occupied; both robots were destroyed.
    Collided {
        /// The robot that moved, as it was before removal.
        mover: RobotInfo,
        /// The robot that stood on the destination.
        occupant: RobotInfo,
    },
}

/// Final-score inputs for one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    /// Tiles terraformed in the team's favour.
    pub terraformed: usize,
    /// Robots alive.
    pub robots: usize,
    /// Metal held.
    pub metal: u32,
    /// Time budget left.
    pub time_left: Duration,
}

/// Everything a team can see at once.
#[derive(Debug, Clone, PartialEq)]
pub struct GameInfo {
    /// The viewing team.
    pub team: Team,
    /// Current turn, 1-based.
    pub turn: u32,
    /// Team metal.
    pub metal: u32,
    /// Team time budget left.
    pub time_left: Duration,
    /// Spawn cost.
    pub spawn_cost: u32,
    /// Transform cost.
    pub transform_cost: u32,
    /// Own robots.
    pub ally_robots: Vec<RobotInfo>,
    /// Visible enemy robots.
    pub enemy_robots: Vec<RobotInfo>,
    /// Visible tiles, fogged tiles `None`.
    pub map: Vec<Vec<Option<TileInfo>>>,
}

/// Authoritative match state.
#[derive(Debug)]
pub struct RulesEngine {
    map: Map,
    robots: BTreeMap<RobotId, Robot>,
    occupancy: HashMap<Coord, RobotId>,
    next_id: u32,
    metal: [u32; 2],
    time_left: [Duration; 2],
    turn: u32,
    team: Team,
    epoch: u64,
    active: bool,
    deltas: TurnDeltas,
    fault: Option<Fault>,
    economy: Economy,
}

impl RulesEngine {
    /// Create an engine with no robots. Both teams start with the initial
    /// metal and a `time_limit` budget.
    #[must_use]
    pub fn new(map: Map, economy: Economy, time_limit: Duration) -> Self {
        Self {
            map,
            robots: BTreeMap::new(),
            occupancy: HashMap::new(),
            next_id: 1,
            metal: [economy.initial_metal; 2],
            time_left: [time_limit; 2],
            turn: 1,
            team: Team::Blue,
            epoch: 0,
            active: false,
            deltas: TurnDeltas::default(),
            fault: None,
            economy,
        }
    }

    // ---- turn lifecycle -------------------------------------------------

    /// Start `team`'s half of `turn`: grant income after turn 1, reset robot
    /// flags, charge robots on own ground. Returns the new view epoch.
    pub fn begin_turn(&mut self, team: Team, turn: u32) -> u64 {
        self.team = team;
        self.turn = turn;
        if turn > 1 {
            let metal = &mut self.metal[team.index()];
            *metal = metal.saturating_add(self.economy.income);
        }
        for robot in self.robots.values_mut().filter(|r| r.team == team) {
            robot.reset_turn();
            if self.map.is_terraformed(team, robot.coord) == Some(true) {
                robot.charge(self.economy.charge);
            }
        }
        self.deltas = TurnDeltas::default();
        self.epoch += 1;
        self.active = true;
        self.epoch
    }

    /// Close the current epoch. Views issued for it stop working.
    pub fn end_turn(&mut self) {
        self.active = false;
    }

    /// Whether `epoch` is the open epoch and belongs to `team`.
    #[must_use]
    pub fn is_active(&self, team: Team, epoch: u64) -> bool {
        self.active && self.team == team && self.epoch == epoch
    }

    /// Drain the deltas buffered since the turn began.
    pub fn take_deltas(&mut self) -> TurnDeltas {
        std::mem::take(&mut self.deltas)
    }

    /// Debit `elapsed` from `team`'s budget. Returns what is left.
    pub fn debit_time(&mut self, team: Team, elapsed: Duration) -> Duration {
        let left = &mut self.time_left[team.index()];
        *left = left.saturating_sub(elapsed);
        *left
    }

    /// Take the first internal fault recorded since the last call.
    pub fn take_fault(&mut self) -> Option<Fault> {
        self.fault.take()
    }

    /// Scoring inputs for `team`.
    #[must_use]
    pub fn standing(&self, team: Team) -> Standing {
        Standing {
            terraformed: self.map.count_terraformed(team),
            robots: self.robot_count(team),
            metal: self.metal(team),
            time_left: self.time_left(team),
        }
    }

    // ---- read views -----------------------------------------------------

    /// The authoritative map, ignoring fog.
    #[must_use]
    pub const fn map(&self) -> &Map {
        &self.map
    }

    /// Every robot, ordered by id.
    pub fn robots(&self) -> impl Iterator<Item = &Robot> {
        self.robots.values()
    }

    /// Robot by id, regardless of owner.
    #[must_use]
    pub fn robot(&self, id: RobotId) -> Option<&Robot> {
        self.robots.get(&id)
    }

    /// Occupancy index: who stands where.
    pub fn occupancy(&self) -> impl Iterator<Item = (Coord, RobotId)> + '_ {
        self.occupancy.iter().map(|(c, id)| (*c, *id))
    }

    /// Team whose turn it is.
    #[must_use]
    pub const fn team(&self) -> Team {
        self.team
    }

    /// Current turn, 1-based.
    #[must_use]
    pub const fn turn(&self) -> u32 {
        self.turn
    }

    /// Metal held by `team`.
    #[must_use]
    pub const fn metal(&self, team: Team) -> u32 {
        self.metal[team.index()]
    }

    /// Time budget left for `team`.
    #[must_use]
    pub const fn time_left(&self, team: Team) -> Duration {
        self.time_left[team.index()]
    }

    /// Economy parameters.
    #[must_use]
    pub const fn economy(&self) -> &Economy {
        &self.economy
    }

    /// Number of robots owned by `team`.
    #[must_use]
    pub fn robot_count(&self, team: Team) -> usize {
        self.robots.values().filter(|r| r.team == team).count()
    }

    /// The robot on `coord`, if `team` can see the tile.
    #[must_use]
    pub fn robot_at(&self, team: Team, coord: Coord) -> Option<RobotInfo> {
        if self.map.tile_state(coord, team) == TileState::Illegal {
            return None;
        }
        self.occupancy
            .get(&coord)
            .and_then(|id| self.robots.get(id))
            .map(Robot::info)
    }

    /// `team`'s robots.
    #[must_use]
    pub fn ally_robots(&self, team: Team) -> Vec<RobotInfo> {
        self.robots
            .values()
            .filter(|r| r.team == team)
            .map(Robot::info)
            .collect()
    }

    /// The opponent's robots on tiles `team` can see.
    #[must_use]
    pub fn enemy_robots(&self, team: Team) -> Vec<RobotInfo> {
        self.robots
            .values()
            .filter(|r| r.team != team && !self.map.get(r.coord).is_none_or(|t| t.is_fogged(team)))
            .map(Robot::info)
            .collect()
    }

    /// Visible tiles annotated with visible occupants.
    #[must_use]
    pub fn map_view(&self, team: Team) -> Vec<Vec<Option<TileInfo>>> {
        let mut rows = self.map.info(team);
        for info in rows.iter_mut().flatten().flatten() {
            info.robot = self.robot_at(team, info.coord);
        }
        rows
    }

    /// Text rendering of what `team` sees.
    #[must_use]
    pub fn render(&self, team: Team) -> String {
        self.map.render(team)
    }

    /// Aggregate snapshot for `team`.
    #[must_use]
    pub fn info(&self, team: Team) -> GameInfo {
        GameInfo {
            team,
            turn: self.turn,
            metal: self.metal(team),
            time_left: self.time_left(team),
            spawn_cost: self.economy.spawn_cost,
            transform_cost: self.economy.transform_cost,
            ally_robots: self.ally_robots(team),
            enemy_robots: self.enemy_robots(team),
            map: self.map_view(team),
        }
    }

    // ---- pathfinding ----------------------------------------------------

    /// Shortest route for `team` from `start` to `goal`, optionally treating
    /// occupied tiles as walls.
    #[must_use]
    pub fn optimal_path(
        &self,
        team: Team,
        start: Coord,
        goal: Coord,
        avoid_robots: bool,
    ) -> Option<Route> {
        pathfinding::optimal_path(&self.map, team, start, goal, |c| {
            avoid_robots && self.occupancy.contains_key(&c)
        })
    }

    /// Shortest route from one of `team`'s robots to the nearest
    /// own-terraformed tile.
    #[must_use]
    pub fn robot_to_base(&self, team: Team, id: RobotId, avoid_robots: bool) -> Option<Route> {
        let robot = self.robots.get(&id).filter(|r| r.team == team)?;
        pathfinding::nearest_base(&self.map, team, robot.coord, |c| {
            avoid_robots && self.occupancy.contains_key(&c)
        })
    }

    // ---- spawn ----------------------------------------------------------

    /// Why `team` cannot spawn on `coord`, if it cannot.
    ///
    /// # Errors
    ///
    /// Returns the first violated precondition.
    pub fn check_spawn(&self, team: Team, coord: Coord) -> Result<(), Illegal> {
        self.check_open_tile(team, coord)?;
        if self.map.is_terraformed(team, coord) != Some(true) {
            return Err(Illegal::NotTerraformed(coord));
        }
        if self.occupancy.contains_key(&coord) {
            return Err(Illegal::Occupied(coord));
        }
        self.check_metal(team, self.economy.spawn_cost)
    }

    /// Whether `team` can spawn on `coord`.
    #[must_use]
    pub fn can_spawn(&self, team: Team, coord: Coord) -> bool {
        self.check_spawn(team, coord).is_ok()
    }

    /// Spawn a robot of `kind` for `team` on `coord`.
    ///
    /// # Errors
    ///
    /// Returns the reason the spawn is illegal.
    pub fn spawn_robot(
        &mut self,
        team: Team,
        kind: RobotKind,
        coord: Coord,
    ) -> Result<RobotInfo, Illegal> {
        self.check_spawn(team, coord)?;
        self.metal[team.index()] -= self.economy.spawn_cost;
        let robot = self.insert_robot(kind, team, coord, None);
        trace!(%team, robot = %robot.id, %coord, "spawned {kind}");
        Ok(robot)
    }

    // ---- move -----------------------------------------------------------

    /// Why `team` cannot move robot `id` toward `direction`, if it cannot.
    ///
    /// # Errors
    ///
    /// Returns the first violated precondition.
    pub fn check_move(&self, team: Team, id: RobotId, direction: Direction) -> Result<(), Illegal> {
        let robot = self.own_robot(team, id)?;
        if robot.moved {
            return Err(Illegal::AlreadyMoved(id));
        }
        self.check_open_tile(team, robot.coord.step(direction))
    }

    /// Whether `team` can move robot `id` toward `direction`.
    #[must_use]
    pub fn can_move(&self, team: Team, id: RobotId, direction: Direction) -> bool {
        self.check_move(team, id, direction).is_ok()
    }

    /// Move robot `id` one step. Moving onto any occupied tile destroys
    /// both robots, whoever owns the occupant.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Illegal`] if the move is illegal.
    pub fn move_robot(
        &mut self,
        team: Team,
        id: RobotId,
        direction: Direction,
    ) -> Result<MoveOutcome, ActionError> {
        self.check_move(team, id, direction)?;
        let result = self.apply_move(id, direction);
        self.note_fault(result)
    }

    fn apply_move(&mut self, id: RobotId, direction: Direction) -> Result<MoveOutcome, ActionError> {
        let from = self.robots.get(&id).ok_or(Fault::UnknownRobot(id))?.coord;
        let to = from.step(direction);

        if let Some(&other) = self.occupancy.get(&to) {
            let mover = self.remove_robot(id)?;
            let occupant = self.remove_robot(other)?;
            trace!(mover = %mover.id, occupant = %occupant.id, coord = %to, "collision");
            return Ok(MoveOutcome::Collided {
                mover: mover.info(),
                occupant: occupant.info(),
            });
        }

        let robot = self.robots.get_mut(&id).ok_or(Fault::UnknownRobot(id))?;
        robot.coord = to;
        robot.moved = true;
        self.occupancy.remove(&from);
        self.occupancy.insert(to, id);
        self.deltas.add_robot(robot);
        trace!(robot = %id, %from, %to, "moved");
        Ok(MoveOutcome::Moved(robot.info()))
    }

    // ---- action ---------------------------------------------------------

    /// Why `team`'s robot `id` cannot act, if it cannot.
    ///
    /// # Errors
    ///
    /// Returns the first violated precondition.
    pub fn check_action(&self, team: Team, id: RobotId) -> Result<(), Illegal> {
        let robot = self.own_robot(team, id)?;
        robot.kind.check_action(robot, &self.map)
    }

    /// Whether `team`'s robot `id` can act.
    #[must_use]
    pub fn can_act(&self, team: Team, id: RobotId) -> bool {
        self.check_action(team, id).is_ok()
    }

    /// Perform robot `id`'s action and settle its side effects.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Illegal`] if the action is illegal.
    pub fn robot_action(&mut self, team: Team, id: RobotId) -> Result<ActionOutcome, ActionError> {
        self.check_action(team, id)?;
        let result = self.apply_action(team, id);
        self.note_fault(result)
    }

    fn apply_action(&mut self, team: Team, id: RobotId) -> Result<ActionOutcome, ActionError> {
        let robot = self.robots.get_mut(&id).ok_or(Fault::UnknownRobot(id))?;
        let kind = robot.kind;
        let outcome = kind.perform(robot, &mut self.map)?;
        match &outcome {
            ActionOutcome::Mined(metal) => {
                let held = &mut self.metal[team.index()];
                *held = held.saturating_add(*metal);
            }
            ActionOutcome::Terraformed(coord) => self.deltas.add_terraformed(*coord),
            ActionOutcome::Explored(tiles) => self.deltas.add_explored(tiles),
        }
        trace!(robot = %id, ?outcome, "acted");
        Ok(outcome)
    }

    // ---- transform ------------------------------------------------------

    /// Why `team` cannot transform robot `id`, if it cannot.
    ///
    /// # Errors
    ///
    /// Returns the first violated precondition.
    pub fn check_transform(&self, team: Team, id: RobotId) -> Result<(), Illegal> {
        self.own_robot(team, id)?;
        self.check_metal(team, self.economy.transform_cost)
    }

    /// Whether `team` can transform robot `id`.
    #[must_use]
    pub fn can_transform(&self, team: Team, id: RobotId) -> bool {
        self.check_transform(team, id).is_ok()
    }

    /// Replace robot `id` with a new robot of `kind` on the same tile with
    /// the same battery and a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Illegal`] if the transform is illegal.
    pub fn transform_robot(
        &mut self,
        team: Team,
        id: RobotId,
        kind: RobotKind,
    ) -> Result<RobotInfo, ActionError> {
        self.check_transform(team, id)?;
        let result = self.apply_transform(team, id, kind);
        self.note_fault(result)
    }

    fn apply_transform(
        &mut self,
        team: Team,
        id: RobotId,
        kind: RobotKind,
    ) -> Result<RobotInfo, ActionError> {
        let old = self.remove_robot(id)?;
        self.metal[team.index()] -= self.economy.transform_cost;
        let robot = self.insert_robot(kind, team, old.coord, Some(old.battery));
        trace!(old = %id, new = %robot.id, "transformed into {kind}");
        Ok(robot)
    }

    // ---- helpers --------------------------------------------------------

    fn own_robot(&self, team: Team, id: RobotId) -> Result<&Robot, Illegal> {
        self.robots
            .get(&id)
            .filter(|r| r.team == team)
            .ok_or(Illegal::UnknownRobot(id))
    }

    fn check_open_tile(&self, team: Team, coord: Coord) -> Result<(), Illegal> {
        match self.map.tile_state(coord, team) {
            TileState::Illegal => Err(Illegal::IllegalTile(coord)),
            TileState::Impassable => Err(Illegal::ImpassableTile(coord)),
            TileState::Terraformable | TileState::Mining => Ok(()),
        }
    }

    fn check_metal(&self, team: Team, needs: u32) -> Result<(), Illegal> {
        let has = self.metal(team);
        if has < needs {
            return Err(Illegal::InsufficientMetal { has, needs });
        }
        Ok(())
    }

    fn insert_robot(
        &mut self,
        kind: RobotKind,
        team: Team,
        coord: Coord,
        battery: Option<u32>,
    ) -> RobotInfo {
        let id = RobotId(self.next_id);
        self.next_id += 1;
        let mut robot = Robot::new(id, kind, team, coord);
        if let Some(battery) = battery {
            robot.battery = battery;
        }
        self.deltas.add_robot(&robot);
        self.occupancy.insert(coord, id);
        let info = robot.info();
        self.robots.insert(id, robot);
        info
    }

    fn remove_robot(&mut self, id: RobotId) -> Result<Robot, Fault> {
        let robot = self.robots.remove(&id).ok_or(Fault::UnknownRobot(id))?;
        self.occupancy.remove(&robot.coord);
        self.deltas.add_removal(&robot);
        Ok(robot)
    }

    fn note_fault<T>(&mut self, result: Result<T, ActionError>) -> Result<T, ActionError> {
        if let Err(ActionError::Fault(fault)) = &result {
            self.fault.get_or_insert_with(|| fault.clone());
        }
        result
    }
}

//! Team-scoped handle on the rules engine.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{ActionError, Illegal};
use crate::game::{
    ActionOutcome, Coord, Direction, GameInfo, MoveOutcome, Route, RobotId, RobotInfo, RobotKind,
    RulesEngine, Team, TileInfo, TileState,
};

/// What a player receives for one turn.
///
/// Every call locks the engine for its own duration and first checks that
/// the turn the view was issued for is still running. Once the turn ends,
/// reads fail with [`Illegal::InactiveView`] and predicates answer `false`.
#[derive(Debug, Clone)]
pub struct TeamView {
    engine: Arc<Mutex<RulesEngine>>,
    team: Team,
    epoch: u64,
}

impl TeamView {
    /// Bind a view to `team` for the turn identified by `epoch`.
    #[must_use]
    pub const fn new(engine: Arc<Mutex<RulesEngine>>, team: Team, epoch: u64) -> Self {
        Self {
            engine,
            team,
            epoch,
        }
    }

    /// The team this view acts for.
    #[must_use]
    pub const fn team(&self) -> Team {
        self.team
    }

    fn read<T>(&self, f: impl FnOnce(&RulesEngine, Team) -> T) -> Result<T, Illegal> {
        let engine = self.engine.lock();
        if !engine.is_active(self.team, self.epoch) {
            return Err(Illegal::InactiveView(self.team));
        }
        Ok(f(&*engine, self.team))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut RulesEngine, Team) -> Result<T, ActionError>,
    ) -> Result<T, ActionError> {
        let mut engine = self.engine.lock();
        if !engine.is_active(self.team, self.epoch) {
            return Err(Illegal::InactiveView(self.team).into());
        }
        f(&mut *engine, self.team)
    }

    // ---- reads ----

    /// Own robots.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn ally_robots(&self) -> Result<Vec<RobotInfo>, Illegal> {
        self.read(RulesEngine::ally_robots)
    }

    /// Visible enemy robots.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn enemy_robots(&self) -> Result<Vec<RobotInfo>, Illegal> {
        self.read(RulesEngine::enemy_robots)
    }

    /// Visible tiles with their occupants; fogged tiles are `None`.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn map(&self) -> Result<Vec<Vec<Option<TileInfo>>>, Illegal> {
        self.read(RulesEngine::map_view)
    }

    /// State of one tile as this team sees it.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn tile_state(&self, coord: Coord) -> Result<TileState, Illegal> {
        self.read(|engine, team| engine.map().tile_state(coord, team))
    }

    /// Text rendering of the visible map.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn str_map(&self) -> Result<String, Illegal> {
        self.read(RulesEngine::render)
    }

    /// Team metal.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn metal(&self) -> Result<u32, Illegal> {
        self.read(|engine, team| engine.metal(team))
    }

    /// Current turn number.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn turn(&self) -> Result<u32, Illegal> {
        self.read(|engine, _| engine.turn())
    }

    /// Budget left at the start of this turn.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn time_left(&self) -> Result<Duration, Illegal> {
        self.read(|engine, team| engine.time_left(team))
    }

    /// Metal cost of a spawn.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn spawn_cost(&self) -> Result<u32, Illegal> {
        self.read(|engine, _| engine.economy().spawn_cost)
    }

    /// Metal cost of a transform.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn transform_cost(&self) -> Result<u32, Illegal> {
        self.read(|engine, _| engine.economy().transform_cost)
    }

    /// Everything visible in one snapshot.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn info(&self) -> Result<GameInfo, Illegal> {
        self.read(RulesEngine::info)
    }

    /// The robot on `coord`, if the tile is visible and occupied.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn robot_at(&self, coord: Coord) -> Result<Option<RobotInfo>, Illegal> {
        self.read(|engine, team| engine.robot_at(team, coord))
    }

    /// Shortest visible route between two tiles.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn optimal_path(
        &self,
        start: Coord,
        goal: Coord,
        avoid_robots: bool,
    ) -> Result<Option<Route>, Illegal> {
        self.read(|engine, team| engine.optimal_path(team, start, goal, avoid_robots))
    }

    /// Shortest visible route from a robot to the nearest own tile.
    ///
    /// # Errors
    ///
    /// Fails once the turn has ended.
    pub fn robot_to_base(&self, id: RobotId, avoid_robots: bool) -> Result<Option<Route>, Illegal> {
        self.read(|engine, team| engine.robot_to_base(team, id, avoid_robots))
    }

    // ---- predicates ----

    /// Whether a spawn on `coord` would succeed.
    #[must_use]
    pub fn can_spawn_robot(&self, coord: Coord) -> bool {
        self.read(|engine, team| engine.can_spawn(team, coord))
            .unwrap_or(false)
    }

    /// Whether robot `id` can step toward `direction`.
    #[must_use]
    pub fn can_move_robot(&self, id: RobotId, direction: Direction) -> bool {
        self.read(|engine, team| engine.can_move(team, id, direction))
            .unwrap_or(false)
    }

    /// Whether robot `id` can act.
    #[must_use]
    pub fn can_robot_action(&self, id: RobotId) -> bool {
        self.read(|engine, team| engine.can_act(team, id))
            .unwrap_or(false)
    }

    /// Whether robot `id` can be transformed.
    #[must_use]
    pub fn can_transform_robot(&self, id: RobotId) -> bool {
        self.read(|engine, team| engine.can_transform(team, id))
            .unwrap_or(false)
    }

    // ---- mutators ----

    /// Spawn a robot of `kind` on `coord`.
    ///
    /// # Errors
    ///
    /// Returns the rule the spawn breaks.
    pub fn spawn_robot(&self, kind: RobotKind, coord: Coord) -> Result<RobotInfo, ActionError> {
        self.write(|engine, team| Ok(engine.spawn_robot(team, kind, coord)?))
    }

    /// Move robot `id` one step.
    ///
    /// # Errors
    ///
    /// Returns the rule the move breaks.
    pub fn move_robot(&self, id: RobotId, direction: Direction) -> Result<MoveOutcome, ActionError> {
        self.write(|engine, team| engine.move_robot(team, id, direction))
    }

    /// Perform robot `id`'s action.
    ///
    /// # Errors
    ///
    /// Returns the rule the action breaks.
    pub fn robot_action(&self, id: RobotId) -> Result<ActionOutcome, ActionError> {
        self.write(|engine, team| engine.robot_action(team, id))
    }

    /// Replace robot `id` with a robot of `kind`.
    ///
    /// # Errors
    ///
    /// Returns the rule the transform breaks.
    pub fn transform_robot(&self, id: RobotId, kind: RobotKind) -> Result<RobotInfo, ActionError> {
        self.write(|engine, team| engine.transform_robot(team, id, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Economy, Map};

    fn shared() -> Arc<Mutex<RulesEngine>> {
        let map = Map::from_json(r#"[[["T",5,0],["T",0,0]],[["T",0,0],["T",-5,0]]]"#, 1).unwrap();
        Arc::new(Mutex::new(RulesEngine::new(
            map,
            Economy::default(),
            Duration::from_secs(5),
        )))
    }

    #[test]
    fn test_view_forwards_to_acting_team() {
        let engine = shared();
        let epoch = engine.lock().begin_turn(Team::Blue, 1);
        let view = TeamView::new(Arc::clone(&engine), Team::Blue, epoch);

        assert!(view.can_spawn_robot(Coord::new(0, 0)));
        let robot = view.spawn_robot(RobotKind::Explorer, Coord::new(0, 0)).unwrap();
        assert_eq!(robot.team, Team::Blue);
        assert_eq!(view.metal().unwrap(), 150);
        assert_eq!(view.ally_robots().unwrap().len(), 1);
        assert_eq!(view.robot_at(Coord::new(0, 0)).unwrap(), Some(robot));
        assert_eq!(view.turn().unwrap(), 1);
    }

    #[test]
    fn test_view_goes_stale_after_turn() {
        let engine = shared();
        let epoch = engine.lock().begin_turn(Team::Blue, 1);
        let view = TeamView::new(Arc::clone(&engine), Team::Blue, epoch);
        engine.lock().end_turn();

        assert_eq!(view.metal(), Err(Illegal::InactiveView(Team::Blue)));
        assert!(!view.can_spawn_robot(Coord::new(0, 0)));
        assert_eq!(
            view.spawn_robot(RobotKind::Miner, Coord::new(0, 0)),
            Err(ActionError::Illegal(Illegal::InactiveView(Team::Blue)))
        );
        assert_eq!(engine.lock().robot_count(Team::Blue), 0);

        // A new turn does not revive an old view.
        engine.lock().begin_turn(Team::Blue, 2);
        assert!(view.ally_robots().is_err());
    }

    #[test]
    fn test_view_of_waiting_team_is_inactive() {
        let engine = shared();
        let epoch = engine.lock().begin_turn(Team::Blue, 1);
        let red = TeamView::new(Arc::clone(&engine), Team::Red, epoch);
        assert_eq!(red.turn(), Err(Illegal::InactiveView(Team::Red)));
    }
}

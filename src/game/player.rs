//! The strategy capability supplied by each side.

use crate::error::ActionError;
use crate::game::TeamView;

/// A team's strategy.
///
/// Called once per owning turn on a supervisor-owned thread. The view is
/// only valid for the duration of the call; a clone kept past it answers
/// every request with [`Illegal::InactiveView`](crate::error::Illegal).
///
/// Returning an error (or panicking) aborts the rest of the turn but does not
/// end the match.
pub trait Player: Send {
    /// Play one turn.
    ///
    /// # Errors
    ///
    /// Any error aborts the turn.
    fn play_turn(&mut self, view: &TeamView) -> Result<(), ActionError>;
}

impl<F> Player for F
where
    F: FnMut(&TeamView) -> Result<(), ActionError> + Send,
{
    fn play_turn(&mut self, view: &TeamView) -> Result<(), ActionError> {
        self(view)
    }
}

/// A player that never does anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Idle;

impl Player for Idle {
    fn play_turn(&mut self, _view: &TeamView) -> Result<(), ActionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::game::{Coord, Economy, Map, RobotKind, RulesEngine, Team};

    #[test]
    fn test_closure_is_a_player() {
        let map = Map::from_json(r#"[[["T",5,0],["T",-5,0]]]"#, 1).unwrap();
        let engine = Arc::new(Mutex::new(RulesEngine::new(
            map,
            Economy::default(),
            Duration::from_secs(1),
        )));
        let epoch = engine.lock().begin_turn(Team::Blue, 1);
        let view = TeamView::new(Arc::clone(&engine), Team::Blue, epoch);

        let mut player = |view: &TeamView| {
            view.spawn_robot(RobotKind::Miner, Coord::new(0, 0))?;
            Ok(())
        };
        player.play_turn(&view).unwrap();
        assert!(player.play_turn(&view).is_err());
        assert!(Idle.play_turn(&view).is_ok());
        assert_eq!(engine.lock().robot_count(Team::Blue), 1);
    }
}

//! Match orchestrator.
//!
//! Drives a match between two [`Player`]s:
//! - Alternates Blue then Red for each turn
//! - Opens a turn on the rules engine (income, flag reset, charging)
//! - Runs the player on a supervised thread against its remaining budget
//! - Forfeits a team that overruns, otherwise debits the time used
//! - Records every turn in the event log and scores the final position

mod mapgen;

pub use mapgen::{
    generate_map, generate_symmetric, Symmetry, BASE_RATIO, IMPASSABLE_RATIO, MINING_RATIO,
};

use std::any::Any;
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{ActionError, Fault};
use crate::game::{check_invariants, Economy, Map, Player, RulesEngine, Standing, Team, TeamView};
use crate::replay::{EventLog, InitialMap, MatchRecord, Metadata, WinReason};

/// Configuration for a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Name recorded in the match metadata.
    pub game_name: String,
    /// Map name recorded in the match metadata.
    pub map_name: String,
    /// Blue bot name.
    pub blue_bot: String,
    /// Red bot name.
    pub red_bot: String,
    /// Turns played before scoring; each turn is one Blue and one Red half.
    pub max_turns: u32,
    /// Cumulative per-team time budget, in seconds.
    pub time_limit_secs: f64,
    /// Metal and battery parameters.
    #[serde(flatten)]
    pub economy: Economy,
    /// Radius of the initial visibility flood around each base tile.
    pub base_radius: u32,
    /// Suppress Blue's log output during its turns.
    pub silence_blue: bool,
    /// Suppress Red's log output during its turns.
    pub silence_red: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            game_name: "game".to_string(),
            map_name: "map".to_string(),
            blue_bot: "blue".to_string(),
            red_bot: "red".to_string(),
            max_turns: 200,
            time_limit_secs: 210.0,
            economy: Economy::default(),
            base_radius: 1,
            silence_blue: true,
            silence_red: true,
        }
    }
}

impl MatchConfig {
    /// Parse a configuration; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration object or
    /// the time limit is not a representable, non-negative duration.
    pub fn from_json(json: &str) -> Result<Self, MatchError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot reject on its own.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidTimeLimit`] for a negative, NaN,
    /// infinite or overflowing time limit.
    pub fn validate(&self) -> Result<(), MatchError> {
        Duration::try_from_secs_f64(self.time_limit_secs)
            .map(|_| ())
            .map_err(|_| MatchError::InvalidTimeLimit(self.time_limit_secs))
    }

    /// The per-team time budget. Invalid values give zero, with a warning.
    #[must_use]
    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_secs).unwrap_or_else(|err| {
            warn!(secs = self.time_limit_secs, "invalid time limit, using zero: {err}");
            Duration::ZERO
        })
    }

    /// Whether `team`'s log output is suppressed during its turns.
    #[must_use]
    pub const fn is_silenced(&self, team: Team) -> bool {
        match team {
            Team::Blue => self.silence_blue,
            Team::Red => self.silence_red,
        }
    }
}

/// Error that ends a match without a result.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The engine broke an invariant.
    #[error("internal fault: {0}")]
    Fault(#[from] Fault),
    /// The player thread could not be started.
    #[error("failed to start player thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// A player's thread exited without reporting back.
    #[error("{0} player was lost")]
    PlayerLost(Team),
    /// The configuration could not be parsed.
    #[error("invalid match config: {0}")]
    Config(#[from] serde_json::Error),
    /// The configured time limit is not a usable duration.
    #[error("invalid time limit: {0} seconds")]
    InvalidTimeLimit(f64),
}

/// How a single turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnOutcome {
    Completed,
    TimedOut,
}

type TurnReport = (Box<dyn Player>, std::thread::Result<Result<(), ActionError>>);

/// A match between two players on one map.
pub struct Arena {
    engine: Arc<Mutex<RulesEngine>>,
    config: MatchConfig,
    players: [Option<Box<dyn Player>>; 2],
    log: EventLog,
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("config", &self.config)
            .field("turns", &self.log.turns().len())
            .finish_non_exhaustive()
    }
}

impl Arena {
    /// Set up a match. Nothing runs until [`Arena::run`].
    #[must_use]
    pub fn new(map: Map, config: MatchConfig, blue: Box<dyn Player>, red: Box<dyn Player>) -> Self {
        let metadata = Metadata {
            game_name: config.game_name.clone(),
            map_name: config.map_name.clone(),
            map_height: map.height(),
            map_width: map.width(),
            red_bot: config.red_bot.clone(),
            blue_bot: config.blue_bot.clone(),
            initial_metal: config.economy.initial_metal,
            winner: None,
            win_reason: None,
        };
        let log = EventLog::new(metadata, InitialMap::from_map(&map));
        let engine = RulesEngine::new(map, config.economy, config.time_limit());

        let mut players = [None, None];
        players[Team::Blue.index()] = Some(blue);
        players[Team::Red.index()] = Some(red);

        Self {
            engine: Arc::new(Mutex::new(engine)),
            config,
            players,
            log,
        }
    }

    /// Play the match to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine faults or a player thread cannot be
    /// run. Player mistakes, errors and panics never end the match.
    pub fn run(mut self) -> Result<MatchRecord, MatchError> {
        info!(
            game = %self.config.game_name,
            map = %self.config.map_name,
            blue = %self.config.blue_bot,
            red = %self.config.red_bot,
            "match started"
        );

        for turn in 1..=self.config.max_turns {
            for team in Team::TURN_ORDER {
                if self.play_turn(team, turn)? == TurnOutcome::TimedOut {
                    let winner = team.opponent();
                    self.log.set_winner(winner, WinReason::Timeout);
                    info!(%winner, reason = "timeout", turn, "match finished");
                    return Ok(self.log.finish());
                }
            }
        }

        let (red, blue) = {
            let engine = self.engine.lock();
            (engine.standing(Team::Red), engine.standing(Team::Blue))
        };
        let (winner, reason) = decide_winner(&red, &blue);
        self.log.set_winner(winner, reason);
        info!(%winner, ?reason, "match finished");
        Ok(self.log.finish())
    }

    fn play_turn(&mut self, team: Team, turn: u32) -> Result<TurnOutcome, MatchError> {
        let (epoch, time_left) = {
            let mut engine = self.engine.lock();
            let epoch = engine.begin_turn(team, turn);
            (epoch, engine.time_left(team))
        };
        let view = TeamView::new(Arc::clone(&self.engine), team, epoch);
        let player = self.players[team.index()]
            .take()
            .ok_or(MatchError::PlayerLost(team))?;
        let silenced = self.config.is_silenced(team);

        let (tx, rx) = mpsc::sync_channel::<TurnReport>(1);
        let started = Instant::now();
        thread::Builder::new()
            .name(format!("{team}-turn-{turn}"))
            .spawn(move || {
                let mut player = player;
                let result = with_silence(silenced, || {
                    panic::catch_unwind(AssertUnwindSafe(|| player.play_turn(&view)))
                });
                // The supervisor may have given up on this turn already.
                let _ = tx.send((player, result));
            })?;

        let received = rx.recv_timeout(time_left);
        let elapsed = started.elapsed();

        let mut engine = self.engine.lock();
        engine.end_turn();

        let (player, result) = match received {
            Ok(report) if elapsed < time_left => report,
            Ok(_) | Err(RecvTimeoutError::Timeout) => {
                warn!(%team, turn, ?elapsed, ?time_left, "time budget exhausted");
                if !engine.take_deltas().is_empty() {
                    debug!(%team, turn, "dropping changes from the forfeited turn");
                }
                let (metal, robots) = (engine.metal(team), engine.robot_count(team));
                self.log.push_timeout(team, turn, metal, robots);
                return Ok(TurnOutcome::TimedOut);
            }
            Err(RecvTimeoutError::Disconnected) => return Err(MatchError::PlayerLost(team)),
        };
        self.players[team.index()] = Some(player);

        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%team, turn, "turn aborted: {err}"),
            Err(payload) => warn!(%team, turn, "player panicked: {}", panic_message(&*payload)),
        }

        let left = engine.debit_time(team, elapsed);
        if let Some(fault) = engine.take_fault() {
            return Err(fault.into());
        }
        let violations = check_invariants(&engine);
        if !violations.is_empty() {
            let messages: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
            return Err(Fault::Invariant(messages.join("; ")).into());
        }

        let deltas = engine.take_deltas();
        let (metal, robots) = (engine.metal(team), engine.robot_count(team));
        debug!(
            %team,
            turn,
            metal,
            robots,
            explored = deltas.explored.len(),
            terraformed = deltas.terraformed.len(),
            ?elapsed,
            "turn complete"
        );
        self.log.push_turn(team, turn, metal, robots, left, deltas);
        Ok(TurnOutcome::Completed)
    }
}

/// Pick the winner at the turn limit: more terraformed tiles, then more
/// robots, then more metal, then more time left. Red wins a full tie.
#[must_use]
pub fn decide_winner(red: &Standing, blue: &Standing) -> (Team, WinReason) {
    let criteria = [
        (red.terraformed.cmp(&blue.terraformed), WinReason::Terraformed),
        (red.robots.cmp(&blue.robots), WinReason::Robots),
        (red.metal.cmp(&blue.metal), WinReason::Metal),
        (red.time_left.cmp(&blue.time_left), WinReason::Time),
    ];
    for (order, reason) in criteria {
        match order {
            Ordering::Greater => return (Team::Red, reason),
            Ordering::Less => return (Team::Blue, reason),
            Ordering::Equal => {}
        }
    }
    (Team::Red, WinReason::Default)
}

fn with_silence<T>(silenced: bool, f: impl FnOnce() -> T) -> T {
    if silenced {
        tracing::subscriber::with_default(tracing::subscriber::NoSubscriber::default(), f)
    } else {
        f()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(terraformed: usize, robots: usize, metal: u32, secs: u64) -> Standing {
        Standing {
            terraformed,
            robots,
            metal,
            time_left: Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_decide_winner_priority() {
        let base = standing(5, 2, 100, 50);
        assert_eq!(
            decide_winner(&standing(6, 0, 0, 0), &base),
            (Team::Red, WinReason::Terraformed)
        );
        assert_eq!(
            decide_winner(&standing(5, 3, 0, 0), &base),
            (Team::Red, WinReason::Robots)
        );
        assert_eq!(
            decide_winner(&standing(5, 2, 99, 100), &base),
            (Team::Blue, WinReason::Metal)
        );
        assert_eq!(
            decide_winner(&standing(5, 2, 100, 40), &base),
            (Team::Blue, WinReason::Time)
        );
        assert_eq!(decide_winner(&base, &base), (Team::Red, WinReason::Default));
    }

    #[test]
    fn test_config_defaults_and_partial_json() {
        let config = MatchConfig::default();
        assert_eq!(config.max_turns, 200);
        assert_eq!(config.time_limit(), Duration::from_secs(210));
        assert_eq!(config.economy.spawn_cost, 50);

        let config =
            MatchConfig::from_json(r#"{"max_turns": 3, "spawn_cost": 60, "silence_red": false}"#)
                .unwrap();
        assert_eq!(config.max_turns, 3);
        assert_eq!(config.economy.spawn_cost, 60);
        assert_eq!(config.economy.transform_cost, 40);
        assert!(!config.is_silenced(Team::Red));
        assert!(config.is_silenced(Team::Blue));

        assert!(matches!(MatchConfig::from_json("[1]"), Err(MatchError::Config(_))));
    }

    #[test]
    fn test_unusable_time_limit_rejected() {
        for json in [
            r#"{"time_limit_secs": -1.0}"#,
            r#"{"time_limit_secs": 1e300}"#,
        ] {
            assert!(matches!(
                MatchConfig::from_json(json),
                Err(MatchError::InvalidTimeLimit(_))
            ));
        }
        for secs in [f64::NAN, f64::INFINITY] {
            let config = MatchConfig {
                time_limit_secs: secs,
                ..MatchConfig::default()
            };
            assert!(matches!(config.validate(), Err(MatchError::InvalidTimeLimit(_))));
        }
        assert!(MatchConfig::from_json(r#"{"time_limit_secs": 0.5}"#).is_ok());
    }

    #[test]
    fn test_negative_time_limit_is_zero() {
        let config = MatchConfig {
            time_limit_secs: -1.0,
            ..MatchConfig::default()
        };
        assert_eq!(config.time_limit(), Duration::ZERO);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*payload), "<non-string panic>");
    }
}

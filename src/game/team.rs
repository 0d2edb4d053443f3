//! Team identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two sides of a match.
///
/// Blue owns positive terraform levels and moves first each turn; Red owns
/// negative levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    /// Second to move, owns negative terraform levels.
    Red,
    /// First to move, owns positive terraform levels.
    Blue,
}

impl Team {
    /// Both teams in turn order.
    pub const TURN_ORDER: [Team; 2] = [Team::Blue, Team::Red];

    /// Index for per-team arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Team::Red => 0,
            Team::Blue => 1,
        }
    }

    /// Numeric tag used in the replay's visibility list.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Team::Red => 1,
            Team::Blue => 2,
        }
    }

    /// The other team.
    #[must_use]
    pub const fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }

    /// Direction a terraform step moves the level for this team.
    #[must_use]
    pub const fn sign(self) -> i32 {
        match self {
            Team::Red => -1,
            Team::Blue => 1,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Red => write!(f, "red"),
            Team::Blue => write!(f, "blue"),
        }
    }
}

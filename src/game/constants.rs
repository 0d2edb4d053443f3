//! Fixed rule constants.
//!
//! Values a match organiser may want to tune live in
//! [`MatchConfig`](crate::arena::MatchConfig); these are the ones baked into
//! the rules themselves.

/// Largest map edge accepted from a file or generator.
pub const MAX_MAP_DIM: u16 = 48;

/// Maximum (and starting) robot battery.
pub const MAX_BATTERY: u32 = 120;

/// Terraform levels are clamped to `[-TERRAFORM_MAX, TERRAFORM_MAX]`.
pub const TERRAFORM_MAX: i32 = 10;

/// Only terraform levels allowed on authored maps.
pub const AUTHORED_TERRAFORM_LEVELS: [i32; 3] = [-5, 0, 5];

/// Terraform level of a generated base tile (negated for Red).
pub const BASE_TERRAFORM: i32 = 5;

/// Smallest mining yield.
pub const MINING_MIN: u32 = 5;

/// Largest mining yield.
pub const MINING_MAX: u32 = 25;

/// Battery cost of an explorer action.
pub const EXPLORER_ACTION_COST: u32 = 10;

/// Battery cost of a miner action.
pub const MINER_ACTION_COST: u32 = 20;

/// Battery cost of a terraformer action.
pub const TERRAFORMER_ACTION_COST: u32 = 20;

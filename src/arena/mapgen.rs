//! Deterministic, mirror-symmetric map generation.

// Tile counts are small fractions of at most 48x48 tiles.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::game::constants::{BASE_TERRAFORM, MAX_MAP_DIM, MINING_MAX, MINING_MIN};
use crate::game::{Coord, Map, MapError, Tile};

/// Share of tiles made impassable.
pub const IMPASSABLE_RATIO: f64 = 0.2;
/// Share of tiles made mining tiles.
pub const MINING_RATIO: f64 = 0.2;
/// Share of tiles made starting bases (half per team).
pub const BASE_RATIO: f64 = 0.15;

/// How a generated map mirrors one team's half onto the other's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symmetry {
    /// Point reflection through the centre.
    Rotational,
    /// Mirror across the horizontal midline (rows flip).
    Horizontal,
    /// Mirror across the vertical midline (columns flip).
    Vertical,
}

impl Symmetry {
    /// All symmetries, in the order the generator draws from.
    pub const ALL: [Symmetry; 3] = [Symmetry::Rotational, Symmetry::Horizontal, Symmetry::Vertical];

    /// Mirror image of `coord` on a `height` x `width` map.
    #[must_use]
    pub fn reflect(self, coord: Coord, height: u16, width: u16) -> Coord {
        let (h, w) = (i32::from(height), i32::from(width));
        match self {
            Symmetry::Rotational => Coord::new(h - 1 - coord.row, w - 1 - coord.col),
            Symmetry::Horizontal => Coord::new(h - 1 - coord.row, coord.col),
            Symmetry::Vertical => Coord::new(coord.row, w - 1 - coord.col),
        }
    }
}

/// Generate a map, drawing the symmetry from the seed.
///
/// # Errors
///
/// Returns an error if a dimension is zero or above the maximum edge.
pub fn generate_map(seed: u64, height: u16, width: u16, base_radius: u32) -> Result<Map, MapError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let symmetry = Symmetry::ALL[rng.gen_range(0..Symmetry::ALL.len())];
    generate_with(&mut rng, symmetry, height, width, base_radius)
}

/// Generate a map with a fixed symmetry.
///
/// # Errors
///
/// Returns an error if a dimension is zero or above the maximum edge.
pub fn generate_symmetric(
    seed: u64,
    symmetry: Symmetry,
    height: u16,
    width: u16,
    base_radius: u32,
) -> Result<Map, MapError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    generate_with(&mut rng, symmetry, height, width, base_radius)
}

fn generate_with(
    rng: &mut ChaCha8Rng,
    symmetry: Symmetry,
    height: u16,
    width: u16,
    base_radius: u32,
) -> Result<Map, MapError> {
    if height == 0 || width == 0 {
        return Err(MapError::InvalidDimensions { height, width });
    }
    if height > MAX_MAP_DIM || width > MAX_MAP_DIM {
        return Err(MapError::TooLarge {
            height: usize::from(height),
            width: usize::from(width),
        });
    }

    let w = usize::from(width);
    let total = usize::from(height) * w;
    let pairs = |ratio: f64| (total as f64 * ratio / 2.0) as usize;

    let mut order: Vec<Coord> = (0..height)
        .flat_map(|r| (0..width).map(move |c| Coord::new(i32::from(r), i32::from(c))))
        .collect();
    order.shuffle(rng);

    let mut tiles = vec![Tile::terraformable(0); total];
    let mut taken = vec![false; total];
    let index = |c: Coord| c.row as usize * w + c.col as usize;
    let mut cursor = order.iter().copied();

    let mut place = |count: usize, make: &mut dyn FnMut() -> (Tile, Tile)| {
        let mut placed = 0;
        while placed < count {
            let Some(coord) = cursor.next() else {
                return;
            };
            let mirror = symmetry.reflect(coord, height, width);
            let (a, b) = (index(coord), index(mirror));
            if a == b || taken[a] || taken[b] {
                continue;
            }
            let (tile, twin) = make();
            tiles[a] = tile;
            tiles[b] = twin;
            taken[a] = true;
            taken[b] = true;
            placed += 1;
        }
    };

    place(pairs(IMPASSABLE_RATIO), &mut || (Tile::impassable(), Tile::impassable()));
    place(pairs(MINING_RATIO), &mut || {
        let yield_ = rng.gen_range(MINING_MIN..=MINING_MAX);
        (Tile::mining(yield_), Tile::mining(yield_))
    });
    place(pairs(BASE_RATIO), &mut || {
        (
            Tile::terraformable(BASE_TERRAFORM),
            Tile::terraformable(-BASE_TERRAFORM),
        )
    });

    Map::from_tiles(height, width, tiles, base_radius)
}

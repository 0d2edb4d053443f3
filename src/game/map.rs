//! Map, tiles and per-team fog of war.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Fault;
use crate::game::constants::{
    AUTHORED_TERRAFORM_LEVELS, MAX_MAP_DIM, MINING_MAX, MINING_MIN, TERRAFORM_MAX,
};
use crate::game::{RobotInfo, Team};

/// A coordinate on the map.
///
/// Signed so that a step off the edge is still representable; such
/// coordinates simply report [`TileState::Illegal`]. Serialized as a
/// `[row, col]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Coord {
    /// Row, top to bottom.
    pub row: i32,
    /// Column, left to right.
    pub col: i32,
}

impl Coord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The coordinate one step in `direction`.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dr, dc) = direction.offset();
        Self::new(self.row + dr, self.col + dc)
    }

    /// The clipped 3x3 neighbourhood centred on this coordinate, row-major.
    pub fn neighbourhood(self, height: u16, width: u16) -> impl Iterator<Item = Coord> {
        (-1..=1)
            .flat_map(move |dr| (-1..=1).map(move |dc| Coord::new(self.row + dr, self.col + dc)))
            .filter(move |c| {
                c.row >= 0 && c.col >= 0 && c.row < i32::from(height) && c.col < i32::from(width)
            })
    }
}

impl From<(i32, i32)> for Coord {
    fn from((row, col): (i32, i32)) -> Self {
        Self::new(row, col)
    }
}

impl From<Coord> for (i32, i32) {
    fn from(coord: Coord) -> Self {
        (coord.row, coord.col)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// One of the eight king-move directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Row - 1.
    Up,
    /// Row - 1, col + 1.
    UpRight,
    /// Col + 1.
    Right,
    /// Row + 1, col + 1.
    DownRight,
    /// Row + 1.
    Down,
    /// Row + 1, col - 1.
    DownLeft,
    /// Col - 1.
    Left,
    /// Row - 1, col - 1.
    UpLeft,
}

impl Direction {
    /// All directions, in the order pathfinding expands them.
    pub const ALL: [Direction; 8] = [
        Direction::Up,
        Direction::UpRight,
        Direction::Right,
        Direction::DownRight,
        Direction::Down,
        Direction::DownLeft,
        Direction::Left,
        Direction::UpLeft,
    ];

    /// `(row, col)` offset of one step.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (-1, 0),
            Direction::UpRight => (-1, 1),
            Direction::Right => (0, 1),
            Direction::DownRight => (1, 1),
            Direction::Down => (1, 0),
            Direction::DownLeft => (1, -1),
            Direction::Left => (0, -1),
            Direction::UpLeft => (-1, -1),
        }
    }
}

/// What a team can tell about a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileState {
    /// Can be terraformed, walked on and built on.
    Terraformable,
    /// Yields metal to a miner; walkable.
    Mining,
    /// Blocks movement.
    Impassable,
    /// Off the map or hidden by fog of war.
    Illegal,
}

impl TileState {
    /// Whether robots may stand on tiles in this state.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        matches!(self, TileState::Terraformable | TileState::Mining)
    }
}

/// Terrain of a tile, as stored by the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terrain {
    /// See [`TileState::Terraformable`].
    Terraformable,
    /// See [`TileState::Mining`].
    Mining,
    /// See [`TileState::Impassable`].
    Impassable,
}

impl Terrain {
    /// Map-file tag for this terrain.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Terrain::Terraformable => "T",
            Terrain::Mining => "M",
            Terrain::Impassable => "I",
        }
    }

    const fn state(self) -> TileState {
        match self {
            Terrain::Terraformable => TileState::Terraformable,
            Terrain::Mining => TileState::Mining,
            Terrain::Impassable => TileState::Impassable,
        }
    }
}

/// A single tile on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Terrain type.
    pub terrain: Terrain,
    /// Signed terraform level; positive is Blue, negative is Red.
    pub terraform: i32,
    /// Metal yield, only nonzero on mining tiles.
    pub mining: u32,
    /// Fog flag per team, indexed by [`Team::index`].
    fog: [bool; 2],
}

impl Tile {
    /// Create a fully fogged tile.
    #[must_use]
    pub const fn new(terrain: Terrain, terraform: i32, mining: u32) -> Self {
        Self {
            terrain,
            terraform,
            mining,
            fog: [true, true],
        }
    }

    /// Create a neutral terraformable tile.
    #[must_use]
    pub const fn terraformable(terraform: i32) -> Self {
        Self::new(Terrain::Terraformable, terraform, 0)
    }

    /// Create a mining tile.
    #[must_use]
    pub const fn mining(yield_: u32) -> Self {
        Self::new(Terrain::Mining, 0, yield_)
    }

    /// Create an impassable tile.
    #[must_use]
    pub const fn impassable() -> Self {
        Self::new(Terrain::Impassable, 0, 0)
    }

    /// Whether the tile is hidden from `team`.
    #[must_use]
    pub const fn is_fogged(&self, team: Team) -> bool {
        self.fog[team.index()]
    }

    /// Clear fog for `team`. Returns `true` if it was fogged.
    fn reveal(&mut self, team: Team) -> bool {
        let was_fogged = self.fog[team.index()];
        self.fog[team.index()] = false;
        was_fogged
    }

    /// Step the terraform level toward `team`. Returns `false` at the cap.
    fn step_terraform(&mut self, team: Team) -> bool {
        let next = self.terraform + team.sign();
        if next.abs() > TERRAFORM_MAX {
            return false;
        }
        self.terraform = next;
        true
    }
}

/// A tile as seen by one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileInfo {
    /// Tile state (never `Illegal` here).
    pub state: TileState,
    /// Tile position.
    pub coord: Coord,
    /// Terraform level from the viewer's side: positive means theirs.
    pub terraform: i32,
    /// Mining yield.
    pub mining: u32,
    /// Visible robot on the tile, if any.
    pub robot: Option<RobotInfo>,
}

/// Error raised while building a map.
#[derive(Debug, Error)]
pub enum MapError {
    /// The map file could not be read.
    #[error("failed to read map: {0}")]
    Io(#[from] std::io::Error),
    /// The map file is not a grid of `[tag, terraform, mining]` triples.
    #[error("malformed map json: {0}")]
    Json(#[from] serde_json::Error),
    /// No rows or an empty first row.
    #[error("map has no tiles")]
    Empty,
    /// Dimensions outside the supported range.
    #[error("map is {height}x{width}, maximum edge is {}", MAX_MAP_DIM)]
    TooLarge {
        /// Row count.
        height: usize,
        /// Column count.
        width: usize,
    },
    /// Width or height zero when generating.
    #[error("invalid map dimensions {height}x{width}")]
    InvalidDimensions {
        /// Requested height.
        height: u16,
        /// Requested width.
        width: u16,
    },
    /// A row's length differs from the first row's.
    #[error("row {row} has {len} tiles, expected {expected}")]
    Ragged {
        /// Offending row.
        row: usize,
        /// Its length.
        len: usize,
        /// Length of row 0.
        expected: usize,
    },
    /// Tile tag other than `T`, `I` or `M`.
    #[error("unknown tile tag `{tag}` at ({row}, {col})")]
    UnknownTag {
        /// The tag found.
        tag: String,
        /// Row.
        row: usize,
        /// Column.
        col: usize,
    },
    /// Nonzero terraform on a non-terraformable tile.
    #[error("non-terraformable tile has terraform {level} at ({row}, {col})")]
    TerraformOnNonTerraformable {
        /// Level found.
        level: i32,
        /// Row.
        row: usize,
        /// Column.
        col: usize,
    },
    /// Terraform level outside the authored set.
    #[error("terraform level {level} at ({row}, {col}) must be one of -5, 0, 5")]
    BadTerraformLevel {
        /// Level found.
        level: i32,
        /// Row.
        row: usize,
        /// Column.
        col: usize,
    },
    /// Nonzero mining on a non-mining tile.
    #[error("non-mining tile has mining {mining} at ({row}, {col})")]
    MiningOnNonMining {
        /// Yield found.
        mining: i64,
        /// Row.
        row: usize,
        /// Column.
        col: usize,
    },
    /// Mining yield outside the allowed range.
    #[error("mining yield {mining} at ({row}, {col}) outside [{}, {}]", MINING_MIN, MINING_MAX)]
    MiningOutOfRange {
        /// Yield found.
        mining: i64,
        /// Row.
        row: usize,
        /// Column.
        col: usize,
    },
}

/// Raw tile triple as stored in map files: `[tag, terraform, mining]`.
pub type RawTile = (String, i32, i64);

/// The game map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    height: u16,
    width: u16,
    /// Tiles stored in row-major order.
    tiles: Vec<Tile>,
}

impl Map {
    /// Build a map from tiles in row-major order, then flood initial
    /// visibility around every terraformed tile.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are zero, too large, or do not
    /// match the tile count.
    pub fn from_tiles(
        height: u16,
        width: u16,
        tiles: Vec<Tile>,
        base_radius: u32,
    ) -> Result<Self, MapError> {
        if height == 0 || width == 0 {
            return Err(MapError::InvalidDimensions { height, width });
        }
        if height > MAX_MAP_DIM || width > MAX_MAP_DIM {
            return Err(MapError::TooLarge {
                height: usize::from(height),
                width: usize::from(width),
            });
        }
        let expected = usize::from(height) * usize::from(width);
        if tiles.len() != expected {
            return Err(MapError::Ragged {
                row: tiles.len() / usize::from(width),
                len: tiles.len() % usize::from(width),
                expected: usize::from(width),
            });
        }

        let mut map = Self {
            height,
            width,
            tiles,
        };
        map.reveal_bases(base_radius);
        Ok(map)
    }

    /// Parse and validate a map from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first malformed tile.
    pub fn from_json(json: &str, base_radius: u32) -> Result<Self, MapError> {
        let rows: Vec<Vec<RawTile>> = serde_json::from_str(json)?;
        Self::from_rows(&rows, base_radius)
    }

    /// Read, parse and validate a map file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn load(path: &Path, base_radius: u32) -> Result<Self, MapError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json, base_radius)
    }

    /// Validate raw rows and build a map from them.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first malformed tile.
    pub fn from_rows(rows: &[Vec<RawTile>], base_radius: u32) -> Result<Self, MapError> {
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 {
            return Err(MapError::Empty);
        }
        let (Ok(h), Ok(w)) = (u16::try_from(rows.len()), u16::try_from(width)) else {
            return Err(MapError::TooLarge {
                height: rows.len(),
                width,
            });
        };

        let mut tiles = Vec::with_capacity(rows.len() * width);
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != width {
                return Err(MapError::Ragged {
                    row,
                    len: cells.len(),
                    expected: width,
                });
            }
            for (col, raw) in cells.iter().enumerate() {
                tiles.push(parse_tile(raw, row, col)?);
            }
        }

        Self::from_tiles(h, w, tiles, base_radius)
    }

    /// Height in tiles.
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Width in tiles.
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Check if a coordinate is within the map bounds.
    #[must_use]
    pub fn in_bounds(&self, coord: Coord) -> bool {
        coord.row >= 0
            && coord.col >= 0
            && coord.row < i32::from(self.height)
            && coord.col < i32::from(self.width)
    }

    fn index(&self, coord: Coord) -> Option<usize> {
        if !self.in_bounds(coord) {
            return None;
        }
        let row = usize::try_from(coord.row).ok()?;
        let col = usize::try_from(coord.col).ok()?;
        Some(row * usize::from(self.width) + col)
    }

    /// The authoritative tile, regardless of fog.
    #[must_use]
    pub fn get(&self, coord: Coord) -> Option<&Tile> {
        self.index(coord).map(|idx| &self.tiles[idx])
    }

    fn get_mut(&mut self, coord: Coord) -> Option<&mut Tile> {
        self.index(coord).map(|idx| &mut self.tiles[idx])
    }

    /// Iterate over all coordinates and tiles, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, &Tile)> {
        let width = usize::from(self.width);
        self.tiles.iter().enumerate().map(move |(idx, tile)| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let coord = Coord::new((idx / width) as i32, (idx % width) as i32);
            (coord, tile)
        })
    }

    /// Tile state as seen by `team`.
    #[must_use]
    pub fn tile_state(&self, coord: Coord, team: Team) -> TileState {
        match self.get(coord) {
            Some(tile) if !tile.is_fogged(team) => tile.terrain.state(),
            _ => TileState::Illegal,
        }
    }

    /// Whether the tile's terraform level has `team`'s sign.
    ///
    /// `None` when out of bounds. Ignores fog.
    #[must_use]
    pub fn is_terraformed(&self, team: Team, coord: Coord) -> Option<bool> {
        self.get(coord)
            .map(|tile| tile.terraform * team.sign() > 0)
    }

    /// Step the terraform level of a tile toward `team`.
    ///
    /// Returns `Ok(false)` if the tile is already at the team's cap.
    ///
    /// # Errors
    ///
    /// Faults if the tile is not a visible terraformable tile.
    pub fn terraform(&mut self, coord: Coord, team: Team) -> Result<bool, Fault> {
        if self.tile_state(coord, team) != TileState::Terraformable {
            return Err(Fault::InvalidTerraform { coord, team });
        }
        let tile = self
            .get_mut(coord)
            .ok_or(Fault::InvalidTerraform { coord, team })?;
        Ok(tile.step_terraform(team))
    }

    /// Clear `team`'s fog in the 3x3 neighbourhood of `coord`.
    ///
    /// Returns the coordinates whose fog actually changed.
    ///
    /// # Errors
    ///
    /// Faults if the centre is illegal or impassable for `team`.
    pub fn explore(&mut self, coord: Coord, team: Team) -> Result<Vec<Coord>, Fault> {
        if !self.tile_state(coord, team).is_passable() {
            return Err(Fault::InvalidExplore { coord, team });
        }
        let mut revealed = Vec::new();
        for neighbour in coord.neighbourhood(self.height, self.width) {
            if let Some(tile) = self.get_mut(neighbour) {
                if tile.reveal(team) {
                    revealed.push(neighbour);
                }
            }
        }
        Ok(revealed)
    }

    /// Whether any tile in the 3x3 neighbourhood of `coord` is fogged for `team`.
    #[must_use]
    pub fn has_fog_around(&self, coord: Coord, team: Team) -> bool {
        coord
            .neighbourhood(self.height, self.width)
            .filter_map(|c| self.get(c))
            .any(|tile| tile.is_fogged(team))
    }

    /// Metal yield of the tile, if it is a mining tile. Never depletes.
    ///
    /// # Errors
    ///
    /// Faults if the tile is illegal for `team`.
    pub fn mine(&self, coord: Coord, team: Team) -> Result<Option<u32>, Fault> {
        match self.tile_state(coord, team) {
            TileState::Illegal => Err(Fault::InvalidMine { coord, team }),
            TileState::Mining => Ok(self.get(coord).map(|tile| tile.mining)),
            TileState::Terraformable | TileState::Impassable => Ok(None),
        }
    }

    /// Number of tiles terraformed in `team`'s favour.
    #[must_use]
    pub fn count_terraformed(&self, team: Team) -> usize {
        self.tiles
            .iter()
            .filter(|tile| tile.terraform * team.sign() > 0)
            .count()
    }

    /// Per-tile view for `team`; fogged tiles are `None`.
    ///
    /// Terraform levels are reported from `team`'s side (own tiles positive).
    #[must_use]
    pub fn info(&self, team: Team) -> Vec<Vec<Option<TileInfo>>> {
        let mut rows = vec![Vec::with_capacity(usize::from(self.width)); usize::from(self.height)];
        for (coord, tile) in self.iter() {
            let info = (!tile.is_fogged(team)).then(|| TileInfo {
                state: tile.terrain.state(),
                coord,
                terraform: tile.terraform * team.sign(),
                mining: tile.mining,
                robot: None,
            });
            if let Some(row) = usize::try_from(coord.row).ok().and_then(|r| rows.get_mut(r)) {
                row.push(info);
            }
        }
        rows
    }

    /// Text rendering for `team`: `#` fog, `I` impassable, `M` mining, else
    /// the terraform level from `team`'s side. Tab separated, one line per row.
    #[must_use]
    pub fn render(&self, team: Team) -> String {
        self.info(team)
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        None => "#".to_string(),
                        Some(info) => match info.state {
                            TileState::Mining => "M".to_string(),
                            TileState::Impassable => "I".to_string(),
                            _ => info.terraform.to_string(),
                        },
                    })
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Convert back to file triples.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<RawTile>> {
        self.tiles
            .chunks(usize::from(self.width))
            .map(|row| {
                row.iter()
                    .map(|tile| {
                        (
                            tile.terrain.tag().to_string(),
                            tile.terraform,
                            i64::from(tile.mining),
                        )
                    })
                    .collect()
            })
            .collect()
    }

    /// Reveal each terraformed tile's surroundings to its owner, breadth
    /// first to `radius` steps over the 8-connected grid.
    fn reveal_bases(&mut self, radius: u32) {
        let bases: Vec<(Coord, Team)> = self
            .iter()
            .filter_map(|(coord, tile)| match tile.terraform.signum() {
                1 => Some((coord, Team::Blue)),
                -1 => Some((coord, Team::Red)),
                _ => None,
            })
            .collect();

        for (origin, team) in bases {
            let mut visited = HashSet::from([origin]);
            let mut queue = VecDeque::from([(origin, radius)]);
            while let Some((coord, depth)) = queue.pop_front() {
                if let Some(tile) = self.get_mut(coord) {
                    tile.reveal(team);
                }
                if depth == 0 {
                    continue;
                }
                for direction in Direction::ALL {
                    let next = coord.step(direction);
                    if self.in_bounds(next) && visited.insert(next) {
                        queue.push_back((next, depth - 1));
                    }
                }
            }
        }
    }
}

fn parse_tile(raw: &RawTile, row: usize, col: usize) -> Result<Tile, MapError> {
    let (tag, terraform, mining) = (raw.0.as_str(), raw.1, raw.2);
    let terrain = match tag {
        "T" => Terrain::Terraformable,
        "M" => Terrain::Mining,
        "I" => Terrain::Impassable,
        _ => {
            return Err(MapError::UnknownTag {
                tag: tag.to_string(),
                row,
                col,
            });
        }
    };

    if terraform != 0 && terrain != Terrain::Terraformable {
        return Err(MapError::TerraformOnNonTerraformable {
            level: terraform,
            row,
            col,
        });
    }
    if !AUTHORED_TERRAFORM_LEVELS.contains(&terraform) {
        return Err(MapError::BadTerraformLevel {
            level: terraform,
            row,
            col,
        });
    }
    if mining != 0 && terrain != Terrain::Mining {
        return Err(MapError::MiningOnNonMining { mining, row, col });
    }

    let yield_ = match terrain {
        Terrain::Mining => u32::try_from(mining)
            .ok()
            .filter(|m| (MINING_MIN..=MINING_MAX).contains(m))
            .ok_or(MapError::MiningOutOfRange { mining, row, col })?,
        Terrain::Terraformable | Terrain::Impassable => 0,
    };

    Ok(Tile::new(terrain, terraform, yield_))
}

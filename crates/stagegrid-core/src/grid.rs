//! Grid Store: the stage's cell-to-tile mapping.
//!
//! The grid is built once from a [`StageDefinition`] and never gains or loses
//! tiles during a battle. Cells outside the defined tile set are not
//! addressable: every lookup on them returns [`GridError::TileNotFound`]
//! rather than a default tile, and no mutation ever touches them.
//!
//! # Occupancy and Claims
//!
//! A [`Tile`] tracks two independent reservations:
//!
//! - **occupant**: the entity physically standing on the tile
//! - **claimant**: an advisory, exclusive reservation used while an entity is
//!   mid-transition onto the tile
//!
//! The `occupied` flag is raised by either. At most one claimant and at most
//! one occupant exist per tile.
//!
//! # Example
//!
//! ```
//! use stagegrid_core::grid::{Cell, ClaimOutcome, Grid, StageDefinition};
//! use stagegrid_core::entity::EntityId;
//!
//! let mut grid = Grid::from_stage(&StageDefinition::rectangle(6, 3, 3));
//! let cell = Cell::new(1, 1);
//!
//! assert_eq!(grid.claim(cell, EntityId::new(1)), Ok(ClaimOutcome::Claimed));
//! assert_eq!(
//!     grid.claim(cell, EntityId::new(2)),
//!     Ok(ClaimOutcome::AlreadyClaimed(EntityId::new(1)))
//! );
//! assert!(grid.tile(Cell::new(9, 9)).is_err());
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::{ConfigError, GridError};

// =============================================================================
// Cell Coordinates
// =============================================================================

/// Integer cell coordinate on the stage grid.
///
/// `x` is the column (left to right), `y` is the row. Cells are ordered
/// row-major (`y` first, then `x`) so that grid iteration is deterministic.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell(IVec2);

impl Cell {
    /// Creates a cell from column and row.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self(IVec2::new(x, y))
    }

    /// Column index.
    #[must_use]
    pub const fn x(self) -> i32 {
        self.0.x
    }

    /// Row index.
    #[must_use]
    pub const fn y(self) -> i32 {
        self.0.y
    }

    /// Returns the underlying vector.
    #[must_use]
    pub const fn as_ivec2(self) -> IVec2 {
        self.0
    }

    /// Returns the cell displaced by `(dx, dy)`.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self(self.0 + IVec2::new(dx, dy))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.0.y, self.0.x).cmp(&(other.0.y, other.0.x))
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell({}, {})", self.0.x, self.0.y)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0.x, self.0.y)
    }
}

impl From<IVec2> for Cell {
    fn from(v: IVec2) -> Self {
        Self(v)
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

// =============================================================================
// Teams
// =============================================================================

/// Side a tile or entity belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    /// The player's half of the stage.
    Player,
    /// The opposing half of the stage.
    Enemy,
    /// Unaligned tiles or entities (obstacles, hazards).
    Neutral,
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "Player"),
            Self::Enemy => write!(f, "Enemy"),
            Self::Neutral => write!(f, "Neutral"),
        }
    }
}

// =============================================================================
// Tiles
// =============================================================================

/// State of one stage cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Raised while an occupant stands here or a claim is held.
    pub occupied: bool,
    /// Entity holding the advisory reservation, if any.
    pub claimant: Option<EntityId>,
    /// Entity physically on the tile, if any.
    pub occupant: Option<EntityId>,
    /// The entity that most recently left this tile.
    pub last_occupant: Option<EntityId>,
    /// Side the tile belongs to.
    pub team: Team,
    /// Whether grounded entities may stand here.
    pub passable: bool,
}

impl Tile {
    /// Creates an empty tile.
    #[must_use]
    pub const fn new(team: Team, passable: bool) -> Self {
        Self {
            occupied: false,
            claimant: None,
            occupant: None,
            last_occupant: None,
            team,
            passable,
        }
    }

    /// Tiles held in the grid always exist.
    #[must_use]
    pub const fn exists(&self) -> bool {
        true
    }

    /// Returns `true` if `entity` holds the claim.
    #[must_use]
    pub fn is_claimed_by(&self, entity: EntityId) -> bool {
        self.claimant == Some(entity)
    }

    /// Returns `true` if a claim is held by anyone other than `entity`.
    #[must_use]
    pub fn is_claimed_by_other(&self, entity: EntityId) -> bool {
        self.claimant.is_some_and(|c| c != entity)
    }
}

// =============================================================================
// Stage Definition
// =============================================================================

const fn default_true() -> bool {
    true
}

/// One cell of a stage definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileDefinition {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Owning side.
    pub team: Team,
    /// Whether grounded entities may stand here.
    #[serde(default = "default_true")]
    pub passable: bool,
    /// `false` marks a hole: the cell is skipped and never addressable.
    #[serde(default = "default_true")]
    pub exists: bool,
}

impl TileDefinition {
    /// Creates an existing, passable tile definition.
    #[must_use]
    pub const fn new(x: i32, y: i32, team: Team) -> Self {
        Self {
            x,
            y,
            team,
            passable: true,
            exists: true,
        }
    }
}

/// Static description of a stage: its valid cells, teams and passability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Tile definitions; later entries for the same cell win.
    pub tiles: Vec<TileDefinition>,
}

impl StageDefinition {
    /// Builds a `width` x `height` stage split into two halves.
    ///
    /// Columns `0..split` belong to [`Team::Player`], columns `split..width`
    /// to [`Team::Enemy`]. Every tile is passable.
    #[must_use]
    pub fn rectangle(width: i32, height: i32, split: i32) -> Self {
        let mut tiles = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let team = if x < split { Team::Player } else { Team::Enemy };
                tiles.push(TileDefinition::new(x, y, team));
            }
        }
        Self { tiles }
    }

    /// Parses a stage definition from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed input and
    /// [`ConfigError::Invalid`] for a stage with no existing tiles.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let stage: Self = serde_json::from_str(json)?;
        if !stage.tiles.iter().any(|t| t.exists) {
            return Err(ConfigError::Invalid(
                "stage defines no existing tiles".to_string(),
            ));
        }
        Ok(stage)
    }

    /// Overrides the passability of one cell, if defined.
    #[must_use]
    pub fn with_impassable(mut self, x: i32, y: i32) -> Self {
        for tile in self.tiles.iter_mut().filter(|t| t.x == x && t.y == y) {
            tile.passable = false;
        }
        self
    }

    /// Marks one cell as a hole, if defined.
    #[must_use]
    pub fn with_hole(mut self, x: i32, y: i32) -> Self {
        for tile in self.tiles.iter_mut().filter(|t| t.x == x && t.y == y) {
            tile.exists = false;
        }
        self
    }
}

// =============================================================================
// Grid
// =============================================================================

/// Result of a claim request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The requester now holds the claim (or already held it).
    Claimed,
    /// Another entity holds the claim; nothing changed.
    AlreadyClaimed(EntityId),
}

/// Cell-to-tile storage for one battle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    tiles: BTreeMap<Cell, Tile>,
}

impl Grid {
    /// Builds the grid from a stage definition, skipping holes.
    #[must_use]
    pub fn from_stage(stage: &StageDefinition) -> Self {
        let mut tiles = BTreeMap::new();
        for def in &stage.tiles {
            let cell = Cell::new(def.x, def.y);
            if def.exists {
                tiles.insert(cell, Tile::new(def.team, def.passable));
            } else {
                tiles.remove(&cell);
            }
        }
        Self { tiles }
    }

    /// Looks up a tile.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::TileNotFound`] for undefined cells.
    pub fn tile(&self, cell: Cell) -> Result<&Tile, GridError> {
        self.tiles.get(&cell).ok_or(GridError::TileNotFound(cell))
    }

    fn tile_mut(&mut self, cell: Cell) -> Result<&mut Tile, GridError> {
        self.tiles.get_mut(&cell).ok_or(GridError::TileNotFound(cell))
    }

    /// Returns `true` if the cell is part of the stage.
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        self.tiles.contains_key(&cell)
    }

    /// Sets or clears the physical occupant of a tile.
    ///
    /// Clearing records the departing entity as the tile's last occupant.
    /// `occupied` stays raised while a claim is still held.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::TileNotFound`] for undefined cells.
    pub fn set_occupant(&mut self, cell: Cell, entity: Option<EntityId>) -> Result<(), GridError> {
        let tile = self.tile_mut(cell)?;
        match entity {
            Some(id) => {
                tile.occupant = Some(id);
                tile.occupied = true;
            }
            None => {
                if let Some(previous) = tile.occupant.take() {
                    tile.last_occupant = Some(previous);
                }
                tile.occupied = tile.claimant.is_some();
            }
        }
        Ok(())
    }

    /// Clears the occupant only if it is `entity`.
    ///
    /// Returns `true` if `entity` was standing on the cell.
    pub fn vacate(&mut self, cell: Cell, entity: EntityId) -> bool {
        match self.tiles.get_mut(&cell) {
            Some(tile) if tile.occupant == Some(entity) => {
                tile.occupant = None;
                tile.last_occupant = Some(entity);
                tile.occupied = tile.claimant.is_some();
                true
            }
            _ => false,
        }
    }

    /// Places an exclusive claim on a tile.
    ///
    /// Claiming a tile already held by the requester is a successful no-op.
    /// A claim held by another entity is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::TileNotFound`] for undefined cells.
    pub fn claim(&mut self, cell: Cell, entity: EntityId) -> Result<ClaimOutcome, GridError> {
        let tile = self.tile_mut(cell)?;
        if let Some(holder) = tile.claimant.filter(|&c| c != entity) {
            tracing::debug!(%cell, %entity, %holder, "claim rejected");
            return Ok(ClaimOutcome::AlreadyClaimed(holder));
        }
        tile.claimant = Some(entity);
        tile.occupied = true;
        Ok(ClaimOutcome::Claimed)
    }

    /// Drops any claim on a tile, whoever holds it.
    ///
    /// `occupied` tracks "claimed or stood on", so it is only lowered when no
    /// occupant remains. A claimed tile that also holds an occupant stays
    /// occupied after release with no claimant. Returns the former claimant.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::TileNotFound`] for undefined cells.
    pub fn release(&mut self, cell: Cell) -> Result<Option<EntityId>, GridError> {
        let tile = self.tile_mut(cell)?;
        let previous = tile.claimant.take();
        tile.occupied = tile.occupant.is_some();
        Ok(previous)
    }

    /// Whether grounded entities may stand on the tile.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::TileNotFound`] for undefined cells.
    pub fn is_passable(&self, cell: Cell) -> Result<bool, GridError> {
        self.tile(cell).map(|t| t.passable)
    }

    /// The side a tile belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::TileNotFound`] for undefined cells.
    pub fn team_of(&self, cell: Cell) -> Result<Team, GridError> {
        self.tile(cell).map(|t| t.team)
    }

    /// The entity standing on a cell, if the cell exists and is occupied.
    #[must_use]
    pub fn occupant_at(&self, cell: Cell) -> Option<EntityId> {
        self.tiles.get(&cell).and_then(|t| t.occupant)
    }

    /// Iterates over all cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.tiles.keys().copied()
    }

    /// Iterates over all tiles in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = (Cell, &Tile)> + '_ {
        self.tiles.iter().map(|(c, t)| (*c, t))
    }

    /// Number of addressable tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Returns `true` if the stage has no tiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

// =============================================================================
// Coordinate Mapping
// =============================================================================

/// Converts between cell coordinates and presentation-space positions.
///
/// The core only works in integer cells; the presentation layer supplies an
/// implementation matching its tilemap geometry.
pub trait CellMapper {
    /// World-space center of a cell.
    fn cell_to_world(&self, cell: Cell) -> Vec2;

    /// Cell containing a world-space position.
    fn world_to_cell(&self, position: Vec2) -> Cell;
}

/// Uniform rectangular tile layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformCellMapper {
    /// World-space width of one column.
    pub cell_width: f32,
    /// World-space height of one row.
    pub cell_height: f32,
    /// World-space position of cell (0, 0).
    pub origin: Vec2,
}

impl Default for UniformCellMapper {
    fn default() -> Self {
        Self {
            cell_width: 1.6,
            cell_height: 1.0,
            origin: Vec2::ZERO,
        }
    }
}

impl CellMapper for UniformCellMapper {
    #[allow(clippy::cast_precision_loss)]
    fn cell_to_world(&self, cell: Cell) -> Vec2 {
        self.origin + Vec2::new(cell.x() as f32 * self.cell_width, cell.y() as f32 * self.cell_height)
    }

    // f32::round rounds half away from zero
    #[allow(clippy::cast_possible_truncation)]
    fn world_to_cell(&self, position: Vec2) -> Cell {
        let local = position - self.origin;
        Cell::new(
            (local.x / self.cell_width).round() as i32,
            (local.y / self.cell_height).round() as i32,
        )
    }
}

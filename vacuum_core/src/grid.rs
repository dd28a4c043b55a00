//! The Grid World - one simulation instance.
//!
//! A grid world owns a fixed-size dirt grid, a single agent position and the
//! score/budget counters. It is created either from sampling parameters
//! (dimensions, dirt rate, seed) or from an explicit layout captured in a
//! recording. Mutation happens only through [`crate::engine::apply`].

use crate::error::CoreError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use vacuum_env::EnvironmentId;

/// Largest accepted width/height.
pub const MAX_DIMENSION: u16 = 256;

/// Action budget ceiling (also the default budget).
pub const MAX_ACTIONS: u32 = 1000;

/// A cell coordinate. `x` grows to the right, `y` grows downwards.
///
/// Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u16; 2]", into = "[u16; 2]")]
pub struct Position {
    pub x: u16,
    pub y: u16,
}

impl Position {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Returns the neighbouring cell at `(dx, dy)` if it lies inside a
    /// `width × height` grid.
    pub fn offset(self, dx: i32, dy: i32, width: u16, height: u16) -> Option<Position> {
        let x = i32::from(self.x) + dx;
        let y = i32::from(self.y) + dy;
        if x < 0 || y < 0 || x >= i32::from(width) || y >= i32::from(height) {
            return None;
        }
        Some(Position::new(x as u16, y as u16))
    }
}

impl From<[u16; 2]> for Position {
    fn from([x, y]: [u16; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [u16; 2] {
    fn from(p: Position) -> Self {
        [p.x, p.y]
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Row-major dirt map.
///
/// Serialized as rows of `0`/`1` integers, row index = `y`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>", into = "Vec<Vec<u8>>")]
pub struct DirtGrid {
    width: u16,
    height: u16,
    cells: Vec<bool>,
}

impl DirtGrid {
    /// Creates an all-clean grid.
    pub fn clean(width: u16, height: u16) -> Result<Self, CoreError> {
        validate_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            cells: vec![false; usize::from(width) * usize::from(height)],
        })
    }

    /// Samples each cell independently with probability `dirt_rate`.
    ///
    /// Cells are drawn in row-major order from a `ChaCha8Rng` seeded with
    /// `seed`, so the same arguments always give the same layout.
    pub fn sample(width: u16, height: u16, dirt_rate: f64, seed: u64) -> Result<Self, CoreError> {
        validate_dimensions(width, height)?;
        validate_dirt_rate(dirt_rate)?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cells = (0..usize::from(width) * usize::from(height))
            .map(|_| rng.gen_bool(dirt_rate))
            .collect();
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Position) -> usize {
        usize::from(pos.y) * usize::from(self.width) + usize::from(pos.x)
    }

    /// Out-of-bounds cells read as clean.
    pub fn is_dirty(&self, pos: Position) -> bool {
        self.contains(pos) && self.cells[self.index(pos)]
    }

    /// Sets a cell; out-of-bounds writes are ignored.
    pub fn set(&mut self, pos: Position, dirty: bool) {
        if self.contains(pos) {
            let idx = self.index(pos);
            self.cells[idx] = dirty;
        }
    }

    pub fn dirty_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Rows of 0/1 values, the wire representation.
    pub fn rows(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(usize::from(self.width))
            .map(|row| row.iter().map(|&c| u8::from(c)).collect())
            .collect()
    }
}

impl TryFrom<Vec<Vec<u8>>> for DirtGrid {
    type Error = String;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let max = usize::from(MAX_DIMENSION);
        if width == 0 || height == 0 || width > max || height > max {
            return Err(format!("dirt grid must be 1..={max} per axis, got {width}x{height}"));
        }

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(format!("row {y} has {} cells, expected {width}", row.len()));
            }
            for &v in row {
                match v {
                    0 => cells.push(false),
                    1 => cells.push(true),
                    other => return Err(format!("cell value {other} in row {y} is not 0 or 1")),
                }
            }
        }

        Ok(Self {
            width: width as u16,
            height: height as u16,
            cells,
        })
    }
}

impl From<DirtGrid> for Vec<Vec<u8>> {
    fn from(grid: DirtGrid) -> Self {
        grid.rows()
    }
}

/// Why an instance stopped accepting actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// `actions_taken == max_actions`
    MaxActionsReached,
    /// No dirty cell remains
    AllCleaned,
}

/// Creation parameters for a grid world.
#[derive(Debug, Clone, PartialEq)]
pub struct GridWorldParams {
    pub width: u16,
    pub height: u16,
    pub initial_position: Position,
    pub dirt_rate: f64,
    /// `None` draws a fresh seed; the drawn value is stored on the instance.
    pub seed: Option<u64>,
    pub max_actions: u32,
    pub restricted: bool,
}

impl GridWorldParams {
    /// Parameters for a `width × height` world with the agent in the centre.
    pub fn new(width: u16, height: u16, dirt_rate: f64) -> Self {
        Self {
            width,
            height,
            initial_position: Position::new(width / 2, height / 2),
            dirt_rate,
            seed: None,
            max_actions: MAX_ACTIONS,
            restricted: false,
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.initial_position = position;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_actions(mut self, max_actions: u32) -> Self {
        self.max_actions = max_actions;
        self
    }

    pub fn restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }

    /// Checks every limit before anything is allocated.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_dimensions(self.width, self.height)?;
        if self.initial_position.x >= self.width || self.initial_position.y >= self.height {
            return Err(CoreError::invalid(format!(
                "initial position {} outside {}x{} grid",
                self.initial_position, self.width, self.height
            )));
        }
        validate_dirt_rate(self.dirt_rate)?;
        validate_max_actions(self.max_actions)
    }
}

fn validate_dirt_rate(dirt_rate: f64) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&dirt_rate) {
        return Err(CoreError::invalid(format!("dirt rate {dirt_rate} not in [0, 1]")));
    }
    Ok(())
}

fn validate_dimensions(width: u16, height: u16) -> Result<(), CoreError> {
    if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
        return Err(CoreError::invalid(format!(
            "grid size {width}x{height} outside 1..={MAX_DIMENSION}"
        )));
    }
    Ok(())
}

fn validate_max_actions(max_actions: u32) -> Result<(), CoreError> {
    if !(1..=MAX_ACTIONS).contains(&max_actions) {
        return Err(CoreError::invalid(format!(
            "action budget {max_actions} outside 1..={MAX_ACTIONS}"
        )));
    }
    Ok(())
}

/// A consistent point-in-time copy of a grid world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub dirt_grid: DirtGrid,
    pub agent_position: Position,
    pub is_dirty: bool,
    pub performance: u32,
    pub actions_taken: u32,
    pub actions_remaining: u32,
    pub finished: bool,
    pub completion_reason: Option<CompletionReason>,
}

/// One vacuum world instance.
#[derive(Debug, Clone)]
pub struct GridWorld {
    id: EnvironmentId,
    pub(crate) dirt: DirtGrid,
    pub(crate) agent: Position,
    pub(crate) performance: u32,
    pub(crate) actions_taken: u32,
    max_actions: u32,
    restricted: bool,
    seed: Option<u64>,
    dirt_rate: f64,
    pub(crate) dirty_remaining: usize,
    pub(crate) completion: Option<CompletionReason>,
}

impl GridWorld {
    /// Validates `params` and samples a fresh dirt layout.
    pub fn create(id: EnvironmentId, params: &GridWorldParams) -> Result<Self, CoreError> {
        params.validate()?;
        let seed = params.seed.unwrap_or_else(rand::random);
        let dirt = DirtGrid::sample(params.width, params.height, params.dirt_rate, seed)?;

        let mut world = Self::assemble(
            id,
            dirt,
            params.initial_position,
            params.max_actions,
            params.restricted,
        );
        world.seed = Some(seed);
        world.dirt_rate = params.dirt_rate;
        Ok(world)
    }

    /// Builds a world from an explicit dirt layout (replay, forced scenarios).
    pub fn from_layout(
        id: EnvironmentId,
        dirt: DirtGrid,
        position: Position,
        max_actions: u32,
        restricted: bool,
    ) -> Result<Self, CoreError> {
        validate_dimensions(dirt.width(), dirt.height())?;
        if !dirt.contains(position) {
            return Err(CoreError::invalid(format!(
                "initial position {} outside {}x{} grid",
                position,
                dirt.width(),
                dirt.height()
            )));
        }
        validate_max_actions(max_actions)?;
        Ok(Self::assemble(id, dirt, position, max_actions, restricted))
    }

    fn assemble(
        id: EnvironmentId,
        dirt: DirtGrid,
        agent: Position,
        max_actions: u32,
        restricted: bool,
    ) -> Self {
        let dirty_remaining = dirt.dirty_count();
        let cells = usize::from(dirt.width()) * usize::from(dirt.height());
        let mut world = Self {
            id,
            dirt,
            agent,
            performance: 0,
            actions_taken: 0,
            max_actions,
            restricted,
            seed: None,
            dirt_rate: dirty_remaining as f64 / cells as f64,
            dirty_remaining,
            completion: None,
        };
        // A layout without dirt is terminal from the start
        world.refresh_completion();
        world
    }

    /// Latches the completion reason once a terminal condition holds.
    pub(crate) fn refresh_completion(&mut self) {
        if self.completion.is_some() {
            return;
        }
        if self.actions_taken >= self.max_actions {
            self.completion = Some(CompletionReason::MaxActionsReached);
        } else if self.dirty_remaining == 0 {
            self.completion = Some(CompletionReason::AllCleaned);
        }
    }

    pub fn id(&self) -> EnvironmentId {
        self.id
    }

    pub fn width(&self) -> u16 {
        self.dirt.width()
    }

    pub fn height(&self) -> u16 {
        self.dirt.height()
    }

    pub fn agent_position(&self) -> Position {
        self.agent
    }

    pub fn performance(&self) -> u32 {
        self.performance
    }

    pub fn actions_taken(&self) -> u32 {
        self.actions_taken
    }

    pub fn max_actions(&self) -> u32 {
        self.max_actions
    }

    pub fn actions_remaining(&self) -> u32 {
        self.max_actions - self.actions_taken
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    /// Seed the layout was sampled from; `None` for explicit layouts.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Requested dirt rate, or the realised fraction for explicit layouts.
    pub fn dirt_rate(&self) -> f64 {
        self.dirt_rate
    }

    pub fn dirt(&self) -> &DirtGrid {
        &self.dirt
    }

    pub fn dirty_cells(&self) -> usize {
        self.dirty_remaining
    }

    pub fn current_cell_dirty(&self) -> bool {
        self.dirt.is_dirty(self.agent)
    }

    pub fn is_finished(&self) -> bool {
        self.completion.is_some()
    }

    pub fn completion_reason(&self) -> Option<CompletionReason> {
        self.completion
    }

    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            dirt_grid: self.dirt.clone(),
            agent_position: self.agent,
            is_dirty: self.current_cell_dirty(),
            performance: self.performance,
            actions_taken: self.actions_taken,
            actions_remaining: self.actions_remaining(),
            finished: self.is_finished(),
            completion_reason: self.completion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> EnvironmentId {
        EnvironmentId::from_seed(1)
    }

    #[test]
    fn test_create_rejects_bad_dimensions() {
        for (w, h) in [(0, 4), (4, 0), (257, 4), (4, 257)] {
            let params = GridWorldParams::new(w, h, 0.3).with_position(Position::new(0, 0));
            assert!(matches!(
                GridWorld::create(id(), &params),
                Err(CoreError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_create_rejects_bad_dirt_rate() {
        for rate in [-0.1, 1.01, f64::NAN] {
            let params = GridWorldParams::new(4, 4, rate);
            assert!(matches!(
                GridWorld::create(id(), &params),
                Err(CoreError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_create_rejects_position_out_of_bounds() {
        let params = GridWorldParams::new(4, 4, 0.3).with_position(Position::new(4, 0));
        assert!(GridWorld::create(id(), &params).is_err());
    }

    #[test]
    fn test_create_rejects_bad_budget() {
        let params = GridWorldParams::new(4, 4, 0.3).with_max_actions(0);
        assert!(GridWorld::create(id(), &params).is_err());
        let params = GridWorldParams::new(4, 4, 0.3).with_max_actions(MAX_ACTIONS + 1);
        assert!(GridWorld::create(id(), &params).is_err());
    }

    #[test]
    fn test_same_seed_same_layout() {
        let params = GridWorldParams::new(16, 9, 0.4).with_seed(99);
        let a = GridWorld::create(id(), &params).unwrap();
        let b = GridWorld::create(EnvironmentId::from_seed(2), &params).unwrap();

        assert_eq!(a.dirt(), b.dirt());
        assert_eq!(a.seed(), Some(99));
        assert_eq!(a.dirty_cells(), DirtGrid::sample(16, 9, 0.4, 99).unwrap().dirty_count());
    }

    #[test]
    fn test_unseeded_world_records_its_seed() {
        let params = GridWorldParams::new(8, 8, 0.5);
        let world = GridWorld::create(id(), &params).unwrap();
        let seed = world.seed().unwrap();

        let again = GridWorld::create(id(), &params.clone().with_seed(seed)).unwrap();
        assert_eq!(world.dirt(), again.dirt());
    }

    #[test]
    fn test_full_and_empty_rates() {
        let full = GridWorld::create(id(), &GridWorldParams::new(5, 3, 1.0).with_seed(1)).unwrap();
        assert_eq!(full.dirty_cells(), 15);
        assert!(!full.is_finished());

        let empty = GridWorld::create(id(), &GridWorldParams::new(5, 3, 0.0).with_seed(1)).unwrap();
        assert_eq!(empty.dirty_cells(), 0);
        assert!(empty.is_finished());
        assert_eq!(empty.actions_taken(), 0);
        assert_eq!(empty.completion_reason(), Some(CompletionReason::AllCleaned));
    }

    #[test]
    fn test_from_layout_and_snapshot() {
        let mut dirt = DirtGrid::clean(2, 2).unwrap();
        dirt.set(Position::new(0, 0), true);
        let world = GridWorld::from_layout(id(), dirt, Position::new(0, 0), MAX_ACTIONS, false).unwrap();

        assert!(world.current_cell_dirty());
        let snap = world.snapshot();
        assert_eq!(snap.dirt_grid.rows(), vec![vec![1, 0], vec![0, 0]]);
        assert_eq!(snap.actions_remaining, MAX_ACTIONS);
        assert!(!snap.finished);
        assert_eq!(world.seed(), None);
        assert!((world.dirt_rate() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_dirt_grid_wire_format() {
        let grid: DirtGrid = serde_json::from_str("[[0,1,0],[1,0,0]]").unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert!(grid.is_dirty(Position::new(1, 0)));
        assert!(grid.is_dirty(Position::new(0, 1)));
        assert_eq!(serde_json::to_string(&grid).unwrap(), "[[0,1,0],[1,0,0]]");
    }

    #[test]
    fn test_dirt_grid_rejects_ragged_or_non_binary() {
        assert!(serde_json::from_str::<DirtGrid>("[[0,1],[1]]").is_err());
        assert!(serde_json::from_str::<DirtGrid>("[[0,2]]").is_err());
        assert!(serde_json::from_str::<DirtGrid>("[]").is_err());
    }

    #[test]
    fn test_dirt_grid_constructors_validate_size() {
        assert!(DirtGrid::clean(0, 3).is_err());
        assert!(DirtGrid::clean(3, MAX_DIMENSION + 1).is_err());
        assert!(DirtGrid::sample(0, 0, 0.5, 1).is_err());
        assert!(DirtGrid::sample(4, 4, 1.5, 1).is_err());
        assert!(DirtGrid::sample(4, 4, f64::NAN, 1).is_err());

        let grid = DirtGrid::clean(1, MAX_DIMENSION).unwrap();
        assert_eq!(grid.rows().len(), usize::from(MAX_DIMENSION));
        assert_eq!(grid.dirty_count(), 0);
    }

    #[test]
    fn test_position_offset_respects_bounds() {
        let p = Position::new(0, 0);
        assert_eq!(p.offset(-1, 0, 3, 3), None);
        assert_eq!(p.offset(0, -1, 3, 3), None);
        assert_eq!(p.offset(1, 0, 3, 3), Some(Position::new(1, 0)));
        assert_eq!(Position::new(2, 2).offset(0, 1, 3, 3), None);
        assert_eq!(serde_json::to_string(&Position::new(3, 4)).unwrap(), "[3,4]");
    }
}

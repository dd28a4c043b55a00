//! Perception Gate - what an agent is allowed to see.
//!
//! The local view (own cell only) is always available. The global view
//! exposes the whole dirt grid and is denied on restricted worlds to
//! simulate partial observability; the data exists, access does not.

use crate::error::CoreError;
use crate::grid::{CompletionReason, DirtGrid, GridWorld, Position};
use serde::{Deserialize, Serialize};

/// Agent-local perception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perception {
    pub position: Position,
    pub is_dirty: bool,
    pub actions_remaining: u32,
    pub finished: bool,
    pub completion_reason: Option<CompletionReason>,
}

/// Full-state view, gated by the restricted flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalView {
    pub dirt_grid: DirtGrid,
    pub agent_position: Position,
    pub is_dirty: bool,
    pub performance: u32,
    pub actions_taken: u32,
    pub actions_remaining: u32,
    pub finished: bool,
    pub completion_reason: Option<CompletionReason>,
}

pub fn sense(world: &GridWorld) -> Perception {
    Perception {
        position: world.agent_position(),
        is_dirty: world.current_cell_dirty(),
        actions_remaining: world.actions_remaining(),
        finished: world.is_finished(),
        completion_reason: world.completion_reason(),
    }
}

/// Returns the global view, or `Restricted` for restricted worlds.
pub fn observe(world: &GridWorld) -> Result<GlobalView, CoreError> {
    if world.is_restricted() {
        return Err(CoreError::Restricted(world.id()));
    }
    Ok(GlobalView {
        dirt_grid: world.dirt().clone(),
        agent_position: world.agent_position(),
        is_dirty: world.current_cell_dirty(),
        performance: world.performance(),
        actions_taken: world.actions_taken(),
        actions_remaining: world.actions_remaining(),
        finished: world.is_finished(),
        completion_reason: world.completion_reason(),
    })
}

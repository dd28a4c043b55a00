//! The Action Engine - the only code path that mutates a [`GridWorld`].
//!
//! `apply` is total over [`Action`] and touches nothing but the world it is
//! given, so distinct worlds can be stepped fully in parallel. Callers are
//! responsible for holding the world's lock for the duration of the call.

use crate::error::CoreError;
use crate::grid::{GridSnapshot, GridWorld};
use serde::{Deserialize, Serialize};

/// The fixed action set an agent can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Suck,
    Idle,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Up,
        Action::Down,
        Action::Left,
        Action::Right,
        Action::Suck,
        Action::Idle,
    ];

    pub const MOVES: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Down => "down",
            Action::Left => "left",
            Action::Right => "right",
            Action::Suck => "suck",
            Action::Idle => "idle",
        }
    }

    /// Grid displacement for movement actions.
    pub fn delta(&self) -> Option<(i32, i32)> {
        match self {
            Action::Up => Some((0, -1)),
            Action::Down => Some((0, 1)),
            Action::Left => Some((-1, 0)),
            Action::Right => Some((1, 0)),
            Action::Suck | Action::Idle => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(Action::Up),
            "down" => Ok(Action::Down),
            "left" => Ok(Action::Left),
            "right" => Ok(Action::Right),
            "suck" => Ok(Action::Suck),
            "idle" => Ok(Action::Idle),
            _ => Err(CoreError::invalid(format!("unknown action: {s:?}"))),
        }
    }
}

/// Result of one accepted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub action: Action,
    pub before: GridSnapshot,
    pub after: GridSnapshot,
    /// 1 when a `suck` cleaned dirt, otherwise 0
    pub reward: u32,
}

/// Applies `action` to `world` and returns the transition.
///
/// A finished world rejects the action with `EnvironmentFinished` and is left
/// untouched. Moves that would leave the grid keep the agent in place but
/// still consume one unit of the action budget.
pub fn apply(world: &mut GridWorld, action: Action) -> Result<StepOutcome, CoreError> {
    if world.is_finished() {
        return Err(CoreError::EnvironmentFinished(world.id()));
    }

    let before = world.snapshot();
    let mut reward = 0;

    match action.delta() {
        Some((dx, dy)) => {
            if let Some(next) = world.agent.offset(dx, dy, world.width(), world.height()) {
                world.agent = next;
            }
        }
        None if action == Action::Suck => {
            if world.dirt.is_dirty(world.agent) {
                let here = world.agent;
                world.dirt.set(here, false);
                world.dirty_remaining -= 1;
                reward = 1;
            }
        }
        None => {}
    }

    world.actions_taken += 1;
    world.performance += reward;
    world.refresh_completion();

    Ok(StepOutcome {
        action,
        before,
        after: world.snapshot(),
        reward,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CompletionReason, DirtGrid, GridWorldParams, Position, MAX_ACTIONS};
    use proptest::prelude::*;
    use vacuum_env::EnvironmentId;

    fn world_with(dirty: &[(u16, u16)], w: u16, h: u16, at: (u16, u16), budget: u32) -> GridWorld {
        let mut dirt = DirtGrid::clean(w, h).unwrap();
        for &(x, y) in dirty {
            dirt.set(Position::new(x, y), true);
        }
        GridWorld::from_layout(EnvironmentId::from_seed(3), dirt, Position::new(at.0, at.1), budget, false)
            .unwrap()
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("SUCK".parse::<Action>().unwrap(), Action::Suck);
        assert_eq!(" left ".parse::<Action>().unwrap(), Action::Left);
        assert!(matches!("jump".parse::<Action>(), Err(CoreError::InvalidParameter(_))));
        assert_eq!(serde_json::to_string(&Action::Idle).unwrap(), "\"idle\"");
    }

    #[test]
    fn test_suck_last_dirt_finishes_world() {
        // 2x2, only (0,0) dirty, agent on it
        let mut world = world_with(&[(0, 0)], 2, 2, (0, 0), MAX_ACTIONS);
        let out = apply(&mut world, Action::Suck).unwrap();

        assert_eq!(out.reward, 1);
        assert_eq!(world.performance(), 1);
        assert!(world.is_finished());
        assert_eq!(world.actions_taken(), 1);
        assert_eq!(world.completion_reason(), Some(CompletionReason::AllCleaned));
        assert!(out.after.finished);
        assert!(!out.before.finished);
    }

    #[test]
    fn test_budget_exhaustion_with_idle() {
        let mut world = world_with(&[(0, 0)], 2, 2, (1, 1), 3);
        for i in 0..3 {
            let out = apply(&mut world, Action::Idle).unwrap();
            assert_eq!(out.reward, 0);
            assert_eq!(out.after.finished, i == 2);
        }
        assert_eq!(world.performance(), 0);
        assert_eq!(world.completion_reason(), Some(CompletionReason::MaxActionsReached));
    }

    #[test]
    fn test_finished_world_rejects_without_mutation() {
        let mut world = world_with(&[(0, 0)], 2, 2, (0, 0), MAX_ACTIONS);
        apply(&mut world, Action::Suck).unwrap();
        let frozen = world.snapshot();

        for action in Action::ALL {
            let err = apply(&mut world, action).unwrap_err();
            assert_eq!(err, CoreError::EnvironmentFinished(world.id()));
        }
        assert_eq!(world.snapshot(), frozen);
    }

    #[test]
    fn test_wall_bump_costs_an_action() {
        let mut world = world_with(&[(1, 1)], 2, 2, (0, 0), MAX_ACTIONS);
        let out = apply(&mut world, Action::Up).unwrap();
        assert_eq!(out.after.agent_position, Position::new(0, 0));
        assert_eq!(world.actions_taken(), 1);

        apply(&mut world, Action::Left).unwrap();
        assert_eq!(world.agent_position(), Position::new(0, 0));
        assert_eq!(world.actions_taken(), 2);
    }

    #[test]
    fn test_suck_is_idempotent_on_clean_cell() {
        let mut world = world_with(&[(0, 0), (1, 1)], 2, 2, (0, 0), MAX_ACTIONS);
        assert_eq!(apply(&mut world, Action::Suck).unwrap().reward, 1);
        let dirt_after_first = world.dirt().clone();

        let out = apply(&mut world, Action::Suck).unwrap();
        assert_eq!(out.reward, 0);
        assert_eq!(world.dirt(), &dirt_after_first);
        assert_eq!(world.performance(), 1);
    }

    #[test]
    fn test_moves_follow_screen_axes() {
        let mut world = world_with(&[(0, 0)], 3, 3, (1, 1), MAX_ACTIONS);
        apply(&mut world, Action::Up).unwrap();
        assert_eq!(world.agent_position(), Position::new(1, 0));
        apply(&mut world, Action::Right).unwrap();
        assert_eq!(world.agent_position(), Position::new(2, 0));
        apply(&mut world, Action::Down).unwrap();
        assert_eq!(world.agent_position(), Position::new(2, 1));
        apply(&mut world, Action::Left).unwrap();
        assert_eq!(world.agent_position(), Position::new(1, 1));
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        prop::sample::select(Action::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_counters_and_bounds(
            w in 1u16..12,
            h in 1u16..12,
            rate in 0.0f64..=1.0,
            seed in any::<u64>(),
            budget in 1u32..60,
            actions in prop::collection::vec(arb_action(), 0..120),
        ) {
            let params = GridWorldParams::new(w, h, rate).with_seed(seed).with_max_actions(budget);
            let mut world = GridWorld::create(EnvironmentId::from_seed(seed), &params).unwrap();
            let initial_dirt = world.dirty_cells() as u32;
            let mut accepted = 0u32;

            for action in actions {
                let was_finished = world.is_finished();
                let before = world.snapshot();
                match apply(&mut world, action) {
                    Ok(out) => {
                        prop_assert!(!was_finished);
                        accepted += 1;
                        prop_assert!(out.reward <= 1);
                        prop_assert_eq!(out.after.performance, before.performance + out.reward);
                    }
                    Err(CoreError::EnvironmentFinished(_)) => {
                        prop_assert!(was_finished);
                        prop_assert_eq!(world.snapshot(), before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {other}"),
                }
                let pos = world.agent_position();
                prop_assert!(pos.x < w && pos.y < h);
                prop_assert_eq!(world.actions_taken(), accepted);
                prop_assert!(world.actions_taken() <= world.max_actions());
                prop_assert_eq!(world.performance() + world.dirty_cells() as u32, initial_dirt);
            }
        }
    }
}

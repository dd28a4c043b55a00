//! Step observers: cross-cutting hooks on the apply step.
//!
//! Recording and visualisation attach here instead of living inside the
//! state machine, so the engine stays usable headless.

use crate::engine::StepOutcome;
use crate::perception::Perception;
use vacuum_env::EnvironmentId;

/// One accepted transition, as seen by observers.
#[derive(Debug, Clone, Copy)]
pub struct StepEvent<'a> {
    pub environment_id: EnvironmentId,
    pub outcome: &'a StepOutcome,
    /// Local perception computed immediately after the action
    pub perception: &'a Perception,
}

/// Receives every accepted step of one environment, in application order.
///
/// Called while the environment lock is held: implementations must not
/// block or perform I/O.
pub trait StepObserver: Send {
    fn on_step(&mut self, event: &StepEvent<'_>);
}

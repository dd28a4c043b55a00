//! The agent seam: anything that turns a perception into an action.
//!
//! Agents live outside the server; this trait is only what the harness and
//! the replay comparator need in order to drive one.

use crate::engine::Action;
use crate::perception::Perception;

pub trait Agent: Send {
    /// Human-readable agent type, stored in recording metadata.
    fn name(&self) -> &str;

    /// Chooses the next action from the local perception.
    fn decide(&mut self, perception: &Perception) -> Action;
}

impl<A: Agent + ?Sized> Agent for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn decide(&mut self, perception: &Perception) -> Action {
        (**self).decide(perception)
    }
}

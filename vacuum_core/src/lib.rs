//! Vacuum Core - Grid-World Simulation Engine
//!
//! A multi-tenant host for the vacuum-cleaner grid world:
//! 1. **Engine**: deterministic state machine over dirt, position and budget
//! 2. **Registry**: many independent worlds behind opaque ids, safe under
//!    concurrent access, with idle-time eviction
//! 3. **Perception gate**: local sensing always, global view only when the
//!    environment is not restricted
//! 4. **Recorder / Replayer**: full step history, bit-exact re-execution and
//!    agent-vs-recording comparison

pub mod agent;
pub mod api;
pub mod engine;
pub mod error;
pub mod grid;
pub mod observer;
pub mod perception;
pub mod recording;
pub mod registry;
pub mod replay;

// Re-export key types for convenience
pub use agent::Agent;
pub use api::{ApiError, ApiService};
pub use engine::{apply, Action, StepOutcome};
pub use error::CoreError;
pub use grid::{CompletionReason, DirtGrid, GridSnapshot, GridWorld, GridWorldParams, Position};
pub use observer::{StepEvent, StepObserver};
pub use perception::{observe, sense, GlobalView, Perception};
pub use recording::{Recorder, Recording, RecordingError, StepRecord};
pub use registry::{CreateParams, EnvironmentHandle, EnvironmentRegistry, RegistryConfig};
pub use replay::{ComparisonReport, Divergence, DivergenceKind, ReplayError, ReplayReport, Replayer};

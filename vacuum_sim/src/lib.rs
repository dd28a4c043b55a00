//! Vacuum World Deterministic Simulation Harness
//!
//! Runs the engine and registry in a controlled environment where every
//! source of non-determinism is pinned:
//! - **Time**: a virtual clock that only moves when told to, so idle
//!   eviction can be tested without waiting an hour
//! - **Randomness**: environment seeds and agent choices derived from a
//!   single 64-bit master seed
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ SessionRunner / ScenarioRunner                │
//! │   ┌──────────┐  sense / step  ┌────────────┐  │
//! │   │  Agent   │◄──────────────►│  Registry  │  │
//! │   └──────────┘                │<SimContext>│  │
//! │                               └─────┬──────┘  │
//! │                          Recording  │         │
//! │                          ┌──────────▼──────┐  │
//! │                          │    Replayer     │  │
//! │                          └─────────────────┘  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use vacuum_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::ReplayExact);
//! assert!(result.passed);
//! ```

mod context;
mod runner;
mod session;
pub mod agents;
pub mod bench;
pub mod scenarios;

pub use agents::{AgentKind, RandomAgent, ReflexAgent, ScriptedAgent, WallAgent};
pub use context::SimContext;
pub use runner::{ScenarioResult, ScenarioRunner};
pub use bench::{run_bench, write_csv, BenchConfig, BenchRow};
pub use session::{Efficiency, SessionError, SessionResult, SessionRunner, SessionStats};

//! Vacuum World Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction that lets the vacuum world
//! registry run both in **Production** (tokio, wall clock) and inside the
//! **Simulation** harness (virtual clock, seeded entropy).
//!
//! # Core Concept
//!
//! Everything that would make a run non-reproducible is routed through a
//! [`VacuumContext`]:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Background work (`spawn()`)
//! - Randomness (`next_seed()`)
//!
//! When all entropy is derived from a single 64-bit seed, a failing run can
//! be reproduced from its seed number alone.
//!
//! # Example
//!
//! ```ignore
//! use vacuum_env::{SystemContext, VacuumContext};
//!
//! let ctx = SystemContext::shared();
//! let seed = ctx.next_seed();
//! ```

mod context;
mod error;
mod system_impl;
mod types;

pub use context::VacuumContext;
pub use error::EnvError;
pub use system_impl::SystemContext;
pub use types::{unix_millis, unix_secs, EnvironmentId};

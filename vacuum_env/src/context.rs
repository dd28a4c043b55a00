//! Core environment context trait for the vacuum world server.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the registry and its
/// sweeper can run both in production and inside the deterministic harness.
///
/// # Implementations
///
/// - **Production**: `SystemContext` - wraps `std::time`, `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// Every method that would normally introduce non-determinism (time,
/// randomness) is controlled by the implementation.
#[async_trait]
pub trait VacuumContext: Send + Sync + 'static {
    /// Returns the monotonic time elapsed since context creation.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used for `created_at`/`last_access`.
    ///
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Draws a fresh seed for an environment created without one.
    ///
    /// In simulation the sequence of returned seeds is itself derived from
    /// the master seed, so whole runs stay reproducible.
    fn next_seed(&self) -> u64;

    /// Returns the context's master seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}

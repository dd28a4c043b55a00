//! Benchmark sweeps: every grid size × dirt rate × repeat, one row per run.
//!
//! The layout seed is shared by the repeats of one (size, rate)
//! configuration and steps by one for the next configuration, so a sweep is
//! fully determined by its base seed.

use crate::agents::AgentKind;
use crate::context::SimContext;
use crate::session::{SessionError, SessionRunner};
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use vacuum_core::{CompletionReason, EnvironmentRegistry, GridWorldParams, RegistryConfig};

/// Sweep definition.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub sizes: Vec<(u16, u16)>,
    pub dirt_rates: Vec<f64>,
    pub repeats: u32,
    /// Layout seed of the first configuration
    pub seed: u64,
    pub agent: AgentKind,
    pub max_actions: u32,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            sizes: vec![(2, 2), (4, 4), (8, 8), (16, 16), (32, 32), (64, 64), (128, 128)],
            dirt_rates: vec![0.1, 0.2, 0.4, 0.8],
            repeats: 10,
            seed: 12345,
            agent: AgentKind::Reflex,
            max_actions: vacuum_core::grid::MAX_ACTIONS,
        }
    }
}

/// One CSV row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchRow {
    /// `WxH`
    pub size: String,
    pub width: u16,
    pub height: u16,
    pub dirt_rate: f64,
    /// 1-based repeat index
    pub run: u32,
    pub seed: u64,
    pub agent: String,
    pub performance: u32,
    pub total_actions: u32,
    pub dirty_remaining: usize,
    pub completion_reason: Option<CompletionReason>,
    pub suck_attempts: u32,
    pub successful_sucks: u32,
    pub movement_actions: u32,
    pub idle_actions: u32,
    pub total_dirt_available: usize,
    pub cleaning_efficiency: f64,
    pub movement_efficiency: f64,
    pub action_efficiency: f64,
    pub overall_efficiency: f64,
    pub elapsed_ms: f64,
}

/// Runs the whole sweep on a fresh simulated registry.
pub fn run_bench(config: &BenchConfig) -> Result<Vec<BenchRow>, SessionError> {
    let registry = EnvironmentRegistry::new(
        SimContext::shared(config.seed),
        RegistryConfig::default().with_max_actions(config.max_actions),
    );
    let runner = SessionRunner::new(Arc::new(registry));
    let mut rows = Vec::new();
    let mut seed = config.seed;

    for &(width, height) in &config.sizes {
        for &dirt_rate in &config.dirt_rates {
            for run in 1..=config.repeats {
                let params = GridWorldParams::new(width, height, dirt_rate)
                    .with_seed(seed)
                    .with_max_actions(config.max_actions);
                let mut agent = config.agent.build(seed.wrapping_add(u64::from(run)));

                let started = Instant::now();
                let result = runner.run(params, agent.as_mut())?;
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                debug!(
                    "{}x{} rate={} run={} performance={}",
                    width, height, dirt_rate, run, result.performance
                );

                rows.push(BenchRow {
                    size: format!("{width}x{height}"),
                    width,
                    height,
                    dirt_rate,
                    run,
                    seed,
                    agent: result.agent,
                    performance: result.performance,
                    total_actions: result.steps,
                    dirty_remaining: result.dirty_remaining,
                    completion_reason: result.completion_reason,
                    suck_attempts: result.stats.suck_attempts,
                    successful_sucks: result.stats.successful_sucks,
                    movement_actions: result.stats.movement_actions,
                    idle_actions: result.stats.idle_actions,
                    total_dirt_available: result.stats.total_dirt_available,
                    cleaning_efficiency: result.efficiency.cleaning,
                    movement_efficiency: result.efficiency.movement,
                    action_efficiency: result.efficiency.action,
                    overall_efficiency: result.efficiency.overall,
                    elapsed_ms,
                });
            }
            seed = seed.wrapping_add(1);
        }
    }

    info!("Bench finished: {} runs", rows.len());
    Ok(rows)
}

/// Writes `rows` as CSV with a header line.
pub fn write_csv<W: io::Write>(rows: &[BenchRow], writer: W) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    for row in rows {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

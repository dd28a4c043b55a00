//! Vacuum World Simulator CLI
//!
//! Drive reference agents through the registry, record and replay runs, and
//! execute the deterministic scenario catalogue.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vacuum_core::{EnvironmentRegistry, GridWorldParams, Position, Recording, RegistryConfig, Replayer};
use vacuum_sim::scenarios::ScenarioId;
use vacuum_sim::{
    run_bench, write_csv, AgentKind, BenchConfig, ScenarioResult, ScenarioRunner, SessionRunner,
    SimContext,
};

/// Vacuum world deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "vacuum-sim")]
#[command(about = "Run, record, replay and compare vacuum world sessions", long_about = None)]
struct Args {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one agent on one environment until it finishes
    Run {
        /// Agent to run (random, reflex, wall)
        #[arg(short, long, default_value = "reflex")]
        agent: AgentKind,

        #[arg(long, default_value = "8")]
        width: u16,

        #[arg(long, default_value = "8")]
        height: u16,

        #[arg(long, default_value = "0.3")]
        dirt_rate: f64,

        /// Starting cell as `x,y` (defaults to the centre)
        #[arg(long, value_parser = parse_position)]
        position: Option<Position>,

        /// Master seed for layout and agent
        #[arg(short, long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "1000")]
        max_actions: u32,

        #[arg(long)]
        restricted: bool,

        /// Write the session recording to this file
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Replay a recording and check it reproduces bit-exactly
    Replay {
        file: PathBuf,
    },

    /// Run an agent over a recording's layout and report the first divergence
    Compare {
        file: PathBuf,

        #[arg(short, long, default_value = "reflex")]
        agent: AgentKind,

        /// Agent seed (defaults to the recording's layout seed)
        #[arg(long)]
        agent_seed: Option<u64>,
    },

    /// Sweep grid sizes and dirt rates and write one CSV row per run
    Bench {
        #[arg(short, long, default_value = "reflex")]
        agent: AgentKind,

        /// Grid sizes as `WxH`, comma separated
        #[arg(long, value_parser = parse_size, value_delimiter = ',',
              default_value = "2x2,4x4,8x8,16x16,32x32,64x64,128x128")]
        sizes: Vec<(u16, u16)>,

        #[arg(long, value_delimiter = ',', default_value = "0.1,0.2,0.4,0.8")]
        dirt_rates: Vec<f64>,

        /// Runs per size and rate
        #[arg(long, default_value = "10")]
        repeats: u32,

        /// Layout seed of the first configuration, stepped per configuration
        #[arg(short, long, default_value = "12345")]
        seed: u64,

        #[arg(long, default_value = "1000")]
        max_actions: u32,

        /// CSV destination (stdout when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the scenario catalogue
    Scenarios {
        /// Scenario to run (single_suck, ordered_actions, replay_exact, ..., all)
        #[arg(short = 'S', long, default_value = "all")]
        scenario: String,

        /// Master seed (0 = random from time)
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Number of consecutive seeds to test (for CI mode)
        #[arg(long, default_value = "1")]
        seeds: usize,
    },
}

fn parse_position(raw: &str) -> Result<Position, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected x,y, got {raw:?}"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y: {e}"))?;
    Ok(Position::new(x, y))
}

fn parse_size(raw: &str) -> Result<(u16, u16), String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {raw:?}"))?;
    let w = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    Ok((w, h))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    let outcome = match args.command {
        Command::Run {
            agent,
            width,
            height,
            dirt_rate,
            position,
            seed,
            max_actions,
            restricted,
            record,
        } => {
            let mut params = GridWorldParams::new(width, height, dirt_rate)
                .with_seed(seed)
                .with_max_actions(max_actions)
                .restricted(restricted);
            if let Some(position) = position {
                params = params.with_position(position);
            }
            run(params, agent, record, args.json)
        }
        Command::Replay { file } => replay(&file, args.json),
        Command::Compare {
            file,
            agent,
            agent_seed,
        } => compare(&file, agent, agent_seed, args.json),
        Command::Bench {
            agent,
            sizes,
            dirt_rates,
            repeats,
            seed,
            max_actions,
            output,
        } => {
            let config = BenchConfig {
                sizes,
                dirt_rates,
                repeats,
                seed,
                agent,
                max_actions,
            };
            bench(&config, output.as_deref())
        }
        Command::Scenarios {
            scenario,
            seed,
            seeds,
        } => scenarios(&scenario, seed, seeds, args.json),
    };

    // Exit with proper code for CI
    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(2);
        }
    }
}

fn run(
    params: GridWorldParams,
    kind: AgentKind,
    record: Option<PathBuf>,
    json: bool,
) -> Result<bool> {
    let seed = params.seed.unwrap_or_default();
    let registry = EnvironmentRegistry::new(SimContext::shared(seed), RegistryConfig::default());
    let runner = SessionRunner::new(Arc::new(registry)).with_recording(record.is_some());

    let mut agent = kind.build(seed);
    let result = runner.run(params, agent.as_mut())?;

    if let (Some(path), Some(recording)) = (record.as_ref(), result.recording.as_ref()) {
        recording.save(path)?;
        info!("Recording written to {}", path.display());
    }

    if json {
        print_json(&result)?;
    } else {
        info!(
            "{} finished: performance={} steps={} remaining_dirt={} reason={:?}",
            result.agent,
            result.performance,
            result.steps,
            result.dirty_remaining,
            result.completion_reason
        );
        info!(
            "  sucks {}/{} moves={} idles={} efficiency: cleaning={:.3} movement={:.3} action={:.3} overall={:.3}",
            result.stats.successful_sucks,
            result.stats.suck_attempts,
            result.stats.movement_actions,
            result.stats.idle_actions,
            result.efficiency.cleaning,
            result.efficiency.movement,
            result.efficiency.action,
            result.efficiency.overall
        );
    }
    Ok(true)
}

fn replay(file: &Path, json: bool) -> Result<bool> {
    let recording = Recording::load(file)?;
    let report = Replayer::verify(&recording)?;

    if json {
        print_json(&report)?;
    } else if let Some(divergence) = &report.divergence {
        error!(
            "✗ {} diverged at step {}: {:?}",
            file.display(),
            divergence.step,
            divergence.kind
        );
    } else {
        info!(
            "✓ {} replayed {} steps exactly (performance={})",
            file.display(),
            report.steps_replayed,
            report.final_performance
        );
    }
    Ok(report.is_exact())
}

fn compare(file: &Path, kind: AgentKind, agent_seed: Option<u64>, json: bool) -> Result<bool> {
    let recording = Recording::load(file)?;
    let seed = agent_seed.or(recording.metadata.seed).unwrap_or_default();
    let mut agent = kind.build(seed);
    let report = Replayer::compare(&recording, agent.as_mut())?;

    if json {
        print_json(&report)?;
    } else {
        info!(
            "{} vs recording: performance {} vs {}, steps {} vs {}",
            report.agent,
            report.live_performance,
            report.recorded_performance,
            report.live_steps,
            report.recorded_steps
        );
        match &report.divergence {
            Some(d) => warn!("First divergence at step {}: {:?}", d.step, d.kind),
            None => info!("No divergence"),
        }
    }
    // Divergence is a finding, not a failure
    Ok(true)
}

fn bench(config: &BenchConfig, output: Option<&Path>) -> Result<bool> {
    let rows = run_bench(config)?;
    match output {
        Some(path) => {
            write_csv(&rows, std::fs::File::create(path)?)?;
            info!("{} runs written to {}", rows.len(), path.display());
        }
        None => write_csv(&rows, std::io::stdout().lock())?,
    }
    Ok(true)
}

fn scenarios(scenario: &str, seed: u64, seeds: usize, json: bool) -> Result<bool> {
    let selected: Vec<ScenarioId> = if scenario == "all" {
        ScenarioId::all()
    } else {
        vec![scenario.parse::<ScenarioId>().map_err(|e| anyhow!(e))?]
    };

    let base_seed = if seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_nanos() as u64
    } else {
        seed
    };

    if !json {
        info!("Vacuum World Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed);

        for scenario in &selected {
            let result = runner.run(*scenario);
            if !json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            all_results.push(result);
        }
    }

    let total = all_results.len();
    let failed = all_results.iter().filter(|r| !r.passed).count();

    if json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "steps": r.total_steps,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        print_json(&summary)?;
    } else if failed == 0 {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("✅ All {} scenario runs passed!", total);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        error!("❌ {}/{} scenario runs failed!", failed, total);
    }
    Ok(failed == 0)
}

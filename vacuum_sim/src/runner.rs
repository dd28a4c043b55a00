//! Scenario runner - executes the deterministic scenario catalogue.

use crate::agents::AgentKind;
use crate::context::SimContext;
use crate::scenarios::ScenarioId;
use crate::session::SessionRunner;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};
use vacuum_core::grid::MAX_ACTIONS;
use vacuum_core::{
    apply, Action, CompletionReason, CoreError, CreateParams, DirtGrid, EnvironmentRegistry,
    GridSnapshot, GridWorld, GridWorldParams, Position, Recording, RegistryConfig, Replayer,
    StepEvent, StepObserver,
};
use vacuum_env::EnvironmentId;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total accepted actions across every environment in the scenario
    pub total_steps: u64,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(format!($($arg)+));
        }
    };
}

fn core(e: CoreError) -> String {
    e.to_string()
}

/// Records each step's before/after pair in application order.
struct ChainLog(Arc<Mutex<Vec<(GridSnapshot, GridSnapshot)>>>);

impl StepObserver for ChainLog {
    fn on_step(&mut self, event: &StepEvent<'_>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((event.outcome.before.clone(), event.outcome.after.clone()));
    }
}

/// Runs catalogue scenarios under one master seed.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Worker threads for the ordering scenario
    workers: usize,

    /// Actions each worker submits
    actions_per_worker: usize,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            workers: 8,
            actions_per_worker: 50,
        }
    }

    /// Sets the contention level of the ordering scenario.
    pub fn with_workers(mut self, workers: usize, actions_per_worker: usize) -> Self {
        self.workers = workers;
        self.actions_per_worker = actions_per_worker;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let outcome = match scenario {
            ScenarioId::SingleSuck => self.run_single_suck(),
            ScenarioId::BudgetExhaustion => self.run_budget_exhaustion(),
            ScenarioId::WallBump => self.run_wall_bump(),
            ScenarioId::OrderedActions => self.run_ordered_actions(),
            ScenarioId::ReplayExact => self.run_replay_exact(),
            ScenarioId::IdleEviction => self.run_idle_eviction(),
            ScenarioId::RestrictedView => self.run_restricted_view(),
            ScenarioId::AgentSweep => self.run_agent_sweep(),
        };

        match outcome {
            Ok(total_steps) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: true,
                total_steps,
                failure_reason: None,
            },
            Err(reason) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: false,
                total_steps: 0,
                failure_reason: Some(reason),
            },
        }
    }

    fn registry(&self, config: RegistryConfig) -> (Arc<SimContext>, Arc<EnvironmentRegistry<SimContext>>) {
        let ctx = SimContext::shared(self.seed);
        let registry = Arc::new(EnvironmentRegistry::new(Arc::clone(&ctx), config));
        (ctx, registry)
    }

    /// 2x2 layout with a single dirty cell at (0,0).
    fn corner_layout(&self, agent: Position, max_actions: u32) -> Result<GridWorld, String> {
        let mut dirt = DirtGrid::clean(2, 2).map_err(core)?;
        dirt.set(Position::new(0, 0), true);
        GridWorld::from_layout(EnvironmentId::from_seed(self.seed), dirt, agent, max_actions, false)
            .map_err(core)
    }

    fn run_single_suck(&self) -> Result<u64, String> {
        let mut world = self.corner_layout(Position::new(0, 0), MAX_ACTIONS)?;
        let out = apply(&mut world, Action::Suck).map_err(core)?;

        ensure!(out.reward == 1, "suck on dirt rewarded {}", out.reward);
        ensure!(world.performance() == 1, "performance {}", world.performance());
        ensure!(world.is_finished(), "world not finished with no dirt left");
        ensure!(
            world.actions_taken() == 1 && world.actions_taken() < world.max_actions(),
            "actions_taken {}",
            world.actions_taken()
        );
        ensure!(
            world.completion_reason() == Some(CompletionReason::AllCleaned),
            "completion {:?}",
            world.completion_reason()
        );

        let frozen = world.snapshot();
        let refused = apply(&mut world, Action::Suck);
        ensure!(
            matches!(refused, Err(CoreError::EnvironmentFinished(_))),
            "action after finish returned {:?}",
            refused.map(|o| o.reward)
        );
        ensure!(world.snapshot() == frozen, "refused action changed state");
        Ok(1)
    }

    fn run_budget_exhaustion(&self) -> Result<u64, String> {
        let mut world = self.corner_layout(Position::new(1, 1), 3)?;

        for i in 1..=3u32 {
            let out = apply(&mut world, Action::Idle).map_err(core)?;
            ensure!(out.reward == 0, "idle rewarded {}", out.reward);
            ensure!(
                out.after.finished == (i == 3),
                "finished={} after {} idles",
                out.after.finished,
                i
            );
        }
        ensure!(world.performance() == 0, "performance {}", world.performance());
        ensure!(
            world.completion_reason() == Some(CompletionReason::MaxActionsReached),
            "completion {:?}",
            world.completion_reason()
        );
        ensure!(world.dirty_cells() == 1, "dirt changed without suck");
        Ok(3)
    }

    fn run_wall_bump(&self) -> Result<u64, String> {
        let mut dirt = DirtGrid::clean(3, 3).map_err(core)?;
        dirt.set(Position::new(2, 2), true);
        let mut world = GridWorld::from_layout(
            EnvironmentId::from_seed(self.seed),
            dirt,
            Position::new(0, 0),
            10,
            false,
        )
        .map_err(core)?;

        for action in [Action::Up, Action::Left] {
            let out = apply(&mut world, action).map_err(core)?;
            ensure!(
                out.after.agent_position == Position::new(0, 0),
                "{} off the grid moved the agent to {:?}",
                action,
                out.after.agent_position
            );
        }
        ensure!(world.actions_taken() == 2, "blocked moves not charged");

        let clean_suck = apply(&mut world, Action::Suck).map_err(core)?;
        ensure!(
            clean_suck.reward == 0 && clean_suck.before.dirt_grid == clean_suck.after.dirt_grid,
            "suck on a clean cell changed the grid"
        );

        let out = apply(&mut world, Action::Right).map_err(core)?;
        ensure!(
            out.after.agent_position == Position::new(1, 0),
            "right moved to {:?}",
            out.after.agent_position
        );
        Ok(u64::from(world.actions_taken()))
    }

    fn run_ordered_actions(&self) -> Result<u64, String> {
        let (_, registry) = self.registry(RegistryConfig::default());
        let total = self.workers * self.actions_per_worker;
        ensure!(total <= MAX_ACTIONS as usize, "{} actions exceed the budget", total);

        let params = GridWorldParams::new(16, 16, 1.0)
            .with_seed(self.seed)
            .with_position(Position::new(0, 0));
        let id = registry.create(params).map_err(core)?;
        let handle = registry.get(&id).map_err(core)?;

        let log = Arc::new(Mutex::new(Vec::with_capacity(total)));
        handle
            .add_observer(Box::new(ChainLog(Arc::clone(&log))))
            .map_err(core)?;

        std::thread::scope(|scope| -> Result<(), String> {
            let workers: Vec<_> = (0..self.workers)
                .map(|w| {
                    let handle = handle.clone();
                    let seed = self.seed.wrapping_add(w as u64);
                    let count = self.actions_per_worker;
                    scope.spawn(move || -> Result<(), CoreError> {
                        let mut rng = ChaCha8Rng::seed_from_u64(seed);
                        for _ in 0..count {
                            let action = Action::MOVES[rng.gen_range(0..Action::MOVES.len())];
                            handle.step(action)?;
                        }
                        Ok(())
                    })
                })
                .collect();

            for worker in workers {
                match worker.join() {
                    Ok(result) => result.map_err(core)?,
                    Err(_) => return Err("worker thread panicked".to_string()),
                }
            }
            Ok(())
        })?;

        let log = log.lock().unwrap_or_else(PoisonError::into_inner);
        ensure!(log.len() == total, "observed {} of {} steps", log.len(), total);
        for (i, (before, after)) in log.iter().enumerate() {
            ensure!(
                after.actions_taken as usize == i + 1,
                "step {} reported actions_taken={}",
                i + 1,
                after.actions_taken
            );
            if i > 0 {
                ensure!(
                    *before == log[i - 1].1,
                    "step {} did not start from step {}'s result",
                    i + 1,
                    i
                );
            }
        }
        debug!("{} interleaved steps chained correctly", total);
        Ok(total as u64)
    }

    fn run_replay_exact(&self) -> Result<u64, String> {
        let (_, registry) = self.registry(RegistryConfig::default());
        let runner = SessionRunner::new(registry).with_recording(true);
        let dir = std::env::temp_dir().join(format!("vacuum-sim-replay-{}", self.seed));
        std::fs::create_dir_all(&dir).map_err(|e| e.to_string())?;

        let mut total = 0u64;
        for kind in AgentKind::all() {
            let params = GridWorldParams::new(7, 5, 0.35).with_max_actions(120);
            let mut agent = kind.build(self.seed);
            let result = runner.run(params, agent.as_mut()).map_err(|e| e.to_string())?;
            let recording = result
                .recording
                .ok_or_else(|| format!("{kind}: session produced no recording"))?;

            let path = dir.join(format!("{kind}.json"));
            recording.save(&path).map_err(|e| e.to_string())?;
            let loaded = Recording::load(&path).map_err(|e| e.to_string())?;
            ensure!(loaded == recording, "{kind}: recording changed on save/load");

            let report = Replayer::verify(&loaded).map_err(|e| e.to_string())?;
            ensure!(
                report.is_exact(),
                "{kind}: replay diverged at {:?}",
                report.divergence
            );
            ensure!(
                report.final_performance == result.performance,
                "{kind}: replayed performance {} != {}",
                report.final_performance,
                result.performance
            );

            let mut twin = kind.build(self.seed);
            let comparison = Replayer::compare(&loaded, twin.as_mut()).map_err(|e| e.to_string())?;
            ensure!(
                !comparison.diverged(),
                "{kind}: same agent and seed diverged at {:?}",
                comparison.divergence
            );
            total += u64::from(result.steps);
        }

        // Best effort; the directory is scratch space
        let _ = std::fs::remove_dir_all(&dir);
        Ok(total)
    }

    fn run_idle_eviction(&self) -> Result<u64, String> {
        let config = RegistryConfig::default();
        let max_age = config.max_age;
        let (ctx, registry) = self.registry(config);

        let ids = (0..4)
            .map(|_| registry.create(GridWorldParams::new(4, 4, 0.5)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(core)?;

        ctx.advance_time(max_age / 2);
        for id in &ids[..2] {
            registry.sense(id).map_err(core)?;
        }
        ctx.advance_time(max_age / 2 + Duration::from_secs(1));

        let evicted = registry.cleanup(max_age);
        ensure!(evicted == 2, "evicted {} environments, expected 2", evicted);
        for id in &ids[..2] {
            ensure!(registry.get(id).is_ok(), "touched environment {} was evicted", id);
        }
        for id in &ids[2..] {
            ensure!(
                matches!(registry.sense(id), Err(CoreError::NotFound(_))),
                "idle environment {} survived cleanup",
                id
            );
        }
        ensure!(registry.cleanup(max_age) == 0, "second cleanup evicted again");
        Ok(2)
    }

    fn run_restricted_view(&self) -> Result<u64, String> {
        let (_, registry) = self.registry(RegistryConfig::default());
        let params = GridWorldParams::new(5, 5, 0.5).restricted(true);
        let id = registry.create(CreateParams::from(params)).map_err(core)?;

        ensure!(
            matches!(registry.state(&id), Err(CoreError::Restricted(_))),
            "global view leaked from a restricted environment"
        );
        let before = registry.sense(&id).map_err(core)?;
        let out = registry.step(&id, Action::Idle).map_err(core)?;
        ensure!(
            out.before.agent_position == before.position,
            "sense and step disagree on position"
        );
        ensure!(
            registry.list().iter().any(|s| s.id == id),
            "restricted environment missing from listing"
        );
        Ok(1)
    }

    fn run_agent_sweep(&self) -> Result<u64, String> {
        let (_, registry) = self.registry(RegistryConfig::default());
        let runner = SessionRunner::new(registry);
        let budget = 150;
        let mut total = 0u64;

        for offset in 0..4u64 {
            let seed = self.seed.wrapping_add(offset);
            let initial = DirtGrid::sample(6, 6, 0.3, seed).map_err(core)?.dirty_count();

            for kind in AgentKind::all() {
                let params = GridWorldParams::new(6, 6, 0.3)
                    .with_seed(seed)
                    .with_max_actions(budget);
                let mut agent = kind.build(seed);
                let r = runner.run(params, agent.as_mut()).map_err(|e| e.to_string())?;

                ensure!(r.steps <= budget, "{kind}/{seed}: {} steps over budget", r.steps);
                ensure!(
                    r.performance as usize + r.dirty_remaining == initial,
                    "{kind}/{seed}: performance {} + remaining {} != initial {}",
                    r.performance,
                    r.dirty_remaining,
                    initial
                );
                match r.completion_reason {
                    Some(CompletionReason::AllCleaned) => {
                        ensure!(r.dirty_remaining == 0, "{kind}/{seed}: cleaned with dirt left")
                    }
                    Some(CompletionReason::MaxActionsReached) => {
                        ensure!(r.steps == budget, "{kind}/{seed}: budget reason at {}", r.steps)
                    }
                    None => return Err(format!("{kind}/{seed}: session ended unfinished")),
                }
                debug!("  {} seed={} performance={} steps={}", kind, seed, r.performance, r.steps);
                total += u64::from(r.steps);
            }
        }
        Ok(total)
    }
}

//! Session runner - one agent driving one environment to completion.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use vacuum_core::{
    Action, Agent, CompletionReason, CoreError, CreateParams, EnvironmentRegistry,
    GridWorldParams, Recording,
};
use vacuum_env::{EnvironmentId, VacuumContext};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Environment rejected the session: {0}")]
    Core(#[from] CoreError),

    #[error("Agent {agent} exceeded {limit} decisions without the environment finishing")]
    Runaway { agent: String, limit: u32 },
}

/// Per-action tallies used to rank agents against each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub suck_attempts: u32,
    /// Sucks that actually removed dirt
    pub successful_sucks: u32,
    pub movement_actions: u32,
    pub idle_actions: u32,
    /// Dirty cells at creation
    pub total_dirt_available: usize,
}

impl SessionStats {
    fn record(&mut self, action: Action, reward: u32) {
        match action {
            Action::Suck => {
                self.suck_attempts += 1;
                if reward > 0 {
                    self.successful_sucks += 1;
                }
            }
            Action::Up | Action::Down | Action::Left | Action::Right => self.movement_actions += 1,
            Action::Idle => self.idle_actions += 1,
        }
    }

    pub fn total_actions(&self) -> u32 {
        self.suck_attempts + self.movement_actions + self.idle_actions
    }

    /// Dirt removed per action taken.
    pub fn cleaning_efficiency(&self) -> f64 {
        ratio(self.successful_sucks, self.total_actions())
    }

    /// Dirt removed per move.
    pub fn movement_efficiency(&self) -> f64 {
        ratio(self.successful_sucks, self.movement_actions)
    }

    /// Fraction of sucks that hit dirt.
    pub fn action_efficiency(&self) -> f64 {
        ratio(self.successful_sucks, self.suck_attempts)
    }

    /// Cleaning efficiency weighted by the share of available dirt removed.
    pub fn overall_efficiency(&self) -> f64 {
        if self.total_actions() == 0 {
            return 0.0;
        }
        let coverage = f64::from(self.successful_sucks) / self.total_dirt_available.max(1) as f64;
        self.cleaning_efficiency() * coverage
    }

    pub fn efficiency(&self) -> Efficiency {
        Efficiency {
            cleaning: self.cleaning_efficiency(),
            movement: self.movement_efficiency(),
            action: self.action_efficiency(),
            overall: self.overall_efficiency(),
        }
    }
}

fn ratio(num: u32, den: u32) -> f64 {
    if den == 0 {
        0.0
    } else {
        f64::from(num) / f64::from(den)
    }
}

/// Derived efficiency ratios. Movement efficiency can exceed 1 when
/// several dirty cells are cleaned per move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Efficiency {
    pub cleaning: f64,
    pub movement: f64,
    pub action: f64,
    pub overall: f64,
}

/// Results from one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub environment_id: EnvironmentId,
    pub agent: String,
    /// Layout seed actually used
    pub seed: u64,
    pub steps: u32,
    pub performance: u32,
    /// Dirty cells left when the environment finished
    pub dirty_remaining: usize,
    pub completion_reason: Option<CompletionReason>,
    pub stats: SessionStats,
    pub efficiency: Efficiency,
    #[serde(skip)]
    pub recording: Option<Recording>,
}

/// Drives agents through a registry using only the local perception.
pub struct SessionRunner<C: VacuumContext> {
    registry: Arc<EnvironmentRegistry<C>>,
    record: bool,
    keep_environment: bool,
}

impl<C: VacuumContext> SessionRunner<C> {
    pub fn new(registry: Arc<EnvironmentRegistry<C>>) -> Self {
        Self {
            registry,
            record: false,
            keep_environment: false,
        }
    }

    /// Attaches a recorder to every environment this runner creates.
    pub fn with_recording(mut self, record: bool) -> Self {
        self.record = record;
        self
    }

    /// Leaves finished environments registered instead of deleting them.
    pub fn keep_environments(mut self, keep: bool) -> Self {
        self.keep_environment = keep;
        self
    }

    pub fn registry(&self) -> &Arc<EnvironmentRegistry<C>> {
        &self.registry
    }

    /// Creates an environment from `params` and runs `agent` until it
    /// finishes.
    pub fn run(
        &self,
        mut params: GridWorldParams,
        agent: &mut dyn Agent,
    ) -> Result<SessionResult, SessionError> {
        let seed = *params
            .seed
            .get_or_insert_with(|| self.registry.context().next_seed());
        // Every accepted action consumes budget, so this bound is never hit
        // by a well-behaved environment
        let limit = params.max_actions;

        let id = self.registry.create(CreateParams {
            world: params,
            record: self.record,
        })?;
        let handle = self.registry.get(&id)?;
        info!("Session {} started with {}", id.short(), agent.name());

        let mut stats = SessionStats {
            total_dirt_available: handle.snapshot()?.dirt_grid.dirty_count(),
            ..SessionStats::default()
        };
        let mut steps = 0u32;
        loop {
            let perception = handle.sense()?;
            if perception.finished {
                break;
            }
            if steps >= limit {
                return Err(SessionError::Runaway {
                    agent: agent.name().to_string(),
                    limit,
                });
            }
            let action = agent.decide(&perception);
            let outcome = handle.step(action)?;
            steps += 1;
            stats.record(outcome.action, outcome.reward);
            debug!(
                "  step {} {} -> {:?} reward={}",
                steps, action, outcome.after.agent_position, outcome.reward
            );
        }

        let snapshot = handle.snapshot()?;
        let recording = if self.record {
            Some(self.registry.take_recording(&id)?.with_agent_type(agent.name()))
        } else {
            None
        };
        if !self.keep_environment {
            self.registry.delete(&id)?;
        }

        info!(
            "Session {} finished: performance={} steps={} reason={:?}",
            id.short(),
            snapshot.performance,
            steps,
            snapshot.completion_reason
        );

        Ok(SessionResult {
            environment_id: id,
            agent: agent.name().to_string(),
            seed,
            steps,
            performance: snapshot.performance,
            dirty_remaining: snapshot.dirt_grid.dirty_count(),
            completion_reason: snapshot.completion_reason,
            stats,
            efficiency: stats.efficiency(),
            recording,
        })
    }
}

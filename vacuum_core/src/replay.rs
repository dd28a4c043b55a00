//! Replayer - deterministic re-execution of recordings.
//!
//! Replay never re-rolls randomness: it rebuilds the world from the captured
//! initial layout and pushes the recorded actions through the same engine,
//! so every snapshot, reward and `finished` flag must come out identical.

use crate::agent::Agent;
use crate::engine::{apply, Action};
use crate::error::CoreError;
use crate::grid::GridWorld;
use crate::perception::sense;
use crate::recording::{Recording, RecordingError, StepRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error("Recorded initial state is invalid: {0}")]
    InitialState(CoreError),

    #[error("Step {step} was rejected during replay: {source}")]
    Rejected { step: u32, source: CoreError },
}

/// How a live or replayed step differs from the recorded one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DivergenceKind {
    Action { recorded: Action, live: Action },
    Reward { recorded: u32, live: u32 },
    BeforeState,
    AfterState,
    Perception,
    /// The recording continues past the point where the live run finished
    RecordingLonger,
    /// The live run continued past the end of the recording
    LiveLonger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    /// 1-based step number of the first mismatch
    pub step: u32,
    #[serde(flatten)]
    pub kind: DivergenceKind,
}

/// Outcome of [`Replayer::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub steps_replayed: u32,
    pub final_performance: u32,
    pub divergence: Option<Divergence>,
}

impl ReplayReport {
    pub fn is_exact(&self) -> bool {
        self.divergence.is_none()
    }
}

/// Outcome of [`Replayer::compare`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub agent: String,
    pub recorded_steps: u32,
    pub live_steps: u32,
    pub recorded_performance: u32,
    pub live_performance: u32,
    pub divergence: Option<Divergence>,
}

impl ComparisonReport {
    pub fn diverged(&self) -> bool {
        self.divergence.is_some()
    }
}

/// First field in which `live` differs from `recorded`.
fn first_difference(recorded: &StepRecord, live: &StepRecord) -> Option<DivergenceKind> {
    if recorded.action != live.action {
        return Some(DivergenceKind::Action {
            recorded: recorded.action,
            live: live.action,
        });
    }
    if recorded.before_state != live.before_state {
        return Some(DivergenceKind::BeforeState);
    }
    if recorded.reward != live.reward {
        return Some(DivergenceKind::Reward {
            recorded: recorded.reward,
            live: live.reward,
        });
    }
    if recorded.after_state != live.after_state {
        return Some(DivergenceKind::AfterState);
    }
    if recorded.perception != live.perception {
        return Some(DivergenceKind::Perception);
    }
    None
}

fn step_world(world: &mut GridWorld, step: u32, action: Action) -> Result<StepRecord, CoreError> {
    let outcome = apply(world, action)?;
    Ok(StepRecord::from_outcome(step, &outcome, &sense(world)))
}

pub struct Replayer;

impl Replayer {
    /// Re-applies the recorded action sequence and returns the regenerated
    /// step records.
    pub fn replay(recording: &Recording) -> Result<Vec<StepRecord>, ReplayError> {
        recording.validate()?;
        let mut world = recording.initial_world().map_err(ReplayError::InitialState)?;

        let mut steps = Vec::with_capacity(recording.steps.len());
        for (i, action) in recording.actions().into_iter().enumerate() {
            let step = i as u32 + 1;
            let record = step_world(&mut world, step, action)
                .map_err(|source| ReplayError::Rejected { step, source })?;
            steps.push(record);
        }
        Ok(steps)
    }

    /// Replays and checks the result against the recorded steps.
    pub fn verify(recording: &Recording) -> Result<ReplayReport, ReplayError> {
        let replayed = Self::replay(recording)?;
        let divergence = recording
            .steps
            .iter()
            .zip(&replayed)
            .find_map(|(rec, live)| {
                first_difference(rec, live).map(|kind| Divergence {
                    step: rec.step,
                    kind,
                })
            });

        Ok(ReplayReport {
            steps_replayed: replayed.len() as u32,
            final_performance: replayed.last().map_or(0, |s| s.after_state.performance),
            divergence,
        })
    }

    /// Runs `agent` live over the recording's initial layout and reports the
    /// first step where it departs from the recording.
    ///
    /// The live run continues to completion after a divergence so the final
    /// scores can be compared.
    pub fn compare(
        recording: &Recording,
        agent: &mut dyn Agent,
    ) -> Result<ComparisonReport, ReplayError> {
        recording.validate()?;
        let mut world = recording.initial_world().map_err(ReplayError::InitialState)?;
        let mut divergence: Option<Divergence> = None;
        let mut live_steps = 0u32;

        while !world.is_finished() {
            let step = live_steps + 1;
            let action = agent.decide(&sense(&world));
            let live = step_world(&mut world, step, action)
                .map_err(|source| ReplayError::Rejected { step, source })?;
            live_steps = step;

            if divergence.is_some() {
                continue;
            }
            let kind = match recording.steps.get(step as usize - 1) {
                Some(recorded) => first_difference(recorded, &live),
                None => Some(DivergenceKind::LiveLonger),
            };
            if let Some(kind) = kind {
                debug!("Divergence at step {}: {:?}", step, kind);
                divergence = Some(Divergence { step, kind });
            }
        }

        if divergence.is_none() && recording.steps.len() > live_steps as usize {
            divergence = Some(Divergence {
                step: live_steps + 1,
                kind: DivergenceKind::RecordingLonger,
            });
        }

        Ok(ComparisonReport {
            agent: agent.name().to_string(),
            recorded_steps: recording.steps.len() as u32,
            live_steps,
            recorded_performance: recording
                .steps
                .last()
                .map_or(0, |s| s.after_state.performance),
            live_performance: world.performance(),
            divergence,
        })
    }
}

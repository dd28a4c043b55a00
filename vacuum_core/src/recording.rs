//! Recording - a replayable transcript of one environment's lifetime.
//!
//! Layout on disk (JSON):
//!
//! ```text
//! {
//!   "metadata":      { environment_id, width, height, dirt_rate, seed, ... },
//!   "initial_state": { dirt_grid, agent_position },
//!   "steps":         [ { step, action, before_state, after_state, reward, perception }, ... ]
//! }
//! ```
//!
//! Steps are numbered from 1 in application order.

use crate::engine::{Action, StepOutcome};
use crate::error::CoreError;
use crate::grid::{CompletionReason, DirtGrid, GridSnapshot, GridWorld, Position};
use crate::observer::{StepEvent, StepObserver};
use crate::perception::Perception;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use thiserror::Error;
use vacuum_env::EnvironmentId;

/// Errors while persisting or loading recordings.
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("Recording I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recording JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed recording: {0}")]
    Malformed(String),
}

/// Creation parameters and final results of the recorded run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub environment_id: EnvironmentId,
    pub width: u16,
    pub height: u16,
    pub dirt_rate: f64,
    pub seed: Option<u64>,
    pub max_actions: u32,
    pub restricted: bool,
    /// Creation time, milliseconds since the Unix epoch
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_performance: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_actions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_reason: Option<CompletionReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialState {
    pub dirt_grid: DirtGrid,
    pub agent_position: Position,
}

/// One applied action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: u32,
    pub action: Action,
    pub before_state: GridSnapshot,
    pub after_state: GridSnapshot,
    pub reward: u32,
    pub perception: Perception,
}

impl StepRecord {
    pub fn from_outcome(step: u32, outcome: &StepOutcome, perception: &Perception) -> Self {
        Self {
            step,
            action: outcome.action,
            before_state: outcome.before.clone(),
            after_state: outcome.after.clone(),
            reward: outcome.reward,
            perception: perception.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub metadata: RecordingMetadata,
    pub initial_state: InitialState,
    pub steps: Vec<StepRecord>,
}

impl Recording {
    /// Starts an empty transcript from the world's current state.
    pub fn new(world: &GridWorld, created_at_ms: u64) -> Self {
        Self {
            metadata: RecordingMetadata {
                environment_id: world.id(),
                width: world.width(),
                height: world.height(),
                dirt_rate: world.dirt_rate(),
                seed: world.seed(),
                max_actions: world.max_actions(),
                restricted: world.is_restricted(),
                created_at_ms,
                agent_type: None,
                final_performance: None,
                total_actions: None,
                completion_reason: world.completion_reason(),
            },
            initial_state: InitialState {
                dirt_grid: world.dirt().clone(),
                agent_position: world.agent_position(),
            },
            steps: Vec::new(),
        }
    }

    /// Fills the summary fields from the last recorded step. Without steps
    /// the reason the world had when recording began is kept.
    pub fn finalize(&mut self) {
        let last = self.steps.last().map(|s| &s.after_state);
        self.metadata.final_performance = Some(last.map_or(0, |s| s.performance));
        self.metadata.total_actions = Some(self.steps.len() as u32);
        self.metadata.completion_reason = last
            .and_then(|s| s.completion_reason)
            .or(self.metadata.completion_reason);
    }

    pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.metadata.agent_type = Some(agent_type.into());
        self
    }

    /// Recorded action sequence.
    pub fn actions(&self) -> Vec<Action> {
        self.steps.iter().map(|s| s.action).collect()
    }

    /// A fresh world with the captured initial layout and position.
    pub fn initial_world(&self) -> Result<GridWorld, CoreError> {
        GridWorld::from_layout(
            self.metadata.environment_id,
            self.initial_state.dirt_grid.clone(),
            self.initial_state.agent_position,
            self.metadata.max_actions,
            self.metadata.restricted,
        )
    }

    /// Structural checks for recordings read from outside.
    pub fn validate(&self) -> Result<(), RecordingError> {
        let grid = &self.initial_state.dirt_grid;
        if grid.width() != self.metadata.width || grid.height() != self.metadata.height {
            return Err(RecordingError::Malformed(format!(
                "initial grid is {}x{}, metadata says {}x{}",
                grid.width(),
                grid.height(),
                self.metadata.width,
                self.metadata.height
            )));
        }
        if self.steps.len() > self.metadata.max_actions as usize {
            return Err(RecordingError::Malformed(format!(
                "{} steps exceed action budget {}",
                self.steps.len(),
                self.metadata.max_actions
            )));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.step as usize != i + 1 {
                return Err(RecordingError::Malformed(format!(
                    "step #{} is numbered {}",
                    i + 1,
                    step.step
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, RecordingError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, RecordingError> {
        let recording: Recording = serde_json::from_str(json)?;
        recording.validate()?;
        Ok(recording)
    }

    /// Writes to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RecordingError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RecordingError> {
        let reader = BufReader::new(File::open(path)?);
        let recording: Recording = serde_json::from_reader(reader)?;
        recording.validate()?;
        Ok(recording)
    }
}

/// Appends a [`StepRecord`] for every step it observes.
#[derive(Debug, Clone)]
pub struct Recorder {
    recording: Recording,
}

impl Recorder {
    pub fn new(world: &GridWorld, created_at_ms: u64) -> Self {
        Self {
            recording: Recording::new(world, created_at_ms),
        }
    }

    pub fn record(&mut self, outcome: &StepOutcome, perception: &Perception) {
        let step = self.recording.steps.len() as u32 + 1;
        self.recording
            .steps
            .push(StepRecord::from_outcome(step, outcome, perception));
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.recording.steps
    }

    /// Closes the transcript.
    pub fn finish(mut self) -> Recording {
        self.recording.finalize();
        self.recording
    }
}

impl StepObserver for Recorder {
    fn on_step(&mut self, event: &StepEvent<'_>) {
        self.record(event.outcome, event.perception);
    }
}

//! Environment Registry - many grid worlds multiplexed under opaque ids.
//!
//! # Locking
//!
//! ```text
//! entries: RwLock<HashMap<EnvironmentId, Arc<Entry>>>   (structure only)
//!              │
//!              └── Entry.state: Mutex<EntryState>         (one world)
//! ```
//!
//! The map lock is never held while waiting on an entry lock: lookups clone
//! the `Arc<Entry>` and release the map before locking the entry. Only
//! eviction nests the other way (entry, then map), which lets it wait for an
//! in-flight action to finish before removing the entry. Distinct worlds are
//! stepped fully in parallel; actions on one world are serialized by its
//! mutex in lock-acquisition order.

use crate::engine::{apply, Action, StepOutcome};
use crate::error::CoreError;
use crate::grid::{GridSnapshot, GridWorld, GridWorldParams, Position, MAX_ACTIONS};
use crate::observer::{StepEvent, StepObserver};
use crate::perception::{observe, sense, GlobalView, Perception};
use crate::recording::{Recorder, Recording, RecordingError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use vacuum_env::{unix_millis, unix_secs, EnvironmentId, SystemContext, VacuumContext};

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Idle age after which the sweeper evicts an environment (default: 1h)
    pub max_age: Duration,

    /// Pause between sweeper runs (default: 5 min)
    pub sweep_interval: Duration,

    /// Budget for environments whose request does not name one; read it
    /// through [`RegistryConfig::default_budget`]
    pub max_actions: u32,

    /// Where recordings of deleted/evicted environments are written
    pub recordings_dir: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            max_actions: MAX_ACTIONS,
            recordings_dir: None,
        }
    }
}

impl RegistryConfig {
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the default budget, clamped to `1..=MAX_ACTIONS`.
    pub fn with_max_actions(mut self, max_actions: u32) -> Self {
        self.max_actions = max_actions.clamp(1, MAX_ACTIONS);
        self
    }

    /// Default budget, always one a world accepts.
    pub fn default_budget(&self) -> u32 {
        self.max_actions.clamp(1, MAX_ACTIONS)
    }

    pub fn with_recordings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recordings_dir = Some(dir.into());
        self
    }
}

/// Parameters for [`EnvironmentRegistry::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateParams {
    pub world: GridWorldParams,
    /// Attach a recorder for the lifetime of the environment
    pub record: bool,
}

impl From<GridWorldParams> for CreateParams {
    fn from(world: GridWorldParams) -> Self {
        Self {
            world,
            record: false,
        }
    }
}

impl CreateParams {
    pub fn recorded(world: GridWorldParams) -> Self {
        Self { world, record: true }
    }
}

/// Listing row for one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSummary {
    pub id: EnvironmentId,
    /// Seconds since the Unix epoch
    pub created_at: f64,
    /// Seconds since the Unix epoch
    pub last_access: f64,
    /// `[width, height]`
    pub size: [u16; 2],
    pub agent_position: Position,
    pub performance: u32,
    pub actions_taken: u32,
    pub finished: bool,
}

/// Liveness summary of the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryHealth {
    pub active_environments: usize,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

struct EntryState {
    world: GridWorld,
    last_access: SystemTime,
    observers: Vec<Box<dyn StepObserver>>,
    recorder: Option<Recorder>,
    /// Set once the entry has left the map; handles then answer `NotFound`
    retired: bool,
}

struct Entry {
    id: EnvironmentId,
    created_at: SystemTime,
    state: Mutex<EntryState>,
}

impl Entry {
    fn lock(&self) -> MutexGuard<'_, EntryState> {
        // A panic in one observer must not wedge the environment forever
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Access to one registered environment.
///
/// Every operation takes the environment lock for its whole duration.
pub struct EnvironmentHandle<C: VacuumContext = SystemContext> {
    entry: Arc<Entry>,
    ctx: Arc<C>,
}

impl<C: VacuumContext> Clone for EnvironmentHandle<C> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<C: VacuumContext> EnvironmentHandle<C> {
    pub fn id(&self) -> EnvironmentId {
        self.entry.id
    }

    /// Locks the entry, refuses retired entries and refreshes `last_access`.
    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut EntryState) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut state = self.entry.lock();
        if state.retired {
            return Err(CoreError::NotFound(self.entry.id));
        }
        state.last_access = self.ctx.system_time();
        f(&mut state)
    }

    /// Applies one action and notifies the recorder and observers.
    pub fn step(&self, action: Action) -> Result<StepOutcome, CoreError> {
        self.with_state(|state| {
            let outcome = apply(&mut state.world, action).map_err(|e| {
                debug!("Refused {} on {}: {}", action, self.entry.id.short(), e);
                e
            })?;

            let perception = sense(&state.world);
            let event = StepEvent {
                environment_id: self.entry.id,
                outcome: &outcome,
                perception: &perception,
            };
            if let Some(recorder) = state.recorder.as_mut() {
                recorder.on_step(&event);
            }
            for observer in state.observers.iter_mut() {
                observer.on_step(&event);
            }
            Ok(outcome)
        })
    }

    pub fn sense(&self) -> Result<Perception, CoreError> {
        self.with_state(|state| Ok(sense(&state.world)))
    }

    /// Global view; `Restricted` on restricted environments.
    pub fn state(&self) -> Result<GlobalView, CoreError> {
        self.with_state(|state| observe(&state.world))
    }

    /// Unfiltered snapshot, for in-process callers (not the network boundary).
    pub fn snapshot(&self) -> Result<GridSnapshot, CoreError> {
        self.with_state(|state| Ok(state.world.snapshot()))
    }

    /// Consistent copy of the whole world.
    pub fn world(&self) -> Result<GridWorld, CoreError> {
        self.with_state(|state| Ok(state.world.clone()))
    }

    pub fn add_observer(&self, observer: Box<dyn StepObserver>) -> Result<(), CoreError> {
        self.with_state(|state| {
            state.observers.push(observer);
            Ok(())
        })
    }

    pub fn is_recording(&self) -> Result<bool, CoreError> {
        self.with_state(|state| Ok(state.recorder.is_some()))
    }
}

/// The registry of live environments.
///
/// Created once at server start and passed by `Arc` to whatever serves
/// requests.
pub struct EnvironmentRegistry<C: VacuumContext = SystemContext> {
    ctx: Arc<C>,
    config: RegistryConfig,
    entries: RwLock<HashMap<EnvironmentId, Arc<Entry>>>,
}

impl EnvironmentRegistry<SystemContext> {
    /// Registry on the system clock with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(SystemContext::shared(), RegistryConfig::default())
    }
}

impl<C: VacuumContext> EnvironmentRegistry<C> {
    pub fn new(ctx: Arc<C>, config: RegistryConfig) -> Self {
        Self {
            ctx,
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<C> {
        &self.ctx
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<EnvironmentId, Arc<Entry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<EnvironmentId, Arc<Entry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, id: &EnvironmentId) -> Result<Arc<Entry>, CoreError> {
        self.read_map()
            .get(id)
            .cloned()
            .ok_or(CoreError::NotFound(*id))
    }

    /// Allocates a new environment and returns its id.
    ///
    /// The world (and its dirt sampling) is built before the map lock is
    /// taken; the lock only covers the collision check and insert.
    pub fn create(&self, params: impl Into<CreateParams>) -> Result<EnvironmentId, CoreError> {
        let CreateParams { mut world, record } = params.into();
        world.validate()?;
        let seed = *world.seed.get_or_insert_with(|| self.ctx.next_seed());

        let mut id = EnvironmentId::new();
        let mut grid = GridWorld::create(id, &world)?;
        let created_at = self.ctx.system_time();

        let mut map = self.write_map();
        while map.contains_key(&id) {
            id = EnvironmentId::new();
            grid = GridWorld::create(id, &world)?;
        }

        let recorder = record.then(|| Recorder::new(&grid, unix_millis(created_at).unwrap_or(0)));
        info!(
            "Created environment {} ({}x{}, dirt_rate={}, seed={}, dirty={}, record={})",
            id.short(),
            grid.width(),
            grid.height(),
            world.dirt_rate,
            seed,
            grid.dirty_cells(),
            record
        );

        map.insert(
            id,
            Arc::new(Entry {
                id,
                created_at,
                state: Mutex::new(EntryState {
                    world: grid,
                    last_access: created_at,
                    observers: Vec::new(),
                    recorder,
                    retired: false,
                }),
            }),
        );
        Ok(id)
    }

    /// Looks up an environment and refreshes its `last_access`.
    pub fn get(&self, id: &EnvironmentId) -> Result<EnvironmentHandle<C>, CoreError> {
        let entry = self.lookup(id)?;
        let handle = EnvironmentHandle {
            entry,
            ctx: Arc::clone(&self.ctx),
        };
        // Touch; also surfaces a concurrent delete as NotFound
        handle.with_state(|_| Ok(()))?;
        Ok(handle)
    }

    pub fn step(&self, id: &EnvironmentId, action: Action) -> Result<StepOutcome, CoreError> {
        self.get(id)?.step(action)
    }

    pub fn sense(&self, id: &EnvironmentId) -> Result<Perception, CoreError> {
        self.get(id)?.sense()
    }

    pub fn state(&self, id: &EnvironmentId) -> Result<GlobalView, CoreError> {
        self.get(id)?.state()
    }

    /// Removes an environment. A second delete of the same id is `NotFound`.
    pub fn delete(&self, id: &EnvironmentId) -> Result<(), CoreError> {
        let entry = self
            .write_map()
            .remove(id)
            .ok_or(CoreError::NotFound(*id))?;

        let recording = {
            let mut state = entry.lock();
            state.retired = true;
            state.recorder.take().map(Recorder::finish)
        };
        info!("Deleted environment {}", id.short());

        if let Some(recording) = recording {
            self.persist(recording);
        }
        Ok(())
    }

    /// Detaches and returns the recording of a recording-enabled environment.
    pub fn take_recording(&self, id: &EnvironmentId) -> Result<Recording, CoreError> {
        let handle = self.get(id)?;
        handle.with_state(|state| {
            state
                .recorder
                .take()
                .map(Recorder::finish)
                .ok_or_else(|| CoreError::invalid(format!("environment {id} is not recording")))
        })
    }

    /// Point-in-time listing, oldest first.
    pub fn list(&self) -> Vec<EnvironmentSummary> {
        let mut entries: Vec<Arc<Entry>> = self.read_map().values().cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        entries
            .iter()
            .filter_map(|entry| {
                let state = entry.lock();
                if state.retired {
                    return None;
                }
                let world = &state.world;
                Some(EnvironmentSummary {
                    id: entry.id,
                    created_at: unix_secs(entry.created_at),
                    last_access: unix_secs(state.last_access),
                    size: [world.width(), world.height()],
                    agent_position: world.agent_position(),
                    performance: world.performance(),
                    actions_taken: world.actions_taken(),
                    finished: world.is_finished(),
                })
            })
            .collect()
    }

    /// Evicts every environment idle for longer than `max_age`.
    ///
    /// Each candidate's lock is taken before it is removed, so an
    /// environment is never evicted in the middle of an action.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let candidates: Vec<Arc<Entry>> = self.read_map().values().cloned().collect();
        let mut evicted = 0;
        let mut recordings = Vec::new();

        for entry in candidates {
            let mut state = entry.lock();
            if state.retired {
                continue;
            }
            let now = self.ctx.system_time();
            let idle = now.duration_since(state.last_access).unwrap_or(Duration::ZERO);
            if idle <= max_age {
                continue;
            }

            let mut map = self.write_map();
            let still_registered = map
                .get(&entry.id)
                .is_some_and(|current| Arc::ptr_eq(current, &entry));
            if still_registered {
                map.remove(&entry.id);
                state.retired = true;
                if let Some(recorder) = state.recorder.take() {
                    recordings.push(recorder.finish());
                }
                debug!("Evicted {} after {:?} idle", entry.id.short(), idle);
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!("Cleanup evicted {} idle environments", evicted);
        }
        for recording in recordings {
            self.persist(recording);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn health(&self) -> RegistryHealth {
        RegistryHealth {
            active_environments: self.len(),
            timestamp: unix_secs(self.ctx.system_time()),
        }
    }

    /// Writes a finished recording to the configured directory, if any.
    ///
    /// Called with no lock held.
    fn persist(&self, recording: Recording) {
        let Some(dir) = self.config.recordings_dir.as_ref() else {
            return;
        };
        let path = dir.join(format!("{}.json", recording.metadata.environment_id));
        let result = std::fs::create_dir_all(dir)
            .map_err(RecordingError::from)
            .and_then(|_| recording.save(&path));
        match result {
            Ok(()) => info!("Recording saved to {}", path.display()),
            Err(e) => warn!("Failed to save recording {}: {}", path.display(), e),
        }
    }

    /// Starts the periodic eviction sweep on the context's spawner.
    ///
    /// The task holds only a weak reference and stops once the registry is
    /// dropped.
    pub fn spawn_sweeper(registry: &Arc<Self>) {
        let ctx = Arc::clone(&registry.ctx);
        let weak = Arc::downgrade(registry);
        let interval = registry.config.sweep_interval;
        let max_age = registry.config.max_age;
        let sleeper = Arc::clone(&ctx);

        ctx.spawn("environment-sweeper", async move {
            loop {
                sleeper.sleep(interval).await;
                let Some(registry) = weak.upgrade() else {
                    break;
                };
                registry.cleanup(max_age);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::DirtGrid;
    use std::sync::Barrier;
    use std::thread;

    struct CountLog(Arc<Mutex<Vec<u32>>>);

    impl StepObserver for CountLog {
        fn on_step(&mut self, event: &StepEvent<'_>) {
            self.0.lock().unwrap().push(event.outcome.after.actions_taken);
        }
    }

    /// Parks the stepping thread inside the entry lock until released.
    struct Gate {
        entered: Arc<Barrier>,
        release: Arc<Barrier>,
    }

    impl StepObserver for Gate {
        fn on_step(&mut self, _: &StepEvent<'_>) {
            self.entered.wait();
            self.release.wait();
        }
    }

    fn registry() -> EnvironmentRegistry {
        EnvironmentRegistry::with_defaults()
    }

    fn params() -> GridWorldParams {
        GridWorldParams::new(8, 8, 0.3).with_seed(42)
    }

    #[test]
    fn test_config_budget_is_clamped() {
        assert_eq!(RegistryConfig::default().with_max_actions(5000).max_actions, MAX_ACTIONS);
        assert_eq!(RegistryConfig::default().with_max_actions(0).max_actions, 1);
        assert_eq!(RegistryConfig::default().with_max_actions(25).default_budget(), 25);

        let raw = RegistryConfig { max_actions: 0, ..RegistryConfig::default() };
        assert_eq!(raw.default_budget(), 1);
    }

    #[test]
    fn test_create_get_delete() {
        let reg = registry();
        let id = reg.create(params()).unwrap();

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(&id).unwrap().id(), id);

        reg.delete(&id).unwrap();
        assert!(reg.is_empty());
        assert_eq!(reg.get(&id).err(), Some(CoreError::NotFound(id)));
        assert_eq!(reg.delete(&id), Err(CoreError::NotFound(id)));
    }

    #[test]
    fn test_create_rejects_invalid_params() {
        let reg = registry();
        let err = reg.create(GridWorldParams::new(0, 8, 0.3)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameter(_)));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_unseeded_create_captures_seed() {
        let reg = registry();
        let id = reg.create(GridWorldParams::new(8, 8, 0.3)).unwrap();
        let world = reg.get(&id).unwrap().world().unwrap();
        let seed = world.seed().unwrap();

        assert_eq!(world.dirt(), &DirtGrid::sample(8, 8, 0.3, seed).unwrap());
    }

    #[test]
    fn test_handle_after_delete_is_not_found() {
        let reg = registry();
        let id = reg.create(params()).unwrap();
        let handle = reg.get(&id).unwrap();
        reg.delete(&id).unwrap();

        assert_eq!(handle.step(Action::Idle).err(), Some(CoreError::NotFound(id)));
    }

    #[test]
    fn test_step_and_views() {
        let reg = registry();
        let id = reg.create(params()).unwrap();

        let out = reg.step(&id, Action::Up).unwrap();
        assert_eq!(out.after.actions_taken, 1);
        let local = reg.sense(&id).unwrap();
        assert_eq!(local.position, out.after.agent_position);
        let global = reg.state(&id).unwrap();
        assert_eq!(global.actions_taken, 1);
    }

    #[test]
    fn test_restricted_state_denied() {
        let reg = registry();
        let id = reg.create(params().restricted(true)).unwrap();

        assert_eq!(reg.state(&id), Err(CoreError::Restricted(id)));
        assert!(reg.sense(&id).is_ok());
    }

    #[test]
    fn test_list_reports_every_environment() {
        let reg = registry();
        let a = reg.create(params()).unwrap();
        let b = reg.create(GridWorldParams::new(3, 2, 0.5).with_seed(1)).unwrap();
        reg.step(&b, Action::Idle).unwrap();

        let rows = reg.list();
        assert_eq!(rows.len(), 2);
        let row_b = rows.iter().find(|r| r.id == b).unwrap();
        assert_eq!(row_b.size, [3, 2]);
        assert_eq!(row_b.actions_taken, 1);
        assert!(rows.iter().any(|r| r.id == a));
        assert!(row_b.last_access >= row_b.created_at);
    }

    #[test]
    fn test_cleanup_only_removes_idle() {
        let reg = registry();
        let old = reg.create(params()).unwrap();
        thread::sleep(Duration::from_millis(30));
        let fresh = reg.create(params()).unwrap();

        assert_eq!(reg.cleanup(Duration::from_millis(20)), 1);
        assert!(reg.get(&old).is_err());
        assert!(reg.get(&fresh).is_ok());
    }

    #[test]
    fn test_recording_lifecycle() {
        let reg = registry();
        let id = reg.create(CreateParams::recorded(params())).unwrap();
        reg.step(&id, Action::Suck).unwrap();
        reg.step(&id, Action::Left).unwrap();

        let rec = reg.take_recording(&id).unwrap();
        assert_eq!(rec.steps.len(), 2);
        assert_eq!(rec.metadata.environment_id, id);
        assert_eq!(rec.metadata.seed, Some(42));

        // Detached: a second take fails, stepping still works
        assert!(matches!(reg.take_recording(&id), Err(CoreError::InvalidParameter(_))));
        assert!(reg.step(&id, Action::Idle).is_ok());
    }

    #[test]
    fn test_delete_persists_recording() {
        let dir = std::env::temp_dir().join(format!("vacuum-reg-{}", uuid::Uuid::new_v4()));
        let reg = EnvironmentRegistry::new(
            SystemContext::shared(),
            RegistryConfig::default().with_recordings_dir(&dir),
        );
        let id = reg.create(CreateParams::recorded(params())).unwrap();
        reg.step(&id, Action::Suck).unwrap();
        reg.delete(&id).unwrap();

        let saved = Recording::load(dir.join(format!("{id}.json"))).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(saved.steps.len(), 1);
        assert_eq!(saved.metadata.total_actions, Some(1));
    }

    #[test]
    fn test_observer_sees_every_step_in_order() {
        let reg = registry();
        let id = reg.create(params()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        reg.get(&id)
            .unwrap()
            .add_observer(Box::new(CountLog(Arc::clone(&seen))))
            .unwrap();

        for _ in 0..5 {
            reg.step(&id, Action::Right).unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_concurrent_steps_are_serialized() {
        let reg = Arc::new(registry());
        // Fully dirty and only moves: never finishes within 400 actions
        let id = reg
            .create(GridWorldParams::new(16, 16, 1.0).with_seed(1).with_position(Position::new(0, 0)))
            .unwrap();

        let threads = 8;
        let per_thread = 50;
        let barrier = Arc::new(Barrier::new(threads));
        let outcomes: Vec<Vec<StepOutcome>> = (0..threads)
            .map(|i| {
                let reg = Arc::clone(&reg);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let action = if i % 2 == 0 { Action::Right } else { Action::Down };
                    (0..per_thread)
                        .map(|_| reg.step(&id, action).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();

        let mut all: Vec<StepOutcome> = outcomes.into_iter().flatten().collect();
        all.sort_by_key(|o| o.after.actions_taken);

        assert_eq!(all.len(), threads * per_thread);
        for (i, out) in all.iter().enumerate() {
            assert_eq!(out.after.actions_taken as usize, i + 1);
        }
        for pair in all.windows(2) {
            assert_eq!(pair[0].after, pair[1].before);
        }
    }

    #[test]
    fn test_cleanup_waits_for_in_flight_step() {
        let reg = Arc::new(registry());
        let id = reg.create(params()).unwrap();
        let handle = reg.get(&id).unwrap();
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        handle
            .add_observer(Box::new(Gate {
                entered: Arc::clone(&entered),
                release: Arc::clone(&release),
            }))
            .unwrap();

        let stepper = {
            let handle = handle.clone();
            thread::spawn(move || handle.step(Action::Idle))
        };
        entered.wait();

        let sweeper = {
            let reg = Arc::clone(&reg);
            thread::spawn(move || reg.cleanup(Duration::ZERO))
        };
        thread::sleep(Duration::from_millis(30));
        assert!(!sweeper.is_finished());
        assert_eq!(reg.len(), 1);

        release.wait();
        let outcome = stepper.join().unwrap().unwrap();
        assert_eq!(outcome.after.actions_taken, 1);

        assert_eq!(sweeper.join().unwrap(), 1);
        assert!(reg.is_empty());
        assert!(matches!(handle.sense(), Err(CoreError::NotFound(_))));
        assert!(matches!(handle.step(Action::Idle), Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sweeper_evicts_idle_environments() {
        let config = RegistryConfig::default()
            .with_max_age(Duration::from_millis(20))
            .with_sweep_interval(Duration::from_millis(10));
        let reg = Arc::new(EnvironmentRegistry::new(SystemContext::shared(), config));
        let id = reg.create(params()).unwrap();

        EnvironmentRegistry::spawn_sweeper(&reg);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(reg.get(&id).is_err());
        assert!(reg.is_empty());
    }
}

//! Record -> save -> load -> replay through the registry.

use std::sync::Arc;
use vacuum_core::{
    Action, CreateParams, DivergenceKind, EnvironmentRegistry, GridWorldParams, Recording,
    RegistryConfig, Replayer,
};
use vacuum_sim::{AgentKind, ScriptedAgent, SessionRunner, SimContext};

fn scratch(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("vacuum-sim-it-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_saved_recording_replays_bit_exact() {
    let registry = Arc::new(EnvironmentRegistry::new(
        SimContext::shared(17),
        RegistryConfig::default(),
    ));
    let runner = SessionRunner::new(registry).with_recording(true);
    let params = GridWorldParams::new(8, 6, 0.3).with_max_actions(300);
    let mut agent = AgentKind::Reflex.build(17);
    let result = runner.run(params, agent.as_mut()).unwrap();
    let recording = result.recording.unwrap();

    let path = scratch("exact").join("run.json");
    recording.save(&path).unwrap();
    let loaded = Recording::load(&path).unwrap();
    assert_eq!(loaded, recording);
    assert_eq!(loaded.metadata.seed, Some(result.seed));

    let replayed = Replayer::replay(&loaded).unwrap();
    assert_eq!(replayed, loaded.steps);
    assert!(Replayer::verify(&loaded).unwrap().is_exact());
}

#[test]
fn test_deleted_environment_persists_recording() {
    let dir = scratch("persist");
    let config = RegistryConfig::default().with_recordings_dir(&dir);
    let registry = EnvironmentRegistry::new(SimContext::shared(4), config);
    let id = registry
        .create(CreateParams::recorded(GridWorldParams::new(3, 3, 1.0).with_seed(4)))
        .unwrap();
    for action in [Action::Suck, Action::Right, Action::Suck, Action::Down] {
        registry.step(&id, action).unwrap();
    }
    registry.delete(&id).unwrap();

    let loaded = Recording::load(dir.join(format!("{id}.json"))).unwrap();
    assert_eq!(loaded.steps.len(), 4);
    assert_eq!(loaded.metadata.total_actions, Some(4));
    assert!(Replayer::verify(&loaded).unwrap().is_exact());
}

#[test]
fn test_compare_reports_scripted_divergence() {
    let registry = Arc::new(EnvironmentRegistry::new(
        SimContext::shared(8),
        RegistryConfig::default(),
    ));
    let runner = SessionRunner::new(registry).with_recording(true);
    let params = GridWorldParams::new(5, 5, 1.0).with_max_actions(40);
    let mut agent = AgentKind::Wall.build(8);
    let recording = runner.run(params, agent.as_mut()).unwrap().recording.unwrap();

    // Same actions except the fifth
    let mut actions = recording.actions();
    actions[4] = if actions[4] == Action::Idle { Action::Suck } else { Action::Idle };
    let mut scripted = ScriptedAgent::new("edited", actions);

    let report = Replayer::compare(&recording, &mut scripted).unwrap();
    let divergence = report.divergence.unwrap();
    assert_eq!(divergence.step, 5);
    assert!(matches!(divergence.kind, DivergenceKind::Action { .. }));
    assert_eq!(report.agent, "edited");
}

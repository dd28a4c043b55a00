//! Deterministic scenarios exercising the engine and registry.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// VW-001: one dirty cell under the agent, cleaned on the first action
    SingleSuck,

    /// VW-002: budget runs out before the agent reaches the dirt
    BudgetExhaustion,

    /// VW-003: walls block movement but still cost an action
    WallBump,

    /// VW-004: many threads stepping one environment stay strictly ordered
    OrderedActions,

    /// VW-005: every reference agent's recording replays bit-exactly
    ReplayExact,

    /// VW-006: idle environments are evicted, touched ones survive
    IdleEviction,

    /// VW-007: restricted environments refuse the global view
    RestrictedView,

    /// VW-008: reference agents on shared layouts respect every invariant
    AgentSweep,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SingleSuck,
            ScenarioId::BudgetExhaustion,
            ScenarioId::WallBump,
            ScenarioId::OrderedActions,
            ScenarioId::ReplayExact,
            ScenarioId::IdleEviction,
            ScenarioId::RestrictedView,
            ScenarioId::AgentSweep,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SingleSuck => "single_suck",
            ScenarioId::BudgetExhaustion => "budget_exhaustion",
            ScenarioId::WallBump => "wall_bump",
            ScenarioId::OrderedActions => "ordered_actions",
            ScenarioId::ReplayExact => "replay_exact",
            ScenarioId::IdleEviction => "idle_eviction",
            ScenarioId::RestrictedView => "restricted_view",
            ScenarioId::AgentSweep => "agent_sweep",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SingleSuck => "2x2 world, only (0,0) dirty, agent on it: one suck finishes",
            ScenarioId::BudgetExhaustion => "3-action budget, dirt out of reach: idles finish at 0",
            ScenarioId::WallBump => "Moves off the grid keep the position and consume budget",
            ScenarioId::OrderedActions => "8 threads on one environment, each step chains to the last",
            ScenarioId::ReplayExact => "Record each reference agent, save/load, replay bit-exact",
            ScenarioId::IdleEviction => "Virtual clock past max age evicts only untouched worlds",
            ScenarioId::RestrictedView => "Global state refused, local sensing and actions allowed",
            ScenarioId::AgentSweep => "All agents over several seeds: bounds, counters, absorption",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single_suck" | "singlesuck" | "vw-001" => Ok(ScenarioId::SingleSuck),
            "budget_exhaustion" | "budgetexhaustion" | "vw-002" => Ok(ScenarioId::BudgetExhaustion),
            "wall_bump" | "wallbump" | "vw-003" => Ok(ScenarioId::WallBump),
            "ordered_actions" | "orderedactions" | "vw-004" => Ok(ScenarioId::OrderedActions),
            "replay_exact" | "replayexact" | "vw-005" => Ok(ScenarioId::ReplayExact),
            "idle_eviction" | "idleeviction" | "vw-006" => Ok(ScenarioId::IdleEviction),
            "restricted_view" | "restrictedview" | "vw-007" => Ok(ScenarioId::RestrictedView),
            "agent_sweep" | "agentsweep" | "vw-008" => Ok(ScenarioId::AgentSweep),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

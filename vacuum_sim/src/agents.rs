//! Reference agents for exercising the environment.
//!
//! All randomness comes from a per-agent `ChaCha8Rng`, so a run is fully
//! determined by the environment seed and the agent seed.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use vacuum_core::{Action, Agent, Perception, Position};

/// Uniformly random over the whole action set.
pub struct RandomAgent {
    rng: ChaCha8Rng,
}

impl RandomAgent {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "RandomAgent"
    }

    fn decide(&mut self, _: &Perception) -> Action {
        Action::ALL[self.rng.gen_range(0..Action::ALL.len())]
    }
}

/// Simple reflex agent: cleans when dirty, otherwise picks a move from the
/// parity of its cell.
///
/// Even/even cells push down or right, odd/odd cells push up or left, and
/// mixed cells move in any direction.
pub struct ReflexAgent {
    rng: ChaCha8Rng,
}

impl ReflexAgent {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn pick(&mut self, options: &[Action]) -> Action {
        options.choose(&mut self.rng).copied().unwrap_or(Action::Idle)
    }
}

impl Agent for ReflexAgent {
    fn name(&self) -> &str {
        "ReflexAgent"
    }

    fn decide(&mut self, p: &Perception) -> Action {
        if p.is_dirty {
            return Action::Suck;
        }
        match (p.position.x % 2, p.position.y % 2) {
            (0, 0) => self.pick(&[Action::Down, Action::Right]),
            (1, 1) => self.pick(&[Action::Up, Action::Left]),
            _ => self.pick(&Action::MOVES),
        }
    }
}

/// Keeps heading in one direction until it stops moving, then turns.
///
/// A blocked move leaves the position unchanged, which is how the agent
/// detects a wall. Cleaning a cell also picks a fresh heading.
pub struct WallAgent {
    rng: ChaCha8Rng,
    heading: Action,
    last_position: Option<Position>,
}

impl WallAgent {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let heading = Action::MOVES[rng.gen_range(0..Action::MOVES.len())];
        Self {
            rng,
            heading,
            last_position: None,
        }
    }

    fn turn(&mut self) {
        let others: Vec<Action> = Action::MOVES
            .into_iter()
            .filter(|a| *a != self.heading)
            .collect();
        if let Some(next) = others.choose(&mut self.rng) {
            self.heading = *next;
        }
    }
}

impl Agent for WallAgent {
    fn name(&self) -> &str {
        "WallAgent"
    }

    fn decide(&mut self, p: &Perception) -> Action {
        if p.is_dirty {
            self.heading = Action::MOVES[self.rng.gen_range(0..Action::MOVES.len())];
            return Action::Suck;
        }
        if self.last_position == Some(p.position) {
            self.turn();
        }
        self.last_position = Some(p.position);
        self.heading
    }
}

/// Plays a fixed action list, then idles.
pub struct ScriptedAgent {
    name: String,
    actions: Vec<Action>,
    cursor: usize,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            actions,
            cursor: 0,
        }
    }
}

impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&mut self, _: &Perception) -> Action {
        let action = self.actions.get(self.cursor).copied().unwrap_or(Action::Idle);
        self.cursor += 1;
        action
    }
}

/// Agent selector used by the CLI and the scenario catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Random,
    Reflex,
    Wall,
}

impl AgentKind {
    pub fn all() -> Vec<AgentKind> {
        vec![AgentKind::Random, AgentKind::Reflex, AgentKind::Wall]
    }

    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::Random => "random",
            AgentKind::Reflex => "reflex",
            AgentKind::Wall => "wall",
        }
    }

    /// Builds a fresh agent seeded with `seed`.
    pub fn build(&self, seed: u64) -> Box<dyn Agent> {
        match self {
            AgentKind::Random => Box::new(RandomAgent::new(seed)),
            AgentKind::Reflex => Box::new(ReflexAgent::new(seed)),
            AgentKind::Wall => Box::new(WallAgent::new(seed)),
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" | "randomagent" => Ok(AgentKind::Random),
            "reflex" | "reflexagent" => Ok(AgentKind::Reflex),
            "wall" | "wallagent" => Ok(AgentKind::Wall),
            _ => Err(format!("Unknown agent: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: u16, y: u16, dirty: bool) -> Perception {
        Perception {
            position: Position::new(x, y),
            is_dirty: dirty,
            actions_remaining: 10,
            finished: false,
            completion_reason: None,
        }
    }

    #[test]
    fn test_agents_suck_when_dirty() {
        for kind in [AgentKind::Reflex, AgentKind::Wall] {
            let mut agent = kind.build(3);
            assert_eq!(agent.decide(&at(2, 5, true)), Action::Suck, "{kind}");
        }
    }

    #[test]
    fn test_reflex_parity_rules() {
        let mut agent = ReflexAgent::new(9);
        for _ in 0..20 {
            let even = agent.decide(&at(2, 4, false));
            assert!(matches!(even, Action::Down | Action::Right));
            let odd = agent.decide(&at(3, 1, false));
            assert!(matches!(odd, Action::Up | Action::Left));
        }
    }

    #[test]
    fn test_wall_agent_turns_when_blocked() {
        let mut agent = WallAgent::new(5);
        let first = agent.decide(&at(0, 0, false));
        let second = agent.decide(&at(0, 0, false));
        assert_ne!(first, second);
        assert!(Action::MOVES.contains(&second));
    }

    #[test]
    fn test_random_agent_is_seeded() {
        let mut a = RandomAgent::new(11);
        let mut b = RandomAgent::new(11);
        let p = at(0, 0, false);
        let xs: Vec<Action> = (0..32).map(|_| a.decide(&p)).collect();
        let ys: Vec<Action> = (0..32).map(|_| b.decide(&p)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_scripted_agent_idles_after_script() {
        let mut agent = ScriptedAgent::new("script", vec![Action::Left, Action::Suck]);
        let p = at(1, 1, false);
        assert_eq!(agent.decide(&p), Action::Left);
        assert_eq!(agent.decide(&p), Action::Suck);
        assert_eq!(agent.decide(&p), Action::Idle);
    }

    #[test]
    fn test_agent_kind_parse() {
        assert_eq!("Reflex".parse::<AgentKind>(), Ok(AgentKind::Reflex));
        assert_eq!("WallAgent".parse::<AgentKind>(), Ok(AgentKind::Wall));
        assert!("smart".parse::<AgentKind>().is_err());
    }
}

//! Agents taking part in the ladder.

use std::{fmt::Display, hash::Hash, path::PathBuf};

use serde::{Deserialize, Serialize};

/// How an agent is obtained before a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentKind {
    /// Agent code lives in the base bot directory.
    #[default]
    LocalAgent,
    /// Agent code is fetched from the artifact service before every match.
    RemoteAgent,
    /// Built-in opponent provided by the game itself.
    DefaultOpponent,
}

/// Faction an agent plays.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Race {
    Terran,
    Zerg,
    Protoss,
    #[default]
    Random,
}

impl Race {
    /// Numeric code sent to the result service.
    pub fn code(self) -> u8 {
        match self {
            Race::Terran => 0,
            Race::Zerg => 1,
            Race::Protoss => 2,
            Race::Random => 3,
        }
    }
}

/// Strength of a built-in opponent.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    VeryEasy,
    Easy,
    #[default]
    Medium,
    MediumHard,
    Hard,
    HardVeryHard,
    VeryHard,
    CheatVision,
    CheatMoney,
    CheatInsane,
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One competitor of the ladder.
///
/// Descriptors are never mutated by the match loop: provisioning builds a fresh one with
/// [`resolve_agent`](crate::agent_collector::resolve_agent).
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    /// Unique within a run.
    pub name: String,
    #[allow(missing_docs)]
    pub kind: AgentKind,
    #[allow(missing_docs)]
    pub race: Race,
    /// Only meaningful for [`AgentKind::DefaultOpponent`].
    pub difficulty: Difficulty,
    /// Explicit root directory. `None` means `<BaseBotDirectory>/<name>`.
    pub root_path: Option<PathBuf>,
    /// Disabled agents are left out of generated matchups.
    pub enabled: bool,
    /// ELO rating, `0` or less when unrated.
    pub skill_rating: i32,
    /// Set when provisioning did not produce a usable agent.
    pub skeleton: bool,
    /// Id handed to the engine for this player.
    pub player_id: Option<String>,
}

impl PartialEq for AgentDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for AgentDescriptor {}

impl Hash for AgentDescriptor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl AgentDescriptor {
    /// Enabled local agent with no skill rating.
    pub fn new(name: impl Into<String>, kind: AgentKind, race: Race) -> AgentDescriptor {
        AgentDescriptor {
            name: name.into(),
            kind,
            race,
            difficulty: Difficulty::default(),
            root_path: None,
            enabled: true,
            skill_rating: 0,
            skeleton: false,
            player_id: None,
        }
    }

    /// Built-in opponent.
    pub fn default_opponent(
        name: impl Into<String>,
        race: Race,
        difficulty: Difficulty,
    ) -> AgentDescriptor {
        AgentDescriptor {
            difficulty,
            ..AgentDescriptor::new(name, AgentKind::DefaultOpponent, race)
        }
    }

    /// Placeholder for an agent that could not be resolved.
    pub fn skeleton(name: impl Into<String>) -> AgentDescriptor {
        AgentDescriptor {
            skeleton: true,
            ..AgentDescriptor::new(name, AgentKind::LocalAgent, Race::default())
        }
    }

    #[allow(missing_docs)]
    pub fn with_skill_rating(mut self, rating: i32) -> Self {
        self.skill_rating = rating;
        self
    }

    #[allow(missing_docs)]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Use `path` instead of `<BaseBotDirectory>/<name>`.
    pub fn with_root_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_path = Some(path.into());
        self
    }

    /// Built-in opponents are never downloaded nor uploaded.
    pub fn is_default_opponent(&self) -> bool {
        self.kind == AgentKind::DefaultOpponent
    }

    /// Root directory of the agent code, falling back to `<base_dir>/<name>`.
    pub fn resolved_root(&self, base_dir: &std::path::Path) -> PathBuf {
        self.root_path
            .clone()
            .unwrap_or_else(|| base_dir.join(&self.name))
    }
}

impl Display for AgentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_default_opponent() {
            write!(f, "{} ({:?} {})", self.name, self.race, self.difficulty)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

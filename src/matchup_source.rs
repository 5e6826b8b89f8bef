//! Where matchups come from.
//!
//! The match loop pulls matchups from a [`MatchupSource`] one at a time and tells it when a
//! matchup is done so that a restart resumes after it.
//!
//! # Provided Sources
//! - [`MatchupList`]: a JSON file of planned matchups, optionally generated as a round robin of
//!   every eligible pair of agents on every map.

use std::{collections::VecDeque, path::PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    agent::AgentDescriptor, agent_collector::AgentRegistry, configuration::Configuration,
    eligibility::EligibilityFilter, logger::Console,
};

/// One planned game.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct Matchup {
    pub agent1: AgentDescriptor,
    pub agent2: AgentDescriptor,
    pub map: String,
    /// Expected archive checksums, when agents are downloaded.
    pub bot1_checksum: Option<String>,
    pub bot2_checksum: Option<String>,
    /// Player ids overriding the ones of the agent descriptors.
    pub bot1_id: Option<String>,
    pub bot2_id: Option<String>,
}

impl Matchup {
    /// Matchup without checksums nor id overrides.
    pub fn new(agent1: AgentDescriptor, agent2: AgentDescriptor, map: impl Into<String>) -> Self {
        Self {
            agent1,
            agent2,
            map: map.into(),
            bot1_checksum: None,
            bot2_checksum: None,
            bot1_id: None,
            bot2_id: None,
        }
    }

    #[allow(missing_docs)]
    pub fn with_checksums(mut self, bot1: Option<String>, bot2: Option<String>) -> Self {
        self.bot1_checksum = bot1;
        self.bot2_checksum = bot2;
        self
    }

    #[allow(missing_docs)]
    pub fn with_ids(mut self, bot1: Option<String>, bot2: Option<String>) -> Self {
        self.bot1_id = bot1;
        self.bot2_id = bot2;
        self
    }

    /// Put the built-in opponent, if any, in second position.
    pub fn with_default_opponent_second(mut self) -> Self {
        if self.agent1.is_default_opponent() && !self.agent2.is_default_opponent() {
            std::mem::swap(&mut self.agent1, &mut self.agent2);
            std::mem::swap(&mut self.bot1_checksum, &mut self.bot2_checksum);
            std::mem::swap(&mut self.bot1_id, &mut self.bot2_id);
        }
        self
    }
}

impl std::fmt::Display for Matchup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} vs {} on {}",
            self.agent1.name, self.agent2.name, self.map
        )
    }
}

/// Produces the matchups of a ladder run.
pub trait MatchupSource {
    /// The next matchup to play, `None` once the source is exhausted.
    fn next_matchup(&mut self) -> Option<Matchup>;

    /// Persist the source state, called after every completed matchup.
    fn persist_progress(&mut self) -> anyhow::Result<()>;
}

/// On-disk form of a matchup.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MatchupEntry {
    pub bot1: String,
    pub bot2: String,
    pub map: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot1_checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot2_checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot1_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot2_id: Option<String>,
}

impl MatchupEntry {
    #[allow(missing_docs)]
    pub fn new(bot1: &str, bot2: &str, map: &str) -> Self {
        Self {
            bot1: bot1.to_owned(),
            bot2: bot2.to_owned(),
            map: map.to_owned(),
            bot1_checksum: None,
            bot2_checksum: None,
            bot1_id: None,
            bot2_id: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MatchupFile {
    matchups: Vec<MatchupEntry>,
}

/// Generator name producing a full round robin.
pub const FULL_GENERATOR: &str = "Full";

/// File-backed [`MatchupSource`].
///
/// Matchups are consumed from the front. [`persist_progress`](MatchupSource::persist_progress)
/// rewrites the file with the ones not handed out yet.
#[derive(Debug)]
pub struct MatchupList {
    path: Option<PathBuf>,
    pending: VecDeque<MatchupEntry>,
    registry: AgentRegistry,
}

impl MatchupList {
    /// List over `entries`, persisted to `path` when set.
    pub fn new(
        path: Option<PathBuf>,
        entries: Vec<MatchupEntry>,
        registry: AgentRegistry,
    ) -> Self {
        Self {
            path,
            pending: entries.into(),
            registry,
        }
    }

    /// Read `MatchupListFile`, generating it when it is missing or empty and the generator
    /// asks for it.
    #[instrument(skip_all)]
    pub fn load(
        config: &Configuration,
        registry: &AgentRegistry,
        console: &Console,
    ) -> anyhow::Result<Self> {
        let mut entries = match &config.matchup_list_file {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("unable to read {}", path.display()))?;
                if text.trim().is_empty() {
                    vec![]
                } else {
                    serde_json::from_str::<MatchupFile>(&text)
                        .with_context(|| format!("invalid matchup list {}", path.display()))?
                        .matchups
                }
            }
            _ => vec![],
        };

        if entries.is_empty() {
            if config.matchup_generator == FULL_GENERATOR {
                let filter = EligibilityFilter::new(registry, config.max_elo_diff, console);
                entries = generate_round_robin(registry, &filter, config.maps());
                info!("generated {} matchups", entries.len());
            } else if !config.matchup_generator.is_empty() {
                warn!("unknown matchup generator '{}'", config.matchup_generator);
            }
        }

        let mut list = Self::new(config.matchup_list_file.clone(), entries, registry.clone());
        if list.path.is_some() {
            list.persist_progress()?;
        }
        Ok(list)
    }

    /// Matchups not handed out yet.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

/// Every pair of enabled agents within skill range, once per map.
pub fn generate_round_robin(
    registry: &AgentRegistry,
    filter: &EligibilityFilter<'_>,
    maps: &[String],
) -> Vec<MatchupEntry> {
    let agents: Vec<_> = registry
        .agents()
        .into_iter()
        .filter(|a| filter.is_enabled(&a.name))
        .collect();

    let n = agents.len();
    let mut pending = vec![];
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (&agents[i], &agents[j]);
            if a.is_default_opponent() && b.is_default_opponent() {
                continue;
            }
            if !filter.is_within_skill_range(&a.name, &b.name) {
                continue;
            }
            for map in maps {
                pending.push(MatchupEntry::new(&a.name, &b.name, map));
            }
        }
    }
    pending
}

impl MatchupSource for MatchupList {
    fn next_matchup(&mut self) -> Option<Matchup> {
        let entry = self.pending.pop_front()?;
        let matchup = Matchup::new(
            self.registry.resolve(&entry.bot1),
            self.registry.resolve(&entry.bot2),
            entry.map,
        )
        .with_checksums(entry.bot1_checksum, entry.bot2_checksum)
        .with_ids(entry.bot1_id, entry.bot2_id);
        Some(matchup)
    }

    fn persist_progress(&mut self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = MatchupFile {
            matchups: self.pending.iter().cloned().collect(),
        };
        let text = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))
    }
}

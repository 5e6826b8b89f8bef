//! Which agents may be paired.

use tracing::debug;

use crate::{agent_collector::AgentRegistry, logger::Console};

/// Enable flags and skill-rating gap checks over an [`AgentRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct EligibilityFilter<'a> {
    registry: &'a AgentRegistry,
    max_elo_diff: i32,
    console: &'a Console,
}

impl<'a> EligibilityFilter<'a> {
    /// `max_elo_diff == 0` disables the skill-rating check.
    pub fn new(registry: &'a AgentRegistry, max_elo_diff: i32, console: &'a Console) -> Self {
        Self {
            registry,
            max_elo_diff,
            console,
        }
    }

    /// Unknown agents are never enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.registry.find(name).is_some_and(|agent| agent.enabled)
    }

    /// Whether two agents are close enough in skill rating to be paired.
    ///
    /// Fails open: unknown agents and unrated agents (rating `<= 0`) are never excluded.
    pub fn is_within_skill_range(&self, name_a: &str, name_b: &str) -> bool {
        if self.max_elo_diff == 0 {
            return true;
        }
        let (Some(a), Some(b)) = (self.registry.find(name_a), self.registry.find(name_b)) else {
            return true;
        };

        let diff = (i64::from(a.skill_rating) - i64::from(b.skill_rating)).abs();
        self.console.line(format!(
            "{name_a} ELO: {} | {name_b} ELO: {} | Diff: {diff}",
            a.skill_rating, b.skill_rating
        ));
        debug!(name_a, name_b, diff, "skill rating gap");

        !(a.skill_rating > 0 && b.skill_rating > 0 && diff > i64::from(self.max_elo_diff))
    }
}

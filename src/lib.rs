//! # Ladder Manager
//!
//! A Rust crate running bot ladders: long sequences of matches between autonomous agents, or
//! between an agent and a built-in opponent, with agent code fetched from and sent back to a
//! ladder server.
//!
//! It provides:
//! - The match loop ([`LadderManager`](crate::ladder_manager::LadderManager))
//! - Agent lookup over a bot directory and an agent info file ([`agent_collector`])
//! - Pairing rules: enable flags and a maximum skill rating gap ([`eligibility`])
//! - Agent download and upload with checksum verification and bounded retry
//!   ([`artifact_transfer`])
//! - Durable result logging and failure bookkeeping ([`result_recorder`])
//!
//! Running a single match is not part of this crate: bring your own engine by implementing
//! [`MatchRunner`](crate::game_interface::MatchRunner). Matchups come from any
//! [`MatchupSource`](crate::matchup_source::MatchupSource); the file-backed
//! [`MatchupList`](crate::matchup_source::MatchupList) is provided.
//!
//! # Failure Policy
//!
//! The ladder prefers making progress to stopping:
//! - a download that keeps failing its checksum, or an agent missing after provisioning, skips
//!   one matchup and is written to the error list;
//! - a failed upload is written to the error list but the match result stands;
//! - an unreadable result log is treated as empty, an unwritable one is reported and skipped.
//!
//! Only an error from the engine (or from persisting matchup progress) stops the run, after
//! appending the matchup in flight to the error list.
//!
//! # Usage Example
//!
//! ```no_run
//! use ladder_manager::prelude::*;
//!
//! struct Engine;
//!
//! impl MatchRunner for Engine {
//!     fn run_match(
//!         &mut self,
//!         agent1: &AgentDescriptor,
//!         agent2: &AgentDescriptor,
//!         map: &str,
//!     ) -> anyhow::Result<MatchOutcome> {
//!         // launch both agents and the game here
//!         Ok(MatchOutcome::new(OutcomeKind::Player1Win, 22_400))
//!     }
//!
//!     fn run_match_vs_default(
//!         &mut self,
//!         agent: &AgentDescriptor,
//!         race: Race,
//!         difficulty: Difficulty,
//!         map: &str,
//!     ) -> anyhow::Result<MatchOutcome> {
//!         Ok(MatchOutcome::new(OutcomeKind::Tie, 0))
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut ladder = LadderManager::from_file("LadderManager.json", Engine)?;
//!     let summary = ladder.run();
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub use anyhow;

pub mod agent;
pub mod agent_collector;
pub mod archive;
pub mod artifact_transfer;
pub mod configuration;
pub mod eligibility;
pub mod error;
pub mod game_interface;
pub mod ladder_manager;
pub mod logger;
pub mod matchup_source;
pub mod remote_session;
pub mod result_recorder;
pub mod transport;

/// Commonly used types and traits for quick access.
///
/// ```rust
/// use ladder_manager::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent::{AgentDescriptor, AgentKind, Difficulty, Race};
    pub use crate::configuration::Configuration;
    pub use crate::game_interface::{MatchOutcome, MatchRunner, OutcomeKind};
    pub use crate::ladder_manager::{LadderManager, RunSummary};
    pub use crate::matchup_source::{Matchup, MatchupList, MatchupSource};
}

//! Traits and types shared with the match execution engine

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentDescriptor, Difficulty, Race};

/// How a single match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    #[allow(missing_docs)]
    Player1Win,
    #[allow(missing_docs)]
    Player2Win,
    #[allow(missing_docs)]
    Tie,
    /// Game hit its step limit.
    Timeout,
    #[allow(missing_docs)]
    Player1Crash,
    #[allow(missing_docs)]
    Player2Crash,
    /// The game or one agent never started.
    InitializationError,
    /// Anything else that went wrong inside the engine.
    #[serde(rename = "Error")]
    GenericError,
    /// The engine was still processing the replay.
    ProcessingReplay,
}

impl OutcomeKind {
    /// Label used in the result log and the result upload.
    pub fn label(self) -> &'static str {
        match self {
            OutcomeKind::Player1Win => "Player1Win",
            OutcomeKind::Player2Win => "Player2Win",
            OutcomeKind::Tie => "Tie",
            OutcomeKind::Timeout => "Timeout",
            OutcomeKind::Player1Crash => "Player1Crash",
            OutcomeKind::Player2Crash => "Player2Crash",
            OutcomeKind::InitializationError => "InitializationError",
            OutcomeKind::GenericError => "Error",
            OutcomeKind::ProcessingReplay => "ProcessingReplay",
        }
    }

    /// A clean game: a winner or a tie. Only those justify uploading agents back.
    pub fn is_valid(self) -> bool {
        matches!(
            self,
            OutcomeKind::Player1Win | OutcomeKind::Player2Win | OutcomeKind::Tie
        )
    }
}

impl Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one match attempt, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    /// How the match ended.
    pub kind: OutcomeKind,
    /// Game length in simulation steps.
    pub game_loop: u64,
    /// Average time per step spent by player 1, in milliseconds.
    pub bot1_avg_frame: f32,
    /// Average time per step spent by player 2, in milliseconds.
    pub bot2_avg_frame: f32,
}

impl MatchOutcome {
    /// Outcome with no timing information.
    pub fn new(kind: OutcomeKind, game_loop: u64) -> Self {
        Self {
            kind,
            game_loop,
            bot1_avg_frame: 0.0,
            bot2_avg_frame: 0.0,
        }
    }
}

/// What the execution engine should implement.
///
/// Both calls block until the match is over. An `Err` means the engine itself failed
/// unexpectedly: the ladder records the matchup as an error and stops.
pub trait MatchRunner {
    /// Play `agent1` against `agent2` on `map`.
    fn run_match(
        &mut self,
        agent1: &AgentDescriptor,
        agent2: &AgentDescriptor,
        map: &str,
    ) -> anyhow::Result<MatchOutcome>;

    /// Play `agent` against the built-in opponent.
    fn run_match_vs_default(
        &mut self,
        agent: &AgentDescriptor,
        opponent_race: Race,
        opponent_difficulty: Difficulty,
        map: &str,
    ) -> anyhow::Result<MatchOutcome>;
}

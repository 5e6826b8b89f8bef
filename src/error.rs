//! Errors of the match loop.

use std::fmt::Display;

use thiserror::Error;

/// Network operation performed on an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    #[allow(missing_docs)]
    Download,
    #[allow(missing_docs)]
    Upload,
}

impl Display for TransferAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferAction::Download => f.write_str("Download"),
            TransferAction::Upload => f.write_str("Upload"),
        }
    }
}

/// Why a matchup did not complete.
///
/// `Transfer` and `Resolution` only cost the current matchup. `Fatal` ends the run.
#[derive(Debug, Error)]
pub enum LadderError {
    /// Every attempt of a download or upload failed.
    #[error("{action} of agent '{agent}' failed after {attempts} attempts")]
    Transfer {
        #[allow(missing_docs)]
        agent: String,
        #[allow(missing_docs)]
        action: TransferAction,
        #[allow(missing_docs)]
        attempts: usize,
    },
    /// Agents still unusable after provisioning.
    #[error("unable to resolve agent(s): {}", .0.join(", "))]
    Resolution(Vec<String>),
    /// Unexpected failure of the engine, or matchup progress that cannot be persisted.
    #[error("{0}")]
    Fatal(String),
}

impl LadderError {
    /// Wrap any error as fatal, keeping its whole context chain in the message.
    pub fn fatal(err: anyhow::Error) -> Self {
        LadderError::Fatal(format!("{err:#}"))
    }

    /// Whether the run must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LadderError::Fatal(_))
    }
}

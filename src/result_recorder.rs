//! Durable bookkeeping: match results, network failures and aborted matchups.
//!
//! The result log is a JSON document `{"Results": [...]}`. Each write re-reads it, copies every
//! previous entry, appends the new one and replaces the file, so the document on disk is always
//! complete. A previous file that cannot be parsed counts as "no previous entries".
//!
//! Network failures and aborted matchups are appended as plain lines to the error list file.
//! Those writes are best effort and never fail the caller.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::macros::format_description;
use tracing::{instrument, warn};

use crate::{
    agent::AgentDescriptor,
    configuration::Configuration,
    error::TransferAction,
    game_interface::{MatchOutcome, OutcomeKind},
    logger::now,
};

/// One entry of the result log.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultLogEntry {
    pub bot1: String,
    pub bot2: String,
    pub winner: String,
    pub map: String,
    pub result: String,
    pub game_time: u64,
}

/// Winner label of a match: a bot name, `"Tie"` or `"Error"`.
pub fn winner_label(agent1: &str, agent2: &str, kind: OutcomeKind) -> String {
    match kind {
        OutcomeKind::Player1Win | OutcomeKind::Player2Crash => agent1.to_owned(),
        OutcomeKind::Player2Win | OutcomeKind::Player1Crash => agent2.to_owned(),
        OutcomeKind::Tie | OutcomeKind::Timeout => "Tie".to_owned(),
        OutcomeKind::InitializationError
        | OutcomeKind::GenericError
        | OutcomeKind::ProcessingReplay => "Error".to_owned(),
    }
}

/// Whether agents should be uploaded back after this outcome.
pub fn is_valid_outcome(outcome: &MatchOutcome) -> bool {
    outcome.kind.is_valid()
}

/// Writes the result log and the error list.
#[derive(Debug, Clone, Default)]
pub struct ResultRecorder {
    results_log: Option<PathBuf>,
    error_log: Option<PathBuf>,
}

impl ResultRecorder {
    /// `None` disables the corresponding file.
    pub fn new(results_log: Option<PathBuf>, error_log: Option<PathBuf>) -> Self {
        Self {
            results_log,
            error_log,
        }
    }

    /// Uses `ResultsLogFile` and `ErrorListFile`.
    pub fn from_config(config: &Configuration) -> Self {
        Self::new(
            config.results_log_file.clone(),
            config.error_list_file.clone(),
        )
    }

    /// Whether a result log is configured.
    pub fn has_results_log(&self) -> bool {
        self.results_log.is_some()
    }

    /// Merge one match result into the result log. Does nothing if no log is configured.
    #[instrument(skip(self, agent1, agent2, outcome), fields(agent1 = %agent1.name, agent2 = %agent2.name))]
    pub fn record_result(
        &self,
        agent1: &AgentDescriptor,
        agent2: &AgentDescriptor,
        map: &str,
        outcome: &MatchOutcome,
    ) -> anyhow::Result<()> {
        let Some(path) = &self.results_log else {
            return Ok(());
        };

        let entry = ResultLogEntry {
            bot1: agent1.name.clone(),
            bot2: agent2.name.clone(),
            winner: winner_label(&agent1.name, &agent2.name, outcome.kind),
            map: map.to_owned(),
            result: outcome.kind.label().to_owned(),
            game_time: outcome.game_loop,
        };

        let mut results = read_previous_results(path);
        results.push(serde_json::to_value(&entry)?);
        let mut doc = serde_json::Map::new();
        doc.insert("Results".to_owned(), Value::Array(results));

        write_replacing(path, &Value::Object(doc))
    }

    /// Append `<timestamp>: <agent>Failed to <action>` to the error list.
    pub fn record_network_failure(&self, agent_name: &str, action: TransferAction) {
        let format = format_description!("[day]-[month]-[year] [hour]-[minute]-[second]");
        let timestamp = now().format(format).unwrap_or_default();
        self.append_error_line(&format!("{timestamp}: {agent_name}Failed to {action}"));
    }

    /// Append the matchup that was in flight when the run aborted to the error list.
    pub fn record_fatal_error(&self, agent1: &str, agent2: &str, map: &str) {
        self.append_error_line(&format!("\"{agent1}\"vs\"{agent2}\" {map}"));
    }

    fn append_error_line(&self, line: &str) {
        let Some(path) = &self.error_log else {
            return;
        };
        let file = OpenOptions::new().create(true).append(true).open(path);
        let res = file.and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = res {
            warn!("cannot append to {}: {e}", path.display());
        }
    }
}

/// Entries of an existing result log. Missing, empty or malformed files yield nothing.
fn read_previous_results(path: &Path) -> Vec<Value> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return vec![];
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(mut doc)) => match doc.remove("Results") {
            Some(Value::Array(results)) => results,
            _ => vec![],
        },
        Ok(_) => vec![],
        Err(e) => {
            if !text.trim().is_empty() {
                warn!("ignoring unparsable result log {}: {e}", path.display());
            }
            vec![]
        }
    }
}

/// Write next to `path` then rename over it.
fn write_replacing(path: &Path, doc: &Value) -> anyhow::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut text = serde_json::to_string_pretty(doc)?;
    text.push('\n');
    std::fs::write(&tmp, text).with_context(|| format!("cannot write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("cannot replace {}", path.display()))
}

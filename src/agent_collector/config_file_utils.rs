//! Reading the agent info file and agent manifests.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::{error, instrument};

use crate::agent::{AgentKind, Difficulty, Race};

/// File marking a directory of the base bot directory as an agent.
pub const AGENT_MANIFEST: &str = "agent.json";

/// Per-agent metadata from the `BotInfoLocation` file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct AgentInfo {
    /// `Type` in the file.
    #[serde(rename = "Type")]
    pub kind: Option<AgentKind>,
    #[allow(missing_docs)]
    pub race: Option<Race>,
    /// Only read for built-in opponents.
    pub difficulty: Option<Difficulty>,
    /// Overrides `<BaseBotDirectory>/<name>`.
    pub root_path: Option<PathBuf>,
    /// Defaults to `true`.
    pub enabled: bool,
    /// Skill rating, `0` when unrated.
    pub elo: i32,
    #[allow(missing_docs)]
    pub player_id: Option<String>,
}

impl Default for AgentInfo {
    fn default() -> Self {
        Self {
            kind: None,
            race: None,
            difficulty: None,
            root_path: None,
            enabled: true,
            elo: 0,
            player_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentInfoFile {
    bots: BTreeMap<String, AgentInfo>,
}

/// Content of an agent's `agent.json`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct AgentManifest {
    #[allow(missing_docs)]
    pub race: Option<Race>,
    #[allow(missing_docs)]
    #[serde(rename = "Type")]
    pub kind: Option<AgentKind>,
}

/// Parse `{"Bots": {<name>: <info>}}`.
pub fn read_agent_info(path: &Path) -> anyhow::Result<BTreeMap<String, AgentInfo>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read agent info {}", path.display()))?;
    let file: AgentInfoFile = serde_json::from_str(&text)
        .with_context(|| format!("invalid agent info {}", path.display()))?;
    Ok(file.bots)
}

/// Read `<dir>/agent.json`; an empty manifest is valid.
pub fn read_manifest(dir: &Path) -> anyhow::Result<AgentManifest> {
    check_dir_integrity(dir)?;
    let path = dir.join(AGENT_MANIFEST);
    if !path.is_file() {
        bail!("{AGENT_MANIFEST} not found");
    }
    let text = std::fs::read_to_string(&path)?;
    if text.trim().is_empty() {
        // an empty manifest only marks the directory
        return Ok(AgentManifest::default());
    }
    serde_json::from_str(&text).with_context(|| format!("invalid {}", path.display()))
}

#[instrument]
pub(super) fn check_dir_integrity(dir: &Path) -> anyhow::Result<()> {
    let metadata = match dir.metadata() {
        Ok(metadata) => metadata,
        Err(e) => {
            error!("Error reading directory: {}", e);
            bail!("error reading directory: {}", e);
        }
    };
    if !metadata.is_dir() {
        error!("Not a directory");
        bail!("not a directory");
    }
    let Ok(_) = std::fs::read_dir(dir) else {
        error!("error reading directory");
        bail!("error reading directory");
    };
    Ok(())
}

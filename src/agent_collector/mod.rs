//! Agent lookup: metadata from the agent info file merged with what is actually on disk.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use tracing::{info, instrument, warn};

use crate::{agent::AgentDescriptor, configuration::Configuration};

mod config_file_utils;

pub use config_file_utils::{AgentInfo, AgentManifest, AGENT_MANIFEST};

/// Agents found on disk, by name.
#[derive(Debug, Clone, Default)]
pub struct DirectoryScan {
    found: BTreeMap<String, (PathBuf, AgentManifest)>,
}

impl DirectoryScan {
    /// Record an agent at `root`.
    pub fn insert(&mut self, name: impl Into<String>, root: PathBuf, manifest: AgentManifest) {
        self.found.insert(name.into(), (root, manifest));
    }

    #[allow(missing_docs)]
    pub fn contains(&self, name: &str) -> bool {
        self.found.contains_key(name)
    }

    /// Agent names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.found.keys().map(String::as_str)
    }
}

/// Scan `base_dir` and the explicit root paths of `info`.
///
/// Every sub-directory holding an [`AGENT_MANIFEST`] is an agent named after the directory.
/// A missing `base_dir` is an empty scan: agents may not have been downloaded yet.
#[instrument(skip(info))]
pub fn scan_agent_directory(
    base_dir: &Path,
    info: &BTreeMap<String, AgentInfo>,
) -> DirectoryScan {
    let mut scan = DirectoryScan::default();

    match std::fs::read_dir(base_dir) {
        Ok(entries) => {
            for entry in entries.filter_map(Result::ok) {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let Ok(name) = entry.file_name().into_string() else {
                    warn!("name error: {:?}", entry.file_name());
                    continue;
                };
                match config_file_utils::read_manifest(&path) {
                    Ok(manifest) => scan.insert(name, path, manifest),
                    Err(e) => warn!("Skipping '{name}': {e}"),
                }
            }
        }
        Err(e) => warn!("cannot read agent directory {}: {e}", base_dir.display()),
    }

    for (name, agent_info) in info {
        let Some(root) = &agent_info.root_path else {
            continue;
        };
        if let Ok(manifest) = config_file_utils::read_manifest(root) {
            scan.insert(name.clone(), root.clone(), manifest);
        }
    }

    info!(agents_on_disk = ?scan.found.keys().collect::<Vec<_>>());
    scan
}

/// Build a fresh descriptor for `name`.
///
/// Built-in opponents resolve from their metadata alone. Any other agent must be present in
/// `scan`; otherwise a skeleton carrying whatever metadata is known is returned.
pub fn resolve_agent(
    name: &str,
    info: Option<&AgentInfo>,
    scan: &DirectoryScan,
) -> AgentDescriptor {
    let mut agent = AgentDescriptor::skeleton(name);
    if let Some(info) = info {
        agent.kind = info.kind.unwrap_or_default();
        agent.race = info.race.unwrap_or_default();
        agent.difficulty = info.difficulty.unwrap_or_default();
        agent.root_path = info.root_path.clone();
        agent.enabled = info.enabled;
        agent.skill_rating = info.elo;
        agent.player_id = info.player_id.clone();
        if agent.is_default_opponent() {
            agent.skeleton = false;
            return agent;
        }
    }

    if let Some((root, manifest)) = scan.found.get(name) {
        if info.and_then(|i| i.kind).is_none() {
            agent.kind = manifest.kind.unwrap_or_default();
        }
        if info.and_then(|i| i.race).is_none() {
            agent.race = manifest.race.unwrap_or_default();
        }
        agent.root_path = Some(root.clone());
        agent.skeleton = false;
    }
    agent
}

/// Every agent the ladder knows about.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    base_dir: PathBuf,
    info: BTreeMap<String, AgentInfo>,
    scan: DirectoryScan,
}

impl AgentRegistry {
    /// Read `BotInfoLocation` (if configured) and scan `BaseBotDirectory`.
    pub fn load(config: &Configuration) -> anyhow::Result<Self> {
        let info = match &config.bot_info_location {
            Some(path) => config_file_utils::read_agent_info(path)?,
            None => BTreeMap::new(),
        };
        Ok(Self::new(config.base_bot_directory.clone(), info))
    }

    /// Registry over `base_dir`, scanned immediately.
    pub fn new(base_dir: PathBuf, info: BTreeMap<String, AgentInfo>) -> Self {
        let scan = scan_agent_directory(&base_dir, &info);
        Self {
            base_dir,
            info,
            scan,
        }
    }

    /// Scan the disk again, e.g. after agents were unpacked.
    pub fn rescan(&mut self) {
        self.scan = scan_agent_directory(&self.base_dir, &self.info);
    }

    /// Descriptor for a known agent, `None` if the name appears neither in the info file nor on
    /// disk.
    pub fn find(&self, name: &str) -> Option<AgentDescriptor> {
        if self.info.contains_key(name) || self.scan.contains(name) {
            Some(self.resolve(name))
        } else {
            None
        }
    }

    /// Descriptor for `name`, a skeleton if it is not usable.
    pub fn resolve(&self, name: &str) -> AgentDescriptor {
        resolve_agent(name, self.info.get(name), &self.scan)
    }

    /// All known agents, sorted by name.
    pub fn agents(&self) -> Vec<AgentDescriptor> {
        let mut names: Vec<&str> = self.info.keys().map(String::as_str).collect();
        names.extend(self.scan.names().filter(|n| !self.info.contains_key(*n)));
        names.sort_unstable();
        names.into_iter().map(|n| self.resolve(n)).collect()
    }

    #[allow(missing_docs)]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

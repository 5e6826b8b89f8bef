#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use ladder_manager::{
    agent_collector::AGENT_MANIFEST,
    archive::Archiver,
    prelude::*,
    transport::{Form, HttpTransport},
};

pub const DOWNLOAD_URL: &str = "http://ladder.test/download";
pub const UPLOAD_URL: &str = "http://ladder.test/upload";
pub const LOGIN_URL: &str = "http://ladder.test/login";
pub const RESULT_URL: &str = "http://ladder.test/result";

/// In-memory ladder server.
///
/// Downloads answer with the scripted bodies of the requested bot, in order, repeating the last
/// one. Uploads answer with the scripted responses, then `{"result": true}`.
#[derive(Default)]
pub struct FakeServer {
    downloads: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    uploads: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(String, Form)>>,
}

impl FakeServer {
    pub fn serve_download(&self, bot: &str, bodies: &[&[u8]]) {
        self.downloads
            .lock()
            .unwrap()
            .insert(bot.to_owned(), bodies.iter().map(|b| b.to_vec()).collect());
    }

    pub fn answer_uploads(&self, responses: &[&str]) {
        self.uploads
            .lock()
            .unwrap()
            .extend(responses.iter().map(|r| r.to_string()));
    }

    pub fn calls_to(&self, url: &str) -> Vec<Form> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, f)| f.clone())
            .collect()
    }
}

impl HttpTransport for FakeServer {
    fn post_form(&self, url: &str, form: &Form) -> anyhow::Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_owned(), form.clone()));
        match url {
            DOWNLOAD_URL => {
                let bot = form.get("BotName").unwrap_or_default();
                let mut downloads = self.downloads.lock().unwrap();
                let Some(bodies) = downloads.get_mut(bot) else {
                    anyhow::bail!("404 {bot}");
                };
                let body = if bodies.len() > 1 {
                    bodies.pop_front().unwrap()
                } else {
                    bodies.front().cloned().unwrap_or_default()
                };
                Ok(body)
            }
            UPLOAD_URL => {
                let response = self
                    .uploads
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| r#"{"result": true}"#.to_owned());
                Ok(response.into_bytes())
            }
            _ => Ok(b"{}".to_vec()),
        }
    }
}

/// Archiver that fakes unpacking by creating an agent directory with a manifest.
#[derive(Default)]
pub struct FakeArchiver {
    pub unpacked: Mutex<Vec<PathBuf>>,
    pub packs: AtomicUsize,
}

impl FakeArchiver {
    pub fn unpack_count(&self) -> usize {
        self.unpacked.lock().unwrap().len()
    }
}

impl Archiver for FakeArchiver {
    fn pack(&self, source_dir: &Path, archive: &Path) -> anyhow::Result<()> {
        anyhow::ensure!(source_dir.is_dir(), "nothing to pack");
        std::fs::write(archive, b"packed agent")?;
        self.packs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unpack(&self, archive: &Path, dest_dir: &Path) -> anyhow::Result<()> {
        anyhow::ensure!(archive.is_file(), "archive missing");
        std::fs::create_dir_all(dest_dir)?;
        std::fs::write(dest_dir.join(AGENT_MANIFEST), "")?;
        self.unpacked.lock().unwrap().push(dest_dir.to_path_buf());
        Ok(())
    }
}

/// Engine returning scripted outcomes; `Err` strings become engine failures.
#[derive(Default)]
pub struct ScriptedRunner {
    pub outcomes: VecDeque<Result<MatchOutcome, String>>,
    /// `(agent1, agent2 or "difficulty", map, agent1 player id, agent2 player id)`
    pub calls: Vec<(String, String, String, Option<String>, Option<String>)>,
}

impl ScriptedRunner {
    pub fn new(outcomes: Vec<Result<MatchOutcome, String>>) -> Self {
        Self {
            outcomes: outcomes.into(),
            calls: vec![],
        }
    }

    fn next(&mut self) -> anyhow::Result<MatchOutcome> {
        match self.outcomes.pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(msg)) => Err(anyhow::anyhow!(msg)),
            None => Ok(MatchOutcome::new(OutcomeKind::Tie, 1)),
        }
    }
}

impl MatchRunner for ScriptedRunner {
    fn run_match(
        &mut self,
        agent1: &AgentDescriptor,
        agent2: &AgentDescriptor,
        map: &str,
    ) -> anyhow::Result<MatchOutcome> {
        self.calls.push((
            agent1.name.clone(),
            agent2.name.clone(),
            map.to_owned(),
            agent1.player_id.clone(),
            agent2.player_id.clone(),
        ));
        self.next()
    }

    fn run_match_vs_default(
        &mut self,
        agent: &AgentDescriptor,
        _opponent_race: Race,
        opponent_difficulty: Difficulty,
        map: &str,
    ) -> anyhow::Result<MatchOutcome> {
        self.calls.push((
            agent.name.clone(),
            opponent_difficulty.to_string(),
            map.to_owned(),
            agent.player_id.clone(),
            None,
        ));
        self.next()
    }
}

/// In-memory matchup source counting how it is used.
#[derive(Default)]
pub struct VecSource {
    pub pending: VecDeque<Matchup>,
    pub fetches: usize,
    pub persisted: usize,
}

impl VecSource {
    pub fn new(matchups: Vec<Matchup>) -> Self {
        Self {
            pending: matchups.into(),
            ..Default::default()
        }
    }
}

impl MatchupSource for VecSource {
    fn next_matchup(&mut self) -> Option<Matchup> {
        self.fetches += 1;
        self.pending.pop_front()
    }

    fn persist_progress(&mut self) -> anyhow::Result<()> {
        self.persisted += 1;
        Ok(())
    }
}

pub fn remote(name: &str) -> AgentDescriptor {
    AgentDescriptor::new(name, AgentKind::RemoteAgent, Race::Random)
}

/// Create `<base>/<name>/agent.json`.
pub fn install_agent(base: &Path, name: &str) -> PathBuf {
    let dir = base.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(AGENT_MANIFEST), r#"{"Race": "Zerg"}"#).unwrap();
    std::fs::write(dir.join("bot.exe"), b"binary").unwrap();
    dir
}

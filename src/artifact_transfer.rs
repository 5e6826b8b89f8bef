//! Moving agent code between the ladder server and the local bot directory.
//!
//! Both directions retry a fixed number of times with no delay in between. Nothing in here is
//! ever fatal: a malformed archive or response only burns an attempt, and exhausting the
//! attempts yields [`LadderError::Transfer`].

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::{
    agent::AgentDescriptor,
    archive::{checksum_file, Archiver},
    configuration::Configuration,
    error::{LadderError, TransferAction},
    logger::Console,
    transport::{Form, HttpTransport},
};

/// Attempts per download or upload.
pub const TRANSFER_ATTEMPTS: usize = 3;

/// Download and upload of packaged agents, with integrity checks.
#[derive(Clone)]
pub struct ArtifactTransfer {
    transport: Arc<dyn HttpTransport>,
    archiver: Arc<dyn Archiver>,
    console: Console,
    base_dir: PathBuf,
    username: String,
    password: String,
    download_url: Option<String>,
    upload_url: Option<String>,
    settle: Duration,
}

impl ArtifactTransfer {
    /// Endpoints, credentials and bot directory are taken from `config`.
    pub fn new(
        config: &Configuration,
        transport: Arc<dyn HttpTransport>,
        archiver: Arc<dyn Archiver>,
        console: Console,
    ) -> Self {
        Self {
            transport,
            archiver,
            console,
            base_dir: config.base_bot_directory.clone(),
            username: config.server_username.clone(),
            password: config.server_password.clone(),
            download_url: config.bot_download_path.clone(),
            upload_url: config.bot_upload_path.clone(),
            settle: config.upload_settle,
        }
    }

    /// Where the archive of `agent` is written, in both directions.
    pub fn archive_path(&self, agent: &AgentDescriptor) -> PathBuf {
        self.base_dir.join(format!("{}.zip", agent.name))
    }

    /// Fetch the archive of `agent`, check it against `expected_checksum` and unpack it into the
    /// agent root.
    ///
    /// The archive is deleted before every attempt and after the last one, so a file left on
    /// disk is never mistaken for a good download.
    #[instrument(skip(self, agent), fields(agent = %agent.name))]
    pub fn download_agent(
        &self,
        agent: &AgentDescriptor,
        expected_checksum: &str,
    ) -> Result<(), LadderError> {
        let failure = |attempts| LadderError::Transfer {
            agent: agent.name.clone(),
            action: TransferAction::Download,
            attempts,
        };
        let Some(url) = &self.download_url else {
            error!("no download endpoint configured");
            return Err(failure(0));
        };

        let archive = self.archive_path(agent);
        let root = agent.resolved_root(&self.base_dir);
        for attempt in 1..=TRANSFER_ATTEMPTS {
            remove_file_if_exists(&archive);
            let res = self.try_download(url, agent, &archive, &root, expected_checksum);
            remove_file_if_exists(&archive);
            match res {
                Ok(true) => {
                    info!(attempt, "agent downloaded to {}", root.display());
                    return Ok(());
                }
                Ok(false) => warn!(attempt, "checksum mismatch"),
                Err(e) => warn!(attempt, "download attempt failed: {e:#}"),
            }
        }
        Err(failure(TRANSFER_ATTEMPTS))
    }

    fn try_download(
        &self,
        url: &str,
        agent: &AgentDescriptor,
        archive: &Path,
        root: &Path,
        expected_checksum: &str,
    ) -> anyhow::Result<bool> {
        let form = Form::with_credentials(&self.username, &self.password).text("BotName", &agent.name);
        let body = self.transport.post_form(url, &form)?;

        if let Some(parent) = archive.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        std::fs::write(archive, body)
            .with_context(|| format!("cannot write {}", archive.display()))?;

        let checksum = checksum_file(archive)?;
        self.console.line(format!(
            "Download checksum: {expected_checksum} Bot checksum: {checksum}"
        ));
        if checksum != expected_checksum {
            return Ok(false);
        }
        self.archiver.unpack(archive, root)?;
        Ok(true)
    }

    /// Pack the agent root, send it with its checksum, then delete the local copy.
    ///
    /// The root directory and the archive are removed whether the upload succeeded or not.
    #[instrument(skip(self, agent), fields(agent = %agent.name))]
    pub fn upload_agent(&self, agent: &AgentDescriptor) -> Result<(), LadderError> {
        let archive = self.archive_path(agent);
        let root = agent.resolved_root(&self.base_dir);

        let attempts = match self.try_upload(agent, &root, &archive) {
            Ok(()) => {
                std::thread::sleep(self.settle);
                self.cleanup(&root, &archive);
                return Ok(());
            }
            Err(attempts) => attempts,
        };

        self.cleanup(&root, &archive);
        Err(LadderError::Transfer {
            agent: agent.name.clone(),
            action: TransferAction::Upload,
            attempts,
        })
    }

    /// `Err` holds the number of attempts actually made.
    fn try_upload(&self, agent: &AgentDescriptor, root: &Path, archive: &Path) -> Result<(), usize> {
        let Some(url) = &self.upload_url else {
            error!("no upload endpoint configured");
            return Err(0);
        };

        remove_file_if_exists(archive);
        let checksum = match self
            .archiver
            .pack(root, archive)
            .and_then(|()| checksum_file(archive))
        {
            Ok(checksum) => checksum,
            Err(e) => {
                error!("cannot pack {}: {e:#}", root.display());
                return Err(0);
            }
        };

        let form = Form::with_credentials(&self.username, &self.password)
            .text("BotName", &agent.name)
            .text("Checksum", checksum)
            .file("BotFile", archive);
        for attempt in 1..=TRANSFER_ATTEMPTS {
            match self.transport.post_form(url, &form) {
                Ok(body) if self.verify_upload_response(&body) => {
                    info!(attempt, "agent uploaded");
                    return Ok(());
                }
                Ok(_) => warn!(attempt, "upload rejected"),
                Err(e) => warn!(attempt, "upload attempt failed: {e:#}"),
            }
        }
        Err(TRANSFER_ATTEMPTS)
    }

    /// `true` only for a JSON object whose `result` field is the boolean `true`.
    pub fn verify_upload_response(&self, body: &[u8]) -> bool {
        let text = String::from_utf8_lossy(body);
        let Ok(doc) = serde_json::from_slice::<Value>(body) else {
            self.console
                .line(format!("Unable to parse incoming upload result: {text}"));
            return false;
        };
        if doc.get("result").and_then(Value::as_bool) == Some(true) {
            return true;
        }
        if doc.get("error").and_then(Value::as_bool).is_some() {
            let message = ["message", "msg", "reason"]
                .iter()
                .find_map(|key| doc.get(*key).and_then(Value::as_str))
                .unwrap_or("no message");
            self.console.line(format!("Error uploading bot: {message}"));
        } else if let Some(message) = doc.get("error").and_then(Value::as_str) {
            self.console.line(format!("Error uploading bot: {message}"));
        } else {
            self.console
                .line(format!("Unexpected upload result: {text}"));
        }
        false
    }

    fn cleanup(&self, root: &Path, archive: &Path) {
        if root.exists() {
            if let Err(e) = std::fs::remove_dir_all(root) {
                warn!("cannot remove {}: {e}", root.display());
            }
        }
        remove_file_if_exists(archive);
    }
}

fn remove_file_if_exists(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("cannot remove {}: {e}", path.display()),
    }
}

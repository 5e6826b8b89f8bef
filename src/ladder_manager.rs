//! The match loop.
//!
//! [`LadderManager`] plays the matchups of a [`MatchupSource`] one after the other:
//!
//! 1. Fetch the next matchup; stop when the source is exhausted.
//! 2. Put a built-in opponent in second position. Matches against a built-in opponent use the
//!    agent as configured and skip every transfer.
//! 3. Otherwise, when `BotDownloadPath` is set, download both agents and rescan the bot
//!    directory. Then resolve both agents by name. A failed download or an unresolved agent
//!    skips the matchup without persisting the source progress.
//! 4. Run the match through the [`MatchRunner`].
//! 5. After a clean result (win or tie), upload both agents back when `BotUploadPath` is set.
//! 6. Upload the replay when `EnableReplayUpload` is `"True"`.
//! 7. Record the result and persist the source progress.
//!
//! An error from the engine, or from persisting the source progress, is fatal: the matchup in
//! flight is appended to the error list and the loop stops. A result that cannot be written to
//! the result log is only reported.
//!
//! # Example
//!
//! ```no_run
//! # use ladder_manager::prelude::*;
//! # struct Engine;
//! # impl MatchRunner for Engine {
//! #     fn run_match(&mut self, _: &AgentDescriptor, _: &AgentDescriptor, _: &str) -> anyhow::Result<MatchOutcome> {
//! #         Ok(MatchOutcome::new(OutcomeKind::Tie, 0))
//! #     }
//! #     fn run_match_vs_default(&mut self, _: &AgentDescriptor, _: Race, _: Difficulty, _: &str) -> anyhow::Result<MatchOutcome> {
//! #         Ok(MatchOutcome::new(OutcomeKind::Tie, 0))
//! #     }
//! # }
//! fn main() -> anyhow::Result<()> {
//!     let mut ladder = LadderManager::from_file("LadderManager.json", Engine)?;
//!     let summary = ladder.run();
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

use std::{fmt::Display, path::Path, sync::Arc};

use tracing::{error, info, instrument, warn};

use crate::{
    agent::AgentDescriptor,
    agent_collector::AgentRegistry,
    archive::{Archiver, CommandArchiver},
    artifact_transfer::ArtifactTransfer,
    configuration::Configuration,
    error::{LadderError, TransferAction},
    game_interface::{MatchOutcome, MatchRunner},
    logger::{init_logger, Console},
    matchup_source::{Matchup, MatchupList, MatchupSource},
    remote_session::RemoteSession,
    result_recorder::{is_valid_outcome, ResultRecorder},
    transport::{HttpTransport, ReqwestTransport},
};

/// What happened during [`LadderManager::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Matchups that were played.
    pub played: usize,
    /// Matchups skipped because an agent could not be provisioned.
    pub skipped: usize,
    /// Message of the fatal error that stopped the run early.
    pub aborted: Option<String>,
}

impl RunSummary {
    /// Whether the matchup source was exhausted.
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "played: {}, skipped: {}", self.played, self.skipped)?;
        if let Some(msg) = &self.aborted {
            write!(f, ", aborted: {msg}")?;
        }
        Ok(())
    }
}

/// The ladder orchestrator.
///
/// # Type Parameters
/// - `R`: the match execution engine
/// - `S`: where matchups come from
pub struct LadderManager<R: MatchRunner, S: MatchupSource> {
    config: Configuration,
    runner: R,
    source: S,
    registry: AgentRegistry,
    recorder: ResultRecorder,
    transport: Arc<dyn HttpTransport>,
    archiver: Arc<dyn Archiver>,
    console: Console,
}

impl<R: MatchRunner> LadderManager<R, MatchupList> {
    /// Build a ladder from a JSON config file, using its `MatchupListFile` as source.
    pub fn from_file(path: impl AsRef<Path>, runner: R) -> anyhow::Result<Self> {
        let config = Configuration::from_file(path)?;
        let registry = AgentRegistry::load(&config)?;
        let console = Console::stdout(config.verbose);
        let source = MatchupList::load(&config, &registry, &console)?;
        Self::with_parts(config, runner, source, registry)
    }
}

impl<R: MatchRunner, S: MatchupSource> LadderManager<R, S> {
    /// Create a ladder talking to the server over HTTP and packing agents with `zip`.
    ///
    /// Agents are looked up in `BaseBotDirectory` and `BotInfoLocation`. When `log` is set, a
    /// global file subscriber is installed; if one is already installed (a second ladder in the
    /// same process), events keep going to the existing one.
    pub fn new(config: Configuration, runner: R, source: S) -> anyhow::Result<Self> {
        let registry = AgentRegistry::load(&config)?;
        Self::with_parts(config, runner, source, registry)
    }

    /// Same as [`new`](Self::new) with an already loaded agent registry.
    #[instrument(skip_all)]
    pub fn with_parts(
        config: Configuration,
        runner: R,
        source: S,
        registry: AgentRegistry,
    ) -> anyhow::Result<Self> {
        if config.log {
            if let Err(e) = init_logger() {
                warn!("file logging not enabled: {e:#}");
            }
        }
        info!(?config);

        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self {
            recorder: ResultRecorder::from_config(&config),
            console: Console::stdout(config.verbose),
            registry,
            transport,
            archiver: Arc::new(CommandArchiver),
            config,
            runner,
            source,
        })
    }

    /// Replace the HTTP transport.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Replace the archiver.
    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Replace the operator console.
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Replace the agent registry.
    pub fn with_registry(mut self, registry: AgentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The matchup source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The execution engine.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Play every matchup of the source.
    ///
    /// Never fails: provisioning problems skip a matchup, and a fatal error is logged, appended
    /// to the error list and reported in [`RunSummary::aborted`].
    pub fn run(&mut self) -> RunSummary {
        self.print_setup();

        let transfer = ArtifactTransfer::new(
            &self.config,
            self.transport.clone(),
            self.archiver.clone(),
            self.console.clone(),
        );
        let session = RemoteSession::new(&self.config, self.transport.clone());
        if session.login_enabled() {
            // bad credentials show up later as failed transfers
            session.login();
        }

        let mut summary = RunSummary::default();
        while let Some(matchup) = self.source.next_matchup() {
            let matchup = matchup.with_default_opponent_second();
            let in_flight = (
                matchup.agent1.name.clone(),
                matchup.agent2.name.clone(),
                matchup.map.clone(),
            );

            match self.play(matchup, &transfer, &session) {
                Ok(()) => summary.played += 1,
                Err(e) if !e.is_fatal() => {
                    warn!("matchup skipped: {e}");
                    summary.skipped += 1;
                }
                Err(e) => {
                    let (agent1, agent2, map) = in_flight;
                    error!(agent1, agent2, map, "aborting ladder: {e}");
                    self.console.line(format!("Exception in game {e}"));
                    self.recorder.record_fatal_error(&agent1, &agent2, &map);
                    summary.aborted = Some(e.to_string());
                    break;
                }
            }
        }

        info!(%summary, "ladder finished");
        summary
    }

    fn print_setup(&self) {
        self.console.line("Loaded agents: ");
        for agent in self.registry.agents() {
            self.console.line(&agent.name);
        }
        let maps = self.config.maps();
        self.console
            .line(format!("Starting with {} maps:", maps.len()));
        for map in maps {
            self.console.line(format!("* {map}"));
        }
    }

    #[instrument(skip_all, fields(matchup = %matchup))]
    fn play(
        &mut self,
        matchup: Matchup,
        transfer: &ArtifactTransfer,
        session: &RemoteSession,
    ) -> Result<(), LadderError> {
        self.console.line(format!(
            "Starting {} vs {} on {}",
            matchup.agent1.name, matchup.agent2.name, matchup.map
        ));

        let (agent1, agent2, outcome) = if matchup.agent2.is_default_opponent() {
            if matchup.agent1.is_default_opponent() {
                return Err(LadderError::Resolution(vec![
                    matchup.agent1.name,
                    matchup.agent2.name,
                ]));
            }
            let opponent = &matchup.agent2;
            let outcome = self
                .runner
                .run_match_vs_default(
                    &matchup.agent1,
                    opponent.race,
                    opponent.difficulty,
                    &matchup.map,
                )
                .map_err(LadderError::fatal)?;
            (matchup.agent1, matchup.agent2, outcome)
        } else {
            let (agent1, agent2) = self.provision(&matchup, transfer)?;
            let outcome = self
                .runner
                .run_match(&agent1, &agent2, &matchup.map)
                .map_err(LadderError::fatal)?;

            if self.config.bot_upload_path.is_some() && is_valid_outcome(&outcome) {
                for agent in [&agent1, &agent2] {
                    if let Err(e) = transfer.upload_agent(agent) {
                        warn!("{e}");
                        self.recorder
                            .record_network_failure(&agent.name, TransferAction::Upload);
                    }
                }
            }
            (agent1, agent2, outcome)
        };

        self.console
            .line(format!("Game finished with result: {}", outcome.kind));
        if self.config.enable_replay_upload {
            self.upload_replay(session, &outcome, &agent1, &agent2, &matchup.map);
        }

        if self.recorder.has_results_log() {
            if let Err(e) = self
                .recorder
                .record_result(&agent1, &agent2, &matchup.map, &outcome)
            {
                warn!("result not recorded: {e:#}");
                self.console
                    .line(format!(
                        "Unable to save result of {} vs {} on {}: {e:#}",
                        agent1.name, agent2.name, matchup.map
                    ));
            }
        }
        self.source
            .persist_progress()
            .map_err(LadderError::fatal)?;
        Ok(())
    }

    /// Download (if configured) and resolve both agents of a matchup.
    fn provision(
        &mut self,
        matchup: &Matchup,
        transfer: &ArtifactTransfer,
    ) -> Result<(AgentDescriptor, AgentDescriptor), LadderError> {
        if self.config.bot_download_path.is_some() {
            let sides = [
                (&matchup.agent1, &matchup.bot1_checksum),
                (&matchup.agent2, &matchup.bot2_checksum),
            ];
            for (agent, checksum) in sides {
                let checksum = checksum.as_deref().unwrap_or_default();
                if let Err(e) = transfer.download_agent(agent, checksum) {
                    self.console.line("Bot download failed, skipping game");
                    self.recorder
                        .record_network_failure(&agent.name, TransferAction::Download);
                    return Err(e);
                }
            }
            self.registry.rescan();
        }

        let mut agent1 = self.registry.resolve(&matchup.agent1.name);
        let mut agent2 = self.registry.resolve(&matchup.agent2.name);

        let unresolved: Vec<String> = [&agent1, &agent2]
            .into_iter()
            .filter(|a| a.skeleton)
            .map(|a| a.name.clone())
            .collect();
        if !unresolved.is_empty() {
            self.console.line(format!(
                "Unable to start game {} vs {} Unable to download bot",
                agent1.name, agent2.name
            ));
            for name in &unresolved {
                self.console.line(format!("Unable to download bot {name}"));
            }
            return Err(LadderError::Resolution(unresolved));
        }

        if let Some(id) = &matchup.bot1_id {
            agent1.player_id = Some(id.clone());
        }
        if let Some(id) = &matchup.bot2_id {
            agent2.player_id = Some(id.clone());
        }
        Ok((agent1, agent2))
    }

    /// Best effort: a failed upload is only logged.
    fn upload_replay(
        &self,
        session: &RemoteSession,
        outcome: &MatchOutcome,
        agent1: &AgentDescriptor,
        agent2: &AgentDescriptor,
        map: &str,
    ) {
        let raw_map = strip_map_extension(map);
        let replay = self
            .config
            .local_replay_directory
            .join(replay_file_name(agent1, agent2, raw_map, &self.config.replay_extension));

        let form = session
            .form()
            .text("Bot1Name", &agent1.name)
            .text("Bot1Race", agent1.race.code().to_string())
            .text("Bot2Name", &agent2.name)
            .text("Bot1AvgFrame", outcome.bot1_avg_frame.to_string())
            .text("Bot2AvgFrame", outcome.bot2_avg_frame.to_string())
            .text("Frames", outcome.game_loop.to_string())
            .text("Map", raw_map)
            .text("Result", outcome.kind.label())
            .file("replayfile", &replay);

        if let Err(e) = self
            .transport
            .post_form(&self.config.upload_result_location, &form)
        {
            warn!("replay upload failed: {e:#}");
        }
    }
}

/// `Foo.SC2Map` -> `Foo`
fn strip_map_extension(map: &str) -> &str {
    match map.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains(['/', '\\']) => stem,
        _ => map,
    }
}

/// `<agent1>v<agent2 or difficulty>-<map>.<extension>` without any whitespace.
fn replay_file_name(
    agent1: &AgentDescriptor,
    agent2: &AgentDescriptor,
    raw_map: &str,
    extension: &str,
) -> String {
    let opponent = if agent2.is_default_opponent() {
        agent2.difficulty.to_string()
    } else {
        agent2.name.clone()
    };
    format!("{}v{opponent}-{raw_map}.{extension}", agent1.name)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

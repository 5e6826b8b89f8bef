use std::{path::Path, sync::Arc, time::Duration};

use fakes::{
    install_agent, remote, FakeArchiver, FakeServer, ScriptedRunner, VecSource, DOWNLOAD_URL,
    LOGIN_URL, RESULT_URL, UPLOAD_URL,
};
use ladder_manager::{archive::checksum_bytes, logger::Console, prelude::*};
use serde_json::Value;

mod fakes;

struct Ladder {
    base: tempfile::TempDir,
    server: Arc<FakeServer>,
    archiver: Arc<FakeArchiver>,
}

impl Ladder {
    fn new() -> Self {
        Self {
            base: tempfile::tempdir().unwrap(),
            server: Arc::new(FakeServer::default()),
            archiver: Arc::new(FakeArchiver::default()),
        }
    }

    fn bots(&self) -> std::path::PathBuf {
        self.base.path().join("bots")
    }

    fn results(&self) -> std::path::PathBuf {
        self.base.path().join("results.json")
    }

    fn errors(&self) -> std::path::PathBuf {
        self.base.path().join("errors.txt")
    }

    fn config(&self) -> Configuration {
        Configuration::new()
            .with_verbose(false)
            .with_base_bot_directory(self.bots())
            .with_results_log_file(Some(self.results()))
            .with_error_list_file(Some(self.errors()))
            .with_credentials("ladder", "hunter2")
            .with_upload_settle(Duration::ZERO)
    }

    fn manager(
        &self,
        config: Configuration,
        runner: ScriptedRunner,
        source: VecSource,
    ) -> LadderManager<ScriptedRunner, VecSource> {
        LadderManager::new(config, runner, source)
            .unwrap()
            .with_transport(self.server.clone())
            .with_archiver(self.archiver.clone())
            .with_console(Console::silent())
    }

    fn result_entries(&self) -> Vec<Value> {
        let text = std::fs::read_to_string(self.results()).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        doc["Results"].as_array().unwrap().clone()
    }

    fn error_lines(&self) -> Vec<String> {
        match std::fs::read_to_string(self.errors()) {
            Ok(text) => text.lines().map(str::to_owned).collect(),
            Err(_) => vec![],
        }
    }
}

fn win() -> Result<MatchOutcome, String> {
    Ok(MatchOutcome::new(OutcomeKind::Player1Win, 13_440))
}

#[test]
fn local_agents_are_played_and_recorded() {
    let ladder = Ladder::new();
    install_agent(&ladder.bots(), "Alpha");
    install_agent(&ladder.bots(), "Beta");
    let source = VecSource::new(vec![
        Matchup::new(remote("Alpha"), remote("Beta"), "Map1.SC2Map"),
        Matchup::new(remote("Beta"), remote("Alpha"), "Map2.SC2Map"),
    ]);
    let runner = ScriptedRunner::new(vec![
        win(),
        Ok(MatchOutcome::new(OutcomeKind::Player1Crash, 10)),
    ]);

    let mut manager = ladder.manager(ladder.config(), runner, source);
    let summary = manager.run();

    assert_eq!(
        summary,
        RunSummary {
            played: 2,
            skipped: 0,
            aborted: None
        }
    );
    assert_eq!(manager.source().persisted, 2);
    assert_eq!(manager.runner().calls.len(), 2);

    let entries = ladder.result_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["Bot1"], "Alpha");
    assert_eq!(entries[0]["Winner"], "Alpha");
    assert_eq!(entries[0]["Map"], "Map1.SC2Map");
    assert_eq!(entries[0]["GameTime"], 13_440);
    assert_eq!(entries[1]["Winner"], "Alpha");
    assert_eq!(entries[1]["Result"], "Player1Crash");

    // nothing configured remotely
    assert!(ladder.server.calls_to(DOWNLOAD_URL).is_empty());
    assert!(ladder.server.calls_to(UPLOAD_URL).is_empty());
    assert!(ladder.error_lines().is_empty());
}

#[test]
fn failed_download_skips_matchup_without_persisting() {
    let ladder = Ladder::new();
    let good = checksum_bytes(b"good archive");
    ladder.server.serve_download("Alpha", &[b"bad archive"]);
    ladder.server.serve_download("Beta", &[b"good archive"]);
    ladder.server.serve_download("Gamma", &[b"good archive"]);

    let source = VecSource::new(vec![
        Matchup::new(remote("Alpha"), remote("Beta"), "Map1")
            .with_checksums(Some(good.clone()), Some(good.clone())),
        Matchup::new(remote("Beta"), remote("Gamma"), "Map1")
            .with_checksums(Some(good.clone()), Some(good.clone())),
    ]);
    let config = ladder
        .config()
        .with_bot_download_path(Some(DOWNLOAD_URL.into()));

    let mut manager = ladder.manager(config, ScriptedRunner::new(vec![win()]), source);
    let summary = manager.run();

    assert_eq!(summary.played, 1);
    assert_eq!(summary.skipped, 1);
    assert!(summary.is_complete());

    // only the second matchup reached the engine
    let calls = &manager.runner().calls;
    assert_eq!(calls.len(), 1);
    assert_eq!((calls[0].0.as_str(), calls[0].1.as_str()), ("Beta", "Gamma"));
    assert_eq!(manager.source().persisted, 1);
    assert_eq!(manager.source().fetches, 3);

    let errors = ladder.error_lines();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].ends_with(": AlphaFailed to Download"), "{errors:?}");

    // Beta was never downloaded for the first matchup
    let beta_downloads = ladder
        .server
        .calls_to(DOWNLOAD_URL)
        .iter()
        .filter(|f| f.get("BotName") == Some("Beta"))
        .count();
    assert_eq!(beta_downloads, 1);
    assert_eq!(ladder.result_entries().len(), 1);
}

#[test]
fn engine_failure_aborts_the_run() {
    let ladder = Ladder::new();
    install_agent(&ladder.bots(), "Alpha");
    install_agent(&ladder.bots(), "Beta");
    let source = VecSource::new(vec![
        Matchup::new(remote("Alpha"), remote("Beta"), "Map1"),
        Matchup::new(remote("Beta"), remote("Alpha"), "Map1"),
    ]);
    let runner = ScriptedRunner::new(vec![Err("game process vanished".into()), win()]);

    let mut manager = ladder.manager(ladder.config(), runner, source);
    let summary = manager.run();

    assert_eq!(summary.played, 0);
    assert_eq!(summary.aborted.as_deref(), Some("game process vanished"));
    assert_eq!(manager.source().fetches, 1);
    assert_eq!(manager.source().persisted, 0);
    assert_eq!(ladder.error_lines(), ["\"Alpha\"vs\"Beta\" Map1"]);
    assert!(!ladder.results().exists());
}

#[test]
fn unwritable_result_log_does_not_stop_the_run() {
    let ladder = Ladder::new();
    install_agent(&ladder.bots(), "Alpha");
    install_agent(&ladder.bots(), "Beta");
    let source = VecSource::new(vec![
        Matchup::new(remote("Alpha"), remote("Beta"), "Map1"),
        Matchup::new(remote("Beta"), remote("Alpha"), "Map1"),
    ]);
    let results = ladder.base.path().join("missing_dir").join("results.json");
    let config = ladder.config().with_results_log_file(Some(results.clone()));

    let mut manager = ladder.manager(config, ScriptedRunner::new(vec![win(), win()]), source);
    let summary = manager.run();

    assert_eq!(
        summary,
        RunSummary {
            played: 2,
            skipped: 0,
            aborted: None
        }
    );
    assert_eq!(manager.runner().calls.len(), 2);
    assert_eq!(manager.source().fetches, 3);
    assert_eq!(manager.source().persisted, 2);
    assert!(ladder.error_lines().is_empty());
    assert!(!results.exists());
}

#[test]
fn unresolved_agent_skips_matchup() {
    let ladder = Ladder::new();
    install_agent(&ladder.bots(), "Alpha");
    let source = VecSource::new(vec![Matchup::new(remote("Alpha"), remote("Ghost"), "Map1")]);

    let mut manager = ladder.manager(ladder.config(), ScriptedRunner::default(), source);
    let summary = manager.run();

    assert_eq!(summary.skipped, 1);
    assert!(manager.runner().calls.is_empty());
    assert_eq!(manager.source().persisted, 0);
    assert!(!ladder.results().exists());
}

#[test]
fn downloaded_agents_are_uploaded_after_clean_game() {
    let ladder = Ladder::new();
    let good = checksum_bytes(b"archive");
    ladder.server.serve_download("Alpha", &[b"archive"]);
    ladder.server.serve_download("Beta", &[b"archive"]);
    ladder
        .server
        .answer_uploads(&[r#"{"result": true}"#, r#"{"error": true}"#, r#"{"error": true}"#, "{}"]);

    let source = VecSource::new(vec![Matchup::new(remote("Alpha"), remote("Beta"), "Map1")
        .with_checksums(Some(good.clone()), Some(good))
        .with_ids(Some("id-alpha".into()), None)]);
    let config = ladder
        .config()
        .with_bot_download_path(Some(DOWNLOAD_URL.into()))
        .with_bot_upload_path(Some(UPLOAD_URL.into()));

    let mut manager = ladder.manager(config, ScriptedRunner::new(vec![win()]), source);
    let summary = manager.run();

    assert_eq!(summary.played, 1);
    assert_eq!(ladder.archiver.unpack_count(), 2);
    let call = &manager.runner().calls[0];
    assert_eq!(call.3.as_deref(), Some("id-alpha"));
    assert_eq!(call.4, None);

    // Alpha succeeded first try, Beta failed three times
    assert_eq!(ladder.server.calls_to(UPLOAD_URL).len(), 4);
    let errors = ladder.error_lines();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].ends_with(": BetaFailed to Upload"));

    // the match still counts and the local copies are gone
    assert_eq!(ladder.result_entries()[0]["Winner"], "Alpha");
    assert!(!ladder.bots().join("Alpha").exists());
    assert!(!ladder.bots().join("Beta").exists());
}

#[test]
fn crashed_game_is_not_uploaded() {
    let ladder = Ladder::new();
    install_agent(&ladder.bots(), "Alpha");
    install_agent(&ladder.bots(), "Beta");
    let source = VecSource::new(vec![Matchup::new(remote("Alpha"), remote("Beta"), "Map1")]);
    let config = ladder
        .config()
        .with_bot_upload_path(Some(UPLOAD_URL.into()));
    let runner = ScriptedRunner::new(vec![Ok(MatchOutcome::new(OutcomeKind::Player2Crash, 5))]);

    let mut manager = ladder.manager(config, runner, source);
    manager.run();

    assert!(ladder.server.calls_to(UPLOAD_URL).is_empty());
    assert!(ladder.bots().join("Alpha").exists());
    assert_eq!(ladder.result_entries()[0]["Winner"], "Alpha");
}

#[test]
fn default_opponent_is_always_second() {
    let ladder = Ladder::new();
    let cpu = AgentDescriptor::default_opponent("Computer", Race::Protoss, Difficulty::CheatInsane);
    let source = VecSource::new(vec![Matchup::new(cpu, remote("Alpha"), "Map1")]);
    let config = ladder
        .config()
        .with_bot_download_path(Some(DOWNLOAD_URL.into()))
        .with_bot_upload_path(Some(UPLOAD_URL.into()));
    let runner = ScriptedRunner::new(vec![Ok(MatchOutcome::new(OutcomeKind::Player2Win, 99))]);

    let mut manager = ladder.manager(config, runner, source);
    let summary = manager.run();

    assert_eq!(summary.played, 1);
    let call = &manager.runner().calls[0];
    assert_eq!((call.0.as_str(), call.1.as_str()), ("Alpha", "CheatInsane"));
    assert!(ladder.server.calls_to(DOWNLOAD_URL).is_empty());
    assert!(ladder.server.calls_to(UPLOAD_URL).is_empty());

    let entry = &ladder.result_entries()[0];
    assert_eq!(entry["Bot1"], "Alpha");
    assert_eq!(entry["Bot2"], "Computer");
    assert_eq!(entry["Winner"], "Computer");
}

#[test]
fn login_once_and_replay_upload() {
    let ladder = Ladder::new();
    install_agent(&ladder.bots(), "Alpha");
    install_agent(&ladder.bots(), "Beta");
    let source = VecSource::new(vec![
        Matchup::new(remote("Alpha"), remote("Beta"), "Acropolis LE.SC2Map"),
        Matchup::new(remote("Beta"), remote("Alpha"), "Acropolis LE.SC2Map"),
    ]);
    let replays = Path::new("/replays");
    let config = ladder
        .config()
        .with_server_login(Some(LOGIN_URL.into()))
        .with_replay_upload(Some(RESULT_URL.into()), replays.to_path_buf());
    let mut outcome = MatchOutcome::new(OutcomeKind::Tie, 2_000);
    outcome.bot1_avg_frame = 1.5;

    let mut manager = ladder.manager(config, ScriptedRunner::new(vec![Ok(outcome)]), source);
    manager.run();

    let logins = ladder.server.calls_to(LOGIN_URL);
    assert_eq!(logins.len(), 1);
    assert_eq!(logins[0].get("Username"), Some("ladder"));

    let uploads = ladder.server.calls_to(RESULT_URL);
    assert_eq!(uploads.len(), 2);
    let form = &uploads[0];
    assert_eq!(form.get("Bot1Name"), Some("Alpha"));
    assert_eq!(form.get("Bot1Race"), Some("1"));
    assert_eq!(form.get("Bot2Name"), Some("Beta"));
    assert_eq!(form.get("Bot1AvgFrame"), Some("1.5"));
    assert_eq!(form.get("Frames"), Some("2000"));
    assert_eq!(form.get("Map"), Some("Acropolis LE"));
    assert_eq!(form.get("Result"), Some("Tie"));
    assert_eq!(
        form.files()[0],
        (
            "replayfile".to_owned(),
            replays.join("AlphavBeta-AcropolisLE.Sc2Replay")
        )
    );
}

#[test]
fn matchup_list_end_to_end() {
    let ladder = Ladder::new();
    install_agent(&ladder.bots(), "Alpha");
    install_agent(&ladder.bots(), "Beta");
    install_agent(&ladder.bots(), "Gamma");
    let list_path = ladder.base.path().join("matchups.json");
    let config = ladder
        .config()
        .with_maps(vec!["Map1".into()])
        .with_matchup_list(Some(list_path.clone()), "Full");

    let registry = ladder_manager::agent_collector::AgentRegistry::load(&config).unwrap();
    let source = MatchupList::load(&config, &registry, &Console::silent()).unwrap();
    assert_eq!(source.remaining(), 3);

    let mut manager = LadderManager::new(config, ScriptedRunner::default(), source)
        .unwrap()
        .with_transport(ladder.server.clone())
        .with_archiver(ladder.archiver.clone())
        .with_console(Console::silent());
    let summary = manager.run();

    assert_eq!(summary.played, 3);
    assert_eq!(manager.source().remaining(), 0);
    assert_eq!(ladder.result_entries().len(), 3);
    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(&list_path).unwrap()).unwrap();
    assert_eq!(saved["Matchups"], serde_json::json!([]));
}

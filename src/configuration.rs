//! Config for the ladder behaviors
//!
//! Configuration comes from a JSON document (by convention `LadderManager.json`) holding flat
//! string keys and a few string arrays. [`ConfigStore`] gives raw access to it, and
//! [`Configuration`] is the typed view used by the match loop.
//!
//! ```json
//! {
//!     "ResultsLogFile": "results.json",
//!     "BaseBotDirectory": "bots",
//!     "BotInfoLocation": "bots.json",
//!     "MaxEloDiff": "200",
//!     "MatchupListFile": "matchups.json",
//!     "MatchupGenerator": "Full",
//!     "Maps": ["InterloperLE.SC2Map", "AcropolisLE.SC2Map"]
//! }
//! ```
//!
//! A missing key reads as an empty string, which means "feature disabled" for every optional
//! path or address.
//!
//! # Environment Variables
//!
//! - `LADDER_VERBOSE` — Print progress to stdout (default: `true`)
//! - `LADDER_LOG` — Enable logging to a file (default: `false`)

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde_json::{Map, Value};

/// Raw key-value and key-array lookups over the ladder config document.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    values: Map<String, Value>,
}

impl ConfigStore {
    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parse a JSON config document. The top level must be an object.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        match serde_json::from_str(text)? {
            Value::Object(values) => Ok(Self { values }),
            other => anyhow::bail!("expected a JSON object, found {other}"),
        }
    }

    /// Set a single key, mostly useful to build a store in code.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.to_owned(), value.into());
        self
    }

    /// String value of `key`. Numbers and booleans are rendered as text, anything else
    /// (including a missing key) is `""`.
    pub fn get_value(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    /// String array under `key`, empty when missing.
    pub fn get_array(&self, key: &str) -> Vec<String> {
        let Some(Value::Array(items)) = self.values.get(key) else {
            return vec![];
        };
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect()
    }
}

/// Typed ladder configuration.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) enable_replay_upload: bool,
    pub(crate) results_log_file: Option<PathBuf>,
    pub(crate) server_username: String,
    pub(crate) server_password: String,
    pub(crate) enable_server_login: bool,
    pub(crate) server_login_address: String,
    pub(crate) bot_info_location: Option<PathBuf>,
    pub(crate) max_elo_diff: i32,
    pub(crate) base_bot_directory: PathBuf,
    pub(crate) bot_download_path: Option<String>,
    pub(crate) bot_upload_path: Option<String>,
    pub(crate) upload_result_location: String,
    pub(crate) local_replay_directory: PathBuf,
    pub(crate) matchup_list_file: Option<PathBuf>,
    pub(crate) matchup_generator: String,
    pub(crate) error_list_file: Option<PathBuf>,
    pub(crate) maps: Vec<String>,
    pub(crate) replay_extension: String,
    pub(crate) upload_settle: Duration,
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Configuration {
    /// Create a configuration with every optional feature disabled.
    ///
    /// Agents are looked up in `./bots`, progress is printed to stdout and nothing is logged to
    /// file.
    pub fn new() -> Self {
        Self {
            verbose: true,
            log: false,
            enable_replay_upload: false,
            results_log_file: None,
            server_username: String::new(),
            server_password: String::new(),
            enable_server_login: false,
            server_login_address: String::new(),
            bot_info_location: None,
            max_elo_diff: 0,
            base_bot_directory: PathBuf::from("bots"),
            bot_download_path: None,
            bot_upload_path: None,
            upload_result_location: String::new(),
            local_replay_directory: PathBuf::new(),
            matchup_list_file: None,
            matchup_generator: String::new(),
            error_list_file: None,
            maps: vec![],
            replay_extension: "Sc2Replay".to_owned(),
            upload_settle: Duration::from_secs(1),
        }
    }

    /// Load a JSON config file, then apply environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let store = ConfigStore::load(path)?;
        Ok(Self::from_store(&store)?.with_env_flags())
    }

    /// Build the typed view of a [`ConfigStore`].
    ///
    /// # Errors
    /// Returned when `MaxEloDiff` or `UploadSettleSecs` is set but is not an integer.
    pub fn from_store(store: &ConfigStore) -> anyhow::Result<Self> {
        let mut config = Self::new();

        config.enable_replay_upload = store.get_value("EnableReplayUpload") == "True";
        config.results_log_file = non_empty(store.get_value("ResultsLogFile")).map(PathBuf::from);
        config.server_username = store.get_value("ServerUsername");
        config.server_password = store.get_value("ServerPassword");
        if store.get_value("EnableServerLogin") == "True" {
            config.enable_server_login = true;
            config.server_login_address = store.get_value("ServerLoginAddress");
        }
        config.bot_info_location = non_empty(store.get_value("BotInfoLocation")).map(PathBuf::from);

        let max_elo_diff = store.get_value("MaxEloDiff");
        if !max_elo_diff.is_empty() {
            config.max_elo_diff = max_elo_diff
                .trim()
                .parse()
                .with_context(|| format!("MaxEloDiff is not an integer: '{max_elo_diff}'"))?;
        }

        if let Some(dir) = non_empty(store.get_value("BaseBotDirectory")) {
            config.base_bot_directory = PathBuf::from(dir);
        }
        config.bot_download_path = non_empty(store.get_value("BotDownloadPath"));
        config.bot_upload_path = non_empty(store.get_value("BotUploadPath"));
        config.upload_result_location = store.get_value("UploadResultLocation");
        config.local_replay_directory = PathBuf::from(store.get_value("LocalReplayDirectory"));
        config.matchup_list_file = non_empty(store.get_value("MatchupListFile")).map(PathBuf::from);
        config.matchup_generator = store.get_value("MatchupGenerator");
        config.error_list_file = non_empty(store.get_value("ErrorListFile")).map(PathBuf::from);
        config.maps = store.get_array("Maps");

        if let Some(ext) = non_empty(store.get_value("ReplayExtension")) {
            config.replay_extension = ext;
        }
        let settle = store.get_value("UploadSettleSecs");
        if !settle.is_empty() {
            let secs: u64 = settle
                .trim()
                .parse()
                .with_context(|| format!("UploadSettleSecs is not an integer: '{settle}'"))?;
            config.upload_settle = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Override `verbose` and `log` from `LADDER_VERBOSE` / `LADDER_LOG`.
    ///
    /// Any value other than `"true"` (case-insensitive) disables the flag; unset variables leave
    /// the current value untouched.
    pub fn with_env_flags(mut self) -> Self {
        fn get_env_flag(var: &str, current: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => current,
            }
        }

        self.verbose = get_env_flag("LADDER_VERBOSE", self.verbose);
        self.log = get_env_flag("LADDER_LOG", self.log);
        self
    }

    /// Enable or disable console output.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Where match results are merged. `None` disables result logging.
    pub fn with_results_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.results_log_file = path;
        self
    }

    /// Where network failures and aborted matchups are appended. `None` disables it.
    pub fn with_error_list_file(mut self, path: Option<PathBuf>) -> Self {
        self.error_list_file = path;
        self
    }

    /// Directory holding one sub-directory per agent.
    pub fn with_base_bot_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_bot_directory = path.into();
        self
    }

    /// Agent metadata file (enabled flag, skill rating, ...).
    pub fn with_bot_info_location(mut self, path: Option<PathBuf>) -> Self {
        self.bot_info_location = path;
        self
    }

    /// Endpoint agents are downloaded from. `None` means agents are already on disk.
    pub fn with_bot_download_path(mut self, url: Option<String>) -> Self {
        self.bot_download_path = url;
        self
    }

    /// Endpoint agents are uploaded back to after a valid match. `None` disables it.
    pub fn with_bot_upload_path(mut self, url: Option<String>) -> Self {
        self.bot_upload_path = url;
        self
    }

    /// Credentials sent along every remote request.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.server_username = username.to_owned();
        self.server_password = password.to_owned();
        self
    }

    /// Log in once at start-up against `address`.
    pub fn with_server_login(mut self, address: Option<String>) -> Self {
        self.enable_server_login = address.is_some();
        self.server_login_address = address.unwrap_or_default();
        self
    }

    /// Submit replays to `address` after every match. `None` disables it.
    pub fn with_replay_upload(mut self, address: Option<String>, replay_dir: PathBuf) -> Self {
        self.enable_replay_upload = address.is_some();
        self.upload_result_location = address.unwrap_or_default();
        self.local_replay_directory = replay_dir;
        self
    }

    /// Maximum allowed skill rating gap between paired agents. `0` disables the check.
    pub fn with_max_elo_diff(mut self, value: i32) -> Self {
        self.max_elo_diff = value;
        self
    }

    /// Maps used when generating matchups.
    pub fn with_maps(mut self, maps: Vec<String>) -> Self {
        self.maps = maps;
        self
    }

    /// Matchup list file and the generator used when it is empty.
    pub fn with_matchup_list(mut self, path: Option<PathBuf>, generator: &str) -> Self {
        self.matchup_list_file = path;
        self.matchup_generator = generator.to_owned();
        self
    }

    /// Pause between a successful upload and the cleanup of the local copy.
    pub fn with_upload_settle(mut self, value: Duration) -> Self {
        self.upload_settle = value;
        self
    }

    /// Maps listed in the configuration.
    pub fn maps(&self) -> &[String] {
        &self.maps
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

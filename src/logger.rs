//! File logging and operator console output.

use std::{
    fs::File,
    io::Write,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use time::{
    format_description::{self, parse},
    OffsetDateTime,
};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Install a global subscriber writing every event to a timestamped log file.
///
/// Fails without creating the file when a global subscriber is already installed.
pub fn init_logger() -> anyhow::Result<()> {
    anyhow::ensure!(
        !tracing::dispatcher::has_been_set(),
        "a global tracing subscriber is already set"
    );
    let file_name = get_log_file_name()?;
    let file = File::create(&file_name).with_context(|| format!("cannot create {file_name}"))?;
    let writer = BoxMakeWriter::new(file);
    let local_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")?,
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).context(
        "could not set global default tracing subscriber, consider disabling logs if you are already setting a subscriber",
    )
}

fn get_log_file_name() -> anyhow::Result<String> {
    let format = parse("[year]-[month]-[day]_[hour]:[minute]:[second]_ladder_log.txt")?;
    Ok(now().format(&format)?)
}

/// Local time when the offset can be determined, UTC otherwise.
pub(crate) fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Process-wide operator output.
///
/// Every component that talks to the operator holds a clone of the same `Console`; lines from
/// different threads never interleave because each one is written under a single lock.
#[derive(Clone)]
pub struct Console {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
    enabled: bool,
}

impl Console {
    /// Console printing to stdout.
    pub fn stdout(enabled: bool) -> Self {
        Self::with_writer(Box::new(std::io::stdout()), enabled)
    }

    /// Console printing to an arbitrary writer (a file, a shared buffer in tests, ...).
    pub fn with_writer(writer: Box<dyn Write + Send>, enabled: bool) -> Self {
        Self {
            sink: Arc::new(Mutex::new(writer)),
            enabled,
        }
    }

    /// Console that drops everything.
    pub fn silent() -> Self {
        Self::with_writer(Box::new(std::io::sink()), false)
    }

    /// Write one line. Errors on the underlying writer are ignored.
    pub fn line(&self, msg: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        // a poisoned sink still holds a usable writer
        let mut guard = match self.sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(guard, "{}", msg.as_ref());
        let _ = guard.flush();
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

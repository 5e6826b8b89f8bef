//! Packing agent directories and checking their integrity.

use std::{
    io::Read,
    path::Path,
    process::{Command, Stdio},
};

use anyhow::{bail, Context};
use sha2::{Digest, Sha256};
use tracing::{error, instrument};

/// Turns a directory tree into a single archive file and back.
pub trait Archiver {
    /// Pack the content of `source_dir` (not the directory itself) into `archive`, replacing any
    /// existing file.
    fn pack(&self, source_dir: &Path, archive: &Path) -> anyhow::Result<()>;

    /// Unpack `archive` into `dest_dir`, creating it if needed and overwriting existing files.
    fn unpack(&self, archive: &Path, dest_dir: &Path) -> anyhow::Result<()>;
}

/// [`Archiver`] running the `zip` and `unzip` commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandArchiver;

impl Archiver for CommandArchiver {
    #[instrument(skip(self))]
    fn pack(&self, source_dir: &Path, archive: &Path) -> anyhow::Result<()> {
        let archive = std::path::absolute(archive)?;
        // zip adds to an existing archive instead of replacing it
        match std::fs::remove_file(&archive) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                return Err(e).with_context(|| format!("cannot remove {}", archive.display()));
            }
            _ => {}
        }
        let output = Command::new("zip")
            .args(["-r", "-q"])
            .arg(&archive)
            .arg(".")
            .current_dir(source_dir)
            .stdin(Stdio::null())
            .output()
            .context("could not launch command 'zip'")?;
        check_status("zip", &output)
    }

    #[instrument(skip(self))]
    fn unpack(&self, archive: &Path, dest_dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dest_dir)
            .with_context(|| format!("cannot create {}", dest_dir.display()))?;
        let output = Command::new("unzip")
            .args(["-o", "-q"])
            .arg(archive)
            .arg("-d")
            .arg(dest_dir)
            .stdin(Stdio::null())
            .output()
            .context("could not launch command 'unzip'")?;
        check_status("unzip", &output)
    }
}

fn check_status(command: &str, output: &std::process::Output) -> anyhow::Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    error!("{command} error: {stderr}");
    bail!(
        "{command} failed ({}): {}",
        output.status,
        stderr.lines().next().unwrap_or_default()
    )
}

/// Lowercase hex SHA-256 of a file's content.
pub fn checksum_file(path: &Path) -> anyhow::Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("cannot open {} for checksum", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Lowercase hex SHA-256 of a byte slice.
pub fn checksum_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

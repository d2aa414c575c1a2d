//! Tracing setup: stderr plus an append-mode log file, rotated by size.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use groupsync_core::config::{self, LoggingConfig};

/// Maximum log file size before rotation (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum number of rotated copies kept next to the live log.
pub const MAX_ROTATED_FILES: usize = 5;

const LOG_FILE: &str = "groupsync.log";

pub fn log_path(home: &Path, logging: &LoggingConfig) -> PathBuf {
    logging
        .file
        .clone()
        .unwrap_or_else(|| config::logs_dir_at(home).join(LOG_FILE))
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
pub fn init(home: &Path, logging: &LoggingConfig) -> Result<()> {
    let path = log_path(home, logging);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create log directory {}", dir.display()))?;
    }
    let rotated = rotate_if_needed(&path, MAX_LOG_BYTES, MAX_ROTATED_FILES)
        .with_context(|| format!("cannot rotate {}", path.display()))?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init();

    if rotated {
        tracing::info!(path = %path.display(), "log file rotated");
    }
    Ok(())
}

/// Rotate `log_path` once it reaches `max_bytes`:
/// `<name>.<max_files>` is dropped, `<name>.<n>` moves to `<name>.<n+1>`,
/// and the live file becomes `<name>.1`.
///
/// Returns `true` when a rotation happened. A missing log is not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, numbered_path(log_path, 1))?;
    Ok(true)
}

fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(LOG_FILE);
    base.with_file_name(format!("{name}.{n}"))
}

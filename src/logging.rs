use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LogSettings;

/// Installs the global subscriber: stdout plus an append-mode log file.
/// `RUST_LOG` takes precedence over `log.level`.
///
/// # Errors
/// Returns error if the log file cannot be opened or a subscriber is already set.
pub fn init(settings: &LogSettings) -> Result<()> {
    rotate(&settings.file, settings.max_bytes, settings.backups)?;
    if let Some(parent) = settings.file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log dir {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.file)
        .with_context(|| format!("Failed to open log file {}", settings.file.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .with_context(|| format!("Invalid log level: {}", settings.level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .context("Failed to install tracing subscriber")
}

/// Shifts `file` to `file.1` (and older backups up by one) once it exceeds
/// `max_bytes`. With zero backups the file is simply removed.
///
/// # Errors
/// Returns error if a rename or removal fails.
pub fn rotate(file: &Path, max_bytes: u64, backups: u32) -> Result<()> {
    let size = match std::fs::metadata(file) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(()),
    };
    if size <= max_bytes {
        return Ok(());
    }
    if backups == 0 {
        return std::fs::remove_file(file)
            .with_context(|| format!("Failed to remove {}", file.display()));
    }
    for index in (1..backups).rev() {
        let from = backup_path(file, index);
        if from.exists() {
            let to = backup_path(file, index + 1);
            std::fs::rename(&from, &to)
                .with_context(|| format!("Failed to rotate {}", from.display()))?;
        }
    }
    std::fs::rename(file, backup_path(file, 1))
        .with_context(|| format!("Failed to rotate {}", file.display()))
}

fn backup_path(file: &Path, index: u32) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

//! Logging setup
//!
//! Console logger by default, rolling file logger with `--log-file`.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_PREFIX: &str = "app.log";

/// Log directory (next to EXE)
fn get_log_dir() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return exe_dir.join("logs");
        }
    }
    // Fallback: current working directory
    PathBuf::from(".").join("logs")
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes the console logger
pub fn init_console_logger() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(env_filter())
        .try_init()?;

    Ok(())
}

/// Initializes the file logger (daily app.log, newest two kept)
pub fn init_file_logger() -> Result<PathBuf> {
    let log_dir = get_log_dir();
    fs::create_dir_all(&log_dir)?;

    let removed = cleanup_old_logs(&log_dir, 2, LOG_FILE_PREFIX);

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Guard must stay alive for the whole run
    Box::leak(Box::new(guard));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(false)
                .with_ansi(false),
        )
        .with(env_filter())
        .try_init()?;

    for path in removed {
        info!("Old log file deleted: {}", path.display());
    }

    Ok(log_dir)
}

/// Deletes old log files with the prefix, keeps the newest `keep_count`
fn cleanup_old_logs(log_dir: &Path, keep_count: usize, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return Vec::new();
    };

    let mut log_files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(prefix))
        })
        .collect();

    // Newest first
    log_files.sort_by(|a, b| {
        let time_a = a.metadata().and_then(|m| m.modified()).ok();
        let time_b = b.metadata().and_then(|m| m.modified()).ok();
        time_b.cmp(&time_a)
    });

    let mut removed = Vec::new();
    for old_file in log_files.iter().skip(keep_count) {
        let path = old_file.path();
        match fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(e) => error!("Could not delete old log file {}: {}", path.display(), e),
        }
    }
    removed
}

//! File logging for the CLI and the TUI.
//!
//! Everything goes to rotating files under `<data_dir>/logs`; the terminal is
//! never written to. The first logger started in a process stays for its
//! lifetime.

use std::path::{Path, PathBuf};

use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::LevelFilter;
use once_cell::sync::OnceCell;

/// Environment override for the configured level
pub const LOG_LEVEL_ENV: &str = "TM_LOG";

const ROTATE_AT_BYTES: u64 = 2 * 1024 * 1024;
const KEEP_ROTATED: usize = 4;

static ACTIVE: OnceCell<ActiveLog> = OnceCell::new();

/// The running logger. Output stops if the handle is dropped.
struct ActiveLog {
    level: LevelFilter,
    dir: PathBuf,
    _handle: LoggerHandle,
}

#[derive(Debug, thiserror::Error)]
pub enum LogInitError {
    #[error("unknown log level {0:?} (use off, error, warn, info, debug or trace)")]
    Level(String),
    #[error("log directory {path}: {source}")]
    Dir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Logger(#[from] flexi_logger::FlexiLoggerError),
}

pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// Level name from config or `TM_LOG`. `warning` and `none` are aliases.
pub fn parse_level(name: &str) -> Result<LevelFilter, LogInitError> {
    let lowered = name.trim().to_ascii_lowercase();
    let canonical = match lowered.as_str() {
        "warning" => "warn",
        "none" => "off",
        other => other,
    };
    canonical
        .parse()
        .map_err(|_| LogInitError::Level(name.to_string()))
}

/// A non-empty `TM_LOG` wins over the configured level
pub fn effective_level(configured: &str, env: Option<&str>) -> String {
    match env.map(str::trim) {
        Some(level) if !level.is_empty() => level.to_string(),
        _ => configured.to_string(),
    }
}

/// Start logging into `dir`. Later calls leave the running logger alone.
pub fn init_logging(level: &str, dir: &Path) -> Result<(), LogInitError> {
    let level = parse_level(level)?;
    let active = ACTIVE.get_or_try_init(|| start(level, dir))?;
    if active.dir != dir {
        log::debug!(
            "logger already running dir={} requested={}",
            active.dir.display(),
            dir.display()
        );
    }
    Ok(())
}

fn start(level: LevelFilter, dir: &Path) -> Result<ActiveLog, LogInitError> {
    std::fs::create_dir_all(dir).map_err(|source| LogInitError::Dir {
        path: dir.to_path_buf(),
        source,
    })?;

    let spec = LogSpecification::builder().default(level).build();
    let handle = Logger::with(spec)
        .log_to_file(FileSpec::default().directory(dir).basename("taskmaster"))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(KEEP_ROTATED),
        )
        .write_mode(WriteMode::Direct)
        .append()
        .format_for_files(flexi_logger::opt_format)
        .start()?;

    log::info!(
        "logging started level={} pid={} version={}",
        level,
        std::process::id(),
        env!("CARGO_PKG_VERSION")
    );
    Ok(ActiveLog {
        level,
        dir: dir.to_path_buf(),
        _handle: handle,
    })
}

/// Level and directory of the running logger
pub fn active_log() -> Option<(LevelFilter, &'static Path)> {
    ACTIVE.get().map(|active| (active.level, active.dir.as_path()))
}

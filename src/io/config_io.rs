use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::Config;

/// Environment override for the data directory
pub const DATA_DIR_ENV: &str = "TM_DATA_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

const DEFAULT_CONFIG: &str = r##"# taskmaster configuration. Every key is optional.

[store]
# Where tasks.json, the recovery log and logs live.
# Default: $XDG_DATA_HOME/taskmaster (or ~/.local/share/taskmaster)
# dir = "~/tasks"

[alerts]
# Ring the terminal bell once per batch of alerts
sound = true
# Raise a desktop notification per alert
desktop = true

[clock]
# Scan period in milliseconds
tick_ms = 1000

[log]
# trace | debug | info | warn | error (TM_LOG overrides)
level = "info"

[ui.colors]
# background = "#0C001B"
# text = "#B0AAFF"
# text_bright = "#FFFFFF"
# highlight = "#FB4196"
# dim = "#7D78BF"
# selection_bg = "#3D1438"
# selection_border = "#FB4196"
# late = "#FF4444"
# done = "#44FF88"
# running = "#FFD700"
"##;

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

fn xdg_dir(var: &str, fallback: &[&str]) -> PathBuf {
    match std::env::var(var) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => fallback.iter().fold(home_dir(), |p, part| p.join(part)),
    }
}

/// `$XDG_CONFIG_HOME/taskmaster/config.toml`
pub fn config_path() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"])
        .join("taskmaster")
        .join("config.toml")
}

/// Read a config file. A missing file is the default config; anything
/// unreadable or invalid is an error (the file is user-authored).
pub fn read_config_from(path: &Path) -> Result<Config, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_config() -> Result<Config, ConfigError> {
    read_config_from(&config_path())
}

/// Write the commented default config. Returns `false` (and leaves the
/// file alone) when it already exists.
pub fn write_default_config(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)
    };
    write().map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}

/// Data directory, first match wins: `--data-dir`, `TM_DATA_DIR`,
/// `[store] dir`, `$XDG_DATA_HOME/taskmaster`.
pub fn resolve_data_dir(flag: Option<&Path>, config: &Config) -> PathBuf {
    let env = std::env::var(DATA_DIR_ENV).ok().filter(|s| !s.is_empty());
    resolve_data_dir_from(
        flag,
        env.as_deref(),
        config,
        &xdg_dir("XDG_DATA_HOME", &[".local", "share"]),
    )
}

fn resolve_data_dir_from(
    flag: Option<&Path>,
    env: Option<&str>,
    config: &Config,
    data_home: &Path,
) -> PathBuf {
    if let Some(dir) = flag {
        return dir.to_path_buf();
    }
    if let Some(dir) = env {
        return expand_tilde(dir);
    }
    if let Some(dir) = config.store.dir.as_deref() {
        return expand_tilde(dir);
    }
    data_home.join("taskmaster")
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None if path == "~" => home_dir(),
        None => PathBuf::from(path),
    }
}

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::io::alert::AlertDispatcher;
use crate::io::config_io::{self, ConfigError};
use crate::io::lock::{LockError, StoreLock};
use crate::io::recovery::RecoveryLog;
use crate::io::session::Session;
use crate::io::store::FileStore;
use crate::logging;
use crate::model::config::Config;

/// Resolved configuration and data directory for one process
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub data_dir: PathBuf,
}

impl Context {
    /// Read the config file, resolve the data directory and start file
    /// logging. Logging failures are reported on stderr and otherwise ignored.
    pub fn load(data_dir_flag: Option<&Path>) -> Result<Self, ConfigError> {
        let config = config_io::read_config()?;
        let data_dir = config_io::resolve_data_dir(data_dir_flag, &config);
        let ctx = Context { config, data_dir };

        let env_level = std::env::var(logging::LOG_LEVEL_ENV).ok();
        let level = logging::effective_level(&ctx.config.log.level, env_level.as_deref());
        if let Err(e) = logging::init_logging(&level, &logging::log_dir(&ctx.data_dir)) {
            eprintln!("warning: logging disabled: {}", e);
        }
        Ok(ctx)
    }

    pub fn lock(&self) -> Result<StoreLock, LockError> {
        StoreLock::acquire_default(&self.data_dir)
    }

    pub fn store(&self) -> FileStore {
        FileStore::new(&self.data_dir)
    }

    pub fn recovery(&self) -> RecoveryLog {
        RecoveryLog::in_dir(&self.data_dir)
    }

    /// Load the task tree. Call with the lock held.
    pub fn open_session(&self, now: DateTime<Utc>) -> Session<FileStore> {
        Session::open(self.store(), Some(&self.data_dir), now)
    }

    /// Load the task tree for a read-only command. Never writes.
    pub fn view_session(&self, now: DateTime<Utc>) -> Session<FileStore> {
        Session::open_read_only(self.store(), now)
    }

    pub fn dispatcher(&self) -> AlertDispatcher {
        AlertDispatcher::from_config(&self.config.alerts)
    }
}

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How long a writer waits for another `tm` process before giving up
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const LOCK_FILE: &str = ".lock";

/// Exclusive advisory lock on the data directory.
///
/// Held for the duration of a load-mutate-save cycle so the CLI and a running
/// TUI never interleave writes to the task store. Released on drop.
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
    path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("timed out waiting for {path}: another tm process is writing")]
    Timeout { path: PathBuf },
}

impl StoreLock {
    pub fn acquire(dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILE);
        let open = || -> std::io::Result<File> {
            std::fs::create_dir_all(dir)?;
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&path)
        };
        let file = open().map_err(|source| LockError::Open {
            path: path.clone(),
            source,
        })?;

        let deadline = Instant::now() + timeout;
        while try_lock(&file).is_err() {
            if Instant::now() >= deadline {
                log::warn!("lock timeout path={}", path.display());
                return Err(LockError::Timeout { path });
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(StoreLock { _file: file, path })
    }

    pub fn acquire_default(dir: &Path) -> Result<Self, LockError> {
        Self::acquire(dir, DEFAULT_TIMEOUT)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> std::io::Result<()> {
    Ok(())
}

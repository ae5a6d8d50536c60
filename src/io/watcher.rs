use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Watches the data directory for rewrites of the task store by other
/// processes.
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<PathBuf>,
}

impl StoreWatcher {
    /// Watch `dir` for changes to `file` (e.g. `tasks.json`). Drain with
    /// [`StoreWatcher::changed`] once per loop iteration.
    pub fn start(dir: &Path, file: &str) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let target = dir.join(file);

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        log::debug!("watch error error={}", e);
                        return;
                    }
                };
                if !is_content_change(&event.kind) {
                    return;
                }
                for path in event.paths {
                    if is_target(&path, &target) {
                        let _ = tx.send(path);
                    }
                }
            },
            Config::default(),
        )?;

        std::fs::create_dir_all(dir).map_err(notify::Error::io)?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        Ok(StoreWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// True when at least one change arrived since the last call
    pub fn changed(&self) -> bool {
        let mut any = false;
        while self.rx.try_recv().is_ok() {
            any = true;
        }
        any
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Temp files from atomic writes, the lock file and UI state all live next
/// to the store; only the store file itself matters.
fn is_target(path: &Path, target: &Path) -> bool {
    path == target || (path.file_name() == target.file_name() && path.parent() == target.parent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    #[test]
    fn test_only_store_file_is_relevant() {
        let target = Path::new("/data/tm/tasks.json");
        assert!(is_target(Path::new("/data/tm/tasks.json"), target));
        assert!(!is_target(Path::new("/data/tm/.tmpA1b2C3"), target));
        assert!(!is_target(Path::new("/data/tm/.lock"), target));
        assert!(!is_target(Path::new("/data/tm/.state.json"), target));
        assert!(!is_target(Path::new("/elsewhere/tasks.json"), target));
    }

    #[test]
    fn test_access_events_ignored() {
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Any)));
    }
}

//! Key-value persistence for the task tree.
//!
//! A store holds opaque JSON strings under string keys. Decoding and the
//! fallback-on-corruption policy live here too, so every caller loads the
//! same way.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::model::task::Task;

/// Key the task tree is stored under
pub const TASKS_KEY: &str = "tasks";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    /// `escaped` is the file content with non-ASCII bytes as `\xNN`
    #[error("{path} is not valid UTF-8")]
    NotUtf8 { path: PathBuf, escaped: String },
    #[error("could not write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("write to {0:?} rejected")]
    Rejected(String),
}

impl StoreError {
    /// Whatever could be salvaged of the stored value
    pub fn raw_content(&self) -> Option<&str> {
        match self {
            StoreError::NotUtf8 { escaped, .. } => Some(escaped.as_str()),
            _ => None,
        }
    }
}

pub trait KeyValueStore {
    /// Raw value for `key`, `None` when nothing was ever stored
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// File store
// ---------------------------------------------------------------------------

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        String::from_utf8(bytes).map(Some).map_err(|e| StoreError::NotUtf8 {
            path,
            escaped: e.as_bytes().escape_ascii().to_string(),
        })
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        atomic_write(&path, value.as_bytes()).map_err(|source| StoreError::Write { path, source })
    }
}

/// Write `content` to `path` via a temp file in the same directory and a
/// rename, creating the directory if needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    /// Make every subsequent `set` fail
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Rejected(key.to_string()));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading with read-repair
// ---------------------------------------------------------------------------

/// Content that could not be used and was replaced by the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    /// What was stored, when it could be read at all
    pub raw: Option<String>,
    pub reason: String,
}

#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub repaired: Option<Repair>,
}

/// Load and decode `key`, falling back to `default` when the value is absent,
/// blank, unreadable or fails to decode. Never fails.
pub fn load_with<S, T, E, F>(store: &S, key: &str, default: T, decode: F) -> Loaded<T>
where
    S: KeyValueStore + ?Sized,
    E: std::fmt::Display,
    F: FnOnce(&str) -> Result<T, E>,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) if !raw.trim().is_empty() => raw,
        Ok(_) => {
            return Loaded {
                value: default,
                repaired: None,
            };
        }
        Err(e) => {
            return Loaded {
                value: default,
                repaired: Some(Repair {
                    raw: e.raw_content().map(str::to_string),
                    reason: e.to_string(),
                }),
            };
        }
    };

    match decode(&raw) {
        Ok(value) => Loaded {
            value,
            repaired: None,
        },
        Err(e) => Loaded {
            value: default,
            repaired: Some(Repair {
                raw: Some(raw),
                reason: e.to_string(),
            }),
        },
    }
}

pub fn load_or_default<S, T>(store: &S, key: &str, default: T) -> Loaded<T>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    load_with(store, key, default, |raw: &str| serde_json::from_str::<T>(raw))
}

// ---------------------------------------------------------------------------
// Tree decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    pub tasks: Vec<Task>,
    /// Converted from the single-deadline schema, should be written back
    pub migrated: bool,
}

/// Single-deadline record: one `dueDate` and one `notified` latch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTask {
    id: String,
    text: String,
    due_date: DateTime<Utc>,
    #[serde(default)]
    is_completed: bool,
    #[serde(default)]
    notified: bool,
    #[serde(default)]
    subtasks: Vec<LegacyTask>,
}

impl LegacyTask {
    fn migrate(self, now: DateTime<Utc>) -> Task {
        let start_time = now.min(self.due_date - Duration::seconds(1));
        Task {
            id: self.id,
            text: self.text,
            start_time,
            end_time: self.due_date,
            is_completed: self.is_completed,
            // There never was a start boundary to announce
            start_notified: true,
            end_notified: self.notified,
            notifications_enabled: true,
            subtasks: self
                .subtasks
                .into_iter()
                .map(|t| t.migrate(now))
                .collect(),
        }
    }
}

/// Decode a stored tree. The current schema wins; single-deadline data is
/// migrated; otherwise the current schema's error is returned.
pub fn decode_tree(raw: &str, now: DateTime<Utc>) -> Result<Decoded, serde_json::Error> {
    match serde_json::from_str::<Vec<Task>>(raw) {
        Ok(tasks) => Ok(Decoded {
            tasks,
            migrated: false,
        }),
        Err(err) => match serde_json::from_str::<Vec<LegacyTask>>(raw) {
            Ok(legacy) => Ok(Decoded {
                tasks: legacy.into_iter().map(|t| t.migrate(now)).collect(),
                migrated: true,
            }),
            Err(_) => Err(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_file_store_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut store = FileStore::new(tmp.path().join("data"));
        assert_eq!(store.get(TASKS_KEY).unwrap(), None);

        store.set(TASKS_KEY, "[]").unwrap();
        assert_eq!(store.get(TASKS_KEY).unwrap().as_deref(), Some("[]"));
        assert!(tmp.path().join("data/tasks.json").exists());

        store.set(TASKS_KEY, "[1]").unwrap();
        assert_eq!(store.get(TASKS_KEY).unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn test_memory_store_forced_failure() {
        let mut store = MemoryStore::new();
        store.set("k", "v").unwrap();
        store.set_fail_writes(true);
        assert!(matches!(store.set("k", "w"), Err(StoreError::Rejected(_))));
        assert_eq!(store.raw("k"), Some("v"));
    }

    #[test]
    fn test_load_or_default_absent_and_blank() {
        let store = MemoryStore::new().with("blank", "  \n");
        let loaded = load_or_default(&store, "missing", vec![7u32]);
        assert_eq!(loaded.value, vec![7]);
        assert!(loaded.repaired.is_none());

        let loaded = load_or_default(&store, "blank", Vec::<u32>::new());
        assert!(loaded.value.is_empty());
        assert!(loaded.repaired.is_none());
    }

    #[test]
    fn test_load_or_default_corrupt() {
        let store = MemoryStore::new().with("k", "{not json");
        let loaded = load_or_default(&store, "k", Vec::<u32>::new());
        assert!(loaded.value.is_empty());
        let repair = loaded.repaired.unwrap();
        assert_eq!(repair.raw.as_deref(), Some("{not json"));
        assert!(!repair.reason.is_empty());
    }

    #[test]
    fn test_load_unreadable_file() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should be makes the read fail
        std::fs::create_dir_all(tmp.path().join("tasks.json")).unwrap();
        let store = FileStore::new(tmp.path());
        let loaded = load_or_default(&store, TASKS_KEY, Vec::<Task>::new());
        assert!(loaded.value.is_empty());
        assert_eq!(loaded.repaired.unwrap().raw, None);
    }

    #[test]
    fn test_load_non_utf8_file_keeps_bytes() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("tasks.json"), b"[{\"text\":\"caf\xe9\"}]").unwrap();
        let store = FileStore::new(tmp.path());
        assert!(matches!(store.get(TASKS_KEY), Err(StoreError::NotUtf8 { .. })));

        let loaded = load_or_default(&store, TASKS_KEY, Vec::<Task>::new());
        assert!(loaded.value.is_empty());
        let repair = loaded.repaired.unwrap();
        assert_eq!(repair.raw.as_deref(), Some(r#"[{\"text\":\"caf\xe9\"}]"#));
        assert!(repair.reason.contains("not valid UTF-8"));
    }

    #[test]
    fn test_decode_current_schema() {
        let raw = r#"[{"id":"a","text":"t","startTime":"2025-05-01T10:00:00Z",
            "endTime":"2025-05-01T11:00:00Z","endNotified":true}]"#;
        let decoded = decode_tree(raw, now()).unwrap();
        assert!(!decoded.migrated);
        assert!(decoded.tasks[0].end_notified);
        assert!(decoded.tasks[0].notifications_enabled);
    }

    #[test]
    fn test_decode_legacy_schema() {
        let raw = r#"[
            {"id":"p","text":"Parent","dueDate":"2025-06-01T00:00:00.000Z",
             "isCompleted":false,"notified":false,"subtasks":[
                {"id":"c","text":"Child","dueDate":"2025-04-01T00:00:00.000Z",
                 "isCompleted":true,"notified":true,"subtasks":[]}
             ]}
        ]"#;
        let decoded = decode_tree(raw, now()).unwrap();
        assert!(decoded.migrated);

        let parent = &decoded.tasks[0];
        assert_eq!(parent.end_time, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(parent.start_time, now());
        assert!(parent.start_notified);
        assert!(!parent.end_notified);
        assert!(parent.notifications_enabled);

        let child = &parent.subtasks[0];
        assert_eq!(child.id, "c");
        assert!(child.is_completed);
        assert!(child.end_notified);
        assert_eq!(child.start_time, child.end_time - Duration::seconds(1));
    }

    #[test]
    fn test_decode_garbage_reports_error() {
        assert!(decode_tree("{\"tasks\": 1}", now()).is_err());
        assert!(decode_tree("[{\"id\":\"x\"}]", now()).is_err());
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/file.json");
        atomic_write(&path, b"hello").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        atomic_write(&path, b"bye").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "bye");
    }
}

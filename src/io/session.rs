use std::path::Path;

use chrono::{DateTime, Utc};

use crate::io::alert::AlertDispatcher;
use crate::io::recovery::{RecoveryCategory, RecoveryEntry, RecoveryLog};
use crate::io::store::{self, Decoded, KeyValueStore, Repair, TASKS_KEY};
use crate::model::task::{Task, TaskStats};
use crate::ops::scan::{self, AlertEvent};
use crate::ops::task_ops::{self, NewTask, TaskEdit, TaskError};

/// Owner of the authoritative task tree.
///
/// Every mutation goes through here and is persisted immediately when it
/// changed something. A failed write never rolls the tree back: the
/// in-memory state stays authoritative and the unsaved JSON is captured in
/// the recovery log.
pub struct Session<S: KeyValueStore> {
    store: S,
    tasks: Vec<Task>,
    recovery: Option<RecoveryLog>,
    last_save_failed: bool,
    /// Raw store content most recently captured as a `parse` entry
    last_captured: Option<String>,
}

impl<S: KeyValueStore> Session<S> {
    /// Load the tree with read-repair. Corrupt content is captured in the
    /// recovery log and replaced by an empty tree, which is only written back
    /// once the capture succeeded. Single-deadline data is migrated and
    /// written back.
    pub fn open(store: S, recovery_dir: Option<&Path>, now: DateTime<Utc>) -> Self {
        let mut session = Session {
            store,
            tasks: Vec::new(),
            recovery: recovery_dir.map(RecoveryLog::in_dir),
            last_save_failed: false,
            last_captured: None,
        };
        let loaded = session.load(now);
        let Decoded { tasks, migrated } = loaded.value;
        session.tasks = tasks;

        if let Some(repair) = &loaded.repaired {
            if session.capture(repair) {
                session.persist();
            }
        } else if migrated {
            log::info!("migrated single-deadline tasks count={}", session.tasks.len());
            session.persist();
        }
        log::debug!("session opened tasks={}", task_ops::stats(&session.tasks).total);
        session
    }

    /// Load the tree for viewing. Nothing is written back: unusable content
    /// shows as an empty tree and single-deadline data is migrated in memory
    /// only.
    pub fn open_read_only(store: S, now: DateTime<Utc>) -> Self {
        let mut session = Session {
            store,
            tasks: Vec::new(),
            recovery: None,
            last_save_failed: false,
            last_captured: None,
        };
        let loaded = session.load(now);
        if let Some(repair) = &loaded.repaired {
            log::warn!("task store unusable, viewing empty tree reason={}", repair.reason);
        }
        session.tasks = loaded.value.tasks;
        session
    }

    fn load(&self, now: DateTime<Utc>) -> store::Loaded<Decoded> {
        store::load_with(&self.store, TASKS_KEY, Decoded::default(), |raw| {
            store::decode_tree(raw, now)
        })
    }

    /// Record unusable store content as a `parse` entry, once per distinct
    /// content. Returns whether the content is in the recovery log.
    fn capture(&mut self, repair: &Repair) -> bool {
        let Some(raw) = &repair.raw else {
            log::warn!("task store unreadable reason={}", repair.reason);
            return false;
        };
        if self.last_captured.as_ref() == Some(raw) {
            return true;
        }
        log::warn!("task store corrupt reason={}", repair.reason);
        let Some(recovery) = &self.recovery else {
            return false;
        };
        let recorded = recovery.record(
            RecoveryEntry::new(RecoveryCategory::Parse, "unreadable task store")
                .field("Key", TASKS_KEY)
                .field("Reason", repair.reason.clone())
                .body(raw.clone()),
        );
        if recorded {
            self.last_captured = Some(raw.clone());
        }
        recorded
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn stats(&self) -> TaskStats {
        task_ops::stats(&self.tasks)
    }

    /// Whether the most recent save attempt failed
    pub fn last_save_failed(&self) -> bool {
        self.last_save_failed
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub fn add(&mut self, new: NewTask, parent_id: Option<&str>) -> Result<Option<String>, TaskError> {
        let id = task_ops::add_task(&mut self.tasks, new, parent_id)?;
        if let Some(id) = &id {
            log::info!("task added id={} parent={}", id, parent_id.unwrap_or("-"));
            self.persist();
        }
        Ok(id)
    }

    pub fn edit(&mut self, task_id: &str, edit: TaskEdit, now: DateTime<Utc>) -> Result<bool, TaskError> {
        let changed = task_ops::edit_task(&mut self.tasks, task_id, edit, now)?;
        if changed {
            log::info!("task edited id={}", task_id);
            self.persist();
        }
        Ok(changed)
    }

    pub fn toggle_complete(&mut self, task_id: &str) -> bool {
        let changed = task_ops::toggle_complete(&mut self.tasks, task_id);
        if changed {
            log::info!("task completion toggled id={}", task_id);
            self.persist();
        }
        changed
    }

    pub fn toggle_notifications(&mut self, task_id: &str) -> bool {
        let changed = task_ops::toggle_notifications(&mut self.tasks, task_id);
        if changed {
            log::info!("task notifications toggled id={}", task_id);
            self.persist();
        }
        changed
    }

    /// Delete a task and its subtree. The removed subtree is captured in the
    /// recovery log.
    pub fn delete(&mut self, task_id: &str) -> Option<Task> {
        let removed = task_ops::delete_task(&mut self.tasks, task_id)?;
        log::info!("task deleted id={} subtasks={}", removed.id, removed.subtasks.len());
        if let Some(recovery) = &self.recovery {
            let body = serde_json::to_string_pretty(&removed).unwrap_or_default();
            recovery.record(
                RecoveryEntry::new(RecoveryCategory::Delete, format!("task {} deleted", removed.short_id()))
                    .field("Task", removed.id.clone())
                    .field("Text", removed.text.clone())
                    .body(body),
            );
        }
        self.persist();
        Some(removed)
    }

    // -----------------------------------------------------------------------
    // Ticking and reloading
    // -----------------------------------------------------------------------

    /// One notification scan. Persists and dispatches only when something
    /// fired.
    pub fn tick(&mut self, now: DateTime<Utc>, dispatcher: &AlertDispatcher) -> Vec<AlertEvent> {
        let events = scan::scan(&mut self.tasks, now);
        if !events.is_empty() {
            log::debug!("scan fired events={}", events.len());
            self.persist();
            dispatcher.dispatch(&events);
        }
        events
    }

    /// Re-read the store after another process changed it. Returns whether
    /// the tree changed.
    ///
    /// Skipped while the last save failed: the store is behind the
    /// in-memory tree then. Unreadable content leaves the tree alone.
    pub fn reload(&mut self, now: DateTime<Utc>) -> bool {
        if self.last_save_failed {
            return false;
        }
        let loaded = self.load(now);
        if let Some(repair) = &loaded.repaired {
            self.capture(repair);
            return false;
        }
        let Decoded { tasks, migrated } = loaded.value;
        if tasks == self.tasks {
            return false;
        }
        self.tasks = tasks;
        if migrated {
            self.persist();
        }
        log::debug!("session reloaded tasks={}", task_ops::stats(&self.tasks).total);
        true
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Save the whole tree. Returns whether the write succeeded.
    pub fn persist(&mut self) -> bool {
        let json = match serde_json::to_string_pretty(&self.tasks) {
            Ok(json) => json,
            Err(e) => {
                log::error!("task tree serialization failed error={}", e);
                self.last_save_failed = true;
                return false;
            }
        };
        match self.store.set(TASKS_KEY, &json) {
            Ok(()) => {
                self.last_save_failed = false;
                true
            }
            Err(e) => {
                log::warn!("task store write failed error={}", e);
                if let Some(recovery) = &self.recovery {
                    recovery.record(
                        RecoveryEntry::new(RecoveryCategory::Write, "task store write failed")
                            .field("Key", TASKS_KEY)
                            .field("Error", e.to_string())
                            .body(json),
                    );
                }
                self.last_save_failed = true;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::alert::testing::{Call, RecordingSink};
    use crate::io::store::{FileStore, MemoryStore};
    use crate::model::task::Boundary;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    fn new_task(text: &str, start: i64, end: i64) -> NewTask {
        NewTask {
            text: text.into(),
            start: t0() + Duration::seconds(start),
            end: t0() + Duration::seconds(end),
        }
    }

    fn stored(session: &Session<MemoryStore>) -> Vec<Task> {
        serde_json::from_str(session.store().raw(TASKS_KEY).unwrap()).unwrap()
    }

    #[test]
    fn test_mutations_persist() {
        let mut session = Session::open(MemoryStore::new(), None, t0());
        assert!(session.tasks().is_empty());
        assert!(session.store().raw(TASKS_KEY).is_none());

        let id = session.add(new_task("Ship report", 0, 3600), None).unwrap().unwrap();
        assert_eq!(stored(&session), session.tasks());

        assert!(session.toggle_complete(&id));
        assert!(stored(&session)[0].is_completed);

        assert!(session.toggle_notifications(&id));
        assert!(!stored(&session)[0].notifications_enabled);

        let edit = new_task("Ship final report", 0, 7200);
        assert!(session.edit(&id, edit, t0()).unwrap());
        assert_eq!(stored(&session)[0].text, "Ship final report");

        assert!(session.delete(&id).is_some());
        assert!(stored(&session).is_empty());
    }

    #[test]
    fn test_unknown_id_is_not_persisted() {
        let mut session = Session::open(MemoryStore::new(), None, t0());
        assert!(!session.toggle_complete("nope"));
        assert!(!session.toggle_notifications("nope"));
        assert!(session.delete("nope").is_none());
        assert_eq!(session.add(new_task("x", 0, 1), Some("nope")).unwrap(), None);
        assert!(!session.edit("nope", new_task("x", 0, 1), t0()).unwrap());
        assert!(session.store().raw(TASKS_KEY).is_none());
    }

    #[test]
    fn test_invalid_input_rejected() {
        let mut session = Session::open(MemoryStore::new(), None, t0());
        assert!(matches!(
            session.add(new_task("  ", 0, 10), None),
            Err(TaskError::EmptyText)
        ));
        assert!(matches!(
            session.add(new_task("x", 10, 10), None),
            Err(TaskError::InvalidWindow { .. })
        ));
        assert!(session.tasks().is_empty());
    }

    #[test]
    fn test_tick_persists_and_dispatches_once() {
        let mut session = Session::open(MemoryStore::new(), None, t0());
        session.add(new_task("Ship report", 0, 3600), None).unwrap();
        let sink = RecordingSink::default();
        let dispatcher = AlertDispatcher::new(true, true, vec![Box::new(sink.clone())]);

        let events = session.tick(t0() + Duration::seconds(3601), &dispatcher);
        assert_eq!(events.len(), 2);
        let saved = stored(&session);
        assert!(saved[0].start_notified && saved[0].end_notified);
        assert_eq!(
            *sink.calls.borrow(),
            vec![
                Call::Cue,
                Call::Alert("Task started".into(), "\"Ship report\" has started.".into()),
                Call::Alert("Task due".into(), "\"Ship report\" is due now.".into()),
            ]
        );

        // Nothing new: no write, no sound
        session.store_mut().set_fail_writes(true);
        assert!(session.tick(t0() + Duration::seconds(3700), &dispatcher).is_empty());
        assert!(!session.last_save_failed());
        assert_eq!(sink.calls.borrow().len(), 3);
    }

    #[test]
    fn test_write_failure_keeps_memory_and_records() {
        let tmp = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        store.set_fail_writes(true);
        let mut session = Session::open(store, Some(tmp.path()), t0());

        let id = session.add(new_task("unsaved", 0, 10), None).unwrap().unwrap();
        assert!(session.last_save_failed());
        assert_eq!(session.tasks()[0].id, id);

        let entries = RecoveryLog::in_dir(tmp.path()).read(None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Write);
        assert!(entries[0].body.contains("unsaved"));

        session.store_mut().set_fail_writes(false);
        assert!(session.toggle_complete(&id));
        assert!(!session.last_save_failed());
        assert_eq!(stored(&session).len(), 1);
    }

    #[test]
    fn test_corrupt_store_is_repaired() {
        let tmp = TempDir::new().unwrap();
        let store = MemoryStore::new().with(TASKS_KEY, "[{\"broken\":");
        let session = Session::open(store, Some(tmp.path()), t0());
        assert!(session.tasks().is_empty());
        assert_eq!(session.store().raw(TASKS_KEY), Some("[]"));

        let entries = RecoveryLog::in_dir(tmp.path()).read(None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Parse);
        assert_eq!(entries[0].body, "[{\"broken\":");
    }

    #[test]
    fn test_corrupt_store_untouched_without_recovery_log() {
        let store = MemoryStore::new().with(TASKS_KEY, "garbage");
        let session = Session::open(store, None, t0());
        assert!(session.tasks().is_empty());
        assert_eq!(session.store().raw(TASKS_KEY), Some("garbage"));
    }

    #[test]
    fn test_legacy_store_is_migrated_and_written_back() {
        let raw = r#"[{"id":"a","text":"Old","dueDate":"2025-05-01T13:00:00.000Z","isCompleted":false,"notified":false,"subtasks":[]}]"#;
        let session = Session::open(MemoryStore::new().with(TASKS_KEY, raw), None, t0());
        let task = &session.tasks()[0];
        assert_eq!(task.start_time, t0());
        assert!(task.start_notified);
        let saved = stored(&session);
        assert_eq!(saved, session.tasks());
    }

    #[test]
    fn test_read_only_open_leaves_store_alone() {
        let raw = r#"[{"id":"a","text":"Old","dueDate":"2025-05-01T13:00:00.000Z","isCompleted":false,"notified":false,"subtasks":[]}]"#;
        let session = Session::open_read_only(MemoryStore::new().with(TASKS_KEY, raw), t0());
        assert_eq!(session.tasks()[0].text, "Old");
        assert!(session.tasks()[0].start_notified);
        assert_eq!(session.store().raw(TASKS_KEY), Some(raw));

        let session = Session::open_read_only(MemoryStore::new().with(TASKS_KEY, "{{"), t0());
        assert!(session.tasks().is_empty());
        assert_eq!(session.store().raw(TASKS_KEY), Some("{{"));
    }

    #[test]
    fn test_delete_captures_subtree() {
        let tmp = TempDir::new().unwrap();
        let mut session = Session::open(MemoryStore::new(), Some(tmp.path()), t0());
        let parent = session.add(new_task("parent", 0, 100), None).unwrap().unwrap();
        session.add(new_task("child", 0, 50), Some(&parent)).unwrap();

        let removed = session.delete(&parent).unwrap();
        assert_eq!(removed.subtasks.len(), 1);
        let entries = RecoveryLog::in_dir(tmp.path()).read(None);
        assert_eq!(entries[0].category, RecoveryCategory::Delete);
        assert!(entries[0].body.contains("child"));
    }

    #[test]
    fn test_reload_picks_up_external_change() {
        let tmp = TempDir::new().unwrap();
        let mut session = Session::open(FileStore::new(tmp.path()), None, t0());
        session.add(new_task("mine", 0, 100), None).unwrap();

        let mut other = Session::open(FileStore::new(tmp.path()), None, t0());
        other.add(new_task("theirs", 0, 50), None).unwrap();

        assert!(session.reload(t0()));
        let texts: Vec<_> = session.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["theirs", "mine"]);
        assert!(!session.reload(t0()));
    }

    #[test]
    fn test_reload_ignores_corrupt_content() {
        let tmp = TempDir::new().unwrap();
        let mut session = Session::open(FileStore::new(tmp.path()), None, t0());
        session.add(new_task("kept", 0, 100), None).unwrap();
        std::fs::write(tmp.path().join("tasks.json"), "{{{").unwrap();
        assert!(!session.reload(t0()));
        assert_eq!(session.tasks()[0].text, "kept");
    }

    #[test]
    fn test_non_utf8_store_is_captured_before_rewrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tasks.json");
        std::fs::write(&path, b"[{\"id\":\"a\",\"text\":\"caf\xe9\"}]").unwrap();

        let session = Session::open(FileStore::new(tmp.path()), Some(tmp.path()), t0());
        assert!(session.tasks().is_empty());

        let entries = RecoveryLog::in_dir(tmp.path()).read(None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Parse);
        assert!(entries[0].body.contains(r"caf\xe9"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_unreadable_store_is_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("tasks.json")).unwrap();
        let session = Session::open(FileStore::new(tmp.path()), Some(tmp.path()), t0());
        assert!(session.tasks().is_empty());
        assert!(!session.last_save_failed());
        assert!(tmp.path().join("tasks.json").is_dir());
    }

    #[test]
    fn test_reload_skipped_after_failed_save() {
        let mut session = Session::open(MemoryStore::new(), None, t0());
        session.add(new_task("w", 0, 60), None).unwrap();
        session.store_mut().set_fail_writes(true);
        let d = AlertDispatcher::silent();

        // Watch loop: reload, then tick, once per second
        let mut fired = 0;
        for secs in [120, 121, 122] {
            let now = t0() + Duration::seconds(secs);
            assert!(!session.reload(now));
            fired += session.tick(now, &d).len();
        }
        assert_eq!(fired, 2);
        assert!(session.last_save_failed());
        assert!(session.tasks()[0].end_notified);
    }

    #[test]
    fn test_corrupt_reloads_record_one_entry() {
        let tmp = TempDir::new().unwrap();
        let mut session = Session::open(FileStore::new(tmp.path()), Some(tmp.path()), t0());
        session.add(new_task("kept", 0, 100), None).unwrap();
        std::fs::write(tmp.path().join("tasks.json"), "{{{").unwrap();

        for _ in 0..5 {
            assert!(!session.reload(t0()));
        }
        let entries = RecoveryLog::in_dir(tmp.path()).read(None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "{{{");

        // Different garbage is captured again
        std::fs::write(tmp.path().join("tasks.json"), "}}}").unwrap();
        assert!(!session.reload(t0()));
        assert_eq!(RecoveryLog::in_dir(tmp.path()).read(None).len(), 2);
    }

    #[test]
    fn test_events_latch_through_the_store() {
        let mut session = Session::open(MemoryStore::new(), None, t0());
        session.add(new_task("w", 60, 120), None).unwrap();
        let d = AlertDispatcher::silent();
        let events = session.tick(t0() + Duration::seconds(60), &d);
        assert_eq!(events[0].boundary, Boundary::Start);

        // A fresh session over the same store sees the latch
        let store = session.store().clone();
        let mut reopened = Session::open(store, None, t0());
        let events = reopened.tick(t0() + Duration::seconds(61), &d);
        assert!(events.is_empty());
    }
}

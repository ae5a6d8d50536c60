use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which edge of a task's time window an alert refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    Start,
    End,
}

impl Boundary {
    pub fn label(self) -> &'static str {
        match self {
            Boundary::Start => "start",
            Boundary::End => "end",
        }
    }
}

/// A task with a start/end window and its (recursive) subtasks.
///
/// Serialized with camelCase keys; this is the persisted shape of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque unique ID (UUID v4), never changes
    pub id: String,
    /// User label
    pub text: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_completed: bool,
    /// One-shot latch for the start alert
    #[serde(default)]
    pub start_notified: bool,
    /// One-shot latch for the end alert
    #[serde(default)]
    pub end_notified: bool,
    /// Per-task alert gate (absent = enabled)
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    /// Subtasks, kept sorted by end time
    #[serde(default)]
    pub subtasks: Vec<Task>,
}

fn default_true() -> bool {
    true
}

impl Task {
    /// Create a fresh, incomplete task with a new ID and no latched alerts.
    pub fn new(text: String, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            text,
            start_time,
            end_time,
            is_completed: false,
            start_notified: false,
            end_notified: false,
            notifications_enabled: true,
            subtasks: Vec::new(),
        }
    }

    /// The instant for the given boundary
    pub fn boundary_time(&self, boundary: Boundary) -> DateTime<Utc> {
        match boundary {
            Boundary::Start => self.start_time,
            Boundary::End => self.end_time,
        }
    }

    /// Whether the alert for the given boundary has already fired
    pub fn is_notified(&self, boundary: Boundary) -> bool {
        match boundary {
            Boundary::Start => self.start_notified,
            Boundary::End => self.end_notified,
        }
    }

    /// Shortened ID for display (first 8 characters)
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

/// Completion counts across the whole tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
}

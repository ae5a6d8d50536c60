//! Deadline scanning: latch one-shot start/end alerts as wall-clock time
//! crosses each task's window boundaries.
//!
//! Every task is judged on its own: a parent's alert state never depends on
//! its children, and children are visited even when the parent is completed
//! or muted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::task::{Boundary, Task};

/// A boundary that was crossed during a scan and must be announced once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertEvent {
    pub task_id: String,
    pub text: String,
    pub boundary: Boundary,
    /// The boundary instant (not the scan instant)
    pub at: DateTime<Utc>,
}

impl AlertEvent {
    /// Title for a desktop notification
    pub fn title(&self) -> &'static str {
        match self.boundary {
            Boundary::Start => "Task started",
            Boundary::End => "Task due",
        }
    }

    /// Body for a desktop notification
    pub fn body(&self) -> String {
        match self.boundary {
            Boundary::Start => format!("\"{}\" has started.", self.text),
            Boundary::End => format!("\"{}\" is due now.", self.text),
        }
    }
}

/// The next armed boundary that has not been reached yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Upcoming {
    pub task_id: String,
    pub text: String,
    pub boundary: Boundary,
    pub at: DateTime<Utc>,
}

/// Whether a task may fire alerts at all
fn is_eligible(task: &Task) -> bool {
    !task.is_completed && task.notifications_enabled
}

/// Latch every boundary that `now` has reached and return one event per
/// latched flag. An empty result means the tree was not modified.
pub fn scan(tasks: &mut [Task], now: DateTime<Utc>) -> Vec<AlertEvent> {
    let mut events = Vec::new();
    scan_into(tasks, now, &mut events);
    events
}

fn scan_into(tasks: &mut [Task], now: DateTime<Utc>, events: &mut Vec<AlertEvent>) {
    for task in tasks.iter_mut() {
        if is_eligible(task) {
            if !task.start_notified && now >= task.start_time {
                task.start_notified = true;
                events.push(event_for(task, Boundary::Start));
            }
            if !task.end_notified && now >= task.end_time {
                task.end_notified = true;
                events.push(event_for(task, Boundary::End));
            }
        }
        scan_into(&mut task.subtasks, now, events);
    }
}

fn event_for(task: &Task, boundary: Boundary) -> AlertEvent {
    AlertEvent {
        task_id: task.id.clone(),
        text: task.text.clone(),
        boundary,
        at: task.boundary_time(boundary),
    }
}

/// Earliest boundary strictly after `now` that would fire on a later scan.
pub fn next_boundary(tasks: &[Task], now: DateTime<Utc>) -> Option<Upcoming> {
    let mut best: Option<Upcoming> = None;
    collect_next(tasks, now, &mut best);
    best
}

fn collect_next(tasks: &[Task], now: DateTime<Utc>, best: &mut Option<Upcoming>) {
    for task in tasks {
        if is_eligible(task) {
            for boundary in [Boundary::Start, Boundary::End] {
                let at = task.boundary_time(boundary);
                if task.is_notified(boundary) || at <= now {
                    continue;
                }
                if best.as_ref().is_none_or(|b| at < b.at) {
                    *best = Some(Upcoming {
                        task_id: task.id.clone(),
                        text: task.text.clone(),
                        boundary,
                        at,
                    });
                }
            }
        }
        collect_next(&task.subtasks, now, best);
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::task::{Task, TaskStats};
use crate::ops::countdown::Countdown;
use crate::ops::scan::{AlertEvent, Upcoming};
use crate::parse::when::format_local;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub text: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_completed: bool,
    pub notifications_enabled: bool,
    pub start_notified: bool,
    pub end_notified: bool,
    /// completed | upcoming | running | late
    pub status: &'static str,
    pub countdown: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct StatsJson {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

#[derive(Serialize)]
pub struct ScanJson {
    pub fired: Vec<AlertEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Upcoming>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(task: &Task, now: DateTime<Utc>) -> TaskJson {
    let countdown = Countdown::at(task, now);
    TaskJson {
        id: task.id.clone(),
        text: task.text.clone(),
        start_time: task.start_time,
        end_time: task.end_time,
        is_completed: task.is_completed,
        notifications_enabled: task.notifications_enabled,
        start_notified: task.start_notified,
        end_notified: task.end_notified,
        status: countdown.kind(),
        countdown: countdown.to_string(),
        subtasks: task
            .subtasks
            .iter()
            .map(|t| task_to_json(t, now))
            .collect(),
    }
}

/// Whole tree as JSON. With `pending_only`, completed tasks and everything
/// under them are left out, matching the text listing.
pub fn tree_to_json(tasks: &[Task], now: DateTime<Utc>, pending_only: bool) -> Vec<TaskJson> {
    tasks
        .iter()
        .filter(|t| !(pending_only && t.is_completed))
        .map(|t| {
            let mut json = task_to_json(t, now);
            json.subtasks = tree_to_json(&t.subtasks, now, pending_only);
            json
        })
        .collect()
}

pub fn stats_to_json(stats: &TaskStats) -> StatsJson {
    StatsJson {
        total: stats.total,
        completed: stats.completed,
        pending: stats.total - stats.completed,
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn check_char(task: &Task) -> char {
    if task.is_completed { 'x' } else { ' ' }
}

/// `[ ] 1a2b3c4d Ship report  (1h 0s left)`
pub fn format_task_line(task: &Task, now: DateTime<Utc>) -> String {
    let muted = if task.notifications_enabled {
        ""
    } else {
        " [muted]"
    };
    format!(
        "[{}] {} {}  ({}){}",
        check_char(task),
        task.short_id(),
        task.text,
        Countdown::at(task, now),
        muted
    )
}

/// A task and its subtasks, two spaces per level. With `pending_only`,
/// completed tasks and everything under them are skipped.
pub fn format_task_tree(
    task: &Task,
    indent: usize,
    now: DateTime<Utc>,
    pending_only: bool,
) -> Vec<String> {
    if pending_only && task.is_completed {
        return Vec::new();
    }
    let mut lines = vec![format!("{}{}", "  ".repeat(indent), format_task_line(task, now))];
    for sub in &task.subtasks {
        lines.extend(format_task_tree(sub, indent + 1, now, pending_only));
    }
    lines
}

fn alert_state(enabled: bool, fired: bool) -> &'static str {
    match (enabled, fired) {
        (_, true) => "fired",
        (true, false) => "armed",
        (false, false) => "muted",
    }
}

pub fn format_task_detail(task: &Task, ancestors: &[&Task], now: DateTime<Utc>) -> Vec<String> {
    let mut lines = vec![
        format!("[{}] {}", check_char(task), task.text),
        format!("id:     {}", task.id),
    ];
    if !ancestors.is_empty() {
        let path: Vec<&str> = ancestors.iter().map(|t| t.text.as_str()).collect();
        lines.push(format!("under:  {}", path.join(" > ")));
    }
    lines.push(format!("start:  {}", format_local(task.start_time)));
    lines.push(format!("end:    {}", format_local(task.end_time)));
    lines.push(format!("status: {}", Countdown::at(task, now)));
    lines.push(format!(
        "alerts: start {}, end {}",
        alert_state(task.notifications_enabled, task.start_notified),
        alert_state(task.notifications_enabled, task.end_notified),
    ));

    if !task.subtasks.is_empty() {
        lines.push(String::new());
        lines.push("subtasks:".to_string());
        for sub in &task.subtasks {
            lines.extend(format_task_tree(sub, 1, now, false));
        }
    }
    lines
}

/// `end    1a2b3c4d "Ship report" at 2025-05-01 13:00`
pub fn format_event(event: &AlertEvent) -> String {
    format!(
        "{:<6} {} \"{}\" at {}",
        event.boundary.label(),
        event.task_id.get(..8).unwrap_or(&event.task_id),
        event.text,
        format_local(event.at)
    )
}

pub fn format_upcoming(next: &Upcoming, now: DateTime<Utc>) -> String {
    format!(
        "next: {} of \"{}\" in {}",
        next.boundary.label(),
        next.text,
        crate::ops::countdown::format_duration(next.at - now)
    )
}

pub fn format_stats(stats: &TaskStats) -> String {
    format!(
        "{} tasks, {} completed, {} pending",
        stats.total,
        stats.completed,
        stats.total - stats.completed
    )
}

use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::model::task::Task;

/// Where a task stands relative to its window at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Completed,
    /// Before the start boundary
    StartsIn(Duration),
    /// Inside the window, time until the end boundary
    Remaining(Duration),
    /// Past the end boundary
    Late(Duration),
}

impl Countdown {
    pub fn at(task: &Task, now: DateTime<Utc>) -> Self {
        if task.is_completed {
            Countdown::Completed
        } else if now < task.start_time {
            Countdown::StartsIn(task.start_time - now)
        } else if now < task.end_time {
            Countdown::Remaining(task.end_time - now)
        } else {
            Countdown::Late(now - task.end_time)
        }
    }

    /// Short machine-friendly label
    pub fn kind(&self) -> &'static str {
        match self {
            Countdown::Completed => "completed",
            Countdown::StartsIn(_) => "upcoming",
            Countdown::Remaining(_) => "running",
            Countdown::Late(_) => "late",
        }
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Countdown::Completed => write!(f, "completed"),
            Countdown::StartsIn(d) => write!(f, "starts in {}", format_duration(*d)),
            Countdown::Remaining(d) => write!(f, "{} left", format_duration(*d)),
            Countdown::Late(d) => write!(f, "late by {}", format_duration(*d)),
        }
    }
}

/// Format a duration as `1d 2h 3m 4s`. Zero-valued days/hours/minutes are
/// omitted; seconds are always shown. Negative durations clamp to `0s`.
pub fn format_duration(d: Duration) -> String {
    let total = d.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total / 3_600) % 24;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    parts.push(format!("{}s", seconds));
    parts.join(" ")
}

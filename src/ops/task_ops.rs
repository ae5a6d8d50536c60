use chrono::{DateTime, Utc};

use crate::model::task::{Task, TaskStats};

/// Error type for task operations
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task text cannot be empty")]
    EmptyText,
    #[error("end time {end} must be after start time {start}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("ambiguous task ID '{prefix}' matches {matches} tasks")]
    AmbiguousId { prefix: String, matches: usize },
}

/// User-supplied fields for a new task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub text: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Replacement fields for an existing task (same shape as a new one)
pub type TaskEdit = NewTask;

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Add a task as a new root (`parent_id = None`) or as the last subtask of
/// `parent_id`, then re-sort that sibling list by end time.
///
/// Returns the new task's ID, or `None` (tree untouched) if the parent does
/// not exist.
pub fn add_task(
    tasks: &mut Vec<Task>,
    new: NewTask,
    parent_id: Option<&str>,
) -> Result<Option<String>, TaskError> {
    let text = validate(&new)?;

    let siblings = match parent_id {
        None => tasks,
        Some(pid) => match find_task_mut(tasks, pid) {
            Some(parent) => &mut parent.subtasks,
            None => return Ok(None),
        },
    };

    let task = Task::new(text, new.start, new.end);
    let id = task.id.clone();
    siblings.push(task);
    sort_by_end(siblings);
    Ok(Some(id))
}

/// Replace a task's text and window. A boundary moved strictly past `now`
/// re-arms its alert. Returns `false` if the ID is unknown.
pub fn edit_task(
    tasks: &mut Vec<Task>,
    task_id: &str,
    edit: TaskEdit,
    now: DateTime<Utc>,
) -> Result<bool, TaskError> {
    let text = validate(&edit)?;

    let Some(path) = find_path(tasks, task_id) else {
        return Ok(false);
    };
    let Some((&idx, parent_path)) = path.split_last() else {
        return Ok(false);
    };
    let Some(siblings) = list_at_mut(tasks, parent_path) else {
        return Ok(false);
    };

    let task = &mut siblings[idx];
    task.text = text;
    task.start_time = edit.start;
    task.end_time = edit.end;
    if edit.end > now {
        task.end_notified = false;
    }
    if edit.start > now {
        task.start_notified = false;
    }

    sort_by_end(siblings);
    Ok(true)
}

/// Toggle completion with cascade: completing marks the whole subtree done,
/// un-completing clears the task and every ancestor (descendants keep their
/// state). Returns `false` if the ID is unknown.
pub fn toggle_complete(tasks: &mut Vec<Task>, task_id: &str) -> bool {
    let Some(path) = find_path(tasks, task_id) else {
        return false;
    };
    let was_completed = match task_at(tasks, &path) {
        Some(task) => task.is_completed,
        None => return false,
    };

    if was_completed {
        let mut list = tasks;
        for &i in &path {
            list[i].is_completed = false;
            list = &mut list[i].subtasks;
        }
    } else if let Some(task) = task_at_mut(tasks, &path) {
        set_completed_recursive(task);
    }
    true
}

/// Flip the per-task notification gate. Does not cascade.
pub fn toggle_notifications(tasks: &mut [Task], task_id: &str) -> bool {
    match find_task_mut(tasks, task_id) {
        Some(task) => {
            task.notifications_enabled = !task.notifications_enabled;
            true
        }
        None => false,
    }
}

/// Remove a task and its whole subtree. Returns the removed subtree.
pub fn delete_task(tasks: &mut Vec<Task>, task_id: &str) -> Option<Task> {
    let path = find_path(tasks, task_id)?;
    let (&idx, parent_path) = path.split_last()?;
    let siblings = list_at_mut(tasks, parent_path)?;
    Some(siblings.remove(idx))
}

/// Stable ascending sort by end time; equal end times keep their order.
pub fn sort_by_end(tasks: &mut [Task]) {
    tasks.sort_by_key(|t| t.end_time);
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Count every task at every depth.
pub fn stats(tasks: &[Task]) -> TaskStats {
    let mut stats = TaskStats::default();
    for_each_task(tasks, &mut |task, _| {
        stats.total += 1;
        if task.is_completed {
            stats.completed += 1;
        }
    });
    stats
}

/// Find a task by ID anywhere in the tree (depth-first).
pub fn find_task<'a>(tasks: &'a [Task], task_id: &str) -> Option<&'a Task> {
    for task in tasks {
        if task.id == task_id {
            return Some(task);
        }
        if let Some(t) = find_task(&task.subtasks, task_id) {
            return Some(t);
        }
    }
    None
}

/// Find a task by ID anywhere in the tree, return mutable ref.
pub fn find_task_mut<'a>(tasks: &'a mut [Task], task_id: &str) -> Option<&'a mut Task> {
    for task in tasks.iter_mut() {
        if task.id == task_id {
            return Some(task);
        }
        if let Some(t) = find_task_mut(&mut task.subtasks, task_id) {
            return Some(t);
        }
    }
    None
}

/// Index path from the root list down to the task (`[root_idx, child_idx, ...]`).
pub fn find_path(tasks: &[Task], task_id: &str) -> Option<Vec<usize>> {
    for (i, task) in tasks.iter().enumerate() {
        if task.id == task_id {
            return Some(vec![i]);
        }
        if let Some(mut rest) = find_path(&task.subtasks, task_id) {
            rest.insert(0, i);
            return Some(rest);
        }
    }
    None
}

/// Resolve a task by index path.
pub fn task_at<'a>(tasks: &'a [Task], path: &[usize]) -> Option<&'a Task> {
    let (&first, rest) = path.split_first()?;
    let mut task = tasks.get(first)?;
    for &i in rest {
        task = task.subtasks.get(i)?;
    }
    Some(task)
}

fn task_at_mut<'a>(tasks: &'a mut Vec<Task>, path: &[usize]) -> Option<&'a mut Task> {
    let (&idx, parent_path) = path.split_last()?;
    list_at_mut(tasks, parent_path)?.get_mut(idx)
}

/// The sibling list reached by following `parent_path` (empty = roots).
fn list_at_mut<'a>(tasks: &'a mut Vec<Task>, parent_path: &[usize]) -> Option<&'a mut Vec<Task>> {
    let mut list = tasks;
    for &i in parent_path {
        list = &mut list.get_mut(i)?.subtasks;
    }
    Some(list)
}

/// Ancestors of a task, root first (the task itself excluded).
pub fn ancestors<'a>(tasks: &'a [Task], task_id: &str) -> Vec<&'a Task> {
    let Some(path) = find_path(tasks, task_id) else {
        return Vec::new();
    };
    (1..path.len())
        .filter_map(|depth| task_at(tasks, &path[..depth]))
        .collect()
}

/// Resolve user input to a full task ID: an exact ID, or a prefix matching
/// exactly one task.
pub fn resolve_id(tasks: &[Task], input: &str) -> Result<String, TaskError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TaskError::NotFound(input.to_string()));
    }
    if find_task(tasks, input).is_some() {
        return Ok(input.to_string());
    }

    let mut matches = Vec::new();
    for_each_task(tasks, &mut |task, _| {
        if task.id.starts_with(input) {
            matches.push(task.id.clone());
        }
    });

    match matches.len() {
        0 => Err(TaskError::NotFound(input.to_string())),
        1 => Ok(matches.remove(0)),
        n => Err(TaskError::AmbiguousId {
            prefix: input.to_string(),
            matches: n,
        }),
    }
}

/// Visit every task depth-first (parent before children) with its depth.
pub fn for_each_task<'a>(tasks: &'a [Task], f: &mut dyn FnMut(&'a Task, usize)) {
    for_each_task_at(tasks, 0, f);
}

fn for_each_task_at<'a>(tasks: &'a [Task], depth: usize, f: &mut dyn FnMut(&'a Task, usize)) {
    for task in tasks {
        f(task, depth);
        for_each_task_at(&task.subtasks, depth + 1, f);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate(fields: &NewTask) -> Result<String, TaskError> {
    let text = fields.text.trim();
    if text.is_empty() {
        return Err(TaskError::EmptyText);
    }
    if fields.start >= fields.end {
        return Err(TaskError::InvalidWindow {
            start: fields.start,
            end: fields.end,
        });
    }
    Ok(text.to_string())
}

fn set_completed_recursive(task: &mut Task) {
    task.is_completed = true;
    for sub in &mut task.subtasks {
        set_completed_recursive(sub);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use crossterm::event::{KeyCode, KeyEvent};

use crate::tui::app::{App, FormState, Mode};

pub(super) fn handle_navigate(app: &mut App, key: KeyEvent) {
    app.message = None;

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Movement
        KeyCode::Char('j') | KeyCode::Down => move_cursor(app, 1),
        KeyCode::Char('k') | KeyCode::Up => move_cursor(app, -1),
        KeyCode::Char('g') | KeyCode::Home => app.cursor = 0,
        KeyCode::Char('G') | KeyCode::End => {
            app.cursor = app.flat_items().len().saturating_sub(1);
        }
        KeyCode::Char('h') | KeyCode::Left => collapse_or_parent(app),
        KeyCode::Char('l') | KeyCode::Right => expand_or_child(app),

        // Task actions
        KeyCode::Char(' ') | KeyCode::Char('x') => app.toggle_complete(),
        KeyCode::Char('m') => app.toggle_notifications(),
        KeyCode::Char('a') => {
            app.mode = Mode::Form(FormState::add(None, app.now));
        }
        KeyCode::Char('s') => {
            if let Some(parent) = app.cursor_id() {
                app.mode = Mode::Form(FormState::add(Some(parent), app.now));
            }
        }
        KeyCode::Char('e') => {
            if let Some(task) = app.cursor_task() {
                app.mode = Mode::Form(FormState::edit(task));
            }
        }
        KeyCode::Char('d') => {
            if let Some(id) = app.cursor_id() {
                app.mode = Mode::ConfirmDelete { id };
            }
        }
        _ => {}
    }
}

fn move_cursor(app: &mut App, delta: isize) {
    let len = app.flat_items().len();
    if len == 0 {
        return;
    }
    app.cursor = app.cursor.saturating_add_signed(delta).min(len - 1);
}

/// Collapse an expanded task, otherwise jump to its parent
fn collapse_or_parent(app: &mut App) {
    let items = app.flat_items();
    let Some(item) = items.get(app.cursor) else {
        return;
    };
    if item.is_expanded {
        if let Some(id) = app.cursor_id() {
            app.collapsed.insert(id);
        }
        return;
    }
    let parent_path = &item.path[..item.path.len() - 1];
    if parent_path.is_empty() {
        return;
    }
    if let Some(idx) = items.iter().position(|i| i.path == parent_path) {
        app.cursor = idx;
    }
}

/// Expand a collapsed task, otherwise step into its first subtask
fn expand_or_child(app: &mut App) {
    let items = app.flat_items();
    let Some(item) = items.get(app.cursor) else {
        return;
    };
    if !item.has_children {
        return;
    }
    if item.is_expanded {
        app.cursor += 1;
    } else if let Some(id) = app.cursor_id() {
        app.collapsed.remove(&id);
    }
}

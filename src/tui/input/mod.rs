mod confirm;
mod form;
mod navigate;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::{App, Mode};

use confirm::handle_confirm;
use form::handle_form;
use navigate::handle_navigate;

/// Handle a key event in the current mode
pub fn handle_key(app: &mut App, key: KeyEvent) {
    // Ignore bare modifier key presses (Shift, Ctrl, Alt, etc.)
    if matches!(key.code, KeyCode::Modifier(_)) {
        return;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    match &app.mode {
        Mode::Navigate => handle_navigate(app, key),
        Mode::Form(_) => handle_form(app, key),
        Mode::ConfirmDelete { .. } => handle_confirm(app, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::app::FormField;
    use crate::tui::render::test_helpers::{app_with_tasks, task};
    use pretty_assertions::assert_eq;

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn nested() -> Vec<crate::model::Task> {
        let mut parent = task("p", "parent", 100);
        parent.subtasks.push(task("c1", "first", 20));
        parent.subtasks.push(task("c2", "second", 40));
        vec![parent, task("q", "other", 200)]
    }

    #[test]
    fn test_cursor_moves_and_clamps() {
        let (_dir, mut app) = app_with_tasks(nested());
        press(&mut app, KeyCode::Char('k'));
        assert_eq!(app.cursor, 0);
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.cursor_id().as_deref(), Some("q"));
        press(&mut app, KeyCode::Up);
        assert_eq!(app.cursor_id().as_deref(), Some("c2"));
    }

    #[test]
    fn test_collapse_and_expand() {
        let (_dir, mut app) = app_with_tasks(nested());
        // h on a child jumps to its parent, h again collapses it
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('h'));
        assert_eq!(app.cursor_id().as_deref(), Some("p"));
        press(&mut app, KeyCode::Char('h'));
        assert!(app.collapsed.contains("p"));
        assert_eq!(app.flat_items().len(), 2);

        press(&mut app, KeyCode::Char('l'));
        assert!(!app.collapsed.contains("p"));
        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.cursor_id().as_deref(), Some("c1"));
    }

    #[test]
    fn test_toggle_keys() {
        let (_dir, mut app) = app_with_tasks(nested());
        press(&mut app, KeyCode::Char(' '));
        assert!(app.tasks()[0].is_completed);
        assert!(app.tasks()[0].subtasks.iter().all(|t| t.is_completed));
        press(&mut app, KeyCode::Char('x'));
        assert!(!app.tasks()[0].is_completed);

        press(&mut app, KeyCode::Char('m'));
        assert!(!app.tasks()[0].notifications_enabled);
        assert_eq!(app.message.as_deref(), Some("alerts off"));
    }

    #[test]
    fn test_add_subtask_through_form() {
        let (_dir, mut app) = app_with_tasks(nested());
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('s'));
        match &app.mode {
            Mode::Form(form) => assert_eq!(form.focus, FormField::Text),
            other => panic!("expected form, got {:?}", other),
        }
        type_str(&mut app, "deep");
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        // Replace the default end time
        for _ in 0..20 {
            press(&mut app, KeyCode::Backspace);
        }
        type_str(&mut app, "+5m");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Navigate);
        let first = &app.tasks()[0].subtasks[0];
        assert_eq!(first.subtasks.len(), 1);
        assert_eq!(first.subtasks[0].text, "deep");
    }

    #[test]
    fn test_form_escape_discards() {
        let (_dir, mut app) = app_with_tasks(vec![]);
        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "never saved");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Navigate);
        assert!(app.tasks().is_empty());
    }

    #[test]
    fn test_form_keeps_letters_out_of_navigation() {
        let (_dir, mut app) = app_with_tasks(nested());
        press(&mut app, KeyCode::Char('e'));
        // 'q' and 'j' are text here, not quit / move
        type_str(&mut app, " qj");
        assert!(!app.should_quit);
        match &app.mode {
            Mode::Form(form) => assert_eq!(form.text, "parent qj"),
            other => panic!("expected form, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let (_dir, mut app) = app_with_tasks(nested());
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.tasks().len(), 2);
        assert_eq!(app.mode, Mode::Navigate);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.tasks().len(), 1);
        assert_eq!(app.tasks()[0].id, "q");
    }

    #[test]
    fn test_quit() {
        let (_dir, mut app) = app_with_tasks(vec![]);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}

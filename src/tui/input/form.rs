use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::tui::app::{App, Mode};
use crate::util::unicode::prev_grapheme_boundary;

pub(super) fn handle_form(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Enter {
        app.submit_form();
        return;
    }
    let Mode::Form(form) = &mut app.mode else {
        return;
    };

    match key.code {
        KeyCode::Esc => app.mode = Mode::Navigate,
        KeyCode::Tab | KeyCode::Down => form.focus = form.focus.next(),
        KeyCode::BackTab | KeyCode::Up => form.focus = form.focus.prev(),
        KeyCode::Backspace => {
            let buf = form.focused_mut();
            if let Some(at) = prev_grapheme_boundary(buf, buf.len()) {
                buf.truncate(at);
            }
            form.error = None;
        }
        // Ctrl-U clears the field
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            form.focused_mut().clear();
            form.error = None;
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            form.focused_mut().push(c);
            form.error = None;
        }
        _ => {}
    }
}

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::tui::app::{App, Mode};

pub(super) fn handle_confirm(app: &mut App, key: KeyEvent) {
    let Mode::ConfirmDelete { id } = &app.mode else {
        return;
    };
    let id = id.clone();
    app.mode = Mode::Navigate;

    // Anything but y cancels
    if key.modifiers == KeyModifiers::NONE && key.code == KeyCode::Char('y') {
        app.delete(&id);
    }
}

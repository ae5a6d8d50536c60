pub mod form_panel;
pub mod header;
mod helpers;
pub mod status_row;
pub mod task_view;

#[cfg(test)]
pub mod test_helpers;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::Style;
use ratatui::widgets::Block;

use super::app::{App, Mode};

/// Main render function: header, task tree, optional form, status row
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Background fill
    let bg_style = Style::default().bg(app.theme.background);
    frame.render_widget(Block::default().style(bg_style), area);

    let form_height = match app.mode {
        Mode::Form(_) => form_panel::FORM_HEIGHT,
        _ => 0,
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),           // header + separator
            Constraint::Min(1),              // task tree
            Constraint::Length(form_height), // add/edit form
            Constraint::Length(1),           // status row
        ])
        .split(area);

    header::render_header(frame, app, chunks[0]);
    task_view::render_task_view(frame, app, chunks[1]);
    if let Mode::Form(form) = &app.mode {
        form_panel::render_form_panel(frame, app, form, chunks[2]);
    }
    status_row::render_status_row(frame, app, chunks[3]);
}

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::ops::task_ops;
use crate::tui::app::{App, FormField, FormKind, FormState};
use crate::util::unicode;

/// Rows used by the form: title plus one per field
pub const FORM_HEIGHT: u16 = 4;

const LABEL_WIDTH: usize = 7;

/// Render the inline add/edit form above the status row
pub fn render_form_panel(frame: &mut Frame, app: &App, form: &FormState, area: Rect) {
    let bg = app.theme.background;
    let width = area.width as usize;

    let title = match &form.kind {
        FormKind::Add { parent: None } => "new task".to_string(),
        FormKind::Add {
            parent: Some(parent),
        } => match task_ops::find_task(app.tasks(), parent) {
            Some(p) => format!("new subtask of \"{}\"", p.text),
            None => "new subtask".to_string(),
        },
        FormKind::Edit { .. } => "edit task".to_string(),
    };
    let mut lines = vec![Line::from(vec![
        Span::styled(" ", Style::default().bg(bg)),
        Span::styled(
            unicode::truncate_to_width(&title, width.saturating_sub(1)),
            Style::default()
                .fg(app.theme.highlight)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
        ),
    ])];

    for field in [FormField::Text, FormField::Start, FormField::End] {
        let focused = form.focus == field;
        let label_style = if focused {
            Style::default().fg(app.theme.text_bright).bg(bg)
        } else {
            Style::default().fg(app.theme.dim).bg(bg)
        };
        let mut spans = vec![Span::styled(
            format!("  {:<w$}", field.label(), w = LABEL_WIDTH),
            label_style,
        )];

        // Keep the tail of long input visible next to the cursor
        let budget = width.saturating_sub(LABEL_WIDTH + 3);
        let value = form.field(field);
        let shown = if unicode::display_width(value) > budget {
            tail_to_width(value, budget)
        } else {
            value.to_string()
        };
        spans.push(Span::styled(shown, Style::default().fg(app.theme.text).bg(bg)));
        if focused {
            spans.push(Span::styled(
                "\u{258C}",
                Style::default().fg(app.theme.highlight).bg(bg),
            )); // ▌ cursor
        }
        lines.push(Line::from(spans));
    }

    let paragraph = Paragraph::new(lines).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}

/// The longest suffix of `s` that fits in `max_cells`
fn tail_to_width(s: &str, max_cells: usize) -> String {
    let mut start = s.len();
    while let Some(prev) = unicode::prev_grapheme_boundary(s, start) {
        if unicode::display_width(&s[prev..]) > max_cells {
            break;
        }
        start = prev;
    }
    s[start..].to_string()
}

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::app::App;

use super::helpers::{gap_between, spans_width};

/// Render the title row with completion counts, and a separator line below
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Length(1), // separator
        ])
        .split(area);

    let bg = app.theme.background;
    let width = chunks[0].width as usize;
    let mut spans = vec![
        Span::styled(" ", Style::default().bg(bg)),
        Span::styled(
            "\u{25B6}",
            Style::default().fg(app.theme.highlight).bg(bg),
        ),
        Span::styled(
            " taskmaster",
            Style::default()
                .fg(app.theme.text_bright)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
        ),
    ];

    let stats = app.session.stats();
    let counts = format!(
        "{} done / {} tasks ",
        stats.completed, stats.total
    );
    let counts_width = counts.chars().count();
    if let Some(gap) = gap_between(spans_width(&spans), counts_width, width) {
        spans.push(Span::styled(" ".repeat(gap), Style::default().bg(bg)));
        spans.push(Span::styled(counts, Style::default().fg(app.theme.dim).bg(bg)));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(bg)),
        chunks[0],
    );

    let separator = Span::styled(
        "\u{2500}".repeat(chunks[1].width as usize),
        Style::default().fg(app.theme.dim).bg(bg),
    );
    frame.render_widget(Paragraph::new(Line::from(separator)), chunks[1]);
}

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::model::Task;
use crate::ops::countdown::Countdown;
use crate::ops::task_ops;
use crate::tui::app::{App, FlatItem};
use crate::util::unicode;

use super::helpers::{check_symbol, spans_width};

/// Render the task tree content area
pub fn render_task_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let flat_items = app.flat_items();

    if flat_items.is_empty() {
        let empty = Paragraph::new(" No tasks. Press a to add one.")
            .style(Style::default().fg(app.theme.dim).bg(app.theme.background));
        frame.render_widget(empty, area);
        return;
    }

    let visible_height = area.height as usize;
    app.cursor = app.cursor.min(flat_items.len() - 1);
    if app.cursor < app.scroll_offset {
        app.scroll_offset = app.cursor;
    } else if app.cursor >= app.scroll_offset + visible_height {
        app.scroll_offset = app.cursor.saturating_sub(visible_height.saturating_sub(1));
    }

    let scroll = app.scroll_offset;
    let end = flat_items.len().min(scroll + visible_height);
    let mut lines: Vec<Line> = Vec::with_capacity(visible_height);

    for (item, row) in flat_items[scroll..end].iter().zip(scroll..end) {
        if let Some(task) = task_ops::task_at(app.tasks(), &item.path) {
            lines.push(render_task_line(
                app,
                task,
                item,
                row == app.cursor,
                area.width as usize,
            ));
        }
    }

    let paragraph = Paragraph::new(lines).style(Style::default().bg(app.theme.background));
    frame.render_widget(paragraph, area);
}

/// One tree row: cursor bar, tree connectors, checkbox, text, and the
/// countdown right-aligned.
fn render_task_line<'a>(
    app: &App,
    task: &Task,
    info: &FlatItem,
    is_cursor: bool,
    width: usize,
) -> Line<'a> {
    let mut spans: Vec<Span> = Vec::new();
    let row_bg = if is_cursor {
        app.theme.selection_bg
    } else {
        app.theme.background
    };
    let dim_style = Style::default().fg(app.theme.dim).bg(row_bg);

    // Column 0: left border accent for the cursor row
    if is_cursor {
        spans.push(Span::styled(
            "\u{258E}",
            Style::default().fg(app.theme.selection_border).bg(row_bg),
        ));
    } else {
        spans.push(Span::styled(" ", Style::default().bg(row_bg)));
    }

    let expand_char = if !info.has_children {
        " "
    } else if info.is_expanded {
        "\u{25BC}" // ▼
    } else {
        "\u{25B6}" // ▶
    };

    if info.depth > 0 {
        for (d, is_ancestor_last) in info.ancestor_last.iter().enumerate() {
            if d == 0 || *is_ancestor_last {
                spans.push(Span::styled("   ", dim_style));
            } else {
                spans.push(Span::styled("\u{2502}  ", dim_style)); // │ + 2 spaces
            }
        }
        let tree_char = if info.is_last_sibling {
            "\u{2514}" // └
        } else {
            "\u{251C}" // ├
        };
        spans.push(Span::styled(tree_char, dim_style));
    }
    spans.push(Span::styled(expand_char, dim_style));

    // Checkbox
    let check_color = if task.is_completed {
        app.theme.done
    } else {
        app.theme.text
    };
    let mut check_style = Style::default().fg(check_color).bg(row_bg);
    if is_cursor {
        check_style = check_style.add_modifier(Modifier::BOLD);
    }
    spans.push(Span::styled(check_symbol(task), check_style));
    spans.push(Span::styled(" ", Style::default().bg(row_bg)));

    // Right side: muted marker and countdown
    let countdown = Countdown::at(task, app.now);
    let mut right: Vec<Span> = Vec::new();
    if !task.notifications_enabled {
        right.push(Span::styled("muted  ", dim_style));
    }
    right.push(Span::styled(
        countdown.to_string(),
        Style::default()
            .fg(app.theme.countdown_color(&countdown))
            .bg(row_bg),
    ));
    right.push(Span::styled(" ", Style::default().bg(row_bg)));

    // Text fills what is left, keeping at least two cells of gap
    let used = spans_width(&spans) + spans_width(&right);
    let text_budget = width.saturating_sub(used + 2);
    let text = unicode::truncate_to_width(&task.text, text_budget);
    let text_style = if task.is_completed {
        Style::default().fg(app.theme.dim).bg(row_bg)
    } else if is_cursor {
        Style::default()
            .fg(app.theme.text_bright)
            .bg(row_bg)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(app.theme.text).bg(row_bg)
    };
    let text_width = unicode::display_width(&text);
    spans.push(Span::styled(text, text_style));

    let padding = width.saturating_sub(used + text_width);
    spans.push(Span::styled(" ".repeat(padding), Style::default().bg(row_bg)));
    spans.extend(right);

    Line::from(spans)
}

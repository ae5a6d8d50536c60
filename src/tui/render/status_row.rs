use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::ops::countdown::format_duration;
use crate::ops::scan;
use crate::ops::task_ops;
use crate::tui::app::{App, Mode};

use super::helpers::{gap_between, spans_width};

const NAVIGATE_HINT: &str = "a add  s sub  e edit  d del  q quit";
const FORM_HINT: &str = "Tab next  Enter save  Esc cancel";

/// Render the status row (bottom of screen)
pub fn render_status_row(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let width = area.width as usize;
    let dim = Style::default().fg(app.theme.dim).bg(bg);

    let (mut spans, hint) = match &app.mode {
        Mode::Navigate => {
            let left = if let Some(msg) = &app.message {
                Span::styled(msg.clone(), Style::default().fg(app.theme.text_bright).bg(bg))
            } else if let Some(next) = scan::next_boundary(app.tasks(), app.now) {
                Span::styled(
                    format!(
                        "next: {} of \"{}\" in {}",
                        next.boundary.label(),
                        next.text,
                        format_duration(next.at - app.now)
                    ),
                    dim,
                )
            } else {
                Span::styled("no alerts pending", dim)
            };
            (vec![left], NAVIGATE_HINT)
        }
        Mode::Form(form) => {
            let left = match &form.error {
                Some(err) => Span::styled(err.clone(), Style::default().fg(app.theme.late).bg(bg)),
                None => Span::styled(String::new(), dim),
            };
            (vec![left], FORM_HINT)
        }
        Mode::ConfirmDelete { id } => {
            let (text, subtasks) = task_ops::find_task(app.tasks(), id)
                .map(|t| (t.text.clone(), task_ops::stats(std::slice::from_ref(t)).total - 1))
                .unwrap_or_default();
            let prompt = if subtasks > 0 {
                format!("delete \"{}\" and {} subtasks? y/n", text, subtasks)
            } else {
                format!("delete \"{}\"? y/n", text)
            };
            let style = Style::default()
                .fg(app.theme.highlight)
                .bg(bg)
                .add_modifier(Modifier::BOLD);
            (vec![Span::styled(prompt, style)], "")
        }
    };

    if let Some(gap) = gap_between(spans_width(&spans), hint.chars().count(), width) {
        spans.push(Span::styled(" ".repeat(gap), Style::default().bg(bg)));
        spans.push(Span::styled(hint, dim));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::app::FormState;
    use crate::tui::render::test_helpers::*;
    use insta::assert_snapshot;

    fn status(app: &App) -> String {
        render_to_string(TERM_W, 1, |frame, area| {
            render_status_row(frame, app, area);
        })
    }

    #[test]
    fn navigate_shows_next_boundary() {
        let (_dir, app) = app_with_tasks(vec![task("a", "ship", 90), task("b", "later", 300)]);
        assert_snapshot!(status(&app), @r#"next: end of "ship" in 1m 30s                a add  s sub  e edit  d del  q quit"#);
    }

    #[test]
    fn message_replaces_next_boundary() {
        let (_dir, mut app) = app_with_tasks(vec![]);
        app.message = Some("alerts off".into());
        assert!(status(&app).starts_with("alerts off "));
        app.message = None;
        assert!(status(&app).starts_with("no alerts pending "));
    }

    #[test]
    fn confirm_counts_subtasks() {
        let mut parent = task("p", "parent", 100);
        parent.subtasks.push(task("c", "child", 50));
        let (_dir, mut app) = app_with_tasks(vec![parent]);
        app.mode = Mode::ConfirmDelete { id: "p".into() };
        assert_snapshot!(status(&app), @r#"delete "parent" and 1 subtasks? y/n"#);
    }

    #[test]
    fn form_error_is_shown() {
        let (_dir, mut app) = app_with_tasks(vec![]);
        let mut form = FormState::add(None, app.now);
        form.error = Some("unrecognized time: soonish".into());
        app.mode = Mode::Form(form);
        assert!(status(&app).starts_with("unrecognized time: soonish"));
        assert!(status(&app).ends_with(FORM_HINT));
    }
}

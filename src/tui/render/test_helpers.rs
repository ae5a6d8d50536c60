use chrono::{DateTime, Duration, SubsecRound, Utc};
use once_cell::sync::Lazy;
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::layout::Rect;
use tempfile::TempDir;

use crate::io::alert::AlertDispatcher;
use crate::io::clock::FixedClock;
use crate::io::session::Session;
use crate::io::store::{FileStore, KeyValueStore, TASKS_KEY};
use crate::model::Task;
use crate::tui::app::App;
use crate::tui::theme::Theme;

pub const TERM_W: u16 = 80;
pub const TERM_H: u16 = 24;

/// Shared reference instant for test tasks, whole seconds
pub static BASE: Lazy<DateTime<Utc>> = Lazy::new(|| Utc::now().trunc_subsecs(0));

/// Render into an in-memory buffer and return plain text (no styles).
pub fn render_to_string<F>(w: u16, h: u16, f: F) -> String
where
    F: FnOnce(&mut ratatui::Frame, Rect),
{
    let backend = TestBackend::new(w, h);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal
        .draw(|frame| {
            let area = frame.area();
            f(frame, area);
        })
        .unwrap();

    let buf = terminal.backend().buffer().clone();
    let w = buf.area.width as usize;
    let lines: Vec<String> = buf
        .content
        .chunks(w)
        .map(|row| {
            let s: String = row.iter().map(|cell| cell.symbol()).collect();
            s.trim_end().to_string()
        })
        .collect();

    // Trim trailing blank lines
    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(0, |i| i + 1);
    lines[..end].join("\n")
}

/// A task that started an hour before [`BASE`] and ends `end_secs` after it
pub fn task(id: &str, text: &str, end_secs: i64) -> Task {
    let mut t = Task::new(
        text.into(),
        *BASE - Duration::hours(1),
        *BASE + Duration::seconds(end_secs),
    );
    t.id = id.into();
    t
}

/// An app over a file store in a temp dir, seeded with `tasks`, with the
/// clock at [`BASE`] and alerts silenced.
pub fn app_with_tasks(tasks: Vec<Task>) -> (TempDir, App) {
    let dir = TempDir::new().unwrap();
    let mut store = FileStore::new(dir.path());
    store
        .set(TASKS_KEY, &serde_json::to_string(&tasks).unwrap())
        .unwrap();
    let session = Session::open(store, Some(dir.path()), *BASE);
    let mut app = App::new(
        session,
        dir.path().to_path_buf(),
        AlertDispatcher::silent(),
        Theme::default(),
    );
    app.now = *BASE;
    app.clock = Box::new(FixedClock::new(*BASE));
    (dir, app)
}

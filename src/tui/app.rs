use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::context::Context;
use crate::io::alert::AlertDispatcher;
use crate::io::clock::{Clock, SystemClock, Ticker};
use crate::io::lock::StoreLock;
use crate::io::session::Session;
use crate::io::state::{UiState, read_ui_state, write_ui_state};
use crate::io::store::{FileStore, TASKS_KEY};
use crate::io::watcher::StoreWatcher;
use crate::model::Task;
use crate::ops::task_ops::{self, NewTask};
use crate::parse::{WhenError, format_local, parse_when};

use super::input;
use super::render;
use super::theme::Theme;

/// Current interaction mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Navigate,
    /// Inline add/edit form
    Form(FormState),
    /// Waiting for `y` to delete the task
    ConfirmDelete { id: String },
}

/// What a submitted form does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormKind {
    /// New root task (`parent = None`) or subtask
    Add { parent: Option<String> },
    Edit { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Text,
    Start,
    End,
}

impl FormField {
    pub fn next(self) -> Self {
        match self {
            FormField::Text => FormField::Start,
            FormField::Start => FormField::End,
            FormField::End => FormField::Text,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FormField::Text => FormField::End,
            FormField::Start => FormField::Text,
            FormField::End => FormField::Start,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FormField::Text => "text",
            FormField::Start => "start",
            FormField::End => "end",
        }
    }
}

/// Three-field task form. Times are kept as typed and parsed on submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub kind: FormKind,
    pub text: String,
    pub start: String,
    pub end: String,
    pub focus: FormField,
    /// Validation message from the last submit
    pub error: Option<String>,
    /// Stored start/end of the task being edited
    pub original: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl FormState {
    /// Empty form for a new task: starts now, due in an hour
    pub fn add(parent: Option<String>, now: DateTime<Utc>) -> Self {
        FormState {
            kind: FormKind::Add { parent },
            text: String::new(),
            start: format_local(now),
            end: format_local(now + Duration::hours(1)),
            focus: FormField::Text,
            error: None,
            original: None,
        }
    }

    /// Form prefilled from an existing task
    pub fn edit(task: &Task) -> Self {
        FormState {
            kind: FormKind::Edit {
                id: task.id.clone(),
            },
            text: task.text.clone(),
            start: format_local(task.start_time),
            end: format_local(task.end_time),
            focus: FormField::Text,
            error: None,
            original: Some((task.start_time, task.end_time)),
        }
    }

    /// Parse the start and end fields. A field left as prefilled keeps the
    /// stored instant, seconds included.
    pub fn window(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), WhenError> {
        let resolve = |typed: &str, stored: Option<DateTime<Utc>>| match stored {
            Some(at) if typed.trim() == format_local(at) => Ok(at),
            _ => parse_when(typed, now),
        };
        let start = resolve(&self.start, self.original.map(|(start, _)| start))?;
        let end = resolve(&self.end, self.original.map(|(_, end)| end))?;
        Ok((start, end))
    }

    pub fn field(&self, field: FormField) -> &str {
        match field {
            FormField::Text => &self.text,
            FormField::Start => &self.start,
            FormField::End => &self.end,
        }
    }

    pub fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Text => &mut self.text,
            FormField::Start => &mut self.start,
            FormField::End => &mut self.end,
        }
    }
}

/// A visible row in the task tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    /// Path through the task tree: indices at each nesting level
    pub path: Vec<usize>,
    pub depth: usize,
    pub has_children: bool,
    pub is_expanded: bool,
    pub is_last_sibling: bool,
    /// For each ancestor level, whether that ancestor was the last sibling
    pub ancestor_last: Vec<bool>,
}

/// Main application state
pub struct App {
    pub session: Session<FileStore>,
    /// Directory holding the store and its lock
    pub data_dir: PathBuf,
    pub dispatcher: AlertDispatcher,
    pub theme: Theme,
    pub mode: Mode,
    /// Cursor index into the flat visible items list
    pub cursor: usize,
    /// Scroll offset (first visible row)
    pub scroll_offset: usize,
    /// IDs of tasks whose subtasks are hidden
    pub collapsed: HashSet<String>,
    /// One-line feedback shown in the status row until the next key
    pub message: Option<String>,
    /// Instant used for countdowns in the current frame
    pub now: DateTime<Utc>,
    pub clock: Box<dyn Clock>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        session: Session<FileStore>,
        data_dir: PathBuf,
        dispatcher: AlertDispatcher,
        theme: Theme,
    ) -> Self {
        App {
            session,
            data_dir,
            dispatcher,
            theme,
            mode: Mode::Navigate,
            cursor: 0,
            scroll_offset: 0,
            collapsed: HashSet::new(),
            message: None,
            now: Utc::now(),
            clock: Box::new(SystemClock),
            should_quit: false,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        self.session.tasks()
    }

    /// Visible rows with collapsed subtrees hidden
    pub fn flat_items(&self) -> Vec<FlatItem> {
        flatten_tasks(self.tasks(), &self.collapsed)
    }

    /// The task under the cursor
    pub fn cursor_task(&self) -> Option<&Task> {
        let items = self.flat_items();
        let item = items.get(self.cursor)?;
        task_ops::task_at(self.tasks(), &item.path)
    }

    pub fn cursor_id(&self) -> Option<String> {
        self.cursor_task().map(|t| t.id.clone())
    }

    /// Move the cursor onto the row showing `id`, if it is visible
    pub fn select_id(&mut self, id: &str) -> bool {
        let items = self.flat_items();
        let found = items.iter().position(|item| {
            task_ops::task_at(self.tasks(), &item.path).is_some_and(|t| t.id == id)
        });
        if let Some(idx) = found {
            self.cursor = idx;
        }
        found.is_some()
    }

    /// Keep the cursor inside the visible list
    pub fn clamp_cursor(&mut self) {
        let len = self.flat_items().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    // -----------------------------------------------------------------------
    // Store access
    // -----------------------------------------------------------------------

    /// Run a read-modify-write against the store: take the lock, pick up
    /// changes from other processes, then apply `f`.
    pub fn with_store<R>(
        &mut self,
        f: impl FnOnce(&mut Session<FileStore>, DateTime<Utc>) -> R,
    ) -> Option<R> {
        let _lock = match StoreLock::acquire_default(&self.data_dir) {
            Ok(lock) => lock,
            Err(e) => {
                log::warn!("tui store access skipped error={}", e);
                self.message = Some(e.to_string());
                return None;
            }
        };
        let now = self.clock.now();
        self.session.reload(now);
        let result = f(&mut self.session, now);
        if self.session.last_save_failed() {
            self.message = Some("save failed; unsaved tree is in the recovery log".into());
        }
        Some(result)
    }

    /// One scan tick: fire due alerts and persist their latches
    pub fn tick(&mut self) {
        let dispatcher = std::mem::replace(&mut self.dispatcher, AlertDispatcher::silent());
        let fired = self.with_store(|session, now| session.tick(now, &dispatcher));
        self.dispatcher = dispatcher;

        if let Some(event) = fired.as_deref().and_then(|events| events.last()) {
            self.message = Some(format!("{}: \"{}\"", event.title(), event.text));
        }
    }

    /// Pick up a rewrite by another process
    pub fn reload(&mut self) {
        let cursor_id = self.cursor_id();
        let changed = self.with_store(|session, now| session.reload(now));
        if changed == Some(true) {
            if let Some(id) = cursor_id {
                self.select_id(&id);
            }
            self.clamp_cursor();
        }
    }

    // -----------------------------------------------------------------------
    // Task actions
    // -----------------------------------------------------------------------

    pub fn toggle_complete(&mut self) {
        let Some(id) = self.cursor_id() else { return };
        if self.with_store(|session, _| session.toggle_complete(&id)) == Some(false) {
            self.message = Some(format!("task not found: {}", id));
        }
    }

    pub fn toggle_notifications(&mut self) {
        let Some(id) = self.cursor_id() else { return };
        match self.with_store(|session, _| session.toggle_notifications(&id)) {
            Some(true) => {
                let muted = task_ops::find_task(self.tasks(), &id)
                    .is_some_and(|t| !t.notifications_enabled);
                self.message = Some(if muted { "alerts off" } else { "alerts on" }.into());
            }
            Some(false) => self.message = Some(format!("task not found: {}", id)),
            None => {}
        }
    }

    pub fn delete(&mut self, id: &str) {
        let cursor = self.cursor;
        match self.with_store(|session, _| session.delete(id)) {
            Some(Some(removed)) => {
                self.collapsed.remove(&removed.id);
                self.message = Some(format!("deleted \"{}\"", removed.text));
            }
            Some(None) => self.message = Some(format!("task not found: {}", id)),
            None => {}
        }
        self.cursor = cursor;
        self.clamp_cursor();
    }

    /// Validate and apply the open form. On error the form stays open with
    /// the message shown.
    pub fn submit_form(&mut self) {
        let Mode::Form(form) = &self.mode else { return };
        let form = form.clone();
        let now = self.clock.now();

        let new = match form.window(now) {
            Ok((start, end)) => NewTask {
                text: form.text.clone(),
                start,
                end,
            },
            Err(e) => return self.set_form_error(e.to_string()),
        };

        let outcome = match &form.kind {
            FormKind::Add { parent } => self
                .with_store(|session, _| session.add(new, parent.as_deref()))
                .map(|r| r.map(|id| id.ok_or_else(|| "parent task no longer exists".to_string()))),
            FormKind::Edit { id } => self
                .with_store(|session, now| session.edit(id, new, now))
                .map(|r| {
                    r.map(|changed| {
                        if changed {
                            Ok(id.clone())
                        } else {
                            Err(format!("task not found: {}", id))
                        }
                    })
                }),
        };

        match outcome {
            None => {}
            Some(Err(e)) => self.set_form_error(e.to_string()),
            Some(Ok(Err(e))) => {
                self.mode = Mode::Navigate;
                self.message = Some(e);
            }
            Some(Ok(Ok(id))) => {
                self.mode = Mode::Navigate;
                if let FormKind::Add {
                    parent: Some(parent),
                } = &form.kind
                {
                    self.collapsed.remove(parent);
                }
                self.select_id(&id);
            }
        }
    }

    fn set_form_error(&mut self, error: String) {
        if let Mode::Form(form) = &mut self.mode {
            form.error = Some(error);
        }
    }
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

/// Flatten the tree into visible rows. Subtasks of collapsed tasks are
/// skipped.
pub fn flatten_tasks(tasks: &[Task], collapsed: &HashSet<String>) -> Vec<FlatItem> {
    let mut items = Vec::new();
    flatten_tasks_inner(tasks, 0, &mut items, collapsed, &[], &[]);
    items
}

fn flatten_tasks_inner(
    tasks: &[Task],
    depth: usize,
    items: &mut Vec<FlatItem>,
    collapsed: &HashSet<String>,
    ancestor_last: &[bool],
    parent_path: &[usize],
) {
    let count = tasks.len();
    for (i, task) in tasks.iter().enumerate() {
        let is_last = i == count - 1;
        let has_children = !task.subtasks.is_empty();

        let mut path = parent_path.to_vec();
        path.push(i);

        let is_expanded = has_children && !collapsed.contains(&task.id);

        items.push(FlatItem {
            path: path.clone(),
            depth,
            has_children,
            is_expanded,
            is_last_sibling: is_last,
            ancestor_last: ancestor_last.to_vec(),
        });

        if is_expanded {
            let mut new_ancestor_last = ancestor_last.to_vec();
            new_ancestor_last.push(is_last);
            flatten_tasks_inner(
                &task.subtasks,
                depth + 1,
                items,
                collapsed,
                &new_ancestor_last,
                &path,
            );
        }
    }
}

// ---------------------------------------------------------------------------
// UI state
// ---------------------------------------------------------------------------

/// Restore cursor and collapsed set from .state.json. IDs that no longer
/// exist are dropped.
pub fn restore_ui_state(app: &mut App) {
    let Some(state) = read_ui_state(&app.data_dir) else {
        return;
    };
    app.collapsed = state
        .collapsed
        .into_iter()
        .filter(|id| task_ops::find_task(app.tasks(), id).is_some())
        .collect();
    if let Some(id) = state.cursor {
        app.select_id(&id);
    }
}

/// Save cursor and collapsed set to .state.json
pub fn save_ui_state(app: &App) {
    let state = UiState {
        cursor: app.cursor_id(),
        collapsed: app.collapsed.iter().cloned().collect(),
    };
    if let Err(e) = write_ui_state(&app.data_dir, &state) {
        log::warn!("could not save ui state error={}", e);
    }
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

pub fn run(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let session = {
        let _lock = ctx.lock()?;
        ctx.open_session(Utc::now())
    };

    let mut app = App::new(
        session,
        ctx.data_dir.clone(),
        ctx.dispatcher(),
        Theme::from_config(&ctx.config.ui),
    );
    restore_ui_state(&mut app);

    let store_file = format!("{}.json", TASKS_KEY);
    let watcher = match StoreWatcher::start(&ctx.data_dir, &store_file) {
        Ok(w) => Some(w),
        Err(e) => {
            log::warn!("store watcher unavailable error={}", e);
            None
        }
    };
    let ticker = Ticker::from_millis(ctx.config.clock.tick_ms);
    log::info!("tui started period_ms={}", ticker.period().as_millis());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Install panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let result = run_event_loop(&mut terminal, &mut app, ticker, watcher.as_ref());

    save_ui_state(&app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Redraw, wait for a key until the next tick is due, then drain store
/// changes and run the tick.
fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut ticker: Ticker,
    watcher: Option<&StoreWatcher>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut save_counter = 0u32;
    loop {
        app.now = app.clock.now();
        terminal.draw(|frame| render::render(frame, app))?;

        if event::poll(ticker.until_next(Instant::now()))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            input::handle_key(app, key);
            // Debounced state save: every ~5 key presses
            save_counter += 1;
            if save_counter >= 5 {
                save_ui_state(app);
                save_counter = 0;
            }
        }

        if let Some(watcher) = watcher
            && watcher.changed()
        {
            app.reload();
        }

        if ticker.poll(Instant::now()) {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

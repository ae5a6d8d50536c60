use std::io::Write;
use std::time::Instant;

use chrono::Utc;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::context::Context;
use crate::io::clock::Ticker;
use crate::io::config_io;
use crate::io::session::Session;
use crate::io::store::FileStore;
use crate::ops::scan;
use crate::ops::task_ops::{self, NewTask, TaskEdit};
use crate::parse::when::parse_when;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(ctx: &Context, command: Commands, json: bool) -> CmdResult {
    match command {
        // Read commands
        Commands::List(args) => cmd_list(ctx, args, json),
        Commands::Show(args) => cmd_show(ctx, args, json),
        Commands::Stats => cmd_stats(ctx, json),
        Commands::Recovery(args) => cmd_recovery(ctx, args, json),
        Commands::Config(args) => cmd_config(ctx, args, json),

        // Write commands
        Commands::Add(args) => cmd_add(ctx, args, json),
        Commands::Edit(args) => cmd_edit(ctx, args, json),
        Commands::Done(args) => cmd_done(ctx, args, json),
        Commands::Mute(args) => cmd_mute(ctx, args, json),
        Commands::Rm(args) => cmd_rm(ctx, args, json),

        // Alerts
        Commands::Scan => cmd_scan(ctx, json),
        Commands::Watch(args) => cmd_watch(ctx, args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Surface a failed save: the change is only in the recovery log now
fn check_saved(session: &Session<FileStore>) -> CmdResult {
    if session.last_save_failed() {
        return Err("could not save tasks; the unsaved tree is in the recovery log (tm recovery)".into());
    }
    Ok(())
}

/// Print the task after a toggle, as JSON or one line
fn print_task(session: &Session<FileStore>, id: &str, json: bool) -> CmdResult {
    let now = Utc::now();
    let task = task_ops::find_task(session.tasks(), id).ok_or_else(|| format!("task not found: {}", id))?;
    if json {
        print_json(&task_to_json(task, now))
    } else {
        println!("{}", format_task_line(task, now));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(ctx: &Context, args: ListArgs, json: bool) -> CmdResult {
    let now = Utc::now();
    let session = ctx.view_session(now);
    let tasks = session.tasks();

    if json {
        return print_json(&tree_to_json(tasks, now, args.pending));
    }

    let lines: Vec<String> = tasks
        .iter()
        .flat_map(|t| format_task_tree(t, 0, now, args.pending))
        .collect();
    if lines.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    for line in lines {
        println!("{}", line);
    }
    if let Some(next) = scan::next_boundary(tasks, now) {
        println!();
        println!("{}", format_upcoming(&next, now));
    }
    Ok(())
}

fn cmd_show(ctx: &Context, args: IdArg, json: bool) -> CmdResult {
    let now = Utc::now();
    let session = ctx.view_session(now);
    let id = task_ops::resolve_id(session.tasks(), &args.id)?;
    let task = task_ops::find_task(session.tasks(), &id).ok_or_else(|| format!("task not found: {}", id))?;

    if json {
        return print_json(&task_to_json(task, now));
    }
    let ancestors = task_ops::ancestors(session.tasks(), &id);
    for line in format_task_detail(task, &ancestors, now) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_stats(ctx: &Context, json: bool) -> CmdResult {
    let session = ctx.view_session(Utc::now());
    let stats = session.stats();
    if json {
        return print_json(&stats_to_json(&stats));
    }
    println!("{}", format_stats(&stats));
    Ok(())
}

fn cmd_recovery(ctx: &Context, args: RecoveryCmd, json: bool) -> CmdResult {
    let log = ctx.recovery();
    match args.action {
        Some(RecoveryAction::Path) => {
            println!("{}", log.path().display());
            Ok(())
        }
        Some(RecoveryAction::Prune(prune)) => {
            let before = prune
                .before
                .as_deref()
                .map(|s| parse_when(s, Utc::now()))
                .transpose()?;
            let removed = log.prune(before, prune.all)?;
            if json {
                return print_json(&serde_json::json!({ "removed": removed }));
            }
            println!("pruned {} entries", removed);
            Ok(())
        }
        None => {
            let entries = log.read(Some(args.limit.unwrap_or(10)));
            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("recovery log is empty");
                return Ok(());
            }
            for entry in &entries {
                print!("{}", entry.to_markdown());
            }
            if let Some(summary) = log.summary()
                && summary.entry_count > entries.len()
            {
                println!("({} of {} entries shown)", entries.len(), summary.entry_count);
            }
            Ok(())
        }
    }
}

fn cmd_config(ctx: &Context, args: ConfigArgs, json: bool) -> CmdResult {
    let path = config_io::config_path();
    if args.init {
        if config_io::write_default_config(&path)? {
            println!("wrote {}", path.display());
        } else {
            println!("config already exists: {}", path.display());
        }
        return Ok(());
    }

    if json {
        return print_json(&serde_json::json!({
            "config_path": path,
            "data_dir": ctx.data_dir,
            "config": ctx.config,
        }));
    }
    println!("# config file: {}", path.display());
    println!("# data dir: {}", ctx.data_dir.display());
    print!("{}", toml::to_string_pretty(&ctx.config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(ctx: &Context, args: AddArgs, json: bool) -> CmdResult {
    let now = Utc::now();
    let start = match args.start.as_deref() {
        Some(s) => parse_when(s, now)?,
        None => now,
    };
    let end = parse_when(&args.end, now)?;

    let _lock = ctx.lock()?;
    let mut session = ctx.open_session(now);
    let parent = args
        .parent
        .as_deref()
        .map(|p| task_ops::resolve_id(session.tasks(), p))
        .transpose()?;

    let new = NewTask {
        text: args.text,
        start,
        end,
    };
    let id = session
        .add(new, parent.as_deref())?
        .ok_or_else(|| format!("task not found: {}", parent.as_deref().unwrap_or_default()))?;
    check_saved(&session)?;

    if json {
        return print_json(&serde_json::json!({ "id": id }));
    }
    println!("{}", id);
    Ok(())
}

fn cmd_edit(ctx: &Context, args: EditArgs, json: bool) -> CmdResult {
    let now = Utc::now();
    let _lock = ctx.lock()?;
    let mut session = ctx.open_session(now);
    let id = task_ops::resolve_id(session.tasks(), &args.id)?;
    let task = task_ops::find_task(session.tasks(), &id).ok_or_else(|| format!("task not found: {}", id))?;

    let edit = TaskEdit {
        text: args.text.unwrap_or_else(|| task.text.clone()),
        start: match args.start.as_deref() {
            Some(s) => parse_when(s, now)?,
            None => task.start_time,
        },
        end: match args.end.as_deref() {
            Some(s) => parse_when(s, now)?,
            None => task.end_time,
        },
    };
    session.edit(&id, edit, now)?;
    check_saved(&session)?;
    print_task(&session, &id, json)
}

fn cmd_done(ctx: &Context, args: IdArg, json: bool) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut session = ctx.open_session(Utc::now());
    let id = task_ops::resolve_id(session.tasks(), &args.id)?;
    session.toggle_complete(&id);
    check_saved(&session)?;
    print_task(&session, &id, json)
}

fn cmd_mute(ctx: &Context, args: IdArg, json: bool) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut session = ctx.open_session(Utc::now());
    let id = task_ops::resolve_id(session.tasks(), &args.id)?;
    session.toggle_notifications(&id);
    check_saved(&session)?;
    print_task(&session, &id, json)
}

fn cmd_rm(ctx: &Context, args: IdArg, json: bool) -> CmdResult {
    let _lock = ctx.lock()?;
    let mut session = ctx.open_session(Utc::now());
    let id = task_ops::resolve_id(session.tasks(), &args.id)?;
    let removed = session
        .delete(&id)
        .ok_or_else(|| format!("task not found: {}", id))?;
    check_saved(&session)?;

    let removed_count = task_ops::stats(std::slice::from_ref(&removed)).total;
    if json {
        return print_json(&serde_json::json!({ "id": removed.id, "removed": removed_count }));
    }
    println!("deleted {} \"{}\" ({} tasks)", removed.short_id(), removed.text, removed_count);
    Ok(())
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

fn cmd_scan(ctx: &Context, json: bool) -> CmdResult {
    let now = Utc::now();
    let _lock = ctx.lock()?;
    let mut session = ctx.open_session(now);
    let fired = session.tick(now, &ctx.dispatcher());
    check_saved(&session)?;
    let next = scan::next_boundary(session.tasks(), now);

    if json {
        return print_json(&ScanJson { fired, next });
    }
    if fired.is_empty() {
        println!("nothing due");
    }
    for event in &fired {
        println!("{}", format_event(event));
    }
    if let Some(next) = next {
        println!("{}", format_upcoming(&next, now));
    }
    Ok(())
}

/// Headless tick loop. Each tick reloads the store under the lock so edits
/// from other processes are seen, then scans.
fn cmd_watch(ctx: &Context, args: WatchArgs, json: bool) -> CmdResult {
    let mut ticker = Ticker::from_millis(args.tick_ms.unwrap_or(ctx.config.clock.tick_ms));
    let dispatcher = ctx.dispatcher();
    let mut session = {
        let _lock = ctx.lock()?;
        ctx.open_session(Utc::now())
    };
    log::info!("watch started period_ms={}", ticker.period().as_millis());
    if !json {
        println!("watching {} (Ctrl-C to stop)", ctx.data_dir.display());
    }

    loop {
        std::thread::sleep(ticker.until_next(Instant::now()));
        if !ticker.poll(Instant::now()) {
            continue;
        }
        let lock = match ctx.lock() {
            Ok(lock) => lock,
            Err(e) => {
                log::warn!("watch tick skipped error={}", e);
                continue;
            }
        };
        let now = Utc::now();
        session.reload(now);
        let fired = session.tick(now, &dispatcher);
        drop(lock);

        for event in &fired {
            if json {
                println!("{}", serde_json::to_string(event)?);
            } else {
                println!("{}", format_event(event));
            }
        }
        if !fired.is_empty() {
            std::io::stdout().flush()?;
        }
    }
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tm",
    about = concat!("taskmaster v", env!("CARGO_PKG_VERSION"), " - countdown tasks with deadline alerts"),
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different data directory
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a task (or a subtask with --parent)
    Add(AddArgs),
    /// Change a task's text or window
    Edit(EditArgs),
    /// Toggle completion (completing also completes subtasks)
    Done(IdArg),
    /// Toggle alerts for one task
    Mute(IdArg),
    /// Delete a task and its subtasks
    Rm(IdArg),
    /// Show the task tree with countdowns
    List(ListArgs),
    /// Show one task in detail
    Show(IdArg),
    /// Show completion counts
    Stats,
    /// Run one notification scan now and fire any due alerts
    Scan,
    /// Keep scanning and firing alerts until interrupted
    Watch(WatchArgs),
    /// View or prune the recovery log
    Recovery(RecoveryCmd),
    /// Show the effective configuration
    Config(ConfigArgs),
}

// ---------------------------------------------------------------------------
// Task commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Task text
    pub text: String,
    /// When the task is due (e.g. +2h, 17:30, "2025-06-01 09:00")
    #[arg(long)]
    pub end: String,
    /// When the task starts (default: now)
    #[arg(long)]
    pub start: Option<String>,
    /// Add as a subtask of this task (ID or unique prefix)
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task ID or unique prefix
    pub id: String,
    /// New text
    #[arg(long)]
    pub text: Option<String>,
    /// New start time
    #[arg(long)]
    pub start: Option<String>,
    /// New end time
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Args)]
pub struct IdArg {
    /// Task ID or unique prefix
    pub id: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Hide completed tasks (their subtasks are hidden too)
    #[arg(long)]
    pub pending: bool,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Scan period in milliseconds (default: [clock] tick_ms)
    #[arg(long)]
    pub tick_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this (default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigArgs {
    /// Write a commented default config file if none exists
    #[arg(long)]
    pub init: bool,
}

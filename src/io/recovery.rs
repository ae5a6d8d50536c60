use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;

use crate::io::store::atomic_write;

/// Log size above which entries older than the prune age are dropped on append
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Entries older than this are removed by a default prune
pub const PRUNE_AGE_DAYS: i64 = 30;

const FILE_NAME: &str = "recovery.md";

const FILE_HEADER: &str = "\
<!-- taskmaster recovery log
     Data that could not be loaded or saved normally ends up here,
     along with every deleted task subtree.
     View with: tm recovery
     Prune with: tm recovery prune -->

";

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryCategory {
    /// Store content that failed to decode
    Parse,
    /// A tree that could not be persisted
    Write,
    /// A deleted subtree
    Delete,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecoveryCategory::Parse => "parse",
            RecoveryCategory::Write => "write",
            RecoveryCategory::Delete => "delete",
        })
    }
}

impl std::str::FromStr for RecoveryCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parse" => Ok(RecoveryCategory::Parse),
            "write" => Ok(RecoveryCategory::Write),
            "delete" => Ok(RecoveryCategory::Delete),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    /// Raw captured data, rendered as a fenced block
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Markdown block as written to the log
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} [{}] {}\n\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.category,
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("- {}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            if !self.fields.is_empty() {
                out.push('\n');
            }
            out.push_str("```json\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push('\n');
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoverySummary {
    pub entry_count: usize,
    pub oldest: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Log file
// ---------------------------------------------------------------------------

/// Append-only markdown log living in the data directory.
#[derive(Debug, Clone)]
pub struct RecoveryLog {
    path: PathBuf,
}

impl RecoveryLog {
    pub fn in_dir(dir: &Path) -> Self {
        RecoveryLog {
            path: dir.join(FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry. Failures are logged and reported as `false`: the
    /// recovery log is itself the last resort.
    pub fn record(&self, entry: RecoveryEntry) -> bool {
        match self.append(&entry) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "recovery log append failed path={} category={} error={}",
                    self.path.display(),
                    entry.category,
                    e
                );
                false
            }
        }
    }

    fn append(&self, entry: &RecoveryEntry) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if std::fs::metadata(&self.path).is_ok_and(|m| m.len() > MAX_LOG_SIZE) {
            let cutoff = Utc::now() - Duration::days(PRUNE_AGE_DAYS);
            self.rewrite_since(cutoff)?;
        }
        let needs_header = std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if needs_header {
            file.write_all(FILE_HEADER.as_bytes())?;
        }
        file.write_all(entry.to_markdown().as_bytes())
    }

    /// All entries, oldest first. A missing file reads as empty.
    fn entries(&self) -> Vec<RecoveryEntry> {
        std::fs::read_to_string(&self.path)
            .map(|content| parse_entries(&content))
            .unwrap_or_default()
    }

    /// Most recent entries first, optionally limited to the newest `limit`.
    pub fn read(&self, limit: Option<usize>) -> Vec<RecoveryEntry> {
        let mut entries = self.entries();
        entries.reverse();
        if let Some(n) = limit {
            entries.truncate(n);
        }
        entries
    }

    pub fn summary(&self) -> Option<RecoverySummary> {
        let entries = self.entries();
        if entries.is_empty() {
            return None;
        }
        Some(RecoverySummary {
            entry_count: entries.len(),
            oldest: entries.iter().map(|e| e.timestamp).min(),
        })
    }

    /// Remove every entry (`all`) or those older than `before` (default:
    /// [`PRUNE_AGE_DAYS`] ago). Returns how many entries were removed.
    pub fn prune(&self, before: Option<DateTime<Utc>>, all: bool) -> io::Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        let cutoff = if all {
            DateTime::<Utc>::MAX_UTC
        } else {
            before.unwrap_or_else(|| Utc::now() - Duration::days(PRUNE_AGE_DAYS))
        };
        self.rewrite_since(cutoff)
    }

    fn rewrite_since(&self, cutoff: DateTime<Utc>) -> io::Result<usize> {
        let entries = self.entries();
        let before = entries.len();
        let mut content = String::from(FILE_HEADER);
        let mut kept = 0;
        for entry in entries.iter().filter(|e| e.timestamp >= cutoff) {
            content.push_str(&entry.to_markdown());
            kept += 1;
        }
        atomic_write(&self.path, content.as_bytes())?;
        Ok(before - kept)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// `<rfc3339> [<category>] <description>`
fn parse_header(header: &str) -> Option<(DateTime<Utc>, RecoveryCategory, String)> {
    let (stamp, rest) = header.split_once(" [")?;
    let (category, description) = rest.split_once("] ")?;
    let timestamp = DateTime::parse_from_rfc3339(stamp).ok()?.with_timezone(&Utc);
    Some((timestamp, category.parse().ok()?, description.to_string()))
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries: Vec<RecoveryEntry> = Vec::new();
    let mut in_block = false;

    for line in content.lines() {
        if in_block {
            if line == "```" {
                in_block = false;
            } else if let Some(entry) = entries.last_mut() {
                if !entry.body.is_empty() {
                    entry.body.push('\n');
                }
                entry.body.push_str(line);
            }
            continue;
        }

        if let Some(header) = line.strip_prefix("## ") {
            if let Some((timestamp, category, description)) = parse_header(header) {
                entries.push(RecoveryEntry {
                    timestamp,
                    category,
                    description,
                    fields: Vec::new(),
                    body: String::new(),
                });
            }
        } else if line.starts_with("```") {
            in_block = true;
        } else if let Some(field) = line.strip_prefix("- ")
            && let Some((key, value)) = field.split_once(": ")
            && let Some(entry) = entries.last_mut()
        {
            entry.fields.push((key.to_string(), value.to_string()));
        }
    }

    entries
}

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::io::store::atomic_write;

const STATE_FILE: &str = ".state.json";

/// TUI state that survives restarts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UiState {
    /// ID of the task under the cursor
    #[serde(default)]
    pub cursor: Option<String>,
    /// IDs of tasks whose subtasks are hidden
    #[serde(default)]
    pub collapsed: BTreeSet<String>,
}

/// Missing or malformed state reads as `None`
pub fn read_ui_state(dir: &Path) -> Option<UiState> {
    let content = std::fs::read_to_string(dir.join(STATE_FILE)).ok()?;
    serde_json::from_str(&content).ok()
}

pub fn write_ui_state(dir: &Path, state: &UiState) -> std::io::Result<()> {
    let content = serde_json::to_string_pretty(state)?;
    atomic_write(&dir.join(STATE_FILE), content.as_bytes())
}

use ratatui::text::Span;

use crate::model::Task;
use crate::util::unicode;

/// Checkbox for a task's completion state
pub(super) fn check_symbol(task: &Task) -> &'static str {
    if task.is_completed { "[x]" } else { "[ ]" }
}

/// Compute total display width of a slice of spans
pub(super) fn spans_width(spans: &[Span]) -> usize {
    spans
        .iter()
        .map(|s| unicode::display_width(&s.content))
        .sum()
}

/// Cells left between a left and right part, or `None` if they overlap
pub(super) fn gap_between(left: usize, right: usize, width: usize) -> Option<usize> {
    width.checked_sub(left + right).filter(|gap| *gap > 0)
}

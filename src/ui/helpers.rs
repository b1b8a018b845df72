use anyhow::Error;
use chrono::NaiveDate;
use ratatui::layout::{Constraint, Direction, Layout, Rect};

use crate::error::LibraryError;

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Message to show the operator for a failed action. Library outcomes are
/// already worded for the footer; anything else falls back to the innermost
/// cause in the chain.
pub(crate) fn surface_error(err: &Error) -> String {
    if let Some(library) = err.downcast_ref::<LibraryError>() {
        return library.to_string();
    }
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

/// True when the error must stop the event loop instead of being shown.
pub(crate) fn is_fatal(err: &Error) -> bool {
    err.downcast_ref::<LibraryError>()
        .is_some_and(|library| !library.is_recoverable())
}

/// Move a list cursor by `offset`, clamped to `0..len`.
pub(crate) fn offset_index(current: usize, len: usize, offset: isize) -> usize {
    if len == 0 {
        return 0;
    }
    current.saturating_add_signed(offset).min(len - 1)
}

pub(crate) fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn offset_index_clamps_to_bounds() {
        assert_eq!(offset_index(0, 5, -1), 0);
        assert_eq!(offset_index(3, 5, 5), 4);
        assert_eq!(offset_index(2, 5, -1), 1);
        assert_eq!(offset_index(4, 0, 1), 0);
    }

    #[test]
    fn library_errors_surface_their_own_message() {
        let err: Error = LibraryError::NoOpenLoan {
            isbn: "9780131103627".into(),
        }
        .into();
        let err = err.context("check-in failed");
        assert_eq!(
            surface_error(&err),
            "Book with ISBN 9780131103627 has no outstanding loan to check in."
        );
        assert!(!is_fatal(&err));
    }

    #[test]
    fn other_errors_surface_innermost_cause() {
        let err = anyhow!("disk full").context("failed to save");
        assert_eq!(surface_error(&err), "disk full");
    }
}

use chrono::NaiveDate;

use crate::models::{ActiveLoan, Borrower, LateLoan, SearchHit, TreeLevel};

use super::helpers::offset_index;

/// A list plus the highlighted row. Every screen that shows rows keeps one so
/// navigation keys behave identically everywhere.
pub(crate) struct Listing<T> {
    pub(crate) items: Vec<T>,
    pub(crate) selected: usize,
}

impl<T> Listing<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self { items, selected: 0 }
    }

    pub(crate) fn current(&self) -> Option<&T> {
        self.items.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = offset_index(self.selected, self.items.len(), offset);
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.items.len().saturating_sub(1);
    }

    /// Swap in freshly queried rows, keeping the cursor on the row matching
    /// `keep` when it survived the reload.
    pub(crate) fn replace<F>(&mut self, items: Vec<T>, keep: F)
    where
        F: Fn(&T) -> bool,
    {
        self.items = items;
        if let Some(index) = self.items.iter().position(keep) {
            self.selected = index;
        } else {
            self.selected = self.selected.min(self.items.len().saturating_sub(1));
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

/// Results of the last search, re-run after every mutation so the loan
/// snapshot stays current.
pub(crate) struct SearchScreen {
    pub(crate) term: String,
    pub(crate) results: Listing<SearchHit>,
}

/// Overdue open loans as of the day the screen was opened.
pub(crate) struct LateScreen {
    pub(crate) as_of: NaiveDate,
    pub(crate) loans: Listing<LateLoan>,
}

/// One borrower and the books they currently hold.
pub(crate) struct BorrowerScreen {
    pub(crate) borrower: Borrower,
    pub(crate) loans: Listing<ActiveLoan>,
}

/// Tree level chooser for the book identified by `isbn`.
pub(crate) struct TreeLevelPicker {
    pub(crate) isbn: String,
    pub(crate) title: String,
    pub(crate) levels: Listing<TreeLevel>,
}

impl TreeLevelPicker {
    /// Open the picker with the book's current level highlighted.
    pub(crate) fn new(
        isbn: String,
        title: String,
        levels: Vec<TreeLevel>,
        current: Option<i64>,
    ) -> Self {
        let mut listing = Listing::new(Vec::new());
        listing.replace(levels, |level| Some(level.id) == current);
        Self {
            isbn,
            title,
            levels: listing,
        }
    }
}

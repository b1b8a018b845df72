//! Domain models that mirror the SQLite schema and get passed between the
//! persistence layer and the TUI. They stay plain data holders; the rules
//! about copy counts and loan lifecycle live in `db`.

use std::fmt;

use chrono::{Days, NaiveDate};

/// Length of a loan. Due dates are never stored, only derived from the
/// borrow date.
pub const LOAN_PERIOD_DAYS: u64 = 14;

/// Label shown for books without a tree level.
pub const UNASSIGNED_LEVEL: &str = "Not assigned";

/// Compute the due date for a loan opened on `borrow_date`.
pub fn due_date(borrow_date: NaiveDate) -> NaiveDate {
    borrow_date
        .checked_add_days(Days::new(LOAN_PERIOD_DAYS))
        .unwrap_or(NaiveDate::MAX)
}

#[derive(Debug, Clone, PartialEq)]
/// A catalogued title. One row covers every physical copy of the same ISBN.
pub struct Book {
    /// Surrogate key; also the stable listing order.
    pub id: i64,
    pub title: String,
    /// Author names joined with `", "` in the order the lookup returned them.
    pub authors: String,
    pub publisher: Option<String>,
    /// Free text as supplied by the lookup (`"1988"`, `"1988-04-01"`, ...).
    pub published_date: Option<String>,
    pub isbn: String,
    pub page_count: Option<i64>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub category: Option<String>,
    /// Copies currently on the shelf. Never negative.
    pub copies_available: i64,
    /// Copies owned. `total_copies - copies_available` is the number of open
    /// loans for this book.
    pub total_copies: i64,
    pub tree_level_id: Option<i64>,
    /// Reference-only books can never be checked out.
    pub reference_only: bool,
}

impl Book {
    /// `Title - Authors`, omitting the hyphen when no author is known.
    pub fn display_title(&self) -> String {
        if self.authors.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.authors)
        }
    }

    pub fn copies_on_loan(&self) -> i64 {
        self.total_copies - self.copies_available
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A book joined with the name of its tree level, as produced by the catalog
/// listing.
pub struct BookListing {
    pub book: Book,
    pub tree_level: Option<String>,
}

impl BookListing {
    pub fn tree_level_label(&self) -> &str {
        self.tree_level.as_deref().unwrap_or(UNASSIGNED_LEVEL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A named category bucket. Flat: there is no parent link.
pub struct TreeLevel {
    pub id: i64,
    pub name: String,
}

impl fmt::Display for TreeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.id, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Borrower {
    pub id: i64,
    /// Externally issued library card identifier.
    pub card_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One loan of one copy. Open while `return_date` is `None`; check-in stamps
/// the return date and keeps the row as history.
pub struct Loan {
    pub id: i64,
    pub book_id: i64,
    pub borrower_id: i64,
    pub borrow_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }

    pub fn due_date(&self) -> NaiveDate {
        due_date(self.borrow_date)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Result of a checkout or check-in, carrying what the footer needs to report.
pub struct LoanReceipt {
    pub loan: Loan,
    pub title: String,
    pub card_id: String,
    /// Copies on the shelf after the transition committed.
    pub copies_available: i64,
}

#[derive(Debug, Clone, PartialEq)]
/// Outcome of adding a book by ISBN.
pub enum AddOutcome {
    /// First copy of a new title.
    Inserted(Book),
    /// The ISBN was already catalogued; one more copy was added.
    Incremented {
        isbn: String,
        title: String,
        copies_available: i64,
    },
}

impl AddOutcome {
    pub fn copies_available(&self) -> i64 {
        match self {
            AddOutcome::Inserted(book) => book.copies_available,
            AddOutcome::Incremented {
                copies_available, ..
            } => *copies_available,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An open loan as shown on the borrower details screen.
pub struct ActiveLoan {
    pub loan_id: i64,
    pub title: String,
    pub isbn: String,
    pub borrow_date: NaiveDate,
}

impl ActiveLoan {
    pub fn due_date(&self) -> NaiveDate {
        due_date(self.borrow_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An open loan whose due date has passed.
pub struct LateLoan {
    pub loan_id: i64,
    pub title: String,
    pub isbn: String,
    pub card_id: String,
    pub borrow_date: NaiveDate,
}

impl LateLoan {
    pub fn due_date(&self) -> NaiveDate {
        due_date(self.borrow_date)
    }

    /// Whole days past the due date as of `as_of`.
    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        (as_of - self.due_date()).num_days()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Most recent loan of a book at the time of a search. A `None` return date
/// means the copy is still out.
pub struct LoanSnapshot {
    pub card_id: String,
    pub borrow_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub book: Book,
    pub tree_level: Option<String>,
    pub last_loan: Option<LoanSnapshot>,
}

impl SearchHit {
    pub fn tree_level_label(&self) -> &str {
        self.tree_level.as_deref().unwrap_or(UNASSIGNED_LEVEL)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Normalized bibliographic record produced by a metadata lookup. Every field
/// apart from `preferred_isbn` may be missing upstream.
pub struct BookRecord {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<i64>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub categories: Vec<String>,
    /// ISBN-13 when the source knows one, otherwise ISBN-10.
    pub preferred_isbn: String,
}

impl BookRecord {
    pub fn authors_line(&self) -> String {
        self.authors.join(", ")
    }

    pub fn categories_line(&self) -> String {
        self.categories.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn due_date_is_two_weeks_after_borrowing() {
        assert_eq!(due_date(date(2024, 2, 20)), date(2024, 3, 5));
    }

    #[test]
    fn late_loan_counts_days_past_due() {
        let loan = LateLoan {
            loan_id: 1,
            title: "Dune".into(),
            isbn: "9780441013593".into(),
            card_id: "B001".into(),
            borrow_date: date(2024, 1, 1),
        };
        assert_eq!(loan.days_overdue(date(2024, 1, 21)), 6);
    }

    #[test]
    fn unassigned_listing_uses_marker() {
        let listing = BookListing {
            book: Book {
                id: 1,
                title: "Dune".into(),
                authors: String::new(),
                publisher: None,
                published_date: None,
                isbn: "9780441013593".into(),
                page_count: None,
                description: None,
                language: None,
                category: None,
                copies_available: 1,
                total_copies: 1,
                tree_level_id: None,
                reference_only: false,
            },
            tree_level: None,
        };
        assert_eq!(listing.tree_level_label(), UNASSIGNED_LEVEL);
        assert_eq!(listing.book.display_title(), "Dune");
    }
}

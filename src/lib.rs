//! Small-library circulation manager: a SQLite catalog of books with copy
//! counts, borrowers, loans and shelf locations ("tree levels"), metadata
//! lookup by ISBN, and a terminal UI for the front desk.
//!
//! Everything the binary does goes through the functions re-exported here, so
//! tests and other tooling can drive the same operations without a terminal.
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod models;
pub mod ui;

pub use config::Config;
pub use db::{
    active_loans_for, add_or_increment_book, add_tree_level, assign_tree_level, check_in,
    check_out, fetch_tree_levels, find_book, find_borrower, late_loans, list_books,
    open_database, open_in_memory, register_borrower, search_books, set_reference_only,
};
pub use error::{LibraryError, LibraryResult};
pub use lookup::{normalize_isbn, GoogleBooksClient, MetadataSource};
pub use models::{AddOutcome, Book, BookListing, BookRecord, Borrower, Loan, TreeLevel};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};

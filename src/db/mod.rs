//! Persistence layer split across the catalog, borrower registry, loan ledger
//! and read-only search.

mod borrowers;
mod catalog;
mod connection;
mod loans;
mod search;

pub use borrowers::{active_loans_for, find_borrower, register_borrower};
pub use catalog::{
    add_or_increment_book, add_tree_level, assign_tree_level, fetch_tree_levels, find_book,
    list_books, set_reference_only,
};
pub use connection::{open_database, open_in_memory};
pub use loans::{check_in, check_out, late_loans, open_loan_count};
pub use search::search_books;

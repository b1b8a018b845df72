//! Typed failure outcomes for catalog, registry and ledger operations.
//!
//! Everything except [`LibraryError::Storage`] is an expected result the
//! operator can react to (retry, pick another book, register the borrower
//! first). Storage failures abort the current operation; the surrounding
//! transaction is rolled back when it is dropped.

use rusqlite::{ffi, Error as SqlError};
use thiserror::Error;

/// Result alias used by the persistence layer.
pub type LibraryResult<T> = Result<T, LibraryError>;

#[derive(Debug, Error)]
pub enum LibraryError {
    /// Lookup of a book, borrower, tree level or loan missed.
    #[error("No {entity} found with {key}.")]
    NotFound { entity: &'static str, key: String },

    /// Unique constraint on ISBN, card id or tree level name.
    #[error("A {entity} '{key}' already exists.")]
    DuplicateKey { entity: &'static str, key: String },

    /// The insert half of add-or-increment lost a race on the ISBN constraint.
    #[error("Book with ISBN {isbn} was inserted concurrently; try again.")]
    InsertRace { isbn: String },

    #[error("'{title}' is for reference only and cannot be checked out.")]
    ReferenceOnly { title: String },

    #[error("No available copies of '{title}' to check out.")]
    NoCopiesAvailable { title: String },

    /// Check-in was requested for a book with nothing outstanding.
    #[error("Book with ISBN {isbn} has no outstanding loan to check in.")]
    NoOpenLoan { isbn: String },

    /// Marking a book reference-only while copies are still out.
    #[error("'{title}' has {open} outstanding loan(s); check them in first.")]
    OutstandingLoans { title: String, open: i64 },

    #[error("Metadata lookup for ISBN {isbn} failed: {reason}")]
    ExternalLookupFailed { isbn: String, reason: String },

    #[error("'{input}' is not a valid ISBN-10 or ISBN-13.")]
    InvalidIsbn { input: String },

    #[error("storage failure: {0}")]
    Storage(#[from] SqlError),
}

impl LibraryError {
    pub(crate) fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        LibraryError::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub(crate) fn duplicate(entity: &'static str, key: impl Into<String>) -> Self {
        LibraryError::DuplicateKey {
            entity,
            key: key.into(),
        }
    }

    /// True for every outcome the operator can recover from by choosing a
    /// different action. Storage failures are the only fatal kind.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LibraryError::Storage(_))
    }
}

/// Translate a unique-constraint failure into a [`LibraryError::DuplicateKey`]
/// while passing every other SQLite error through untouched.
pub(crate) fn map_unique_violation(
    err: SqlError,
    entity: &'static str,
    key: &str,
) -> LibraryError {
    if is_unique_violation(&err) {
        LibraryError::duplicate(entity, key)
    } else {
        err.into()
    }
}

pub(crate) fn is_unique_violation(err: &SqlError) -> bool {
    matches!(
        err,
        SqlError::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::loans::open_loan_count;
use crate::error::{is_unique_violation, map_unique_violation, LibraryError, LibraryResult};
use crate::models::{AddOutcome, Book, BookListing, BookRecord, TreeLevel};

/// Column list matching [`book_from_row`]. Queries alias `books` as `b`.
pub(crate) const BOOK_COLUMNS: &str = "b.id, b.title, b.authors, b.publisher, b.published_date, \
     b.isbn, b.page_count, b.description, b.language, b.category, \
     b.copies_available, b.total_copies, b.tree_level_id, b.reference_only";

/// Number of columns consumed by [`book_from_row`]; joined columns start here.
pub(crate) const BOOK_COLUMN_COUNT: usize = 14;

pub(crate) fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        authors: row.get(2)?,
        publisher: row.get(3)?,
        published_date: row.get(4)?,
        isbn: row.get(5)?,
        page_count: row.get(6)?,
        description: row.get(7)?,
        language: row.get(8)?,
        category: row.get(9)?,
        copies_available: row.get(10)?,
        total_copies: row.get(11)?,
        tree_level_id: row.get(12)?,
        reference_only: row.get(13)?,
    })
}

/// Exact ISBN lookup.
pub fn find_book(conn: &Connection, isbn: &str) -> LibraryResult<Book> {
    conn.query_row(
        &format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.isbn = ?1"),
        [isbn],
        book_from_row,
    )
    .optional()?
    .ok_or_else(|| LibraryError::not_found("book", format!("ISBN {isbn}")))
}

/// Add one copy of the book described by `record`. A known ISBN gains a copy;
/// an unknown one is inserted with a single copy. The existence check and the
/// write share one immediate transaction.
pub fn add_or_increment_book(
    conn: &mut Connection,
    record: &BookRecord,
) -> LibraryResult<AddOutcome> {
    let isbn = record.preferred_isbn.trim();
    if isbn.is_empty() {
        return Err(LibraryError::InvalidIsbn {
            input: record.preferred_isbn.clone(),
        });
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let existing: Option<(i64, String)> = tx
        .query_row(
            "SELECT id, title FROM books WHERE isbn = ?1",
            [isbn],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let outcome = match existing {
        Some((id, title)) => {
            tx.execute(
                "UPDATE books
                 SET copies_available = copies_available + 1, total_copies = total_copies + 1
                 WHERE id = ?1",
                [id],
            )?;
            let copies_available: i64 = tx.query_row(
                "SELECT copies_available FROM books WHERE id = ?1",
                [id],
                |row| row.get(0),
            )?;
            AddOutcome::Incremented {
                isbn: isbn.to_string(),
                title,
                copies_available,
            }
        }
        None => {
            let categories = record.categories_line();
            tx.execute(
                "INSERT INTO books (
                    title, authors, publisher, published_date, isbn, page_count,
                    description, language, category, copies_available, total_copies
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, 1)",
                params![
                    record.title.as_deref().unwrap_or_default(),
                    record.authors_line(),
                    record.publisher,
                    record.published_date,
                    isbn,
                    record.page_count,
                    record.description,
                    record.language,
                    (!categories.is_empty()).then_some(categories),
                ],
            )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    LibraryError::InsertRace {
                        isbn: isbn.to_string(),
                    }
                } else {
                    err.into()
                }
            })?;
            let id = tx.last_insert_rowid();
            let book = tx.query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = ?1"),
                [id],
                book_from_row,
            )?;
            AddOutcome::Inserted(book)
        }
    };
    tx.commit()?;

    match &outcome {
        AddOutcome::Inserted(book) => {
            log::info!("catalogued '{}' (ISBN {})", book.title, book.isbn)
        }
        AddOutcome::Incremented {
            isbn,
            copies_available,
            ..
        } => log::info!("added a copy of ISBN {isbn}; {copies_available} now available"),
    }
    Ok(outcome)
}

/// Set the reference-only flag and return the previous value. Marking a book
/// reference-only fails while any of its copies are on loan.
pub fn set_reference_only(conn: &mut Connection, isbn: &str, flag: bool) -> LibraryResult<bool> {
    let tx = conn.transaction()?;
    let book = find_book(&tx, isbn)?;

    if flag && !book.reference_only {
        let open = open_loan_count(&tx, book.id)?;
        if open > 0 {
            return Err(LibraryError::OutstandingLoans {
                title: book.title,
                open,
            });
        }
    }

    tx.execute(
        "UPDATE books SET reference_only = ?1 WHERE id = ?2",
        params![flag, book.id],
    )?;
    tx.commit()?;

    log::info!(
        "reference-only for ISBN {isbn} changed {} -> {flag}",
        book.reference_only
    );
    Ok(book.reference_only)
}

/// Create a named tree level. Names are unique and compared case-sensitively.
pub fn add_tree_level(conn: &Connection, name: &str) -> LibraryResult<TreeLevel> {
    conn.execute("INSERT INTO tree_levels (name) VALUES (?1)", [name])
        .map_err(|err| map_unique_violation(err, "tree level", name))?;

    let level = TreeLevel {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
    };
    log::info!("added tree level {level}");
    Ok(level)
}

/// All tree levels in creation order, for the assignment picker.
pub fn fetch_tree_levels(conn: &Connection) -> LibraryResult<Vec<TreeLevel>> {
    let mut stmt = conn.prepare("SELECT id, name FROM tree_levels ORDER BY id")?;
    let levels = stmt
        .query_map([], |row| {
            Ok(TreeLevel {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(levels)
}

/// Point a book at an existing tree level, returning the level assigned.
pub fn assign_tree_level(
    conn: &mut Connection,
    isbn: &str,
    level_id: i64,
) -> LibraryResult<TreeLevel> {
    let tx = conn.transaction()?;
    let book = find_book(&tx, isbn)?;
    let level = tx
        .query_row(
            "SELECT id, name FROM tree_levels WHERE id = ?1",
            [level_id],
            |row| {
                Ok(TreeLevel {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| LibraryError::not_found("tree level", format!("id {level_id}")))?;

    tx.execute(
        "UPDATE books SET tree_level_id = ?1 WHERE id = ?2",
        params![level.id, book.id],
    )?;
    tx.commit()?;

    log::info!("assigned '{}' to tree level {level}", book.title);
    Ok(level)
}

/// Every book with its tree level name, in insertion order. Each call re-reads
/// the store, so the listing always reflects the latest committed state.
pub fn list_books(conn: &Connection) -> LibraryResult<Vec<BookListing>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOK_COLUMNS}, t.name
         FROM books b
         LEFT JOIN tree_levels t ON t.id = b.tree_level_id
         ORDER BY b.id"
    ))?;

    let books = stmt
        .query_map([], |row| {
            Ok(BookListing {
                book: book_from_row(row)?,
                tree_level: row.get(BOOK_COLUMN_COUNT)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(books)
}

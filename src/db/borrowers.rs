use rusqlite::{Connection, OptionalExtension};

use crate::error::{map_unique_violation, LibraryError, LibraryResult};
use crate::models::{ActiveLoan, Borrower};

/// Register a borrower under an externally issued card id.
pub fn register_borrower(conn: &Connection, card_id: &str) -> LibraryResult<Borrower> {
    conn.execute("INSERT INTO borrowers (card_id) VALUES (?1)", [card_id])
        .map_err(|err| map_unique_violation(err, "borrower", card_id))?;

    log::info!("registered borrower {card_id}");
    Ok(Borrower {
        id: conn.last_insert_rowid(),
        card_id: card_id.to_string(),
    })
}

pub fn find_borrower(conn: &Connection, card_id: &str) -> LibraryResult<Borrower> {
    conn.query_row(
        "SELECT id, card_id FROM borrowers WHERE card_id = ?1",
        [card_id],
        |row| {
            Ok(Borrower {
                id: row.get(0)?,
                card_id: row.get(1)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| LibraryError::not_found("borrower", format!("card ID {card_id}")))
}

/// Open loans held by a borrower, oldest first, joined with the book title and
/// ISBN for the details screen.
pub fn active_loans_for(conn: &Connection, borrower_id: i64) -> LibraryResult<Vec<ActiveLoan>> {
    let mut stmt = conn.prepare(
        "SELECT l.id, b.title, b.isbn, l.borrow_date
         FROM loans l
         INNER JOIN books b ON b.id = l.book_id
         WHERE l.borrower_id = ?1 AND l.return_date IS NULL
         ORDER BY l.borrow_date, l.id",
    )?;

    let loans = stmt
        .query_map([borrower_id], |row| {
            Ok(ActiveLoan {
                loan_id: row.get(0)?,
                title: row.get(1)?,
                isbn: row.get(2)?,
                borrow_date: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(loans)
}

//! The loan ledger. Every transition touches a loan row and the owning book's
//! copy count inside one transaction, so `copies_available` always equals
//! `total_copies` minus the open loans for that book.

use chrono::{Days, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::borrowers::find_borrower;
use super::catalog::find_book;
use crate::error::{LibraryError, LibraryResult};
use crate::models::{LateLoan, Loan, LoanReceipt, LOAN_PERIOD_DAYS};

fn loan_from_row(row: &Row<'_>) -> rusqlite::Result<Loan> {
    Ok(Loan {
        id: row.get(0)?,
        book_id: row.get(1)?,
        borrower_id: row.get(2)?,
        borrow_date: row.get(3)?,
        return_date: row.get(4)?,
    })
}

/// Number of copies of a book currently out.
pub fn open_loan_count(conn: &Connection, book_id: i64) -> LibraryResult<i64> {
    let open = conn.query_row(
        "SELECT COUNT(*) FROM loans WHERE book_id = ?1 AND return_date IS NULL",
        [book_id],
        |row| row.get(0),
    )?;
    Ok(open)
}

/// Lend one copy of `isbn` to the borrower holding `card_id`.
///
/// Checks run in order: the book exists, is not reference-only, has a copy on
/// the shelf, and the borrower exists. The loan insert and the copy decrement
/// commit together or not at all.
pub fn check_out(
    conn: &mut Connection,
    isbn: &str,
    card_id: &str,
    today: NaiveDate,
) -> LibraryResult<LoanReceipt> {
    let tx = conn.transaction()?;
    let book = find_book(&tx, isbn)?;
    if book.reference_only {
        return Err(LibraryError::ReferenceOnly { title: book.title });
    }
    if book.copies_available <= 0 {
        return Err(LibraryError::NoCopiesAvailable { title: book.title });
    }
    let borrower = find_borrower(&tx, card_id)?;

    tx.execute(
        "INSERT INTO loans (book_id, borrower_id, borrow_date) VALUES (?1, ?2, ?3)",
        params![book.id, borrower.id, today],
    )?;
    let loan_id = tx.last_insert_rowid();

    let updated = tx.execute(
        "UPDATE books SET copies_available = copies_available - 1
         WHERE id = ?1 AND copies_available > 0",
        [book.id],
    )?;
    if updated == 0 {
        return Err(LibraryError::NoCopiesAvailable { title: book.title });
    }
    tx.commit()?;

    log::info!(
        "checked out '{}' (ISBN {isbn}) to {card_id}, loan {loan_id}",
        book.title
    );
    Ok(LoanReceipt {
        loan: Loan {
            id: loan_id,
            book_id: book.id,
            borrower_id: borrower.id,
            borrow_date: today,
            return_date: None,
        },
        title: book.title,
        card_id: borrower.card_id,
        copies_available: book.copies_available - 1,
    })
}

/// Close the most recently opened loan of `isbn` by stamping `today` as its
/// return date, and put the copy back on the shelf.
///
/// A book with nothing outstanding yields [`LibraryError::NoOpenLoan`] and its
/// copy count is left alone.
pub fn check_in(conn: &mut Connection, isbn: &str, today: NaiveDate) -> LibraryResult<LoanReceipt> {
    let tx = conn.transaction()?;
    let book = find_book(&tx, isbn)?;

    let Some(mut loan) = tx
        .query_row(
            "SELECT id, book_id, borrower_id, borrow_date, return_date
             FROM loans
             WHERE book_id = ?1 AND return_date IS NULL
             ORDER BY borrow_date DESC, id DESC
             LIMIT 1",
            [book.id],
            loan_from_row,
        )
        .optional()?
    else {
        return Err(LibraryError::NoOpenLoan {
            isbn: isbn.to_string(),
        });
    };

    tx.execute(
        "UPDATE loans SET return_date = ?1 WHERE id = ?2",
        params![today, loan.id],
    )?;
    tx.execute(
        "UPDATE books SET copies_available = copies_available + 1 WHERE id = ?1",
        [book.id],
    )?;
    let card_id: String = tx.query_row(
        "SELECT card_id FROM borrowers WHERE id = ?1",
        [loan.borrower_id],
        |row| row.get(0),
    )?;
    tx.commit()?;

    loan.return_date = Some(today);
    log::info!(
        "checked in '{}' (ISBN {isbn}) from {card_id}, loan {}",
        book.title,
        loan.id
    );
    Ok(LoanReceipt {
        loan,
        title: book.title,
        card_id,
        copies_available: book.copies_available + 1,
    })
}

/// Open loans whose due date falls strictly before `as_of`, oldest first.
pub fn late_loans(conn: &Connection, as_of: NaiveDate) -> LibraryResult<Vec<LateLoan>> {
    // borrow_date + period < as_of  <=>  borrow_date < as_of - period
    let Some(cutoff) = as_of.checked_sub_days(Days::new(LOAN_PERIOD_DAYS)) else {
        return Ok(Vec::new());
    };

    let mut stmt = conn.prepare(
        "SELECT l.id, b.title, b.isbn, br.card_id, l.borrow_date
         FROM loans l
         INNER JOIN books b ON b.id = l.book_id
         INNER JOIN borrowers br ON br.id = l.borrower_id
         WHERE l.return_date IS NULL AND l.borrow_date < ?1
         ORDER BY l.borrow_date, l.id",
    )?;

    let loans = stmt
        .query_map([cutoff], |row| {
            Ok(LateLoan {
                loan_id: row.get(0)?,
                title: row.get(1)?,
                isbn: row.get(2)?,
                card_id: row.get(3)?,
                borrow_date: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(loans)
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::db::test_support::{record, store};
    use crate::db::{add_or_increment_book, find_book, register_borrower, set_reference_only};

    const KR: &str = "9780131103627";

    fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|base| base.checked_add_days(Days::new(offset)))
            .expect("valid date")
    }

    #[fixture]
    fn conn() -> Connection {
        let mut conn = store();
        add_or_increment_book(&mut conn, &record(KR, "The C Programming Language")).expect("add");
        register_borrower(&conn, "B001").expect("register B001");
        register_borrower(&conn, "B002").expect("register B002");
        conn
    }

    fn loan_rows(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM loans", [], |row| row.get(0))
            .expect("count loans")
    }

    fn assert_copy_invariant(conn: &Connection, isbn: &str) {
        let book = find_book(conn, isbn).expect("book");
        let open = open_loan_count(conn, book.id).expect("open loans");
        assert_eq!(book.copies_available, book.total_copies - open);
        assert!(book.copies_available >= 0);
    }

    #[rstest]
    fn checkout_and_checkin_round_trip(mut conn: Connection) {
        let out = check_out(&mut conn, KR, "B001", day(0)).expect("check out");
        assert_eq!(out.copies_available, 0);
        assert!(out.loan.is_open());
        assert_eq!(out.loan.due_date(), day(14));

        let err = check_out(&mut conn, KR, "B002", day(1)).unwrap_err();
        assert!(matches!(err, LibraryError::NoCopiesAvailable { .. }));

        let back = check_in(&mut conn, KR, day(3)).expect("check in");
        assert_eq!(back.copies_available, 1);
        assert_eq!(back.loan.id, out.loan.id);
        assert_eq!(back.loan.return_date, Some(day(3)));
        assert_eq!(back.card_id, "B001");
        assert_copy_invariant(&conn, KR);
    }

    #[rstest]
    fn reference_only_blocks_checkout_without_side_effects(mut conn: Connection) {
        set_reference_only(&mut conn, KR, true).expect("flag");

        let err = check_out(&mut conn, KR, "B001", day(0)).unwrap_err();

        assert!(matches!(err, LibraryError::ReferenceOnly { .. }));
        assert_eq!(loan_rows(&conn), 0);
        assert_eq!(find_book(&conn, KR).expect("book").copies_available, 1);
    }

    #[rstest]
    fn unknown_book_and_borrower_are_reported(mut conn: Connection) {
        let err = check_out(&mut conn, "0000000000", "B001", day(0)).unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { entity: "book", .. }));

        let err = check_out(&mut conn, KR, "B999", day(0)).unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { entity: "borrower", .. }));
        assert_eq!(loan_rows(&conn), 0);
        assert_copy_invariant(&conn, KR);
    }

    #[rstest]
    fn checkin_without_open_loan_keeps_copy_count(mut conn: Connection) {
        let err = check_in(&mut conn, KR, day(0)).unwrap_err();

        assert!(matches!(err, LibraryError::NoOpenLoan { .. }));
        let book = find_book(&conn, KR).expect("book");
        assert_eq!(book.copies_available, 1);
        assert_copy_invariant(&conn, KR);
    }

    #[rstest]
    fn checkin_of_unknown_book_is_not_found(mut conn: Connection) {
        let err = check_in(&mut conn, "0000000000", day(0)).unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { .. }));
    }

    #[rstest]
    fn checkin_closes_most_recent_open_loan(mut conn: Connection) {
        add_or_increment_book(&mut conn, &record(KR, "The C Programming Language"))
            .expect("copy 2");
        check_out(&mut conn, KR, "B001", day(0)).expect("first loan");
        let newest = check_out(&mut conn, KR, "B002", day(4)).expect("second loan");

        let closed = check_in(&mut conn, KR, day(6)).expect("check in");

        assert_eq!(closed.loan.id, newest.loan.id);
        assert_eq!(closed.card_id, "B002");
        assert_eq!(open_loan_count(&conn, closed.loan.book_id).expect("open"), 1);
        assert_copy_invariant(&conn, KR);
    }

    #[rstest]
    fn same_day_loans_tie_break_on_latest_id(mut conn: Connection) {
        add_or_increment_book(&mut conn, &record(KR, "The C Programming Language"))
            .expect("copy 2");
        check_out(&mut conn, KR, "B001", day(2)).expect("first loan");
        let later = check_out(&mut conn, KR, "B002", day(2)).expect("second loan");

        let closed = check_in(&mut conn, KR, day(3)).expect("check in");
        assert_eq!(closed.loan.id, later.loan.id);
    }

    #[rstest]
    fn copy_invariant_holds_over_mixed_sequence(mut conn: Connection) {
        for _ in 0..2 {
            add_or_increment_book(&mut conn, &record(KR, "The C Programming Language"))
                .expect("extra copy");
        }
        check_out(&mut conn, KR, "B001", day(0)).expect("loan 1");
        check_out(&mut conn, KR, "B002", day(1)).expect("loan 2");
        check_in(&mut conn, KR, day(2)).expect("return");
        check_out(&mut conn, KR, "B002", day(3)).expect("loan 3");
        check_out(&mut conn, KR, "B001", day(4)).expect("loan 4");
        let shelf_empty = check_out(&mut conn, KR, "B001", day(5)).unwrap_err();
        assert!(matches!(shelf_empty, LibraryError::NoCopiesAvailable { .. }));
        check_in(&mut conn, KR, day(6)).expect("return");
        check_in(&mut conn, KR, day(7)).expect("return");
        check_in(&mut conn, KR, day(8)).expect("return");
        let nothing_out = check_in(&mut conn, KR, day(9)).unwrap_err();
        assert!(matches!(nothing_out, LibraryError::NoOpenLoan { .. }));

        assert_copy_invariant(&conn, KR);
        let book = find_book(&conn, KR).expect("book");
        assert_eq!(book.copies_available, 3);
    }

    #[rstest]
    fn late_loans_use_computed_due_date(mut conn: Connection) {
        add_or_increment_book(&mut conn, &record("9780441013593", "Dune")).expect("add");
        let today = day(25);
        check_out(&mut conn, KR, "B001", day(5)).expect("20 days ago");
        check_out(&mut conn, "9780441013593", "B002", day(20)).expect("5 days ago");

        let late = late_loans(&conn, today).expect("late loans");

        assert_eq!(late.len(), 1);
        assert_eq!(late[0].isbn, KR);
        assert_eq!(late[0].card_id, "B001");
        assert_eq!(late[0].days_overdue(today), 6);
    }

    #[rstest]
    fn loan_due_today_is_not_late(mut conn: Connection) {
        check_out(&mut conn, KR, "B001", day(0)).expect("loan");
        assert!(late_loans(&conn, day(14)).expect("due today").is_empty());
        assert_eq!(late_loans(&conn, day(15)).expect("a day late").len(), 1);
    }

    #[rstest]
    fn returned_loans_are_never_late(mut conn: Connection) {
        check_out(&mut conn, KR, "B001", day(0)).expect("loan");
        check_in(&mut conn, KR, day(30)).expect("late return");
        assert!(late_loans(&conn, day(40)).expect("late loans").is_empty());
    }

    #[rstest]
    fn reference_flag_refused_while_on_loan(mut conn: Connection) {
        check_out(&mut conn, KR, "B001", day(0)).expect("loan");

        let err = set_reference_only(&mut conn, KR, true).unwrap_err();

        assert!(matches!(err, LibraryError::OutstandingLoans { open: 1, .. }));
        assert!(!find_book(&conn, KR).expect("book").reference_only);
    }
}

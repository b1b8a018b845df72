use chrono::NaiveDate;
use rusqlite::Connection;

use super::catalog::{book_from_row, BOOK_COLUMNS, BOOK_COLUMN_COUNT};
use crate::error::LibraryResult;
use crate::lookup::normalize_isbn;
use crate::models::{LoanSnapshot, SearchHit};

/// Case-insensitive substring test that folds non-ASCII letters as well.
fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Find books whose title or authors contain `term` (case-insensitive) or
/// whose ISBN equals it, hyphenated or not. Each hit carries its tree level
/// and a snapshot of the most recent loan, if the book was ever lent. No match
/// is an empty list.
///
/// SQLite's `LIKE` only folds ASCII, so the text match happens here rather
/// than in the query.
pub fn search_books(conn: &Connection, term: &str) -> LibraryResult<Vec<SearchHit>> {
    let term = term.trim();
    let needle = term.to_lowercase();
    let isbn = normalize_isbn(term).unwrap_or_else(|_| term.to_string());

    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOK_COLUMNS}, t.name, br.card_id, l.borrow_date, l.return_date
         FROM books b
         LEFT JOIN tree_levels t ON t.id = b.tree_level_id
         LEFT JOIN loans l ON l.id = (
             SELECT id FROM loans
             WHERE book_id = b.id
             ORDER BY borrow_date DESC, id DESC
             LIMIT 1
         )
         LEFT JOIN borrowers br ON br.id = l.borrower_id
         ORDER BY b.id"
    ))?;

    let rows = stmt
        .query_map([], |row| {
            let card_id: Option<String> = row.get(BOOK_COLUMN_COUNT + 1)?;
            let borrow_date: Option<NaiveDate> = row.get(BOOK_COLUMN_COUNT + 2)?;
            let last_loan = match (card_id, borrow_date) {
                (Some(card_id), Some(borrow_date)) => Some(LoanSnapshot {
                    card_id,
                    borrow_date,
                    return_date: row.get(BOOK_COLUMN_COUNT + 3)?,
                }),
                _ => None,
            };
            Ok(SearchHit {
                book: book_from_row(row)?,
                tree_level: row.get(BOOK_COLUMN_COUNT)?,
                last_loan,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let hits = rows
        .into_iter()
        .filter(|hit| {
            let book = &hit.book;
            book.isbn == isbn
                || (!needle.is_empty()
                    && (contains_folded(&book.title, &needle)
                        || contains_folded(&book.authors, &needle)))
        })
        .collect();
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::db::test_support::{record, store};
    use crate::db::{
        add_or_increment_book, add_tree_level, assign_tree_level, check_in, check_out,
        register_borrower,
    };

    #[fixture]
    fn conn() -> Connection {
        let mut conn = store();
        add_or_increment_book(
            &mut conn,
            &record("9780131103627", "The C Programming Language"),
        )
        .expect("add K&R");
        let mut dune = record("9780441013593", "Dune");
        dune.authors = vec!["Frank Herbert".into()];
        add_or_increment_book(&mut conn, &dune).expect("add Dune");
        let mut freiheit = record("9783150011185", "Über die Freiheit");
        freiheit.authors = vec!["Émile Zola".into()];
        add_or_increment_book(&mut conn, &freiheit).expect("add Über die Freiheit");
        register_borrower(&conn, "B001").expect("register");
        conn
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).expect("valid date")
    }

    #[rstest]
    #[case("programming", 1)]
    #[case("PROGRAMMING", 1)]
    #[case("herbert", 1)]
    #[case("9780441013593", 1)]
    #[case("978-0-441-01359-3", 1)]
    #[case("über", 1)]
    #[case("ÜBER DIE", 1)]
    #[case("émile", 1)]
    #[case("978044101", 0)]
    #[case("nothing like this", 0)]
    fn matches_title_author_or_exact_isbn(
        conn: Connection,
        #[case] term: &str,
        #[case] hits: usize,
    ) {
        assert_eq!(search_books(&conn, term).expect("search").len(), hits);
    }

    #[rstest]
    fn wildcards_in_term_match_literally(conn: Connection) {
        assert!(search_books(&conn, "%").expect("search").is_empty());
        assert!(search_books(&conn, "_une").expect("search").is_empty());
    }

    #[rstest]
    fn hit_carries_level_and_latest_loan(mut conn: Connection) {
        let level = add_tree_level(&conn, "Science Fiction").expect("level");
        assign_tree_level(&mut conn, "9780441013593", level.id).expect("assign");
        check_out(&mut conn, "9780441013593", "B001", day(1)).expect("loan");
        check_in(&mut conn, "9780441013593", day(3)).expect("return");
        check_out(&mut conn, "9780441013593", "B001", day(7)).expect("loan again");

        let hits = search_books(&conn, "dune").expect("search");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tree_level_label(), "Science Fiction");
        let last = hits[0].last_loan.as_ref().expect("loan snapshot");
        assert_eq!(last.card_id, "B001");
        assert_eq!(last.borrow_date, day(7));
        assert_eq!(last.return_date, None);
    }

    #[rstest]
    fn never_lent_book_has_no_snapshot(conn: Connection) {
        let hits = search_books(&conn, "9780131103627").expect("search");
        assert_eq!(hits[0].tree_level_label(), "Not assigned");
        assert!(hits[0].last_loan.is_none());
    }
}

use chrono::NaiveDate;
use library_manager::{
    add_or_increment_book, check_in, check_out, find_book, late_loans, open_in_memory,
    register_borrower, search_books, AddOutcome, BookRecord, LibraryError,
};
use rstest::{fixture, rstest};
use rusqlite::Connection;

const ISBN: &str = "9780131103627";

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn c_book() -> BookRecord {
    BookRecord {
        title: Some("The C Programming Language".into()),
        authors: vec!["Brian W. Kernighan".into(), "Dennis M. Ritchie".into()],
        publisher: Some("Prentice Hall".into()),
        published_date: Some("1988".into()),
        page_count: Some(272),
        preferred_isbn: ISBN.to_string(),
        ..BookRecord::default()
    }
}

#[fixture]
fn library() -> Connection {
    let mut conn = open_in_memory().expect("store");
    add_or_increment_book(&mut conn, &c_book()).expect("add book");
    register_borrower(&conn, "B001").expect("register B001");
    conn
}

#[rstest]
fn single_copy_round_trip(mut library: Connection) {
    let receipt = check_out(&mut library, ISBN, "B001", day(2024, 3, 1)).expect("check out");
    assert_eq!(receipt.copies_available, 0);
    assert_eq!(receipt.loan.due_date(), day(2024, 3, 15));

    let err = check_out(&mut library, ISBN, "B001", day(2024, 3, 1)).unwrap_err();
    assert!(matches!(err, LibraryError::NoCopiesAvailable { .. }));

    let returned = check_in(&mut library, ISBN, day(2024, 3, 10)).expect("check in");
    assert_eq!(returned.copies_available, 1);
    assert_eq!(returned.loan.return_date, Some(day(2024, 3, 10)));
    assert_eq!(find_book(&library, ISBN).expect("book").copies_available, 1);

    let hits = search_books(&library, "kernighan").expect("search");
    let snapshot = hits[0].last_loan.as_ref().expect("loan history");
    assert_eq!(snapshot.card_id, "B001");
    assert_eq!(snapshot.return_date, Some(day(2024, 3, 10)));
}

#[rstest]
fn adding_twice_keeps_one_row_with_two_copies(mut library: Connection) {
    let outcome = add_or_increment_book(&mut library, &c_book()).expect("second add");
    assert!(matches!(
        outcome,
        AddOutcome::Incremented {
            copies_available: 2,
            ..
        }
    ));

    let book = find_book(&library, ISBN).expect("book");
    assert_eq!((book.copies_available, book.total_copies), (2, 2));
    assert_eq!(search_books(&library, ISBN).expect("search").len(), 1);
}

#[rstest]
fn overdue_loan_shows_up_until_returned(mut library: Connection) {
    check_out(&mut library, ISBN, "B001", day(2024, 3, 1)).expect("check out");

    assert!(late_loans(&library, day(2024, 3, 15)).expect("late").is_empty());
    let late = late_loans(&library, day(2024, 3, 21)).expect("late");
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].card_id, "B001");

    check_in(&mut library, ISBN, day(2024, 3, 21)).expect("check in");
    assert!(late_loans(&library, day(2024, 3, 21)).expect("late").is_empty());
}

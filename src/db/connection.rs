use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Open (creating if needed) the on-disk store, run lazy migrations, and
/// return the live connection. The caller owns the handle for the lifetime of
/// the process; dropping it closes the database.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database at {}", path.display()))?;
    ensure_schema(&conn)?;
    log::info!("opened library database at {}", path.display());
    Ok(conn)
}

/// Throwaway store with the full schema, used by tests.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Create the four tables if they are missing. Foreign keys are switched on so
/// loans cannot point at unknown books or borrowers and books cannot point at
/// unknown tree levels.
fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tree_levels (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )
    .context("failed to create tree_levels table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL DEFAULT '',
            authors TEXT NOT NULL DEFAULT '',
            publisher TEXT,
            published_date TEXT,
            isbn TEXT NOT NULL UNIQUE,
            page_count INTEGER,
            description TEXT,
            language TEXT,
            category TEXT,
            copies_available INTEGER NOT NULL DEFAULT 1 CHECK (copies_available >= 0),
            total_copies INTEGER NOT NULL DEFAULT 1,
            tree_level_id INTEGER REFERENCES tree_levels(id),
            reference_only INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )
    .context("failed to create books table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS borrowers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id TEXT NOT NULL UNIQUE
        )",
        [],
    )
    .context("failed to create borrowers table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS loans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            borrower_id INTEGER NOT NULL,
            borrow_date TEXT NOT NULL,
            return_date TEXT,
            FOREIGN KEY(book_id) REFERENCES books(id),
            FOREIGN KEY(borrower_id) REFERENCES borrowers(id)
        )",
        [],
    )
    .context("failed to create loans table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS loans_by_book ON loans (book_id, return_date)",
        [],
    )
    .context("failed to create loans index")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creation_is_idempotent() {
        let conn = open_in_memory().expect("open store");
        ensure_schema(&conn).expect("second migration run");

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('books', 'tree_levels', 'borrowers', 'loans')",
                [],
                |row| row.get(0),
            )
            .expect("count tables");
        assert_eq!(tables, 4);
    }

    #[test]
    fn database_file_is_created_with_parent_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("library.sqlite");

        let conn = open_database(&path).expect("open store");
        drop(conn);

        assert!(path.exists());
    }
}

//! SQLite persistence.
//!
//! [`Store`] owns the connection and the schema. The per-entity modules are
//! free functions over a `&Connection` so the engine can compose several of
//! them inside one transaction.

pub mod appointments;
pub mod catalog;
pub mod patients;
pub mod payments;
mod rows;
mod schema;
pub mod series;

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::debug;

use crate::error::Result;

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database holding the clinic calendar and its bookings.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path` and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // Readers holding a snapshot must not make a writer's COMMIT fail.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "opened database");
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Read-only access outside of an explicit transaction.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        f(&self.conn)
    }

    /// Run `f` inside `BEGIN IMMEDIATE`.
    ///
    /// The write lock is taken before `f` reads anything, so checks made in
    /// `f` still hold when its writes commit. The transaction is rolled back
    /// unless it commits: on an error from `f`, a failed COMMIT, or a panic.
    pub fn transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BookingError;
    use chrono::NaiveDate;
    use slot_engine::{Block, BlockType, TimeRange};

    fn range() -> TimeRange {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        TimeRange::new(
            day.and_hms_opt(8, 0, 0).unwrap(),
            day.and_hms_opt(9, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let store = Store::open_in_memory().unwrap();
        let block = Block::new(range(), BlockType::Break, None);

        let result: Result<()> = store.transaction(|conn| {
            catalog::insert_block(conn, &block)?;
            Err(BookingError::Validation("abort".into()))
        });
        assert!(result.is_err());

        let blocks = store.read(|conn| catalog::blocks_overlapping(conn, &range())).unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn failed_commit_rolls_back_and_frees_the_connection() {
        let store = Store::open_in_memory().unwrap();
        let block = Block::new(range(), BlockType::Break, None);

        // A deferred foreign key is only checked at COMMIT, so COMMIT fails.
        let result: Result<()> = store.transaction(|conn| {
            conn.execute_batch("PRAGMA defer_foreign_keys = ON;")?;
            catalog::insert_block(conn, &block)?;
            conn.execute(
                "INSERT INTO payments (id, appointment_id, amount_cents, status)
                 VALUES ('orphan', 'no-such-appointment', 0, 'UNPAID')",
                [],
            )?;
            Ok(())
        });
        assert!(matches!(result, Err(BookingError::Storage(_))));

        assert!(store.read(|conn| Ok(conn.is_autocommit())).unwrap());
        let blocks = store.read(|conn| catalog::blocks_overlapping(conn, &range())).unwrap();
        assert!(blocks.is_empty());

        store
            .transaction(|conn| catalog::insert_block(conn, &block))
            .unwrap();
        let blocks = store.read(|conn| catalog::blocks_overlapping(conn, &range())).unwrap();
        assert_eq!(blocks, vec![block]);
    }

    #[test]
    fn committed_transaction_persists() {
        let store = Store::open_in_memory().unwrap();
        let block = Block::new(range(), BlockType::Holiday, Some("carnival".into()));

        store
            .transaction(|conn| catalog::insert_block(conn, &block))
            .unwrap();

        let blocks = store.read(|conn| catalog::blocks_overlapping(conn, &range())).unwrap();
        assert_eq!(blocks, vec![block]);
    }

    #[test]
    fn reopening_file_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agenda.db");
        {
            let store = Store::open(&path).unwrap();
            let block = Block::new(range(), BlockType::Vacation, None);
            store
                .transaction(|conn| catalog::insert_block(conn, &block))
                .unwrap();
        }
        let store = Store::open(&path).unwrap();
        let blocks = store.read(|conn| catalog::blocks_overlapping(conn, &range())).unwrap();
        assert_eq!(blocks.len(), 1);
    }
}

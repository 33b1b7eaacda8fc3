//! Versioned schema migrations.
//!
//! Date-times are clinic wall-clock seconds (`INTEGER`), times of day are
//! minutes after midnight, dates are `YYYY-MM-DD` text, ids are UUID text.

use rusqlite::{
    Connection, OptionalExtension, Result as SqliteResult, Transaction, TransactionBehavior,
};
use tracing::info;

const SCHEMA_VERSION: i64 = 2;

/// Bring the schema up to date.
///
/// Runs under `BEGIN IMMEDIATE` so two processes opening a fresh file at once
/// cannot both apply the same migration.
pub(crate) fn migrate(conn: &Connection) -> SqliteResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )?;

    let current: i64 = tx
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i64>>(0)
        })
        .optional()?
        .flatten()
        .unwrap_or(0);

    if current < 1 {
        migrate_v1(&tx)?;
    }
    if current < 2 {
        migrate_v2(&tx)?;
    }
    tx.commit()?;

    if current < SCHEMA_VERSION {
        info!(from = current, to = SCHEMA_VERSION, "database schema migrated");
    }
    Ok(())
}

/// Migration v1: initial schema.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE session_types (
            id               TEXT PRIMARY KEY,
            name             TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
            price_cents      INTEGER NOT NULL CHECK (price_cents >= 0),
            active           INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE availability_windows (
            id           TEXT PRIMARY KEY,
            day_of_week  INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
            start_minute INTEGER NOT NULL,
            end_minute   INTEGER NOT NULL,
            active       INTEGER NOT NULL DEFAULT 1,
            CHECK (start_minute < end_minute)
        );

        CREATE TABLE blocks (
            id         TEXT PRIMARY KEY,
            start_at   INTEGER NOT NULL,
            end_at     INTEGER NOT NULL,
            block_type TEXT NOT NULL,
            reason     TEXT,
            CHECK (start_at < end_at)
        );
        CREATE INDEX idx_blocks_range ON blocks(start_at, end_at);

        CREATE TABLE patients (
            id         TEXT PRIMARY KEY,
            name       TEXT NOT NULL,
            phone      TEXT NOT NULL UNIQUE,
            email      TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE recurring_series (
            id              TEXT PRIMARY KEY,
            patient_id      TEXT NOT NULL REFERENCES patients(id),
            session_type_id TEXT NOT NULL REFERENCES session_types(id),
            day_of_week     INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
            start_minute    INTEGER NOT NULL,
            frequency       TEXT NOT NULL,
            start_date      TEXT NOT NULL,
            end_date        TEXT,
            active          INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE appointments (
            id                  TEXT PRIMARY KEY,
            patient_id          TEXT NOT NULL REFERENCES patients(id),
            session_type_id     TEXT NOT NULL REFERENCES session_types(id),
            start_at            INTEGER NOT NULL,
            end_at              INTEGER NOT NULL,
            status              TEXT NOT NULL,
            cancellation_token  TEXT NOT NULL UNIQUE,
            recurring_series_id TEXT REFERENCES recurring_series(id),
            cancelled_at        INTEGER,
            cancelled_by        TEXT,
            cancellation_reason TEXT,
            created_at          INTEGER NOT NULL,
            CHECK (start_at < end_at)
        );
        CREATE INDEX idx_appointments_range ON appointments(start_at, end_at);
        CREATE INDEX idx_appointments_series ON appointments(recurring_series_id);

        CREATE TABLE payments (
            id             TEXT PRIMARY KEY,
            appointment_id TEXT NOT NULL UNIQUE REFERENCES appointments(id),
            amount_cents   INTEGER NOT NULL,
            status         TEXT NOT NULL,
            paid_at        INTEGER,
            receipt_number TEXT,
            notes          TEXT
        );

        INSERT INTO schema_version (version) VALUES (1);",
    )
}

/// Migration v2: patients can be deactivated.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "ALTER TABLE patients ADD COLUMN active INTEGER NOT NULL DEFAULT 1;
        CREATE INDEX idx_patients_name ON patients(name);
        CREATE INDEX idx_appointments_patient ON appointments(patient_id, start_at);

        INSERT INTO schema_version (version) VALUES (2);",
    )
}

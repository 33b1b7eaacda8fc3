//! Session types, availability windows and blocks.

use rusqlite::{params, Connection, OptionalExtension, Row};
use slot_engine::{AvailabilityWindow, Block, SessionType, TimeRange};
use uuid::Uuid;

use super::rows;
use crate::error::Result;

// === Session types ===

fn row_to_session_type(row: &Row) -> rusqlite::Result<SessionType> {
    Ok(SessionType {
        id: rows::uuid(row, 0)?,
        name: row.get(1)?,
        duration_minutes: row.get(2)?,
        price_cents: row.get(3)?,
        active: row.get(4)?,
    })
}

const SESSION_TYPE_COLUMNS: &str = "id, name, duration_minutes, price_cents, active";

pub fn insert_session_type(conn: &Connection, session_type: &SessionType) -> Result<()> {
    conn.execute(
        "INSERT INTO session_types (id, name, duration_minutes, price_cents, active)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session_type.id.to_string(),
            session_type.name,
            session_type.duration_minutes,
            session_type.price_cents,
            session_type.active,
        ],
    )?;
    Ok(())
}

/// Returns false when no row has the session type's id.
pub fn update_session_type(conn: &Connection, session_type: &SessionType) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE session_types
         SET name = ?2, duration_minutes = ?3, price_cents = ?4, active = ?5
         WHERE id = ?1",
        params![
            session_type.id.to_string(),
            session_type.name,
            session_type.duration_minutes,
            session_type.price_cents,
            session_type.active,
        ],
    )?;
    Ok(changed > 0)
}

pub fn session_type(conn: &Connection, id: Uuid) -> Result<Option<SessionType>> {
    let sql = format!("SELECT {SESSION_TYPE_COLUMNS} FROM session_types WHERE id = ?1");
    Ok(conn
        .query_row(&sql, [id.to_string()], row_to_session_type)
        .optional()?)
}

pub fn list_session_types(conn: &Connection, include_inactive: bool) -> Result<Vec<SessionType>> {
    let sql = format!(
        "SELECT {SESSION_TYPE_COLUMNS} FROM session_types
         WHERE active = 1 OR ?1
         ORDER BY name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let types = stmt
        .query_map([include_inactive], row_to_session_type)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(types)
}

// === Availability windows ===

fn row_to_window(row: &Row) -> rusqlite::Result<AvailabilityWindow> {
    Ok(AvailabilityWindow {
        id: rows::uuid(row, 0)?,
        day_of_week: rows::weekday(row, 1)?,
        start_time: rows::time(row, 2)?,
        end_time: rows::time(row, 3)?,
        active: row.get(4)?,
    })
}

pub fn insert_window(conn: &Connection, window: &AvailabilityWindow) -> Result<()> {
    conn.execute(
        "INSERT INTO availability_windows (id, day_of_week, start_minute, end_minute, active)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            window.id.to_string(),
            rows::weekday_num(window.day_of_week),
            rows::minute_of_day(window.start_time),
            rows::minute_of_day(window.end_time),
            window.active,
        ],
    )?;
    Ok(())
}

pub fn update_window(conn: &Connection, window: &AvailabilityWindow) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE availability_windows
         SET day_of_week = ?2, start_minute = ?3, end_minute = ?4, active = ?5
         WHERE id = ?1",
        params![
            window.id.to_string(),
            rows::weekday_num(window.day_of_week),
            rows::minute_of_day(window.start_time),
            rows::minute_of_day(window.end_time),
            window.active,
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_window(conn: &Connection, id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM availability_windows WHERE id = ?1",
        [id.to_string()],
    )?;
    Ok(changed > 0)
}

pub fn window(conn: &Connection, id: Uuid) -> Result<Option<AvailabilityWindow>> {
    Ok(conn
        .query_row(
            "SELECT id, day_of_week, start_minute, end_minute, active
             FROM availability_windows WHERE id = ?1",
            [id.to_string()],
            row_to_window,
        )
        .optional()?)
}

/// Every window, active or not, ordered by weekday then start.
pub fn list_windows(conn: &Connection) -> Result<Vec<AvailabilityWindow>> {
    let mut stmt = conn.prepare(
        "SELECT id, day_of_week, start_minute, end_minute, active
         FROM availability_windows
         ORDER BY day_of_week, start_minute, end_minute",
    )?;
    let windows = stmt
        .query_map([], row_to_window)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(windows)
}

// === Blocks ===

fn row_to_block(row: &Row) -> rusqlite::Result<Block> {
    Ok(Block {
        id: rows::uuid(row, 0)?,
        start: rows::datetime(row, 1)?,
        end: rows::datetime(row, 2)?,
        block_type: rows::parsed(row, 3)?,
        reason: row.get(4)?,
    })
}

pub fn insert_block(conn: &Connection, block: &Block) -> Result<()> {
    conn.execute(
        "INSERT INTO blocks (id, start_at, end_at, block_type, reason)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            block.id.to_string(),
            rows::ts(block.start),
            rows::ts(block.end),
            block.block_type.as_str(),
            block.reason,
        ],
    )?;
    Ok(())
}

pub fn block(conn: &Connection, id: Uuid) -> Result<Option<Block>> {
    Ok(conn
        .query_row(
            "SELECT id, start_at, end_at, block_type, reason FROM blocks WHERE id = ?1",
            [id.to_string()],
            row_to_block,
        )
        .optional()?)
}

pub fn update_block(conn: &Connection, block: &Block) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE blocks SET start_at = ?2, end_at = ?3, block_type = ?4, reason = ?5
         WHERE id = ?1",
        params![
            block.id.to_string(),
            rows::ts(block.start),
            rows::ts(block.end),
            block.block_type.as_str(),
            block.reason,
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_block(conn: &Connection, id: Uuid) -> Result<bool> {
    let changed = conn.execute("DELETE FROM blocks WHERE id = ?1", [id.to_string()])?;
    Ok(changed > 0)
}

/// Blocks overlapping `range` (half-open), ordered by start.
pub fn blocks_overlapping(conn: &Connection, range: &TimeRange) -> Result<Vec<Block>> {
    let mut stmt = conn.prepare(
        "SELECT id, start_at, end_at, block_type, reason
         FROM blocks
         WHERE start_at < ?2 AND end_at > ?1
         ORDER BY start_at, end_at",
    )?;
    let blocks = stmt
        .query_map(params![rows::ts(range.start), rows::ts(range.end)], row_to_block)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use chrono::{NaiveDate, NaiveTime, Weekday};
    use slot_engine::BlockType;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn session_type(name: &str, active: bool) -> SessionType {
        SessionType {
            id: Uuid::new_v4(),
            name: name.to_string(),
            duration_minutes: 50,
            price_cents: 20_000,
            active,
        }
    }

    #[test]
    fn inactive_session_types_are_hidden_by_default() {
        let store = store();
        let online = session_type("Online", true);
        let retired = session_type("Retired", false);
        store
            .transaction(|conn| {
                insert_session_type(conn, &online)?;
                insert_session_type(conn, &retired)
            })
            .unwrap();

        let active = store.read(|conn| list_session_types(conn, false)).unwrap();
        assert_eq!(active, vec![online.clone()]);

        let all = store.read(|conn| list_session_types(conn, true)).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn window_round_trips() {
        let store = store();
        let window = AvailabilityWindow::new(
            Weekday::Fri,
            NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        )
        .unwrap();
        store.transaction(|conn| insert_window(conn, &window)).unwrap();
        let loaded = store.read(|conn| super::window(conn, window.id)).unwrap();
        assert_eq!(loaded, Some(window));
    }

    #[test]
    fn adjacent_block_does_not_overlap() {
        let store = store();
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let block = Block::new(
            TimeRange::new(
                day.and_hms_opt(12, 0, 0).unwrap(),
                day.and_hms_opt(13, 0, 0).unwrap(),
            )
            .unwrap(),
            BlockType::Break,
            Some("lunch".into()),
        );
        store.transaction(|conn| insert_block(conn, &block)).unwrap();

        let morning = TimeRange::new(
            day.and_hms_opt(11, 0, 0).unwrap(),
            day.and_hms_opt(12, 0, 0).unwrap(),
        )
        .unwrap();
        assert!(store
            .read(|conn| blocks_overlapping(conn, &morning))
            .unwrap()
            .is_empty());
        assert_eq!(
            store
                .read(|conn| blocks_overlapping(conn, &TimeRange::day(day)))
                .unwrap(),
            vec![block]
        );
    }
}

use rusqlite::{params, Connection, OptionalExtension, Row};
use slot_engine::RecurringSeries;
use uuid::Uuid;

use super::rows;
use crate::error::Result;

fn row_to_series(row: &Row) -> rusqlite::Result<RecurringSeries> {
    Ok(RecurringSeries {
        id: rows::uuid(row, 0)?,
        patient_id: rows::uuid(row, 1)?,
        session_type_id: rows::uuid(row, 2)?,
        day_of_week: rows::weekday(row, 3)?,
        start_time: rows::time(row, 4)?,
        frequency: rows::parsed(row, 5)?,
        start_date: rows::date(row, 6)?,
        end_date: rows::opt_date(row, 7)?,
        active: row.get(8)?,
    })
}

pub fn insert(conn: &Connection, series: &RecurringSeries) -> Result<()> {
    conn.execute(
        "INSERT INTO recurring_series (
            id, patient_id, session_type_id, day_of_week, start_minute,
            frequency, start_date, end_date, active
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            series.id.to_string(),
            series.patient_id.to_string(),
            series.session_type_id.to_string(),
            rows::weekday_num(series.day_of_week),
            rows::minute_of_day(series.start_time),
            series.frequency.as_str(),
            rows::date_text(series.start_date),
            series.end_date.map(rows::date_text),
            series.active,
        ],
    )?;
    Ok(())
}

pub fn by_id(conn: &Connection, id: Uuid) -> Result<Option<RecurringSeries>> {
    Ok(conn
        .query_row(
            "SELECT id, patient_id, session_type_id, day_of_week, start_minute,
                    frequency, start_date, end_date, active
             FROM recurring_series WHERE id = ?1",
            [id.to_string()],
            row_to_series,
        )
        .optional()?)
}

pub fn deactivate(conn: &Connection, id: Uuid) -> Result<()> {
    conn.execute(
        "UPDATE recurring_series SET active = 0 WHERE id = ?1",
        [id.to_string()],
    )?;
    Ok(())
}

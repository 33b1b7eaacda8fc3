use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use slot_engine::{Actor, Appointment, AppointmentStatus, TimeRange};
use uuid::Uuid;

use super::rows;
use crate::error::Result;

const COLUMNS: &str = "id, patient_id, session_type_id, start_at, end_at, status, \
     cancellation_token, recurring_series_id, cancelled_at, cancelled_by, \
     cancellation_reason, created_at";

fn row_to_appointment(row: &Row) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: rows::uuid(row, 0)?,
        patient_id: rows::uuid(row, 1)?,
        session_type_id: rows::uuid(row, 2)?,
        start: rows::datetime(row, 3)?,
        end: rows::datetime(row, 4)?,
        status: rows::parsed(row, 5)?,
        cancellation_token: row.get(6)?,
        recurring_series_id: rows::opt_uuid(row, 7)?,
        cancelled_at: rows::opt_datetime(row, 8)?,
        cancelled_by: rows::opt_parsed(row, 9)?,
        cancellation_reason: row.get(10)?,
        created_at: rows::datetime(row, 11)?,
    })
}

fn query(conn: &Connection, filter: &str, params: impl rusqlite::Params) -> Result<Vec<Appointment>> {
    let sql = format!("SELECT {COLUMNS} FROM appointments {filter}");
    let mut stmt = conn.prepare(&sql)?;
    let appointments = stmt
        .query_map(params, row_to_appointment)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(appointments)
}

pub fn insert(conn: &Connection, appointment: &Appointment) -> Result<()> {
    conn.execute(
        "INSERT INTO appointments (
            id, patient_id, session_type_id, start_at, end_at, status,
            cancellation_token, recurring_series_id, cancelled_at, cancelled_by,
            cancellation_reason, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            appointment.id.to_string(),
            appointment.patient_id.to_string(),
            appointment.session_type_id.to_string(),
            rows::ts(appointment.start),
            rows::ts(appointment.end),
            appointment.status.as_str(),
            appointment.cancellation_token,
            appointment.recurring_series_id.map(|id| id.to_string()),
            appointment.cancelled_at.map(rows::ts),
            appointment.cancelled_by.map(Actor::as_str),
            appointment.cancellation_reason,
            rows::ts(appointment.created_at),
        ],
    )?;
    Ok(())
}

pub fn by_id(conn: &Connection, id: Uuid) -> Result<Option<Appointment>> {
    Ok(query(conn, "WHERE id = ?1", [id.to_string()])?.into_iter().next())
}

pub fn by_token(conn: &Connection, token: &str) -> Result<Option<Appointment>> {
    let sql = format!("SELECT {COLUMNS} FROM appointments WHERE cancellation_token = ?1");
    Ok(conn
        .query_row(&sql, [token], row_to_appointment)
        .optional()?)
}

/// Appointments of any status overlapping `range`, ordered by start.
pub fn overlapping(conn: &Connection, range: &TimeRange) -> Result<Vec<Appointment>> {
    query(
        conn,
        "WHERE start_at < ?2 AND end_at > ?1 ORDER BY start_at, end_at",
        params![rows::ts(range.start), rows::ts(range.end)],
    )
}

/// Occupying appointments overlapping `range`, ordered by start.
pub fn occupying_overlapping(conn: &Connection, range: &TimeRange) -> Result<Vec<Appointment>> {
    query(
        conn,
        "WHERE start_at < ?2 AND end_at > ?1 AND status IN (?3, ?4) ORDER BY start_at, end_at",
        params![
            rows::ts(range.start),
            rows::ts(range.end),
            AppointmentStatus::Scheduled.as_str(),
            AppointmentStatus::Confirmed.as_str(),
        ],
    )
}

pub fn for_series(conn: &Connection, series_id: Uuid) -> Result<Vec<Appointment>> {
    query(
        conn,
        "WHERE recurring_series_id = ?1 ORDER BY start_at",
        [series_id.to_string()],
    )
}

/// A patient's appointments, most recent first.
pub fn for_patient(conn: &Connection, patient_id: Uuid) -> Result<Vec<Appointment>> {
    query(
        conn,
        "WHERE patient_id = ?1 ORDER BY start_at DESC",
        [patient_id.to_string()],
    )
}

pub fn set_status(conn: &Connection, id: Uuid, status: AppointmentStatus) -> Result<()> {
    conn.execute(
        "UPDATE appointments SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status.as_str()],
    )?;
    Ok(())
}

/// Move to a cancelled status and record who, when and why.
pub fn cancel(
    conn: &Connection,
    id: Uuid,
    status: AppointmentStatus,
    at: NaiveDateTime,
    by: Actor,
    reason: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE appointments
         SET status = ?2, cancelled_at = ?3, cancelled_by = ?4, cancellation_reason = ?5
         WHERE id = ?1",
        params![
            id.to_string(),
            status.as_str(),
            rows::ts(at),
            by.as_str(),
            reason,
        ],
    )?;
    Ok(())
}

pub fn move_to(conn: &Connection, id: Uuid, range: &TimeRange) -> Result<()> {
    conn.execute(
        "UPDATE appointments SET start_at = ?2, end_at = ?3 WHERE id = ?1",
        params![id.to_string(), rows::ts(range.start), rows::ts(range.end)],
    )?;
    Ok(())
}

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::rows;
use crate::error::Result;
use crate::model::{Payment, PaymentStatus};

const COLUMNS: &str = "id, appointment_id, amount_cents, status, paid_at, receipt_number, notes";

fn row_to_payment(row: &Row) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: rows::uuid(row, 0)?,
        appointment_id: rows::uuid(row, 1)?,
        amount_cents: row.get(2)?,
        status: rows::parsed(row, 3)?,
        paid_at: rows::opt_datetime(row, 4)?,
        receipt_number: row.get(5)?,
        notes: row.get(6)?,
    })
}

pub fn insert(conn: &Connection, payment: &Payment) -> Result<()> {
    conn.execute(
        "INSERT INTO payments (id, appointment_id, amount_cents, status, paid_at, receipt_number, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            payment.id.to_string(),
            payment.appointment_id.to_string(),
            payment.amount_cents,
            payment.status.as_str(),
            payment.paid_at.map(rows::ts),
            payment.receipt_number,
            payment.notes,
        ],
    )?;
    Ok(())
}

pub fn for_appointment(conn: &Connection, appointment_id: Uuid) -> Result<Option<Payment>> {
    let sql = format!("SELECT {COLUMNS} FROM payments WHERE appointment_id = ?1");
    Ok(conn
        .query_row(&sql, [appointment_id.to_string()], row_to_payment)
        .optional()?)
}

pub fn mark_paid(
    conn: &Connection,
    id: Uuid,
    paid_at: NaiveDateTime,
    receipt_number: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE payments
         SET status = ?2, paid_at = ?3, receipt_number = COALESCE(?4, receipt_number)
         WHERE id = ?1",
        params![
            id.to_string(),
            PaymentStatus::Paid.as_str(),
            rows::ts(paid_at),
            receipt_number,
        ],
    )?;
    Ok(())
}

pub fn mark_waived(conn: &Connection, id: Uuid, notes: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE payments SET status = ?2, notes = ?3 WHERE id = ?1",
        params![id.to_string(), PaymentStatus::Waived.as_str(), notes],
    )?;
    Ok(())
}

/// Payments with `status`, ordered by the appointment's start.
pub fn with_status(conn: &Connection, status: PaymentStatus) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.appointment_id, p.amount_cents, p.status, p.paid_at, p.receipt_number, p.notes
         FROM payments p
         JOIN appointments a ON a.id = p.appointment_id
         WHERE p.status = ?1
         ORDER BY a.start_at",
    )?;
    let payments = stmt
        .query_map([status.as_str()], row_to_payment)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(payments)
}

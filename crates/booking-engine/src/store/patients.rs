use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::rows;
use crate::error::Result;
use crate::model::Patient;

const COLUMNS: &str = "id, name, phone, email, active, created_at";

fn row_to_patient(row: &Row) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: rows::uuid(row, 0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        active: row.get(4)?,
        created_at: rows::datetime(row, 5)?,
    })
}

fn query(conn: &Connection, filter: &str, params: impl rusqlite::Params) -> Result<Vec<Patient>> {
    let sql = format!("SELECT {COLUMNS} FROM patients {filter}");
    let mut stmt = conn.prepare(&sql)?;
    let patients = stmt
        .query_map(params, row_to_patient)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(patients)
}

pub fn insert(conn: &Connection, patient: &Patient) -> Result<()> {
    conn.execute(
        "INSERT INTO patients (id, name, phone, email, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.phone,
            patient.email,
            patient.active,
            rows::ts(patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn by_id(conn: &Connection, id: Uuid) -> Result<Option<Patient>> {
    let sql = format!("SELECT {COLUMNS} FROM patients WHERE id = ?1");
    Ok(conn
        .query_row(&sql, [id.to_string()], row_to_patient)
        .optional()?)
}

/// Any patient with `phone`, active or not. Phones are unique.
pub fn by_phone(conn: &Connection, phone: &str) -> Result<Option<Patient>> {
    let sql = format!("SELECT {COLUMNS} FROM patients WHERE phone = ?1");
    Ok(conn.query_row(&sql, [phone], row_to_patient).optional()?)
}

/// Active patients ordered by name.
pub fn active(conn: &Connection) -> Result<Vec<Patient>> {
    query(conn, "WHERE active = 1 ORDER BY name COLLATE NOCASE, id", [])
}

/// Active patients whose name contains `fragment`, ignoring ASCII case.
pub fn search(conn: &Connection, fragment: &str) -> Result<Vec<Patient>> {
    query(
        conn,
        "WHERE active = 1 AND instr(lower(name), lower(?1)) > 0
         ORDER BY name COLLATE NOCASE, id",
        [fragment],
    )
}

/// Fill in an email for a patient who booked without one.
pub fn set_email(conn: &Connection, id: Uuid, email: &str) -> Result<()> {
    conn.execute(
        "UPDATE patients SET email = ?2 WHERE id = ?1",
        params![id.to_string(), email],
    )?;
    Ok(())
}

pub fn update(conn: &Connection, patient: &Patient) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE patients SET name = ?2, phone = ?3, email = ?4, active = ?5 WHERE id = ?1",
        params![
            patient.id.to_string(),
            patient.name,
            patient.phone,
            patient.email,
            patient.active,
        ],
    )?;
    Ok(changed > 0)
}

pub fn set_active(conn: &Connection, id: Uuid, active: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE patients SET active = ?2 WHERE id = ?1",
        params![id.to_string(), active],
    )?;
    Ok(changed > 0)
}

//! The booking transaction engine.
//!
//! [`BookingEngine`] is the only entry point that mutates the store. Each
//! mutating method is one `BEGIN IMMEDIATE` unit of work: load the calendar
//! and the affected appointments, re-run the slot and conflict checks, and
//! write only if they pass. Read-only methods (slot listing, lookups) skip
//! the write lock.
//!
//! The engine is `Send + Sync`; share it across threads behind an `Arc`.
//! Two engines opened on the same database file are serialized by SQLite's
//! write lock instead.

mod booking;
mod catalog;
mod patients;
mod series;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use slot_engine::{
    generate_slots, Appointment, AppointmentStatus, AvailabilityCalendar, Conflict,
    ConflictChecker, ConflictSource, SessionType, Slot, SlotQuery, TimeRange, Unavailable,
};
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{BookingPolicy, Config};
use crate::error::{BookingError, Result};
use crate::model::{DaySlots, Patient, PatientInfo, Payment, PaymentStatus};
use crate::store::{
    appointments, catalog as catalog_store, patients as patient_store, payments, Store,
};
use crate::token;

pub struct BookingEngine {
    store: Mutex<Store>,
    clock: Arc<dyn Clock>,
    policy: BookingPolicy,
}

impl BookingEngine {
    pub fn new(store: Store, clock: Arc<dyn Clock>, policy: BookingPolicy) -> Self {
        Self {
            store: Mutex::new(store),
            clock,
            policy,
        }
    }

    /// Open the database named in `config` with its policy.
    pub fn open(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let policy = config.policy()?;
        let store = Store::open(&config.database_path)?;
        Ok(Self::new(store, clock, policy))
    }

    /// An engine over a fresh in-memory database.
    pub fn in_memory(policy: BookingPolicy, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self::new(Store::open_in_memory()?, clock, policy))
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Current clinic wall-clock time.
    pub fn now(&self) -> NaiveDateTime {
        self.policy.local(self.clock.now())
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.store().read(f)
    }

    fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.store().transaction(f)
    }

    /// Slot query for the public flow: policy step and booking window applied.
    fn public_query(&self, date: NaiveDate, duration_minutes: u32) -> Result<SlotQuery> {
        let (min_start, max_start) = self.policy.booking_window(self.now());
        Ok(SlotQuery::new(date, duration_minutes)?
            .with_step(self.policy.slot_step_minutes)?
            .within(Some(min_start), Some(max_start)))
    }

    // === Slots ===

    /// Bookable slots for an active session type on `date`.
    pub fn generate_slots(&self, date: NaiveDate, session_type_id: Uuid) -> Result<Vec<Slot>> {
        self.read(|conn| {
            let session_type = bookable_session_type(conn, session_type_id)?;
            let query = self.public_query(date, session_type.duration_minutes)?;
            let (calendar, booked) = load_day(conn, date)?;
            let slots = generate_slots(&calendar, &booked, &query);
            debug!(%date, session_type = %session_type.name, count = slots.len(), "generated slots");
            Ok(slots)
        })
    }

    /// Slots for every date in `[start_date, end_date]`, days without slots
    /// omitted.
    pub fn slots_for_range(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        session_type_id: Uuid,
    ) -> Result<Vec<DaySlots>> {
        if end_date < start_date {
            return Err(BookingError::Validation(format!(
                "end date {} is before start date {}",
                end_date, start_date
            )));
        }
        self.read(|conn| {
            let session_type = bookable_session_type(conn, session_type_id)?;
            let mut days = Vec::new();
            for date in start_date.iter_days().take_while(|d| *d <= end_date) {
                let query = self.public_query(date, session_type.duration_minutes)?;
                let (calendar, booked) = load_day(conn, date)?;
                let slots = generate_slots(&calendar, &booked, &query);
                if !slots.is_empty() {
                    days.push(DaySlots { date, slots });
                }
            }
            Ok(days)
        })
    }

    /// True when `range` overlaps an occupying appointment (other than
    /// `exclude`) or a block.
    pub fn has_conflict(&self, range: &TimeRange, exclude: Option<Uuid>) -> Result<bool> {
        self.read(|conn| {
            let (booked, blocks) = load_occupancy(conn, range)?;
            Ok(ConflictChecker::new(&booked, &blocks)
                .excluding(exclude)
                .has_conflict(range))
        })
    }

    /// Indices of the `ranges` that conflict, in input order.
    pub fn check_many(&self, ranges: &[TimeRange]) -> Result<Vec<usize>> {
        let Some(hull) = hull(ranges) else {
            return Ok(Vec::new());
        };
        self.read(|conn| {
            let (booked, blocks) = load_occupancy(conn, &hull)?;
            Ok(ConflictChecker::new(&booked, &blocks).check_many(ranges))
        })
    }
}

/// Session type open to public booking.
fn bookable_session_type(conn: &Connection, id: Uuid) -> Result<SessionType> {
    let session_type = require_session_type(conn, id)?;
    if !session_type.active {
        return Err(BookingError::PolicyViolation(format!(
            "session type {} is not active",
            session_type.name
        )));
    }
    Ok(session_type)
}

fn require_session_type(conn: &Connection, id: Uuid) -> Result<SessionType> {
    catalog_store::session_type(conn, id)?.ok_or_else(|| BookingError::not_found("session type", id))
}

fn require_appointment(conn: &Connection, id: Uuid) -> Result<Appointment> {
    appointments::by_id(conn, id)?.ok_or_else(|| BookingError::not_found("appointment", id))
}

fn require_appointment_by_token(conn: &Connection, token: &str) -> Result<Appointment> {
    appointments::by_token(conn, token)?
        .ok_or_else(|| BookingError::not_found("appointment", "cancellation token"))
}

/// Calendar and appointments (any status) touching `date`.
fn load_day(conn: &Connection, date: NaiveDate) -> Result<(AvailabilityCalendar, Vec<Appointment>)> {
    let day = TimeRange::day(date);
    let windows = catalog_store::list_windows(conn)?;
    let blocks = catalog_store::blocks_overlapping(conn, &day)?;
    let booked = appointments::overlapping(conn, &day)?;
    Ok((AvailabilityCalendar::new(windows, blocks), booked))
}

/// Occupying appointments and blocks overlapping `range`.
fn load_occupancy(
    conn: &Connection,
    range: &TimeRange,
) -> Result<(Vec<Appointment>, Vec<slot_engine::Block>)> {
    Ok((
        appointments::occupying_overlapping(conn, range)?,
        catalog_store::blocks_overlapping(conn, range)?,
    ))
}

/// Smallest range covering every range in `ranges`.
fn hull(ranges: &[TimeRange]) -> Option<TimeRange> {
    let start = ranges.iter().map(|r| r.start).min()?;
    let end = ranges.iter().map(|r| r.end).max()?;
    Some(TimeRange { start, end })
}

/// Translate a conflict into the reason reported to callers.
fn unavailable(conflict: &Conflict) -> Unavailable {
    match conflict.source {
        ConflictSource::Appointment { .. } => Unavailable::Booked {
            range: conflict.existing,
        },
        ConflictSource::Block { block_type, .. } => Unavailable::Blocked {
            range: conflict.existing,
            block_type,
        },
    }
}

/// Fail with `SlotUnavailable` if `range` conflicts with anything but
/// `exclude`.
fn ensure_free(conn: &Connection, range: &TimeRange, exclude: Option<Uuid>) -> Result<()> {
    let (booked, blocks) = load_occupancy(conn, range)?;
    let conflicts = ConflictChecker::new(&booked, &blocks)
        .excluding(exclude)
        .conflicts(range);
    match conflicts.first() {
        Some(conflict) => Err(BookingError::SlotUnavailable {
            range: *range,
            reason: unavailable(conflict),
        }),
        None => Ok(()),
    }
}

fn require_patient(conn: &Connection, id: Uuid) -> Result<Patient> {
    patient_store::by_id(conn, id)?.ok_or_else(|| BookingError::not_found("patient", id))
}

/// Trimmed name, phone and email; name and phone must not be blank.
fn normalized(info: &PatientInfo) -> Result<(&str, &str, Option<&str>)> {
    let name = info.name.trim();
    let phone = info.phone.trim();
    if name.is_empty() || phone.is_empty() {
        return Err(BookingError::Validation(
            "patient name and phone are required".to_string(),
        ));
    }
    let email = info.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    Ok((name, phone, email))
}

/// Look a patient up by phone, creating one if needed.
///
/// A deactivated patient who books again is reactivated. A missing email is
/// filled in; an existing one is never overwritten.
fn find_or_create_patient(conn: &Connection, info: &PatientInfo, now: NaiveDateTime) -> Result<Patient> {
    let (name, phone, email) = normalized(info)?;

    if let Some(mut patient) = patient_store::by_phone(conn, phone)? {
        if !patient.active {
            patient_store::set_active(conn, patient.id, true)?;
            patient.active = true;
            debug!(patient_id = %patient.id, "reactivated patient");
        }
        if patient.email.is_none() {
            if let Some(email) = email {
                patient_store::set_email(conn, patient.id, email)?;
                patient.email = Some(email.to_string());
            }
        }
        return Ok(patient);
    }

    let patient = Patient {
        id: Uuid::new_v4(),
        name: name.to_string(),
        phone: phone.to_string(),
        email: email.map(str::to_string),
        active: true,
        created_at: now,
    };
    patient_store::insert(conn, &patient)?;
    debug!(patient_id = %patient.id, "created patient");
    Ok(patient)
}

/// Insert an appointment and its unpaid payment.
fn insert_appointment(
    conn: &Connection,
    patient: &Patient,
    session_type: &SessionType,
    range: TimeRange,
    status: AppointmentStatus,
    series_id: Option<Uuid>,
    now: NaiveDateTime,
) -> Result<(Appointment, Payment)> {
    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        session_type_id: session_type.id,
        start: range.start,
        end: range.end,
        status,
        cancellation_token: token::mint(),
        recurring_series_id: series_id,
        cancelled_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        created_at: now,
    };
    appointments::insert(conn, &appointment)?;

    let payment = Payment {
        id: Uuid::new_v4(),
        appointment_id: appointment.id,
        amount_cents: session_type.price_cents,
        status: PaymentStatus::Unpaid,
        paid_at: None,
        receipt_number: None,
        notes: None,
    };
    payments::insert(conn, &payment)?;

    Ok((appointment, payment))
}

fn session_range(start: NaiveDateTime, session_type: &SessionType) -> TimeRange {
    TimeRange {
        start,
        end: start + Duration::minutes(i64::from(session_type.duration_minutes)),
    }
}

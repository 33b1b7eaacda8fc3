//! Single-appointment lifecycle: create, cancel, reschedule, status changes,
//! lookups and payments.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use slot_engine::{validate_slot, Actor, Appointment, AppointmentStatus, TimeRange};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    bookable_session_type, ensure_free, find_or_create_patient, insert_appointment, load_day,
    require_appointment, require_appointment_by_token, require_session_type, session_range,
    BookingEngine,
};
use crate::error::{BookingError, Result};
use crate::model::{AdminBookingRequest, Booking, BookingRequest, Payment, PaymentStatus};
use crate::store::{appointments, payments};

impl BookingEngine {
    /// Book a slot through the public flow.
    ///
    /// The requested start is re-validated against the slot grid, the booking
    /// window, blocks and occupying appointments inside the same transaction
    /// as the insert.
    ///
    /// # Errors
    /// `SlotUnavailable` when the start is not a currently bookable slot,
    /// `PolicyViolation` for an inactive session type.
    pub fn create_booking(&self, request: &BookingRequest) -> Result<Booking> {
        let now = self.now();
        self.write(|conn| {
            let session_type = bookable_session_type(conn, request.session_type_id)?;
            let query = self.public_query(request.start.date(), session_type.duration_minutes)?;
            let range = session_range(request.start, &session_type);

            let (calendar, booked) = load_day(conn, request.start.date())?;
            if let Err(reason) = validate_slot(&calendar, &booked, &query, request.start) {
                warn!(start = %request.start, ?reason, "booking rejected");
                return Err(BookingError::SlotUnavailable { range, reason });
            }

            let patient = find_or_create_patient(conn, &request.patient, now)?;
            let (appointment, payment) = insert_appointment(
                conn,
                &patient,
                &session_type,
                range,
                self.policy.initial_status,
                None,
                now,
            )?;

            info!(
                appointment_id = %appointment.id,
                patient_id = %patient.id,
                start = %appointment.start,
                "booking created"
            );
            Ok(Booking {
                appointment,
                patient,
                payment,
            })
        })
    }

    /// Book on behalf of a patient.
    ///
    /// Staff may book any time, outside the advance window and off the slot
    /// grid, but never over an occupying appointment or a block.
    pub fn create_admin_booking(&self, request: &AdminBookingRequest) -> Result<Booking> {
        let now = self.now();
        let status = request.status.unwrap_or(self.policy.initial_status);
        self.write(|conn| {
            let session_type = require_session_type(conn, request.session_type_id)?;
            let range = session_range(request.start, &session_type);

            if let Err(err) = ensure_free(conn, &range, None) {
                warn!(start = %request.start, error = %err, "admin booking rejected");
                return Err(err);
            }

            let patient = find_or_create_patient(conn, &request.patient, now)?;
            let (appointment, payment) =
                insert_appointment(conn, &patient, &session_type, range, status, None, now)?;

            info!(
                appointment_id = %appointment.id,
                patient_id = %patient.id,
                start = %appointment.start,
                %status,
                "admin booking created"
            );
            Ok(Booking {
                appointment,
                patient,
                payment,
            })
        })
    }

    /// Cancel through the patient's token.
    ///
    /// Less notice than the policy threshold yields `CANCELLED_LATE`.
    pub fn cancel_appointment(&self, token: &str, reason: Option<&str>) -> Result<Appointment> {
        let now = self.now();
        self.write(|conn| {
            let appointment = require_appointment_by_token(conn, token)?;
            self.cancel_with_notice(conn, appointment, Actor::Patient, reason, now)
        })
    }

    /// Cancel on the clinic's side. The same notice threshold applies.
    pub fn cancel_by_admin(&self, id: Uuid, reason: Option<&str>) -> Result<Appointment> {
        let now = self.now();
        self.write(|conn| {
            let appointment = require_appointment(conn, id)?;
            self.cancel_with_notice(conn, appointment, Actor::Admin, reason, now)
        })
    }

    fn cancel_with_notice(
        &self,
        conn: &Connection,
        appointment: Appointment,
        by: Actor,
        reason: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<Appointment> {
        if !appointment.is_occupying() {
            return Err(BookingError::AlreadyTerminal {
                id: appointment.id,
                status: appointment.status,
            });
        }

        let status = if self.policy.is_late(appointment.start, now) {
            AppointmentStatus::CancelledLate
        } else {
            AppointmentStatus::Cancelled
        };
        appointments::cancel(conn, appointment.id, status, now, by, reason)?;

        info!(appointment_id = %appointment.id, %status, by = by.as_str(), "appointment cancelled");
        require_appointment(conn, appointment.id)
    }

    /// Move an appointment to `new_start`, keeping its id and token.
    ///
    /// The end is recomputed from the session type's current duration. Only
    /// allowed while the cancellation notice window is still open.
    ///
    /// # Errors
    /// `SlotUnavailable` if the new slot is not bookable; the appointment is
    /// left untouched.
    pub fn reschedule_appointment(&self, token: &str, new_start: NaiveDateTime) -> Result<Appointment> {
        let now = self.now();
        self.write(|conn| {
            let appointment = require_appointment_by_token(conn, token)?;
            if !appointment.is_occupying() {
                return Err(BookingError::AlreadyTerminal {
                    id: appointment.id,
                    status: appointment.status,
                });
            }
            if self.policy.is_late(appointment.start, now) {
                return Err(BookingError::PolicyViolation(format!(
                    "appointment {} can no longer be rescheduled",
                    appointment.id
                )));
            }

            let session_type = require_session_type(conn, appointment.session_type_id)?;
            let query = self.public_query(new_start.date(), session_type.duration_minutes)?;
            let range = session_range(new_start, &session_type);

            let (calendar, mut booked) = load_day(conn, new_start.date())?;
            booked.retain(|a| a.id != appointment.id);
            if let Err(reason) = validate_slot(&calendar, &booked, &query, new_start) {
                warn!(appointment_id = %appointment.id, start = %new_start, ?reason, "reschedule rejected");
                return Err(BookingError::SlotUnavailable { range, reason });
            }

            appointments::move_to(conn, appointment.id, &range)?;
            info!(
                appointment_id = %appointment.id,
                from = %appointment.start,
                to = %new_start,
                "appointment rescheduled"
            );
            require_appointment(conn, appointment.id)
        })
    }

    /// Staff status override.
    ///
    /// Any status may be set. Cancelled statuses record the cancellation.
    /// Returning a non-occupying appointment to an occupying status requires
    /// its range to be free again.
    pub fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        reason: Option<&str>,
    ) -> Result<Appointment> {
        let now = self.now();
        self.write(|conn| {
            let appointment = require_appointment(conn, id)?;

            if status.is_occupying() && !appointment.is_occupying() {
                ensure_free(conn, &appointment.range(), Some(id))?;
            }

            if status.is_cancelled() {
                appointments::cancel(conn, id, status, now, Actor::Admin, reason)?;
            } else {
                appointments::set_status(conn, id, status)?;
            }

            info!(appointment_id = %id, from = %appointment.status, to = %status, "status updated");
            require_appointment(conn, id)
        })
    }

    // === Lookups ===

    pub fn appointment(&self, id: Uuid) -> Result<Appointment> {
        self.read(|conn| require_appointment(conn, id))
    }

    pub fn appointment_by_token(&self, token: &str) -> Result<Appointment> {
        self.read(|conn| require_appointment_by_token(conn, token))
    }

    /// Appointments of any status overlapping `range`, ordered by start.
    pub fn appointments_between(&self, range: &TimeRange) -> Result<Vec<Appointment>> {
        self.read(|conn| appointments::overlapping(conn, range))
    }

    // === Payments ===

    pub fn payment(&self, appointment_id: Uuid) -> Result<Payment> {
        self.read(|conn| require_payment(conn, appointment_id))
    }

    pub fn mark_paid(&self, appointment_id: Uuid, receipt_number: Option<&str>) -> Result<Payment> {
        let now = self.now();
        self.write(|conn| {
            let payment = require_payment(conn, appointment_id)?;
            payments::mark_paid(conn, payment.id, now, receipt_number)?;
            info!(%appointment_id, payment_id = %payment.id, "payment marked paid");
            require_payment(conn, appointment_id)
        })
    }

    pub fn mark_waived(&self, appointment_id: Uuid, notes: Option<&str>) -> Result<Payment> {
        self.write(|conn| {
            let payment = require_payment(conn, appointment_id)?;
            payments::mark_waived(conn, payment.id, notes)?;
            info!(%appointment_id, payment_id = %payment.id, "payment waived");
            require_payment(conn, appointment_id)
        })
    }

    /// Unpaid payments, ordered by appointment start.
    pub fn pending_payments(&self) -> Result<Vec<Payment>> {
        self.read(|conn| payments::with_status(conn, PaymentStatus::Unpaid))
    }
}

fn require_payment(conn: &Connection, appointment_id: Uuid) -> Result<Payment> {
    payments::for_appointment(conn, appointment_id)?
        .ok_or_else(|| BookingError::not_found("payment", appointment_id))
}

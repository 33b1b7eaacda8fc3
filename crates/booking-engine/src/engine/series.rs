//! Recurring series: dry-run check, all-or-nothing creation, deletion.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use slot_engine::calendar::is_whole_minute;
use slot_engine::{
    expand_ranges, Actor, Appointment, AppointmentStatus, AvailabilityCalendar, ConflictChecker,
    RecurringSeries, SessionType, TimeRange,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    find_or_create_patient, hull, insert_appointment, load_occupancy, require_appointment,
    require_session_type, session_range, BookingEngine,
};
use crate::error::{BookingError, Result};
use crate::model::{OccurrenceConflict, PatientInfo, SeriesCheck, SeriesDetails, SeriesRequest};
use crate::store::{appointments, catalog as catalog_store, series as series_store};

const SERIES_CANCELLED: &str = "recurring series cancelled";

/// A validated series with its occurrences checked against the store.
struct SeriesPlan {
    session_type: SessionType,
    ranges: Vec<TimeRange>,
    check: SeriesCheck,
}

impl BookingEngine {
    /// Expand a series and report every conflicting occurrence without
    /// writing anything.
    pub fn check_series_conflicts(&self, request: &SeriesRequest) -> Result<SeriesCheck> {
        let now = self.now();
        self.read(|conn| Ok(self.plan_series(conn, request, now)?.check))
    }

    /// Create a series and all of its occurrences, or nothing.
    ///
    /// # Errors
    /// `SeriesConflict` with every conflicting date if any occurrence overlaps
    /// an occupying appointment or a block. No patient, series or
    /// appointment is written in that case.
    pub fn create_recurring_series(
        &self,
        patient: &PatientInfo,
        request: &SeriesRequest,
    ) -> Result<SeriesDetails> {
        let now = self.now();
        self.write(|conn| {
            let plan = self.plan_series(conn, request, now)?;
            if !plan.check.is_clear() {
                let dates = plan.check.conflicting_dates();
                warn!(conflicts = dates.len(), "series rejected");
                return Err(BookingError::SeriesConflict { dates });
            }
            if plan.ranges.is_empty() {
                return Err(BookingError::Validation(
                    "series has no occurrences within the booking horizon".to_string(),
                ));
            }

            let patient = find_or_create_patient(conn, patient, now)?;
            let series = RecurringSeries {
                id: Uuid::new_v4(),
                patient_id: patient.id,
                session_type_id: plan.session_type.id,
                day_of_week: request.day_of_week,
                start_time: request.start_time,
                frequency: request.frequency,
                start_date: request.start_date,
                end_date: request.end_date,
                active: true,
            };
            series_store::insert(conn, &series)?;

            let mut created = Vec::with_capacity(plan.ranges.len());
            for range in plan.ranges {
                let (appointment, _) = insert_appointment(
                    conn,
                    &patient,
                    &plan.session_type,
                    range,
                    self.policy.initial_status,
                    Some(series.id),
                    now,
                )?;
                created.push(appointment);
            }

            info!(
                series_id = %series.id,
                patient_id = %patient.id,
                occurrences = created.len(),
                "series created"
            );
            Ok(SeriesDetails {
                series,
                appointments: created,
            })
        })
    }

    /// Deactivate a series and cancel its future occupying occurrences.
    ///
    /// Past occurrences and ones already attended, missed or cancelled keep
    /// their status.
    pub fn delete_recurring_series(&self, id: Uuid, reason: Option<&str>) -> Result<SeriesDetails> {
        let now = self.now();
        let reason = reason.unwrap_or(SERIES_CANCELLED);
        self.write(|conn| {
            let series = require_series(conn, id)?;
            let mut cancelled = 0;
            for appointment in appointments::for_series(conn, id)? {
                if appointment.start > now && appointment.is_occupying() {
                    appointments::cancel(
                        conn,
                        appointment.id,
                        AppointmentStatus::Cancelled,
                        now,
                        Actor::Admin,
                        Some(reason),
                    )?;
                    cancelled += 1;
                }
            }
            series_store::deactivate(conn, id)?;

            info!(series_id = %id, cancelled, "series deleted");
            Ok(SeriesDetails {
                series: RecurringSeries {
                    active: false,
                    ..series
                },
                appointments: appointments::for_series(conn, id)?,
            })
        })
    }

    /// Cancel a single occurrence of a series on the clinic's side.
    pub fn cancel_occurrence(&self, appointment_id: Uuid, reason: Option<&str>) -> Result<Appointment> {
        let now = self.now();
        self.write(|conn| {
            let appointment = require_appointment(conn, appointment_id)?;
            let Some(series_id) = appointment.recurring_series_id else {
                return Err(BookingError::Validation(format!(
                    "appointment {} is not part of a recurring series",
                    appointment_id
                )));
            };
            if !appointment.is_occupying() {
                return Err(BookingError::AlreadyTerminal {
                    id: appointment.id,
                    status: appointment.status,
                });
            }

            appointments::cancel(
                conn,
                appointment_id,
                AppointmentStatus::Cancelled,
                now,
                Actor::Admin,
                reason,
            )?;
            info!(%appointment_id, %series_id, "occurrence cancelled");
            require_appointment(conn, appointment_id)
        })
    }

    /// A series with all of its appointments.
    pub fn series(&self, id: Uuid) -> Result<SeriesDetails> {
        self.read(|conn| {
            Ok(SeriesDetails {
                series: require_series(conn, id)?,
                appointments: appointments::for_series(conn, id)?,
            })
        })
    }

    fn plan_series(
        &self,
        conn: &Connection,
        request: &SeriesRequest,
        now: NaiveDateTime,
    ) -> Result<SeriesPlan> {
        let session_type = require_session_type(conn, request.session_type_id)?;
        let today = now.date();

        if request.start_date < today {
            return Err(BookingError::Validation(format!(
                "start date {} is in the past",
                request.start_date
            )));
        }
        if let Some(end) = request.end_date {
            if end < request.start_date {
                return Err(BookingError::Validation(format!(
                    "end date {} is before start date {}",
                    end, request.start_date
                )));
            }
        }

        if !is_whole_minute(request.start_time) {
            return Err(BookingError::Validation(format!(
                "series time {} must be a whole minute",
                request.start_time
            )));
        }

        let rule = request.rule();
        let first = session_range(rule.first_date().and_time(request.start_time), &session_type);
        let calendar = AvailabilityCalendar::new(catalog_store::list_windows(conn)?, Vec::new());
        if !calendar.covers(&first) {
            return Err(BookingError::Validation(format!(
                "{} {}-{} is outside the availability windows",
                request.day_of_week,
                first.start.time(),
                first.end.time()
            )));
        }

        let horizon = self.policy.series_horizon(now);
        let ranges = expand_ranges(&rule, horizon, session_type.duration_minutes)?;

        let conflicts = match hull(&ranges) {
            Some(span) => {
                let (booked, blocks) = load_occupancy(conn, &span)?;
                ConflictChecker::new(&booked, &blocks)
                    .first_conflicts(&ranges)
                    .into_iter()
                    .map(|(i, conflict)| OccurrenceConflict {
                        date_time: ranges[i].start,
                        source: conflict.source,
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        let check = SeriesCheck {
            occurrences: ranges.iter().map(|r| r.start).collect(),
            conflicts,
        };
        Ok(SeriesPlan {
            session_type,
            ranges,
            check,
        })
    }
}

fn require_series(conn: &Connection, id: Uuid) -> Result<RecurringSeries> {
    series_store::by_id(conn, id)?.ok_or_else(|| BookingError::not_found("recurring series", id))
}

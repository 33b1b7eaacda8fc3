//! Records owned by the booking layer: patients, payments, and the request
//! and result shapes of the engine operations.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use slot_engine::{
    Appointment, AppointmentStatus, ConflictSource, Frequency, RecurrenceRule, RecurringSeries,
    Slot,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    /// Unique lookup key for public bookings.
    pub phone: String,
    pub email: Option<String>,
    /// Deactivated patients drop out of listings and search.
    pub active: bool,
    pub created_at: NaiveDateTime,
}

/// Patient details as typed into a booking form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl PatientInfo {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Waived,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "UNPAID",
            Self::Paid => "PAID",
            Self::Waived => "WAIVED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(Self::Unpaid),
            "PAID" => Ok(Self::Paid),
            "WAIVED" => Ok(Self::Waived),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// One payment per appointment, priced when the appointment is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub paid_at: Option<NaiveDateTime>,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
}

/// Public self-booking input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub session_type_id: Uuid,
    pub start: NaiveDateTime,
    pub patient: PatientInfo,
}

/// Staff booking input. Skips the advance window and the slot grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminBookingRequest {
    pub session_type_id: Uuid,
    pub start: NaiveDateTime,
    pub patient: PatientInfo,
    /// Defaults to the policy's initial status.
    pub status: Option<AppointmentStatus>,
}

/// A newly committed appointment together with the patient it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub appointment: Appointment,
    pub patient: Patient,
    pub payment: Payment,
}

/// Slots of one day, as returned by range queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// Recurring series definition, minus the patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRequest {
    pub session_type_id: Uuid,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl SeriesRequest {
    pub fn rule(&self) -> RecurrenceRule {
        RecurrenceRule {
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            frequency: self.frequency,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceConflict {
    pub date_time: NaiveDateTime,
    pub source: ConflictSource,
}

/// Dry-run result of a series check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesCheck {
    pub occurrences: Vec<NaiveDateTime>,
    pub conflicts: Vec<OccurrenceConflict>,
}

impl SeriesCheck {
    pub fn is_clear(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Distinct conflicting dates, chronological.
    pub fn conflicting_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.conflicts.iter().map(|c| c.date_time.date()).collect();
        dates.dedup();
        dates
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesDetails {
    #[serde(flatten)]
    pub series: RecurringSeries,
    pub appointments: Vec<Appointment>,
}

//! Booking domain records shared by the generator, the conflict checker and
//! the transactional layer.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::range::TimeRange;

/// Appointment lifecycle status.
///
/// Only `Scheduled` and `Confirmed` occupy a slot. Every other status is
/// terminal for the public booking flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    CancelledLate,
    Attended,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_occupying(self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed)
    }

    pub fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled | Self::CancelledLate)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::CancelledLate => "CANCELLED_LATE",
            Self::Attended => "ATTENDED",
            Self::NoShow => "NO_SHOW",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "SCHEDULED" => Ok(Self::Scheduled),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            "CANCELLED_LATE" => Ok(Self::CancelledLate),
            "ATTENDED" => Ok(Self::Attended),
            "NO_SHOW" => Ok(Self::NoShow),
            other => Err(format!("unknown appointment status: {other}")),
        }
    }
}

/// Who performed a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    Patient,
    Admin,
}

impl Actor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "PATIENT",
            Self::Admin => "ADMIN",
        }
    }
}

impl FromStr for Actor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PATIENT" => Ok(Self::Patient),
            "ADMIN" => Ok(Self::Admin),
            other => Err(format!("unknown actor: {other}")),
        }
    }
}

/// A bookable kind of session. Its duration sets the slot length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionType {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: u32,
    /// Price in the smallest currency unit.
    pub price_cents: i64,
    pub active: bool,
}

/// A booked session.
///
/// `end` is fixed when the appointment is created or rescheduled. Changing the
/// session type's duration later does not move it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub session_type_id: Uuid,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: AppointmentStatus,
    pub cancellation_token: String,
    pub recurring_series_id: Option<Uuid>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub cancelled_by: Option<Actor>,
    pub cancellation_reason: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Appointment {
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }

    pub fn is_occupying(&self) -> bool {
        self.status.is_occupying()
    }
}

/// Recurrence step for a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Weekly,
    Biweekly,
}

impl Frequency {
    /// Number of weeks between consecutive occurrences.
    pub fn interval_weeks(self) -> u32 {
        match self {
            Self::Weekly => 1,
            Self::Biweekly => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "WEEKLY",
            Self::Biweekly => "BIWEEKLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WEEKLY" => Ok(Self::Weekly),
            "BIWEEKLY" => Ok(Self::Biweekly),
            other => Err(format!("unknown frequency: {other}")),
        }
    }
}

/// A stored weekly/biweekly booking rule for one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringSeries {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub session_type_id: Uuid,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
}

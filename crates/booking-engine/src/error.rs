//! Error types for booking-engine operations.

use chrono::NaiveDate;
use slot_engine::{AppointmentStatus, SlotError, TimeRange, Unavailable};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BookingError {
    /// Malformed input, e.g. an end before its start.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested range cannot be booked. Carries the range and the reason.
    #[error("Slot unavailable: {} - {} ({reason:?})", range.start, range.end)]
    SlotUnavailable { range: TimeRange, reason: Unavailable },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The appointment is cancelled, attended or a no-show.
    #[error("Appointment {id} is already {status}")]
    AlreadyTerminal { id: Uuid, status: AppointmentStatus },

    /// A recurring series was rejected. Lists every conflicting date.
    #[error("Series conflicts on {} date(s): {}", dates.len(), join_dates(dates))]
    SeriesConflict { dates: Vec<NaiveDate> },

    /// The request is well-formed but booking rules forbid it.
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl BookingError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

impl From<SlotError> for BookingError {
    fn from(err: SlotError) -> Self {
        Self::Validation(err.to_string())
    }
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience alias used throughout booking-engine.
pub type Result<T> = std::result::Result<T, BookingError>;

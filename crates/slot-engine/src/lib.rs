//! # slot-engine
//!
//! Deterministic slot generation and booking-conflict detection for
//! appointment calendars.
//!
//! Everything in this crate is pure: callers pass in the calendar, the
//! occupying appointments and the booking window, and get back ordered,
//! reproducible results. Storage, clocks and transactions live one layer up,
//! in `booking-engine`.
//!
//! ## Modules
//!
//! - [`range`] — half-open `[start, end)` date-time ranges and the overlap test
//! - [`model`] — appointments, statuses, session types, recurring series
//! - [`calendar`] — weekly availability windows plus one-off blocks
//! - [`slots`] — date + session duration → bookable slot start times
//! - [`conflict`] — overlap detection against appointments and blocks
//! - [`recurrence`] — weekly/biweekly rule → concrete occurrence date-times
//! - [`error`] — Error types

pub mod calendar;
pub mod conflict;
pub mod error;
pub mod model;
pub mod range;
pub mod recurrence;
pub mod slots;

pub use calendar::{AvailabilityCalendar, AvailabilityWindow, Block, BlockType};
pub use conflict::{Conflict, ConflictChecker, ConflictSource};
pub use error::SlotError;
pub use model::{Actor, Appointment, AppointmentStatus, Frequency, RecurringSeries, SessionType};
pub use range::TimeRange;
pub use recurrence::{expand, expand_ranges, RecurrenceRule};
pub use slots::{generate_slots, validate_slot, Slot, SlotQuery, Unavailable};

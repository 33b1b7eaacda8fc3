//! # booking-engine
//!
//! Transactional appointment booking for a single-practitioner clinic.
//!
//! Wraps the pure algorithms of [`slot_engine`] with a SQLite store, a clock,
//! a booking policy and cancellation-token minting. Every mutating operation
//! runs inside one `BEGIN IMMEDIATE` transaction that re-reads the calendar,
//! re-validates the requested range and only then writes, so two callers
//! racing for the same slot can never both succeed.
//!
//! ## Modules
//!
//! - [`engine`] — `BookingEngine`: slots, bookings, cancellation, reschedule,
//!   recurring series, catalog and payments
//! - [`model`] — patients, payments, requests and results
//! - [`store`] — SQLite schema and row mapping
//! - [`config`] — TOML configuration and the booking policy
//! - [`clock`] — injectable wall clock
//! - [`token`] — cancellation token minting
//! - [`error`] — Error types

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;
pub mod token;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BookingPolicy, Config};
pub use engine::BookingEngine;
pub use error::BookingError;
pub use model::{
    AdminBookingRequest, Booking, BookingRequest, DaySlots, OccurrenceConflict, Patient,
    PatientInfo, Payment, PaymentStatus, SeriesCheck, SeriesDetails, SeriesRequest,
};

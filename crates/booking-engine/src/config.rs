//! Configuration management
//!
//! Settings are read from a TOML file:
//!
//! ```toml
//! database_path = "agenda.db"
//!
//! [policy]
//! timezone = "America/Sao_Paulo"
//! min_advance_hours = 12
//! max_advance_days = 90
//! cancellation_notice_hours = 24
//! # slot_step_minutes = 15
//! initial_status = "confirmed"
//! ```
//!
//! Every key is optional and falls back to the defaults shown above.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use slot_engine::AppointmentStatus;

use crate::error::{BookingError, Result};

/// Status given to newly booked appointments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InitialStatus {
    Scheduled,
    #[default]
    Confirmed,
}

impl From<InitialStatus> for AppointmentStatus {
    fn from(status: InitialStatus) -> Self {
        match status {
            InitialStatus::Scheduled => AppointmentStatus::Scheduled,
            InitialStatus::Confirmed => AppointmentStatus::Confirmed,
        }
    }
}

/// The `[policy]` table as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// IANA timezone the clinic's wall clock runs in
    pub timezone: String,

    /// Earliest bookable start, in hours from now
    pub min_advance_hours: u32,

    /// Latest bookable start, in days from now
    pub max_advance_days: u32,

    /// Cancelling with less notice than this is a late cancellation
    pub cancellation_notice_hours: u32,

    /// Slot walk step; the session duration when absent
    pub slot_step_minutes: Option<u32>,

    pub initial_status: InitialStatus,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            min_advance_hours: 12,
            max_advance_days: 90,
            cancellation_notice_hours: 24,
            slot_step_minutes: None,
            initial_status: InitialStatus::default(),
        }
    }
}

fn default_timezone() -> String {
    "America/Sao_Paulo".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("agenda.db")
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    pub policy: PolicyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            policy: PolicyConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BookingError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| BookingError::Config(e.to_string()))?;
        config.policy()?;
        Ok(config)
    }

    /// The runtime booking policy described by this config.
    pub fn policy(&self) -> Result<BookingPolicy> {
        BookingPolicy::try_from(&self.policy)
    }
}

/// Booking rules in their runtime form.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingPolicy {
    pub timezone: Tz,
    pub min_advance: Duration,
    pub max_advance: Duration,
    pub cancellation_notice: Duration,
    pub slot_step_minutes: Option<u32>,
    pub initial_status: AppointmentStatus,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        // The default config always validates.
        match BookingPolicy::try_from(&PolicyConfig::default()) {
            Ok(policy) => policy,
            Err(_) => unreachable!("default policy is valid"),
        }
    }
}

impl TryFrom<&PolicyConfig> for BookingPolicy {
    type Error = BookingError;

    fn try_from(config: &PolicyConfig) -> Result<Self> {
        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|_| BookingError::Config(format!("invalid timezone: {}", config.timezone)))?;

        if config.slot_step_minutes == Some(0) {
            return Err(BookingError::Config(
                "slot_step_minutes must be greater than zero".to_string(),
            ));
        }
        if config.max_advance_days == 0 {
            return Err(BookingError::Config(
                "max_advance_days must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            timezone,
            min_advance: Duration::hours(i64::from(config.min_advance_hours)),
            max_advance: Duration::days(i64::from(config.max_advance_days)),
            cancellation_notice: Duration::hours(i64::from(config.cancellation_notice_hours)),
            slot_step_minutes: config.slot_step_minutes,
            initial_status: config.initial_status.into(),
        })
    }
}

impl BookingPolicy {
    /// Clinic wall-clock time for an instant.
    pub fn local(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.timezone).naive_local()
    }

    /// Admissible public booking starts: `[now + min_advance, now + max_advance)`.
    pub fn booking_window(&self, local_now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        (local_now + self.min_advance, local_now + self.max_advance)
    }

    /// Last date a recurring series may generate occurrences on.
    pub fn series_horizon(&self, local_now: NaiveDateTime) -> NaiveDate {
        (local_now + self.max_advance).date()
    }

    /// Cancelling an appointment starting at `start` is late when less than
    /// the notice period remains.
    pub fn is_late(&self, start: NaiveDateTime, local_now: NaiveDateTime) -> bool {
        start - local_now < self.cancellation_notice
    }
}

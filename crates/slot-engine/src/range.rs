//! Half-open date-time ranges.
//!
//! All times are clinic-local wall-clock times (`NaiveDateTime`). Two ranges
//! overlap when `a.start < b.end && b.start < a.end`, so back-to-back ranges
//! (one ends exactly when the other starts) never conflict.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SlotError};

/// A `[start, end)` interval of clinic-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    /// Build a range, rejecting empty or inverted intervals.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start >= end {
            return Err(SlotError::InvalidRange(format!(
                "start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// A range of `minutes` length beginning at `start`.
    pub fn starting_at(start: NaiveDateTime, minutes: u32) -> Result<Self> {
        if minutes == 0 {
            return Err(SlotError::InvalidDuration(0));
        }
        Ok(Self {
            start,
            end: start + Duration::minutes(i64::from(minutes)),
        })
    }

    /// The whole calendar day `[date 00:00, date+1 00:00)`.
    pub fn day(date: NaiveDate) -> Self {
        let start = date.and_time(chrono::NaiveTime::MIN);
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Minutes shared by both ranges, zero when they do not overlap.
    pub fn overlap_minutes(&self, other: &TimeRange) -> i64 {
        if !self.overlaps(other) {
            return 0;
        }
        (self.end.min(other.end) - self.start.max(other.start)).num_minutes()
    }

    /// True when `other` lies entirely inside this range.
    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

//! Weekly availability windows and one-off blocks.
//!
//! The calendar is a read-only view over stored records. It answers two
//! questions for the slot generator: which windows are open on a given
//! weekday, and which blocks touch a given range.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SlotError};
use crate::range::TimeRange;

/// Recurring open hours on one day of the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
}

impl AvailabilityWindow {
    /// Create an active window. `start_time` must be before `end_time`.
    pub fn new(day_of_week: Weekday, start_time: NaiveTime, end_time: NaiveTime) -> Result<Self> {
        validate_window(start_time, end_time)?;
        Ok(Self {
            id: Uuid::new_v4(),
            day_of_week,
            start_time,
            end_time,
            active: true,
        })
    }

    /// The concrete range this window covers on `date`.
    pub fn range_on(&self, date: NaiveDate) -> TimeRange {
        TimeRange {
            start: date.and_time(self.start_time),
            end: date.and_time(self.end_time),
        }
    }
}

/// Windows and series times live on a whole-minute grid.
pub fn is_whole_minute(time: NaiveTime) -> bool {
    time.second() == 0 && time.nanosecond() == 0
}

pub fn validate_window(start_time: NaiveTime, end_time: NaiveTime) -> Result<()> {
    for t in [start_time, end_time] {
        if !is_whole_minute(t) {
            return Err(SlotError::InvalidRange(format!(
                "window bound {} must be a whole minute",
                t
            )));
        }
    }
    if start_time >= end_time {
        return Err(SlotError::InvalidRange(format!(
            "window start {} must be before end {}",
            start_time, end_time
        )));
    }
    Ok(())
}

/// Why a block exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Vacation,
    Holiday,
    Break,
}

impl BlockType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vacation => "VACATION",
            Self::Holiday => "HOLIDAY",
            Self::Break => "BREAK",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VACATION" => Ok(Self::Vacation),
            "HOLIDAY" => Ok(Self::Holiday),
            "BREAK" => Ok(Self::Break),
            other => Err(format!("unknown block type: {other}")),
        }
    }
}

/// An absolute range in which nothing may be booked, whatever the weekly
/// availability says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub block_type: BlockType,
    pub reason: Option<String>,
}

impl Block {
    pub fn new(range: TimeRange, block_type: BlockType, reason: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start: range.start,
            end: range.end,
            block_type,
            reason,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// Availability windows plus blocks, as loaded for one query.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityCalendar {
    windows: Vec<AvailabilityWindow>,
    blocks: Vec<Block>,
}

impl AvailabilityCalendar {
    pub fn new(windows: Vec<AvailabilityWindow>, blocks: Vec<Block>) -> Self {
        Self { windows, blocks }
    }

    /// Active windows for `day`, ordered by start time then end time.
    pub fn windows_for(&self, day: Weekday) -> Vec<&AvailabilityWindow> {
        let mut windows: Vec<&AvailabilityWindow> = self
            .windows
            .iter()
            .filter(|w| w.active && w.day_of_week == day)
            .collect();
        windows.sort_by_key(|w| (w.start_time, w.end_time));
        windows
    }

    /// Blocks overlapping `range` (half-open test).
    pub fn blocks_overlapping(&self, range: &TimeRange) -> Vec<&Block> {
        self.blocks
            .iter()
            .filter(|b| b.range().overlaps(range))
            .collect()
    }

    /// True when `range` sits entirely inside a single active window of its
    /// start date's weekday.
    pub fn covers(&self, range: &TimeRange) -> bool {
        let date = range.start.date();
        self.windows_for(date.weekday())
            .iter()
            .any(|w| w.range_on(date).contains(range))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}

//! Bookable slot generation.
//!
//! For one date and one session duration: walk every active window of that
//! weekday in fixed steps, drop candidates that fall outside the caller's
//! booking window, drop candidates that touch a block or an occupying
//! appointment, and drop candidates overlapping a slot already emitted. The
//! result is chronological and free of duplicates and overlaps.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::calendar::{AvailabilityCalendar, BlockType};
use crate::error::{Result, SlotError};
use crate::model::Appointment;
use crate::range::TimeRange;

/// A bookable slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub time: NaiveTime,
    pub date_time: NaiveDateTime,
    pub end: NaiveDateTime,
    pub available: bool,
}

impl Slot {
    fn from_range(range: TimeRange) -> Self {
        Self {
            time: range.start.time(),
            date_time: range.start,
            end: range.end,
            available: true,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.date_time,
            end: self.end,
        }
    }
}

/// Parameters for one generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotQuery {
    date: NaiveDate,
    duration_minutes: u32,
    step_minutes: u32,
    min_start: Option<NaiveDateTime>,
    max_start: Option<NaiveDateTime>,
}

impl SlotQuery {
    /// Slots of `duration_minutes` on `date`, stepping by the duration.
    pub fn new(date: NaiveDate, duration_minutes: u32) -> Result<Self> {
        if duration_minutes == 0 {
            return Err(SlotError::InvalidDuration(0));
        }
        Ok(Self {
            date,
            duration_minutes,
            step_minutes: duration_minutes,
            min_start: None,
            max_start: None,
        })
    }

    /// Override the walk step. `None` keeps the session duration.
    pub fn with_step(mut self, step_minutes: Option<u32>) -> Result<Self> {
        match step_minutes {
            Some(0) => Err(SlotError::InvalidDuration(0)),
            Some(step) => {
                self.step_minutes = step;
                Ok(self)
            }
            None => Ok(self),
        }
    }

    /// Only admit slot starts in `[min_start, max_start)`.
    pub fn within(mut self, min_start: Option<NaiveDateTime>, max_start: Option<NaiveDateTime>) -> Self {
        self.min_start = min_start;
        self.max_start = max_start;
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    fn admits(&self, start: NaiveDateTime) -> bool {
        self.min_start.is_none_or(|min| start >= min) && self.max_start.is_none_or(|max| start < max)
    }
}

/// Why a requested start time cannot be booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Unavailable {
    /// Before the earliest or after the latest admissible start.
    OutsideBookingWindow,
    /// Not a boundary the generator would produce for this date.
    NotOnSlotGrid,
    /// Overlaps a vacation, holiday or break.
    Blocked { range: TimeRange, block_type: BlockType },
    /// Overlaps an occupying appointment.
    Booked { range: TimeRange },
}

/// Raw fixed-step candidates for every active window, sorted and
/// de-duplicated.
fn candidates(calendar: &AvailabilityCalendar, query: &SlotQuery) -> Vec<TimeRange> {
    let duration = Duration::minutes(i64::from(query.duration_minutes));
    let step = Duration::minutes(i64::from(query.step_minutes));
    let mut out = Vec::new();

    for window in calendar.windows_for(query.date.weekday()) {
        let window = window.range_on(query.date);
        let mut cursor = window.start;
        while cursor + duration <= window.end {
            out.push(TimeRange {
                start: cursor,
                end: cursor + duration,
            });
            cursor += step;
        }
    }

    out.sort();
    out.dedup();
    out
}

/// Merge blocks and occupying appointments into sorted, non-overlapping busy
/// periods clipped to `window`.
fn merge_busy_periods(
    calendar: &AvailabilityCalendar,
    appointments: &[Appointment],
    window: TimeRange,
) -> Vec<TimeRange> {
    let mut intervals: Vec<TimeRange> = calendar
        .blocks_overlapping(&window)
        .into_iter()
        .map(|b| b.range())
        .chain(
            appointments
                .iter()
                .filter(|a| a.is_occupying())
                .map(Appointment::range)
                .filter(|r| r.overlaps(&window)),
        )
        .map(|r| TimeRange {
            start: r.start.max(window.start),
            end: r.end.min(window.end),
        })
        .collect();

    if intervals.is_empty() {
        return Vec::new();
    }

    intervals.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<TimeRange> = Vec::new();
    for range in intervals {
        if let Some(last) = merged.last_mut() {
            if range.start <= last.end {
                last.end = last.end.max(range.end);
                continue;
            }
        }
        merged.push(range);
    }

    merged
}

/// True when `candidate` overlaps any of the sorted, disjoint `busy` periods.
fn is_busy(busy: &[TimeRange], candidate: &TimeRange) -> bool {
    // First busy period that ends after the candidate starts.
    let idx = busy.partition_point(|b| b.end <= candidate.start);
    busy.get(idx).is_some_and(|b| b.start < candidate.end)
}

/// Generate the bookable slots for `query`.
///
/// `appointments` may contain any status; only `Scheduled` and `Confirmed`
/// ones make a slot unavailable. Pass the appointments overlapping the query
/// date (extra ones are ignored).
pub fn generate_slots(
    calendar: &AvailabilityCalendar,
    appointments: &[Appointment],
    query: &SlotQuery,
) -> Vec<Slot> {
    let busy = merge_busy_periods(calendar, appointments, TimeRange::day(query.date));

    let mut slots: Vec<Slot> = Vec::new();
    let mut last_end: Option<NaiveDateTime> = None;

    for candidate in candidates(calendar, query) {
        if !query.admits(candidate.start) || is_busy(&busy, &candidate) {
            continue;
        }
        if last_end.is_some_and(|end| candidate.start < end) {
            continue;
        }
        last_end = Some(candidate.end);
        slots.push(Slot::from_range(candidate));
    }

    slots
}

/// Check that `start` is exactly a slot [`generate_slots`] would return for
/// `query`, and explain why not otherwise.
pub fn validate_slot(
    calendar: &AvailabilityCalendar,
    appointments: &[Appointment],
    query: &SlotQuery,
    start: NaiveDateTime,
) -> std::result::Result<Slot, Unavailable> {
    let range = TimeRange {
        start,
        end: start + Duration::minutes(i64::from(query.duration_minutes)),
    };

    if start.date() != query.date || !query.admits(start) {
        return Err(Unavailable::OutsideBookingWindow);
    }

    if !candidates(calendar, query).contains(&range) {
        return Err(Unavailable::NotOnSlotGrid);
    }

    if let Some(block) = calendar.blocks_overlapping(&range).first() {
        return Err(Unavailable::Blocked {
            range: block.range(),
            block_type: block.block_type,
        });
    }

    if let Some(appointment) = appointments
        .iter()
        .find(|a| a.is_occupying() && a.range().overlaps(&range))
    {
        return Err(Unavailable::Booked {
            range: appointment.range(),
        });
    }

    generate_slots(calendar, appointments, query)
        .into_iter()
        .find(|slot| slot.date_time == start)
        .ok_or(Unavailable::NotOnSlotGrid)
}

//! Weekly recurrence expansion -- converts a series rule into concrete
//! occurrence date-times.
//!
//! The rule is rendered as an RFC 5545 RRULE (`FREQ=WEEKLY;INTERVAL=n;UNTIL=..`)
//! and expanded with the `rrule` crate. Times are clinic wall-clock times, so
//! expansion runs in UTC where every day is exactly 24 hours long and the
//! wall-clock time of day is preserved across the whole series.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SlotError};
use crate::model::Frequency;
use crate::range::TimeRange;

/// Upper bound on generated occurrences. Ten years of weekly sessions.
const MAX_OCCURRENCES: u16 = 520;

/// A weekly or biweekly booking rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl RecurrenceRule {
    /// First date on or after `start_date` that falls on `day_of_week`.
    pub fn first_date(&self) -> NaiveDate {
        let offset = (7 + self.day_of_week.num_days_from_monday()
            - self.start_date.weekday().num_days_from_monday())
            % 7;
        self.start_date + Duration::days(i64::from(offset))
    }

    /// Last admissible occurrence date: the earlier of `end_date` and
    /// `horizon_end`.
    pub fn effective_end(&self, horizon_end: NaiveDate) -> NaiveDate {
        match self.end_date {
            Some(end) => end.min(horizon_end),
            None => horizon_end,
        }
    }

    fn to_rrule_text(&self, first: NaiveDateTime, until: NaiveDateTime) -> String {
        format!(
            "DTSTART;TZID=UTC:{}\nRRULE:FREQ=WEEKLY;INTERVAL={};UNTIL={}Z",
            first.format("%Y%m%dT%H%M%S"),
            self.frequency.interval_weeks(),
            until.format("%Y%m%dT%H%M%S"),
        )
    }
}

/// Expand `rule` into occurrence start times, chronologically ordered.
///
/// Starts at the first matching weekday on or after `rule.start_date` and
/// steps 7 (weekly) or 14 (biweekly) days until the occurrence date passes
/// `rule.end_date` or `horizon_end`, whichever comes first.
///
/// # Errors
/// Returns `SlotError::InvalidRule` if the end date precedes the start date,
/// or if the generated RRULE fails to parse.
pub fn expand(rule: &RecurrenceRule, horizon_end: NaiveDate) -> Result<Vec<NaiveDateTime>> {
    if let Some(end) = rule.end_date {
        if end < rule.start_date {
            return Err(SlotError::InvalidRule(format!(
                "end date {} is before start date {}",
                end, rule.start_date
            )));
        }
    }

    let first = rule.first_date();
    let last = rule.effective_end(horizon_end);

    // Short-circuit: nothing fits before the end of the window.
    if first > last {
        return Ok(Vec::new());
    }

    let first_at = first.and_time(rule.start_time);
    let until_at = last.and_time(rule.start_time);

    let rrule_set: RRuleSet = rule
        .to_rrule_text(first_at, until_at)
        .parse()
        .map_err(|e| SlotError::InvalidRule(format!("{}", e)))?;

    let instances = rrule_set.all(MAX_OCCURRENCES);
    if instances.limited {
        return Err(SlotError::Expansion(format!(
            "series exceeds {} occurrences",
            MAX_OCCURRENCES
        )));
    }

    Ok(instances
        .dates
        .into_iter()
        .map(|dt| dt.with_timezone(&Utc).naive_utc())
        .collect())
}

/// Expand `rule` into occurrence ranges of `duration_minutes` each.
pub fn expand_ranges(
    rule: &RecurrenceRule,
    horizon_end: NaiveDate,
    duration_minutes: u32,
) -> Result<Vec<TimeRange>> {
    expand(rule, horizon_end)?
        .into_iter()
        .map(|start| TimeRange::starting_at(start, duration_minutes))
        .collect()
}

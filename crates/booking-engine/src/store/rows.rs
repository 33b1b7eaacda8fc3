//! Column encoding shared by the entity modules.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use rusqlite::types::Type;
use rusqlite::{Error, Row};
use uuid::Uuid;

pub(crate) fn ts(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp()
}

pub(crate) fn minute_of_day(t: NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight() / 60)
}

pub(crate) fn weekday_num(day: Weekday) -> i64 {
    i64::from(day.num_days_from_monday())
}

pub(crate) fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn bad(idx: usize, ty: Type, msg: String) -> Error {
    Error::FromSqlConversionFailure(idx, ty, msg.into())
}

pub(crate) fn uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| bad(idx, Type::Text, e.to_string()))
}

pub(crate) fn opt_uuid(row: &Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) => Uuid::parse_str(&text)
            .map(Some)
            .map_err(|e| bad(idx, Type::Text, e.to_string())),
        None => Ok(None),
    }
}

fn from_ts(idx: usize, secs: i64) -> rusqlite::Result<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| bad(idx, Type::Integer, format!("timestamp out of range: {secs}")))
}

pub(crate) fn datetime(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    from_ts(idx, row.get(idx)?)
}

pub(crate) fn opt_datetime(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|secs| from_ts(idx, secs))
        .transpose()
}

fn parse_date(idx: usize, text: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| bad(idx, Type::Text, e.to_string()))
}

pub(crate) fn date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    parse_date(idx, &text)
}

pub(crate) fn opt_date(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    row.get::<_, Option<String>>(idx)?
        .map(|text| parse_date(idx, &text))
        .transpose()
}

pub(crate) fn time(row: &Row, idx: usize) -> rusqlite::Result<NaiveTime> {
    let minutes: i64 = row.get(idx)?;
    u32::try_from(minutes * 60)
        .ok()
        .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
        .ok_or_else(|| bad(idx, Type::Integer, format!("invalid minute of day: {minutes}")))
}

pub(crate) fn weekday(row: &Row, idx: usize) -> rusqlite::Result<Weekday> {
    let n: i64 = row.get(idx)?;
    u8::try_from(n)
        .ok()
        .and_then(|n| Weekday::try_from(n).ok())
        .ok_or_else(|| bad(idx, Type::Integer, format!("invalid weekday: {n}")))
}

/// Parse an enum stored by its `as_str` spelling.
pub(crate) fn parsed<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| bad(idx, Type::Text, e))
}

pub(crate) fn opt_parsed<T: FromStr<Err = String>>(
    row: &Row,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    row.get::<_, Option<String>>(idx)?
        .map(|text| text.parse().map_err(|e| bad(idx, Type::Text, e)))
        .transpose()
}

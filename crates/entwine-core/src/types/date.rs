//! Date and timestamp normalization hook.
//!
//! Heterogeneous external inputs (ISO-8601 text with or without offset,
//! date-only text, unix epoch seconds) are funneled through here by both the
//! validator and the transformer. Naive inputs are taken as UTC.

use crate::{
    error::{Error, ErrorOrigin},
    value::Value,
};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
    macros::format_description,
};

/// Parse a calendar date from `YYYY-MM-DD` or `MM/DD/YYYY`, or from a
/// timestamp's date part.
pub fn parse_date(text: &str) -> Result<Date, Error> {
    let text = text.trim();

    if let Ok(date) = Date::parse(text, format_description!("[year]-[month]-[day]")) {
        return Ok(date);
    }

    // catalogue exports write US dates
    if let Ok(date) = Date::parse(text, format_description!("[month]/[day]/[year]")) {
        return Ok(date);
    }

    parse_timestamp(text).map(OffsetDateTime::date)
}

/// Parse an ISO-8601 / RFC 3339 timestamp, normalized to UTC.
pub fn parse_timestamp(text: &str) -> Result<OffsetDateTime, Error> {
    let text = text.trim();

    if let Ok(ts) = OffsetDateTime::parse(text, &Rfc3339) {
        return Ok(ts.to_offset(time::UtcOffset::UTC));
    }

    if let Some(naive) = parse_naive(text) {
        return Ok(naive.assume_utc());
    }

    if let Ok(date) = Date::parse(text, format_description!("[year]-[month]-[day]")) {
        return Ok(date.midnight().assume_utc());
    }

    Err(Error::type_mismatch(
        ErrorOrigin::Date,
        format!("failed to parse '{text}' as an ISO-8601 timestamp"),
    ))
}

// Naive datetimes in the shapes `datetime.isoformat()` style producers emit.
fn parse_naive(text: &str) -> Option<PrimitiveDateTime> {
    let candidates = [
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        ),
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        ),
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        ),
        PrimitiveDateTime::parse(
            text,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        ),
        PrimitiveDateTime::parse(text, format_description!("[year]-[month]-[day]T[hour]:[minute]")),
    ];

    candidates.into_iter().find_map(Result::ok)
}

/// Convert unix epoch seconds to a UTC timestamp.
pub fn from_unix(seconds: i64) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::from_unix_timestamp(seconds).map_err(|err| {
        Error::type_mismatch(
            ErrorOrigin::Date,
            format!("unix timestamp {seconds} out of range: {err}"),
        )
    })
}

#[must_use]
pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

#[must_use]
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

///
/// COERCION HOOKS
///
/// Return `Some(coerced)` when the input could be converted, `None` when the
/// value should be left alone for the matcher to judge.
///

#[must_use]
pub fn coerce_date(value: &Value) -> Option<Value> {
    match value {
        Value::Text(text) => parse_date(text).ok().map(Value::Date),
        Value::Timestamp(ts) => Some(Value::Date(ts.date())),
        _ => None,
    }
}

#[must_use]
pub fn coerce_timestamp(value: &Value) -> Option<Value> {
    match value {
        Value::Text(text) => parse_timestamp(text).ok().map(Value::Timestamp),
        Value::Int(seconds) => from_unix(*seconds).ok().map(Value::Timestamp),
        Value::Date(date) => Some(Value::Timestamp(date.midnight().assume_utc())),
        _ => None,
    }
}

///
/// TESTS
///

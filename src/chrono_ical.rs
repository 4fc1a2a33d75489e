use chrono::prelude::*;
use chrono::Duration;
use lazy_static::lazy_static;
use regex::Regex;

use crate::domain::{LocalStart, RecordError};

lazy_static! {
    /// `YYYYMMDD`, optionally followed by `THHMMSS` and an optional `Z`.
    static ref DATE_TOKEN_REGEX: Regex =
        Regex::new(r"^([0-9]{4})([0-9]{2})([0-9]{2})(?:T([0-9]{2})([0-9]{2})([0-9]{2})(Z)?)?$")
            .unwrap();
}

/// Converts a timezone offset in hours into whole minutes, so `5.5` becomes `330`.
pub fn offset_minutes(timezone_hours: f64) -> i64 {
    (timezone_hours * 60.0).round() as i64
}

fn malformed(token: &str) -> RecordError {
    RecordError::MalformedDateToken(token.to_string())
}

/// Normalizes a DTSTART value into local time.
///
/// - `YYYYMMDD` is an all-day date and is never shifted, otherwise it could move into
///   another day. See <https://tools.ietf.org/html/rfc5545#section-3.3.4>
/// - `YYYYMMDDTHHMMSSZ` is UTC and gets the timezone offset applied, rolling over day,
///   month and year boundaries.
/// - `YYYYMMDDTHHMMSS` is floating time and is taken as already local.
///   See <https://tools.ietf.org/html/rfc5545#section-3.3.5>
pub fn normalize_date_token(token: &str, timezone_hours: f64) -> Result<LocalStart, RecordError> {
    let caps = DATE_TOKEN_REGEX
        .captures(token)
        .ok_or_else(|| malformed(token))?;
    let number = |index: usize| -> Result<u32, RecordError> {
        caps.get(index)
            .ok_or_else(|| malformed(token))?
            .as_str()
            .parse::<u32>()
            .map_err(|_| malformed(token))
    };
    let date = NaiveDate::from_ymd_opt(number(1)? as i32, number(2)?, number(3)?)
        .ok_or_else(|| malformed(token))?;
    if caps.get(4).is_none() {
        return Ok(LocalStart {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            hour: 0,
            minute: 0,
            has_time: false,
        });
    }
    let time = NaiveTime::from_hms_opt(number(4)?, number(5)?, number(6)?)
        .ok_or_else(|| malformed(token))?;
    let mut local = date.and_time(time);
    if caps.get(7).is_some() {
        let offset = Duration::try_minutes(offset_minutes(timezone_hours))
            .ok_or_else(|| malformed(token))?;
        local = local
            .checked_add_signed(offset)
            .ok_or_else(|| malformed(token))?;
    }
    Ok(LocalStart {
        year: local.year(),
        month: local.month(),
        day: local.day(),
        hour: local.hour(),
        minute: local.minute(),
        has_time: true,
    })
}

use anyhow::{bail, Result};
use chrono::{NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

const DAYFIRST_DATETIME_FORMATS: &[&str] = &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];

const DAYFIRST_DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

/// Parse a date or date-time cell into UTC milliseconds.
///
/// Empty cells are `Ok(None)`; anything else that matches none of the known layouts is an
/// error. `explicit` is tried first, then day-first layouts when `dayfirst` is set, then
/// ISO-like layouts. A bare `YYYY-MM` maps to the first of the month.
pub fn parse_timestamp_millis(raw: &str, dayfirst: bool, explicit: Option<&str>) -> Result<Option<i64>> {
    let s = raw.trim().trim_matches('"');
    if s.is_empty() {
        return Ok(None);
    }
    if let Some(fmt) = explicit {
        if let Some(dt) = try_formats(s, &[fmt], &[fmt]) {
            return Ok(Some(dt.and_utc().timestamp_millis()));
        }
    }
    if dayfirst {
        if let Some(dt) = try_formats(s, DAYFIRST_DATETIME_FORMATS, DAYFIRST_DATE_FORMATS) {
            return Ok(Some(dt.and_utc().timestamp_millis()));
        }
    }
    if let Some(dt) = try_formats(s, DATETIME_FORMATS, DATE_FORMATS) {
        return Ok(Some(dt.and_utc().timestamp_millis()));
    }
    if let Some(dt) = year_month(s) {
        return Ok(Some(dt.and_utc().timestamp_millis()));
    }
    bail!("unrecognised date/time {s:?}")
}

fn try_formats(s: &str, datetimes: &[&str], dates: &[&str]) -> Option<NaiveDateTime> {
    datetimes
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            dates
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn year_month(s: &str) -> Option<NaiveDateTime> {
    let (y, m) = s.split_once('-')?;
    if y.len() != 4 || m.len() > 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, 1)?.and_hms_opt(0, 0, 0)
}

/// Millis for a composite `year/month/day/hour`; `None` when any part is out of range.
pub fn from_parts_millis(year: i64, month: i64, day: i64, hour: i64) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )?;
    let dt = date.and_hms_opt(u32::try_from(hour).ok()?, 0, 0)?;
    Some(dt.and_utc().timestamp_millis())
}

//! Time window filtering and wall-clock conversion.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::error::ConfigError;
use crate::value::DATETIME_FORMAT;

fn ymd_hms(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Substituted for event timestamps that cannot be converted.
pub fn sentinel_timestamp() -> NaiveDateTime {
    ymd_hms(1980, 1, 1)
}

/// Window start used when the operator gives none.
pub fn default_start_time() -> NaiveDateTime {
    ymd_hms(1998, 1, 1)
}

/// Window stop used when the operator gives none.
pub fn default_stop_time() -> NaiveDateTime {
    ymd_hms(2999, 1, 1)
}

/// `start <= ts <= stop`.
pub fn in_window(ts: NaiveDateTime, start: NaiveDateTime, stop: NaiveDateTime) -> bool {
    ts >= start && ts <= stop
}

/// Parse an operator-supplied window bound.
///
/// Unset or blank input yields `default`; anything else must match
/// `YYYY-MM-DD HH:MM:SS`.
pub fn parse_window_time(
    field: &'static str,
    value: Option<&str>,
    default: NaiveDateTime,
) -> Result<NaiveDateTime, ConfigError> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(s) => NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).map_err(|_| {
            ConfigError::InvalidTime {
                field,
                value: s.to_string(),
            }
        }),
    }
}

/// Inclusive `[start, stop]` wall-clock window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, stop: NaiveDateTime) -> Self {
        Self { start, stop }
    }

    /// Build from operator strings, failing fast on malformed input.
    pub fn parse(start: Option<&str>, stop: Option<&str>) -> Result<Self, ConfigError> {
        Ok(Self {
            start: parse_window_time("start time", start, default_start_time())?,
            stop: parse_window_time("stop time", stop, default_stop_time())?,
        })
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        in_window(ts, self.start, self.stop)
    }

    /// True once `ts` lies after the stop bound.
    pub fn is_past(&self, ts: NaiveDateTime) -> bool {
        ts > self.stop
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::new(default_start_time(), default_stop_time())
    }
}

/// Timezone used to turn epoch seconds into wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    /// The host's local timezone.
    #[default]
    Local,
    Named(Tz),
}

impl Zone {
    /// Convert epoch seconds to a naive wall-clock time in this zone.
    ///
    /// Returns `None` when the instant is outside chrono's range.
    pub fn wall_clock(&self, secs: i64, nanos: u32) -> Option<NaiveDateTime> {
        match self {
            Zone::Local => Local
                .timestamp_opt(secs, nanos)
                .single()
                .map(|dt| dt.naive_local()),
            Zone::Named(tz) => tz
                .timestamp_opt(secs, nanos)
                .single()
                .map(|dt| dt.naive_local()),
        }
    }
}

impl FromStr for Zone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("local") {
            return Ok(Zone::Local);
        }
        Tz::from_str(s)
            .map(Zone::Named)
            .map_err(|_| ConfigError::InvalidTimezone(s.to_string()))
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Local => write!(f, "local"),
            Zone::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

//! Rounding rules turning an epoch-millis timestamp into its bucket key.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};

use crate::error::{Error, Result};

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Deterministic mapping from a timestamp to the start of its bucket.
pub trait Rounding {
    fn round(&self, timestamp: i64) -> i64;
}

impl<F: Fn(i64) -> i64> Rounding for F {
    #[inline]
    fn round(&self, timestamp: i64) -> i64 {
        self(timestamp)
    }
}

/// Width of a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    /// ISO week, starting on Monday
    Week,
    Month,
    Quarter,
    Year,
    /// Fixed interval in milliseconds
    Interval(NonZeroU64),
}

impl TimeUnit {
    /// Fixed width in milliseconds, `None` for calendar units of varying length
    fn fixed_millis(self) -> Option<i64> {
        match self {
            TimeUnit::Second => Some(SECOND_MS),
            TimeUnit::Minute => Some(MINUTE_MS),
            TimeUnit::Hour => Some(HOUR_MS),
            TimeUnit::Day => Some(DAY_MS),
            TimeUnit::Interval(ms) => Some(i64::try_from(ms.get()).unwrap_or(i64::MAX)),
            TimeUnit::Week | TimeUnit::Month | TimeUnit::Quarter | TimeUnit::Year => None,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    /// Accepts unit names (`day`), single-unit shorthands (`1d`, `1M`) and
    /// fixed intervals (`90s`, `15m`, `12h`, `2d`).
    fn from_str(s: &str) -> Result<Self> {
        let unit = match s {
            "second" | "1s" => TimeUnit::Second,
            "minute" | "1m" => TimeUnit::Minute,
            "hour" | "1h" => TimeUnit::Hour,
            "day" | "1d" => TimeUnit::Day,
            "week" | "1w" => TimeUnit::Week,
            "month" | "1M" => TimeUnit::Month,
            "quarter" | "1q" => TimeUnit::Quarter,
            "year" | "1y" => TimeUnit::Year,
            _ => return parse_interval(s),
        };
        Ok(unit)
    }
}

fn parse_interval(s: &str) -> Result<TimeUnit> {
    let invalid = || Error::config(format!("unknown time unit '{s}'"));
    let split = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
    let (amount, suffix) = s.split_at(split);
    let amount: u64 = amount.parse().map_err(|_| invalid())?;
    let unit_ms: u64 = match suffix {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 604_800_000,
        _ => return Err(invalid()),
    };
    amount
        .checked_mul(unit_ms)
        .and_then(NonZeroU64::new)
        .map(TimeUnit::Interval)
        .ok_or_else(|| Error::config(format!("time interval '{s}' must be positive and fit in 64 bits")))
}

/// Rounds down to the start of the enclosing `unit` in a fixed-offset time zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeZoneRounding {
    unit: TimeUnit,
    offset: FixedOffset,
}

impl TimeZoneRounding {
    pub fn new(unit: TimeUnit, offset: FixedOffset) -> Self {
        Self { unit, offset }
    }

    /// Rounding in UTC
    pub fn utc(unit: TimeUnit) -> Self {
        Self::new(unit, Utc.fix())
    }

    /// Parse a unit (`"day"`, `"15m"`) and an offset (`"+02:00"`)
    pub fn parse(unit: &str, offset: &str) -> Result<Self> {
        let offset = offset
            .parse::<FixedOffset>()
            .map_err(|e| Error::config(format!("invalid time zone offset '{offset}': {e}")))?;
        Ok(Self::new(unit.parse()?, offset))
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn offset_millis(&self) -> i64 {
        i64::from(self.offset.local_minus_utc()) * SECOND_MS
    }

    /// Round a local timestamp; `None` when it leaves the representable range
    fn round_local(&self, local: i64) -> Option<i64> {
        if let Some(width) = self.unit.fixed_millis() {
            return local.checked_sub(local.rem_euclid(width));
        }
        if self.unit == TimeUnit::Week {
            // 1970-01-01 was a Thursday, three days after the ISO week start
            let days = local.div_euclid(DAY_MS);
            let monday = days - (days + 3).rem_euclid(7);
            return monday.checked_mul(DAY_MS);
        }

        let date = DateTime::from_timestamp_millis(local)?.date_naive();
        let month0 = match self.unit {
            TimeUnit::Month => date.month0(),
            TimeUnit::Quarter => date.month0() / 3 * 3,
            _ => 0,
        };
        let start = NaiveDate::from_ymd_opt(date.year(), month0 + 1, 1)?.and_hms_opt(0, 0, 0)?;
        Some(start.and_utc().timestamp_millis())
    }
}

impl Rounding for TimeZoneRounding {
    /// Out-of-range timestamps are returned unchanged.
    fn round(&self, timestamp: i64) -> i64 {
        let offset = self.offset_millis();
        timestamp
            .checked_add(offset)
            .and_then(|local| self.round_local(local))
            .and_then(|rounded| rounded.checked_sub(offset))
            .unwrap_or(timestamp)
    }
}

impl fmt::Display for TimeZoneRounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.unit, self.offset)
    }
}

//! Calendar time with nanosecond ticks since 2000-01-01T00:00:00.
//!
//! All civil calendar math goes through a Julian Day Number. Two reserved tick
//! values stand for "unknown" and bypass the calendar entirely:
//!
//! | ticks       | text      |
//! |-------------|-----------|
//! | `i64::MAX`  | `Unknown` |
//! | `i64::MIN`  | `unknowN` |
//!
//! Valid civil years are 1709 through 2291.

use std::fmt;
use std::ops::{Add, Sub};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use nom::{
    IResult,
    character::complete::{char, digit1, one_of},
    combinator::{map_res, opt, recognize, verify},
    sequence::{pair, preceded},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{BindError, BindResult};

pub const NANOS_PER_MICRO: i64 = 1_000;
pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
pub const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
pub const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;

/// Julian date of 2000-01-01T00:00:00.
const EPOCH_JD: f64 = 2_451_544.5;
/// Julian date offset used by the month lookup algorithm (0000-03-01).
const MARCH_ZERO_JD: f64 = 1_721_118.5;
/// Seconds between 1970-01-01 and 2000-01-01 (UTC).
const UNIX_OFFSET_SECS: i64 = 946_684_800;
/// .NET ticks (100ns since 0001-01-01) at 2000-01-01.
const NET_TICKS_AT_EPOCH: i64 = 630_822_816_000_000_000;

const MIN_YEAR: i32 = 1708;
const MAX_YEAR: i32 = 2292;

const UNKNOWN_MAX: &str = "Unknown";
const UNKNOWN_MIN: &str = "unknowN";

/// (153 * month - 457) / 5 for months 3..=14, indexed by month.
const MONTH_OFFSETS: [i32; 15] = [
    -91, -60, -30, 0, 31, 61, 92, 122, 153, 184, 214, 245, 275, 306, 337,
];

const DAYS_IN_MONTH: [u32; 13] = [0, 31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Days in `month` of `year`, or 0 when `month` is not in 1..=12.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS_IN_MONTH.get(month as usize).copied().unwrap_or(0)
    }
}

/// Julian date of a civil instant (time of day folded into the fraction).
/// `fields` must already be validated.
pub(crate) fn julian_day(fields: &CivilFields) -> f64 {
    let day_micros = (((fields.hour as i64 * 60 + fields.minute as i64) * 60
        + fields.second as i64)
        * 1000
        + fields.millisecond as i64)
        * 1000
        + fields.microsecond as i64;
    let day = fields.day as f64 + day_micros as f64 / 86_400_000_000.0;

    let (mut year, mut month) = (fields.year, fields.month as usize);
    if month < 3 {
        month += 12;
        year -= 1;
    }
    let y = year as f64;
    day + MONTH_OFFSETS[month] as f64 + 365.0 * y + (y / 4.0).floor() - (y / 100.0).floor()
        + (y / 400.0).floor()
        + MARCH_ZERO_JD
}

/// Civil calendar fields of an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CivilFields {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millisecond: u32,
    pub microsecond: u32,
    pub nanosecond: u32,
}

impl CivilFields {
    /// Midnight of the given date.
    pub fn date(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month,
            day,
            ..Self::default()
        }
    }

    pub fn time(mut self, hour: u32, minute: u32, second: u32) -> Self {
        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self
    }

    pub fn subsec(mut self, millisecond: u32, microsecond: u32, nanosecond: u32) -> Self {
        self.millisecond = millisecond;
        self.microsecond = microsecond;
        self.nanosecond = nanosecond;
        self
    }

    fn validate(&self) -> BindResult<()> {
        if self.year <= MIN_YEAR || self.year >= MAX_YEAR {
            return Err(out_of_range("year", self.year as i64));
        }
        if !(1..=12).contains(&self.month) {
            return Err(out_of_range("month", self.month as i64));
        }
        if self.day < 1 || self.day > days_in_month(self.year, self.month) {
            return Err(out_of_range("day", self.day as i64));
        }
        let limits = [
            ("hour", self.hour, 24),
            ("minute", self.minute, 60),
            ("second", self.second, 60),
            ("millisecond", self.millisecond, 1000),
            ("microsecond", self.microsecond, 1000),
            ("nanosecond", self.nanosecond, 1000),
        ];
        for (field, value, limit) in limits {
            if value >= limit {
                return Err(out_of_range(field, value as i64));
            }
        }
        Ok(())
    }
}

fn out_of_range(field: &'static str, value: i64) -> BindError {
    BindError::CivilRange { field, value }
}

/// Decomposed instant together with its derived calendar positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Civil {
    pub fields: CivilFields,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u32,
    /// 1-based day of the year.
    pub day_of_year: u32,
}

impl Civil {
    pub fn weekday(&self) -> chrono::Weekday {
        use chrono::Weekday::*;
        [Sun, Mon, Tue, Wed, Thu, Fri, Sat][self.day_of_week as usize]
    }
}

/// An instant with nanosecond precision relative to 2000-01-01T00:00:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CalendarTime {
    ticks: i64,
}

impl CalendarTime {
    /// "Unknown", the upper sentinel.
    pub const MAX: CalendarTime = CalendarTime { ticks: i64::MAX };
    /// "unknowN", the lower sentinel.
    pub const MIN: CalendarTime = CalendarTime { ticks: i64::MIN };
    pub const EPOCH: CalendarTime = CalendarTime { ticks: 0 };
    pub const YEAR_1900: CalendarTime = CalendarTime {
        ticks: -36_524 * NANOS_PER_DAY,
    };
    pub const YEAR_1958: CalendarTime = CalendarTime {
        ticks: -15_340 * NANOS_PER_DAY,
    };
    pub const YEAR_1970: CalendarTime = CalendarTime {
        ticks: -UNIX_OFFSET_SECS * NANOS_PER_SECOND,
    };

    pub const fn from_ticks(ticks: i64) -> Self {
        Self { ticks }
    }

    pub const fn ticks(&self) -> i64 {
        self.ticks
    }

    pub fn is_unknown(&self) -> bool {
        self.ticks == i64::MAX || self.ticks == i64::MIN
    }

    /// Build an instant from civil fields.
    ///
    /// Fails with a range error for years outside 1709..=2291 or any field
    /// outside its calendar range.
    pub fn from_civil(fields: CivilFields) -> BindResult<Self> {
        fields.validate()?;
        let days = (julian_day(&CivilFields::date(fields.year, fields.month, fields.day))
            - EPOCH_JD) as i64;
        let ticks = days * NANOS_PER_DAY
            + fields.hour as i64 * NANOS_PER_HOUR
            + fields.minute as i64 * NANOS_PER_MINUTE
            + fields.second as i64 * NANOS_PER_SECOND
            + fields.millisecond as i64 * NANOS_PER_MILLI
            + fields.microsecond as i64 * NANOS_PER_MICRO
            + fields.nanosecond as i64;
        Ok(Self { ticks })
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> BindResult<Self> {
        Self::from_civil(CivilFields::date(year, month, day))
    }

    pub fn from_ymd_hms(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> BindResult<Self> {
        Self::from_civil(CivilFields::date(year, month, day).time(hour, minute, second))
    }

    /// Julian date of the start of this instant's day.
    pub fn julian_date(&self) -> f64 {
        self.ticks.div_euclid(NANOS_PER_DAY) as f64 + EPOCH_JD
    }

    /// Decompose into civil fields.
    pub fn to_civil(&self) -> Civil {
        let jd = self.julian_date();

        let z = (jd - MARCH_ZERO_JD).floor();
        let r = jd - MARCH_ZERO_JD - z;
        let g = z - 0.25;
        let a = (g / 36_524.25).floor();
        let b = a - (a / 4.0).floor();
        let mut year = ((b + g) / 365.25).floor() as i32;
        let c = b + z - (365.25 * year as f64).floor();
        let mut month = ((5.0 * c + 456.0) / 153.0).floor() as u32;
        let mut day = (c - ((153.0 * month as f64 - 457.0) / 5.0).floor() + r) as u32;
        if month > 12 {
            year += 1;
            month -= 12;
        }
        if day > days_in_month(year, month) {
            day -= days_in_month(year, month);
            month += 1;
            if month > 12 {
                year += 1;
                month -= 12;
            }
        }

        let day_of_year = (1..month).map(|m| days_in_month(year, m)).sum::<u32>() + day;
        let day_of_week = ((jd + 1.5).floor() as i64).rem_euclid(7) as u32;

        let rem = self.ticks.rem_euclid(NANOS_PER_DAY);
        let fields = CivilFields {
            year,
            month,
            day,
            hour: (rem / NANOS_PER_HOUR) as u32,
            minute: (rem % NANOS_PER_HOUR / NANOS_PER_MINUTE) as u32,
            second: (rem % NANOS_PER_MINUTE / NANOS_PER_SECOND) as u32,
            millisecond: (rem % NANOS_PER_SECOND / NANOS_PER_MILLI) as u32,
            microsecond: (rem % NANOS_PER_MILLI / NANOS_PER_MICRO) as u32,
            nanosecond: (rem % NANOS_PER_MICRO) as u32,
        };

        Civil {
            fields,
            day_of_week,
            day_of_year,
        }
    }

    /// Parse `YYYY-MM-DDTHH:MM:SS.fff` or one of the sentinel literals.
    ///
    /// Trailing fields may be omitted and default to zero; a zero month or
    /// day is read as 1. A space is accepted in place of `T`.
    pub fn parse(input: &str) -> BindResult<Self> {
        match input {
            UNKNOWN_MAX => return Ok(Self::MAX),
            UNKNOWN_MIN => return Ok(Self::MIN),
            _ => {}
        }

        let text = input.trim();
        let (rest, scan) = scan_timestamp(text)
            .map_err(|_| BindError::parse(0, format!("not a timestamp: '{}'", input)))?;
        if !rest.is_empty() {
            return Err(BindError::parse(
                text.len() - rest.len(),
                format!("unexpected trailing content: '{}'", rest),
            ));
        }

        let month = if scan.month == 0 { 1 } else { scan.month };
        let day = if scan.day == 0 { 1 } else { scan.day };
        if !(1700..=2300).contains(&scan.year) || !(1..=12).contains(&month) || !(1..=31).contains(&day)
        {
            return Err(BindError::parse(0, format!("date out of range: '{}'", input)));
        }

        let mut fields = CivilFields::date(scan.year as i32, month as u32, day as u32);
        for (slot, value) in [
            (&mut fields.hour, scan.hour),
            (&mut fields.minute, scan.minute),
            (&mut fields.second, scan.second),
        ] {
            *slot = u32::try_from(value)
                .map_err(|_| BindError::parse(0, format!("negative time field in '{}'", input)))?;
        }
        let nanos = scan.fraction_nanos;
        fields = fields.subsec(
            nanos / 1_000_000,
            nanos / 1_000 % 1_000,
            nanos % 1_000,
        );

        Self::from_civil(fields).map_err(|e| BindError::parse(0, e.to_string()))
    }

    pub fn add_days(self, days: f64) -> Self {
        self.add_hours(days * 24.0)
    }

    pub fn add_hours(self, hours: f64) -> Self {
        self.add_minutes(hours * 60.0)
    }

    pub fn add_minutes(self, minutes: f64) -> Self {
        self.add_nanoseconds((minutes * NANOS_PER_MINUTE as f64) as i64)
    }

    pub fn add_seconds(self, seconds: f64) -> Self {
        self.add_nanoseconds((seconds * NANOS_PER_SECOND as f64) as i64)
    }

    pub fn add_milliseconds(self, millis: f64) -> Self {
        self.add_nanoseconds((millis * NANOS_PER_MILLI as f64) as i64)
    }

    pub fn add_microseconds(self, micros: f64) -> Self {
        self.add_nanoseconds((micros * NANOS_PER_MICRO as f64) as i64)
    }

    pub fn add_nanoseconds(self, nanos: i64) -> Self {
        Self {
            ticks: self.ticks.saturating_add(nanos),
        }
    }

    /// Nanoseconds from `other` to `self`.
    pub fn nanos_since(&self, other: CalendarTime) -> i64 {
        self.ticks.saturating_sub(other.ticks)
    }

    /// Midnight of the same day.
    pub fn date(&self) -> Self {
        Self {
            ticks: self.ticks - self.ticks.rem_euclid(NANOS_PER_DAY),
        }
    }

    /// Seconds since the Unix epoch.
    pub fn unix_time(&self) -> i64 {
        self.ticks.div_euclid(NANOS_PER_SECOND) + UNIX_OFFSET_SECS
    }

    pub fn from_unix(secs: i64) -> Self {
        Self {
            ticks: (secs - UNIX_OFFSET_SECS).saturating_mul(NANOS_PER_SECOND),
        }
    }

    /// 100ns ticks since 0001-01-01, as used by .NET `DateTime`.
    pub fn net_ticks(&self) -> i64 {
        self.ticks.div_euclid(100) + NET_TICKS_AT_EPOCH
    }

    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Last modification time of a file.
    pub fn file_write_time(path: impl AsRef<Path>) -> BindResult<Self> {
        let modified = std::fs::metadata(path)?.modified()?;
        Ok(Self::from_utc(DateTime::<Utc>::from(modified)))
    }

    fn from_utc(at: DateTime<Utc>) -> Self {
        Self::from_unix(at.timestamp()).add_nanoseconds(at.timestamp_subsec_nanos() as i64)
    }

    /// Convert to a chrono timestamp; `None` for the sentinels.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        if self.is_unknown() {
            return None;
        }
        let f = self.to_civil().fields;
        let nanos = f.millisecond * 1_000_000 + f.microsecond * 1_000 + f.nanosecond;
        NaiveDate::from_ymd_opt(f.year, f.month, f.day)?.and_hms_nano_opt(
            f.hour, f.minute, f.second, nanos,
        )
    }
}

impl TryFrom<NaiveDateTime> for CalendarTime {
    type Error = BindError;

    fn try_from(value: NaiveDateTime) -> Result<Self, Self::Error> {
        let nanos = value.nanosecond() % 1_000_000_000;
        CalendarTime::from_civil(
            CivilFields::date(value.year(), value.month(), value.day())
                .time(value.hour(), value.minute(), value.second())
                .subsec(nanos / 1_000_000, nanos / 1_000 % 1_000, nanos % 1_000),
        )
    }
}

impl fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ticks {
            i64::MAX => return f.write_str(UNKNOWN_MAX),
            i64::MIN => return f.write_str(UNKNOWN_MIN),
            _ => {}
        }
        let c = self.to_civil().fields;
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
            c.year, c.month, c.day, c.hour, c.minute, c.second, c.millisecond
        )
    }
}

impl FromStr for CalendarTime {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CalendarTime::parse(s)
    }
}

impl Serialize for CalendarTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl Add<TimeDelta> for CalendarTime {
    type Output = CalendarTime;

    fn add(self, rhs: TimeDelta) -> CalendarTime {
        self.add_nanoseconds(rhs.num_nanoseconds().unwrap_or(i64::MAX))
    }
}

impl Sub<TimeDelta> for CalendarTime {
    type Output = CalendarTime;

    fn sub(self, rhs: TimeDelta) -> CalendarTime {
        self.add_nanoseconds(rhs.num_nanoseconds().map_or(i64::MIN, |n| n.saturating_neg()))
    }
}

impl Sub for CalendarTime {
    type Output = TimeDelta;

    fn sub(self, rhs: CalendarTime) -> TimeDelta {
        TimeDelta::nanoseconds(self.nanos_since(rhs))
    }
}

/// Raw fields of a positional timestamp scan.
#[derive(Debug, Default)]
struct Scan {
    year: i64,
    month: i64,
    day: i64,
    hour: i64,
    minute: i64,
    second: i64,
    fraction_nanos: u32,
}

fn number(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| s.parse::<i64>())(input)
}

/// Decimal fraction of a second, scaled to nanoseconds.
fn fraction(input: &str) -> IResult<&str, u32> {
    map_res(verify(digit1, |d: &str| d.len() <= 9), |digits: &str| {
        let scale = 10u32.pow(9 - digits.len() as u32);
        digits.parse::<u32>().map(|n| n * scale)
    })(input)
}

/// Scan `Y[-M[-D[(T| )h[:m[:s[.f]]]]]]`, stopping at the first missing field.
fn scan_timestamp(input: &str) -> IResult<&str, Scan> {
    let mut scan = Scan::default();
    let (input, year) = number(input)?;
    scan.year = year;

    let (input, month) = opt(preceded(char('-'), number))(input)?;
    let Some(month) = month else {
        return Ok((input, scan));
    };
    scan.month = month;

    let (input, day) = opt(preceded(char('-'), number))(input)?;
    let Some(day) = day else {
        return Ok((input, scan));
    };
    scan.day = day;

    let (input, hour) = opt(preceded(one_of("T "), number))(input)?;
    let Some(hour) = hour else {
        return Ok((input, scan));
    };
    scan.hour = hour;

    let (input, minute) = opt(preceded(char(':'), number))(input)?;
    let Some(minute) = minute else {
        return Ok((input, scan));
    };
    scan.minute = minute;

    let (input, second) = opt(preceded(char(':'), number))(input)?;
    let Some(second) = second else {
        return Ok((input, scan));
    };
    scan.second = second;

    let (input, nanos) = opt(preceded(char('.'), fraction))(input)?;
    scan.fraction_nanos = nanos.unwrap_or(0);
    Ok((input, scan))
}

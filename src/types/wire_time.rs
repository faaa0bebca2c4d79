//! Fixed temporal struct exchanged with the driver for date/time slots.
//!
//! Layout (little-endian, 40 bytes):
//!
//! ```text
//! 0  year        u32
//! 4  month       u32
//! 8  day         u32
//! 12 hour        u32
//! 16 minute      u32
//! 20 second      u32
//! 24 second_part u64   microseconds
//! 32 neg         u8    (+3 padding)
//! 36 time_type   i32
//! ```

use super::temporal::{CalendarTime, CivilFields};
use crate::error::BindResult;

pub const WIRE_TIME_LEN: usize = 40;

/// Which parts of a [`WireTime`] carry meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum TimestampKind {
    None = -2,
    Error = -1,
    Date = 0,
    #[default]
    DateTime = 1,
    Time = 2,
}

impl TimestampKind {
    fn from_code(code: i32) -> Self {
        match code {
            -2 => TimestampKind::None,
            0 => TimestampKind::Date,
            1 => TimestampKind::DateTime,
            2 => TimestampKind::Time,
            _ => TimestampKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireTime {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// Microseconds.
    pub second_part: u64,
    pub neg: bool,
    pub kind: TimestampKind,
}

impl WireTime {
    /// Expand a calendar value. Sub-microsecond precision is dropped.
    /// Unknown sentinels have no civil form; callers reject them first.
    pub fn from_calendar(time: &CalendarTime) -> Self {
        let f = time.to_civil().fields;
        Self {
            year: f.year as u32,
            month: f.month,
            day: f.day,
            hour: f.hour,
            minute: f.minute,
            second: f.second,
            second_part: f.millisecond as u64 * 1000 + f.microsecond as u64,
            neg: false,
            kind: TimestampKind::DateTime,
        }
    }

    /// Rebuild the calendar value, splitting `second_part` into ms and us.
    pub fn to_calendar(&self) -> BindResult<CalendarTime> {
        let millis = (self.second_part / 1000) as u32;
        let micros = (self.second_part % 1000) as u32;
        CalendarTime::from_civil(
            CivilFields::date(self.year as i32, self.month, self.day)
                .time(self.hour, self.minute, self.second)
                .subsec(millis, micros, 0),
        )
    }

    pub fn to_bytes(&self) -> [u8; WIRE_TIME_LEN] {
        let mut out = [0u8; WIRE_TIME_LEN];
        let words = [
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ];
        for (i, word) in words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        out[24..32].copy_from_slice(&self.second_part.to_le_bytes());
        out[32] = self.neg as u8;
        out[36..40].copy_from_slice(&(self.kind as i32).to_le_bytes());
        out
    }

    /// Decode from a slot buffer; `None` when shorter than the struct.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; WIRE_TIME_LEN] = bytes.get(..WIRE_TIME_LEN)?.try_into().ok()?;
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let mut second_part = [0u8; 8];
        second_part.copy_from_slice(&bytes[24..32]);
        Some(Self {
            year: word(0),
            month: word(4),
            day: word(8),
            hour: word(12),
            minute: word(16),
            second: word(20),
            second_part: u64::from_le_bytes(second_part),
            neg: bytes[32] != 0,
            kind: TimestampKind::from_code(word(36) as i32),
        })
    }
}

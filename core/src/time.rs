//! Wall-clock timestamps with an explicit UTC offset
//!
//! Civil date conversion uses Howard Hinnant's `civil_from_days`
//! algorithm (O(1), proleptic Gregorian calendar).
//! Reference: http://howardhinnant.github.io/date_algorithms.html

use core::fmt;

const SECONDS_PER_DAY: i64 = 86_400;

/// Point in time as seen by a clock with a fixed UTC offset
///
/// Timestamps are never "naive": the offset is always known, even if it is
/// zero because the board has no timezone configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Seconds since 1970-01-01T00:00:00Z
    pub unix_secs: i64,
    /// Offset of local time from UTC
    pub utc_offset_secs: i32,
}

/// Broken-down local date and time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilDateTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    pub const fn new(unix_secs: i64, utc_offset_secs: i32) -> Self {
        Self {
            unix_secs,
            utc_offset_secs,
        }
    }

    /// Timestamp in UTC
    pub const fn utc(unix_secs: i64) -> Self {
        Self::new(unix_secs, 0)
    }

    /// Local date and time, i.e. with the UTC offset applied
    pub fn local(&self) -> CivilDateTime {
        let local_secs = self.unix_secs + self.utc_offset_secs as i64;
        let days = local_secs.div_euclid(SECONDS_PER_DAY);
        let secs_today = local_secs.rem_euclid(SECONDS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        CivilDateTime {
            year,
            month,
            day,
            hour: (secs_today / 3600) as u8,
            minute: ((secs_today % 3600) / 60) as u8,
            second: (secs_today % 60) as u8,
        }
    }
}

/// Formats as `%Y-%m-%dT%H:%M:%S%z`, e.g. `2020-12-07T10:00:00+0100`
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dt = self.local();
        let sign = if self.utc_offset_secs < 0 { '-' } else { '+' };
        let offset_minutes = self.utc_offset_secs.unsigned_abs() / 60;
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}{:02}{:02}",
            dt.year,
            dt.month,
            dt.day,
            dt.hour,
            dt.minute,
            dt.second,
            sign,
            offset_minutes / 60,
            offset_minutes % 60
        )
    }
}

/// Convert days since the Unix epoch to a civil date (year, month, day)
fn civil_from_days(days_since_epoch: i64) -> (i32, u8, u8) {
    // Shift the epoch to 0000-03-01 so the leap day is the last day of a year
    let z = days_since_epoch + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32; // [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365; // [0, 399]
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11], March = 0
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let year = if m <= 2 { y + 1 } else { y };
    (year as i32, m, d)
}

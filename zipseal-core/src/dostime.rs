//! MS-DOS date/time packing for ZIP headers.
//!
//! ZIP headers store modification times as two little-endian u16 fields with
//! 2-second granularity and a 1980 epoch. Times before 1980 clamp to the
//! epoch; times after 2107 clamp to the format's maximum.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds from the Unix epoch to 1980-01-01T00:00:00 (the DOS epoch).
const DOS_EPOCH_UNIX: u64 = 315_532_800;

/// The DOS epoch packed as (date, time): 1980-01-01 00:00:00.
pub const DOS_EPOCH: (u16, u16) = (0x0021, 0x0000);

fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u64, month: u64) -> u64 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        _ => 28,
    }
}

/// Pack a [`SystemTime`] into DOS `(date, time)` header fields.
///
/// Sub-2-second precision is truncated. Out-of-range times clamp to the
/// DOS-representable range (1980..=2107).
pub fn system_time_to_dos(time: SystemTime) -> (u16, u16) {
    let unix_secs = match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs(),
        Err(_) => return DOS_EPOCH,
    };
    if unix_secs < DOS_EPOCH_UNIX {
        return DOS_EPOCH;
    }

    let mut remaining = unix_secs - DOS_EPOCH_UNIX;
    let mut year = 1980u64;
    loop {
        let year_secs = if is_leap_year(year) { 366 } else { 365 } * 86_400;
        if remaining < year_secs {
            break;
        }
        if year == 2107 {
            // 2107-12-31 23:59:58 is the last representable instant.
            return (0xFF9F, 0xBF7D);
        }
        remaining -= year_secs;
        year += 1;
    }

    let mut month = 1u64;
    loop {
        let month_secs = days_in_month(year, month) * 86_400;
        if remaining < month_secs {
            break;
        }
        remaining -= month_secs;
        month += 1;
    }

    let day = remaining / 86_400 + 1;
    remaining %= 86_400;
    let hour = remaining / 3600;
    let minute = (remaining % 3600) / 60;
    let second = remaining % 60;

    let date = (((year - 1980) << 9) | (month << 5) | day) as u16;
    let time = ((hour << 11) | (minute << 5) | (second / 2)) as u16;
    (date, time)
}

/// Unpack DOS `(date, time)` header fields into a [`SystemTime`].
///
/// Fields with out-of-range components (month 0, day 0, etc.) are clamped
/// into range rather than rejected; header timestamps are advisory.
pub fn dos_to_system_time(date: u16, time: u16) -> SystemTime {
    let year = 1980 + ((date >> 9) & 0x7F) as u64;
    let month = (((date >> 5) & 0x0F) as u64).clamp(1, 12);
    let day = ((date & 0x1F) as u64)
        .clamp(1, days_in_month(year, month));
    let hour = (((time >> 11) & 0x1F) as u64).min(23);
    let minute = (((time >> 5) & 0x3F) as u64).min(59);
    let second = (((time & 0x1F) as u64) * 2).min(58);

    let mut days = 0u64;
    for y in 1980..year {
        days += if is_leap_year(y) { 366 } else { 365 };
    }
    for m in 1..month {
        days += days_in_month(year, m);
    }
    days += day - 1;

    let secs = DOS_EPOCH_UNIX + days * 86_400 + hour * 3600 + minute * 60 + second;
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dos_epoch_round_trip() {
        let t = dos_to_system_time(DOS_EPOCH.0, DOS_EPOCH.1);
        assert_eq!(system_time_to_dos(t), DOS_EPOCH);
    }

    #[test]
    fn test_known_timestamp() {
        // 2024-06-15 12:30:44 UTC
        let t = UNIX_EPOCH + Duration::from_secs(1_718_454_644);
        let (date, time) = system_time_to_dos(t);
        assert_eq!((date >> 9) + 1980, 2024);
        assert_eq!((date >> 5) & 0x0F, 6);
        assert_eq!(date & 0x1F, 15);
        assert_eq!((time >> 11) & 0x1F, 12);
        assert_eq!((time >> 5) & 0x3F, 30);
        assert_eq!((time & 0x1F) * 2, 44);
    }

    #[test]
    fn test_round_trip_two_second_granularity() {
        let t = UNIX_EPOCH + Duration::from_secs(1_718_454_645); // odd second
        let (date, time) = system_time_to_dos(t);
        let back = dos_to_system_time(date, time);
        // Truncated to the even second below.
        assert_eq!(back, UNIX_EPOCH + Duration::from_secs(1_718_454_644));
    }

    #[test]
    fn test_pre_1980_clamps_to_epoch() {
        let t = UNIX_EPOCH + Duration::from_secs(1000);
        assert_eq!(system_time_to_dos(t), DOS_EPOCH);
    }

    #[test]
    fn test_leap_day() {
        // 2024-02-29 00:00:00 UTC
        let t = UNIX_EPOCH + Duration::from_secs(1_709_164_800);
        let (date, _time) = system_time_to_dos(t);
        assert_eq!((date >> 5) & 0x0F, 2);
        assert_eq!(date & 0x1F, 29);
    }
}

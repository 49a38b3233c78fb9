//! Wall-clock access and timestamp formatting.
//!
//! The time source itself (SNTP on the device, the OS clock in the
//! simulator) is a black box behind [`WallClock`]: either the UTC epoch
//! second is known or it is not. Every formatting function must accept the
//! unknown case without error; the durable log uses the epoch-zero sentinel
//! `1970-01-01T00:00:00Z` until a first sync succeeds.

use core::fmt::Write as _;

use heapless::String;

/// Query-only view of the synchronized wall clock.
pub trait WallClock {
    /// Current UTC epoch second, or `None` before the first sync.
    fn utc_epoch_if_known(&self) -> Option<u32>;
}

/// Broken-down UTC date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

/// Convert a day count since 1970-01-01 to a civil date.
///
/// Euclidean-affine algorithm over 400-year eras; exact for the entire
/// u32 epoch range.
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097; // [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { year + 1 } else { year } as i32;
    (year, month, day)
}

impl CivilDateTime {
    pub fn from_epoch(epoch: i64) -> Self {
        let epoch = epoch.max(0);
        let days = epoch.div_euclid(86_400);
        let secs = epoch.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        Self {
            year,
            month,
            day,
            hour: (secs / 3600) as u32,
            minute: (secs / 60 % 60) as u32,
            second: (secs % 60) as u32,
        }
    }
}

/// ISO-8601 UTC timestamp for the durable log, `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Falls back to the epoch-zero sentinel while time is unsynchronized.
pub fn format_utc_timestamp(epoch: Option<u32>) -> String<20> {
    let t = CivilDateTime::from_epoch(i64::from(epoch.unwrap_or(0)));
    let mut s = String::new();
    let _ = write!(
        s,
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        t.year, t.month, t.day, t.hour, t.minute, t.second
    );
    s
}

/// Dashboard datetime string, `MM/DD/YYYY H:MM:SS AM|PM` in local time.
pub fn format_local_datetime(epoch: Option<u32>, offset_secs: i32) -> String<24> {
    let mut s = String::new();
    let Some(epoch) = epoch else {
        let _ = s.push_str("Time not synced");
        return s;
    };
    let local = i64::from(epoch) + i64::from(offset_secs);
    let t = CivilDateTime::from_epoch(local);
    let (hour12, ampm) = match t.hour {
        0 => (12, "AM"),
        h if h < 12 => (h, "AM"),
        12 => (12, "PM"),
        h => (h - 12, "PM"),
    };
    let _ = write!(
        s,
        "{:02}/{:02}/{:04} {}:{:02}:{:02} {}",
        t.month, t.day, t.year, hour12, t.minute, t.second, ampm
    );
    s
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::WallClock;

    /// Clock stub returning a fixed answer.
    pub(crate) struct FixedClock(pub Option<u32>);

    impl WallClock for FixedClock {
        fn utc_epoch_if_known(&self) -> Option<u32> {
            self.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn civil_conversion_known_epochs() {
        let t = CivilDateTime::from_epoch(0);
        assert_eq!((t.year, t.month, t.day), (1970, 1, 1));
        assert_eq!((t.hour, t.minute, t.second), (0, 0, 0));

        let t = CivilDateTime::from_epoch(946_684_800);
        assert_eq!((t.year, t.month, t.day), (2000, 1, 1));

        // Leap day.
        let t = CivilDateTime::from_epoch(1_709_164_800);
        assert_eq!((t.year, t.month, t.day), (2024, 2, 29));

        let t = CivilDateTime::from_epoch(1_700_000_000);
        assert_eq!((t.year, t.month, t.day), (2023, 11, 14));
        assert_eq!((t.hour, t.minute, t.second), (22, 13, 20));
    }

    #[test]
    fn utc_timestamp_uses_sentinel_when_unsynced() {
        assert_eq!(format_utc_timestamp(None).as_str(), "1970-01-01T00:00:00Z");
        assert_eq!(
            format_utc_timestamp(Some(1_700_000_000)).as_str(),
            "2023-11-14T22:13:20Z"
        );
    }

    #[test]
    fn local_datetime_applies_offset_and_12h_clock() {
        // 22:13:20 UTC minus 4 h is 6:13:20 PM the same day.
        assert_eq!(
            format_local_datetime(Some(1_700_000_000), -4 * 3600).as_str(),
            "11/14/2023 6:13:20 PM"
        );
        // Midnight local renders as 12 AM.
        assert_eq!(
            format_local_datetime(Some(946_684_800), 0).as_str(),
            "01/01/2000 12:00:00 AM"
        );
        assert_eq!(
            format_local_datetime(None, -4 * 3600).as_str(),
            "Time not synced"
        );
    }

    #[test]
    fn negative_local_time_saturates_at_epoch_start() {
        // Offset would push the local clock before 1970; clamp instead of
        // underflowing.
        let s = format_local_datetime(Some(3600), -7200);
        assert_eq!(s.as_str(), "01/01/1970 12:00:00 AM");
    }
}

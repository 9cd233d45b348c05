// src/clock.rs
//
// Tick units and time/date string formatting for the watchface.

use chrono::{DateTime, Datelike, Local, Timelike};

/// Minute-of-hour advanced since the previous tick.
pub const MINUTE_UNIT: u8 = 1 << 0;
/// Hour-of-day advanced since the previous tick.
pub const HOUR_UNIT: u8 = 1 << 1;
/// Calendar day advanced since the previous tick.
pub const DAY_UNIT: u8 = 1 << 2;

/// One timer tick: the wall-clock time it fired at, plus a bitmask of
/// which calendar units changed since the previous tick.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub at: DateTime<Local>,
    pub units: u8,
}

impl Tick {
    pub fn new(at: DateTime<Local>, units: u8) -> Self {
        Self { at, units }
    }

    #[inline]
    pub fn has(&self, unit: u8) -> bool {
        self.units & unit != 0
    }
}

/// Compute the changed-units bitmask between two consecutive wall-clock
/// readings. A coarser unit changing implies all finer units changed,
/// even if their numeric values happen to coincide (suspend across a
/// whole day still yields a MINUTE change).
pub fn units_between(prev: &DateTime<Local>, now: &DateTime<Local>) -> u8 {
    let mut units = 0u8;
    let day_changed = prev.date_naive() != now.date_naive();
    let hour_changed = day_changed || prev.hour() != now.hour();
    let minute_changed = hour_changed || prev.minute() != now.minute();

    if minute_changed {
        units |= MINUTE_UNIT;
    }
    if hour_changed {
        units |= HOUR_UNIT;
    }
    if day_changed {
        units |= DAY_UNIT;
    }
    units
}

/// Format the time-of-day string, suppressing a leading zero in the hour.
/// 24h style runs 0:00..23:59, 12h style runs 12:00..11:59.
pub fn format_time(now: &DateTime<Local>, twenty_four_hour: bool) -> String {
    let hour = if twenty_four_hour {
        now.hour()
    } else {
        now.hour12().1
    };
    format!("{}:{:02}", hour, now.minute())
}

/// Format the date string: abbreviated weekday and month around an
/// unpadded day-of-month, locale-free (chrono's %a/%b are English).
pub fn format_date(now: &DateTime<Local>) -> String {
    format!("{} {} {}", now.format("%a"), now.day(), now.format("%b"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_time_strips_leading_zero_24h() {
        assert_eq!(format_time(&at(2025, 9, 5, 7, 5), true), "7:05");
        assert_eq!(format_time(&at(2025, 9, 5, 0, 30), true), "0:30");
        assert_eq!(format_time(&at(2025, 9, 5, 23, 59), true), "23:59");
    }

    #[test]
    fn test_time_12h_style() {
        assert_eq!(format_time(&at(2025, 9, 5, 13, 7), false), "1:07");
        assert_eq!(format_time(&at(2025, 9, 5, 0, 15), false), "12:15");
        assert_eq!(format_time(&at(2025, 9, 5, 12, 0), false), "12:00");
    }

    #[test]
    fn test_date_strips_leading_zero_day() {
        // 2025-09-05 is a Friday
        assert_eq!(format_date(&at(2025, 9, 5, 10, 0)), "Fri 5 Sep");
        assert_eq!(format_date(&at(2025, 12, 25, 10, 0)), "Thu 25 Dec");
    }

    #[test]
    fn test_units_between_minute_only() {
        let units = units_between(&at(2025, 9, 5, 10, 14), &at(2025, 9, 5, 10, 15));
        assert_eq!(units, MINUTE_UNIT);
    }

    #[test]
    fn test_units_between_hour_boundary() {
        let units = units_between(&at(2025, 9, 5, 10, 59), &at(2025, 9, 5, 11, 0));
        assert_eq!(units, MINUTE_UNIT | HOUR_UNIT);
    }

    #[test]
    fn test_units_between_day_boundary() {
        let units = units_between(&at(2025, 12, 31, 23, 59), &at(2026, 1, 1, 0, 0));
        assert_eq!(units, MINUTE_UNIT | HOUR_UNIT | DAY_UNIT);
    }

    #[test]
    fn test_units_between_no_change() {
        let t = at(2025, 9, 5, 10, 15);
        assert_eq!(units_between(&t, &t), 0);
    }

    #[test]
    fn test_units_between_suspend_across_day() {
        // Same minute/hour numbers a day apart still counts as all units.
        let units = units_between(&at(2025, 9, 5, 10, 15), &at(2025, 9, 6, 10, 15));
        assert_eq!(units, MINUTE_UNIT | HOUR_UNIT | DAY_UNIT);
    }
}

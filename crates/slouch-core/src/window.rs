//! Fixed 3-hour partition of the local day.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Timelike};

/// Number of time windows per day.
pub const WINDOW_COUNT: usize = 8;

const WINDOW_SECS: u64 = 3 * 60 * 60;

const WINDOW_NAMES: [&str; WINDOW_COUNT] = [
    "12am - 3am",
    "3am - 6am",
    "6am - 9am",
    "9am - 12pm",
    "12pm - 3pm",
    "3pm - 6pm",
    "6pm - 9pm",
    "9pm - 12am",
];

/// One of the eight 3-hour local-time windows of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeWindow(u8);

impl TimeWindow {
    pub const ALL: [Self; WINDOW_COUNT] = [
        Self(0),
        Self(1),
        Self(2),
        Self(3),
        Self(4),
        Self(5),
        Self(6),
        Self(7),
    ];

    /// Returns the window containing the local wall-clock time of `at`.
    #[must_use]
    pub fn containing<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        // hour() < 24, so the quotient always fits
        #[allow(clippy::cast_possible_truncation)]
        Self((at.hour() / 3) as u8)
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < WINDOW_COUNT {
            #[allow(clippy::cast_possible_truncation)]
            Some(Self(index as u8))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Human-readable label, also used as the persisted bucket name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        WINDOW_NAMES[self.0 as usize]
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Delay until the time-window settlement after one performed at `now`.
///
/// Returns `max` unless the next 3-hour boundary is closer, in which case the
/// delay lands exactly on the boundary. Sub-second precision is dropped, so a
/// boundary delay never fires before the boundary itself.
#[must_use]
pub fn next_settlement_delay<Tz: TimeZone>(now: &DateTime<Tz>, max: Duration) -> Duration {
    let into_window = u64::from(now.hour() % 3) * 3600
        + u64::from(now.minute()) * 60
        + u64::from(now.second());
    let until_boundary = Duration::from_secs(WINDOW_SECS - into_window);
    until_boundary.min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 1, 15, hour, minute, second)
            .single()
            .expect("valid test timestamp")
    }

    const TEN_MINUTES: Duration = Duration::from_secs(600);

    #[test]
    fn windows_cover_the_day_in_three_hour_steps() {
        assert_eq!(TimeWindow::containing(&at(0, 0, 0)).index(), 0);
        assert_eq!(TimeWindow::containing(&at(2, 59, 59)).index(), 0);
        assert_eq!(TimeWindow::containing(&at(3, 0, 0)).index(), 1);
        assert_eq!(TimeWindow::containing(&at(13, 30, 0)).index(), 4);
        assert_eq!(TimeWindow::containing(&at(23, 59, 59)).index(), 7);
    }

    #[test]
    fn names_follow_window_order() {
        let names: Vec<_> = TimeWindow::ALL.iter().map(|w| w.name()).collect();
        assert_eq!(names.first(), Some(&"12am - 3am"));
        assert_eq!(names.last(), Some(&"9pm - 12am"));
        assert_eq!(TimeWindow::from_index(3).map(TimeWindow::name), Some("9am - 12pm"));
        assert_eq!(TimeWindow::from_index(8), None);
    }

    #[test]
    fn delay_is_max_when_boundary_is_far() {
        assert_eq!(next_settlement_delay(&at(9, 0, 0), TEN_MINUTES), TEN_MINUTES);
        assert_eq!(next_settlement_delay(&at(10, 50, 0), TEN_MINUTES), TEN_MINUTES);
    }

    #[test]
    fn delay_snaps_to_upcoming_boundary() {
        assert_eq!(
            next_settlement_delay(&at(11, 55, 0), TEN_MINUTES),
            Duration::from_secs(300)
        );
        assert_eq!(
            next_settlement_delay(&at(23, 59, 30), TEN_MINUTES),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn delay_right_after_boundary_is_full_interval() {
        assert_eq!(next_settlement_delay(&at(12, 0, 0), TEN_MINUTES), TEN_MINUTES);
    }
}

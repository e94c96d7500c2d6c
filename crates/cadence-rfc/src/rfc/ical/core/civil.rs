//! Civil (wall-clock) calendar time with the date arithmetic the recurrence
//! engine relies on.
//!
//! A `CivilTime` carries no zone. Fields may temporarily hold out-of-range
//! values while the recurrence iterator steps through candidates; calling
//! [`CivilTime::normalize`] rolls them over into a valid calendar position.
//!
//! Calendar facts (month lengths, weekdays, ordinals) come from chrono. Years
//! outside chrono's range are answered for the equivalent year of the
//! 2000-2399 cycle, since the Gregorian calendar repeats every 400 years.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::Weekday;

/// Days in one 400-year Gregorian cycle.
const DAYS_PER_CYCLE: i32 = 146_097;

/// Sunday-relative number of Thursday, used by the week-one computation.
const THURSDAY: i32 = 5;

/// A calendar date and time of day without zone information.
///
/// When `is_date` is set the value is a DATE and the time fields are zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CivilTime {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
    #[serde(default)]
    pub is_date: bool,
}

impl CivilTime {
    /// Creates a date-time value.
    #[must_use]
    pub const fn new(year: i32, month: i32, day: i32, hour: i32, minute: i32, second: i32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            is_date: false,
        }
    }

    /// Creates a date value (midnight, `is_date` set).
    #[must_use]
    pub const fn date(year: i32, month: i32, day: i32) -> Self {
        Self {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
            is_date: true,
        }
    }

    #[must_use]
    pub fn is_leap_year(year: i32) -> bool {
        cycle_date(year, 2, 29).is_some()
    }

    #[must_use]
    pub fn days_in_year(year: i32) -> i32 {
        if Self::is_leap_year(year) { 366 } else { 365 }
    }

    /// Returns the number of days in `month` of `year`, or 0 for an invalid month.
    #[must_use]
    pub fn days_in_month(month: i32, year: i32) -> i32 {
        (28..=31)
            .rev()
            .find(|&day| cycle_date(year, month, day).is_some())
            .unwrap_or(0)
    }

    /// Ordinal of the day before the first of `month`, 0 for an invalid month.
    fn days_before_month(month: i32, year: i32) -> i32 {
        cycle_date(year, month, 1).map_or(0, |first| small(first.ordinal0()))
    }

    /// ## Summary
    /// Rolls every out-of-range field over into the next coarser field, so
    /// that e.g. day 32 of January becomes February 1st and second -1 becomes
    /// 23:59:59 of the previous day.
    pub fn normalize(&mut self) {
        let carry = self.second.div_euclid(60);
        self.second = self.second.rem_euclid(60);
        self.minute += carry;

        let carry = self.minute.div_euclid(60);
        self.minute = self.minute.rem_euclid(60);
        self.hour += carry;

        let carry = self.hour.div_euclid(24);
        self.hour = self.hour.rem_euclid(24);
        self.day += carry;

        self.normalize_month();

        while self.day < 1 {
            self.month -= 1;
            self.normalize_month();
            self.day += Self::days_in_month(self.month, self.year);
        }

        loop {
            let days_in_month = Self::days_in_month(self.month, self.year);
            if self.day <= days_in_month {
                break;
            }
            self.day -= days_in_month;
            self.month += 1;
            self.normalize_month();
        }
    }

    fn normalize_month(&mut self) {
        let zero_based = self.month - 1;
        self.year += zero_based.div_euclid(12);
        self.month = zero_based.rem_euclid(12) + 1;
    }

    /// Returns a normalized copy.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// ## Summary
    /// Shifts the value by the given amounts and normalizes the result.
    pub fn adjust(&mut self, days: i32, hours: i32, minutes: i32, seconds: i32) {
        self.day += days;
        self.hour += hours;
        self.minute += minutes;
        self.second += seconds;
        self.normalize();
    }

    /// Returns a copy with the day of month replaced, without normalizing.
    #[must_use]
    pub const fn with_day(mut self, day: i32) -> Self {
        self.day = day;
        self
    }

    /// ## Summary
    /// Returns the day of the week, numbered 1..=7 where 1 is `week_start`.
    ///
    /// A day past the end of the month continues counting from the month's
    /// first day.
    #[must_use]
    pub fn day_of_week(&self, week_start: Weekday) -> i32 {
        let first = cycle_date(self.year, self.month, 1)
            .map_or(0, |first| small(first.weekday().num_days_from_sunday()));
        (first + self.day - week_start.number()).rem_euclid(7) + 1
    }

    #[must_use]
    pub fn weekday(&self) -> Weekday {
        Weekday::from_number(self.day_of_week(Weekday::Sunday))
    }

    /// Returns the 1-based ordinal day within the year.
    #[must_use]
    pub fn day_of_year(&self) -> i32 {
        Self::days_before_month(self.month, self.year) + self.day
    }

    /// ## Summary
    /// Builds the date at ordinal day `day_of_year` of `year`. Ordinals outside
    /// the year roll into the neighbouring years.
    #[must_use]
    pub fn from_day_of_year(day_of_year: i32, year: i32) -> Self {
        let mut doy = day_of_year;
        let mut year = year;
        while doy < 1 {
            year -= 1;
            doy += Self::days_in_year(year);
        }
        while doy > Self::days_in_year(year) {
            doy -= Self::days_in_year(year);
            year += 1;
        }

        u32::try_from(doy)
            .ok()
            .and_then(|doy| NaiveDate::from_yo_opt(cycle_year(year), doy))
            .map_or(Self::date(year, 1, doy), |date| {
                Self::date(year, small(date.month()), small(date.day()))
            })
    }

    /// Days since a fixed epoch; only differences between two values are meaningful.
    fn day_number(&self) -> i32 {
        let cycles = (self.year - cycle_year(self.year)) / 400;
        let before_month =
            cycle_date(self.year, self.month, 1).map_or(0, |first| first.num_days_from_ce());
        cycles * DAYS_PER_CYCLE + before_month + self.day
    }

    /// ## Summary
    /// Returns the date on which week 1 of `year` starts: the week (beginning
    /// on `week_start`) that contains at least four days of the new year.
    #[must_use]
    pub fn week_one_starts(year: i32, week_start: Weekday) -> Self {
        let mut start = Self::date(year, 1, 1);
        let dow = start.day_of_week(Weekday::Sunday);
        let wkst = week_start.number();
        if dow > THURSDAY {
            start.day += 7;
        }
        if wkst > THURSDAY {
            start.day -= 7;
        }
        start.day -= dow - wkst;
        start.normalized()
    }

    /// ## Summary
    /// Returns the week number of this date, with weeks starting on `week_start`.
    #[must_use]
    pub fn week_number(&self, week_start: Weekday) -> i32 {
        let date = Self::date(self.year, self.month, self.day);
        let week_one = if self.month == 12 && self.day > 25 {
            let next = Self::week_one_starts(self.year + 1, week_start);
            if date < next {
                Self::week_one_starts(self.year, week_start)
            } else {
                next
            }
        } else {
            let current = Self::week_one_starts(self.year, week_start);
            if date < current {
                Self::week_one_starts(self.year - 1, week_start)
            } else {
                current
            }
        };
        (date.day_number() - week_one.day_number()) / 7 + 1
    }

    /// Returns the number of weeks in `year` for the given week start.
    #[must_use]
    pub fn weeks_in_year(year: i32, week_start: Weekday) -> i32 {
        let next = Self::week_one_starts(year + 1, week_start);
        let current = Self::week_one_starts(year, week_start);
        (next.day_number() - current.day_number()) / 7
    }

    /// ## Summary
    /// Returns the day of the month of the `pos`-th `weekday` in this value's
    /// month. Positive positions count from the start of the month (0 behaves
    /// like 1), negative ones from the end. The result is not clamped and may
    /// fall outside the month.
    #[must_use]
    pub fn nth_week_day(&self, weekday: Weekday, pos: i32) -> i32 {
        let days_in_month = Self::days_in_month(self.month, self.year);
        let dow = weekday.number();
        if pos >= 0 {
            let first_dow = Self::date(self.year, self.month, 1).day_of_week(Weekday::Sunday);
            let offset = (dow - first_dow).rem_euclid(7);
            let pos = if pos == 0 { 0 } else { pos - 1 };
            1 + offset + pos * 7
        } else {
            let last_dow =
                Self::date(self.year, self.month, days_in_month).day_of_week(Weekday::Sunday);
            let back = (last_dow - dow).rem_euclid(7);
            days_in_month - back + (pos + 1) * 7
        }
    }

    /// Returns whether this date is the `pos`-th `weekday` of its month
    /// (any occurrence of it when `pos` is 0).
    #[must_use]
    pub fn is_nth_week_day(&self, weekday: Weekday, pos: i32) -> bool {
        (pos == 0 && self.weekday() == weekday) || self.nth_week_day(weekday, pos) == self.day
    }

    /// Returns the ordinal day of the first day of this value's week. The
    /// result may be zero or negative when the week began in the previous year.
    #[must_use]
    pub fn start_doy_week(&self, week_start: Weekday) -> i32 {
        let delta = (self.day_of_week(Weekday::Sunday) - week_start.number()).rem_euclid(7);
        self.day_of_year() - delta
    }

    fn sort_key(&self) -> (i32, i32, i32, i32, i32, i32) {
        let n = self.normalized();
        (n.year, n.month, n.day, n.hour, n.minute, n.second)
    }

    /// Converts to a chrono value, if the fields form a valid date and time.
    #[must_use]
    pub fn to_naive(self) -> Option<NaiveDateTime> {
        let n = self.normalized();
        NaiveDate::from_ymd_opt(n.year, u32::try_from(n.month).ok()?, u32::try_from(n.day).ok()?)?
            .and_hms_opt(
                u32::try_from(n.hour).ok()?,
                u32::try_from(n.minute).ok()?,
                u32::try_from(n.second).ok()?,
            )
    }

    #[must_use]
    pub fn from_naive(value: &NaiveDateTime) -> Self {
        Self::new(
            value.year(),
            small(value.month()),
            small(value.day()),
            small(value.hour()),
            small(value.minute()),
            small(value.second()),
        )
    }
}

/// Maps `year` onto the equivalent year of the 2000-2399 cycle.
const fn cycle_year(year: i32) -> i32 {
    2000 + year.rem_euclid(400)
}

/// The date at `month`/`day` of the cycle year equivalent to `year`, if valid.
fn cycle_date(year: i32, month: i32, day: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        cycle_year(year),
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )
}

/// Narrows a chrono calendar component, which is always well below `i32::MAX`.
fn small(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl PartialEq for CivilTime {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for CivilTime {}

impl PartialOrd for CivilTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CivilTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl From<NaiveDate> for CivilTime {
    fn from(value: NaiveDate) -> Self {
        Self::date(value.year(), small(value.month()), small(value.day()))
    }
}

impl From<NaiveDateTime> for CivilTime {
    fn from(value: NaiveDateTime) -> Self {
        Self::from_naive(&value)
    }
}

impl fmt::Display for CivilTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}{:02}", self.year, self.month, self.day)?;
        if !self.is_date {
            write!(f, "T{:02}{:02}{:02}", self.hour, self.minute, self.second)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rolls_over_every_field() {
        let mut t = CivilTime::new(2023, 12, 31, 23, 59, 60);
        t.normalize();
        assert_eq!(t, CivilTime::new(2024, 1, 1, 0, 0, 0));

        let mut t = CivilTime::new(2024, 3, 0, 0, 0, 0);
        t.normalize();
        assert_eq!((t.month, t.day), (2, 29));

        let mut t = CivilTime::new(2024, 1, 1, 0, 0, -1);
        t.normalize();
        assert_eq!(t, CivilTime::new(2023, 12, 31, 23, 59, 59));

        let mut t = CivilTime::new(2024, 14, 1, 0, 0, 0);
        t.normalize();
        assert_eq!((t.year, t.month), (2025, 2));
    }

    #[test]
    fn day_of_week_respects_week_start() {
        // 2012-01-01 was a Sunday.
        let t = CivilTime::date(2012, 1, 1);
        assert_eq!(t.day_of_week(Weekday::Sunday), 1);
        assert_eq!(t.day_of_week(Weekday::Monday), 7);
        assert_eq!(t.weekday(), Weekday::Sunday);
        assert_eq!(CivilTime::date(2024, 2, 29).weekday(), Weekday::Thursday);
    }

    #[test]
    fn day_of_year_and_back() {
        assert_eq!(CivilTime::date(2024, 12, 31).day_of_year(), 366);
        assert_eq!(CivilTime::date(2023, 3, 1).day_of_year(), 60);
        assert_eq!(
            CivilTime::from_day_of_year(60, 2024),
            CivilTime::date(2024, 2, 29)
        );
        assert_eq!(
            CivilTime::from_day_of_year(0, 2024),
            CivilTime::date(2023, 12, 31)
        );
        assert_eq!(
            CivilTime::from_day_of_year(367, 2024),
            CivilTime::date(2025, 1, 1)
        );
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(CivilTime::days_in_month(2, 2000), 29);
        assert_eq!(CivilTime::days_in_month(2, 1900), 28);
        assert_eq!(CivilTime::days_in_month(2, 2024), 29);
        assert_eq!(CivilTime::days_in_month(4, 2024), 30);
    }

    #[test]
    fn far_years_follow_the_four_hundred_year_cycle() {
        // Beyond chrono's range; 402_026 is 2026 shifted by 1000 cycles.
        assert_eq!(CivilTime::days_in_month(2, 1_000_000), 29);
        assert_eq!(CivilTime::days_in_month(2, 1_000_100), 28);
        assert_eq!(CivilTime::date(402_026, 3, 8).weekday(), Weekday::Sunday);
        assert_eq!(
            CivilTime::from_day_of_year(60, 400_000),
            CivilTime::date(400_000, 2, 29)
        );
        assert_eq!(
            CivilTime::date(402_026, 1, 4).week_number(Weekday::Monday),
            CivilTime::date(2026, 1, 4).week_number(Weekday::Monday)
        );
        let mut t = CivilTime::new(402_025, 12, 31, 23, 0, 0);
        t.adjust(0, 1, 0, 0);
        assert_eq!(t, CivilTime::new(402_026, 1, 1, 0, 0, 0));
    }

    #[test]
    fn iso_week_numbers() {
        assert_eq!(
            CivilTime::date(2021, 1, 4).week_number(Weekday::Monday),
            1
        );
        assert_eq!(
            CivilTime::date(2021, 1, 3).week_number(Weekday::Monday),
            53
        );
        assert_eq!(
            CivilTime::date(2024, 12, 30).week_number(Weekday::Monday),
            1
        );
        assert_eq!(CivilTime::weeks_in_year(2020, Weekday::Monday), 53);
        assert_eq!(CivilTime::weeks_in_year(2021, Weekday::Monday), 52);
    }

    #[test]
    fn nth_week_day_from_both_ends() {
        let march = CivilTime::date(2026, 3, 1);
        assert_eq!(march.nth_week_day(Weekday::Sunday, 1), 1);
        assert_eq!(march.nth_week_day(Weekday::Sunday, 2), 8);
        assert_eq!(march.nth_week_day(Weekday::Sunday, -1), 29);
        assert_eq!(march.nth_week_day(Weekday::Tuesday, 0), 3);
        assert_eq!(march.nth_week_day(Weekday::Tuesday, 5), 31);
        // A fifth Wednesday does not exist in March 2026.
        assert!(march.nth_week_day(Weekday::Wednesday, 5) > 31);
        assert!(CivilTime::date(2026, 3, 29).is_nth_week_day(Weekday::Sunday, -1));
        assert!(CivilTime::date(2026, 3, 10).is_nth_week_day(Weekday::Tuesday, 0));
    }

    #[test]
    fn start_of_week_can_precede_the_year() {
        // Sunday 2012-01-01 belongs to the week starting Monday 2011-12-26.
        assert_eq!(CivilTime::date(2012, 1, 1).start_doy_week(Weekday::Monday), -5);
        assert_eq!(CivilTime::date(2012, 1, 8).start_doy_week(Weekday::Monday), 2);
    }

    #[test]
    fn ordering_ignores_date_flag_and_normalizes() {
        assert_eq!(CivilTime::date(2024, 1, 1), CivilTime::new(2024, 1, 1, 0, 0, 0));
        assert!(CivilTime::new(2024, 1, 32, 0, 0, 0) > CivilTime::date(2024, 1, 31));
    }

    #[test]
    fn display_and_chrono_conversion() {
        let t = CivilTime::new(2026, 1, 23, 9, 5, 0);
        assert_eq!(t.to_string(), "20260123T090500");
        assert_eq!(CivilTime::date(2026, 1, 23).to_string(), "20260123");
        let naive = t.to_naive().unwrap();
        assert_eq!(CivilTime::from(naive), t);
    }
}

//! Day-of-year candidate sets for yearly rules.
//!
//! Only the by-part combinations listed in [`expand_year_days`] are resolved.
//! Every other combination yields an empty set, which the iterator treats as
//! "no occurrence this year".

use crate::rfc::ical::core::{ByPart, CivilTime, RecurrenceRule, WeekdayNum};

/// ## Summary
/// Resolves BYMONTHDAY values against one month.
///
/// Negative values count back from the last day of the month; values whose
/// magnitude exceeds the month length are dropped. The result is ascending
/// and free of duplicates.
pub(super) fn normalize_month_days(year: i32, month: i32, values: &[i32]) -> Vec<i32> {
    let days_in_month = CivilTime::days_in_month(month, year);
    let mut days: Vec<i32> = values
        .iter()
        .filter(|value| **value != 0 && value.abs() <= days_in_month)
        .map(|&value| {
            if value < 0 {
                days_in_month + value + 1
            } else {
                value
            }
        })
        .collect();
    days.sort_unstable();
    days.dedup();
    days
}

/// ## Summary
/// Expands the by-parts of a yearly rule into the sorted ordinal days of
/// `year` on which occurrences fall.
///
/// Supported combinations: none, BYMONTH, BYMONTHDAY, BYMONTH+BYMONTHDAY,
/// BYDAY, BYDAY+BYMONTH (with BYSETPOS per month), BYDAY+BYMONTHDAY,
/// BYDAY+BYMONTH+BYMONTHDAY, BYDAY+BYWEEKNO and BYYEARDAY. When BYMONTH and
/// BYWEEKNO are both present only one of them is used: BYWEEKNO if all of its
/// weeks lie inside the listed months, BYMONTH otherwise.
pub(super) fn expand_year_days(
    rule: &RecurrenceRule,
    by_day: &[WeekdayNum],
    start: &CivilTime,
    year: i32,
) -> Vec<i32> {
    let parts = &rule.parts;
    let mut has_month = parts.has(ByPart::Month);
    let mut has_week_no = parts.has(ByPart::WeekNo);
    if has_month && has_week_no {
        if weeks_fit_months(rule, year) {
            has_month = false;
        } else {
            has_week_no = false;
        }
    }

    let has_day = !by_day.is_empty();
    let has_month_day = parts.has(ByPart::MonthDay);
    let has_year_day = parts.has(ByPart::YearDay);

    let days = match (has_day, has_month_day, has_month, has_week_no, has_year_day) {
        (false, false, false, false, false) => {
            ordinal(year, start.month, start.day).into_iter().collect()
        }
        (false, false, true, false, false) => parts
            .month
            .iter()
            .filter_map(|&month| ordinal(year, month, start.day))
            .collect(),
        (false, true, false, false, false) => {
            normalize_month_days(year, start.month, &parts.month_day)
                .into_iter()
                .filter_map(|day| ordinal(year, start.month, day))
                .collect()
        }
        (false, true, true, false, false) => parts
            .month
            .iter()
            .flat_map(|&month| {
                normalize_month_days(year, month, &parts.month_day)
                    .into_iter()
                    .filter_map(move |day| ordinal(year, month, day))
            })
            .collect(),
        (true, false, false, false, false) => expand_by_day(by_day, year),
        (true, false, true, false, false) => by_day_in_months(rule, by_day, year),
        (true, true, false, false, false) => expand_by_day(by_day, year)
            .into_iter()
            .filter(|&doy| {
                let date = CivilTime::from_day_of_year(doy, year);
                month_day_matches(&parts.month_day, &date)
            })
            .collect(),
        (true, true, true, false, false) => expand_by_day(by_day, year)
            .into_iter()
            .filter(|&doy| {
                let date = CivilTime::from_day_of_year(doy, year);
                parts.month.contains(&date.month) && month_day_matches(&parts.month_day, &date)
            })
            .collect(),
        (true, false, false, true, false) => {
            let weeks = CivilTime::weeks_in_year(year, rule.week_start);
            expand_by_day(by_day, year)
                .into_iter()
                .filter(|&doy| {
                    let week = CivilTime::from_day_of_year(doy, year).week_number(rule.week_start);
                    parts
                        .week_no
                        .iter()
                        .any(|&value| value == week || (value < 0 && weeks + value + 1 == week))
                })
                .collect()
        }
        (false, false, false, false, true) => parts.year_day.clone(),
        // BYWEEKNO alone, BYWEEKNO+BYMONTHDAY, BYDAY+BYWEEKNO+BYMONTHDAY and
        // anything else are not expanded.
        _ => Vec::new(),
    };

    finalize(days, year)
}

/// ## Summary
/// Expands BYDAY tokens over a whole year: every matching weekday for plain
/// tokens, or the n-th one from either end of the year for ordinal tokens.
pub(super) fn expand_by_day(by_day: &[WeekdayNum], year: i32) -> Vec<i32> {
    let first_dow = CivilTime::date(year, 1, 1).weekday().number();
    let last = CivilTime::date(year, 12, 31);
    let last_dow = last.weekday().number();
    let year_end = last.day_of_year();

    let mut days = Vec::new();
    for token in by_day {
        let dow = token.weekday.number();
        let pos = token.position();
        if pos == 0 {
            let first = (dow + 7 - first_dow) % 7 + 1;
            days.extend((first..=year_end).step_by(7));
        } else if pos > 0 {
            let first = (dow - first_dow).rem_euclid(7) + 1;
            days.push(first + (pos - 1) * 7);
        } else {
            let last_match = year_end - (last_dow - dow).rem_euclid(7);
            days.push(last_match + (pos + 1) * 7);
        }
    }
    days
}

/// BYDAY within each listed month, optionally filtered by BYSETPOS.
fn by_day_in_months(rule: &RecurrenceRule, by_day: &[WeekdayNum], year: i32) -> Vec<i32> {
    let mut days = Vec::new();
    for &month in &rule.parts.month {
        let days_in_month = CivilTime::days_in_month(month, year);
        if days_in_month == 0 {
            continue;
        }
        let first = CivilTime::date(year, month, 1);
        let offset = first.day_of_year() - 1;
        let matching: Vec<i32> = (1..=days_in_month)
            .filter(|&day| {
                let date = first.with_day(day);
                by_day
                    .iter()
                    .any(|token| date.is_nth_week_day(token.weekday, token.position()))
            })
            .collect();

        let selected = if rule.parts.has(ByPart::SetPos) {
            select_set_positions(&matching, &rule.parts.set_pos)
        } else {
            matching
        };
        days.extend(selected.into_iter().map(|day| offset + day));
    }
    days
}

/// ## Summary
/// Keeps the candidates whose 1-based position (or negative position counted
/// from the end) is listed in `set_pos`.
pub(super) fn select_set_positions(candidates: &[i32], set_pos: &[i32]) -> Vec<i32> {
    let total = i32::try_from(candidates.len()).unwrap_or(i32::MAX);
    candidates
        .iter()
        .zip(1..)
        .filter(|&(_, pos)| set_pos.contains(&pos) || set_pos.contains(&(pos - total - 1)))
        .map(|(&day, _)| day)
        .collect()
}

/// Whether every listed week number lies inside the weeks spanned by the listed months.
fn weeks_fit_months(rule: &RecurrenceRule, year: i32) -> bool {
    let week_start = rule.week_start;
    let spans: Vec<(i32, i32)> = rule
        .parts
        .month
        .iter()
        .filter(|&&month| CivilTime::days_in_month(month, year) > 0)
        .map(|&month| {
            let first = CivilTime::date(year, month, 1).week_number(week_start);
            let last = CivilTime::date(year, month, CivilTime::days_in_month(month, year))
                .week_number(week_start);
            (first, last)
        })
        .collect();

    rule.parts.week_no.iter().all(|&week| {
        week > 0 && week < 52 && spans.iter().any(|&(first, last)| first <= week && week <= last)
    })
}

fn month_day_matches(values: &[i32], date: &CivilTime) -> bool {
    normalize_month_days(date.year, date.month, values).contains(&date.day)
}

/// Ordinal day of a calendar date, or `None` if the date does not exist.
fn ordinal(year: i32, month: i32, day: i32) -> Option<i32> {
    let days_in_month = CivilTime::days_in_month(month, year);
    (1..=days_in_month).contains(&day).then(|| CivilTime::date(year, month, day).day_of_year())
}

/// Resolves negative ordinals, drops days outside the year, sorts and dedupes.
fn finalize(days: Vec<i32>, year: i32) -> Vec<i32> {
    let days_in_year = CivilTime::days_in_year(year);
    let mut days: Vec<i32> = days
        .into_iter()
        .map(|doy| if doy < 0 { doy + days_in_year + 1 } else { doy })
        .filter(|doy| (1..=days_in_year).contains(doy))
        .collect();
    days.sort_unstable();
    days.dedup();
    days
}

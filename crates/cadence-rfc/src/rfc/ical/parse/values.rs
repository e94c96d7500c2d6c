//! Value type parsers for iCalendar (RFC 5545 §3.3).
#![expect(
    clippy::map_err_ignore,
    reason = "Value parsers report positions and tokens, not the std parse error"
)]

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{
    ByPart, CivilTime, DateTime, Frequency, RecurrenceRule, UtcOffset, Weekday, WeekdayNum,
};

/// Parses a run of ASCII digits as a number, rejecting signs and whitespace.
fn digits(s: &str) -> Option<i32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parses a DATE value (RFC 5545 §3.3.4).
///
/// Format: YYYYMMDD (e.g., "19970714")
///
/// ## Errors
/// Returns an error if the string is not a valid 8-digit date.
pub fn parse_date(s: &str, line: usize, col: usize) -> ParseResult<CivilTime> {
    let err =
        || ParseError::new(ParseErrorKind::InvalidDate, line, col).with_context(s.to_string());
    if s.len() != 8 {
        return Err(err());
    }
    let year = s.get(0..4).and_then(digits).ok_or_else(err)?;
    let month = s.get(4..6).and_then(digits).ok_or_else(err)?;
    let day = s.get(6..8).and_then(digits).ok_or_else(err)?;

    if !(1..=12).contains(&month) || !(1..=CivilTime::days_in_month(month, year)).contains(&day) {
        return Err(err());
    }
    Ok(CivilTime::date(year, month, day))
}

/// Parses a TIME value (RFC 5545 §3.3.12) into `(hour, minute, second, is_utc)`.
fn parse_time(s: &str, line: usize, col: usize) -> ParseResult<(i32, i32, i32, bool)> {
    let err =
        || ParseError::new(ParseErrorKind::InvalidTime, line, col).with_context(s.to_string());
    let (time, is_utc) = match s.strip_suffix('Z') {
        Some(stripped) => (stripped, true),
        None => (s, false),
    };
    if time.len() != 6 {
        return Err(err());
    }
    let hour = time.get(0..2).and_then(digits).ok_or_else(err)?;
    let minute = time.get(2..4).and_then(digits).ok_or_else(err)?;
    let second = time.get(4..6).and_then(digits).ok_or_else(err)?;

    // 60 is a leap second
    if hour > 23 || minute > 59 || second > 60 {
        return Err(err());
    }
    Ok((hour, minute, second, is_utc))
}

/// Parses a DATE-TIME value (RFC 5545 §3.3.5).
///
/// Format: YYYYMMDD"T"HHMMSS[Z]. The `tzid` comes from the property's TZID
/// parameter and is ignored for UTC values.
///
/// ## Errors
/// Returns an error if the string is not a valid date-time.
pub fn parse_datetime(
    s: &str,
    tzid: Option<&str>,
    line: usize,
    col: usize,
) -> ParseResult<DateTime> {
    let (date, time) = s.split_once('T').ok_or_else(|| {
        ParseError::new(ParseErrorKind::InvalidDateTime, line, col).with_context(s.to_string())
    })?;
    let date = parse_date(date, line, col)?;
    let (hour, minute, second, is_utc) = parse_time(time, line, col + 9)?;
    let civil = CivilTime::new(date.year, date.month, date.day, hour, minute, second);

    Ok(match (is_utc, tzid) {
        (true, _) => DateTime::utc(civil),
        (false, Some(tzid)) => DateTime::zoned(civil, tzid),
        (false, None) => DateTime::floating(civil),
    })
}

/// ## Summary
/// Parses a value that may be either DATE or DATE-TIME, deciding by the
/// presence of the `T` separator. DATE values are always floating.
///
/// ## Errors
/// Returns an error if the string is neither form.
pub fn parse_date_or_datetime(
    s: &str,
    tzid: Option<&str>,
    line: usize,
    col: usize,
) -> ParseResult<DateTime> {
    if s.contains('T') {
        parse_datetime(s, tzid, line, col)
    } else {
        parse_date(s, line, col).map(DateTime::floating)
    }
}

/// Parses a UTC-OFFSET value (RFC 5545 §3.3.14).
///
/// Format: (+|-)HHMM[SS] (e.g., "+0530", "-0800")
///
/// ## Errors
/// Returns an error if the string is not a valid UTC offset.
pub fn parse_utc_offset(s: &str, line: usize, col: usize) -> ParseResult<UtcOffset> {
    let err = || {
        ParseError::new(ParseErrorKind::InvalidUtcOffset, line, col).with_context(s.to_string())
    };
    let sign = match s.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Err(err()),
    };
    let body = &s[1..];
    if body.len() != 4 && body.len() != 6 {
        return Err(err());
    }
    let hours = body.get(0..2).and_then(digits).ok_or_else(err)?;
    let minutes = body.get(2..4).and_then(digits).ok_or_else(err)?;
    let seconds = match body.get(4..6) {
        Some(secs) => digits(secs).ok_or_else(err)?,
        None => 0,
    };
    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err(err());
    }

    Ok(UtcOffset::from_seconds(
        sign * (hours * 3600 + minutes * 60 + seconds),
    ))
}

/// Parses an INTEGER value (RFC 5545 §3.3.8).
///
/// ## Errors
/// Returns an error if the string is not a valid integer.
pub fn parse_integer(s: &str, line: usize, col: usize) -> ParseResult<i32> {
    s.parse()
        .map_err(|_| ParseError::new(ParseErrorKind::InvalidInteger, line, col))
}

/// Unescapes text values (RFC 5545 §3.3.11).
///
/// Escape sequences: \\ \, \; \n \N
#[must_use]
pub fn unescape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => result.push('\n'),
            Some(escaped @ (',' | ';' | '\\')) => result.push(escaped),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

/// Rule-part accumulator; FREQ is only known once every part has been read.
#[derive(Default)]
struct RuleParts {
    frequency: Option<Frequency>,
    interval: Option<i32>,
    count: Option<u32>,
    until: Option<(CivilTime, bool)>,
    week_start: Option<Weekday>,
    by_day: Vec<WeekdayNum>,
    numeric: Vec<(ByPart, Vec<i32>)>,
}

/// Parses a RECUR value (RFC 5545 §3.3.10).
///
/// Every by-part value is range checked; the error context names the
/// offending token and rule part. Unknown rule parts are ignored.
///
/// ## Errors
/// Returns an error if FREQ is missing or invalid, a value is malformed or
/// out of range, a weekday token is unknown, or both COUNT and UNTIL appear.
pub fn parse_rrule(s: &str, line: usize, col: usize) -> ParseResult<RecurrenceRule> {
    let mut parts = RuleParts::default();

    for segment in s.split(';').filter(|segment| !segment.is_empty()) {
        let (key, value) = segment.split_once('=').ok_or_else(|| {
            ParseError::new(ParseErrorKind::InvalidRRule, line, col)
                .with_context(format!("rule part '{segment}' has no value"))
        })?;
        parse_rrule_part(&mut parts, key, value, line, col)?;
    }

    let frequency = parts.frequency.ok_or_else(|| {
        ParseError::new(ParseErrorKind::InvalidRRule, line, col).with_context("FREQ is required")
    })?;

    let mut rule = RecurrenceRule::new(frequency).with_interval(parts.interval.unwrap_or(1));
    if let Some(week_start) = parts.week_start {
        rule = rule.with_week_start(week_start);
    }
    if let Some(count) = parts.count {
        rule = rule.with_count(count);
    }
    if let Some((time, is_utc)) = parts.until {
        rule = rule.with_until(time, is_utc);
    }
    if !parts.by_day.is_empty() {
        rule = rule.with_by_day(parts.by_day).map_err(|e| e.at(line, col))?;
    }
    for (part, values) in parts.numeric {
        rule = rule.with_part(part, values).map_err(|e| e.at(line, col))?;
    }
    Ok(rule)
}

/// Parses a single RRULE key-value pair into the accumulator.
fn parse_rrule_part(
    parts: &mut RuleParts,
    key: &str,
    value: &str,
    line: usize,
    col: usize,
) -> ParseResult<()> {
    let invalid = |kind: ParseErrorKind, what: &str| {
        ParseError::new(kind, line, col).with_context(format!("{what} value '{value}'"))
    };

    match key.to_ascii_uppercase().as_str() {
        "FREQ" => {
            parts.frequency = Some(
                Frequency::parse(value)
                    .ok_or_else(|| invalid(ParseErrorKind::InvalidFrequency, "FREQ"))?,
            );
        }
        "INTERVAL" => {
            parts.interval = Some(
                value
                    .parse()
                    .map_err(|_| invalid(ParseErrorKind::InvalidRRule, "INTERVAL"))?,
            );
        }
        "COUNT" => {
            parts.count = Some(
                value
                    .parse()
                    .map_err(|_| invalid(ParseErrorKind::InvalidRRule, "COUNT"))?,
            );
        }
        "UNTIL" => {
            let until = parse_date_or_datetime(value, None, line, col)?;
            parts.until = Some((until.civil, until.is_utc()));
        }
        "WKST" => {
            parts.week_start = Some(
                Weekday::parse(value)
                    .ok_or_else(|| invalid(ParseErrorKind::InvalidWeekday, "WKST"))?,
            );
        }
        "BYDAY" => {
            parts.by_day = value
                .split(',')
                .map(|token| parse_weekday_num(token.trim(), line, col))
                .collect::<ParseResult<_>>()?;
        }
        other => match ByPart::parse(other) {
            Some(part) => {
                let values = value
                    .split(',')
                    .map(|token| {
                        token.trim().parse::<i32>().map_err(|_| {
                            ParseError::new(ParseErrorKind::InvalidRRule, line, col)
                                .with_context(format!("{part} value '{token}' is not a number"))
                        })
                    })
                    .collect::<ParseResult<Vec<_>>>()?;
                parts.numeric.push((part, values));
            }
            None => tracing::debug!(part = other, "Ignoring unknown rule part"),
        },
    }
    Ok(())
}

/// Parses a single weekday with optional ordinal (e.g., "MO", "1MO", "-1FR").
fn parse_weekday_num(s: &str, line: usize, col: usize) -> ParseResult<WeekdayNum> {
    let invalid = || {
        ParseError::new(ParseErrorKind::InvalidWeekday, line, col)
            .with_context(format!("BYDAY token '{s}'"))
    };
    let split = s.len().checked_sub(2).filter(|&i| s.is_char_boundary(i)).ok_or_else(invalid)?;
    let (ordinal, weekday) = s.split_at(split);
    let weekday = Weekday::parse(weekday).ok_or_else(invalid)?;

    if ordinal.is_empty() {
        return Ok(WeekdayNum::every(weekday));
    }
    let ordinal = ordinal.parse::<i8>().map_err(|_| {
        ParseError::new(ParseErrorKind::InvalidRRule, line, col)
            .with_context(format!("BYDAY token '{s}' has an invalid position"))
    })?;
    Ok(WeekdayNum::nth(ordinal, weekday))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_basic() {
        let date = parse_date("20260123", 1, 1).unwrap();
        assert_eq!((date.year, date.month, date.day), (2026, 1, 23));
        assert!(date.is_date);
    }

    #[test]
    fn parse_date_invalid() {
        assert!(parse_date("2026012", 1, 1).is_err());
        assert!(parse_date("20261301", 1, 1).is_err());
        assert!(parse_date("20250229", 1, 1).is_err());
        assert!(parse_date("2026-1-1", 1, 1).is_err());
    }

    #[test]
    fn parse_datetime_forms() {
        let dt = parse_datetime("20260123T120000Z", Some("Europe/Paris"), 1, 1).unwrap();
        assert!(dt.is_utc());
        assert_eq!(dt.civil.hour, 12);

        let dt = parse_datetime("20260123T120000", None, 1, 1).unwrap();
        assert!(dt.is_floating());

        let dt = parse_datetime("20260123T120000", Some("America/New_York"), 1, 1).unwrap();
        assert_eq!(dt.tzid(), Some("America/New_York"));

        assert!(parse_datetime("20260123", None, 1, 1).is_err());
        assert!(parse_datetime("20260123T250000", None, 1, 1).is_err());
    }

    #[test]
    fn parse_date_or_datetime_picks_form() {
        assert!(parse_date_or_datetime("20260123", None, 1, 1).unwrap().is_date());
        assert!(!parse_date_or_datetime("20260123T000000", None, 1, 1).unwrap().is_date());
    }

    #[test]
    fn parse_utc_offsets() {
        assert_eq!(parse_utc_offset("+0530", 1, 1).unwrap().as_seconds(), 19_800);
        assert_eq!(parse_utc_offset("-0800", 1, 1).unwrap().as_seconds(), -28_800);
        assert_eq!(parse_utc_offset("-045602", 1, 1).unwrap().as_seconds(), -17_762);
        assert!(parse_utc_offset("0800", 1, 1).is_err());
        assert!(parse_utc_offset("+08", 1, 1).is_err());
        assert!(parse_utc_offset("+0875", 1, 1).is_err());
    }

    #[test]
    fn parse_rrule_basic() {
        let rule = parse_rrule("FREQ=DAILY;COUNT=10", 1, 1).unwrap();
        assert_eq!(rule.frequency, Frequency::Daily);
        assert_eq!(rule.count, Some(10));
        assert_eq!(rule.interval, 1);
        assert_eq!(rule.week_start, Weekday::Monday);
    }

    #[test]
    fn parse_rrule_full() {
        let rule = parse_rrule(
            "FREQ=MONTHLY;INTERVAL=2;UNTIL=20261231T235959Z;WKST=SU;BYDAY=MO,-1FR;BYMONTH=1,6",
            1,
            1,
        )
        .unwrap();
        assert_eq!(rule.interval, 2);
        let until = rule.until.unwrap();
        assert!(until.is_utc);
        assert_eq!(until.time.second, 59);
        assert_eq!(rule.week_start, Weekday::Sunday);
        assert_eq!(
            rule.parts.day,
            vec![
                WeekdayNum::every(Weekday::Monday),
                WeekdayNum::nth(-1, Weekday::Friday)
            ]
        );
        assert_eq!(rule.parts.month, vec![1, 6]);
    }

    #[test]
    fn parse_rrule_accepts_out_of_month_positions() {
        // Rejected later, at iterator initialization.
        let rule = parse_rrule("FREQ=MONTHLY;BYDAY=6MO", 1, 1).unwrap();
        assert_eq!(rule.parts.day[0].position(), 6);
    }

    #[test]
    fn parse_rrule_coerces_interval() {
        assert_eq!(parse_rrule("FREQ=DAILY;INTERVAL=0", 1, 1).unwrap().interval, 1);
    }

    #[test]
    fn parse_rrule_errors_name_token_and_part() {
        let err = parse_rrule("FREQ=FORTNIGHTLY", 2, 7).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidFrequency);
        assert_eq!((err.line, err.column), (2, 7));

        let err = parse_rrule("FREQ=MONTHLY;BYMONTHDAY=1,0", 2, 7).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidRRule);
        assert_eq!((err.line, err.column), (2, 7));
        let context = err.context.unwrap();
        assert!(context.contains("BYMONTHDAY"));
        assert!(context.contains('0'));

        let err = parse_rrule("FREQ=WEEKLY;BYDAY=MO,XX", 1, 1).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidWeekday);
        assert!(err.context.unwrap().contains("XX"));

        let err = parse_rrule("FREQ=YEARLY;BYMONTH=13", 1, 1).unwrap_err();
        assert!(err.context.unwrap().contains("BYMONTH"));

        let err = parse_rrule("COUNT=3", 1, 1).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidRRule);
    }

    #[test]
    fn parse_rrule_with_until_and_count() {
        let rule = parse_rrule("FREQ=DAILY;COUNT=10;UNTIL=20260105", 1, 1).unwrap();
        assert_eq!(rule.count, Some(10));
        assert!(rule.until.is_some());
        assert!(!rule.is_by_count());

        // Whichever bound is hit first ends the rule.
        let start = CivilTime::date(2026, 1, 1);
        let count_of = |rule: &RecurrenceRule| {
            let mut iterator = rule.iterator(start).unwrap();
            let mut emitted = 0;
            while iterator.next_occurrence().unwrap().is_some() {
                emitted += 1;
            }
            emitted
        };
        assert_eq!(count_of(&rule), 5);
        let rule = parse_rrule("UNTIL=20260105;FREQ=DAILY;COUNT=2", 1, 1).unwrap();
        assert_eq!(count_of(&rule), 2);
    }

    #[test]
    fn rule_text_round_trips() {
        let text = "FREQ=YEARLY;INTERVAL=2;COUNT=5;WKST=SU;BYDAY=-1SU;BYMONTH=10";
        let rule: RecurrenceRule = text.parse().unwrap();
        assert_eq!(rule.to_string(), text);
        let reparsed: RecurrenceRule = rule.to_string().parse().unwrap();
        assert_eq!(reparsed, rule);
    }

    #[test]
    fn unescape_text_basic() {
        assert_eq!(unescape_text("hello\\, world"), "hello, world");
        assert_eq!(unescape_text("line1\\nline2"), "line1\nline2");
        assert_eq!(unescape_text("back\\\\slash"), "back\\slash");
        assert_eq!(unescape_text("keep\\x"), "keep\\x");
    }
}

//! iCalendar document parser (RFC 5545).
//!
//! Builds the component tree the recurrence engine reads from. Only the
//! value types the engine consumes are typed; other values stay text.

use super::error::{ParseError, ParseErrorKind, ParseResult};
use super::lexer::{parse_content_line, split_lines};
use super::values::{
    parse_date, parse_date_or_datetime, parse_datetime, parse_integer, parse_rrule,
    parse_utc_offset, unescape_text,
};
use crate::rfc::ical::core::{
    Component, ComponentKind, ContentLine, DateTime, ICalendar, Property, Value,
};

/// Parses an iCalendar document from a string.
///
/// ## Errors
///
/// Returns an error if the input is not valid iCalendar or a typed value
/// (date-time, recurrence rule, UTC offset) is malformed.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse(input: &str) -> ParseResult<ICalendar> {
    tracing::debug!("Parsing iCalendar document");

    let lines = split_lines(input);
    let Some(&(first_line, _)) = lines.first() else {
        tracing::warn!("Empty iCalendar input");
        return Err(ParseError::new(ParseErrorKind::MissingBegin, 1, 1));
    };

    let mut content_lines = lines
        .into_iter()
        .map(|(line_num, line)| parse_content_line(&line, line_num).map(|cl| (line_num, cl)));

    let begin = content_lines
        .next()
        .transpose()?
        .filter(|(_, cl)| cl.name == "BEGIN" && cl.raw_value.eq_ignore_ascii_case("VCALENDAR"))
        .ok_or_else(|| {
            ParseError::new(ParseErrorKind::MissingBegin, first_line, 1)
                .with_context("expected BEGIN:VCALENDAR")
        })?;

    let root = parse_component(&mut content_lines, begin.0, "VCALENDAR")?;
    tracing::debug!(children = root.children.len(), "iCalendar document parsed");

    Ok(ICalendar { root })
}

/// Parses the body of a component whose BEGIN line has been consumed, up to
/// and including its matching END line.
fn parse_component(
    lines: &mut impl Iterator<Item = ParseResult<(usize, ContentLine)>>,
    begin_line: usize,
    name: &str,
) -> ParseResult<Component> {
    let mut component = Component::named(name);
    let mut last_line = begin_line;

    loop {
        let Some(next) = lines.next() else {
            return Err(ParseError::new(ParseErrorKind::MissingEnd, last_line, 1)
                .with_context(format!("missing END:{name}")));
        };
        let (line_num, content_line) = next?;
        last_line = line_num;

        match content_line.name.as_str() {
            "BEGIN" => {
                let nested_name = content_line.raw_value.to_ascii_uppercase();
                let nested = parse_component(lines, line_num, &nested_name)?;
                component.add_child(nested);
            }
            "END" => {
                let end_name = content_line.raw_value.to_ascii_uppercase();
                if end_name != name {
                    return Err(
                        ParseError::new(ParseErrorKind::MismatchedComponent, line_num, 1)
                            .with_context(format!("expected END:{name}, got END:{end_name}")),
                    );
                }
                return Ok(component);
            }
            _ => {
                let property = parse_property(content_line, line_num, component.kind)?;
                component.add_property(property);
            }
        }
    }
}

/// Parses a property from a content line, resolving the value type.
fn parse_property(
    cl: ContentLine,
    line_num: usize,
    parent: Option<ComponentKind>,
) -> ParseResult<Property> {
    let value_type = determine_value_type(&cl, parent);
    let value = parse_value(&cl, value_type, line_num)?;

    Ok(Property {
        name: cl.name,
        params: cl.params,
        value,
        raw_value: cl.raw_value,
    })
}

/// Value types the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueType {
    Date,
    DateTime,
    DateTimeList,
    Integer,
    Period,
    Recur,
    Text,
    UtcOffset,
    Unknown,
}

impl ValueType {
    fn from_param(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "DATE" => Self::Date,
            "DATE-TIME" => Self::DateTime,
            "INTEGER" => Self::Integer,
            "PERIOD" => Self::Period,
            "RECUR" => Self::Recur,
            "TEXT" => Self::Text,
            "UTC-OFFSET" => Self::UtcOffset,
            _ => Self::Unknown,
        }
    }
}

/// Determines the value type for a property.
fn determine_value_type(cl: &ContentLine, parent: Option<ComponentKind>) -> ValueType {
    let is_list = matches!(cl.name.as_str(), "RDATE" | "EXDATE");

    if let Some(explicit) = cl.value_type().map(ValueType::from_param) {
        return match explicit {
            ValueType::Date | ValueType::DateTime if is_list => ValueType::DateTimeList,
            other => other,
        };
    }

    match cl.name.as_str() {
        "DTSTART" | "DTEND" | "DUE" | "RECURRENCE-ID" | "DTSTAMP" | "CREATED"
        | "LAST-MODIFIED" => ValueType::DateTime,
        "RDATE" | "EXDATE" => ValueType::DateTimeList,
        "RRULE" | "EXRULE" => ValueType::Recur,
        "TZOFFSETFROM" | "TZOFFSETTO" => ValueType::UtcOffset,
        "SEQUENCE" | "PRIORITY" | "REPEAT" | "PERCENT-COMPLETE" => ValueType::Integer,
        // TZNAME, TZID, SUMMARY, ... and anything inside observances we don't type
        _ if parent == Some(ComponentKind::Unknown) => ValueType::Unknown,
        _ => ValueType::Text,
    }
}

/// Parses a raw value into a typed [`Value`].
fn parse_value(cl: &ContentLine, value_type: ValueType, line_num: usize) -> ParseResult<Value> {
    let raw = cl.raw_value.as_str();
    let tzid = cl.tzid();
    let col = cl.name.len() + 2;

    Ok(match value_type {
        ValueType::Text => Value::Text(unescape_text(raw)),
        ValueType::Date => Value::DateTime(DateTime::floating(parse_date(raw, line_num, col)?)),
        ValueType::DateTime => Value::DateTime(parse_date_or_datetime(raw, tzid, line_num, col)?),
        ValueType::DateTimeList => Value::DateTimeList(
            raw.split(',')
                .map(|item| parse_date_or_datetime(item.trim(), tzid, line_num, col))
                .collect::<ParseResult<_>>()?,
        ),
        // PERIOD values keep their start; the end or duration is not needed
        // to enumerate occurrences.
        ValueType::Period => Value::DateTimeList(
            raw.split(',')
                .map(|item| {
                    let start = item.split('/').next().unwrap_or(item);
                    parse_datetime(start.trim(), tzid, line_num, col)
                })
                .collect::<ParseResult<_>>()?,
        ),
        ValueType::Integer => Value::Integer(parse_integer(raw, line_num, col)?),
        ValueType::Recur => Value::Recur(Box::new(parse_rrule(raw, line_num, col)?)),
        ValueType::UtcOffset => Value::UtcOffset(parse_utc_offset(raw, line_num, col)?),
        ValueType::Unknown => Value::Unknown(raw.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::core::{CivilTime, Frequency};

    const SIMPLE_VEVENT: &str = "\
BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Test//Test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:test-uid-123@example.com\r\n\
DTSTAMP:20260123T120000Z\r\n\
DTSTART:20260123T140000Z\r\n\
SUMMARY:Test\\, Event\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test_log::test]
    fn parse_simple_vevent() {
        let ical = parse(SIMPLE_VEVENT).unwrap();

        assert_eq!(ical.version(), Some("2.0"));
        assert_eq!(ical.prodid(), Some("-//Test//Test//EN"));

        let events = ical.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].uid(), Some("test-uid-123@example.com"));
        assert_eq!(events[0].summary(), Some("Test, Event"));

        let dtstart = events[0].get_property("DTSTART").unwrap().as_datetime().unwrap();
        assert!(dtstart.is_utc());
        assert_eq!(dtstart.civil, CivilTime::new(2026, 1, 23, 14, 0, 0));
    }

    #[test]
    fn parse_recurrence_properties() {
        let input = "\
BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
DTSTART;TZID=America/New_York:20260105T090000\r\n\
RRULE:FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=10\r\n\
RDATE;VALUE=DATE:20260110,20260111\r\n\
RDATE;VALUE=PERIOD:20260120T090000Z/PT1H\r\n\
EXDATE;TZID=America/New_York:20260107T090000,20260109T090000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let ical = parse(input).unwrap();
        let event = ical.events()[0];

        let dtstart = event.get_property("DTSTART").unwrap().as_datetime().unwrap();
        assert_eq!(dtstart.tzid(), Some("America/New_York"));

        let rule = event.get_property("RRULE").unwrap().as_recur().unwrap();
        assert_eq!(rule.frequency, Frequency::Weekly);
        assert_eq!(rule.count, Some(10));
        assert_eq!(rule.parts.day.len(), 3);

        let rdates = event.get_properties("RDATE");
        assert_eq!(rdates[0].value.datetimes().len(), 2);
        assert!(rdates[0].value.datetimes()[0].is_date());
        assert!(rdates[1].value.datetimes()[0].is_utc());

        let exdates = event.get_property("EXDATE").unwrap().value.datetimes();
        assert_eq!(exdates.len(), 2);
        assert_eq!(exdates[1].tzid(), Some("America/New_York"));
    }

    #[test]
    fn parse_vtimezone_offsets() {
        let input = "\
BEGIN:VCALENDAR\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Test/Zone\r\n\
BEGIN:STANDARD\r\n\
DTSTART:19701101T020000\r\n\
TZOFFSETFROM:-0400\r\n\
TZOFFSETTO:-0500\r\n\
TZNAME:EST\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n\
END:VCALENDAR\r\n";

        let ical = parse(input).unwrap();
        let tz = ical.timezones()[0];
        let standard = tz.children_of_kind(ComponentKind::Standard)[0];
        assert_eq!(
            standard.get_property("TZOFFSETTO").unwrap().as_utc_offset().unwrap().as_seconds(),
            -18_000
        );
        assert_eq!(standard.get_property("TZNAME").unwrap().as_text(), Some("EST"));
    }

    #[test]
    fn parse_keeps_unknown_components_untyped() {
        let input = "\
BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
BEGIN:VALARM\r\n\
TRIGGER:-PT15M\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let ical = parse(input).unwrap();
        let alarm = &ical.events()[0].children[0];
        assert_eq!(alarm.name, "VALARM");
        assert!(alarm.get_property("TRIGGER").unwrap().value.is_unknown());
    }

    #[test]
    fn parse_rejects_bad_rule_with_position() {
        let input = "\
BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
RRULE:FREQ=MONTHLY;BYMONTHDAY=40\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let err = parse(input).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidRRule);
        assert_eq!(err.line, 3);
        assert!(err.context.unwrap().contains("BYMONTHDAY"));
    }

    #[test]
    fn parse_structure_errors() {
        let err = parse("").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingBegin);

        let err = parse("VERSION:2.0\r\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingBegin);

        let err = parse("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VEVENT\r\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MismatchedComponent);

        let err = parse("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingEnd);
        assert_eq!(err.line, 2);
    }
}

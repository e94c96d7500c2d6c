//! Shared iCalendar documents for scenario tests.

use crate::rfc::ical::core::{CivilTime, ICalendar, RecurrenceRule};
use crate::rfc::ical::expand::{RecurrenceIterator, RecurrenceResult};
use crate::rfc::ical::parse::parse;

/// US Eastern time with the 2007 DST rules.
pub const VTIMEZONE_EASTERN: &str = "\
BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Test//Test//EN\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:America/New_York\r\n\
BEGIN:DAYLIGHT\r\n\
DTSTART:20070311T020000\r\n\
TZOFFSETFROM:-0500\r\n\
TZOFFSETTO:-0400\r\n\
RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=2SU\r\n\
TZNAME:EDT\r\n\
END:DAYLIGHT\r\n\
BEGIN:STANDARD\r\n\
DTSTART:20071104T020000\r\n\
TZOFFSETFROM:-0400\r\n\
TZOFFSETTO:-0500\r\n\
RRULE:FREQ=YEARLY;BYMONTH=11;BYDAY=1SU\r\n\
TZNAME:EST\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n\
END:VCALENDAR\r\n";

/// A fixed zone whose single observance is given by RDATEs.
pub const VTIMEZONE_RDATES: &str = "\
BEGIN:VCALENDAR\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Test/Historic\r\n\
BEGIN:STANDARD\r\n\
DTSTART:19700101T000000\r\n\
TZOFFSETFROM:+0100\r\n\
TZOFFSETTO:+0100\r\n\
END:STANDARD\r\n\
BEGIN:DAYLIGHT\r\n\
DTSTART:19800406T020000\r\n\
TZOFFSETFROM:+0100\r\n\
TZOFFSETTO:+0200\r\n\
RDATE:19800406T020000,19810329T020000\r\n\
END:DAYLIGHT\r\n\
BEGIN:STANDARD\r\n\
DTSTART:19800928T030000\r\n\
TZOFFSETFROM:+0200\r\n\
TZOFFSETTO:+0100\r\n\
RDATE:19800928T030000,19810927T030000\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n\
END:VCALENDAR\r\n";

/// A daily event in a zone only its own VTIMEZONE defines, bounded and
/// excepted by UTC values.
pub const HISTORIC_DAILY: &str = "\
BEGIN:VCALENDAR\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Test/Historic\r\n\
BEGIN:STANDARD\r\n\
DTSTART:19700101T000000\r\n\
TZOFFSETFROM:+0100\r\n\
TZOFFSETTO:+0100\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n\
BEGIN:VEVENT\r\n\
UID:historic-daily\r\n\
DTSTART;TZID=Test/Historic:20260101T090000\r\n\
RRULE:FREQ=DAILY;UNTIL=20260105T080000Z\r\n\
EXDATE:20260102T080000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

/// A weekly meeting with an exception and an extra date.
pub const WEEKLY_MEETING: &str = "\
BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Test//Test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:weekly@example.com\r\n\
DTSTAMP:20260101T000000Z\r\n\
DTSTART;TZID=America/New_York:20260105T090000\r\n\
RRULE:FREQ=WEEKLY;BYDAY=MO;COUNT=4\r\n\
EXDATE;TZID=America/New_York:20260112T090000\r\n\
RDATE;TZID=America/New_York:20260114T090000\r\n\
SUMMARY:Standup\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

pub fn parse_fixture(input: &str) -> ICalendar {
    parse(input).expect("fixture parses")
}

pub fn iterator(rule: &str, start: CivilTime) -> RecurrenceIterator {
    rule.parse::<RecurrenceRule>()
        .expect("rule parses")
        .iterator(start)
        .expect("iterator initializes")
}

pub fn take(iterator: &mut RecurrenceIterator, count: usize) -> Vec<CivilTime> {
    iterator
        .take(count)
        .collect::<RecurrenceResult<Vec<_>>>()
        .expect("iteration succeeds")
}

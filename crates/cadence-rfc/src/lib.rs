//! RFC 5545 recurrence engine: iCalendar data model, parser, RRULE expansion
//! and VTIMEZONE offset lookup.

pub mod error;
pub mod rfc;

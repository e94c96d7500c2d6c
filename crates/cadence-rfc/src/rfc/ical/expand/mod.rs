//! Recurrence expansion and time-zone resolution.
//!
//! - [`RecurrenceIterator`] walks the occurrences of one RRULE.
//! - [`RecurrenceSetExpander`] merges rules, RDATEs and EXDATEs of a component.
//! - [`TimeZoneTransitionIndex`] answers UTC offsets from a VTIMEZONE.
//! - [`TimeZoneResolver`] picks a VTIMEZONE index or an IANA zone by TZID.

mod error;
mod iterator;
mod set;
mod timezone;
mod vtimezone;
mod year_days;

pub use error::{RecurrenceError, RecurrenceResult, TimezoneError, TimezoneResult};
pub use iterator::{RecurrenceIterator, RecurrenceIteratorState, STATE_VERSION};
pub use set::{RecurrenceSetExpander, RecurrenceSetOptions, RecurrenceSetState, RuleCursorState};
pub use timezone::{TimeZoneResolver, convert_to_utc, normalize_tzid};
pub use vtimezone::{Change, Observance, TimeZoneTransitionIndex};

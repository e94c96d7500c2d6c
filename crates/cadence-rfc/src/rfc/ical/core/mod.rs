//! iCalendar core models (RFC 5545).
//!
//! The data model the recurrence engine reads from: components, properties,
//! typed values, the civil time arithmetic type and the recurrence rule.

mod civil;
mod component;
mod datetime;
mod parameter;
mod property;
mod rrule;
mod value;

pub use civil::CivilTime;
pub use component::{Component, ComponentKind, ICalendar};
pub use datetime::{DateTime, DateTimeForm, UtcOffset};
pub use parameter::Parameter;
pub use property::{ContentLine, Property};
pub use rrule::{
    BY_PART_COUNT, ByPart, ByParts, Frequency, RecurrenceRule, Until, Weekday, WeekdayNum,
};
pub use value::Value;

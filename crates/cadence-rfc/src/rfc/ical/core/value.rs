//! Typed property values (RFC 5545 §3.3).

use super::{DateTime, RecurrenceRule, UtcOffset};

/// The parsed value of a property.
///
/// Only the value types the recurrence engine reads are typed; everything
/// else is kept as text or left unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// TEXT value (unescaped).
    Text(String),
    /// INTEGER value.
    Integer(i32),
    /// DATE or DATE-TIME value.
    DateTime(DateTime),
    /// Comma-separated DATE or DATE-TIME list (RDATE, EXDATE). PERIOD
    /// entries keep their start only.
    DateTimeList(Vec<DateTime>),
    /// RECUR value.
    Recur(Box<RecurrenceRule>),
    /// UTC-OFFSET value.
    UtcOffset(UtcOffset),
    /// Unknown or unparsed value.
    Unknown(String),
}

impl Value {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTime> {
        match self {
            Self::DateTime(dt) => Some(dt),
            Self::DateTimeList(list) => list.first(),
            _ => None,
        }
    }

    /// Returns every date-time carried by this value, single or list.
    #[must_use]
    pub fn datetimes(&self) -> &[DateTime] {
        match self {
            Self::DateTime(dt) => std::slice::from_ref(dt),
            Self::DateTimeList(list) => list,
            _ => &[],
        }
    }

    #[must_use]
    pub fn as_recur(&self) -> Option<&RecurrenceRule> {
        match self {
            Self::Recur(r) => Some(r),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_utc_offset(&self) -> Option<UtcOffset> {
        match self {
            Self::UtcOffset(o) => Some(*o),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::core::CivilTime;

    #[test]
    fn datetimes_covers_single_and_list() {
        let a = DateTime::floating(CivilTime::date(2026, 1, 1));
        let b = DateTime::floating(CivilTime::date(2026, 1, 2));
        assert_eq!(Value::DateTime(a.clone()).datetimes().len(), 1);
        let list = Value::DateTimeList(vec![a.clone(), b]);
        assert_eq!(list.datetimes().len(), 2);
        assert_eq!(list.as_datetime(), Some(&a));
        assert!(Value::Text("x".into()).datetimes().is_empty());
    }
}

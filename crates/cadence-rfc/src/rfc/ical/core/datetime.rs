//! iCalendar DATE, DATE-TIME and UTC-OFFSET value types (RFC 5545 §3.3.4, §3.3.5, §3.3.14).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CivilTime;

/// UTC offset representation (e.g., +0530, -0800).
///
/// Stored as total seconds from UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UtcOffset {
    /// Total seconds from UTC (positive = east, negative = west).
    seconds: i32,
}

impl UtcOffset {
    /// UTC offset (zero).
    pub const UTC: Self = Self { seconds: 0 };

    #[must_use]
    pub const fn from_seconds(seconds: i32) -> Self {
        Self { seconds }
    }

    #[must_use]
    pub const fn as_seconds(self) -> i32 {
        self.seconds
    }

    /// Returns hours component (may be negative).
    #[must_use]
    pub const fn hours(self) -> i32 {
        self.seconds / 3600
    }

    /// Returns minutes component (always positive).
    #[must_use]
    pub const fn minutes(self) -> i32 {
        (self.seconds.abs() % 3600) / 60
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.seconds >= 0 { '+' } else { '-' };
        let abs = self.seconds.abs();
        write!(f, "{sign}{:02}{:02}", abs / 3600, (abs % 3600) / 60)?;
        if abs % 60 != 0 {
            write!(f, "{:02}", abs % 60)?;
        }
        Ok(())
    }
}

/// How a DATE-TIME value is anchored (RFC 5545 §3.3.5).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateTimeForm {
    /// Local time with no zone.
    #[default]
    Floating,
    /// UTC time (`Z` suffix).
    Utc,
    /// Local time in the named zone (`TZID` parameter).
    Zoned { tzid: String },
}

/// A parsed DATE or DATE-TIME value with its anchoring.
///
/// DATE values carry `civil.is_date = true` and are never UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTime {
    pub civil: CivilTime,
    pub form: DateTimeForm,
}

impl DateTime {
    #[must_use]
    pub const fn floating(civil: CivilTime) -> Self {
        Self {
            civil,
            form: DateTimeForm::Floating,
        }
    }

    #[must_use]
    pub const fn utc(civil: CivilTime) -> Self {
        Self {
            civil,
            form: DateTimeForm::Utc,
        }
    }

    #[must_use]
    pub fn zoned(civil: CivilTime, tzid: impl Into<String>) -> Self {
        Self {
            civil,
            form: DateTimeForm::Zoned { tzid: tzid.into() },
        }
    }

    #[must_use]
    pub const fn is_utc(&self) -> bool {
        matches!(self.form, DateTimeForm::Utc)
    }

    #[must_use]
    pub const fn is_floating(&self) -> bool {
        matches!(self.form, DateTimeForm::Floating)
    }

    #[must_use]
    pub const fn is_date(&self) -> bool {
        self.civil.is_date
    }

    /// Returns the TZID if this is a zoned value.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        match &self.form {
            DateTimeForm::Zoned { tzid } => Some(tzid),
            _ => None,
        }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.civil)?;
        if self.is_utc() && !self.civil.is_date {
            write!(f, "Z")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_display() {
        assert_eq!(UtcOffset::from_seconds(-18_000).to_string(), "-0500");
        assert_eq!(UtcOffset::from_seconds(19_800).to_string(), "+0530");
        assert_eq!(UtcOffset::from_seconds(-17_762).to_string(), "-045602");
        assert_eq!(UtcOffset::UTC.to_string(), "+0000");
    }

    #[test]
    fn offset_components() {
        let offset = UtcOffset::from_seconds(-28_800);
        assert_eq!(offset.hours(), -8);
        assert_eq!(offset.minutes(), 0);
    }

    #[test]
    fn datetime_forms() {
        let civil = CivilTime::new(2026, 1, 23, 12, 0, 0);
        assert!(DateTime::utc(civil).is_utc());
        assert!(DateTime::floating(civil).is_floating());
        let zoned = DateTime::zoned(civil, "America/New_York");
        assert_eq!(zoned.tzid(), Some("America/New_York"));
        assert_eq!(DateTime::utc(civil).to_string(), "20260123T120000Z");
        assert_eq!(DateTime::floating(CivilTime::date(2026, 1, 23)).to_string(), "20260123");
    }
}

//! iCalendar property and content line types (RFC 5545 §3.1, §3.8).

use super::{DateTime, Parameter, RecurrenceRule, UtcOffset, Value};

/// A raw content line before value type resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    /// Property name (normalized to uppercase).
    pub name: String,
    pub params: Vec<Parameter>,
    /// Raw value string (after unfolding, before unescaping).
    pub raw_value: String,
}

impl ContentLine {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            raw_value: value.into(),
        }
    }

    #[must_use]
    pub fn get_param_value(&self, name: &str) -> Option<&str> {
        find_param(&self.params, name)?.value()
    }

    /// Returns the VALUE parameter if present.
    #[must_use]
    pub fn value_type(&self) -> Option<&str> {
        self.get_param_value("VALUE")
    }

    /// Returns the TZID parameter if present.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.get_param_value("TZID")
    }
}

fn find_param<'a>(params: &'a [Parameter], name: &str) -> Option<&'a Parameter> {
    params.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// A fully parsed iCalendar property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property name (normalized to uppercase).
    pub name: String,
    pub params: Vec<Parameter>,
    pub value: Value,
    /// Original raw value string.
    pub raw_value: String,
}

impl Property {
    /// Creates a property with a text value.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            value: Value::Text(value.clone()),
            raw_value: value,
        }
    }

    /// Creates a date or date-time property; zoned values get a TZID parameter.
    #[must_use]
    pub fn datetime(name: impl Into<String>, dt: DateTime) -> Self {
        let mut params = Vec::new();
        if dt.is_date() {
            params.push(Parameter::value_type("DATE"));
        }
        if let Some(tzid) = dt.tzid() {
            params.push(Parameter::tzid(tzid));
        }
        Self {
            name: name.into().to_ascii_uppercase(),
            params,
            raw_value: dt.to_string(),
            value: Value::DateTime(dt),
        }
    }

    /// Creates a RRULE/EXRULE property.
    #[must_use]
    pub fn recur(name: impl Into<String>, rule: RecurrenceRule) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            raw_value: rule.to_string(),
            value: Value::Recur(Box::new(rule)),
        }
    }

    /// Creates a TZOFFSETFROM/TZOFFSETTO property.
    #[must_use]
    pub fn utc_offset(name: impl Into<String>, offset: UtcOffset) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            raw_value: offset.to_string(),
            value: Value::UtcOffset(offset),
        }
    }

    #[must_use]
    pub fn get_param_value(&self, name: &str) -> Option<&str> {
        find_param(&self.params, name)?.value()
    }

    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.get_param_value("TZID")
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        self.value.as_text()
    }

    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTime> {
        self.value.as_datetime()
    }

    #[must_use]
    pub fn as_recur(&self) -> Option<&RecurrenceRule> {
        self.value.as_recur()
    }

    #[must_use]
    pub fn as_utc_offset(&self) -> Option<UtcOffset> {
        self.value.as_utc_offset()
    }
}

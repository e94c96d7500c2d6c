//! Recurrence rule value type (RFC 5545 §3.3.10, §3.8.5.3).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CivilTime;
use crate::rfc::ical::expand::{RecurrenceIterator, RecurrenceResult};
use crate::rfc::ical::parse::{ParseError, ParseErrorKind, ParseResult, parse_rrule};

/// Recurrence frequency (RFC 5545 §3.3.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Secondly => "SECONDLY",
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    /// Parses a frequency from a string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "SECONDLY" => Self::Secondly,
            "MINUTELY" => Self::Minutely,
            "HOURLY" => Self::Hourly,
            "DAILY" => Self::Daily,
            "WEEKLY" => Self::Weekly,
            "MONTHLY" => Self::Monthly,
            "YEARLY" => Self::Yearly,
            _ => return None,
        })
    }

    /// Row index into the frequency × by-part expansion table.
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Secondly => 0,
            Self::Minutely => 1,
            Self::Hourly => 2,
            Self::Daily => 3,
            Self::Weekly => 4,
            Self::Monthly => 5,
            Self::Yearly => 6,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Day of the week, numbered Sunday = 1 through Saturday = 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    /// Returns the two-letter abbreviation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sunday => "SU",
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
            Self::Saturday => "SA",
        }
    }

    /// Parses a weekday from a two-letter abbreviation (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "SU" => Self::Sunday,
            "MO" => Self::Monday,
            "TU" => Self::Tuesday,
            "WE" => Self::Wednesday,
            "TH" => Self::Thursday,
            "FR" => Self::Friday,
            "SA" => Self::Saturday,
            _ => return None,
        })
    }

    /// Returns the Sunday-based number (1..=7).
    #[must_use]
    pub const fn number(self) -> i32 {
        match self {
            Self::Sunday => 1,
            Self::Monday => 2,
            Self::Tuesday => 3,
            Self::Wednesday => 4,
            Self::Thursday => 5,
            Self::Friday => 6,
            Self::Saturday => 7,
        }
    }

    /// Maps a Sunday-based number back to a weekday, wrapping modulo 7.
    #[must_use]
    pub const fn from_number(number: i32) -> Self {
        match (number - 1).rem_euclid(7) {
            0 => Self::Sunday,
            1 => Self::Monday,
            2 => Self::Tuesday,
            3 => Self::Wednesday,
            4 => Self::Thursday,
            5 => Self::Friday,
            _ => Self::Saturday,
        }
    }

    /// Returns this weekday's position (1..=7) in a week beginning on `week_start`.
    #[must_use]
    pub const fn relative_to(self, week_start: Self) -> i32 {
        (self.number() - week_start.number()).rem_euclid(7) + 1
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Weekday with optional occurrence number, as used in BYDAY.
///
/// - `MO` - every Monday
/// - `1MO` - first Monday of the month/year
/// - `-1FR` - last Friday of the month/year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayNum {
    /// Optional occurrence number (-53 to 53, excluding 0).
    pub ordinal: Option<i8>,
    /// The day of the week.
    pub weekday: Weekday,
}

impl WeekdayNum {
    /// Creates a weekday occurrence without an ordinal.
    #[must_use]
    pub const fn every(weekday: Weekday) -> Self {
        Self {
            ordinal: None,
            weekday,
        }
    }

    /// Creates a weekday occurrence with an ordinal.
    #[must_use]
    pub const fn nth(ordinal: i8, weekday: Weekday) -> Self {
        Self {
            ordinal: Some(ordinal),
            weekday,
        }
    }

    /// Returns the ordinal as a position, 0 meaning "every".
    #[must_use]
    pub fn position(self) -> i32 {
        self.ordinal.map_or(0, i32::from)
    }
}

impl fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ordinal) = self.ordinal {
            write!(f, "{ordinal}")?;
        }
        write!(f, "{}", self.weekday)
    }
}

/// The by-part kinds a rule can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByPart {
    Second,
    Minute,
    Hour,
    Day,
    MonthDay,
    YearDay,
    WeekNo,
    Month,
    SetPos,
}

/// Number of by-part kinds.
pub const BY_PART_COUNT: usize = 9;

impl ByPart {
    /// All kinds, in canonical serialization order.
    pub const ALL: [Self; BY_PART_COUNT] = [
        Self::Second,
        Self::Minute,
        Self::Hour,
        Self::Day,
        Self::MonthDay,
        Self::YearDay,
        Self::WeekNo,
        Self::Month,
        Self::SetPos,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Second => 0,
            Self::Minute => 1,
            Self::Hour => 2,
            Self::Day => 3,
            Self::MonthDay => 4,
            Self::YearDay => 5,
            Self::WeekNo => 6,
            Self::Month => 7,
            Self::SetPos => 8,
        }
    }

    /// Returns the rule-part name (e.g. `BYMONTHDAY`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Second => "BYSECOND",
            Self::Minute => "BYMINUTE",
            Self::Hour => "BYHOUR",
            Self::Day => "BYDAY",
            Self::MonthDay => "BYMONTHDAY",
            Self::YearDay => "BYYEARDAY",
            Self::WeekNo => "BYWEEKNO",
            Self::Month => "BYMONTH",
            Self::SetPos => "BYSETPOS",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|part| part.as_str().eq_ignore_ascii_case(s))
    }

    /// Returns the inclusive range of magnitudes a numeric value may take and
    /// whether negative values are allowed. Zero is never valid for signed parts.
    const fn bounds(self) -> (i32, i32, bool) {
        match self {
            Self::Second => (0, 60, false),
            Self::Minute => (0, 59, false),
            Self::Hour => (0, 23, false),
            Self::Day | Self::WeekNo => (1, 53, true),
            Self::MonthDay => (1, 31, true),
            Self::YearDay | Self::SetPos => (1, 366, true),
            Self::Month => (1, 12, false),
        }
    }

    /// Returns whether `value` is acceptable for this part.
    #[must_use]
    pub fn accepts(self, value: i32) -> bool {
        let (min, max, signed) = self.bounds();
        (min..=max).contains(&value) || (signed && (min..=max).contains(&-value))
    }

    /// ## Summary
    /// Validates every value for this part.
    ///
    /// ## Errors
    /// Returns `InvalidRRule` naming the first offending token and the part.
    pub fn validate(self, values: &[i32]) -> ParseResult<()> {
        match values.iter().find(|&&value| !self.accepts(value)) {
            Some(value) => Err(ParseError::new(ParseErrorKind::InvalidRRule, 1, 1)
                .with_context(format!("{} value '{value}' is out of range", self.as_str()))),
            None => Ok(()),
        }
    }
}

impl fmt::Display for ByPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The by-part constraint lists of a rule, one slot per [`ByPart`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByParts {
    pub second: Vec<i32>,
    pub minute: Vec<i32>,
    pub hour: Vec<i32>,
    pub day: Vec<WeekdayNum>,
    pub month_day: Vec<i32>,
    pub year_day: Vec<i32>,
    pub week_no: Vec<i32>,
    pub month: Vec<i32>,
    pub set_pos: Vec<i32>,
}

impl ByParts {
    /// Returns the numeric values of a part; BYDAY has none.
    #[must_use]
    pub fn numeric(&self, part: ByPart) -> &[i32] {
        match part {
            ByPart::Second => &self.second,
            ByPart::Minute => &self.minute,
            ByPart::Hour => &self.hour,
            ByPart::Day => &[],
            ByPart::MonthDay => &self.month_day,
            ByPart::YearDay => &self.year_day,
            ByPart::WeekNo => &self.week_no,
            ByPart::Month => &self.month,
            ByPart::SetPos => &self.set_pos,
        }
    }

    /// Returns the numeric slot of a part for mutation; `None` for BYDAY.
    pub fn numeric_mut(&mut self, part: ByPart) -> Option<&mut Vec<i32>> {
        match part {
            ByPart::Second => Some(&mut self.second),
            ByPart::Minute => Some(&mut self.minute),
            ByPart::Hour => Some(&mut self.hour),
            ByPart::Day => None,
            ByPart::MonthDay => Some(&mut self.month_day),
            ByPart::YearDay => Some(&mut self.year_day),
            ByPart::WeekNo => Some(&mut self.week_no),
            ByPart::Month => Some(&mut self.month),
            ByPart::SetPos => Some(&mut self.set_pos),
        }
    }

    /// Returns the number of values held for a part.
    #[must_use]
    pub fn len(&self, part: ByPart) -> usize {
        match part {
            ByPart::Day => self.day.len(),
            _ => self.numeric(part).len(),
        }
    }

    #[must_use]
    pub fn has(&self, part: ByPart) -> bool {
        self.len(part) > 0
    }

    /// Returns whether no part holds any value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        ByPart::ALL.iter().all(|&part| !self.has(part))
    }

    fn write_part(&self, f: &mut fmt::Formatter<'_>, part: ByPart) -> fmt::Result {
        if !self.has(part) {
            return Ok(());
        }
        write!(f, ";{part}=")?;
        if part == ByPart::Day {
            let tokens: Vec<String> = self.day.iter().map(ToString::to_string).collect();
            write!(f, "{}", tokens.join(","))
        } else {
            let values: Vec<String> = self.numeric(part).iter().map(ToString::to_string).collect();
            write!(f, "{}", values.join(","))
        }
    }
}

/// The terminal UNTIL bound of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Until {
    pub time: CivilTime,
    /// Set when the value carried the `Z` suffix.
    pub is_utc: bool,
}

impl fmt::Display for Until {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time)?;
        if self.is_utc && !self.time.is_date {
            write!(f, "Z")?;
        }
        Ok(())
    }
}

/// A parsed RRULE/EXRULE value.
///
/// The rule is plain data; illegal by-part combinations are only rejected
/// when an iterator is initialized from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: i32,
    pub week_start: Weekday,
    pub until: Option<Until>,
    pub count: Option<u32>,
    pub parts: ByParts,
}

impl RecurrenceRule {
    /// Creates a rule with the given frequency and RFC defaults.
    #[must_use]
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            week_start: Weekday::Monday,
            until: None,
            count: None,
            parts: ByParts::default(),
        }
    }

    /// Sets the interval; values below 1 are coerced to 1.
    #[must_use]
    pub fn with_interval(mut self, interval: i32) -> Self {
        self.interval = interval.max(1);
        self
    }

    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub fn with_until(mut self, time: CivilTime, is_utc: bool) -> Self {
        self.until = Some(Until { time, is_utc });
        self
    }

    #[must_use]
    pub fn with_week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }

    /// ## Summary
    /// Sets the BYDAY tokens.
    ///
    /// ## Errors
    /// Returns `InvalidRRule` if an ordinal is zero or exceeds 53 in magnitude.
    pub fn with_by_day(mut self, days: Vec<WeekdayNum>) -> ParseResult<Self> {
        let positions: Vec<i32> = days.iter().filter_map(|d| d.ordinal).map(i32::from).collect();
        ByPart::Day.validate(&positions)?;
        self.parts.day = days;
        Ok(self)
    }

    /// ## Summary
    /// Sets the values of a numeric by-part after range validation.
    ///
    /// ## Errors
    /// Returns `InvalidRRule` naming the offending value and part; BYDAY must
    /// be set through [`Self::with_by_day`].
    pub fn with_part(mut self, part: ByPart, values: Vec<i32>) -> ParseResult<Self> {
        part.validate(&values)?;
        let slot = self.parts.numeric_mut(part).ok_or_else(|| {
            ParseError::new(ParseErrorKind::InvalidRRule, 1, 1)
                .with_context("BYDAY takes weekday tokens, not numbers")
        })?;
        *slot = values;
        Ok(self)
    }

    /// Returns whether the rule is bounded by COUNT or UNTIL.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.count.is_some() || self.until.is_some()
    }

    /// Returns whether the rule is bounded by COUNT alone.
    #[must_use]
    pub const fn is_by_count(&self) -> bool {
        self.count.is_some() && self.until.is_none()
    }

    /// ## Summary
    /// Creates an occurrence iterator for this rule anchored at `start`.
    ///
    /// ## Errors
    /// Returns `MalformedRule` if the rule's by-parts cannot be combined.
    pub fn iterator(&self, start: CivilTime) -> RecurrenceResult<RecurrenceIterator> {
        RecurrenceIterator::new(self.clone(), start)
    }
}

impl FromStr for RecurrenceRule {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rrule(s, 1, 1)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency)?;
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if let Some(until) = &self.until {
            write!(f, ";UNTIL={until}")?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={count}")?;
        }
        if self.week_start != Weekday::Monday {
            write!(f, ";WKST={}", self.week_start)?;
        }
        for part in ByPart::ALL {
            self.parts.write_part(f, part)?;
        }
        Ok(())
    }
}

//! Occurrence iterator for a single recurrence rule.
//!
//! The iterator keeps a cursor (`last`) and advances it field by field, from
//! seconds up to years, the way the rule's frequency dictates. By-parts that
//! expand a period are stepped through as lists; by-parts that contract it are
//! checked against each candidate after it has been produced.

use serde::{Deserialize, Serialize};

use crate::rfc::ical::core::{
    BY_PART_COUNT, ByPart, ByParts, CivilTime, Frequency, RecurrenceRule, WeekdayNum,
};

use super::year_days::{expand_year_days, normalize_month_days};
use super::{RecurrenceError, RecurrenceResult};

/// Snapshot format written by [`RecurrenceIterator::state`].
pub const STATE_VERSION: u32 = 1;

/// Last calendar year the iterator searches before giving up.
const MAX_YEAR: i32 = 20_000;

/// Months searched for a satisfiable BYDAY/BYMONTHDAY pairing.
const MONTH_SEARCH_LIMIT: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expansion {
    Contract,
    Expand,
    Illegal,
}

/// Frequency (rows, SECONDLY..YEARLY) by by-part slot (columns, BYSECOND..BYMONTH).
const EXPANSION: [[Expansion; 8]; 7] = {
    use Expansion::{Contract as C, Expand as E, Illegal as I};
    [
        [C, C, C, C, C, C, C, C],
        [E, C, C, C, C, C, C, C],
        [E, E, C, C, C, C, C, C],
        [E, E, E, C, C, C, C, C],
        [E, E, E, E, I, I, C, C],
        [E, E, E, E, E, I, I, C],
        [E, E, E, E, E, E, E, E],
    ]
};

/// Classification of `part` for `frequency`; `None` for BYSETPOS.
fn expansion(frequency: Frequency, part: ByPart) -> Option<Expansion> {
    EXPANSION
        .get(frequency.index())
        .and_then(|row| row.get(part.index()))
        .copied()
}

fn malformed(message: impl Into<String>) -> RecurrenceError {
    RecurrenceError::MalformedRule(message.into())
}

/// Serializable snapshot of a [`RecurrenceIterator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceIteratorState {
    pub version: u32,
    pub rule: RecurrenceRule,
    pub start: CivilTime,
    pub last: CivilTime,
    pub by_data: ByParts,
    pub by_indices: [usize; BY_PART_COUNT],
    pub days: Vec<i32>,
    pub days_index: usize,
    pub occurrence_count: u32,
    pub completed: bool,
    pub initialized: bool,
}

/// Lazily produces the occurrences of one [`RecurrenceRule`] in ascending order.
///
/// The sequence is finite when the rule has COUNT or UNTIL; otherwise the
/// caller decides when to stop pulling.
#[derive(Debug, Clone)]
pub struct RecurrenceIterator {
    rule: RecurrenceRule,
    start: CivilTime,
    last: CivilTime,
    by_data: ByParts,
    by_indices: [usize; BY_PART_COUNT],
    days: Vec<i32>,
    days_index: usize,
    occurrence_count: u32,
    completed: bool,
    initialized: bool,
}

impl RecurrenceIterator {
    /// ## Summary
    /// Creates an iterator for `rule` anchored at `start` and positions the
    /// cursor on the first candidate.
    ///
    /// ## Errors
    /// Returns [`RecurrenceError::MalformedRule`] if the by-parts cannot be
    /// combined for the rule's frequency or can never be satisfied.
    pub fn new(rule: RecurrenceRule, start: CivilTime) -> RecurrenceResult<Self> {
        let start = start.normalized();
        let mut iterator = Self {
            by_data: rule.parts.clone(),
            rule,
            start,
            last: start,
            by_indices: [0; BY_PART_COUNT],
            days: Vec::new(),
            days_index: 0,
            occurrence_count: 0,
            completed: false,
            initialized: false,
        };
        iterator.init()?;
        Ok(iterator)
    }

    /// ## Summary
    /// Rebuilds an iterator from a snapshot. Initialization is skipped when the
    /// snapshot was taken from an initialized iterator.
    ///
    /// ## Errors
    /// Returns [`RecurrenceError::UnsupportedStateVersion`] for snapshots of
    /// another format, or the initialization error for uninitialized ones.
    pub fn from_state(state: RecurrenceIteratorState) -> RecurrenceResult<Self> {
        if state.version != STATE_VERSION {
            return Err(RecurrenceError::UnsupportedStateVersion {
                found: state.version,
                expected: STATE_VERSION,
            });
        }
        let mut iterator = Self {
            rule: state.rule,
            start: state.start,
            last: state.last,
            by_data: state.by_data,
            by_indices: state.by_indices,
            days: state.days,
            days_index: state.days_index,
            occurrence_count: state.occurrence_count,
            completed: state.completed,
            initialized: state.initialized,
        };
        if !iterator.initialized {
            iterator.by_data = iterator.rule.parts.clone();
            iterator.init()?;
        }
        Ok(iterator)
    }

    #[must_use]
    pub fn state(&self) -> RecurrenceIteratorState {
        RecurrenceIteratorState {
            version: STATE_VERSION,
            rule: self.rule.clone(),
            start: self.start,
            last: self.last,
            by_data: self.by_data.clone(),
            by_indices: self.by_indices,
            days: self.days.clone(),
            days_index: self.days_index,
            occurrence_count: self.occurrence_count,
            completed: self.completed,
            initialized: self.initialized,
        }
    }

    #[must_use]
    pub fn rule(&self) -> &RecurrenceRule {
        &self.rule
    }

    #[must_use]
    pub fn start(&self) -> CivilTime {
        self.start
    }

    /// The cursor: the last emitted occurrence, or the first candidate before any.
    #[must_use]
    pub fn last(&self) -> CivilTime {
        self.last
    }

    #[must_use]
    pub fn occurrence_count(&self) -> u32 {
        self.occurrence_count
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// ## Summary
    /// Produces the next occurrence, or `None` once the rule is exhausted.
    ///
    /// ## Errors
    /// Returns [`RecurrenceError::InvariantViolation`] if stepping yields the
    /// same instant twice, or [`RecurrenceError::MalformedRule`] if a monthly
    /// BYDAY/BYMONTHDAY pairing turns out to be unsatisfiable. The iterator is
    /// completed after any error.
    pub fn next_occurrence(&mut self) -> RecurrenceResult<Option<CivilTime>> {
        let result = self.advance();
        if result.is_err() {
            self.completed = true;
        }
        result
    }

    fn advance(&mut self) -> RecurrenceResult<Option<CivilTime>> {
        if self.completed {
            return Ok(None);
        }
        let count_reached = self
            .rule
            .count
            .is_some_and(|count| self.occurrence_count >= count);
        if count_reached || self.past_until(&self.last) {
            self.completed = true;
            return Ok(None);
        }

        if self.occurrence_count == 0 && self.last >= self.start {
            return Ok(Some(self.emit()));
        }

        let before = self.last;
        if !self.step()? {
            return Ok(None);
        }
        if self.last == before {
            if !self.step()? {
                return Ok(None);
            }
            if self.last == before {
                return Err(RecurrenceError::InvariantViolation(
                    "Same occurrence found twice",
                ));
            }
        }
        Ok(Some(self.emit()))
    }

    fn emit(&mut self) -> CivilTime {
        self.occurrence_count += 1;
        tracing::trace!(
            occurrence = %self.last,
            count = self.occurrence_count,
            "Recurrence occurrence"
        );
        self.last
    }

    // Initialization

    fn init(&mut self) -> RecurrenceResult<()> {
        self.initialized = true;
        self.last = self.start;
        self.validate_parts()?;
        self.sort_by_data();

        self.last.second =
            self.setup_default(ByPart::Second, Frequency::Secondly, self.start.second);
        self.last.minute =
            self.setup_default(ByPart::Minute, Frequency::Minutely, self.start.minute);
        self.last.hour = self.setup_default(ByPart::Hour, Frequency::Hourly, self.start.hour);
        self.last.day = self.setup_default(ByPart::MonthDay, Frequency::Daily, self.start.day);
        self.last.month = self.setup_default(ByPart::Month, Frequency::Monthly, self.start.month);

        match self.rule.frequency {
            Frequency::Weekly => self.init_weekly(),
            Frequency::Monthly => self.init_monthly()?,
            Frequency::Yearly => self.init_yearly(),
            Frequency::Secondly | Frequency::Minutely | Frequency::Hourly | Frequency::Daily => {}
        }
        self.last.normalize();

        tracing::debug!(
            rule = %self.rule,
            start = %self.start,
            first = %self.last,
            "Recurrence iterator initialized"
        );
        Ok(())
    }

    fn validate_parts(&self) -> RecurrenceResult<()> {
        let parts = &self.rule.parts;
        let frequency = self.rule.frequency;

        if parts.has(ByPart::YearDay)
            && [ByPart::Month, ByPart::WeekNo, ByPart::MonthDay, ByPart::Day]
                .into_iter()
                .any(|part| parts.has(part))
        {
            return Err(malformed("Invalid BYYEARDAY rule"));
        }
        if parts.has(ByPart::WeekNo) && parts.has(ByPart::MonthDay) {
            return Err(malformed("BYWEEKNO does not fit to BYMONTHDAY"));
        }
        for part in ByPart::ALL {
            if parts.has(part) && expansion(frequency, part) == Some(Expansion::Illegal) {
                return Err(malformed(format!(
                    "{part} may not appear in {frequency} rules"
                )));
            }
        }
        if frequency != Frequency::Yearly && parts.has(ByPart::YearDay) {
            return Err(malformed("BYYEARDAY may only appear in YEARLY rules"));
        }
        Ok(())
    }

    fn sort_by_data(&mut self) {
        let week_start = self.rule.week_start;
        self.by_data
            .day
            .sort_by_key(|token| token.weekday.relative_to(week_start));
        for part in [ByPart::Second, ByPart::Minute, ByPart::Hour, ByPart::Month] {
            if let Some(values) = self.by_data.numeric_mut(part) {
                values.sort_unstable();
                values.dedup();
            }
        }
    }

    /// Seeds a non-contracting by-part from `default` and returns the cursor value for it.
    fn setup_default(&mut self, part: ByPart, natural: Frequency, default: i32) -> i32 {
        let frequency = self.rule.frequency;
        if expansion(frequency, part) == Some(Expansion::Contract) {
            return default;
        }
        let Some(values) = self.by_data.numeric_mut(part) else {
            return default;
        };
        if values.is_empty() {
            values.push(default);
        }
        if frequency == natural {
            default
        } else {
            values.first().copied().unwrap_or(default)
        }
    }

    fn init_weekly(&mut self) {
        let week_start = self.rule.week_start;
        let Some(first) = self.by_data.day.first().copied() else {
            self.by_data.day.push(WeekdayNum::every(self.start.weekday()));
            return;
        };
        let wanted = first.weekday.relative_to(week_start);
        let current = self.last.day_of_week(week_start);
        self.last.day += wanted - current;
    }

    fn init_monthly(&mut self) -> RecurrenceResult<()> {
        if self.rule.parts.has(ByPart::Day) {
            self.init_monthly_by_day()?;
            if self.rule.parts.has(ByPart::MonthDay) {
                self.by_day_and_month_day(true)?;
            }
            if !self.day_fits_month(self.last.day) {
                return Err(malformed("Malformed values in BYDAY part"));
            }
        } else if self.rule.parts.has(ByPart::MonthDay) {
            // Resolve against the start month before any normalization can move it.
            self.last.day = 1;
            let start_day = self.start.day;
            match self.month_days().into_iter().find(|&day| day >= start_day) {
                Some(day) => self.last.day = day,
                None => self.advance_to_month_with_month_day()?,
            }
        } else {
            self.last.day = self.start.day;
        }
        Ok(())
    }

    /// Positions the cursor on the earliest day any BYDAY token selects.
    fn init_monthly_by_day(&mut self) -> RecurrenceResult<()> {
        let initial = self.last;
        let mut earliest: Option<CivilTime> = None;

        for token in self.by_data.day.clone() {
            let pos = token.position();
            if pos.abs() >= 6 {
                return Err(malformed("Malformed values in BYDAY part"));
            }

            self.last = initial;
            let mut day = self.last.nth_week_day(token.weekday, pos);
            if !self.day_fits_month(day) {
                let found_this_month = earliest.is_some_and(|found| {
                    found.year == initial.year && found.month == initial.month
                });
                if found_this_month {
                    continue;
                }
                let mut searched = 0;
                while !self.day_fits_month(day) {
                    if searched == MONTH_SEARCH_LIMIT {
                        return Err(malformed("Malformed values in BYDAY part"));
                    }
                    searched += 1;
                    self.increment_month();
                    day = self.last.nth_week_day(token.weekday, pos);
                }
            }

            self.last.day = day;
            if earliest.is_none_or(|found| self.last < found) {
                earliest = Some(self.last);
            }
        }

        self.last = earliest.unwrap_or(initial);
        Ok(())
    }

    fn init_yearly(&mut self) {
        let until_year = self.year_limit();
        while self.last.year <= until_year {
            self.days = self.year_days(self.last.year);
            if !self.days.is_empty() {
                break;
            }
            self.last.year += self.rule.interval;
        }
        if self.days.is_empty() {
            tracing::debug!(rule = %self.rule, "Yearly rule has no possible occurrences");
            self.completed = true;
            return;
        }
        self.next_by_year_day();
    }

    // Stepping

    /// Advances the cursor to the next valid candidate. Returns `false` once
    /// the rule is exhausted.
    fn step(&mut self) -> RecurrenceResult<bool> {
        loop {
            let valid = match self.rule.frequency {
                Frequency::Secondly => {
                    self.next_second();
                    true
                }
                Frequency::Minutely => {
                    self.next_minute();
                    true
                }
                Frequency::Hourly => {
                    self.next_hour();
                    true
                }
                Frequency::Daily => {
                    self.next_day();
                    true
                }
                Frequency::Weekly => {
                    self.next_week();
                    true
                }
                Frequency::Monthly => self.next_month()?,
                Frequency::Yearly => {
                    if !self.next_year() {
                        self.completed = true;
                        return Ok(false);
                    }
                    true
                }
            };
            self.last.normalize();

            if self.last.year > self.year_limit() || self.past_until(&self.last) {
                self.completed = true;
                return Ok(false);
            }
            if valid && self.last >= self.start && self.check_contracting_rules() {
                return Ok(true);
            }
        }
    }

    /// Steps one time-of-day field. Returns `true` when its list wrapped.
    fn next_generic(&mut self, part: ByPart, frequency: Frequency) -> bool {
        let this_frequency = self.rule.frequency == frequency;
        let len = self.by_data.len(part);
        if len == 0 {
            if this_frequency {
                self.increment_unit(part, self.rule.interval);
            }
            return false;
        }

        let slot = part.index();
        self.by_indices[slot] += 1;
        let end_of_data = self.by_indices[slot] >= len;
        if end_of_data {
            self.by_indices[slot] = 0;
        }
        let value = self
            .by_data
            .numeric(part)
            .get(self.by_indices[slot])
            .copied()
            .unwrap_or_default();
        match part {
            ByPart::Second => self.last.second = value,
            ByPart::Minute => self.last.minute = value,
            ByPart::Hour => self.last.hour = value,
            _ => {}
        }

        if end_of_data && this_frequency {
            let following = match part {
                ByPart::Second => ByPart::Minute,
                ByPart::Minute => ByPart::Hour,
                _ => ByPart::MonthDay,
            };
            self.increment_unit(following, 1);
        }
        end_of_data
    }

    fn next_second(&mut self) -> bool {
        self.next_generic(ByPart::Second, Frequency::Secondly)
    }

    fn next_minute(&mut self) -> bool {
        self.next_second() && self.next_generic(ByPart::Minute, Frequency::Minutely)
    }

    fn next_hour(&mut self) -> bool {
        self.next_minute() && self.next_generic(ByPart::Hour, Frequency::Hourly)
    }

    fn next_day(&mut self) {
        if !self.next_hour() {
            return;
        }
        let step = if self.rule.frequency == Frequency::Daily {
            self.rule.interval
        } else {
            1
        };
        self.increment_monthday(step);
    }

    fn next_week(&mut self) {
        if !self.next_weekday_by_week() {
            return;
        }
        if self.rule.parts.has(ByPart::WeekNo) {
            let slot = ByPart::WeekNo.index();
            self.by_indices[slot] += 1;
            let end_of_data = self.by_indices[slot] >= self.by_data.week_no.len();
            if end_of_data {
                self.by_indices[slot] = 0;
            }
            let week_no = self
                .by_data
                .week_no
                .get(self.by_indices[slot])
                .copied()
                .unwrap_or(1);
            self.last.month = 1;
            self.last.day = 1 + 7 * week_no;
            if end_of_data {
                self.last.year += 1;
            }
        } else {
            self.increment_monthday(7 * self.rule.interval);
        }
    }

    /// Moves to the next BYDAY weekday of the cursor's week. Returns `true`
    /// when the weekday list wrapped.
    fn next_weekday_by_week(&mut self) -> bool {
        if !self.next_hour() {
            return false;
        }
        if !self.rule.parts.has(ByPart::Day) {
            return true;
        }

        let week_start = self.rule.week_start;
        let slot = ByPart::Day.index();
        let len = self.by_data.day.len();
        let mut end_of_data = false;
        loop {
            self.by_indices[slot] += 1;
            if self.by_indices[slot] >= len {
                self.by_indices[slot] = 0;
                end_of_data = true;
            }
            let Some(token) = self.by_data.day.get(self.by_indices[slot]).copied() else {
                return true;
            };

            let offset = token.weekday.relative_to(week_start) - 1;
            let week_begins = self.last.start_doy_week(week_start);
            // Skip weekdays that fall into the previous year until the list wraps.
            if offset + week_begins < 1 && !end_of_data {
                continue;
            }

            let next = CivilTime::from_day_of_year(week_begins + offset, self.last.year);
            self.last.year = next.year;
            self.last.month = next.month;
            self.last.day = next.day;
            return end_of_data;
        }
    }

    /// Returns whether the new cursor position is a valid candidate.
    fn next_month(&mut self) -> RecurrenceResult<bool> {
        if !self.next_hour() {
            return Ok(true);
        }

        let has_day = self.rule.parts.has(ByPart::Day);
        let has_month_day = self.rule.parts.has(ByPart::MonthDay);
        if has_day && has_month_day {
            self.by_day_and_month_day(false)?;
            Ok(true)
        } else if has_day {
            Ok(self.next_month_by_day())
        } else if has_month_day {
            Ok(self.next_month_by_month_day())
        } else {
            self.increment_month();
            let day = self.by_data.month_day.first().copied().unwrap_or(self.start.day);
            if self.day_fits_month(day) {
                self.last.day = day;
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }

    fn next_month_by_day(&mut self) -> bool {
        let days_in_month = CivilTime::days_in_month(self.last.month, self.last.year);
        let use_set_pos = self.rule.parts.has(ByPart::SetPos);

        let mut set_pos = 0;
        let mut set_total = 0;
        if use_set_pos {
            for day in 1..=days_in_month {
                if self.is_day_in_by_day(&self.last.with_day(day)) {
                    set_total += 1;
                    if day <= self.last.day {
                        set_pos += 1;
                    }
                }
            }
        }

        for day in self.last.day + 1..=days_in_month {
            if !self.is_day_in_by_day(&self.last.with_day(day)) {
                continue;
            }
            set_pos += 1;
            if !use_set_pos
                || self.check_set_position(set_pos)
                || self.check_set_position(set_pos - set_total - 1)
            {
                self.last.day = day;
                return true;
            }
        }

        self.increment_month();
        self.is_day_in_by_day(&self.last) && (!use_set_pos || self.check_set_position(1))
    }

    fn next_month_by_month_day(&mut self) -> bool {
        let current = self.last.day;
        if let Some(day) = self.month_days().into_iter().find(|&day| day > current) {
            self.last.day = day;
            return true;
        }
        self.increment_month();
        match self.month_days().first() {
            Some(&day) => {
                self.last.day = day;
                true
            }
            None => false,
        }
    }

    /// Finds the next day that satisfies both BYMONTHDAY and BYDAY, searching
    /// at most [`MONTH_SEARCH_LIMIT`] months ahead.
    fn by_day_and_month_day(&mut self, is_init: bool) -> RecurrenceResult<()> {
        let mut after = if is_init { self.last.day - 1 } else { self.last.day };
        for _ in 0..MONTH_SEARCH_LIMIT {
            let found = self
                .month_days()
                .into_iter()
                .filter(|&day| day > after)
                .find(|&day| self.is_day_in_by_day(&self.last.with_day(day)));
            if let Some(day) = found {
                self.last.day = day;
                return Ok(());
            }
            after = 0;
            self.increment_month();
        }
        Err(malformed(
            "Malformed values in BYDAY combined with BYMONTHDAY parts",
        ))
    }

    fn advance_to_month_with_month_day(&mut self) -> RecurrenceResult<()> {
        for _ in 0..MONTH_SEARCH_LIMIT {
            self.increment_month();
            if let Some(&day) = self.month_days().first() {
                self.last.day = day;
                return Ok(());
            }
        }
        Err(malformed("Malformed values in BYMONTHDAY part"))
    }

    /// Returns `false` when no later year has any candidate day.
    fn next_year(&mut self) -> bool {
        if !self.next_hour() {
            return true;
        }

        self.days_index += 1;
        if self.days_index >= self.days.len() {
            self.days_index = 0;
            loop {
                self.last.year += self.rule.interval;
                if self.last.year > self.year_limit() {
                    return false;
                }
                self.days = self.year_days(self.last.year);
                if !self.days.is_empty() {
                    break;
                }
            }
        }
        self.next_by_year_day();
        true
    }

    fn next_by_year_day(&mut self) {
        let Some(&day_of_year) = self.days.get(self.days_index) else {
            return;
        };
        let date = CivilTime::from_day_of_year(day_of_year, self.last.year);
        self.last.year = date.year;
        self.last.month = date.month;
        self.last.day = date.day;
    }

    // Field increments

    fn increment_unit(&mut self, part: ByPart, amount: i32) {
        match part {
            ByPart::Second => self.increment_second(amount),
            ByPart::Minute => self.increment_minute(amount),
            ByPart::Hour => self.increment_hour(amount),
            _ => self.increment_monthday(amount),
        }
    }

    fn increment_second(&mut self, amount: i32) {
        let total = self.last.second + amount;
        self.last.second = total.rem_euclid(60);
        let carry = total.div_euclid(60);
        if carry != 0 {
            self.increment_minute(carry);
        }
    }

    fn increment_minute(&mut self, amount: i32) {
        let total = self.last.minute + amount;
        self.last.minute = total.rem_euclid(60);
        let carry = total.div_euclid(60);
        if carry != 0 {
            self.increment_hour(carry);
        }
    }

    fn increment_hour(&mut self, amount: i32) {
        let total = self.last.hour + amount;
        self.last.hour = total.rem_euclid(24);
        let carry = total.div_euclid(24);
        if carry != 0 {
            self.increment_monthday(carry);
        }
    }

    fn increment_monthday(&mut self, amount: i32) {
        for _ in 0..amount {
            let days_in_month = CivilTime::days_in_month(self.last.month, self.last.year);
            self.last.day += 1;
            if self.last.day > days_in_month {
                self.increment_month();
            }
        }
    }

    /// Moves to day 1 of the next month. With BYMONTH, jumps to the next
    /// listed month (wrapping into the following year).
    fn increment_month(&mut self) {
        self.last.day = 1;
        if self.rule.parts.has(ByPart::Month) {
            let current = self.last.month;
            match self.by_data.month.iter().copied().find(|&month| month > current) {
                Some(month) => self.last.month = month,
                None => {
                    self.last.month = self.by_data.month.first().copied().unwrap_or(1);
                    self.last.year += 1;
                }
            }
        } else {
            let step = if self.rule.frequency == Frequency::Monthly {
                self.rule.interval
            } else {
                1
            };
            let zero_based = self.last.month - 1 + step;
            self.last.year += zero_based.div_euclid(12);
            self.last.month = zero_based.rem_euclid(12) + 1;
        }
    }

    // Checks

    fn check_contracting_rules(&self) -> bool {
        let last = &self.last;
        let week_start = self.rule.week_start;
        let days_in_month = CivilTime::days_in_month(last.month, last.year);
        let days_in_year = CivilTime::days_in_year(last.year);
        let weeks_in_year = CivilTime::weeks_in_year(last.year, week_start);

        self.contract_allows(ByPart::Second, last.second, 0)
            && self.contract_allows(ByPart::Minute, last.minute, 0)
            && self.contract_allows(ByPart::Hour, last.hour, 0)
            && self.by_day_contract_allows(last)
            && self.contract_allows(ByPart::WeekNo, last.week_number(week_start), weeks_in_year)
            && self.contract_allows(ByPart::MonthDay, last.day, days_in_month)
            && self.contract_allows(ByPart::Month, last.month, 0)
            && self.contract_allows(ByPart::YearDay, last.day_of_year(), days_in_year)
    }

    /// `span` resolves negative values (counted from the end of the period).
    fn contract_allows(&self, part: ByPart, value: i32, span: i32) -> bool {
        if expansion(self.rule.frequency, part) != Some(Expansion::Contract) {
            return true;
        }
        let values = self.by_data.numeric(part);
        values.is_empty()
            || values
                .iter()
                .any(|&wanted| wanted == value || (wanted < 0 && span + wanted + 1 == value))
    }

    /// Contracting BYDAY only matches tokens without an ordinal.
    fn by_day_contract_allows(&self, last: &CivilTime) -> bool {
        if expansion(self.rule.frequency, ByPart::Day) != Some(Expansion::Contract)
            || self.by_data.day.is_empty()
        {
            return true;
        }
        let weekday = last.weekday();
        self.by_data
            .day
            .iter()
            .any(|token| token.ordinal.is_none() && token.weekday == weekday)
    }

    fn is_day_in_by_day(&self, date: &CivilTime) -> bool {
        self.by_data
            .day
            .iter()
            .any(|token| date.is_nth_week_day(token.weekday, token.position()))
    }

    fn check_set_position(&self, pos: i32) -> bool {
        self.rule.parts.set_pos.contains(&pos)
    }

    fn day_fits_month(&self, day: i32) -> bool {
        (1..=CivilTime::days_in_month(self.last.month, self.last.year)).contains(&day)
    }

    fn past_until(&self, time: &CivilTime) -> bool {
        self.rule.until.as_ref().is_some_and(|until| {
            if until.time.is_date {
                let time = time.normalized();
                let bound = until.time;
                (time.year, time.month, time.day) > (bound.year, bound.month, bound.day)
            } else {
                *time > until.time
            }
        })
    }

    fn year_limit(&self) -> i32 {
        self.rule
            .until
            .as_ref()
            .map_or(MAX_YEAR, |until| until.time.year.min(MAX_YEAR))
    }

    fn month_days(&self) -> Vec<i32> {
        normalize_month_days(self.last.year, self.last.month, &self.rule.parts.month_day)
    }

    fn year_days(&self, year: i32) -> Vec<i32> {
        expand_year_days(&self.rule, &self.by_data.day, &self.start, year)
    }
}

impl Iterator for RecurrenceIterator {
    type Item = RecurrenceResult<CivilTime>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_occurrence().transpose()
    }
}

//! Merges the recurrence rules, RDATEs and EXDATEs of a component into one
//! ascending occurrence stream.

use serde::{Deserialize, Serialize};

use crate::error::RfcResult;
use crate::rfc::ical::core::{CivilTime, Component, DateTime, DateTimeForm, Property, Until};

use super::iterator::{RecurrenceIterator, RecurrenceIteratorState, STATE_VERSION};
use super::timezone::TimeZoneResolver;
use super::{RecurrenceError, RecurrenceResult, TimezoneResult};

/// Consecutive skipped candidates tolerated before giving up.
const MAX_TRIES: usize = 500;

/// Construction inputs for [`RecurrenceSetExpander`].
///
/// Either `rule_iterators` or `component` must be given. Values given here are
/// merged with whatever the component provides; an explicit `start` wins over
/// the component's DTSTART.
///
/// The component's UTC UNTIL, RDATE and EXDATE values are moved into the zone
/// of its DTSTART before they are compared with occurrences. `resolver` looks
/// the zone up; without one only the IANA database is consulted.
#[derive(Debug, Default)]
pub struct RecurrenceSetOptions<'a> {
    pub start: Option<CivilTime>,
    pub component: Option<&'a Component>,
    pub resolver: Option<&'a mut TimeZoneResolver>,
    pub rule_iterators: Option<Vec<RecurrenceIterator>>,
    pub extra_dates: Vec<CivilTime>,
    pub excluded_dates: Vec<CivilTime>,
}

/// A rule iterator together with the candidate it currently offers.
#[derive(Debug, Clone)]
struct RuleCursor {
    iterator: RecurrenceIterator,
    current: Option<CivilTime>,
}

impl RuleCursor {
    fn primed(mut iterator: RecurrenceIterator) -> RecurrenceResult<Self> {
        let current = iterator.next_occurrence()?;
        Ok(Self { iterator, current })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCursorState {
    pub iterator: RecurrenceIteratorState,
    pub current: Option<CivilTime>,
}

/// Serializable snapshot of a [`RecurrenceSetExpander`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceSetState {
    pub version: u32,
    pub start: CivilTime,
    pub last: Option<CivilTime>,
    pub rules: Vec<RuleCursorState>,
    pub rule_dates: Vec<CivilTime>,
    pub rule_date_index: usize,
    pub excluded_dates: Vec<CivilTime>,
    pub excluded_date_index: usize,
    pub complete: bool,
}

/// Lazily produces the occurrence set of a recurring component.
///
/// Occurrences are strictly ascending. A candidate offered by several sources
/// is emitted once; a candidate equal to an EXDATE is never emitted.
#[derive(Debug, Clone)]
pub struct RecurrenceSetExpander {
    start: CivilTime,
    last: Option<CivilTime>,
    rules: Vec<RuleCursor>,
    rule_dates: Vec<CivilTime>,
    rule_date_index: usize,
    excluded_dates: Vec<CivilTime>,
    excluded_date_index: usize,
    complete: bool,
}

impl RecurrenceSetExpander {
    /// ## Summary
    /// Builds an expander from explicit iterators, a component, or both.
    ///
    /// Without any rule iterator and without RDATEs the start itself is the
    /// only occurrence.
    ///
    /// ## Errors
    /// Returns [`RecurrenceError::MissingStart`] if no start is given and the
    /// component has no usable DTSTART, [`RecurrenceError::MissingSource`] if
    /// neither iterators nor a component are given, a timezone error if a
    /// component date cannot be moved into the DTSTART zone, or any error
    /// raised while building and priming the rule iterators.
    pub fn new(options: RecurrenceSetOptions<'_>) -> RfcResult<Self> {
        let RecurrenceSetOptions {
            start,
            component,
            resolver,
            rule_iterators,
            extra_dates,
            excluded_dates,
        } = options;

        let dtstart = component.and_then(component_start);
        let start = start
            .or_else(|| dtstart.map(|dt| dt.civil))
            .ok_or(RecurrenceError::MissingStart)?
            .normalized();

        let mut fallback = TimeZoneResolver::default();
        let mut frame = ZoneFrame {
            form: dtstart.map_or_else(DateTimeForm::default, |dt| dt.form.clone()),
            resolver: resolver.unwrap_or(&mut fallback),
        };

        let iterators = match (rule_iterators, component) {
            (Some(iterators), _) => iterators,
            (None, Some(component)) => rule_iterators_for(component, start, &mut frame)?,
            (None, None) => return Err(RecurrenceError::MissingSource.into()),
        };

        let mut rule_dates = extra_dates;
        let mut excluded = excluded_dates;
        if let Some(component) = component {
            rule_dates.extend(collect_dates(component, "RDATE", &mut frame)?);
            excluded.extend(collect_dates(component, "EXDATE", &mut frame)?);
        }
        if iterators.is_empty() {
            rule_dates.push(start);
        }

        let rules = iterators
            .into_iter()
            .map(RuleCursor::primed)
            .collect::<RecurrenceResult<Vec<_>>>()?;

        tracing::debug!(
            start = %start,
            rules = rules.len(),
            rule_dates = rule_dates.len(),
            excluded_dates = excluded.len(),
            "Recurrence set initialized"
        );

        Ok(Self {
            start,
            last: None,
            rules,
            rule_dates: sorted_unique(rule_dates),
            rule_date_index: 0,
            excluded_dates: sorted_unique(excluded),
            excluded_date_index: 0,
            complete: false,
        })
    }

    /// ## Summary
    /// Builds an expander from a component's DTSTART, RRULEs, RDATEs and EXDATEs,
    /// resolving zones through the IANA database only.
    ///
    /// ## Errors
    /// See [`RecurrenceSetExpander::new`].
    pub fn from_component(component: &Component) -> RfcResult<Self> {
        Self::new(RecurrenceSetOptions {
            component: Some(component),
            ..RecurrenceSetOptions::default()
        })
    }

    /// ## Summary
    /// Like [`Self::from_component`], with VTIMEZONE definitions registered in
    /// `resolver` taking precedence over the IANA database.
    ///
    /// ## Errors
    /// See [`RecurrenceSetExpander::new`].
    pub fn from_component_in(
        component: &Component,
        resolver: &mut TimeZoneResolver,
    ) -> RfcResult<Self> {
        Self::new(RecurrenceSetOptions {
            component: Some(component),
            resolver: Some(resolver),
            ..RecurrenceSetOptions::default()
        })
    }

    /// ## Summary
    /// Rebuilds an expander from a snapshot without re-initializing anything.
    ///
    /// ## Errors
    /// Returns [`RecurrenceError::UnsupportedStateVersion`] for snapshots of
    /// another format (including any nested iterator snapshot).
    pub fn from_state(state: RecurrenceSetState) -> RecurrenceResult<Self> {
        if state.version != STATE_VERSION {
            return Err(RecurrenceError::UnsupportedStateVersion {
                found: state.version,
                expected: STATE_VERSION,
            });
        }
        let rules = state
            .rules
            .into_iter()
            .map(|rule| {
                Ok(RuleCursor {
                    iterator: RecurrenceIterator::from_state(rule.iterator)?,
                    current: rule.current,
                })
            })
            .collect::<RecurrenceResult<Vec<_>>>()?;

        Ok(Self {
            start: state.start,
            last: state.last,
            rules,
            rule_dates: state.rule_dates,
            rule_date_index: state.rule_date_index,
            excluded_dates: state.excluded_dates,
            excluded_date_index: state.excluded_date_index,
            complete: state.complete,
        })
    }

    #[must_use]
    pub fn state(&self) -> RecurrenceSetState {
        RecurrenceSetState {
            version: STATE_VERSION,
            start: self.start,
            last: self.last,
            rules: self
                .rules
                .iter()
                .map(|rule| RuleCursorState {
                    iterator: rule.iterator.state(),
                    current: rule.current,
                })
                .collect(),
            rule_dates: self.rule_dates.clone(),
            rule_date_index: self.rule_date_index,
            excluded_dates: self.excluded_dates.clone(),
            excluded_date_index: self.excluded_date_index,
            complete: self.complete,
        }
    }

    #[must_use]
    pub fn start(&self) -> CivilTime {
        self.start
    }

    /// The most recent candidate considered, emitted or excluded.
    #[must_use]
    pub fn last(&self) -> Option<CivilTime> {
        self.last
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// ## Summary
    /// Produces the next occurrence of the set, or `None` when every source is
    /// exhausted.
    ///
    /// ## Errors
    /// Returns [`RecurrenceError::TooManyAttempts`] after too many consecutive
    /// excluded or duplicate candidates, or any error from a rule iterator.
    pub fn next_occurrence(&mut self) -> RecurrenceResult<Option<CivilTime>> {
        if self.complete {
            return Ok(None);
        }

        for _ in 0..MAX_TRIES {
            let Some(candidate) = self.take_candidate()? else {
                self.complete = true;
                return Ok(None);
            };

            if self.last.is_some_and(|last| candidate <= last) {
                continue;
            }
            self.last = Some(candidate);

            if self.is_excluded(candidate) {
                tracing::trace!(candidate = %candidate, "Occurrence excluded");
                continue;
            }

            tracing::trace!(occurrence = %candidate, "Recurrence set occurrence");
            return Ok(Some(candidate));
        }

        self.complete = true;
        Err(RecurrenceError::TooManyAttempts(MAX_TRIES))
    }

    /// ## Summary
    /// Collects the occurrences falling within `[from, to]`, pulling at most
    /// `cap` occurrences from the set.
    ///
    /// ## Errors
    /// Propagates errors from [`RecurrenceSetExpander::next_occurrence`].
    pub fn occurrences_between(
        &mut self,
        from: CivilTime,
        to: CivilTime,
        cap: usize,
    ) -> RecurrenceResult<Vec<CivilTime>> {
        let mut found = Vec::new();
        for _ in 0..cap {
            let Some(occurrence) = self.next_occurrence()? else {
                break;
            };
            if occurrence > to {
                break;
            }
            if occurrence >= from {
                found.push(occurrence);
            }
        }
        Ok(found)
    }

    /// Takes the earliest pending candidate from the RDATE list or the rules.
    /// RDATEs win ties; among rules the first registered wins.
    fn take_candidate(&mut self) -> RecurrenceResult<Option<CivilTime>> {
        let earliest_rule = self
            .rules
            .iter()
            .enumerate()
            .filter_map(|(index, rule)| rule.current.map(|time| (time, index)))
            .min();
        let rule_date = self.rule_dates.get(self.rule_date_index).copied();

        match (rule_date, earliest_rule) {
            (None, None) => Ok(None),
            (Some(date), Some((time, _))) if date <= time => {
                self.rule_date_index += 1;
                Ok(Some(date))
            }
            (Some(date), None) => {
                self.rule_date_index += 1;
                Ok(Some(date))
            }
            (_, Some((time, index))) => {
                if let Some(rule) = self.rules.get_mut(index) {
                    rule.current = rule.iterator.next_occurrence()?;
                }
                Ok(Some(time))
            }
        }
    }

    fn is_excluded(&mut self, candidate: CivilTime) -> bool {
        let skipped = self
            .excluded_dates
            .iter()
            .skip(self.excluded_date_index)
            .take_while(|&&excluded| excluded < candidate)
            .count();
        self.excluded_date_index += skipped;
        self.excluded_dates.get(self.excluded_date_index) == Some(&candidate)
    }
}

impl Iterator for RecurrenceSetExpander {
    type Item = RecurrenceResult<CivilTime>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_occurrence().transpose()
    }
}

/// The zone of a component's DTSTART, into which its other dates are moved.
struct ZoneFrame<'r> {
    form: DateTimeForm,
    resolver: &'r mut TimeZoneResolver,
}

impl ZoneFrame<'_> {
    /// Expresses `value` in this frame. DATE and floating values, and any
    /// value in a floating frame, keep their wall-clock reading.
    fn align(&mut self, value: &DateTime) -> TimezoneResult<CivilTime> {
        let civil = value.civil.normalized();
        if value.is_date() || value.is_floating() || value.form == self.form {
            return Ok(civil);
        }
        match &self.form {
            DateTimeForm::Floating => Ok(civil),
            DateTimeForm::Utc => self.resolver.utc_for(value),
            DateTimeForm::Zoned { tzid } => {
                let utc = self.resolver.utc_for(value)?;
                self.resolver.local_in(tzid, &utc)
            }
        }
    }

    /// Moves a UTC UNTIL into a zoned frame's local time.
    fn align_until(&mut self, until: Until) -> TimezoneResult<Until> {
        let DateTimeForm::Zoned { tzid } = &self.form else {
            return Ok(until);
        };
        if !until.is_utc || until.time.is_date {
            return Ok(until);
        }
        let time = self.resolver.local_in(tzid, &until.time)?;
        Ok(Until {
            time,
            is_utc: false,
        })
    }
}

fn component_start(component: &Component) -> Option<&DateTime> {
    component.get_property("DTSTART").and_then(Property::as_datetime)
}

fn rule_iterators_for(
    component: &Component,
    start: CivilTime,
    frame: &mut ZoneFrame<'_>,
) -> RfcResult<Vec<RecurrenceIterator>> {
    let mut iterators = Vec::new();
    for prop in component.get_properties("RRULE") {
        let Some(rule) = prop.as_recur() else {
            tracing::warn!(value = %prop.raw_value, "Ignoring unusable RRULE");
            continue;
        };
        let mut rule = rule.clone();
        rule.until = rule.until.map(|until| frame.align_until(until)).transpose()?;
        iterators.push(RecurrenceIterator::new(rule, start)?);
    }
    Ok(iterators)
}

fn collect_dates(
    component: &Component,
    name: &str,
    frame: &mut ZoneFrame<'_>,
) -> TimezoneResult<Vec<CivilTime>> {
    let mut dates = Vec::new();
    for prop in component.get_properties(name) {
        let values = prop.value.datetimes();
        if values.is_empty() {
            tracing::warn!(property = name, value = %prop.raw_value, "Ignoring unusable date list");
        }
        for value in values {
            dates.push(frame.align(value)?);
        }
    }
    Ok(dates)
}

fn sorted_unique(mut dates: Vec<CivilTime>) -> Vec<CivilTime> {
    dates.sort();
    dates.dedup();
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RfcError;
    use crate::rfc::ical::core::{ComponentKind, RecurrenceRule};

    fn rule_iterator(text: &str, start: CivilTime) -> RecurrenceIterator {
        text.parse::<RecurrenceRule>()
            .expect("rule parses")
            .iterator(start)
            .expect("iterator initializes")
    }

    #[test]
    fn construction_requires_start_and_source() {
        let missing_start = RecurrenceSetExpander::new(RecurrenceSetOptions {
            rule_iterators: Some(Vec::new()),
            ..RecurrenceSetOptions::default()
        });
        assert_eq!(
            missing_start.err(),
            Some(RfcError::RecurrenceError(RecurrenceError::MissingStart))
        );

        let missing_source = RecurrenceSetExpander::new(RecurrenceSetOptions {
            start: Some(CivilTime::date(2026, 1, 1)),
            ..RecurrenceSetOptions::default()
        });
        assert_eq!(
            missing_source.err(),
            Some(RfcError::RecurrenceError(RecurrenceError::MissingSource))
        );
    }

    #[test]
    fn without_rules_the_start_is_the_only_occurrence() {
        let start = CivilTime::new(2026, 4, 1, 10, 0, 0);
        let expander = RecurrenceSetExpander::new(RecurrenceSetOptions {
            start: Some(start),
            rule_iterators: Some(Vec::new()),
            ..RecurrenceSetOptions::default()
        })
        .expect("expander builds");
        let all: Vec<_> = expander.collect::<RecurrenceResult<_>>().expect("expands");
        assert_eq!(all, vec![start]);
    }

    #[test]
    fn rules_are_merged_without_duplicates() {
        let start = CivilTime::date(2026, 1, 1);
        let expander = RecurrenceSetExpander::new(RecurrenceSetOptions {
            start: Some(start),
            rule_iterators: Some(vec![
                rule_iterator("FREQ=DAILY;INTERVAL=2;COUNT=4", start),
                rule_iterator("FREQ=DAILY;INTERVAL=3;COUNT=3", start),
            ]),
            ..RecurrenceSetOptions::default()
        })
        .expect("expander builds");
        let days: Vec<i32> = expander
            .map(|occurrence| occurrence.map(|time| time.day))
            .collect::<RecurrenceResult<_>>()
            .expect("expands");
        assert_eq!(days, vec![1, 3, 4, 5, 7]);
    }

    #[test]
    fn extra_and_excluded_dates() {
        let start = CivilTime::date(2026, 1, 1);
        let mut expander = RecurrenceSetExpander::new(RecurrenceSetOptions {
            start: Some(start),
            rule_iterators: Some(vec![rule_iterator("FREQ=WEEKLY;COUNT=3", start)]),
            extra_dates: vec![CivilTime::date(2026, 1, 10)],
            excluded_dates: vec![CivilTime::date(2026, 1, 8)],
            ..RecurrenceSetOptions::default()
        })
        .expect("expander builds");
        let all = expander
            .occurrences_between(CivilTime::date(2026, 1, 1), CivilTime::date(2026, 12, 31), 10)
            .expect("expands");
        assert_eq!(
            all,
            vec![
                CivilTime::date(2026, 1, 1),
                CivilTime::date(2026, 1, 10),
                CivilTime::date(2026, 1, 15),
            ]
        );
        assert!(expander.is_complete());
    }

    fn zoned_event(rrule: &str, exdate: Option<CivilTime>) -> Component {
        let mut event = Component::new(ComponentKind::Event);
        event.add_property(Property::datetime(
            "DTSTART",
            DateTime::zoned(CivilTime::new(2026, 1, 1, 9, 0, 0), "America/New_York"),
        ));
        event.add_property(Property::recur(
            "RRULE",
            rrule.parse::<RecurrenceRule>().expect("rule parses"),
        ));
        if let Some(exdate) = exdate {
            event.add_property(Property::datetime("EXDATE", DateTime::utc(exdate)));
        }
        event
    }

    #[test]
    fn utc_until_is_compared_in_the_start_zone() {
        // 10:00Z on Jan 5 is 05:00 in New York, before that day's 09:00.
        let event = zoned_event("FREQ=DAILY;UNTIL=20260105T100000Z", None);
        let all: Vec<_> = RecurrenceSetExpander::from_component(&event)
            .expect("expander builds")
            .collect::<RecurrenceResult<_>>()
            .expect("expands");
        assert_eq!(all.len(), 4);
        assert_eq!(all.last(), Some(&CivilTime::new(2026, 1, 4, 9, 0, 0)));
    }

    #[test]
    fn utc_exdate_excludes_the_matching_local_occurrence() {
        let event = zoned_event("FREQ=DAILY;COUNT=3", Some(CivilTime::new(2026, 1, 2, 14, 0, 0)));
        let all: Vec<_> = RecurrenceSetExpander::from_component(&event)
            .expect("expander builds")
            .collect::<RecurrenceResult<_>>()
            .expect("expands");
        assert_eq!(
            all,
            vec![CivilTime::new(2026, 1, 1, 9, 0, 0), CivilTime::new(2026, 1, 3, 9, 0, 0)]
        );
    }
}

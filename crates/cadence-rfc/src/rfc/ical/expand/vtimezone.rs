//! UTC offset lookup from VTIMEZONE components (RFC 5545 §3.6.5).
//!
//! Each STANDARD/DAYLIGHT observance contributes the transitions it generates
//! (its DTSTART, RDATEs and RRULE occurrences). Transitions are materialized
//! lazily, a few years past the latest year asked about.

use cadence_core::config::TimezoneConfig;
use chrono::{Datelike, Utc};

use crate::rfc::ical::core::{
    CivilTime, Component, ComponentKind, DateTime, Property, RecurrenceRule, Until, UtcOffset,
};

use super::iterator::RecurrenceIterator;
use super::{TimezoneError, TimezoneResult};

/// A STANDARD or DAYLIGHT sub-component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observance {
    pub is_daylight: bool,
    /// Local start, in the offset that was in effect before (TZOFFSETFROM).
    pub dtstart: CivilTime,
    pub offset_to: UtcOffset,
    pub offset_from: UtcOffset,
    pub rule: Option<RecurrenceRule>,
    pub rdates: Vec<DateTime>,
    pub tzname: Option<String>,
}

impl Observance {
    fn parse(component: &Component, is_daylight: bool) -> TimezoneResult<Self> {
        let kind = if is_daylight { "DAYLIGHT" } else { "STANDARD" };

        let dtstart = component
            .get_property("DTSTART")
            .ok_or(TimezoneError::MissingProperty("DTSTART", kind))?;
        let dtstart = dtstart
            .as_datetime()
            .map(|dt| dt.civil.normalized())
            .ok_or_else(|| TimezoneError::InvalidValue("DTSTART", dtstart.raw_value.clone()))?;

        let offset_to = offset_property(component, "TZOFFSETTO", kind)?;
        let offset_from = offset_property(component, "TZOFFSETFROM", kind)?;

        let rule = component.get_property("RRULE").and_then(Property::as_recur).cloned();

        let rdates = component
            .get_properties("RDATE")
            .into_iter()
            .flat_map(|prop| prop.value.datetimes().iter().cloned())
            .collect();

        let tzname = component
            .get_property("TZNAME")
            .and_then(Property::as_text)
            .map(String::from);

        Ok(Self {
            is_daylight,
            dtstart,
            offset_to,
            offset_from,
            rule,
            rdates,
            tzname,
        })
    }

    /// Builds the transition that happens at local time `local` (in the
    /// previous offset) or at the UTC instant `local` when `is_utc` is set.
    fn change_at(&self, local: CivilTime, is_utc: bool) -> Change {
        let mut utc = local;
        utc.is_date = false;
        if !is_utc {
            utc.adjust(0, 0, 0, -self.offset_from.as_seconds());
        }
        Change {
            utc,
            is_daylight: self.is_daylight,
            utc_offset: self.offset_to.as_seconds(),
            prev_utc_offset: self.offset_from.as_seconds(),
        }
    }

    /// Transitions that do not come from the RRULE.
    fn fixed_changes(&self) -> Vec<Change> {
        if self.rule.is_none() && self.rdates.is_empty() {
            return vec![self.change_at(self.dtstart, false)];
        }
        self.rdates
            .iter()
            .map(|rdate| {
                let mut local = rdate.civil;
                if rdate.is_date() {
                    local.hour = self.dtstart.hour;
                    local.minute = self.dtstart.minute;
                    local.second = self.dtstart.second;
                }
                self.change_at(local, rdate.is_utc())
            })
            .collect()
    }

    /// Iterator over the RRULE transitions, with a UTC UNTIL moved into the
    /// observance's local time.
    fn rule_iterator(&self) -> TimezoneResult<Option<RecurrenceIterator>> {
        let Some(rule) = &self.rule else {
            return Ok(None);
        };
        let mut rule = rule.clone();
        if let Some(until) = rule.until.filter(|until| until.is_utc) {
            let mut time = until.time;
            if !time.is_date {
                time.adjust(0, 0, 0, self.offset_from.as_seconds());
            }
            rule.until = Some(Until { time, is_utc: false });
        }
        Ok(Some(RecurrenceIterator::new(rule, self.dtstart)?))
    }
}

fn offset_property(
    component: &Component,
    name: &'static str,
    kind: &'static str,
) -> TimezoneResult<UtcOffset> {
    let prop = component
        .get_property(name)
        .ok_or(TimezoneError::MissingProperty(name, kind))?;
    prop.as_utc_offset()
        .ok_or_else(|| TimezoneError::InvalidValue(name, prop.raw_value.clone()))
}

/// One offset transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    /// UTC instant of the transition.
    pub utc: CivilTime,
    pub is_daylight: bool,
    /// Offset in seconds from this transition on.
    pub utc_offset: i32,
    /// Offset in seconds before this transition.
    pub prev_utc_offset: i32,
}

impl Change {
    /// Local time at which the transition is taken to happen: the UTC instant
    /// shifted by the smaller of the two offsets.
    fn local_threshold(&self) -> CivilTime {
        shifted(self.utc, self.utc_offset.min(self.prev_utc_offset))
    }
}

fn shifted(time: CivilTime, seconds: i32) -> CivilTime {
    let mut time = time;
    time.adjust(0, 0, 0, seconds);
    time
}

/// Rule iterator of one observance plus an occurrence held back because it
/// lies past the covered range.
#[derive(Debug, Clone)]
struct RuleExpansion {
    observance: usize,
    iterator: RecurrenceIterator,
    pending: Option<CivilTime>,
}

/// Sorted transition list of a VTIMEZONE, grown on demand.
#[derive(Debug, Clone)]
pub struct TimeZoneTransitionIndex {
    tzid: String,
    observances: Vec<Observance>,
    expansions: Vec<RuleExpansion>,
    changes: Vec<Change>,
    expanded_until_year: Option<i32>,
    config: TimezoneConfig,
}

impl TimeZoneTransitionIndex {
    /// ## Summary
    /// Builds an index from a VTIMEZONE component.
    ///
    /// ## Errors
    /// Returns [`TimezoneError::MissingTzid`] if the component is not a
    /// VTIMEZONE or lacks a TZID, [`TimezoneError::NoObservances`] without
    /// STANDARD/DAYLIGHT children, [`TimezoneError::MissingProperty`] or
    /// [`TimezoneError::InvalidValue`] for incomplete observances, and
    /// [`TimezoneError::Recurrence`] for observance rules that cannot be
    /// iterated.
    pub fn from_component(component: &Component, config: TimezoneConfig) -> TimezoneResult<Self> {
        if component.kind != Some(ComponentKind::Timezone) {
            return Err(TimezoneError::MissingTzid);
        }
        let tzid = component
            .get_property("TZID")
            .and_then(Property::as_text)
            .ok_or(TimezoneError::MissingTzid)?
            .to_string();

        let mut observances = Vec::new();
        for child in &component.children {
            let is_daylight = match child.kind {
                Some(ComponentKind::Standard) => false,
                Some(ComponentKind::Daylight) => true,
                _ => continue,
            };
            observances.push(Observance::parse(child, is_daylight)?);
        }
        if observances.is_empty() {
            return Err(TimezoneError::NoObservances);
        }

        let mut changes: Vec<Change> = observances
            .iter()
            .flat_map(Observance::fixed_changes)
            .collect();
        changes.sort_by_key(|change| change.utc);

        let mut expansions = Vec::new();
        for (index, observance) in observances.iter().enumerate() {
            if let Some(iterator) = observance.rule_iterator()? {
                expansions.push(RuleExpansion {
                    observance: index,
                    iterator,
                    pending: None,
                });
            }
        }

        tracing::debug!(
            tzid = %tzid,
            observances = observances.len(),
            "Parsed VTIMEZONE"
        );

        Ok(Self {
            tzid,
            observances,
            expansions,
            changes,
            expanded_until_year: None,
            config,
        })
    }

    #[must_use]
    pub fn tzid(&self) -> &str {
        &self.tzid
    }

    #[must_use]
    pub fn observances(&self) -> &[Observance] {
        &self.observances
    }

    /// Transitions materialized so far, ascending by UTC instant.
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    #[must_use]
    pub fn expanded_until_year(&self) -> Option<i32> {
        self.expanded_until_year
    }

    /// ## Summary
    /// Materializes transitions through at least `year` plus the configured
    /// extra coverage. Already covered years are a no-op.
    ///
    /// ## Errors
    /// Returns [`TimezoneError::Recurrence`] if an observance rule fails.
    #[tracing::instrument(skip(self), fields(tzid = %self.tzid))]
    pub fn ensure_coverage(&mut self, year: i32) -> TimezoneResult<()> {
        if self.expanded_until_year.is_some_and(|covered| covered >= year) {
            return Ok(());
        }

        let minimum = self
            .config
            .minimum_expansion_year
            .unwrap_or_else(|| Utc::now().year());
        let target = year
            .max(minimum)
            .saturating_add(self.config.extra_coverage_years);

        let mut added = Vec::new();
        for expansion in &mut self.expansions {
            let Some(observance) = self.observances.get(expansion.observance) else {
                continue;
            };
            loop {
                let next = match expansion.pending.take() {
                    Some(pending) => Some(pending),
                    None => expansion.iterator.next_occurrence()?,
                };
                let Some(occurrence) = next else {
                    break;
                };
                if occurrence.year > target {
                    expansion.pending = Some(occurrence);
                    break;
                }
                added.push(observance.change_at(occurrence, false));
            }
        }

        tracing::debug!(year, target, added = added.len(), "Expanded timezone transitions");

        added.sort_by_key(|change| change.utc);
        self.changes = merge_sorted(std::mem::take(&mut self.changes), added);
        self.expanded_until_year = Some(target);
        Ok(())
    }

    /// ## Summary
    /// Returns the UTC offset, in seconds, in effect at local time `local`.
    ///
    /// Times before the first transition use that transition's previous
    /// offset; a zone without transitions has offset 0. Inside a repeated
    /// (fall-back) hour the standard-time reading is preferred.
    ///
    /// ## Errors
    /// Returns [`TimezoneError::Recurrence`] if coverage expansion fails.
    pub fn utc_offset(&mut self, local: &CivilTime) -> TimezoneResult<i32> {
        let local = local.normalized();
        self.ensure_coverage(local.year)?;
        Ok(self.lookup_offset(&local))
    }

    /// ## Summary
    /// Converts a local time in this zone to UTC.
    ///
    /// ## Errors
    /// Returns [`TimezoneError::Recurrence`] if coverage expansion fails.
    pub fn local_to_utc(&mut self, local: &CivilTime) -> TimezoneResult<CivilTime> {
        let offset = self.utc_offset(local)?;
        Ok(shifted(local.normalized(), -offset))
    }

    /// ## Summary
    /// Converts a UTC instant to local time in this zone.
    ///
    /// ## Errors
    /// Returns [`TimezoneError::Recurrence`] if coverage expansion fails.
    pub fn utc_to_local(&mut self, utc: &CivilTime) -> TimezoneResult<CivilTime> {
        let utc = utc.normalized();
        // The local year may differ by one around New Year.
        self.ensure_coverage(utc.year.saturating_add(1))?;
        let index = self.changes.partition_point(|change| change.utc <= utc);
        let offset = match index.checked_sub(1).and_then(|i| self.changes.get(i)) {
            Some(change) => change.utc_offset,
            None => self.changes.first().map_or(0, |change| change.prev_utc_offset),
        };
        Ok(shifted(utc, offset))
    }

    fn lookup_offset(&self, local: &CivilTime) -> i32 {
        let Some(first) = self.changes.first() else {
            return 0;
        };
        let Some(index) = self.find_change(local) else {
            return first.prev_utc_offset;
        };
        let Some(mut change) = self.changes.get(index) else {
            return 0;
        };

        if change.utc_offset < change.prev_utc_offset && index > 0 {
            let repeated_until = shifted(change.utc, change.prev_utc_offset);
            if *local < repeated_until
                && let Some(previous) = self.changes.get(index - 1)
                && change.is_daylight
                && !previous.is_daylight
            {
                change = previous;
            }
        }
        change.utc_offset
    }

    /// Index of the last change whose local threshold is not after `local`.
    fn find_change(&self, local: &CivilTime) -> Option<usize> {
        let len = self.changes.len();
        let mut index = self
            .changes
            .partition_point(|change| change.utc < *local)
            .min(len.checked_sub(1)?);
        let mut found = None;
        let mut backwards = false;
        loop {
            let change = self.changes.get(index)?;
            if *local >= change.local_threshold() {
                found = Some(index);
            } else {
                backwards = true;
            }

            if backwards {
                if found.is_some() {
                    return found;
                }
                index = index.checked_sub(1)?;
            } else {
                index += 1;
                if index >= len {
                    return found;
                }
            }
        }
    }
}

fn merge_sorted(left: Vec<Change>, right: Vec<Change>) -> Vec<Change> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => l.utc <= r.utc,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }
    merged
}

//! Timezone resolution and UTC conversion for iCalendar date-times.
//!
//! VTIMEZONE definitions shipped with the calendar take precedence; anything
//! else is looked up in the IANA database through `chrono-tz`, after ICU4X has
//! mapped Windows zone names and IANA aliases to canonical identifiers.

use std::collections::HashMap;
use std::str::FromStr;

use cadence_core::config::TimezoneConfig;
use chrono::{Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use icu::time::zone::WindowsParser;
use icu::time::zone::iana::IanaParserExtended;

use super::vtimezone::TimeZoneTransitionIndex;
use super::{TimezoneError, TimezoneResult};
use crate::rfc::ical::core::{CivilTime, DateTime, ICalendar};

/// Resolver for timezone identifiers.
///
/// Holds the transition indexes of registered VTIMEZONE components and a
/// cache of resolved IANA zones.
#[derive(Debug, Default)]
pub struct TimeZoneResolver {
    cache: HashMap<String, Tz>,
    indexes: HashMap<String, TimeZoneTransitionIndex>,
    config: TimezoneConfig,
}

impl TimeZoneResolver {
    #[must_use]
    pub fn new(config: TimezoneConfig) -> Self {
        Self {
            cache: HashMap::new(),
            indexes: HashMap::new(),
            config,
        }
    }

    /// ## Summary
    /// Builds a resolver with every VTIMEZONE of `calendar` registered.
    ///
    /// ## Errors
    /// Returns an error if any VTIMEZONE component is invalid.
    pub fn from_calendar(calendar: &ICalendar, config: TimezoneConfig) -> TimezoneResult<Self> {
        let mut resolver = Self::new(config);
        for component in calendar.timezones() {
            let index = TimeZoneTransitionIndex::from_component(component, config)?;
            resolver.register(index);
        }
        Ok(resolver)
    }

    /// Registers a VTIMEZONE index under its TZID, replacing any earlier one.
    pub fn register(&mut self, index: TimeZoneTransitionIndex) {
        tracing::debug!(tzid = index.tzid(), "Registered VTIMEZONE");
        self.indexes.insert(index.tzid().to_string(), index);
    }

    #[must_use]
    pub fn has_index(&self, tzid: &str) -> bool {
        self.indexes.contains_key(tzid)
    }

    #[must_use]
    pub fn config(&self) -> TimezoneConfig {
        self.config
    }

    /// ## Summary
    /// Resolves a timezone identifier to a `chrono_tz::Tz`.
    ///
    /// ## Errors
    /// Returns [`TimezoneError::UnknownTimezone`] if the TZID is not an IANA
    /// name after normalization.
    pub fn resolve(&mut self, tzid: &str) -> TimezoneResult<Tz> {
        if let Some(tz) = self.cache.get(tzid) {
            return Ok(*tz);
        }

        let normalized = normalize_tzid(tzid);
        let tz = Tz::from_str(&normalized)
            .map_err(|_e| TimezoneError::UnknownTimezone(tzid.to_string()))?;

        self.cache.insert(tzid.to_string(), tz);
        Ok(tz)
    }

    /// ## Summary
    /// Returns the UTC offset in seconds of a data-model date-time.
    ///
    /// UTC and floating values have offset 0.
    ///
    /// ## Errors
    /// Returns [`TimezoneError::UnknownTimezone`] for unresolvable TZIDs and
    /// [`TimezoneError::Recurrence`] if a VTIMEZONE rule fails to expand.
    pub fn offset_for(&mut self, value: &DateTime) -> TimezoneResult<i32> {
        match value.tzid() {
            Some(tzid) => self.offset_in(tzid, &value.civil),
            None => Ok(0),
        }
    }

    /// ## Summary
    /// Returns the UTC offset in seconds of local time `local` in zone `tzid`.
    ///
    /// Local times skipped by a forward transition take the offset after it;
    /// repeated local times take the standard-time reading.
    ///
    /// ## Errors
    /// Same as [`Self::offset_for`], plus [`TimezoneError::InvalidValue`] for
    /// times chrono cannot represent.
    pub fn offset_in(&mut self, tzid: &str, local: &CivilTime) -> TimezoneResult<i32> {
        if let Some(index) = self.indexes.get_mut(tzid) {
            return index.utc_offset(local);
        }

        let tz = self.resolve(tzid)?;
        let naive = local
            .normalized()
            .to_naive()
            .ok_or_else(|| TimezoneError::InvalidValue("DATE-TIME", local.to_string()))?;
        iana_offset(tz, naive)
            .ok_or_else(|| TimezoneError::InvalidValue("DATE-TIME", local.to_string()))
    }

    /// ## Summary
    /// Converts UTC civil time `utc` to local time in zone `tzid`.
    ///
    /// ## Errors
    /// Same as [`Self::offset_in`].
    pub fn local_in(&mut self, tzid: &str, utc: &CivilTime) -> TimezoneResult<CivilTime> {
        if let Some(index) = self.indexes.get_mut(tzid) {
            return index.utc_to_local(utc);
        }

        let tz = self.resolve(tzid)?;
        let naive = utc
            .normalized()
            .to_naive()
            .ok_or_else(|| TimezoneError::InvalidValue("DATE-TIME", utc.to_string()))?;
        Ok(CivilTime::from_naive(&tz.from_utc_datetime(&naive).naive_local()))
    }

    /// ## Summary
    /// Converts a data-model date-time to UTC civil time.
    ///
    /// ## Errors
    /// Same as [`Self::offset_for`].
    pub fn utc_for(&mut self, value: &DateTime) -> TimezoneResult<CivilTime> {
        let offset = self.offset_for(value)?;
        let mut utc = value.civil.normalized();
        utc.adjust(0, 0, 0, -offset);
        Ok(utc)
    }
}

fn iana_offset(tz: Tz, naive: NaiveDateTime) -> Option<i32> {
    match tz.from_local_datetime(&naive) {
        // Fall-back folds resolve to the later instant, which is standard time.
        LocalResult::Single(dt) | LocalResult::Ambiguous(_, dt) => {
            Some(dt.offset().fix().local_minus_utc())
        }
        // Inside a gap: the offset after the transition.
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                Some(dt.offset().fix().local_minus_utc())
            }
            LocalResult::None => None,
        },
    }
}

/// Normalizes common CalDAV/iCalendar TZIDs to canonical IANA names.
///
/// Strips vendor prefixes such as `/mozilla.org/`, maps Windows zone names
/// and canonicalizes IANA aliases. Unknown identifiers come back with only
/// the prefix removed.
#[must_use]
pub fn normalize_tzid(tzid: &str) -> String {
    let stripped = tzid
        .strip_prefix("/mozilla.org/")
        .or_else(|| tzid.strip_prefix("/softwarestudio.org/"))
        .or_else(|| tzid.strip_prefix("/citadel.org/"))
        .unwrap_or(tzid);

    // Prefixed forms sometimes carry a date component: "20070129_1/Europe/Paris".
    let stripped = match stripped.split_once('/') {
        Some((head, rest)) if head.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => stripped,
    };

    let iana_parser = IanaParserExtended::new();
    let windows = WindowsParser::new()
        .parse(stripped, None)
        .and_then(|tz| iana_parser.iter().find(|entry| entry.time_zone == tz));
    if let Some(entry) = windows {
        return entry.canonical.to_string();
    }

    // Aliases such as Europe/Kiev come back as their canonical name.
    let parsed = iana_parser.parse(stripped);
    if parsed.time_zone == icu::time::TimeZone::UNKNOWN {
        stripped.to_string()
    } else {
        parsed.canonical.to_string()
    }
}

/// ## Summary
/// Converts a local datetime to UTC using the specified timezone.
///
/// A registered VTIMEZONE with the given TZID wins over the IANA database.
///
/// ## Errors
/// Returns an error if the timezone cannot be resolved or the time cannot be
/// represented.
pub fn convert_to_utc(
    local_time: NaiveDateTime,
    tzid: &str,
    resolver: &mut TimeZoneResolver,
) -> TimezoneResult<chrono::DateTime<Utc>> {
    let offset = resolver.offset_in(tzid, &CivilTime::from_naive(&local_time))?;
    let utc = local_time - Duration::seconds(i64::from(offset));
    Ok(chrono::DateTime::from_naive_utc_and_offset(utc, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfc::ical::core::{Component, ComponentKind, Property, UtcOffset};

    fn naive(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid date")
    }

    fn build_fixed_vtimezone(tzid: &str, seconds: i32) -> Component {
        let mut timezone = Component::new(ComponentKind::Timezone);
        timezone.add_property(Property::text("TZID", tzid));

        let mut standard = Component::new(ComponentKind::Standard);
        standard.add_property(Property::datetime(
            "DTSTART",
            DateTime::floating(CivilTime::new(1970, 1, 1, 0, 0, 0)),
        ));
        let offset = UtcOffset::from_seconds(seconds);
        standard.add_property(Property::utc_offset("TZOFFSETFROM", offset));
        standard.add_property(Property::utc_offset("TZOFFSETTO", offset));

        timezone.add_child(standard);
        timezone
    }

    #[test]
    fn test_resolve_standard_timezone() {
        let mut resolver = TimeZoneResolver::default();
        let tz = resolver.resolve("America/New_York").expect("should resolve");
        assert_eq!(tz, Tz::America__New_York);
        assert!(resolver.cache.contains_key("America/New_York"));
    }

    #[test]
    fn test_resolve_unknown_timezone() {
        let mut resolver = TimeZoneResolver::default();
        assert_eq!(
            resolver.resolve("Mars/Olympus_Mons"),
            Err(TimezoneError::UnknownTimezone("Mars/Olympus_Mons".into()))
        );
    }

    #[test]
    fn test_normalize_windows_timezone() {
        assert_eq!(normalize_tzid("Eastern Standard Time"), "America/New_York");
        assert_eq!(normalize_tzid("Pacific Standard Time"), "America/Los_Angeles");
    }

    #[test]
    fn test_normalize_windows_timezone_beyond_us_zones() {
        let mut resolver = TimeZoneResolver::default();
        // Central Europe is UTC+1 in winter; India has no DST.
        let january = CivilTime::new(2026, 1, 15, 12, 0, 0);
        assert_eq!(
            resolver.offset_in("Central Europe Standard Time", &january),
            Ok(3600)
        );
        assert_eq!(
            resolver.offset_in("India Standard Time", &january),
            Ok(19_800)
        );
        assert_eq!(
            resolver.offset_in("Tokyo Standard Time", &january),
            Ok(32_400)
        );
    }

    #[test]
    fn test_normalize_iana_alias() {
        let mut resolver = TimeZoneResolver::default();
        let tz = resolver.resolve("US/Eastern").expect("alias should resolve");
        assert_eq!(
            tz.offset_from_utc_datetime(&naive(2026, 1, 15, 12)).fix().local_minus_utc(),
            -18_000
        );
    }

    #[test]
    fn test_normalize_vendor_prefix() {
        assert_eq!(normalize_tzid("/mozilla.org/America/New_York"), "America/New_York");
        assert_eq!(
            normalize_tzid("/mozilla.org/20070129_1/Europe/Paris"),
            "Europe/Paris"
        );
        assert_eq!(normalize_tzid("Europe/Berlin"), "Europe/Berlin");
    }

    #[test]
    fn test_convert_to_utc_basic() {
        let mut resolver = TimeZoneResolver::default();
        let utc = convert_to_utc(naive(2026, 1, 15, 10), "America/New_York", &mut resolver)
            .expect("conversion should succeed");
        assert_eq!(utc.naive_utc(), naive(2026, 1, 15, 15));
    }

    #[test]
    fn test_convert_to_utc_dst() {
        let mut resolver = TimeZoneResolver::default();
        let utc = convert_to_utc(naive(2026, 7, 15, 10), "America/New_York", &mut resolver)
            .expect("conversion should succeed");
        assert_eq!(utc.naive_utc(), naive(2026, 7, 15, 14));
    }

    #[test]
    fn test_gap_uses_offset_after_transition() {
        let mut resolver = TimeZoneResolver::default();
        let offset = resolver
            .offset_in("America/New_York", &CivilTime::new(2026, 3, 8, 2, 30, 0))
            .expect("offset");
        assert_eq!(offset, -14_400);
    }

    #[test]
    fn test_convert_to_utc_prefers_vtimezone() {
        let mut calendar = ICalendar::default();
        calendar.root.add_child(build_fixed_vtimezone("America/New_York", 7200));

        let mut resolver = TimeZoneResolver::from_calendar(&calendar, TimezoneConfig::default())
            .expect("valid VTIMEZONE");
        assert!(resolver.has_index("America/New_York"));

        let utc = convert_to_utc(naive(2026, 1, 15, 10), "America/New_York", &mut resolver)
            .expect("conversion should succeed");
        assert_eq!(utc.naive_utc(), naive(2026, 1, 15, 8));
    }

    #[test]
    fn test_utc_and_floating_have_zero_offset() {
        let mut resolver = TimeZoneResolver::default();
        let civil = CivilTime::new(2026, 6, 1, 12, 0, 0);
        assert_eq!(resolver.offset_for(&DateTime::utc(civil)), Ok(0));
        assert_eq!(resolver.offset_for(&DateTime::floating(civil)), Ok(0));
    }

    #[test]
    fn test_local_in_zone() {
        let mut resolver = TimeZoneResolver::default();
        let utc = CivilTime::new(2026, 1, 5, 10, 0, 0);
        assert_eq!(
            resolver.local_in("America/New_York", &utc),
            Ok(CivilTime::new(2026, 1, 5, 5, 0, 0))
        );
        assert_eq!(
            resolver.local_in("America/New_York", &CivilTime::new(2026, 7, 1, 12, 0, 0)),
            Ok(CivilTime::new(2026, 7, 1, 8, 0, 0))
        );
    }

    #[test]
    fn test_local_in_prefers_vtimezone() {
        let mut calendar = ICalendar::default();
        calendar.root.add_child(build_fixed_vtimezone("America/New_York", 7200));
        let mut resolver = TimeZoneResolver::from_calendar(&calendar, TimezoneConfig::default())
            .expect("valid VTIMEZONE");
        assert_eq!(
            resolver.local_in("America/New_York", &CivilTime::new(2026, 1, 5, 10, 0, 0)),
            Ok(CivilTime::new(2026, 1, 5, 12, 0, 0))
        );
    }

    #[test]
    fn test_utc_for_zoned_value() {
        let mut resolver = TimeZoneResolver::default();
        let value = DateTime::zoned(CivilTime::new(2026, 12, 31, 22, 0, 0), "Europe/Berlin");
        let utc = resolver.utc_for(&value).expect("conversion");
        assert_eq!(utc, CivilTime::new(2026, 12, 31, 21, 0, 0));
    }
}

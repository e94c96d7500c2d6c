//! Recurrence set scenarios built from parsed components.

use super::fixtures::{WEEKLY_MEETING, iterator, parse_fixture};
use crate::error::RfcError;
use crate::rfc::ical::core::CivilTime;
use crate::rfc::ical::expand::{
    RecurrenceError, RecurrenceResult, RecurrenceSetExpander, RecurrenceSetOptions,
    RecurrenceSetState,
};
use crate::rfc::ical::parse::parse;

fn expand(expander: &mut RecurrenceSetExpander, limit: usize) -> Vec<CivilTime> {
    expander
        .take(limit)
        .collect::<RecurrenceResult<Vec<_>>>()
        .expect("expansion succeeds")
}

#[test_log::test]
fn component_rules_rdates_and_exdates() {
    let calendar = parse_fixture(WEEKLY_MEETING);
    let event = calendar.events()[0];
    let mut expander = RecurrenceSetExpander::from_component(event).expect("expander builds");

    assert_eq!(
        expand(&mut expander, 10),
        vec![
            CivilTime::new(2026, 1, 5, 9, 0, 0),
            CivilTime::new(2026, 1, 14, 9, 0, 0),
            CivilTime::new(2026, 1, 19, 9, 0, 0),
            CivilTime::new(2026, 1, 26, 9, 0, 0),
        ]
    );
    assert!(expander.is_complete());
    assert_eq!(expander.next_occurrence(), Ok(None));
}

#[test]
fn excluded_dates_are_never_emitted() {
    let excluded = vec![
        CivilTime::date(2026, 2, 10),
        CivilTime::date(2026, 4, 14),
        CivilTime::date(2026, 5, 12),
    ];
    let mut expander = RecurrenceSetExpander::new(RecurrenceSetOptions {
        start: Some(CivilTime::date(2026, 1, 13)),
        rule_iterators: Some(vec![iterator(
            "FREQ=MONTHLY;BYDAY=2TU",
            CivilTime::date(2026, 1, 13),
        )]),
        excluded_dates: excluded.clone(),
        ..RecurrenceSetOptions::default()
    })
    .expect("expander builds");

    let got = expand(&mut expander, 12);
    assert_eq!(got.len(), 12);
    assert!(got.iter().all(|occurrence| !excluded.contains(occurrence)));
    assert_eq!(got[1], CivilTime::date(2026, 3, 10));
}

#[test]
fn set_occurrences_are_strictly_increasing() {
    let start = CivilTime::new(2026, 1, 1, 9, 0, 0);
    let mut expander = RecurrenceSetExpander::new(RecurrenceSetOptions {
        start: Some(start),
        rule_iterators: Some(vec![
            iterator("FREQ=WEEKLY;BYDAY=TH", start),
            iterator("FREQ=MONTHLY;BYMONTHDAY=1,15", start),
            iterator("FREQ=DAILY;INTERVAL=9", start),
        ]),
        extra_dates: vec![
            CivilTime::new(2026, 1, 15, 9, 0, 0),
            CivilTime::new(2026, 2, 2, 12, 0, 0),
        ],
        ..RecurrenceSetOptions::default()
    })
    .expect("expander builds");

    let got = expand(&mut expander, 80);
    assert_eq!(got.len(), 80);
    for pair in got.windows(2) {
        assert!(pair[0] < pair[1], "{} then {}", pair[0], pair[1]);
    }
}

#[test]
fn serialized_set_state_resumes() {
    let calendar = parse_fixture(WEEKLY_MEETING);
    let event = calendar.events()[0];
    let reference = expand(&mut RecurrenceSetExpander::from_component(event).expect("builds"), 10);

    for k in 0..=reference.len() {
        let mut original = RecurrenceSetExpander::from_component(event).expect("builds");
        let mut sequence = expand(&mut original, k);

        let json = serde_json::to_string(&original.state()).expect("state serializes");
        let state: RecurrenceSetState = serde_json::from_str(&json).expect("state deserializes");
        let mut resumed = RecurrenceSetExpander::from_state(state).expect("state restores");
        sequence.extend(expand(&mut resumed, 10));

        assert_eq!(sequence, reference, "k={k}");
    }
}

#[test]
fn occurrences_between_window() {
    let start = CivilTime::date(2026, 1, 1);
    let mut expander = RecurrenceSetExpander::new(RecurrenceSetOptions {
        start: Some(start),
        rule_iterators: Some(vec![iterator("FREQ=DAILY", start)]),
        ..RecurrenceSetOptions::default()
    })
    .expect("expander builds");

    let got = expander
        .occurrences_between(CivilTime::date(2026, 1, 10), CivilTime::date(2026, 1, 12), 100)
        .expect("window expands");
    assert_eq!(
        got,
        vec![
            CivilTime::date(2026, 1, 10),
            CivilTime::date(2026, 1, 11),
            CivilTime::date(2026, 1, 12),
        ]
    );
}

#[test]
fn malformed_component_rule_fails_construction() {
    let calendar = parse(
        "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
DTSTART:20260101T090000\r\n\
RRULE:FREQ=MONTHLY;BYDAY=6MO\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n",
    )
    .expect("document parses");
    let result = RecurrenceSetExpander::from_component(calendar.events()[0]);
    assert!(matches!(
        result,
        Err(RfcError::RecurrenceError(RecurrenceError::MalformedRule(_)))
    ));
}

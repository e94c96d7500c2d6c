//! Errors raised while expanding recurrences and time-zone transitions.

/// Error raised by the recurrence iterator and set expander.
///
/// Every variant is terminal for the iterator that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecurrenceError {
    /// The rule's by-parts cannot be combined or cannot be satisfied.
    #[error("Malformed recurrence rule: {0}")]
    MalformedRule(String),

    /// The iterator produced the same instant twice in a row.
    #[error("Recurrence invariant violated: {0}")]
    InvariantViolation(&'static str),

    /// The set expander was built without a start time.
    #[error("dtstart (Time) must be given")]
    MissingStart,

    /// The set expander was built without rule iterators or a component.
    #[error("ruleIterators or component must be given")]
    MissingSource,

    /// The set expander skipped too many consecutive candidates.
    #[error("Too many consecutive skipped candidates ({0})")]
    TooManyAttempts(usize),

    /// A snapshot was written by an incompatible version.
    #[error("Unsupported state version {found} (expected {expected})")]
    UnsupportedStateVersion { found: u32, expected: u32 },
}

pub type RecurrenceResult<T> = Result<T, RecurrenceError>;

/// Error during VTIMEZONE interpretation or zone resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimezoneError {
    /// Missing required TZID property.
    #[error("Missing required TZID property")]
    MissingTzid,

    /// Missing STANDARD or DAYLIGHT sub-component.
    #[error("VTIMEZONE must have at least one STANDARD or DAYLIGHT component")]
    NoObservances,

    /// Missing required property in observance.
    #[error("Missing required property {0} in {1} component")]
    MissingProperty(&'static str, &'static str),

    /// Invalid property value.
    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    /// Neither a registered VTIMEZONE nor the IANA database knows the TZID.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
}

pub type TimezoneResult<T> = Result<T, TimezoneError>;

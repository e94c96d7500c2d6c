use thiserror::Error;

use crate::rfc::ical::expand::{RecurrenceError, TimezoneError};
use crate::rfc::ical::parse::ParseError;

/// Errors raised anywhere in the RFC layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RfcError {
    #[error(transparent)]
    ParseError(#[from] ParseError),

    #[error(transparent)]
    RecurrenceError(#[from] RecurrenceError),

    #[error(transparent)]
    TimezoneError(#[from] TimezoneError),
}

pub type RfcResult<T> = std::result::Result<T, RfcError>;

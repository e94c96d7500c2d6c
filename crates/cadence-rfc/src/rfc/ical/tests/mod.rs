//! Scenario tests across parsing, recurrence expansion and time zones.

mod fixtures;
mod set;

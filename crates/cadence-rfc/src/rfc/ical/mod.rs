//! iCalendar (RFC 5545) support.

pub mod core;
pub mod expand;
pub mod parse;

#[cfg(test)]
mod tests;

//! iCalendar parsing primitives (RFC 5545).
//!
//! - Lexer: content line splitting with unfolding
//! - Values: DATE, DATE-TIME, UTC-OFFSET and RECUR value parsing
//! - Parser: full document parsing into the component tree

mod error;
mod lexer;
mod parser;
mod values;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use lexer::{parse_content_line, split_lines};
pub use parser::parse;
pub use values::{
    parse_date, parse_date_or_datetime, parse_datetime, parse_integer, parse_rrule,
    parse_utc_offset, unescape_text,
};

//! Content line lexer for iCalendar (RFC 5545 §3.1).
//!
//! Splits input into unfolded content lines and tokenizes each line into
//! name, parameters and raw value.

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{ContentLine, Parameter};

/// ## Summary
/// Splits input into logical content lines, merging folded continuations.
///
/// Both CRLF and bare LF endings are accepted. A line starting with SPACE or
/// HTAB continues the previous line with that single whitespace character
/// removed. Each entry carries the 1-based physical line number it started on.
#[must_use]
pub fn split_lines(input: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();

    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        let continuation = line.strip_prefix([' ', '\t']);
        match (continuation, lines.last_mut()) {
            (Some(rest), Some((_, prev))) => prev.push_str(rest),
            (Some(rest), None) => lines.push((idx + 1, rest.to_string())),
            (None, _) => lines.push((idx + 1, line.to_string())),
        }
    }

    lines
}

/// ## Summary
/// Parses a single unfolded content line: `name *(";" param) ":" value`.
///
/// ## Errors
/// Returns an error if the name is missing or contains invalid characters,
/// a parameter is malformed, or the value separator is missing.
pub fn parse_content_line(line: &str, line_num: usize) -> ParseResult<ContentLine> {
    let name_end = line.find([';', ':']).unwrap_or(line.len());
    if let Some(bad) = line[..name_end]
        .char_indices()
        .find(|&(_, c)| !is_name_char(c))
    {
        return Err(ParseError::new(
            ParseErrorKind::InvalidPropertyName,
            line_num,
            bad.0 + 1,
        ));
    }
    if name_end == 0 {
        return Err(ParseError::new(
            ParseErrorKind::MissingPropertyName,
            line_num,
            1,
        ));
    }

    let mut params = Vec::new();
    let mut pos = name_end;
    loop {
        match line.as_bytes().get(pos) {
            Some(b':') => break,
            Some(b';') => {
                let (param, next) = parse_parameter(line, pos + 1, line_num)?;
                params.push(param);
                pos = next;
            }
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::MissingColon,
                    line_num,
                    line.len(),
                ));
            }
        }
    }

    Ok(ContentLine {
        name: line[..name_end].to_ascii_uppercase(),
        params,
        raw_value: line[pos + 1..].to_string(),
    })
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// ## Summary
/// Parses one `NAME=value *("," value)` parameter starting at byte `start`.
///
/// Returns the parameter and the byte position of the terminating `;` or `:`.
///
/// ## Errors
/// Returns `InvalidParameter` for a malformed name or stray character,
/// `UnclosedQuote` for an unterminated quoted value, and `MissingColon` when
/// the line ends inside the parameter list.
fn parse_parameter(line: &str, start: usize, line_num: usize) -> ParseResult<(Parameter, usize)> {
    let rest = &line[start..];
    let eq = rest
        .find('=')
        .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidParameter, line_num, start + 1))?;
    let name = &rest[..eq];
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(ParseError::new(
            ParseErrorKind::InvalidParameter,
            line_num,
            start + 1,
        ));
    }

    let mut values = Vec::new();
    let mut pos = start + eq + 1;
    loop {
        let (value, next) = parse_param_value(line, pos, line_num)?;
        values.push(value);
        match line[next..].chars().next() {
            Some(',') => pos = next + 1,
            Some(';' | ':') => return Ok((Parameter::with_values(name, values), next)),
            Some(c) => {
                return Err(
                    ParseError::new(ParseErrorKind::InvalidParameter, line_num, next + 1)
                        .with_context(format!("unexpected character '{c}'")),
                );
            }
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::MissingColon,
                    line_num,
                    line.len(),
                ));
            }
        }
    }
}

/// Parses a possibly quoted parameter value, returning it and the position
/// just past it. Quoted values decode RFC 6868 caret escapes.
fn parse_param_value(line: &str, start: usize, line_num: usize) -> ParseResult<(String, usize)> {
    let rest = &line[start..];
    let Some(quoted) = rest.strip_prefix('"') else {
        let end = rest.find([',', ';', ':']).unwrap_or(rest.len());
        return Ok((rest[..end].to_string(), start + end));
    };

    let close = quoted
        .find('"')
        .ok_or_else(|| ParseError::new(ParseErrorKind::UnclosedQuote, line_num, start + 1))?;

    let mut value = String::with_capacity(close);
    let mut chars = quoted[..close].chars().peekable();
    while let Some(c) = chars.next() {
        if c != '^' {
            value.push(c);
            continue;
        }
        match chars.peek() {
            Some('^') => value.push('^'),
            Some('n') => value.push('\n'),
            Some('\'') => value.push('"'),
            _ => {
                value.push('^');
                continue;
            }
        }
        chars.next();
    }

    Ok((value, start + 1 + close + 1))
}

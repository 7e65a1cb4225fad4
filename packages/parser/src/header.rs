//! Header declarations shared by every format: the numeric file format and
//! the product release that wrote the file.

use crate::error::{ParseError, ParseResult};
use crate::scan::find_token;
use once_cell::sync::Lazy;
use regex::Regex;

static FORMAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d)[.,]?(\d\d)").unwrap());
static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#\s*LyX\s+(\d[0-9A-Za-z.]*)").unwrap());

/// Numeric format of a `\lyxformat` value.
///
/// Old releases wrote `2.15`, newer ones `221`; a bare `2` is format 200.
pub fn parse_format(value: &str) -> ParseResult<u32> {
    let value = value.trim();
    if value == "2" {
        return Ok(200);
    }
    let captures = FORMAT_RE
        .captures(value)
        .ok_or_else(|| ParseError::invalid_format(value))?;
    format!("{}{}", &captures[1], &captures[2])
        .parse()
        .map_err(|_| ParseError::invalid_format(value))
}

/// Render a format the way its era wrote it: `2.15` up to 217, `221` after.
pub fn format_designation(format: u32) -> String {
    if format <= 217 {
        format!("{}.{:02}", format / 100, format % 100)
    } else {
        format.to_string()
    }
}

/// Format declared by the `\lyxformat` line of a header.
pub fn read_format<S: AsRef<str>>(header: &[S]) -> ParseResult<u32> {
    let i = find_token(header, "\\lyxformat", 0..).ok_or(ParseError::MissingFormat)?;
    let line = header[i].as_ref();
    parse_format(line["\\lyxformat".len()..].trim())
}

/// Release named by a leading `#LyX 1.3 created this file` comment.
pub fn read_version(line: &str) -> Option<String> {
    VERSION_RE
        .captures(line)
        .map(|captures| captures[1].trim_end_matches('.').to_string())
}

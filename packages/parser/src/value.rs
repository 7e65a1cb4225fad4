//! Parameter extraction and in-place line edits.

use crate::scan::{find_token_exact, span};
use std::ops::RangeBounds;

/// Second whitespace-separated field of the first line in `range` whose
/// leading words are `token`, or an empty string.
pub fn get_value<S: AsRef<str>>(
    lines: &[S],
    token: &str,
    range: impl RangeBounds<usize>,
) -> String {
    find_token_exact(lines, token, range)
        .and_then(|i| lines[i].as_ref().split_whitespace().nth(1))
        .unwrap_or("")
        .to_string()
}

/// Everything after `token` on the first matching line, trimmed.
pub fn get_value_string<S: AsRef<str>>(
    lines: &[S],
    token: &str,
    range: impl RangeBounds<usize>,
) -> String {
    find_token_exact(lines, token, range)
        .map(|i| rest_after(lines[i].as_ref(), token))
        .unwrap_or_default()
}

fn rest_after(line: &str, token: &str) -> String {
    let mut rest = line;
    for word in token.split_whitespace() {
        rest = rest.trim_start();
        rest = rest.strip_prefix(word).unwrap_or(rest);
    }
    rest.trim().to_string()
}

/// Like [`get_value_string`] with one pair of surrounding double quotes removed.
pub fn get_quoted_value<S: AsRef<str>>(
    lines: &[S],
    token: &str,
    range: impl RangeBounds<usize>,
) -> String {
    let value = get_value_string(lines, token, range);
    strip_quotes(&value).to_string()
}

pub fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Remove the first line in `start..end` whose leading words are `token`.
///
/// Returns the end bound adjusted for the removal, so a caller that keeps
/// scanning up to the returned index stays aligned with the shifted list.
pub fn del_token(lines: &mut Vec<String>, token: &str, start: usize, end: usize) -> usize {
    match find_token_exact(lines, token, start..end) {
        Some(k) => {
            lines.remove(k);
            end - 1
        }
        None => end,
    }
}

/// Remove every line in `range` that starts with `token`; returns the count.
pub fn del_all_tokens(
    lines: &mut Vec<String>,
    token: &str,
    range: impl RangeBounds<usize>,
) -> usize {
    let (start, mut end) = span(range, lines.len());
    let mut removed = 0;
    let mut i = start;
    while i < end {
        if lines[i].starts_with(token) {
            lines.remove(i);
            end -= 1;
            removed += 1;
        } else {
            i += 1;
        }
    }
    removed
}

/// Value of `option="value"` on a tabular markup line.
pub fn get_option<'a>(line: &'a str, option: &str) -> Option<&'a str> {
    let pattern = format!(" {}=\"", option);
    let start = line.find(&pattern)? + pattern.len();
    let len = line[start..].find('"')?;
    Some(&line[start..start + len])
}

/// Set `option="value"`, replacing an existing value or appending the
/// attribute before the closing `>`.
pub fn set_option(line: &str, option: &str, value: &str) -> String {
    let pattern = format!(" {}=\"", option);
    if let Some(pos) = line.find(&pattern) {
        let start = pos + pattern.len();
        if let Some(len) = line[start..].find('"') {
            return format!("{}{}{}", &line[..start], value, &line[start + len..]);
        }
    }
    match line.rfind('>') {
        Some(close) => format!("{} {}=\"{}\"{}", &line[..close], option, value, &line[close..]),
        None => format!("{} {}=\"{}\"", line, option, value),
    }
}

/// Drop `option="..."` from a markup line, leaving the rest untouched.
pub fn remove_option(line: &str, option: &str) -> String {
    let pattern = format!(" {}=\"", option);
    let Some(pos) = line.find(&pattern) else {
        return line.to_string();
    };
    let start = pos + pattern.len();
    match line[start..].find('"') {
        Some(len) => format!("{}{}", &line[..pos], &line[start + len + 1..]),
        None => line.to_string(),
    }
}

//! Token scanning over a flat list of document lines.
//!
//! Every search takes a line list and a range of indices to look in. A search
//! that finds nothing returns `None`; no function here panics on an empty
//! list, an inverted range or a range that runs past the end of the list.
//!
//! Nested blocks (`\begin_inset ... \end_inset`, `\begin_layout ...
//! \end_layout`, `<lyxtabular ... </lyxtabular>`) are never parsed into a
//! tree. They are matched with a depth counter by [`find_end_of`] and
//! [`find_beginning_of`].

use regex::Regex;
use std::ops::{Bound, RangeBounds};

/// Resolve a range against a list of `len` lines, clamping both ends.
pub(crate) fn span(range: impl RangeBounds<usize>, len: usize) -> (usize, usize) {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e.saturating_add(1),
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };
    (start.min(len), end.min(len))
}

/// True when `line` starts with `token`.
pub fn check_token(line: &str, token: &str) -> bool {
    line.starts_with(token)
}

/// True when the leading whitespace-separated words of `line` are exactly the
/// words of `token`.
fn check_token_exact(line: &str, token: &str) -> bool {
    let mut words = line.split_whitespace();
    token.split_whitespace().all(|t| words.next() == Some(t))
}

/// True unless the line is empty or made only of whitespace.
pub fn is_nonempty_line(line: &str) -> bool {
    !line.trim().is_empty()
}

/// Index of the first line in `range` that starts with `token`.
pub fn find_token<S: AsRef<str>>(
    lines: &[S],
    token: &str,
    range: impl RangeBounds<usize>,
) -> Option<usize> {
    let (start, end) = span(range, lines.len());
    (start..end).find(|&i| check_token(lines[i].as_ref(), token))
}

/// Like [`find_token`], but `token` must match whole words: `\begin_inset
/// Float` does not match `\begin_inset FloatList`.
pub fn find_token_exact<S: AsRef<str>>(
    lines: &[S],
    token: &str,
    range: impl RangeBounds<usize>,
) -> Option<usize> {
    let (start, end) = span(range, lines.len());
    (start..end).find(|&i| check_token_exact(lines[i].as_ref(), token))
}

/// Index of the first line in `range` that starts with any of `tokens`.
pub fn find_tokens<S: AsRef<str>>(
    lines: &[S],
    tokens: &[&str],
    range: impl RangeBounds<usize>,
) -> Option<usize> {
    let (start, end) = span(range, lines.len());
    (start..end).find(|&i| tokens.iter().any(|t| check_token(lines[i].as_ref(), t)))
}

pub fn find_tokens_exact<S: AsRef<str>>(
    lines: &[S],
    tokens: &[&str],
    range: impl RangeBounds<usize>,
) -> Option<usize> {
    let (start, end) = span(range, lines.len());
    (start..end).find(|&i| {
        tokens
            .iter()
            .any(|t| check_token_exact(lines[i].as_ref(), t))
    })
}

/// Scan from `start` (inclusive) toward index 0.
pub fn find_token_backwards<S: AsRef<str>>(
    lines: &[S],
    token: &str,
    start: usize,
) -> Option<usize> {
    find_tokens_backwards(lines, &[token], start)
}

pub fn find_tokens_backwards<S: AsRef<str>>(
    lines: &[S],
    tokens: &[&str],
    start: usize,
) -> Option<usize> {
    if lines.is_empty() {
        return None;
    }
    let start = start.min(lines.len() - 1);
    (0..=start)
        .rev()
        .find(|&i| tokens.iter().any(|t| check_token(lines[i].as_ref(), t)))
}

/// Index of the first line in `range` matched by `pattern`.
pub fn find_re<S: AsRef<str>>(
    lines: &[S],
    pattern: &Regex,
    range: impl RangeBounds<usize>,
) -> Option<usize> {
    let (start, end) = span(range, lines.len());
    (start..end).find(|&i| pattern.is_match(lines[i].as_ref()))
}

/// Index of the first line at or after `start` with visible content.
pub fn find_nonempty_line<S: AsRef<str>>(lines: &[S], start: usize) -> Option<usize> {
    (start..lines.len()).find(|&i| is_nonempty_line(lines[i].as_ref()))
}

/// Find the `end` marker that closes the `begin` marker on line `start`.
///
/// The depth counter starts at one for the line at `start`, goes up on every
/// further `begin` and down on every `end`; the line where it reaches zero is
/// returned. An unterminated block yields `None`.
pub fn find_end_of<S: AsRef<str>>(
    lines: &[S],
    start: usize,
    begin: &str,
    end: &str,
) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = start;
    loop {
        i = find_tokens(lines, &[end, begin], i + 1..)?;
        if check_token(lines[i].as_ref(), end) {
            depth -= 1;
        } else {
            depth += 1;
        }
        if depth == 0 {
            return Some(i);
        }
    }
}

/// Backwards counterpart of [`find_end_of`]: `start` is the line of an `end`
/// marker (or any line inside the block) and the matching `begin` is returned.
pub fn find_beginning_of<S: AsRef<str>>(
    lines: &[S],
    start: usize,
    begin: &str,
    end: &str,
) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = start;
    while i > 0 {
        i = find_tokens_backwards(lines, &[begin, end], i - 1)?;
        if check_token(lines[i].as_ref(), begin) {
            depth -= 1;
        } else {
            depth += 1;
        }
        if depth == 0 {
            return Some(i);
        }
    }
    None
}

pub fn find_end_of_inset<S: AsRef<str>>(lines: &[S], start: usize) -> Option<usize> {
    find_end_of(lines, start, "\\begin_inset", "\\end_inset")
}

pub fn find_end_of_layout<S: AsRef<str>>(lines: &[S], start: usize) -> Option<usize> {
    find_end_of(lines, start, "\\begin_layout", "\\end_layout")
}

pub fn find_end_of_tabular<S: AsRef<str>>(lines: &[S], start: usize) -> Option<usize> {
    find_end_of(lines, start, "<lyxtabular", "</lyxtabular")
}

pub fn find_beginning_of_inset<S: AsRef<str>>(lines: &[S], start: usize) -> Option<usize> {
    find_beginning_of(lines, start, "\\begin_inset", "\\end_inset")
}

pub fn find_beginning_of_layout<S: AsRef<str>>(lines: &[S], start: usize) -> Option<usize> {
    find_beginning_of(lines, start, "\\begin_layout", "\\end_layout")
}

/// A named block located by its begin and end lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

/// The innermost inset that contains line `i`.
pub fn get_containing_inset<S: AsRef<str>>(lines: &[S], i: usize) -> Option<Block> {
    get_containing(lines, i, "\\begin_inset", "\\end_inset")
}

/// The innermost paragraph (`\begin_layout`) that contains line `i`.
pub fn get_containing_layout<S: AsRef<str>>(lines: &[S], i: usize) -> Option<Block> {
    get_containing(lines, i, "\\begin_layout", "\\end_layout")
}

fn get_containing<S: AsRef<str>>(lines: &[S], i: usize, begin: &str, end: &str) -> Option<Block> {
    let mut j = i;
    loop {
        let start = find_token_backwards(lines, begin, j)?;
        match find_end_of(lines, start, begin, end) {
            Some(stop) if stop >= i => {
                let name = lines[start]
                    .as_ref()
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("")
                    .to_string();
                return Some(Block {
                    name,
                    start,
                    end: stop,
                });
            }
            _ if start == 0 => return None,
            _ => j = start - 1,
        }
    }
}

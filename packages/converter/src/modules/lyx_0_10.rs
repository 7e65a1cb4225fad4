//! Format 210 as written by LyX 0.9 and 0.10.
//!
//! Older writers packed several declarations onto one line; from here on
//! every header declaration and every body token gets a line of its own.

use crate::markup::split_tokens;
use crate::step::{legacy_step, ConverterModule};
use lyx2lyx_common::ConvertResult;

/// Body tokens that stand alone. Tokens not listed here or in
/// `ONE_ARGUMENT` consume the rest of their line.
const NO_ARGUMENT: &[&str] = &[
    "backslash",
    "begin_deeper",
    "end_deeper",
    "end_float",
    "end_inset",
    "hfill",
    "newline",
    "protected_separator",
    "the_end",
];

const ONE_ARGUMENT: &[&str] = &[
    "bar",
    "begin_float",
    "family",
    "latex",
    "shape",
    "size",
    "series",
    "cursor",
    "emph",
    "noun",
    "color",
    "lang",
    "underbar",
];

fn regularise_header(header: &mut Vec<String>, _body: &mut Vec<String>) -> ConvertResult<()> {
    let mut i = 0;
    while i < header.len() {
        if !header[i].starts_with('\\') {
            i += 1;
            continue;
        }
        let tokens = split_tokens(&header[i]);
        let count = tokens.len().max(1);
        if tokens.len() > 1 {
            header.splice(i..=i, tokens);
        }
        i += count;
    }
    Ok(())
}

fn regularise_body(_header: &mut Vec<String>, body: &mut Vec<String>) -> ConvertResult<()> {
    let mut i = 0;
    while i < body.len() {
        let pieces = split_body_line(&body[i]);
        let count = pieces.len().max(1);
        if pieces.len() > 1 {
            body.splice(i..=i, pieces);
        }
        i += count;
    }
    Ok(())
}

/// Position of the next space or backslash at or after `from`.
fn next_break(line: &str, from: usize) -> usize {
    let from = from.min(line.len());
    line[from..]
        .find([' ', '\\'])
        .map_or(line.len(), |k| k + from)
}

fn split_body_line(line: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut j = 0;
    while j < line.len() {
        let Some(k) = line[j..].find('\\').map(|k| k + j) else {
            pieces.push(line[j..].to_string());
            break;
        };
        if k != j {
            pieces.push(line[j..k].to_string());
            j = k;
        }

        let mut end = next_break(line, j + 1);
        let token = &line[j + 1..end];
        if ONE_ARGUMENT.contains(&token) {
            end = next_break(line, end + 1);
        } else if !NO_ARGUMENT.contains(&token) {
            pieces.push(line[j..].to_string());
            break;
        }
        pieces.push(line[j..end].to_string());
        j = end;
        if line[j..].starts_with(' ') {
            j += 1;
        }
    }
    if pieces.is_empty() {
        pieces.push(line.to_string());
    }
    pieces
}

pub static MODULE: ConverterModule = ConverterModule {
    name: "0_10",
    convert: &[legacy_step!(210 => [regularise_header, regularise_body])],
    revert: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_regularise_header() {
        let mut header = lines(&[
            "#LyX 0.10 created this file",
            "\\textclass article \\language default",
        ]);
        regularise_header(&mut header, &mut Vec::new()).unwrap();
        assert_eq!(
            header,
            vec!["#LyX 0.10 created this file", "\\textclass article", "\\language default"]
        );
    }

    #[test]
    fn test_regularise_body() {
        let mut body = lines(&[
            "\\layout Standard",
            "Some \\family typewriter code\\family default  here\\newline next",
            "",
        ]);
        regularise_body(&mut Vec::new(), &mut body).unwrap();
        assert_eq!(
            body,
            vec![
                "\\layout Standard",
                "Some ",
                "\\family typewriter",
                "code",
                "\\family default",
                " here",
                "\\newline",
                "next",
                "",
            ]
        );
    }

    #[test]
    fn test_unknown_token_keeps_rest_of_line() {
        assert_eq!(split_body_line("a \\unknown b c"), vec!["a ", "\\unknown b c"]);
        assert_eq!(split_body_line("\\family"), vec!["\\family"]);
    }
}

//! Format 218: tabular attributes spelled out as names instead of codes.

use crate::document::Document;
use crate::step::{step, ConverterModule};
use lyx2lyx_common::ConvertResult;
use lyx2lyx_parser::{find_re, get_option, set_option};
use once_cell::sync::Lazy;
use regex::Regex;

static TABULAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\\begin_inset\s+Tabular").unwrap());

const BOOLEANS: &[(&str, &str)] = &[("0", "false"), ("1", "true")];
const ALIGNMENTS: &[(&str, &str)] =
    &[("1", "block"), ("2", "left"), ("4", "right"), ("8", "center")];
const VALIGNMENTS: &[(&str, &str)] = &[("0", "top"), ("1", "center"), ("2", "bottom")];
const USEBOX: &[(&str, &str)] = &[("0", "none"), ("1", "parbox"), ("2", "minipage")];

/// Attributes renamed on each tag; anything else keeps its value.
const FEATURES: &[(&str, &[(&str, &str)])] = &[("rotate", BOOLEANS), ("islongtable", BOOLEANS)];
const COLUMN: &[(&str, &[(&str, &str)])] = &[
    ("alignment", ALIGNMENTS),
    ("valignment", VALIGNMENTS),
    ("leftline", BOOLEANS),
    ("rightline", BOOLEANS),
];
const ROW: &[(&str, &[(&str, &str)])] = &[
    ("topline", BOOLEANS),
    ("bottomline", BOOLEANS),
    ("newpage", BOOLEANS),
];
const CELL: &[(&str, &[(&str, &str)])] = &[
    ("alignment", ALIGNMENTS),
    ("valignment", VALIGNMENTS),
    ("topline", BOOLEANS),
    ("bottomline", BOOLEANS),
    ("leftline", BOOLEANS),
    ("rightline", BOOLEANS),
    ("rotate", BOOLEANS),
    ("usebox", USEBOX),
];

fn rename_values(line: &str, options: &[(&str, &[(&str, &str)])]) -> String {
    let mut line = line.to_string();
    for (option, table) in options {
        let Some(value) = get_option(&line, option) else {
            continue;
        };
        if let Some((_, name)) = table.iter().find(|(code, _)| *code == value) {
            line = set_option(&line, option, name);
        }
    }
    line
}

fn update_tabular(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_re(&document.body, &TABULAR_RE, i..) {
        i = k + 1;
        let Some(end) = document.body[k..]
            .iter()
            .position(|line| line.starts_with("</LyXTabular>"))
            .map(|n| k + n)
        else {
            document.malformed("missing </LyXTabular>")?;
            continue;
        };
        for line in &mut document.body[k + 1..end] {
            let options = if line.starts_with("<LyXTabular") {
                *line = line.replace("version=\"1\"", "version=\"2\"");
                continue;
            } else if line.starts_with("<Features") {
                FEATURES
            } else if line.starts_with("<Column") {
                COLUMN
            } else if line.starts_with("<Row") {
                ROW
            } else if line.starts_with("<Cell") {
                CELL
            } else {
                continue;
            };
            *line = rename_values(line, options);
        }
        i = end + 1;
    }
    Ok(())
}

pub static MODULE: ConverterModule = ConverterModule {
    name: "1_1_6_3",
    convert: &[step!(218 => [update_tabular])],
    revert: &[],
};

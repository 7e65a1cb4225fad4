//! Format 215 as written by LyX 0.11 and 0.12.

use crate::document::Document;
use crate::markup::latex_to_lines;
use crate::step::{step, ConverterModule};
use lyx2lyx_common::ConvertResult;
use lyx2lyx_parser::{check_token, find_re, find_token, find_token_exact};
use once_cell::sync::Lazy;
use regex::Regex;

static LYXTABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\LyXTable$").unwrap());
static CURSOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\cursor \d*").unwrap());
static SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\\added_space_(?:top|bottom)) (\S+)(.*)$").unwrap());
static BARE_LENGTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+(?:\.[0-9]+)?$").unwrap());

fn header_update(document: &mut Document) -> ConvertResult<()> {
    let header = &mut document.header;
    let mut i = 0;
    while i < header.len() {
        let line = header[i].trim_end().to_string();
        header[i] = line.clone();

        if check_token(&line, "\\epsfig") {
            header[i] = line.replacen("\\epsfig", "\\graphics", 1);
        } else if check_token(&line, "\\papersize") {
            let size = line.split_whitespace().nth(1).unwrap_or("Default");
            let (new_size, paperpackage) = match size {
                "usletter" => ("letterpaper", None),
                "a4wide" => ("Default", Some("widemarginsa4")),
                other => (other, None),
            };
            header[i] = format!("\\papersize {}", new_size);
            let mut inserted = Vec::new();
            if let Some(package) = paperpackage {
                inserted.push(format!("\\paperpackage {}", package));
            }
            if find_token_exact(header, "\\use_geometry", ..).is_none() {
                inserted.push("\\use_geometry 0".to_string());
            }
            if find_token_exact(header, "\\use_amsmath", ..).is_none() {
                inserted.push("\\use_amsmath 0".to_string());
            }
            let count = inserted.len();
            header.splice(i + 1..i + 1, inserted);
            i += count;
        } else if check_token(&line, "\\baselinestretch") {
            let size = line.split_whitespace().nth(1).unwrap_or("1.00");
            let name = match size {
                "1.00" => "single".to_string(),
                "1.50" => "onehalf".to_string(),
                "2.00" => "double".to_string(),
                other => format!("other {}", other),
            };
            header[i] = format!("\\spacing {}", name);
        }
        i += 1;
    }
    Ok(())
}

/// The `Latex_Title` layout became `Title`.
fn obsolete_latex_title(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\layout", i..) {
        if document.body[k].to_lowercase().contains("latex_title") {
            document.body[k] = "\\layout Title".to_string();
        }
        i = k + 1;
    }
    Ok(())
}

/// Give accent insets an explicit brace group: `\i \"a` becomes `\i \"{a}`.
fn update_latexaccents(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\i ", i..) {
        i = k + 1;
        let contents: Vec<char> = document.body[k][2..].trim().chars().collect();
        if contents.contains(&'{') && contents.contains(&'}') {
            continue;
        }
        let accent: String = contents.iter().take(2).collect();
        let updated = match contents.len() {
            2 => format!("{}{{}}", accent),
            3 => format!("{}{{{}}}", accent, contents[2]),
            4 if contents[2] == ' ' => format!("{}{{{}}}", accent, contents[3]),
            4 if contents[2] == '\\' && matches!(contents[3], 'i' | 'j') => {
                format!("{}{{\\{}}}", accent, contents[3])
            }
            _ => continue,
        };
        document.body[k] = format!("\\i {}", updated);
    }
    Ok(())
}

/// LaTeX insets became paragraphs of the `LaTeX` layout.
fn remove_inset_latex(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_inset Latex", i..) {
        let Some(end) = find_token(&document.body, "\\end_inset", k..) else {
            document.malformed("missing \\end_inset after a LaTeX inset")?;
            return Ok(());
        };
        let text = document.body[k]["\\begin_inset Latex".len()..].trim_start().to_string();
        document.body.remove(end);
        document.body[k] = "\\layout LaTeX".to_string();
        document.body.splice(k + 1..k + 1, latex_to_lines(&text));
        i = k + 1;
    }
    Ok(())
}

/// The cursor position is no longer stored in files.
fn remove_cursor(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_re(&document.body, &CURSOR_RE, i..) {
        let line = CURSOR_RE.replace_all(&document.body[k], "").into_owned();
        if line.trim().is_empty() {
            document.body.remove(k);
            i = k;
        } else {
            document.body[k] = line;
            i = k + 1;
        }
    }
    Ok(())
}

fn update_vfill(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if line.contains("\\fill_") {
            *line = line
                .replace("\\fill_top", "\\added_space_top vfill")
                .replace("\\fill_bottom", "\\added_space_bottom vfill");
        }
    }
    Ok(())
}

/// Vertical space lengths get a decimal point and an explicit unit.
fn update_space_units(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        let updated = match SPACE_RE.captures(line) {
            Some(captures) => {
                let value = captures[2].replace(',', ".");
                let value = if BARE_LENGTH_RE.is_match(&value) {
                    format!("{}cm", value)
                } else {
                    value
                };
                format!("{} {}{}", &captures[1], value, &captures[3])
            }
            None => continue,
        };
        *line = updated;
    }
    Ok(())
}

fn update_inset_label(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_inset Label", i..) {
        let label = document.body[k]["\\begin_inset Label".len()..].trim().to_string();
        document.body[k] = format!("\\begin_inset LatexCommand \\label{{{}}}", label);
        i = k + 1;
    }
    Ok(())
}

fn update_latexdel(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset LatexDel", i..) {
        document.body[k] = document.body[k].replacen(
            "\\begin_inset LatexDel",
            "\\begin_inset LatexCommand",
            1,
        );
        i = k + 1;
    }
    Ok(())
}

/// Drop the blank line before a paragraph, except after a protected space.
fn space_before_layout(document: &mut Document) -> ConvertResult<()> {
    let body = &mut document.body;
    let mut i = 2;
    while let Some(k) = find_token(body, "\\layout", i..) {
        if body[k - 1].is_empty() && !body[k - 2].contains("\\protected_separator") {
            body.remove(k - 1);
            i = k;
        } else {
            i = k + 1;
        }
    }
    Ok(())
}

/// Formula insets keep exactly one space before the formula.
fn formula_inset_space_eat(document: &mut Document) -> ConvertResult<()> {
    const TOKEN: &str = "\\begin_inset Formula";
    for line in document.body.iter_mut() {
        if let Some(rest) = line.strip_prefix(TOKEN) {
            if rest.starts_with("  ") {
                *line = format!("{} {}", TOKEN, rest.trim_start());
            }
        }
    }
    Ok(())
}

/// Extend the table description to the fourth grid layout.
fn update_tabular(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_re(&document.body, &LYXTABLE_RE, i..) {
        i = k + 1;
        let body = &mut document.body;
        if i >= body.len() {
            break;
        }
        if body[i].starts_with("multicol") {
            if body[i] != "multicol3" {
                continue;
            }
            body[i] = "multicol4".to_string();
        } else {
            body.insert(i, "multicol4".to_string());
        }
        i += 1;

        let dims: Vec<usize> = body
            .get(i)
            .map(|line| {
                line.split_whitespace()
                    .take(2)
                    .filter_map(|t| t.parse().ok())
                    .collect()
            })
            .unwrap_or_default();
        let [rows, columns] = dims[..] else {
            document.malformed("unreadable table dimensions")?;
            continue;
        };
        let body = &mut document.body;
        let described = rows.checked_add(columns).and_then(|n| n.checked_add(i + 1));
        if described.map_or(true, |end| end > body.len()) {
            document.malformed("truncated table description")?;
            continue;
        }
        body[i].push_str(" 0 0 -1 -1 -1 -1");
        i += 1;
        for line in &mut body[i..i + rows] {
            line.push_str(" 0 0");
        }
        i += rows;
        for line in &mut body[i..i + columns] {
            line.push(' ');
        }
        i += columns;
        while i < body.len() && !body[i].trim().is_empty() {
            body[i].push_str(" 0 0 0");
            i += 1;
        }
    }
    Ok(())
}

/// Join a line ending in a period with a short following text line.
fn final_dot(document: &mut Document) -> ConvertResult<()> {
    let body = &mut document.body;
    let mut i = 0;
    while i + 1 < body.len() {
        let next = &body[i + 1];
        if body[i].ends_with('.')
            && !next.is_empty()
            && !next.starts_with('\\')
            && !next.starts_with(' ')
            && body[i].len() + next.len() <= 72
        {
            let next = body.remove(i + 1);
            body[i].push_str(&next);
        } else {
            i += 1;
        }
    }
    Ok(())
}

pub static MODULE: ConverterModule = ConverterModule {
    name: "0_12",
    convert: &[step!(215 => [
        header_update,
        obsolete_latex_title,
        update_latexaccents,
        remove_inset_latex,
        remove_cursor,
        update_vfill,
        update_space_units,
        update_inset_label,
        update_latexdel,
        space_before_layout,
        formula_inset_space_eat,
        update_tabular,
        final_dot,
    ])],
    revert: &[],
};

//! Format 216 (LyX 1.1.5 and 1.1.6).

use crate::document::Document;
use crate::step::{step, ConverterModule};
use lyx2lyx_common::ConvertResult;
use lyx2lyx_parser::{find_token, find_token_backwards, find_token_exact, get_value};

/// The body must open with a paragraph.
fn first_layout(document: &mut Document) -> ConvertResult<()> {
    let default_layout = document.default_layout();
    let body = &mut document.body;
    let blanks = body.iter().take_while(|line| line.is_empty()).count();
    body.drain(..blanks);
    if body.first().map_or(true, |line| !line.starts_with("\\layout")) {
        body.insert(0, format!("\\layout {}", default_layout));
    }
    Ok(())
}

/// Version control ids are gone from the header.
fn remove_vcid(document: &mut Document) -> ConvertResult<()> {
    document
        .header
        .retain(|line| !line.starts_with("\\lyxvcid") && !line.starts_with("\\lyxrcsid"));
    Ok(())
}

/// `\leftmargin 1 cm` becomes `\leftmargin 1cm`.
fn remove_space_in_units(document: &mut Document) -> ConvertResult<()> {
    const MARGINS: &[&str] = &["\\topmargin", "\\rightmargin", "\\leftmargin", "\\bottommargin"];
    for margin in MARGINS {
        let Some(i) = find_token_exact(&document.header, margin, ..) else {
            continue;
        };
        let words: Vec<&str> = document.header[i].split_whitespace().collect();
        if words.len() == 3 {
            document.header[i] = format!("{} {}{}", words[0], words[1], words[2]);
        }
    }
    Ok(())
}

/// The table of contents command takes an empty argument.
fn update_toc(document: &mut Document) -> ConvertResult<()> {
    const TOC: &str = "\\begin_inset LatexCommand \\tableofcontents";
    let mut i = 0;
    while let Some(k) = find_token(&document.body, TOC, i..) {
        if document.body[k].trim_end() == TOC {
            document.body[k] = format!("{}{{}}", TOC);
        }
        i = k + 1;
    }
    Ok(())
}

/// Protected separators become real spaces in `LyX-Code` paragraphs and
/// protected spaces elsewhere.
fn replace_protected_separator(document: &mut Document) -> ConvertResult<()> {
    let default_layout = document.default_layout();
    let body = &mut document.body;
    let mut i = 0;
    while let Some(k) = find_token(body, "\\protected_separator", i..) {
        let layout = find_token_backwards(body, "\\layout", k)
            .and_then(|j| body[j].split_whitespace().nth(1).map(str::to_string))
            .unwrap_or_else(|| default_layout.to_string());
        if layout == "LyX-Code" && k > 0 {
            let mut spaces = String::new();
            while k < body.len() && body[k].trim_end() == "\\protected_separator" {
                spaces.push(' ');
                body.remove(k);
            }
            let following = if k < body.len() && !body[k].starts_with('\\') {
                body.remove(k)
            } else {
                String::new()
            };
            body[k - 1].push_str(&spaces);
            body[k - 1].push_str(&following);
            i = k;
        } else {
            body[k] = "\\SpecialChar ~".to_string();
            i = k + 1;
        }
    }
    Ok(())
}

/// A formula inset keeps its content on the opening line.
fn merge_formula_inset(document: &mut Document) -> ConvertResult<()> {
    let body = &mut document.body;
    let mut i = 0;
    while let Some(k) = find_token(body, "\\begin_inset Formula", i..) {
        i = k + 1;
        if body[k].trim_end() != "\\begin_inset Formula" || k + 1 >= body.len() {
            continue;
        }
        if body[k + 1].starts_with("\\end_inset") {
            continue;
        }
        let formula = body.remove(k + 1);
        body[k] = format!("\\begin_inset Formula {}", formula.trim_start());
    }
    Ok(())
}

/// Documents without a language, or with `default`, are English.
fn update_language(document: &mut Document) -> ConvertResult<()> {
    match find_token_exact(&document.header, "\\language", ..) {
        None => document.header.push("\\language english".to_string()),
        Some(i) => {
            if get_value(&document.header, "\\language", i..=i) == "default" {
                document.header[i] = "\\language english".to_string();
            }
        }
    }
    document.language = get_value(&document.header, "\\language", ..);
    Ok(())
}

pub static MODULE: ConverterModule = ConverterModule {
    name: "1_1_5",
    convert: &[step!(216 => [
        first_layout,
        remove_vcid,
        remove_space_in_units,
        update_toc,
        replace_protected_separator,
        merge_formula_inset,
        update_language,
    ])],
    revert: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    fn document(header: &[&str], body: &[&str]) -> Document {
        Document::from_lines(header.iter().copied(), body.iter().copied(), 215)
    }

    #[test]
    fn test_first_layout() {
        let mut doc = document(&[], &["", "", "text"]);
        first_layout(&mut doc).unwrap();
        assert_eq!(doc.body, vec!["\\layout Standard", "text"]);

        let mut doc = document(&[], &["\\layout Title", "x"]);
        first_layout(&mut doc).unwrap();
        assert_eq!(doc.body, vec!["\\layout Title", "x"]);
    }

    #[test]
    fn test_header_cleanup() {
        let mut doc = document(
            &[
                "\\lyxformat 2.15",
                "\\lyxvcid $Id$",
                "\\leftmargin 2 cm",
                "\\topmargin 1cm",
                "\\language default",
            ],
            &[],
        );
        remove_vcid(&mut doc).unwrap();
        remove_space_in_units(&mut doc).unwrap();
        update_language(&mut doc).unwrap();
        assert_eq!(
            doc.header,
            vec!["\\lyxformat 2.15", "\\leftmargin 2cm", "\\topmargin 1cm", "\\language english"]
        );
        assert_eq!(doc.language, "english");
    }

    #[test]
    fn test_missing_language() {
        let mut doc = document(&["\\lyxformat 2.15"], &[]);
        update_language(&mut doc).unwrap();
        assert_eq!(doc.header.last().unwrap(), "\\language english");
    }

    #[test]
    fn test_update_toc_once() {
        let mut doc = document(&[], &["\\begin_inset LatexCommand \\tableofcontents"]);
        update_toc(&mut doc).unwrap();
        update_toc(&mut doc).unwrap();
        assert_eq!(doc.body[0], "\\begin_inset LatexCommand \\tableofcontents{}");
    }

    #[test]
    fn test_protected_separator() {
        let mut doc = document(
            &[],
            &[
                "\\layout LyX-Code",
                "int",
                "\\protected_separator ",
                "\\protected_separator ",
                "x;",
                "\\layout Standard",
                "a",
                "\\protected_separator ",
                "b",
            ],
        );
        replace_protected_separator(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec!["\\layout LyX-Code", "int  x;", "\\layout Standard", "a", "\\SpecialChar ~", "b"]
        );
    }

    #[test]
    fn test_merge_formula_inset() {
        let mut doc = document(&[], &["\\begin_inset Formula", "$x^2$", "\\end_inset"]);
        merge_formula_inset(&mut doc).unwrap();
        assert_eq!(doc.body, vec!["\\begin_inset Formula $x^2$", "\\end_inset"]);
    }
}

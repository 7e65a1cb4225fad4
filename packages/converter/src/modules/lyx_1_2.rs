//! Format 220 (LyX 1.2): floats, minipages, figures and raw LaTeX become
//! insets.

use crate::document::Document;
use crate::markup::find_paragraph_end;
use crate::step::{step, ConverterModule};
use lyx2lyx_common::ConvertResult;
use lyx2lyx_parser::{
    check_token, find_end_of, find_end_of_inset, find_re, find_token, find_token_backwards,
    find_token_exact, find_tokens, get_value,
};
use once_cell::sync::Lazy;
use regex::Regex;

static TABULAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\\begin_inset\s+Tabular").unwrap());
static PEXTRA_TYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\pextra_type\s+[12]").unwrap());
static PEXTRA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\\pextra_type\s+(\d)",
        r"(?:\s+\\pextra_alignment\s+(\d))?",
        r"(?:\s+\\pextra_hfill\s+(\d))?",
        r"(?:\s+\\pextra_start_minipage\s+(\d))?",
        r"(?:\s+(\\pextra_widthp?)\s+(\S*))?",
    ))
    .unwrap()
});

/// Character style switches that have no meaning inside raw LaTeX.
const FONT_TOKENS: &[&str] = &[
    "\\family", "\\series", "\\shape", "\\size", "\\emph", "\\bar", "\\noun", "\\color", "\\lang",
];

fn change_header(document: &mut Document) -> ConvertResult<()> {
    let header = &mut document.header;
    if let Some(i) = find_token_exact(header, "\\use_amsmath", ..) {
        if find_token_exact(header, "\\use_natbib", ..).is_none() {
            header.splice(
                i + 1..i + 1,
                ["\\use_natbib 0".to_string(), "\\use_numerical_citations 0".to_string()],
            );
        }
    }
    if let Some(i) = find_token_exact(header, "\\papersize Default", ..) {
        header[i] = "\\papersize default".to_string();
    }
    Ok(())
}

/// Lists of figures, tables and algorithms are float list insets.
fn change_listof(document: &mut Document) -> ConvertResult<()> {
    const LISTS: &[(&str, &str)] = &[
        ("\\listoffigures", "figure"),
        ("\\listoftables", "table"),
        ("\\listofalgorithms", "algorithm"),
    ];
    for line in document.body.iter_mut() {
        let Some(command) = line.strip_prefix("\\begin_inset LatexCommand ") else {
            continue;
        };
        let command = command.trim_end().trim_end_matches("{}");
        if let Some((_, float)) = LISTS.iter().find(|(name, _)| *name == command) {
            *line = format!("\\begin_inset FloatList {}", float);
        }
    }
    Ok(())
}

/// Float insets written by 1.1.6 lack the `wide` parameter.
fn fix_oldfloatinset(document: &mut Document) -> ConvertResult<()> {
    let body = &mut document.body;
    let mut i = 0;
    while let Some(k) = find_token(body, "\\begin_inset Float ", i..) {
        i = k + 1;
        let params_end = (k + 1..body.len())
            .find(|&n| body[n].trim().is_empty())
            .unwrap_or(body.len());
        if find_token(body, "wide", k + 1..params_end).is_some() {
            continue;
        }
        if let Some(c) = find_token(body, "collapsed", k + 1..params_end) {
            body.insert(c, "wide false".to_string());
        }
    }
    Ok(())
}

/// Lower case tabular tags, `version="3"`.
fn update_tabular(document: &mut Document) -> ConvertResult<()> {
    const TAGS: &[(&str, &str)] = &[
        ("<LyXTabular", "<lyxtabular"),
        ("</LyXTabular", "</lyxtabular"),
        ("<Features", "<features"),
        ("<Column", "<column"),
        ("<Row", "<row"),
        ("</Row", "</row"),
        ("<Cell", "<cell"),
        ("</Cell", "</cell"),
    ];
    let mut i = 0;
    while let Some(k) = find_re(&document.body, &TABULAR_RE, i..) {
        document.body[k] = "\\begin_inset Tabular".to_string();
        let Some(end) = find_token(&document.body, "</LyXTabular>", k..) else {
            document.malformed("missing </LyXTabular>")?;
            i = k + 1;
            continue;
        };
        for line in &mut document.body[k + 1..=end] {
            let Some((old, new)) = TAGS.iter().find(|(old, _)| line.starts_with(old)) else {
                continue;
            };
            let mut updated = format!("{}{}", new, &line[old.len()..]);
            if *new == "<lyxtabular" {
                updated = updated.replace("version=\"2\"", "version=\"3\"");
            } else if *new == "<column" {
                updated = updated.replace("width=\"\"", "width=\"0pt\"");
            }
            *line = updated;
        }
        i = end + 1;
    }
    Ok(())
}

/// Minipage paragraphs (`\pextra_type 2`) become minipage insets; indented
/// paragraphs (`\pextra_type 1`) lose their indentation.
fn remove_pextra(document: &mut Document) -> ConvertResult<()> {
    let default_layout = document.default_layout();
    let mut i = 0;
    while let Some(k) = find_re(&document.body, &PEXTRA_TYPE_RE, i..) {
        i = k + 1;
        let body = &mut document.body;
        if !body[k].contains("\\pextra_width")
            && body.get(k + 1).is_some_and(|next| next.starts_with("\\pextra_width"))
        {
            let next = body.remove(k + 1);
            body[k] = format!("{} {}", body[k].trim_end(), next);
        }
        let Some(captures) = PEXTRA_RE.captures(&body[k]) else {
            continue;
        };
        let kind = captures[1].to_string();
        let position = captures.get(2).map_or("0", |m| m.as_str()).to_string();
        let width = match (captures.get(5), captures.get(6)) {
            (Some(unit), Some(value)) if unit.as_str() == "\\pextra_widthp" => {
                format!("{}col%", value.as_str())
            }
            (_, Some(value)) => value.as_str().to_string(),
            _ => "100col%".to_string(),
        };
        strip_pextra(body, k);

        if kind == "1" {
            document.warning("Indented paragraph dropped its indentation");
            continue;
        }

        let Some(start) = find_token_backwards(&document.body, "\\layout", k) else {
            document.malformed("minipage parameters outside a paragraph")?;
            continue;
        };
        let Some(mut end) = find_paragraph_end(&document.body, start) else {
            document.malformed("unterminated inset in a minipage")?;
            continue;
        };
        // Following paragraphs stay in the same minipage until one starts a
        // new one.
        while document.body.get(end).is_some_and(|line| line.starts_with("\\layout")) {
            let Some(next_end) = find_paragraph_end(&document.body, end) else {
                break;
            };
            let Some(p) = find_re(&document.body, &PEXTRA_TYPE_RE, end + 1..next_end) else {
                break;
            };
            let continues = PEXTRA_RE
                .captures(&document.body[p])
                .is_some_and(|c| &c[1] == "2" && c.get(4).map_or("0", |m| m.as_str()) != "1");
            if !continues {
                break;
            }
            let removed = strip_pextra(&mut document.body, p);
            end = next_end - removed;
        }

        let mut inset = vec![
            format!("\\layout {}", default_layout),
            String::new(),
            "\\begin_inset Minipage".to_string(),
            format!("position {}", position),
            "inner_position 0".to_string(),
            "height \"0pt\"".to_string(),
            format!("width \"{}\"", width),
            "collapsed false".to_string(),
            String::new(),
        ];
        inset.extend(document.body[start..end].iter().cloned());
        inset.push("\\end_inset".to_string());
        inset.push(String::new());
        i = start + inset.len();
        document.body.splice(start..end, inset);
    }
    Ok(())
}

/// Remove the minipage parameters from line `k`, dropping the line when
/// nothing else is left. Returns the number of removed lines.
fn strip_pextra(body: &mut Vec<String>, k: usize) -> usize {
    let stripped = PEXTRA_RE.replace(&body[k], "").trim().to_string();
    if stripped.is_empty() {
        body.remove(k);
        1
    } else {
        body[k] = stripped;
        0
    }
}

/// `\begin_float` blocks become footnote, margin note and float insets.
fn remove_oldfloat(document: &mut Document) -> ConvertResult<()> {
    const FLOATS: &[(&str, &[&str])] = &[
        ("footnote", &["\\begin_inset Foot", "collapsed true"]),
        ("margin", &["\\begin_inset Marginal", "collapsed true"]),
        ("fig", &["\\begin_inset Float figure", "wide false", "collapsed false"]),
        ("tab", &["\\begin_inset Float table", "wide false", "collapsed false"]),
        ("alg", &["\\begin_inset Float algorithm", "wide false", "collapsed false"]),
        ("wide-fig", &["\\begin_inset Float figure", "wide true", "collapsed false"]),
        ("wide-tab", &["\\begin_inset Float table", "wide true", "collapsed false"]),
    ];
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_float", i..) {
        i = k + 1;
        let kind = document.body[k].split_whitespace().nth(1).unwrap_or("").to_string();
        let params = match FLOATS.iter().find(|(name, _)| *name == kind) {
            Some((_, params)) => *params,
            None => {
                document.warning(format!("Unknown float type {}", kind));
                FLOATS[2].1
            }
        };
        let Some(end) = find_end_of(&document.body, k, "\\begin_float", "\\end_float") else {
            document.malformed("missing \\end_float")?;
            continue;
        };

        // The enclosing paragraph is reopened after the float.
        let mut stop = end + 1;
        let outer = find_token_backwards(&document.body, "\\layout", k.saturating_sub(1))
            .map(|p| document.body[p].clone());
        let next = (end + 1..document.body.len()).find(|&n| !document.body[n].trim().is_empty());
        if let (Some(outer), Some(next)) = (outer, next) {
            if document.body[next] == outer {
                stop = next + 1;
            }
        }

        let mut inset: Vec<String> = params.iter().map(|line| line.to_string()).collect();
        inset.push(String::new());
        inset.extend(document.body[k + 1..end].iter().cloned());
        inset.push("\\end_inset".to_string());
        inset.push(String::new());
        document.body.splice(k..stop, inset);
    }
    Ok(())
}

/// Figure insets become graphics insets.
fn remove_figinset(document: &mut Document) -> ConvertResult<()> {
    const UNITS: &[&str] = &["pt", "cm", "in", "text%", "col%"];
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset Figure", i..) {
        i = k + 1;
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after a figure")?;
            continue;
        };
        let body = &document.body;
        let words: Vec<&str> = body[k].split_whitespace().collect();
        let lyxwidth = words.get(3).copied().unwrap_or("0");
        let lyxheight = words.get(4).copied().unwrap_or("0");
        let length = |name: &str| -> Option<String> {
            let n = find_token_exact(body, name, k + 1..end)?;
            let fields: Vec<&str> = body[n].split_whitespace().collect();
            let unit: usize = fields.get(1)?.parse().ok()?;
            if unit == 0 {
                return None;
            }
            Some(format!("{}{}", fields.get(2)?, UNITS.get(unit)?))
        };
        let width = length("width");
        let height = length("height");
        let filename = get_value(body, "file", k + 1..end);
        let angle = get_value(body, "angle", k + 1..end);
        let flags: u32 = get_value(body, "flags", k + 1..end).parse().unwrap_or(0);
        let subcaption = find_token_exact(body, "subcaption", k + 1..end)
            .map(|n| body[n].trim_start()["subcaption".len()..].trim().to_string());

        let display = if flags & 4 != 0 {
            "none"
        } else {
            match flags & 3 {
                1 => "monochrome",
                2 => "grayscale",
                3 => "color",
                _ => "default",
            }
        };

        let mut graphics = vec!["\\begin_inset Graphics FormatVersion 1".to_string()];
        if !filename.is_empty() {
            graphics.push(format!("\tfilename {}", filename));
        }
        graphics.push(format!("\tdisplay {}", display));
        if let Some(subcaption) = subcaption {
            graphics.push("\tsubcaption".to_string());
            if !subcaption.is_empty() {
                graphics.push(format!("\tsubcaptionText \"{}\"", subcaption));
            }
        }
        match (&width, &height) {
            (None, None) => graphics.push("\tsize_type 0".to_string()),
            _ => {
                graphics.push("\tsize_type 1".to_string());
                if let Some(width) = width {
                    graphics.push(format!("\twidth {}", width));
                }
                if let Some(height) = height {
                    graphics.push(format!("\theight {}", height));
                }
            }
        }
        if !angle.is_empty() && angle != "0" {
            graphics.push("\trotate".to_string());
            graphics.push(format!("\trotateAngle {}", angle));
        }
        graphics.push("\tlyxsize_type 1".to_string());
        graphics.push(format!("\tlyxwidth {}pt", lyxwidth));
        graphics.push(format!("\tlyxheight {}pt", lyxheight));
        graphics.push("\\end_inset".to_string());
        document.body.splice(k..=end, graphics);
    }
    Ok(())
}

/// 1.1.6 ERT insets hold LaTeX text directly. Unwrap them into LaTeX font
/// runs so that [`remove_oldert`] builds the current inset.
fn remove_oldertinset(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_inset ERT", i..) {
        i = k + 1;
        if document.body.get(k + 1).is_some_and(|line| line.starts_with("status")) {
            continue;
        }
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after an ERT inset")?;
            continue;
        };
        let mut content: Vec<String> = document.body[k + 1..end]
            .iter()
            .skip_while(|line| line.trim().is_empty())
            .cloned()
            .collect();
        if content.first().is_some_and(|line| line.starts_with("\\layout")) {
            content.remove(0);
        }
        let content: Vec<String> = content
            .into_iter()
            .filter(|line| !line.starts_with("\\layout") && !line.trim().is_empty())
            .collect();
        let mut unwrapped = vec!["\\latex latex".to_string()];
        unwrapped.extend(content);
        unwrapped.push("\\latex default".to_string());
        document.body.splice(k..=end, unwrapped);
    }
    Ok(())
}

/// LaTeX layout paragraphs and LaTeX font runs become ERT insets.
fn remove_oldert(document: &mut Document) -> ConvertResult<()> {
    let default_layout = document.default_layout();
    let mut i = 0;
    while let Some(k) = find_tokens(&document.body, &["\\latex latex", "\\layout LaTeX"], i..) {
        if check_token(&document.body[k], "\\layout LaTeX") {
            let Some(end) = find_paragraph_end(&document.body, k) else {
                document.malformed("unterminated inset in a LaTeX paragraph")?;
                i = k + 1;
                continue;
            };
            let mut new = vec![format!("\\layout {}", default_layout), String::new()];
            new.extend(ert_runs(&document.body[k + 1..end], default_layout));
            i = k + new.len();
            document.body.splice(k..end, new);
            continue;
        }

        let mut j = k + 1;
        while j < document.body.len() {
            let line = &document.body[j];
            if line.starts_with("\\begin_inset") {
                match find_end_of_inset(&document.body, j) {
                    Some(e) => j = e + 1,
                    None => j = document.body.len(),
                }
                continue;
            }
            const STOPS: &[&str] = &[
                "\\latex default",
                "\\layout",
                "\\end_inset",
                "\\end_float",
                "\\the_end",
                "\\begin_deeper",
                "\\end_deeper",
            ];
            if STOPS.iter().any(|stop| line.starts_with(stop)) {
                break;
            }
            j += 1;
        }
        let runs = ert_runs(&document.body[k + 1..j], default_layout);
        let stop = if document.body.get(j).is_some_and(|line| line.starts_with("\\latex default")) {
            j + 1
        } else {
            j
        };
        i = k + runs.len();
        document.body.splice(k..stop, runs);
    }
    Ok(())
}

/// Wrap the text runs of `lines` in ERT insets, leaving nested insets
/// outside.
fn ert_runs(lines: &[String], layout: &str) -> Vec<String> {
    fn flush(run: &mut Vec<String>, out: &mut Vec<String>, layout: &str) {
        if run.iter().any(|line| !line.trim().is_empty()) {
            out.extend([
                "\\begin_inset ERT".to_string(),
                "status Collapsed".to_string(),
                String::new(),
                format!("\\layout {}", layout),
                String::new(),
            ]);
            out.extend(run.drain(..).filter(|line| !line.trim().is_empty()));
            out.push("\\end_inset".to_string());
            out.push(String::new());
        }
        run.clear();
    }

    let mut out = Vec::new();
    let mut run = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        if line.starts_with("\\begin_inset") {
            flush(&mut run, &mut out, layout);
            let end = find_end_of_inset(lines, i).unwrap_or(lines.len() - 1);
            out.extend(lines[i..=end].iter().cloned());
            i = end + 1;
            continue;
        }
        if line.starts_with("\\hfill") {
            flush(&mut run, &mut out, layout);
            out.push(line.clone());
        } else if !FONT_TOKENS.iter().any(|token| line.starts_with(token)) {
            run.push(line.clone());
        }
        i += 1;
    }
    flush(&mut run, &mut out, layout);
    out
}

/// A paragraph holding nothing but one ERT inset: the inset's begin and end
/// lines and the paragraph end.
fn ert_paragraph(body: &[String], p: usize) -> Option<(usize, usize, usize)> {
    if !body.get(p)?.starts_with("\\layout") {
        return None;
    }
    let end = find_paragraph_end(body, p)?;
    let start = (p + 1..end).find(|&n| !body[n].trim().is_empty())?;
    if body[start].trim_end() != "\\begin_inset ERT" {
        return None;
    }
    let inset_end = find_end_of_inset(body, start)?;
    if (inset_end + 1..end).any(|n| !body[n].trim().is_empty()) {
        return None;
    }
    Some((start, inset_end, end))
}

/// Consecutive paragraphs made only of an ERT inset merge into one inset
/// with several paragraphs.
fn combine_ert(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(p) = find_token(&document.body, "\\layout", i..) {
        i = p + 1;
        let Some((_, first_end, mut q)) = ert_paragraph(&document.body, p) else {
            continue;
        };
        let merged_from = q;
        let mut text = Vec::new();
        while let Some((start, inset_end, end)) = ert_paragraph(&document.body, q) {
            let Some(inner) = find_token(&document.body, "\\layout", start + 1..inset_end) else {
                break;
            };
            text.extend(document.body[inner..inset_end].iter().cloned());
            q = end;
        }
        if text.is_empty() {
            continue;
        }
        document.body.drain(merged_from..q);
        document.body.splice(first_end..first_end, text);
    }
    Ok(())
}

/// Info insets are notes.
fn change_infoinset(document: &mut Document) -> ConvertResult<()> {
    let default_layout = document.default_layout();
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset Info", i..) {
        let Some(end) = find_token(&document.body, "\\end_inset", k..) else {
            document.malformed("missing \\end_inset after an info inset")?;
            break;
        };
        let text = document.body[k]["\\begin_inset Info".len()..].trim().to_string();
        let mut note_lines: Vec<String> = document.body[k + 1..end].to_vec();
        if !text.is_empty() {
            note_lines.insert(0, text);
        }
        let mut note = vec![
            "\\begin_inset Note".to_string(),
            "collapsed true".to_string(),
            String::new(),
        ];
        for line in note_lines {
            note.push(format!("\\layout {}", default_layout));
            note.push(String::new());
            let mut parts = line.split('\\');
            note.push(parts.next().unwrap_or("").to_string());
            for part in parts {
                note.push("\\backslash".to_string());
                note.push(part.to_string());
            }
        }
        i = k + note.len();
        document.body.splice(k..end, note);
    }
    Ok(())
}

pub static MODULE: ConverterModule = ConverterModule {
    name: "1_2",
    convert: &[step!(220 => [
        change_header,
        change_listof,
        fix_oldfloatinset,
        update_tabular,
        remove_pextra,
        remove_oldfloat,
        remove_figinset,
        remove_oldertinset,
        remove_oldert,
        combine_ert,
        change_infoinset,
    ])],
    revert: &[],
};

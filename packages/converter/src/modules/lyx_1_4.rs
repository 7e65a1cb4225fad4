//! Formats 222 to 245 (LyX 1.4): change tracking, the `\begin_layout`
//! paragraph syntax, box and note insets, and the citation engine setting.

use crate::document::{Backend, Document};
use crate::markup::{
    find_paragraph_end, lines_to_latex, put_cmd_in_ert, split_tokens, PARAGRAPH_PARAMETERS,
};
use crate::step::{step, ConverterModule, Step};
use lyx2lyx_common::ConvertResult;
use lyx2lyx_parser::{
    check_token, del_token, find_beginning_of_inset, find_end_of, find_end_of_inset,
    find_end_of_layout, find_re, find_token, find_token_exact, find_tokens, find_tokens_exact,
    get_option, get_value, set_option,
};
use once_cell::sync::Lazy;
use regex::Regex;

static EXTERNAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\\begin_inset External ([^,]*),"([^"]*)","#).unwrap());
static INSET_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\\InsetSpace\s+(\S+)(.*)$").unwrap());
static EQREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\\begin_inset\s+LatexCommand\s+\\eqref").unwrap());
static SPACE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\InsetSpace \\space(\{\})?").unwrap());
static THINSPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\InsetSpace \\,").unwrap());
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\\begin_inset Float (\S+)").unwrap());

// Header

fn insert_tracking_changes(document: &mut Document) -> ConvertResult<()> {
    if find_token(&document.header, "\\tracking_changes", ..).is_none() {
        document.header.push("\\tracking_changes 0".to_string());
    }
    Ok(())
}

fn rm_tracking_changes(document: &mut Document) -> ConvertResult<()> {
    document
        .header
        .retain(|line| !check_token(line, "\\author") && !check_token(line, "\\tracking_changes"));
    Ok(())
}

fn rm_body_changes(document: &mut Document) -> ConvertResult<()> {
    document.body.retain(|line| !check_token(line, "\\change_"));
    Ok(())
}

fn add_end_header(document: &mut Document) -> ConvertResult<()> {
    if find_token(&document.header, "\\end_header", ..).is_none() {
        document.header.push("\\end_header".to_string());
    }
    Ok(())
}

fn rm_end_header(document: &mut Document) -> ConvertResult<()> {
    document.header.retain(|line| !check_token(line, "\\end_header"));
    Ok(())
}

/// `\use_amsmath` grows an automatic setting: the old "off" loaded the
/// package when needed, which is the new "auto".
fn convert_amsmath(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\use_amsmath", ..) else {
        document.warning("Malformed LyX document: Missing '\\use_amsmath'.");
        return Ok(());
    };
    let value = if get_value(&document.header, "\\use_amsmath", i..=i) == "0" { "1" } else { "2" };
    document.header[i] = format!("\\use_amsmath {}", value);
    Ok(())
}

fn revert_amsmath(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\use_amsmath", ..) else {
        document.warning("Malformed LyX document: Missing '\\use_amsmath'.");
        return Ok(());
    };
    let value = if get_value(&document.header, "\\use_amsmath", i..=i) == "2" { "1" } else { "0" };
    document.header[i] = format!("\\use_amsmath {}", value);
    Ok(())
}

fn convert_paperpackage(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\paperpackage", ..) else {
        return Ok(());
    };
    let updated = match get_value(&document.header, "\\paperpackage", i..=i).as_str() {
        "" => "widemarginsa4",
        "default" | "a4" => "none",
        "a4wide" => "a4",
        "widemarginsa4" => "a4wide",
        _ => return Ok(()),
    };
    document.header[i] = format!("\\paperpackage {}", updated);
    Ok(())
}

fn revert_paperpackage(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\paperpackage", ..) else {
        return Ok(());
    };
    let updated = match get_value(&document.header, "\\paperpackage", i..=i).as_str() {
        "none" => "a4",
        "a4" => "a4wide",
        "a4wide" => "widemarginsa4",
        "widemarginsa4" => "",
        _ => return Ok(()),
    };
    document.header[i] = format!("\\paperpackage {}", updated).trim_end().to_string();
    Ok(())
}

fn convert_jurabib(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\use_numerical_citations", ..) else {
        document.warning("Malformed LyX document: Missing '\\use_numerical_citations'.");
        return Ok(());
    };
    document.header.insert(i + 1, "\\use_jurabib 0".to_string());
    Ok(())
}

fn revert_jurabib(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\use_jurabib", ..) else {
        document.warning("Malformed LyX document: Missing '\\use_jurabib'.");
        return Ok(());
    };
    if get_value(&document.header, "\\use_jurabib", i..=i) != "0" {
        // Left in place so that LyX itself complains about it.
        document.warning("Conversion of '\\use_jurabib = 1' not yet implemented.");
        return Ok(());
    }
    document.header.remove(i);
    Ok(())
}

/// The three citation switches collapse into `\cite_engine`.
fn convert_cite_engine(document: &mut Document) -> ConvertResult<()> {
    let header = &document.header;
    let a = find_token(header, "\\use_natbib", ..);
    let b = find_token(header, "\\use_numerical_citations", ..);
    let c = find_token(header, "\\use_jurabib", ..);
    let (Some(a), Some(b), Some(c)) = (a, b, c) else {
        document.warning("Malformed LyX document: Missing citation settings.");
        return Ok(());
    };
    if b != a + 1 || c != b + 1 {
        document.warning("Malformed LyX document: Citation settings out of order.");
        return Ok(());
    }
    let natbib = get_value(header, "\\use_natbib", a..=a) != "0";
    let numerical = get_value(header, "\\use_numerical_citations", b..=b) != "0";
    let jurabib = get_value(header, "\\use_jurabib", c..=c) != "0";
    let engine = match (natbib, numerical, jurabib) {
        (true, true, _) => "natbib_numerical",
        (true, false, _) => "natbib_authoryear",
        (false, _, true) => "jurabib",
        _ => "basic",
    };
    document.header.splice(a..=c, [format!("\\cite_engine {}", engine)]);
    Ok(())
}

fn revert_cite_engine(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\cite_engine", ..) else {
        document.warning("Malformed LyX document: Missing '\\cite_engine'.");
        return Ok(());
    };
    let (natbib, numerical, jurabib) =
        match get_value(&document.header, "\\cite_engine", i..=i).as_str() {
            "natbib_numerical" => ("1", "1", "0"),
            "natbib_authoryear" => ("1", "0", "0"),
            "jurabib" => ("0", "0", "1"),
            _ => ("0", "0", "0"),
        };
    document.header.splice(
        i..=i,
        [
            format!("\\use_natbib {}", natbib),
            format!("\\use_numerical_citations {}", numerical),
            format!("\\use_jurabib {}", jurabib),
        ],
    );
    Ok(())
}

fn convert_bibtopic(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\cite_engine", ..) else {
        document.warning("Malformed LyX document: Missing '\\cite_engine'.");
        return Ok(());
    };
    document.header.insert(i + 1, "\\use_bibtopic 0".to_string());
    Ok(())
}

fn revert_bibtopic(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\use_bibtopic", ..) else {
        document.warning("Malformed LyX document: Missing '\\use_bibtopic'.");
        return Ok(());
    };
    if get_value(&document.header, "\\use_bibtopic", i..=i) == "1" {
        document.warning("Revert '\\use_bibtopic' (unsupported) to '\\use_bibtopic 0'.");
    }
    document.header.remove(i);
    Ok(())
}

const BOOLEAN_SETTINGS: &[&str] = &["\\use_geometry", "\\use_bibtopic", "\\tracking_changes"];

fn use_x_boolean(document: &mut Document) -> ConvertResult<()> {
    for setting in BOOLEAN_SETTINGS {
        let Some(i) = find_token_exact(&document.header, setting, ..) else {
            continue;
        };
        let value = match get_value(&document.header, setting, i..=i).as_str() {
            "0" => "false",
            "1" => "true",
            _ => continue,
        };
        document.header[i] = format!("{} {}", setting, value);
    }
    Ok(())
}

fn use_x_binary(document: &mut Document) -> ConvertResult<()> {
    for setting in BOOLEAN_SETTINGS {
        let Some(i) = find_token_exact(&document.header, setting, ..) else {
            continue;
        };
        let value = match get_value(&document.header, setting, i..=i).as_str() {
            "false" => "0",
            "true" => "1",
            _ => continue,
        };
        document.header[i] = format!("{} {}", setting, value);
    }
    Ok(())
}

fn convert_output_changes(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\tracking_changes", ..) else {
        document.warning("Malformed LyX document: Missing '\\tracking_changes'.");
        return Ok(());
    };
    if find_token(&document.header, "\\output_changes", ..).is_none() {
        document.header.insert(i + 1, "\\output_changes true".to_string());
    }
    Ok(())
}

fn revert_output_changes(document: &mut Document) -> ConvertResult<()> {
    if let Some(i) = find_token(&document.header, "\\output_changes", ..) {
        document.header.remove(i);
    }
    Ok(())
}

/// `frenchb` is spelled `french`.
fn convert_french(document: &mut Document) -> ConvertResult<()> {
    if let Some(i) = find_token_exact(&document.header, "\\language frenchb", ..) {
        document.header[i] = "\\language french".to_string();
        document.language = "french".to_string();
    }
    for line in document.body.iter_mut() {
        if line.split_whitespace().eq(["\\lang", "frenchb"]) {
            *line = "\\lang french".to_string();
        }
    }
    Ok(())
}

/// The paper package setting moves into the preamble.
fn remove_paperpackage(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\paperpackage", ..) else {
        return Ok(());
    };
    let package = get_value(&document.header, "\\paperpackage", i..=i);
    document.header.remove(i);
    let latex = match package.as_str() {
        "a4" => "\\usepackage{a4}",
        "a4wide" => "\\usepackage{a4wide}",
        "widemarginsa4" => "\\usepackage[widemargins]{a4}",
        _ => return Ok(()),
    };
    document.preamble.insert(0, latex.to_string());
    if let Some(p) = find_token(&document.header, "\\papersize", ..) {
        document.header[p] = "\\papersize default".to_string();
    }
    Ok(())
}

fn remove_quotestimes(document: &mut Document) -> ConvertResult<()> {
    document.header.retain(|line| !check_token(line, "\\quotes_times"));
    Ok(())
}

fn revert_quotestimes(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\quotes_language", ..) else {
        document.warning("Malformed LyX document: Missing '\\quotes_language'.");
        return Ok(());
    };
    document.header.insert(i + 1, "\\quotes_times 2".to_string());
    Ok(())
}

// Character level

fn remove_color_default(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if line.trim_end() == "\\color default" {
            *line = "\\color inherit".to_string();
        }
    }
    Ok(())
}

fn revert_color_default(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if line.trim_end() == "\\color inherit" {
            *line = "\\color default".to_string();
        }
    }
    Ok(())
}

fn convert_spaces(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if line.contains("\\SpecialChar ~") {
            *line = line.replace("\\SpecialChar ~", "\\InsetSpace ~");
        }
    }
    Ok(())
}

/// Protected spaces go back to special characters; every other space
/// variant becomes raw LaTeX.
fn revert_spaces(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_re(&document.body, &INSET_SPACE_RE, i..) {
        let Some(captures) = INSET_SPACE_RE.captures(&document.body[k]) else {
            break;
        };
        let prefix = captures[1].to_string();
        let space = captures[2].to_string();
        let suffix = captures[3].to_string();
        let mut replacement = Vec::new();
        if space == "~" {
            replacement.push(format!("{}\\SpecialChar ~", prefix));
        } else {
            if !prefix.is_empty() {
                replacement.push(prefix);
            }
            let latex = if space == "\\space" { "\\ ".to_string() } else { space };
            replacement.extend(put_cmd_in_ert(&latex, 221));
        }
        if !suffix.is_empty() {
            replacement.push(suffix);
        }
        i = k + replacement.len();
        document.body.splice(k..=k, replacement);
    }
    Ok(())
}

fn rename_spaces(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if !line.contains("\\InsetSpace") {
            continue;
        }
        let updated = SPACE_NAME_RE.replace_all(line, "\\InsetSpace \\space{}");
        let updated = THINSPACE_RE.replace_all(&updated, "\\InsetSpace \\thinspace{}").into_owned();
        *line = updated;
    }
    Ok(())
}

fn revert_space_names(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if line.contains("\\InsetSpace") {
            *line = line
                .replace("\\InsetSpace \\space{}", "\\InsetSpace \\space")
                .replace("\\InsetSpace \\thinspace{}", "\\InsetSpace \\,");
        }
    }
    Ok(())
}

fn convert_bibtex(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if line.starts_with("\\begin_inset LatexCommand \\BibTeX") {
            *line = line.replacen("\\BibTeX", "\\bibtex", 1);
        }
    }
    Ok(())
}

fn revert_bibtex(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if line.starts_with("\\begin_inset LatexCommand \\bibtex") {
            *line = line.replacen("\\bibtex", "\\BibTeX", 1);
        }
    }
    Ok(())
}

/// `\lyxparent` insets have no effect any more.
fn remove_insetparent(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset LatexCommand \\lyxparent", i..) {
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after a parent inset")?;
            i = k + 1;
            continue;
        };
        document.body.drain(k..=end);
        i = k;
    }
    Ok(())
}

fn revert_eqref(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_re(&document.body, &EQREF_RE, i..) {
        let argument = EQREF_RE.replace(&document.body[k], "").trim().to_string();
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after an \\eqref inset")?;
            i = k + 1;
            continue;
        };
        let ert = put_cmd_in_ert(&format!("\\eqref{}", argument), 223);
        i = k + ert.len();
        document.body.splice(k..=end, ert);
    }
    Ok(())
}

// Insets

/// External insets list their parameters on separate lines; raster images
/// are graphics insets.
fn convert_external(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset External", i..) {
        i = k + 1;
        let (template, filename) = match EXTERNAL_RE.captures(&document.body[k]) {
            Some(c) => (c[1].to_string(), c[2].to_string()),
            None => continue,
        };
        let mut lines = if template == "RasterImage" {
            vec!["\\begin_inset Graphics".to_string()]
        } else {
            vec!["\\begin_inset External".to_string(), format!("\ttemplate {}", template)]
        };
        if !filename.is_empty() {
            lines.push(format!("\tfilename {}", filename));
        }
        i = k + lines.len();
        document.body.splice(k..=k, lines);
    }
    Ok(())
}

fn revert_external(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_inset External", i..) {
        i = k + 1;
        if EXTERNAL_RE.is_match(&document.body[k]) {
            continue;
        }
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after an external inset")?;
            continue;
        };
        let template = get_value(&document.body, "template", k + 1..end);
        let filename = get_value(&document.body, "filename", k + 1..end);
        document.body[k] = format!("\\begin_inset External {},\"{}\",\"\"", template, filename);
        let end = del_token(&mut document.body, "template", k + 1, end);
        del_token(&mut document.body, "filename", k + 1, end);
    }
    Ok(())
}

/// Consecutive `Comment` paragraphs become one comment inset.
fn convert_comment(document: &mut Document) -> ConvertResult<()> {
    let default_layout = document.default_layout();
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\layout Comment", i..) {
        let mut end = k;
        let mut starts = Vec::new();
        while document.body.get(end).is_some_and(|line| line.trim_end() == "\\layout Comment") {
            starts.push(end);
            let Some(next) = find_paragraph_end(&document.body, end) else {
                document.malformed("unterminated inset in a comment")?;
                return Ok(());
            };
            end = next;
        }
        let mut inset = vec![
            format!("\\layout {}", default_layout),
            String::new(),
            String::new(),
            "\\begin_inset Comment".to_string(),
            "collapsed true".to_string(),
            String::new(),
        ];
        for n in k..end {
            if starts.contains(&n) {
                inset.push(format!("\\layout {}", default_layout));
            } else {
                inset.push(document.body[n].clone());
            }
        }
        inset.push("\\end_inset".to_string());
        inset.push(String::new());
        inset.push(String::new());
        i = k + inset.len();
        document.body.splice(k..end, inset);
    }
    Ok(())
}

fn revert_comment(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() == 2
            && words[0] == "\\begin_inset"
            && matches!(words[1], "Comment" | "Greyedout")
        {
            *line = "\\begin_inset Note".to_string();
        }
    }
    Ok(())
}

const NOTE_KINDS: &[&str] = &["Note", "Comment", "Greyedout"];

fn convert_note(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() == 2 && words[0] == "\\begin_inset" && NOTE_KINDS.contains(&words[1]) {
            *line = format!("\\begin_inset Note {}", words[1]);
        }
    }
    Ok(())
}

fn revert_note(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() == 3
            && words[0] == "\\begin_inset"
            && words[1] == "Note"
            && NOTE_KINDS.contains(&words[2])
        {
            *line = format!("\\begin_inset {}", words[2]);
        }
    }
    Ok(())
}

const COLLAPSABLE: &[&str] = &[
    "\\begin_inset Box",
    "\\begin_inset Branch",
    "\\begin_inset CharStyle",
    "\\begin_inset Float",
    "\\begin_inset Foot",
    "\\begin_inset Marginal",
    "\\begin_inset Note",
    "\\begin_inset OptArg",
    "\\begin_inset Wrap",
];

/// `collapsed true|false` becomes `status collapsed|open`.
fn convert_collapsable(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_tokens_exact(&document.body, COLLAPSABLE, i..) {
        i = k + 1;
        let mut n = k + 1;
        while n < document.body.len() {
            let line = document.body[n].trim_end();
            if line == "collapsed false" {
                document.body[n] = "status open".to_string();
                break;
            } else if line == "collapsed true" {
                document.body[n] = "status collapsed".to_string();
                break;
            } else if line.starts_with("\\begin_layout") {
                document.warning("Malformed LyX document: Missing 'collapsed'.");
                break;
            }
            n += 1;
        }
    }
    Ok(())
}

fn revert_collapsable(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_tokens_exact(&document.body, COLLAPSABLE, i..) {
        i = k + 1;
        let mut n = k + 1;
        while n < document.body.len() {
            let line = document.body[n].trim_end();
            if line == "status open" {
                document.body[n] = "collapsed false".to_string();
                break;
            } else if line == "status collapsed" || line == "status inlined" {
                document.body[n] = "collapsed true".to_string();
                break;
            } else if line.starts_with("\\begin_layout") {
                document.warning("Malformed LyX document: Missing 'status'.");
                break;
            }
            n += 1;
        }
    }
    Ok(())
}

fn rename_ert_status(document: &mut Document, renames: &[(&str, &str)]) {
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_inset ERT", i..) {
        i = k + 1;
        let Some(status) = document.body.get_mut(k + 1) else {
            break;
        };
        let renamed = renames
            .iter()
            .find(|(old, _)| status.trim_end() == format!("status {}", old));
        if let Some((_, new)) = renamed {
            *status = format!("status {}", new);
        }
    }
}

fn convert_ert(document: &mut Document) -> ConvertResult<()> {
    rename_ert_status(
        document,
        &[("Open", "open"), ("Collapsed", "collapsed"), ("Inlined", "inlined")],
    );
    Ok(())
}

fn revert_ert(document: &mut Document) -> ConvertResult<()> {
    rename_ert_status(
        document,
        &[("open", "Open"), ("collapsed", "Collapsed"), ("inlined", "Inlined")],
    );
    Ok(())
}

const MINIPAGE_POSITIONS: &[&str] = &["t", "c", "b"];
const MINIPAGE_INNER_POSITIONS: &[&str] = &["", "t", "c", "b"];

/// Value of a `name value` inset parameter on line `n`, if that line holds it.
fn inset_param(lines: &[String], n: usize, name: &str) -> Option<String> {
    let line = lines.get(n)?;
    let rest = line.strip_prefix(name)?;
    rest.starts_with(' ').then(|| rest.trim().to_string())
}

/// Minipages are frameless boxes.
fn convert_minipage(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset Minipage", i..) {
        i = k + 1;
        let body = &mut document.body;
        let n = k + 1;
        let take = |body: &mut Vec<String>, name: &str| -> Option<String> {
            let value = inset_param(body, n, name)?;
            body.remove(n);
            Some(value)
        };
        let position = take(body, "position")
            .and_then(|p| p.parse::<usize>().ok())
            .and_then(|p| MINIPAGE_POSITIONS.get(p).copied())
            .unwrap_or("t");
        let mut inner = take(body, "inner_position")
            .and_then(|p| p.parse::<usize>().ok())
            .and_then(|p| MINIPAGE_INNER_POSITIONS.get(p).copied())
            .unwrap_or("");
        let mut height = take(body, "height").unwrap_or_else(|| "\"1pt\"".to_string());
        if height == "\"0pt\"" || height == "\"0\"" {
            height = "\"1pt\"".to_string();
        }
        let width = take(body, "width").unwrap_or_else(|| "\"0\"".to_string());
        let status = match take(body, "collapsed").as_deref() {
            Some("false") => "open",
            _ => "collapsed",
        };
        if height == "\"1pt\"" && inner == "c" {
            inner = "t";
        }
        body[k] = "\\begin_inset Box Frameless".to_string();
        let params = [
            format!("position \"{}\"", position),
            "hor_pos \"c\"".to_string(),
            "has_inner_box 1".to_string(),
            format!("inner_pos \"{}\"", inner),
            "use_parbox 0".to_string(),
            format!("width {}", width),
            "special \"none\"".to_string(),
            format!("height {}", height),
            "height_special \"totalheight\"".to_string(),
            format!("status {}", status),
        ];
        body.splice(n..n, params);
    }
    Ok(())
}

/// Boxes become minipages; frames other than none are lost.
fn revert_box(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset Box", i..) {
        i = k + 1;
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after a box")?;
            continue;
        };
        let kind = document.body[k].split_whitespace().nth(2).unwrap_or("Frameless").to_string();
        if kind != "Frameless" {
            document.warning(format!("Box frame '{}' dropped", kind));
        }
        let params_end = find_token(&document.body, "\\begin_layout", k + 1..end).unwrap_or(end);
        let value = |name: &str| -> String {
            (k + 1..params_end)
                .find_map(|n| inset_param(&document.body, n, name))
                .unwrap_or_default()
        };
        let strip = |v: String| v.trim_matches('"').to_string();
        let position = MINIPAGE_POSITIONS
            .iter()
            .position(|p| *p == strip(value("position")))
            .unwrap_or(0);
        let inner = MINIPAGE_INNER_POSITIONS
            .iter()
            .position(|p| *p == strip(value("inner_pos")))
            .unwrap_or(0);
        let mut height = value("height");
        if height == "\"1pt\"" || height.is_empty() {
            height = "\"0pt\"".to_string();
        }
        let mut width = value("width");
        if width.is_empty() {
            width = "\"0\"".to_string();
        }
        let collapsed = if value("status") == "open" { "false" } else { "true" };
        let params = vec![
            "\\begin_inset Minipage".to_string(),
            format!("position {}", position),
            format!("inner_position {}", inner),
            format!("height {}", height),
            format!("width {}", width),
            format!("collapsed {}", collapsed),
        ];
        // Blank lines between the parameters and the first paragraph stay.
        let first_blank = (k + 1..params_end)
            .find(|&n| document.body[n].trim().is_empty())
            .unwrap_or(params_end);
        document.body.splice(k..first_blank, params);
    }
    Ok(())
}

fn convert_float(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_inset Float", i..) {
        i = k + 1;
        let mut n = k + 1;
        while n < document.body.len() {
            if document.body[n].starts_with("wide") {
                document.body.insert(n + 1, "sideways false".to_string());
                break;
            }
            if document.body[n].starts_with("\\begin_layout") {
                document.warning("Malformed LyX document: Missing 'wide'.");
                break;
            }
            n += 1;
        }
    }
    Ok(())
}

/// Sideways figures and tables are written as raw `sideways` environments.
fn revert_float(document: &mut Document) -> ConvertResult<()> {
    let default_layout = document.default_layout();
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_inset Float", i..) {
        i = k + 1;
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after a float")?;
            continue;
        };
        let sideways = get_value(&document.body, "sideways", k + 1..end);
        if sideways != "true" {
            del_token(&mut document.body, "sideways", k + 1, end);
            continue;
        }
        let kind = FLOAT_RE
            .captures(&document.body[k])
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        if kind != "figure" && kind != "table" {
            del_token(&mut document.body, "sideways", k + 1, end);
            continue;
        }
        let Some(first) = find_token(&document.body, "\\begin_layout", k + 1..end) else {
            document.malformed("float without a paragraph")?;
            continue;
        };
        let mut lines = put_cmd_in_ert(&format!("\\begin{{sideways{}}}", kind), 229);
        lines.push("\\end_layout".to_string());
        lines.push(String::new());
        lines.extend(document.body[first..end].iter().cloned());
        lines.push(format!("\\begin_layout {}", default_layout));
        lines.extend(put_cmd_in_ert(&format!("\\end{{sideways{}}}", kind), 229));
        i = k + lines.len();
        document.body.splice(k..=end, lines);
        document.add_to_preamble(&["\\usepackage{rotfloat}"]);
    }
    Ok(())
}

/// Graphics file names without an extension get the one LyX 1.3 would
/// have found next to the document.
fn convert_graphics(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset Graphics", i..) {
        i = k + 1;
        let end = find_end_of_inset(&document.body, k).unwrap_or(document.body.len());
        let Some(n) = find_token_exact(&document.body, "filename", k + 1..end) else {
            continue;
        };
        let filename = get_value(&document.body, "filename", n..=n);
        let path = std::path::Path::new(&filename);
        if filename.is_empty() || path.extension().is_some() {
            continue;
        }
        let dir = document.dir().map(std::path::Path::to_path_buf);
        let base = match (dir, path.is_absolute()) {
            (_, true) => path.to_path_buf(),
            (Some(dir), false) => dir.join(path),
            (None, false) => {
                document.warning(format!(
                    "Cannot determine whether {} needs an extension when reading from standard input",
                    filename
                ));
                continue;
            }
        };
        if base.exists() {
            continue;
        }
        for extension in ["ps", "eps"] {
            if base.with_extension(extension).exists() {
                document.body[n] = document.body[n].replacen(
                    &filename,
                    &format!("{}.{}", filename, extension),
                    1,
                );
                break;
            }
        }
    }
    Ok(())
}

/// Text of the first paragraph of the block starting at `start`.
fn paragraph_text(lines: &[String], start: usize) -> Option<String> {
    let end = find_end_of_layout(lines, start)?;
    Some(
        lines[start + 1..end]
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.as_str())
            .collect::<String>(),
    )
}

/// DocBook author names move from nested paragraphs to character styles.
fn convert_names(document: &mut Document) -> ConvertResult<()> {
    if document.backend != Backend::Docbook {
        return Ok(());
    }
    let default_layout = document.default_layout();
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_layout Author", i..) {
        i = k + 1;
        let body = &document.body;
        let Some(end) = find_end_of_layout(body, k) else {
            document.malformed("missing \\end_layout after an author")?;
            continue;
        };
        if body[k + 1..end].iter().any(|line| !line.trim().is_empty()) {
            continue;
        }
        let Some(deeper) = (end + 1..body.len()).find(|&n| !body[n].trim().is_empty()) else {
            continue;
        };
        if !body[deeper].starts_with("\\begin_deeper") {
            continue;
        }
        let Some(deeper_end) = find_end_of(body, deeper, "\\begin_deeper", "\\end_deeper") else {
            document.warning("Missing \\end_deeper, after style Author.");
            document.warning("Aborted attempt to parse FirstName and Surname.");
            return Ok(());
        };
        let part = |layout: &str| {
            find_token_exact(body, layout, deeper..deeper_end)
                .and_then(|n| paragraph_text(body, n))
                .unwrap_or_default()
        };
        let firstname = part("\\begin_layout FirstName");
        let surname = part("\\begin_layout Surname");

        let mut names = Vec::new();
        for (style, text) in [("Firstname", firstname), ("Surname", surname)] {
            names.extend([
                format!("\\begin_inset CharStyle {}", style),
                "status inlined".to_string(),
                String::new(),
                format!("\\begin_layout {}", default_layout),
                text,
                "\\end_layout".to_string(),
                String::new(),
                "\\end_inset".to_string(),
            ]);
        }
        document.body.drain(end + 1..=deeper_end);
        document.body.splice(k + 1..end, names);
    }
    Ok(())
}

fn revert_names(document: &mut Document) -> ConvertResult<()> {
    if document.backend != Backend::Docbook {
        return Ok(());
    }
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_layout Author", i..) {
        i = k + 1;
        let Some(end) = find_end_of_layout(&document.body, k) else {
            document.malformed("missing \\end_layout after an author")?;
            continue;
        };
        let mut parts = Vec::new();
        for (style, layout) in [("Firstname", "FirstName"), ("Surname", "Surname")] {
            let token = format!("\\begin_inset CharStyle {}", style);
            let Some(start) = find_token_exact(&document.body, &token, k + 1..end) else {
                continue;
            };
            let text = find_token(&document.body, "\\begin_layout", start..end)
                .and_then(|n| paragraph_text(&document.body, n))
                .unwrap_or_default();
            parts.push((layout, text));
        }
        if parts.is_empty() {
            continue;
        }
        let mut deeper = vec![String::new(), "\\begin_deeper".to_string()];
        for (layout, text) in parts {
            deeper.extend([
                format!("\\begin_layout {}", layout),
                text,
                "\\end_layout".to_string(),
                String::new(),
            ]);
        }
        deeper.push("\\end_deeper".to_string());
        document.body.splice(end + 1..end + 1, deeper);
        document.body.drain(k + 1..end);
    }
    Ok(())
}

// Paragraph structure

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Layout,
    Inset,
    Deeper,
}

/// Close every paragraph with `\end_layout`.
fn add_end_layout(document: &mut Document) -> ConvertResult<()> {
    let Some(first) = find_token(&document.body, "\\layout", ..) else {
        return Ok(());
    };
    const TOKENS: &[&str] = &[
        "\\begin_inset",
        "\\end_inset",
        "\\layout",
        "\\begin_deeper",
        "\\end_deeper",
        "\\the_end",
    ];
    let mut stack = vec![Open::Layout];
    let mut i = first + 1;
    loop {
        let Some(k) = find_tokens(&document.body, TOKENS, i..) else {
            document.warning("Truncated document.");
            document.body.push("\\the_end".to_string());
            continue;
        };
        let body = &mut document.body;
        let token = body[k].split_whitespace().next().unwrap_or("").to_string();
        let close = |body: &mut Vec<String>, stack: &mut Vec<Open>, at: usize| -> usize {
            if stack.last() == Some(&Open::Layout) {
                stack.pop();
                body.splice(at..at, ["\\end_layout".to_string(), String::new()]);
                2
            } else {
                0
            }
        };
        i = match token.as_str() {
            "\\begin_inset" => {
                stack.push(Open::Inset);
                k + 1
            }
            "\\end_inset" => {
                let shift = close(body, &mut stack, k);
                if stack.last() == Some(&Open::Inset) {
                    stack.pop();
                }
                k + shift + 1
            }
            "\\layout" => {
                let shift = close(body, &mut stack, k);
                stack.push(Open::Layout);
                k + shift + 1
            }
            "\\begin_deeper" => {
                let shift = close(body, &mut stack, k);
                stack.push(Open::Deeper);
                k + shift + 1
            }
            "\\end_deeper" => {
                let shift = close(body, &mut stack, k);
                if stack.last() == Some(&Open::Deeper) {
                    stack.pop();
                }
                k + shift + 1
            }
            _ => {
                close(body, &mut stack, k);
                return Ok(());
            }
        };
    }
}

fn rm_end_layout(document: &mut Document) -> ConvertResult<()> {
    let body = &mut document.body;
    let mut i = 0;
    while let Some(k) = find_token(body, "\\end_layout", i..) {
        body.remove(k);
        if body.get(k).is_some_and(|line| line.is_empty()) {
            body.remove(k);
        }
        i = k;
    }
    Ok(())
}

fn layout2begin_layout(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if let Some(rest) = line.strip_prefix("\\layout") {
            *line = format!("\\begin_layout{}", rest);
        }
    }
    Ok(())
}

fn begin_layout2layout(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if let Some(rest) = line.strip_prefix("\\begin_layout") {
            *line = format!("\\layout{}", rest);
        }
    }
    Ok(())
}

fn convert_end_document(document: &mut Document) -> ConvertResult<()> {
    match find_token(&document.body, "\\the_end", ..) {
        Some(i) => document.body[i] = "\\end_document".to_string(),
        None => {
            document.warning("Malformed LyX document: Missing \\the_end.");
            document.body.push("\\end_document".to_string());
        }
    }
    Ok(())
}

fn revert_end_document(document: &mut Document) -> ConvertResult<()> {
    match find_token(&document.body, "\\end_document", ..) {
        Some(i) => document.body[i] = "\\the_end".to_string(),
        None => {
            document.warning("Malformed LyX document: Missing \\end_document.");
            document.body.push("\\the_end".to_string());
        }
    }
    Ok(())
}

fn convert_table_valign_middle(document: &mut Document) -> ConvertResult<()> {
    rename_valignment(document, "center", "middle");
    Ok(())
}

fn revert_valignment_middle(document: &mut Document) -> ConvertResult<()> {
    rename_valignment(document, "middle", "center");
    Ok(())
}

fn rename_valignment(document: &mut Document, from: &str, to: &str) {
    for line in document.body.iter_mut() {
        if (line.starts_with("<column") || line.starts_with("<cell"))
            && get_option(line, "valignment") == Some(from)
        {
            *line = set_option(line, "valignment", to);
        }
    }
}

const VSPACE_INSET: &str = "\\begin_inset VSpace";

fn is_paragraph_parameter(line: &str) -> bool {
    let first = line.split_whitespace().next().unwrap_or("");
    PARAGRAPH_PARAMETERS.contains(&first)
}

#[derive(Default)]
struct Breaks {
    line_top: bool,
    line_bottom: bool,
    pagebreak_top: bool,
    pagebreak_bottom: bool,
    space_top: Option<String>,
    space_bottom: Option<String>,
}

impl Breaks {
    fn any(&self) -> bool {
        self.line_top
            || self.line_bottom
            || self.pagebreak_top
            || self.pagebreak_bottom
            || self.space_top.is_some()
            || self.space_bottom.is_some()
    }
}

fn vspace_lines(value: &str) -> Vec<String> {
    vec![
        format!("{} {}", VSPACE_INSET, value),
        "\\end_inset".to_string(),
        String::new(),
        String::new(),
    ]
}

/// Paragraph rules, page breaks and added space become line, page break and
/// vertical space insets. Paragraphs that are not plain get their breaks in
/// extra standard paragraphs so no rule ends up inside an environment.
fn convert_breaks(document: &mut Document) -> ConvertResult<()> {
    let default_layout = document.default_layout();
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_layout", i..) {
        i = k + 1;
        let layout = document.body[k]
            .split_whitespace()
            .nth(1)
            .unwrap_or(default_layout)
            .to_string();
        let mut p = k + 1;
        let mut tokens = Vec::new();
        while p < document.body.len() && is_paragraph_parameter(&document.body[p]) {
            tokens.extend(split_tokens(&document.body[p]));
            p += 1;
        }

        let mut breaks = Breaks::default();
        let mut kept = Vec::new();
        for token in tokens {
            let mut words = token.split_whitespace();
            match words.next().unwrap_or("") {
                "\\line_top" => breaks.line_top = true,
                "\\line_bottom" => breaks.line_bottom = true,
                "\\pagebreak_top" => breaks.pagebreak_top = true,
                "\\pagebreak_bottom" => breaks.pagebreak_bottom = true,
                "\\added_space_top" => breaks.space_top = words.next().map(str::to_string),
                "\\added_space_bottom" => breaks.space_bottom = words.next().map(str::to_string),
                _ => kept.push(token),
            }
        }
        if !breaks.any() {
            continue;
        }
        let nonstandard = layout != default_layout
            || kept.iter().any(|t| {
                t.starts_with("\\align")
                    || t.starts_with("\\labelwidthstring")
                    || t.starts_with("\\noindent")
            });

        let kept_len = kept.len();
        document.body.splice(k + 1..p, kept);
        let mut start = k;
        let p = k + 1 + kept_len;

        let mut above = Vec::new();
        if breaks.pagebreak_top {
            above.extend(["\\newpage".to_string(), String::new()]);
        }
        if let Some(space) = &breaks.space_top {
            above.extend(vspace_lines(space));
        }
        if breaks.line_top {
            above.extend(["\\lyxline".to_string(), String::new(), String::new()]);
            above.extend(put_cmd_in_ert("\\vspace{-1\\parskip}", 225));
            above.push(String::new());
        }
        if !above.is_empty() {
            if nonstandard {
                let mut paragraph =
                    vec![format!("\\begin_layout {}", default_layout), String::new()];
                paragraph.extend(above);
                paragraph.extend(["\\end_layout".to_string(), String::new()]);
                start += paragraph.len();
                document.body.splice(k..k, paragraph);
            } else {
                document.body.splice(p..p, above);
            }
        }

        let Some(end) = find_end_of_layout(&document.body, start) else {
            document.malformed("missing \\end_layout")?;
            i = start + 1;
            continue;
        };
        let mut below = Vec::new();
        if let Some(space) = &breaks.space_bottom {
            below.extend(vspace_lines(space));
        }
        if breaks.line_bottom {
            below.extend(["\\lyxline".to_string(), String::new(), String::new()]);
        }
        if breaks.pagebreak_bottom {
            below.extend(["\\newpage".to_string(), String::new()]);
        }
        if !below.is_empty() {
            if nonstandard {
                let mut paragraph = vec![
                    String::new(),
                    format!("\\begin_layout {}", default_layout),
                    String::new(),
                ];
                paragraph.extend(below);
                paragraph.push("\\end_layout".to_string());
                document.body.splice(end + 1..end + 1, paragraph);
            } else {
                document.body.splice(end..end, below);
            }
        }
        i = start + 1;
    }
    Ok(())
}

/// The paragraph parameter a break construct at line `n` stands for, and
/// the index past the construct.
fn break_at(body: &[String], n: usize, side: &str) -> Option<(String, usize)> {
    let line = body.get(n)?.trim_end();
    if line == "\\newpage" {
        Some((format!("\\pagebreak_{}", side), n + 1))
    } else if line == "\\lyxline" {
        Some((format!("\\line_{}", side), n + 1))
    } else if let Some(value) = line.strip_prefix(VSPACE_INSET) {
        let end = find_end_of_inset(body, n)?;
        Some((format!("\\added_space_{} {}", side, value.trim()), end + 1))
    } else {
        None
    }
}

/// End of the ERT inset at `n` when it holds exactly `\vspace{-1\parskip}`.
fn parskip_ert_end(body: &[String], n: usize) -> Option<usize> {
    if body.get(n)?.trim_end() != "\\begin_inset ERT" {
        return None;
    }
    let end = find_end_of_inset(body, n)?;
    let text: Vec<&String> = body[n + 1..end]
        .iter()
        .filter(|line| {
            !line.trim().is_empty()
                && !line.starts_with("status")
                && !line.starts_with("\\begin_layout")
                && !line.starts_with("\\end_layout")
        })
        .collect();
    (lines_to_latex(&text).trim() == "\\vspace{-1\\parskip}").then_some(end)
}

fn next_content(body: &[String], from: usize, to: usize) -> usize {
    (from..to).find(|&n| !body[n].trim().is_empty()).unwrap_or(to)
}

/// LaTeX for a page break or vertical space left in the middle of a
/// paragraph.
fn break_latex(line: &str) -> String {
    if line.trim_end() == "\\newpage" {
        return "\\newpage{}".to_string();
    }
    let value = line.strip_prefix(VSPACE_INSET).unwrap_or("").trim();
    let (value, star) = match value.strip_suffix('*') {
        Some(v) => (v, "*"),
        None => (value, ""),
    };
    match value {
        "vfill" => format!("\\vspace{}{{\\fill}}", star),
        "defskip" => "\\vspace{\\parskip}".to_string(),
        "smallskip" | "medskip" | "bigskip" => format!("\\{}{{}}", value),
        length => format!("\\vspace{}{{{}}}", star, length),
    }
}

/// Breaks at the start or end of a paragraph go back to paragraph
/// parameters; page breaks and vertical space elsewhere become raw LaTeX.
fn revert_breaks(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_layout", i..) {
        i = k + 1;
        let Some(end) = find_end_of_layout(&document.body, k) else {
            document.malformed("missing \\end_layout")?;
            continue;
        };
        let body = &mut document.body;
        let mut p = k + 1;
        while p < end && is_paragraph_parameter(&body[p]) {
            p += 1;
        }

        let mut params = Vec::new();
        let start = next_content(body, p, end);
        let mut n = start;
        while n < end {
            let Some((param, next)) = break_at(body, n, "top") else {
                break;
            };
            let rule = param == "\\line_top";
            params.push(param);
            n = next_content(body, next, end);
            if rule {
                if let Some(ert_end) = parskip_ert_end(body, n) {
                    n = next_content(body, ert_end + 1, end);
                }
            }
        }
        body.drain(start..n);
        let end = end - (n - start);

        let mut bottom = Vec::new();
        let mut cut = end;
        while let Some(last) = (p..cut).rev().find(|&n| !body[n].trim().is_empty()) {
            let first = if body[last].trim_end() == "\\end_inset" {
                match find_beginning_of_inset(body, last) {
                    Some(s) if s >= p && body[s].starts_with(VSPACE_INSET) => s,
                    _ => break,
                }
            } else {
                last
            };
            let Some((param, _)) = break_at(body, first, "bottom") else {
                break;
            };
            bottom.push(param);
            cut = first;
        }
        if !bottom.is_empty() {
            body.drain(cut..end);
            bottom.reverse();
            params.extend(bottom);
        }
        body.splice(p..p, params);
    }

    let mut i = 0;
    while i < document.body.len() {
        let line = document.body[i].trim_end();
        let span_end = if line == "\\newpage" {
            Some(i)
        } else if line.starts_with(VSPACE_INSET) {
            find_end_of_inset(&document.body, i)
        } else {
            None
        };
        match span_end {
            Some(end) => {
                let ert = put_cmd_in_ert(&break_latex(&document.body[i]), 225);
                let len = ert.len();
                document.body.splice(i..=end, ert);
                i += len;
            }
            None => i += 1,
        }
    }
    Ok(())
}

/// Paragraphs inside ERT insets are plain, and line breaks are paragraph
/// breaks.
fn convert_ert_paragraphs(document: &mut Document) -> ConvertResult<()> {
    const FORBIDDEN: &[&str] = &[
        "\\paragraph_spacing",
        "\\labelwidthstring",
        "\\start_of_appendix",
        "\\noindent",
        "\\leftindent",
        "\\align",
        "\\family",
        "\\series",
        "\\shape",
        "\\size",
        "\\emph",
        "\\numeric",
        "\\bar",
        "\\noun",
        "\\color",
        "\\lang",
    ];
    let default_layout = document.default_layout();
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_inset ERT", i..) {
        i = k + 1;
        let Some(mut end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after an ERT inset")?;
            continue;
        };
        let body = &mut document.body;

        let mut n = k + 1;
        while n < end {
            let first = body[n].split_whitespace().next().unwrap_or("");
            if FORBIDDEN.contains(&first) {
                body.remove(n);
                end -= 1;
            } else {
                if first == "\\begin_layout" {
                    body[n] = format!("\\begin_layout {}", default_layout);
                }
                n += 1;
            }
        }

        // An empty paragraph before each paragraph but the first keeps the
        // blank line LaTeX needs between them.
        let mut first = true;
        let mut n = k + 1;
        while let Some(p) = find_token(body, "\\begin_layout", n..end) {
            if first {
                first = false;
                n = p + 1;
                continue;
            }
            body.splice(
                p..p,
                [
                    format!("\\begin_layout {}", default_layout),
                    String::new(),
                    "\\end_layout".to_string(),
                    String::new(),
                ],
            );
            end += 4;
            n = p + 5;
        }

        let mut n = k + 1;
        while let Some(p) = find_token(body, "\\newline", n..end) {
            body.splice(
                p..=p,
                [
                    "\\end_layout".to_string(),
                    String::new(),
                    format!("\\begin_layout {}", default_layout),
                ],
            );
            end += 2;
            n = p + 3;
        }
    }
    Ok(())
}

fn revert_ert_paragraphs(document: &mut Document) -> ConvertResult<()> {
    let default_layout = document.default_layout();
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_inset ERT", i..) {
        i = k + 1;
        let Some(mut end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after an ERT inset")?;
            continue;
        };
        let body = &mut document.body;

        // Paragraph breaks become line breaks.
        let mut n = k + 1;
        loop {
            let Some(close) = find_token(body, "\\end_layout", n..end) else {
                break;
            };
            let Some(open) = find_token(body, "\\begin_layout", close..end) else {
                break;
            };
            body.splice(close..=open, ["\\newline".to_string()]);
            end -= open - close;
            n = close + 1;
        }

        // Two line breaks in a row are a paragraph break.
        let mut n = k + 1;
        while let Some(p) = find_token(body, "\\newline", n..end) {
            let next = next_content(body, p + 1, end);
            if next < end && body[next].trim_end() == "\\newline" {
                body.splice(
                    p..=next,
                    [
                        "\\end_layout".to_string(),
                        String::new(),
                        format!("\\begin_layout {}", default_layout),
                    ],
                );
                end = end + 2 - (next - p);
                n = p + 3;
            } else {
                n = p + 1;
            }
        }
    }
    Ok(())
}

/// DocBook `SGML` paragraphs hold raw markup in an inlined ERT inset.
fn convert_sgml_paragraphs(document: &mut Document) -> ConvertResult<()> {
    if document.backend != Backend::Docbook {
        return Ok(());
    }
    let default_layout = document.default_layout();
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_layout SGML", i..) {
        let Some(end) = find_end_of_layout(&document.body, k) else {
            document.malformed("missing \\end_layout after an SGML paragraph")?;
            i = k + 1;
            continue;
        };
        document.body[k] = format!("\\begin_layout {}", default_layout);
        document.body.splice(
            end + 1..end + 1,
            [
                String::new(),
                "\\end_inset".to_string(),
                String::new(),
                String::new(),
                "\\end_layout".to_string(),
            ],
        );
        document.body.splice(
            k + 1..k + 1,
            [
                "\\begin_inset ERT".to_string(),
                "status inlined".to_string(),
                String::new(),
                format!("\\begin_layout {}", default_layout),
                String::new(),
            ],
        );
        i = end + 10;
    }
    Ok(())
}

fn add_begin_body(document: &mut Document) -> ConvertResult<()> {
    if find_token(&document.body, "\\begin_body", ..).is_some() {
        return Ok(());
    }
    document.body.splice(0..0, ["\\begin_body".to_string(), String::new()]);
    match find_token(&document.body, "\\end_document", ..) {
        Some(i) => document.body.insert(i, "\\end_body".to_string()),
        None => document.malformed("missing \\end_document")?,
    }
    Ok(())
}

fn remove_begin_body(document: &mut Document) -> ConvertResult<()> {
    let body = &mut document.body;
    if let Some(i) = find_token(body, "\\begin_body", ..) {
        body.remove(i);
        if body.get(i).is_some_and(|line| line.is_empty()) {
            body.remove(i);
        }
    }
    if let Some(i) = find_token(body, "\\end_body", ..) {
        body.remove(i);
    }
    Ok(())
}

pub static MODULE: ConverterModule = ConverterModule {
    name: "1_4",
    convert: &[
        step!(222 => [insert_tracking_changes, add_end_header, convert_amsmath]),
        step!(223 => [remove_color_default, convert_spaces, convert_bibtex, remove_insetparent]),
        step!(224 => [convert_external, convert_comment]),
        step!(225 => [
            add_end_layout,
            layout2begin_layout,
            convert_end_document,
            convert_table_valign_middle,
            convert_breaks,
            convert_note,
        ]),
        step!(226 => [convert_paperpackage]),
        step!(227 => [convert_collapsable, convert_ert]),
        step!(228 => [convert_minipage]),
        step!(229 => [convert_jurabib]),
        step!(230 => [convert_float]),
        step!(231 => [convert_graphics]),
        step!(232 => [convert_names]),
        step!(233 => [convert_cite_engine]),
        step!(234 => [convert_bibtopic]),
        Step { format: 235, rewrites: &[] },
        step!(236 => [use_x_boolean]),
        Step { format: 237, rewrites: &[] },
        step!(238 => [convert_output_changes]),
        step!(239 => [convert_ert_paragraphs]),
        step!(240 => [convert_french]),
        step!(241 => [remove_paperpackage]),
        step!(242 => [rename_spaces]),
        step!(243 => [remove_quotestimes]),
        step!(244 => [convert_sgml_paragraphs]),
        step!(245 => [add_begin_body]),
    ],
    revert: &[
        step!(244 => [remove_begin_body]),
        Step { format: 243, rewrites: &[] },
        step!(242 => [revert_quotestimes]),
        step!(241 => [revert_space_names]),
        Step { format: 240, rewrites: &[] },
        Step { format: 239, rewrites: &[] },
        step!(238 => [revert_ert_paragraphs]),
        step!(237 => [revert_output_changes]),
        Step { format: 236, rewrites: &[] },
        step!(235 => [use_x_binary]),
        Step { format: 234, rewrites: &[] },
        step!(233 => [revert_bibtopic]),
        step!(232 => [revert_cite_engine]),
        step!(231 => [revert_names]),
        Step { format: 230, rewrites: &[] },
        step!(229 => [revert_float]),
        step!(228 => [revert_jurabib]),
        step!(227 => [revert_box]),
        step!(226 => [revert_collapsable, revert_ert]),
        step!(225 => [revert_paperpackage]),
        step!(224 => [
            revert_note,
            revert_breaks,
            revert_valignment_middle,
            revert_end_document,
            rm_end_layout,
            begin_layout2layout,
        ]),
        step!(223 => [revert_external, revert_comment, revert_eqref]),
        step!(222 => [revert_color_default, revert_spaces, revert_bibtex]),
        step!(221 => [revert_amsmath, rm_end_header, rm_tracking_changes, rm_body_changes]),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use lyx2lyx_common::Input;

    fn body(lines: &[&str], format: u32) -> Document {
        Document::from_lines(Vec::<String>::new(), lines.iter().copied(), format)
    }

    #[test]
    fn test_amsmath_settings() {
        let mut doc = Document::from_lines(["\\use_amsmath 0"], Vec::<String>::new(), 221);
        convert_amsmath(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\use_amsmath 1"]);
        revert_amsmath(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\use_amsmath 0"]);
    }

    #[test]
    fn test_tracking_changes_removed_with_authors() {
        let mut doc = Document::from_lines(
            ["\\tracking_changes 1", "\\author \"Jane\"", "\\paperpackage a4"],
            ["\\change_inserted 0 10", "text", "\\change_unchanged"],
            222,
        );
        rm_tracking_changes(&mut doc).unwrap();
        rm_body_changes(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\paperpackage a4"]);
        assert_eq!(doc.body, vec!["text"]);
    }

    #[test]
    fn test_end_layout_added() {
        let mut doc = body(
            &[
                "\\layout Standard",
                "",
                "Hello",
                "\\begin_inset Note",
                "collapsed true",
                "",
                "\\layout Standard",
                "",
                "inside",
                "\\end_inset",
                "",
                "\\the_end",
            ],
            224,
        );
        add_end_layout(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\layout Standard",
                "",
                "Hello",
                "\\begin_inset Note",
                "collapsed true",
                "",
                "\\layout Standard",
                "",
                "inside",
                "\\end_layout",
                "",
                "\\end_inset",
                "",
                "\\end_layout",
                "",
                "\\the_end",
            ]
        );
    }

    #[test]
    fn test_truncated_document_gets_an_end() {
        let mut doc = body(&["\\layout Standard", "", "text"], 224);
        add_end_layout(&mut doc).unwrap();
        assert_eq!(doc.body, vec![
            "\\layout Standard",
            "",
            "text",
            "\\end_layout",
            "",
            "\\the_end",
        ]);
        assert_eq!(doc.warnings(), ["Truncated document."]);
    }

    #[test]
    fn test_paragraph_breaks_become_insets_and_back() {
        let mut doc = body(
            &["\\begin_layout Standard", "\\line_top \\pagebreak_bottom", "text", "\\end_layout"],
            224,
        );
        convert_breaks(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\begin_layout Standard",
                "\\lyxline",
                "",
                "",
                "\\begin_inset ERT",
                "status Collapsed",
                "",
                "\\begin_layout Standard",
                "\\backslash",
                "vspace{-1",
                "\\backslash",
                "parskip}",
                "\\end_layout",
                "",
                "\\end_inset",
                "",
                "text",
                "\\newpage",
                "",
                "\\end_layout",
            ]
        );

        revert_breaks(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\begin_layout Standard",
                "\\line_top",
                "\\pagebreak_bottom",
                "text",
                "\\end_layout",
            ]
        );
    }

    #[test]
    fn test_breaks_of_environments_get_own_paragraphs() {
        let mut doc = body(
            &["\\begin_layout Quote", "\\added_space_bottom 1cm", "text", "\\end_layout"],
            224,
        );
        convert_breaks(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\begin_layout Quote",
                "text",
                "\\end_layout",
                "",
                "\\begin_layout Standard",
                "",
                "\\begin_inset VSpace 1cm",
                "\\end_inset",
                "",
                "",
                "\\end_layout",
            ]
        );
    }

    #[test]
    fn test_stray_page_break_becomes_ert() {
        let mut doc = body(&[
            "\\begin_layout Standard",
            "a",
            "\\newpage",
            "b",
            "\\end_layout",
        ], 225);
        revert_breaks(&mut doc).unwrap();
        assert_eq!(doc.body[2], "\\begin_inset ERT");
        assert!(doc.body.contains(&"newpage{}".to_string()));
        assert_eq!(doc.body[doc.body.len() - 2], "b");
    }

    #[test]
    fn test_minipage_to_box_and_back() {
        let original = [
            "\\begin_inset Minipage",
            "position 1",
            "inner_position 0",
            "height \"0pt\"",
            "width \"50col%\"",
            "collapsed false",
            "",
            "\\begin_layout Standard",
            "x",
            "\\end_layout",
            "",
            "\\end_inset",
        ];
        let mut doc = body(&original, 227);
        convert_minipage(&mut doc).unwrap();
        assert_eq!(
            doc.body[..11],
            [
                "\\begin_inset Box Frameless",
                "position \"c\"",
                "hor_pos \"c\"",
                "has_inner_box 1",
                "inner_pos \"\"",
                "use_parbox 0",
                "width \"50col%\"",
                "special \"none\"",
                "height \"1pt\"",
                "height_special \"totalheight\"",
                "status open",
            ]
        );

        revert_box(&mut doc).unwrap();
        assert_eq!(doc.body, original);
    }

    #[test]
    fn test_cite_engine() {
        let mut doc = Document::from_lines(
            ["\\use_natbib 1", "\\use_numerical_citations 0", "\\use_jurabib 0"],
            Vec::<String>::new(),
            232,
        );
        convert_cite_engine(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\cite_engine natbib_authoryear"]);
        revert_cite_engine(&mut doc).unwrap();
        assert_eq!(doc.header, vec![
            "\\use_natbib 1",
            "\\use_numerical_citations 0",
            "\\use_jurabib 0",
        ]);
    }

    #[test]
    fn test_graphics_extension_found_next_to_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plot.eps"), "%!PS").unwrap();
        let mut doc = body(&["\\begin_inset Graphics", "\tfilename plot", "\\end_inset"], 230)
            .with_input(Input::File(dir.path().join("paper.lyx")));
        convert_graphics(&mut doc).unwrap();
        assert_eq!(doc.body[1], "\tfilename plot.eps");
    }

    #[test]
    fn test_graphics_from_stdin_warns() {
        let mut doc = body(&["\\begin_inset Graphics", "\tfilename plot", "\\end_inset"], 230);
        convert_graphics(&mut doc).unwrap();
        assert_eq!(doc.body[1], "\tfilename plot");
        assert_eq!(doc.warnings().len(), 1);
    }

    #[test]
    fn test_ert_paragraphs() {
        let mut doc = body(
            &[
                "\\begin_inset ERT",
                "status collapsed",
                "",
                "\\begin_layout Quote",
                "\\size large",
                "a",
                "\\newline",
                "b",
                "\\end_layout",
                "",
                "\\end_inset",
            ],
            238,
        );
        convert_ert_paragraphs(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\begin_inset ERT",
                "status collapsed",
                "",
                "\\begin_layout Standard",
                "a",
                "\\end_layout",
                "",
                "\\begin_layout Standard",
                "b",
                "\\end_layout",
                "",
                "\\end_inset",
            ]
        );
        revert_ert_paragraphs(&mut doc).unwrap();
        assert_eq!(doc.body[4..7], ["a", "\\newline", "b"]);
    }

    #[test]
    fn test_comment_paragraphs_merge() {
        let mut doc = body(
            &[
                "\\layout Comment",
                "",
                "one",
                "\\layout Comment",
                "",
                "two",
                "\\layout Standard",
                "",
                "x",
            ],
            223,
        );
        convert_comment(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\layout Standard",
                "",
                "",
                "\\begin_inset Comment",
                "collapsed true",
                "",
                "\\layout Standard",
                "",
                "one",
                "\\layout Standard",
                "",
                "two",
                "\\end_inset",
                "",
                "",
                "\\layout Standard",
                "",
                "x",
            ]
        );
    }

    #[test]
    fn test_spaces_revert_to_special_chars_or_ert() {
        let mut doc = body(&["a\\InsetSpace ~", "\\InsetSpace \\quad"], 222);
        revert_spaces(&mut doc).unwrap();
        assert_eq!(doc.body[0], "a\\SpecialChar ~");
        assert_eq!(
            doc.body[1..],
            [
                "\\begin_inset ERT",
                "status Collapsed",
                "",
                "\\layout Standard",
                "",
                "\\backslash",
                "quad",
                "\\end_inset",
            ]
        );
    }

    #[test]
    fn test_paper_package_moves_to_preamble() {
        let mut doc = Document::from_lines(
            ["\\papersize a4paper", "\\paperpackage widemarginsa4"],
            Vec::<String>::new(),
            240,
        );
        remove_paperpackage(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\papersize default"]);
        assert_eq!(doc.preamble, vec!["\\usepackage[widemargins]{a4}"]);
    }

    #[test]
    fn test_sideways_float_reverts_to_ert() {
        let mut doc = body(
            &[
                "\\begin_layout Standard",
                "\\begin_inset Float figure",
                "wide false",
                "sideways true",
                "status open",
                "",
                "\\begin_layout Standard",
                "pic",
                "\\end_layout",
                "",
                "\\end_inset",
                "",
                "\\end_layout",
            ],
            230,
        );
        revert_float(&mut doc).unwrap();
        assert_eq!(doc.preamble, vec!["\\usepackage{rotfloat}"]);
        assert!(!doc.body.iter().any(|line| line.starts_with("\\begin_inset Float")));
        assert!(doc.body.contains(&"begin{sidewaysfigure}".to_string()));
        assert!(doc.body.contains(&"end{sidewaysfigure}".to_string()));
    }

    #[test]
    fn test_body_markers() {
        let mut doc = body(&[
            "\\begin_layout Standard",
            "x",
            "\\end_layout",
            "\\end_document",
        ], 244);
        add_begin_body(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\begin_body",
                "",
                "\\begin_layout Standard",
                "x",
                "\\end_layout",
                "\\end_body",
                "\\end_document",
            ]
        );
        remove_begin_body(&mut doc).unwrap();
        assert_eq!(doc.body, vec![
            "\\begin_layout Standard",
            "x",
            "\\end_layout",
            "\\end_document",
        ]);
    }

    #[test]
    fn test_eqref_reverts_to_ert() {
        let mut doc = body(
            &[
                "\\begin_layout Standard",
                "\\begin_inset LatexCommand \\eqref{eq:a}",
                "",
                "\\end_inset",
                "",
                "\\end_layout",
            ],
            224,
        );
        revert_eqref(&mut doc).unwrap();
        assert_eq!(doc.body[1], "\\begin_inset ERT");
        assert!(doc.body.contains(&"eqref{eq:a}".to_string()));
        assert!(!doc.body.iter().any(|l| l.contains("LatexCommand")));
        assert_eq!(doc.body.last().map(String::as_str), Some("\\end_layout"));
    }

    #[test]
    fn test_unterminated_eqref_is_malformed() {
        let lines = [
            "\\begin_layout Standard",
            "\\begin_inset LatexCommand \\eqref{eq:a}",
            "text",
            "\\end_layout",
        ];
        let mut doc = body(&lines, 224);
        let error = revert_eqref(&mut doc).unwrap_err();
        assert!(matches!(error, lyx2lyx_common::ConvertError::Malformed(_)));
        assert_eq!(doc.body, lines);
    }
}

//! Building blocks shared by rewrite steps: raw-LaTeX (ERT) insets, the
//! `\backslash` escaping of LaTeX text and paragraph boundaries of the
//! pre-`\begin_layout` body syntax.

use lyx2lyx_parser::find_end_of_inset;

/// Paragraph parameters that may follow a `\layout` or `\begin_layout` line.
pub const PARAGRAPH_PARAMETERS: &[&str] = &[
    "\\noindent",
    "\\align",
    "\\labelwidthstring",
    "\\leftindent",
    "\\start_of_appendix",
    "\\paragraph_spacing",
    "\\line_top",
    "\\line_bottom",
    "\\pagebreak_top",
    "\\pagebreak_bottom",
    "\\added_space_top",
    "\\added_space_bottom",
];

/// Tokens that end a paragraph in the `\layout` syntax.
const PARAGRAPH_BREAKS: &[&str] = &[
    "\\layout",
    "\\begin_deeper",
    "\\end_deeper",
    "\\end_inset",
    "\\the_end",
    "\\end_float",
    "\\begin_float",
];

/// LaTeX text as LyX body lines: every backslash becomes a `\backslash` line
/// and line breaks become `\newline`.
pub fn latex_to_lines(latex: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for (n, row) in latex.split('\n').enumerate() {
        if n > 0 {
            lines.push("\\newline".to_string());
        }
        let mut current = String::new();
        for ch in row.chars() {
            if ch == '\\' {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                lines.push("\\backslash".to_string());
            } else {
                current.push(ch);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Inverse of [`latex_to_lines`] for the text lines of one paragraph.
pub fn lines_to_latex<S: AsRef<str>>(lines: &[S]) -> String {
    let mut latex = String::new();
    for line in lines {
        let line = line.as_ref();
        match line.trim_end() {
            "\\backslash" => latex.push('\\'),
            "\\newline" => latex.push('\n'),
            _ => latex.push_str(line),
        }
    }
    latex
}

/// An ERT inset holding `latex`, in the syntax of `format`.
pub fn put_cmd_in_ert(latex: &str, format: u32) -> Vec<String> {
    put_paragraphs_in_ert(&[latex], format)
}

/// An ERT inset with one paragraph per entry of `paragraphs`.
pub fn put_paragraphs_in_ert(paragraphs: &[&str], format: u32) -> Vec<String> {
    let status = if format < 227 { "status Collapsed" } else { "status collapsed" };
    let mut lines = vec!["\\begin_inset ERT".to_string(), status.to_string(), String::new()];
    for paragraph in paragraphs {
        if format < 225 {
            lines.push("\\layout Standard".to_string());
            lines.push(String::new());
            lines.extend(latex_to_lines(paragraph));
        } else {
            lines.push("\\begin_layout Standard".to_string());
            lines.extend(latex_to_lines(paragraph));
            lines.push("\\end_layout".to_string());
            lines.push(String::new());
        }
    }
    lines.push("\\end_inset".to_string());
    lines
}

/// End of the `\layout` paragraph opened on line `start`: the index of the
/// first line that no longer belongs to it. Insets inside the paragraph are
/// skipped whole; an unterminated one yields `None`.
pub fn find_paragraph_end<S: AsRef<str>>(lines: &[S], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < lines.len() {
        let line = lines[i].as_ref();
        if line.starts_with("\\begin_inset") {
            i = find_end_of_inset(lines, i)? + 1;
            continue;
        }
        if PARAGRAPH_BREAKS.iter().any(|token| line.starts_with(token)) {
            return Some(i);
        }
        i += 1;
    }
    Some(lines.len())
}

/// Split a line holding several backslash tokens (`\line_top \pagebreak_top`)
/// into one string per token.
pub fn split_tokens(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.trim().chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == ' ' && chars.peek() == Some(&'\\') && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
            continue;
        }
        current.push(ch);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Escape a value for a `name "value"` parameter line.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

/// Inverse of [`quote`]; unquoted input is returned as is.
pub fn unquote(value: &str) -> String {
    let value = value.trim();
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    inner.replace("\\\"", "\"")
}

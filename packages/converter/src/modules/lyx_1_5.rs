//! Formats 246 to 276 (LyX 1.5): Unicode files, font selection in the
//! header, command insets with named parameters, caption insets and
//! listings.

use crate::document::{Backend, Document};
use crate::markup::{latex_to_lines, lines_to_latex, put_cmd_in_ert, put_paragraphs_in_ert};
use crate::step::{step, ConverterModule, Step};
use lyx2lyx_common::encoding::{is_encodable, lookup_encoding, resolve_encoding};
use lyx2lyx_common::ConvertResult;
use lyx2lyx_parser::{
    find_end_of_inset, find_end_of_layout, find_re, find_token, find_token_backwards,
    find_token_exact, find_tokens_exact, get_containing_inset, get_option, get_quoted_value,
    get_value, get_value_string, remove_option, strip_quotes,
};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static LATEX_COMMAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\\begin_inset\s+LatexCommand\s+").unwrap());
static ACCENT_INSET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)\\i\s+(.*)$").unwrap());
static ACCENT_CONTENTS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^\s{]+)(.*)$").unwrap());
static ACCENTED_CHAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\{?([^{}]*)\}?\s*$").unwrap());
static LSTINPUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\\begin_inset\s+Include\s+\\lstinputlisting\{([^}]*)\}(?:\[(.*)\])?").unwrap()
});

// Fonts

/// Font scheme and the (roman, sans, typewriter) families it selects.
const FONT_SCHEMES: &[(&str, [&str; 3])] = &[
    ("default", ["default", "default", "default"]),
    ("ae", ["ae", "default", "default"]),
    ("times", ["times", "default", "default"]),
    ("palatino", ["palatino", "default", "default"]),
    ("helvet", ["default", "helvet", "default"]),
    ("avant", ["default", "avant", "default"]),
    ("newcent", ["newcent", "default", "default"]),
    ("bookman", ["bookman", "default", "default"]),
    ("pslatex", ["times", "helvet", "courier"]),
];

fn convert_font_settings(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token_exact(&document.header, "\\fontscheme", ..) else {
        document.warning("Malformed LyX document: Missing '\\fontscheme'.");
        return Ok(());
    };
    let mut scheme = get_value(&document.header, "\\fontscheme", i..=i);
    if scheme.is_empty() {
        document.warning("Malformed LyX document: Empty '\\fontscheme'.");
        scheme = "default".to_string();
    }
    let fonts = match FONT_SCHEMES.iter().find(|(name, _)| *name == scheme) {
        Some((_, fonts)) => *fonts,
        None => {
            document.warning(format!(
                "Malformed LyX document: Unknown '\\fontscheme' '{}'.",
                scheme
            ));
            FONT_SCHEMES[0].1
        }
    };
    document.header.splice(
        i..=i,
        [
            format!("\\font_roman {}", fonts[0]),
            format!("\\font_sans {}", fonts[1]),
            format!("\\font_typewriter {}", fonts[2]),
            "\\font_default_family default".to_string(),
            "\\font_sc false".to_string(),
            "\\font_osf false".to_string(),
            "\\font_sf_scale 100".to_string(),
            "\\font_tt_scale 100".to_string(),
        ],
    );
    Ok(())
}

/// Remove the header line declaring `name` and return its value.
fn take_header_value(header: &mut Vec<String>, name: &str) -> Option<String> {
    let i = find_token_exact(header, name, ..)?;
    let value = get_value(header, name, i..=i);
    header.remove(i);
    Some(value)
}

/// Families without a font scheme are loaded from the preamble.
fn revert_font_settings(document: &mut Document) -> ConvertResult<()> {
    let insert_at = find_token_exact(&document.header, "\\font_roman", ..);
    let mut fonts = ["default".to_string(), "default".to_string(), "default".to_string()];
    for (slot, name) in ["\\font_roman", "\\font_sans", "\\font_typewriter"].iter().enumerate() {
        match take_header_value(&mut document.header, name) {
            Some(value) => fonts[slot] = value,
            None => document.warning(format!("Malformed LyX document: Missing '{}'.", name)),
        }
    }
    let header = &mut document.header;
    let family =
        take_header_value(header, "\\font_default_family").unwrap_or_else(|| "default".into());
    let small_caps = take_header_value(header, "\\font_sc").unwrap_or_else(|| "false".into());
    let mut old_style = take_header_value(header, "\\font_osf").unwrap_or_else(|| "false".into());
    let sf_scale = take_header_value(header, "\\font_sf_scale").unwrap_or_else(|| "100".into());
    let tt_scale = take_header_value(header, "\\font_tt_scale").unwrap_or_else(|| "100".into());
    if small_caps != "false" {
        document.warning("Conversion of '\\font_sc' not yet implemented.");
    }
    if sf_scale != "100" {
        document.warning("Conversion of '\\font_sf_scale' not yet implemented.");
    }
    if tt_scale != "100" {
        document.warning("Conversion of '\\font_tt_scale' not yet implemented.");
    }

    let scheme = FONT_SCHEMES
        .iter()
        .find(|(_, families)| families.iter().zip(&fonts).all(|(a, b)| *a == b.as_str()))
        .map(|(name, _)| *name);
    let insert_at = insert_at.unwrap_or(document.header.len()).min(document.header.len());
    document.header.insert(insert_at, format!("\\fontscheme {}", scheme.unwrap_or("default")));

    let mut preamble = Vec::new();
    if scheme.is_none() {
        let [roman, sans, typewriter] = &fonts;
        match roman.as_str() {
            "cmr" => {
                preamble.push("\\renewcommand{\\rmdefault}{cmr}".to_string());
                if old_style == "true" {
                    preamble.push("\\usepackage{eco}".to_string());
                    old_style = "false".to_string();
                }
            }
            "lmodern" | "charter" | "utopia" | "beraserif" | "ccfonts" | "chancery" => {
                preamble.push(format!("\\usepackage{{{}}}", roman));
            }
            _ => {}
        }
        match sans.as_str() {
            "cmss" | "lmss" | "cmbr" => {
                preamble.push(format!("\\renewcommand{{\\sfdefault}}{{{}}}", sans))
            }
            "berasans" => preamble.push(format!("\\usepackage{{{}}}", sans)),
            _ => {}
        }
        match typewriter.as_str() {
            "cmtt" | "lmtt" | "cmtl" => {
                preamble.push(format!("\\renewcommand{{\\ttdefault}}{{{}}}", typewriter))
            }
            "courier" | "beramono" | "luximono" => {
                preamble.push(format!("\\usepackage{{{}}}", typewriter))
            }
            _ => {}
        }
    }
    if family != "default" {
        preamble.push(format!("\\renewcommand{{\\familydefault}}{{\\{}}}", family));
    }
    if old_style == "true" {
        document.warning("Ignoring '\\font_osf = true'");
    }
    document.preamble.extend(preamble);
    Ok(())
}

fn revert_booktabs(document: &mut Document) -> ConvertResult<()> {
    const ROW_SPACES: &[&str] = &["topspace", "bottomspace", "interlinespace"];
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset Tabular", i..) {
        i = k + 1;
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after a table")?;
            continue;
        };
        let mut booktabs = false;
        let mut row_space = false;
        for line in &mut document.body[k..end] {
            if line.starts_with("<features") && get_option(line, "booktabs") == Some("true") {
                *line = remove_option(line, "booktabs");
                booktabs = true;
            }
            if line.starts_with("<row") {
                let stripped = ROW_SPACES
                    .iter()
                    .fold(line.clone(), |l, option| remove_option(&l, option));
                if stripped != *line {
                    *line = stripped;
                    row_space = true;
                }
            }
        }
        if booktabs {
            document.warning("Converting 'booktabs' table style to default.");
        }
        if row_space {
            document.warning("Removing extra row space.");
        }
    }
    Ok(())
}

// Encodings and languages

fn convert_utf8(document: &mut Document) -> ConvertResult<()> {
    document.encoding = "utf8".to_string();
    Ok(())
}

/// Replace an `\inputencoding` listed in `names` by `replacement`; a missing
/// declaration is added as `auto`.
fn reset_inputencoding(document: &mut Document, names: &[&str], replacement: &str) {
    match find_token_exact(&document.header, "\\inputencoding", ..) {
        None => document.header.push("\\inputencoding auto".to_string()),
        Some(i) => {
            let value = get_value(&document.header, "\\inputencoding", i..=i);
            if names.contains(&value.as_str()) {
                document.header[i] = format!("\\inputencoding {}", replacement);
            }
        }
    }
    document.inputencoding = get_value(&document.header, "\\inputencoding", ..);
}

/// Files go back to the 8-bit encoding implied by language and
/// `\inputencoding`.
fn revert_utf8(document: &mut Document) -> ConvertResult<()> {
    reset_inputencoding(document, &["utf8"], "auto");
    let cjk = document.config().cjk_encoding.clone();
    document.encoding =
        resolve_encoding(&document.language, &document.inputencoding, 248, cjk.as_deref());
    Ok(())
}

fn revert_encodings(document: &mut Document) -> ConvertResult<()> {
    reset_inputencoding(
        document,
        &[
            "8859-6", "8859-8", "cp437", "cp437de", "cp850", "cp852", "cp855", "cp858", "cp862",
            "cp865", "cp866", "cp1250", "cp1252", "cp1256", "cp1257", "latin10", "pt254",
            "tis620-0",
        ],
        "auto",
    );
    Ok(())
}

fn revert_ascii(document: &mut Document) -> ConvertResult<()> {
    reset_inputencoding(document, &["ascii"], "auto");
    Ok(())
}

fn revert_utf8plain(document: &mut Document) -> ConvertResult<()> {
    reset_inputencoding(document, &["utf8-plain"], "utf8");
    Ok(())
}

/// Rename the document language and every `\lang` switch to it.
fn rename_language(document: &mut Document, from: &str, to: &str) {
    if document.language == from {
        document.language = to.to_string();
        if let Some(i) = find_token_exact(&document.header, "\\language", ..) {
            document.header[i] = format!("\\language {}", to);
        }
    }
    let old = format!("\\lang {}", from);
    for line in document.body.iter_mut() {
        if line.trim_end() == old {
            *line = format!("\\lang {}", to);
        }
    }
}

fn normalize_language_name(document: &mut Document) -> ConvertResult<()> {
    rename_language(document, "brazil", "brazilian");
    rename_language(document, "portuges", "portuguese");
    Ok(())
}

fn revert_language_name(document: &mut Document) -> ConvertResult<()> {
    rename_language(document, "brazilian", "brazil");
    rename_language(document, "portuguese", "portuges");
    Ok(())
}

fn revert_armenian(document: &mut Document) -> ConvertResult<()> {
    if document.inputencoding == "armscii8" {
        reset_inputencoding(document, &["armscii8"], "auto");
    }
    if document.language == "armenian" {
        document.preamble.insert(0, "\\usepackage{armtex}".to_string());
        rename_language(document, "armenian", "english");
    }
    Ok(())
}

const CJK_LANGUAGES: &[&str] = &["chinese-simplified", "chinese-traditional", "japanese", "korean"];

fn revert_cjk(document: &mut Document) -> ConvertResult<()> {
    reset_inputencoding(
        document,
        &["Bg5", "Bg5+", "GB", "GBt", "GBK", "JIS", "KS", "SJIS", "UTF8", "EUC-TW", "EUC-JP"],
        "default",
    );
    if CJK_LANGUAGES.contains(&document.language.as_str()) {
        let language = document.language.clone();
        rename_language(document, &language, "english");
    }
    Ok(())
}

fn convert_arabic(document: &mut Document) -> ConvertResult<()> {
    rename_language(document, "arabic", "arabic_arabtex");
    Ok(())
}

fn revert_arabic(document: &mut Document) -> ConvertResult<()> {
    rename_language(document, "arabic_arabtex", "arabic");
    Ok(())
}

// Header settings

fn convert_esint(document: &mut Document) -> ConvertResult<()> {
    let Some(i) = find_token(&document.header, "\\cite_engine", ..) else {
        document.warning("Malformed LyX document: Missing '\\cite_engine'.");
        return Ok(());
    };
    // 0 is off, 1 is auto, 2 is on.
    document.header.insert(i, "\\use_esint 0".to_string());
    Ok(())
}

fn revert_esint(document: &mut Document) -> ConvertResult<()> {
    let Some(value) = take_header_value(&mut document.header, "\\use_esint") else {
        document.warning("Malformed LyX document: Missing '\\use_esint'.");
        return Ok(());
    };
    if value == "2" {
        document.preamble.push("\\usepackage{esint}".to_string());
    }
    Ok(())
}

/// Changes are only output when they are tracked.
fn convert_changes(document: &mut Document) -> ConvertResult<()> {
    let header = &document.header;
    let (Some(_), Some(j)) = (
        find_token(header, "\\tracking_changes", ..),
        find_token(header, "\\output_changes", ..),
    ) else {
        document.warning("Malformed LyX document: Missing change tracking settings.");
        return Ok(());
    };
    if get_value(header, "\\tracking_changes", ..) == "false"
        && get_value(header, "\\output_changes", j..=j) == "true"
    {
        document.header[j] = "\\output_changes false".to_string();
    }
    Ok(())
}

fn convert_cv_textclass(document: &mut Document) -> ConvertResult<()> {
    if document.textclass == "cv" {
        document.set_textclass("simplecv");
    }
    Ok(())
}

fn revert_cv_textclass(document: &mut Document) -> ConvertResult<()> {
    if document.textclass == "simplecv" {
        document.set_textclass("cv");
    }
    Ok(())
}

const EXT_FONT_SIZES: &[&str] = &["10pt", "11pt", "12pt"];

fn uses_ext_class(document: &Document) -> bool {
    document.backend == Backend::Latex && document.textclass.starts_with("ext")
}

/// The `ext*` classes take their font size from `\paperfontsize` instead of
/// the class options.
fn convert_ext_font_sizes(document: &mut Document) -> ConvertResult<()> {
    if !uses_ext_class(document)
        || get_value(&document.header, "\\paperfontsize", ..) != "default"
    {
        return Ok(());
    }
    let Some(i) = find_token_exact(&document.header, "\\options", ..) else {
        return Ok(());
    };
    let line = get_value_string(&document.header, "\\options", i..=i);
    let mut options: Vec<&str> = line.split(',').collect();
    let Some(n) = options.iter().position(|o| EXT_FONT_SIZES.contains(o)) else {
        return Ok(());
    };
    let size = options.remove(n).trim_end_matches("pt").to_string();
    if let Some(k) = find_token_exact(&document.header, "\\paperfontsize", ..) {
        document.header[k] = format!("\\paperfontsize {}", size);
    }
    if options.is_empty() {
        document.header.remove(i);
    } else {
        document.header[i] = format!("\\options {}", options.join(","));
    }
    Ok(())
}

fn revert_ext_font_sizes(document: &mut Document) -> ConvertResult<()> {
    if !uses_ext_class(document) {
        return Ok(());
    }
    let size = format!("{}pt", get_value(&document.header, "\\paperfontsize", ..));
    if !EXT_FONT_SIZES.contains(&size.as_str()) {
        return Ok(());
    }
    if let Some(k) = find_token_exact(&document.header, "\\paperfontsize", ..) {
        document.header[k] = "\\paperfontsize default".to_string();
    }
    match find_token_exact(&document.header, "\\options", ..) {
        Some(i) => {
            let line = format!("{},{}", document.header[i], size);
            document.header[i] = line;
        }
        None => {
            let at = find_token_exact(&document.header, "\\textclass", ..).map_or(0, |t| t + 1);
            document.header.insert(at, format!("\\options {}", size));
        }
    }
    Ok(())
}

// Command insets

/// Parts of a `\name[option1][option2]{argument}` command.
#[derive(Debug, Default, PartialEq)]
struct Command {
    name: String,
    option1: String,
    option2: String,
    argument: String,
}

/// Split a LaTeX command the way LyX 1.4 read command insets: brackets and
/// braces may nest inside options and argument.
fn scan_command(text: &str) -> Command {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Space,
        Name,
        Option,
        SecondOption,
        Content,
    }

    let mut command = Command::default();
    let mut state = State::Space;
    let mut depth = 0usize;
    let mut previous = '\0';
    for c in text.chars() {
        if state == State::Name && matches!(c, ' ' | '[' | '{') {
            state = State::Space;
        }
        match (state, c) {
            (State::Option | State::SecondOption, ']') | (State::Content, '}') => {
                if depth == 0 {
                    state = State::Space;
                } else {
                    depth -= 1;
                }
            }
            (State::Option | State::SecondOption, '[') | (State::Content, '{') => depth += 1,
            _ => {}
        }
        match state {
            State::Name => command.name.push(c),
            State::Option => command.option1.push(c),
            State::SecondOption => command.option2.push(c),
            State::Content => command.argument.push(c),
            State::Space => match c {
                '\\' => state = State::Name,
                '[' if previous != ']' => {
                    state = State::Option;
                    depth = 0;
                }
                '[' => {
                    state = State::SecondOption;
                    depth = 0;
                }
                '{' => {
                    state = State::Content;
                    depth = 0;
                }
                _ => {}
            },
        }
        previous = c;
    }
    command
}

fn is_citation(name: &str) -> bool {
    matches!(
        name.trim_end_matches('*'),
        "cite"
            | "citet"
            | "citep"
            | "citealt"
            | "citealp"
            | "citeauthor"
            | "citeyear"
            | "citeyearpar"
            | "Citet"
            | "Citep"
            | "Citealt"
            | "Citealp"
            | "Citeauthor"
            | "citefield"
            | "citetitle"
            | "fullcite"
            | "footcite"
            | "footcitet"
            | "footcitep"
            | "footcitealt"
            | "footcitealp"
            | "footciteauthor"
            | "footciteyear"
            | "footciteyearpar"
    )
}

/// Parameter names of a command's first option, second option and argument;
/// an empty name means the command has no such part.
fn command_params(name: &str) -> Option<[&'static str; 3]> {
    let params = match name {
        "bibitem" => ["label", "", "key"],
        "bibtex" => ["options", "btprint", "bibfiles"],
        "index" | "printindex" | "label" => ["", "", "name"],
        "eqref" | "pageref" | "prettyref" | "ref" | "vpageref" | "vref" => {
            ["name", "", "reference"]
        }
        "tableofcontents" => ["", "", "type"],
        "htmlurl" | "url" => ["name", "", "target"],
        "hfill" => ["", "", ""],
        _ if is_citation(name) => ["after", "before", "key"],
        _ => return None,
    };
    Some(params)
}

fn escape_param(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn unescape_param(value: &str) -> String {
    strip_quotes(value.trim()).replace("\\\"", "\"").replace("\\\\", "\\")
}

/// `name value` lines of a parameterised inset, plus the lines that are
/// neither parameters nor blank.
fn read_params(lines: &[String]) -> (Vec<(String, String)>, Vec<String>) {
    let mut params = Vec::new();
    let mut unknown = Vec::new();
    for line in lines {
        match line.trim().split_once(char::is_whitespace) {
            Some((name, value)) => params.push((name.to_string(), value.trim().to_string())),
            None if line.trim().is_empty() => {}
            None => unknown.push(line.clone()),
        }
    }
    (params, unknown)
}

fn param_value(params: &[(String, String)], name: &str) -> String {
    params
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| unescape_param(v))
        .unwrap_or_default()
}

/// `\begin_inset LatexCommand \cite[p. 3]{key}` becomes a `cite` inset with
/// one named parameter per line.
fn convert_commandparams(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_re(&document.body, &LATEX_COMMAND_RE, i..) {
        i = k + 1;
        let head = LATEX_COMMAND_RE.replace(&document.body[k], "").trim().to_string();
        if head.is_empty() {
            document.warning("Malformed LyX document: Missing LatexCommand name.");
            continue;
        }
        if !head.starts_with('\\') {
            continue;
        }
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after a command inset")?;
            continue;
        };
        let text: String = std::iter::once(head.as_str())
            .chain(document.body[k + 1..end].iter().map(String::as_str))
            .collect();
        let command = scan_command(&text);
        let Some(names) = command_params(&command.name) else {
            document.warning(format!("Unknown command inset '{}' left unchanged.", command.name));
            continue;
        };

        let mut lines = vec![format!("\\begin_inset LatexCommand {}", command.name)];
        let values = [&command.option1, &command.option2, &command.argument];
        for (param, value) in names.iter().zip(values) {
            if value.is_empty() {
                continue;
            }
            if param.is_empty() {
                document.warning(format!(
                    "Ignoring invalid option '{}' of command '{}'.",
                    value, command.name
                ));
            } else {
                lines.push(format!("{} {}", param, escape_param(value)));
            }
        }
        lines.push(String::new());
        document.body.splice(k..end, lines);
    }
    Ok(())
}

/// Bibliography items are command insets too.
fn convert_bibitem(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\bibitem", i..) {
        let line = &document.body[k];
        let label = line.find('[').map(|open| {
            let close = line.rfind(']').unwrap_or(line.len());
            line[open + 1..close.max(open + 1)].to_string()
        });
        let open = line.rfind('{').map_or(line.len(), |n| n + 1);
        let close = line.rfind('}').unwrap_or(line.len()).max(open);
        let key = line[open..close].to_string();

        let mut lines = vec!["\\begin_inset LatexCommand bibitem".to_string()];
        if let Some(label) = label {
            lines.push(format!("label {}", escape_param(&label)));
        }
        lines.push(format!("key {}", escape_param(&key)));
        lines.push(String::new());
        lines.push("\\end_inset".to_string());
        i = k + lines.len();
        document.body.splice(k..=k, lines);
    }
    Ok(())
}

fn revert_commandparams(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset LatexCommand", i..) {
        i = k + 1;
        let Some(name) = document.body[k].split_whitespace().nth(2).map(str::to_string) else {
            continue;
        };
        if name.starts_with('\\') {
            continue;
        }
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after a command inset")?;
            continue;
        };
        let Some(names) = command_params(&name) else {
            document.warning(format!("Unknown command inset '{}' left unchanged.", name));
            continue;
        };
        let (params, mut unknown) = read_params(&document.body[k + 1..end]);
        let mut values = [String::new(), String::new(), String::new()];
        let mut preview = None;
        for (param, value) in &params {
            if param == "preview" {
                preview = Some(format!("{} {}", param, value));
                continue;
            }
            match names.iter().position(|n| !n.is_empty() && *n == param.as_str()) {
                Some(slot) => values[slot] = unescape_param(value),
                None => unknown.push(format!("{} {}", param, value)),
            }
        }
        for line in unknown {
            document.warning(format!(
                "Ignoring unknown contents '{}' in command inset {}.",
                line, name
            ));
        }

        let [option1, option2, argument] = values;
        let options = match (option1.is_empty(), option2.is_empty()) {
            (true, true) => String::new(),
            (false, true) => format!("[{}]", option1),
            (true, false) => format!("[][{}]", option2),
            (false, false) => format!("[{}][{}]", option1, option2),
        };
        let lines = if name == "bibitem" {
            vec![format!("\\bibitem {}{{{}}}", options, argument)]
        } else {
            let mut lines = vec![format!(
                "\\begin_inset LatexCommand \\{}{}{{{}}}",
                name, options, argument
            )];
            lines.extend(preview);
            lines.push(String::new());
            lines.push("\\end_inset".to_string());
            lines
        };
        document.body.splice(k..=end, lines);
    }
    Ok(())
}

const NOMENCLATURE_PREAMBLE: &[&str] = &["\\usepackage{nomencl}[2005/09/22]", "\\makenomenclature"];

/// Replace every `LatexCommand name` inset by the raw LaTeX `render`
/// builds from its parameters. True when any inset was found.
fn command_insets_to_ert<F>(document: &mut Document, name: &str, render: F) -> ConvertResult<bool>
where
    F: Fn(&[(String, String)]) -> String,
{
    let token = format!("\\begin_inset LatexCommand {}", name);
    let mut found = false;
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, &token, i..) {
        i = k + 1;
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed(format!("missing \\end_inset after a {} inset", name))?;
            continue;
        };
        let (params, unknown) = read_params(&document.body[k + 1..end]);
        for line in unknown {
            document.warning(format!("Ignoring unknown contents '{}' in {} inset.", line, name));
        }
        let ert = put_cmd_in_ert(&render(&params), 252);
        i = k + ert.len();
        document.body.splice(k..=end, ert);
        found = true;
    }
    Ok(found)
}

fn revert_nomenclature(document: &mut Document) -> ConvertResult<()> {
    let found = command_insets_to_ert(document, "nomenclature", |params| {
        let symbol = param_value(params, "symbol");
        let description = param_value(params, "description");
        match param_value(params, "prefix").as_str() {
            "" => format!("\\nomenclature{{{}}}{{{}}}", symbol, description),
            prefix => format!("\\nomenclature[{}]{{{}}}{{{}}}", prefix, symbol, description),
        }
    })?;
    if found {
        document.add_to_preamble(NOMENCLATURE_PREAMBLE);
    }
    Ok(())
}

fn revert_printnomenclature(document: &mut Document) -> ConvertResult<()> {
    let found = command_insets_to_ert(document, "printnomenclature", |params| {
        match param_value(params, "labelwidth").as_str() {
            "" => "\\printnomenclature{}".to_string(),
            width => format!("\\printnomenclature[{}]", width),
        }
    })?;
    if found {
        document.add_to_preamble(NOMENCLATURE_PREAMBLE);
    }
    Ok(())
}

// Body

fn revert_page_command(document: &mut Document, token: &str) {
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, token, i..) {
        let ert = put_cmd_in_ert(token, 254);
        i = k + ert.len();
        document.body.splice(k..=k, ert);
    }
}

fn revert_clearpage(document: &mut Document) -> ConvertResult<()> {
    revert_page_command(document, "\\clearpage");
    Ok(())
}

fn revert_cleardoublepage(document: &mut Document) -> ConvertResult<()> {
    revert_page_command(document, "\\cleardoublepage");
    Ok(())
}

/// Caption paragraphs become caption insets inside a standard paragraph.
fn convert_caption(document: &mut Document) -> ConvertResult<()> {
    let default_layout = document.default_layout();
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_layout Caption", i..) {
        i = k + 1;
        let Some(end) = find_end_of_layout(&document.body, k) else {
            document.malformed("missing \\end_layout after a caption")?;
            continue;
        };
        document.body.splice(
            end..end,
            ["\\end_layout", "", "\\end_inset", "", ""].map(String::from),
        );
        document.body.splice(
            k..=k,
            [
                format!("\\begin_layout {}", default_layout),
                "\\begin_inset Caption".to_string(),
                String::new(),
                format!("\\begin_layout {}", default_layout),
            ],
        );
    }
    Ok(())
}

/// Caption insets become caption paragraphs. Text around the inset stays in
/// paragraphs of the surrounding layout.
fn revert_caption(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_inset Caption", i..) {
        i = k + 1;
        let body = &document.body;
        let spans = find_token_backwards(body, "\\begin_layout", k).and_then(|before| {
            let inner = find_token(body, "\\begin_layout", k..)?;
            let end = find_end_of_inset(body, k)?;
            let after = find_token(body, "\\end_layout", end..)?;
            Some((before, inner, end, after))
        });
        let Some((before, inner, end, after)) = spans else {
            document.malformed("caption inset outside a paragraph")?;
            continue;
        };
        let body = &mut document.body;
        let layout_line = body[before].clone();

        if body[end + 1..after].iter().all(|line| line.is_empty()) {
            body.drain(end + 1..=after);
        } else {
            body.splice(end + 1..end + 1, [layout_line, String::new()]);
        }
        body.remove(end);
        if body[end - 1].is_empty() {
            body.remove(end - 1);
        }
        body.remove(inner);
        if body.get(inner).is_some_and(|line| line.is_empty()) {
            body.remove(inner);
        }

        let mut k = k;
        if body[before + 1..k].iter().all(|line| line.is_empty()) {
            body.drain(before..k);
            k = before;
        } else {
            body.splice(k..k, ["\\end_layout".to_string(), String::new()]);
            k += 2;
        }
        body[k] = "\\begin_layout Caption".to_string();
        if body.get(k + 1).is_some_and(|line| line.is_empty()) {
            body.remove(k + 1);
        }
        i = k + 1;
    }
    Ok(())
}

const FONT_SIZES: &[&str] = &[
    "tiny", "scriptsize", "footnotesize", "small", "normalsize", "large", "Large", "LARGE",
    "huge", "Huge",
];

/// Line thickness now follows the font size; drop the size switch LyX wrote
/// two lines before a `\lyxline`.
fn convert_lyxline(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\lyxline", i..) {
        i = k + 1;
        let sized = k >= 2
            && document.body[k - 2]
                .strip_prefix("\\size ")
                .is_some_and(|size| FONT_SIZES.contains(&size.trim()));
        if sized {
            document.body.remove(k - 2);
            i = k;
        }
    }
    Ok(())
}

fn convert_tableborder(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        if !line.contains("leftline=\"true\"") {
            continue;
        }
        if let Some(k) = line.find("|>{") {
            line.remove(k);
        }
    }
    Ok(())
}

fn revert_framed(document: &mut Document) -> ConvertResult<()> {
    for line in document.body.iter_mut() {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() == 3
            && words[..2] == ["\\begin_inset", "Note"]
            && matches!(words[2], "Framed" | "Shaded")
        {
            *line = "\\begin_inset Note Note".to_string();
        }
    }
    Ok(())
}

// Accents and Unicode

/// Accent commands and the combining character they stand for.
const ACCENTS: &[(&str, char)] = &[
    ("`", '\u{300}'),
    ("'", '\u{301}'),
    ("^", '\u{302}'),
    ("~", '\u{303}'),
    ("=", '\u{304}'),
    ("u", '\u{306}'),
    (".", '\u{307}'),
    ("\"", '\u{308}'),
    ("r", '\u{30a}'),
    ("H", '\u{30b}'),
    ("v", '\u{30c}'),
    ("b", '\u{320}'),
    ("d", '\u{323}'),
    ("c", '\u{327}'),
    ("k", '\u{328}'),
    ("t", '\u{361}'),
];

/// Letters written as an accent command without argument.
const SPECIAL_ACCENTS: &[(&str, char)] = &[("i", 'ı'), ("j", '\u{237}'), ("l", 'ł'), ("L", 'Ł')];

fn accented(accent: &str, base: &str) -> Option<String> {
    let mut accent = accent;
    let base = match base {
        "" => {
            if let Some((_, letter)) = SPECIAL_ACCENTS.iter().find(|(a, _)| *a == accent) {
                return Some(letter.to_string());
            }
            // LyX reads a missing character as a space.
            " "
        }
        "\\i" => "ı",
        "\\j" => "\u{237}",
        other => {
            // \q is the caron of Czech and Slovak babel.
            if accent == "q" && matches!(other, "t" | "d" | "l" | "L") {
                accent = "v";
            }
            other
        }
    };
    let (_, mark) = ACCENTS.iter().find(|(a, _)| *a == accent)?;
    Some(format!("{}{}", base, mark).nfc().collect())
}

/// `\i \"{a}` accent insets become the precomposed character; accents
/// without one become raw LaTeX.
fn convert_accent(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_re(&document.body, &ACCENT_INSET_RE, i..) {
        let Some(captures) = ACCENT_INSET_RE.captures(&document.body[k]) else {
            break;
        };
        let prefix = captures[1].to_string();
        let contents = captures[2].trim().to_string();
        let converted = ACCENT_CONTENTS_RE.captures(&contents).and_then(|m| {
            let accent = m[1].strip_prefix('\\')?;
            let base = ACCENTED_CHAR_RE.captures(m[2].trim())?;
            accented(accent, &base[1])
        });
        match converted {
            Some(text) => {
                document.body[k] = format!("{}{}", prefix, text);
                i = k + 1;
            }
            None => {
                document.warning(format!("Converting unknown accent '\\i {}' to ERT.", contents));
                let mut lines = Vec::new();
                if !prefix.is_empty() {
                    lines.push(prefix);
                }
                lines.extend(put_cmd_in_ert(&contents, 259));
                i = k + lines.len();
                document.body.splice(k..=k, lines);
            }
        }
    }
    Ok(())
}

/// Accented characters the 8-bit encoding cannot hold go back to accent
/// insets.
fn revert_accent(document: &mut Document) -> ConvertResult<()> {
    let encoding = lookup_encoding(&document.encoding)?;
    let is_mark = |c: &char| ACCENTS.iter().any(|(_, mark)| mark == c);
    let mut i = 0;
    while i < document.body.len() {
        if document.body[i].starts_with("\\begin_inset Formula") {
            i += 1;
            continue;
        }
        let chars: Vec<char> = document.body[i].nfd().collect();
        let mut split = None;
        for (j, &ch) in chars.iter().enumerate() {
            if let Some((name, _)) = SPECIAL_ACCENTS.iter().find(|(_, letter)| *letter == ch) {
                if !chars.get(j + 1).is_some_and(is_mark) && !is_encodable(ch, encoding) {
                    split = Some((j, j + 1, format!("\\i \\{}{{}}", name)));
                    break;
                }
            } else if let Some((name, mark)) = ACCENTS.iter().find(|(_, mark)| *mark == ch) {
                let Some(&base) = j.checked_sub(1).and_then(|b| chars.get(b)) else {
                    continue;
                };
                let composed: String = [base, *mark].iter().collect::<String>().nfc().collect();
                if composed.chars().all(|c| is_encodable(c, encoding)) {
                    continue;
                }
                let base = match base {
                    ' ' => String::new(),
                    'ı' => "\\i".to_string(),
                    '\u{237}' => "\\j".to_string(),
                    other => other.to_string(),
                };
                split = Some((j - 1, j + 1, format!("\\i \\{}{{{}}}", name, base)));
                break;
            }
        }
        let nfc = |chars: &[char]| -> String { chars.iter().collect::<String>().nfc().collect() };
        match split {
            Some((from, to, inset)) => {
                let tail = nfc(&chars[to..]);
                document.body[i] = format!("{}{}", nfc(&chars[..from]), inset);
                if !tail.is_empty() {
                    document.body.insert(i + 1, tail);
                }
            }
            None => document.body[i] = nfc(&chars),
        }
        i += 1;
    }
    Ok(())
}

/// LaTeX for characters an 8-bit encoding may lack.
const UNICODE_COMMANDS: &[(char, &str)] = &[
    ('\u{2013}', "\\textendash{}"),
    ('\u{2014}', "\\textemdash{}"),
    ('\u{2018}', "\\textquoteleft{}"),
    ('\u{2019}', "\\textquoteright{}"),
    ('\u{201c}', "\\textquotedblleft{}"),
    ('\u{201d}', "\\textquotedblright{}"),
    ('\u{2020}', "\\dag{}"),
    ('\u{2021}', "\\ddag{}"),
    ('\u{2022}', "\\textbullet{}"),
    ('\u{2026}', "\\ldots{}"),
    ('\u{20ac}', "\\texteuro{}"),
    ('\u{2122}', "\\texttrademark{}"),
    ('\u{2190}', "\\ensuremath{\\leftarrow}"),
    ('\u{2192}', "\\ensuremath{\\rightarrow}"),
    ('\u{221e}', "\\ensuremath{\\infty}"),
    ('\u{2264}', "\\ensuremath{\\leq}"),
    ('\u{2265}', "\\ensuremath{\\geq}"),
    ('\u{00a0}', "~"),
];

/// Characters the target encoding cannot hold are written as LaTeX: inline
/// in formulas, as escaped text inside ERT and as a new ERT inset elsewhere.
/// Characters without a known command are left for the writer to report.
fn revert_unicode(document: &mut Document) -> ConvertResult<()> {
    let encoding = lookup_encoding(&document.encoding)?;
    let mut i = 0;
    while i < document.body.len() {
        let line = &document.body[i];
        let found = line.char_indices().find_map(|(pos, ch)| {
            if is_encodable(ch, encoding) {
                return None;
            }
            UNICODE_COMMANDS
                .iter()
                .find(|(c, _)| *c == ch)
                .map(|(_, command)| (pos, ch.len_utf8(), *command))
        });
        let Some((pos, len, command)) = found else {
            i += 1;
            continue;
        };
        let head = line[..pos].to_string();
        let tail = line[pos + len..].to_string();

        let context = get_containing_inset(&document.body, i).map(|block| block.name);
        if context.as_deref() == Some("Formula") {
            document.body[i] = format!("{}{}{}", head, command, tail);
            continue;
        }
        let mut lines = Vec::new();
        if !head.is_empty() {
            lines.push(head);
        }
        if context.as_deref() == Some("ERT") {
            lines.extend(latex_to_lines(command));
        } else {
            lines.extend(put_cmd_in_ert(command, 248));
        }
        let next = i + lines.len();
        if !tail.is_empty() {
            lines.push(tail);
        }
        document.body.splice(i..=i, lines);
        i = next;
    }
    Ok(())
}

// Insets new in 1.5

/// Listings insets become `lstlisting` environments or `\lstinline` in ERT.
fn revert_listings_inset(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token_exact(&document.body, "\\begin_inset listings", i..) {
        i = k + 1;
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after a listing")?;
            continue;
        };
        let body = &document.body;
        let first_layout = find_token(body, "\\begin_layout", k + 1..end).unwrap_or(end);
        let params = &body[k + 1..first_layout];
        let inline = get_value(params, "inline", ..) == "true";
        let mut options = Vec::new();
        let lstparams = get_quoted_value(params, "lstparams", ..);
        if !lstparams.is_empty() {
            options.push(lstparams);
        }
        let status = match get_value(params, "status", ..).as_str() {
            "" => "open".to_string(),
            status => status.to_string(),
        };

        let caption_span = find_token(body, "\\begin_inset Caption", k + 1..end)
            .and_then(|c| Some((c, find_end_of_inset(body, c)?)));
        if let Some((c, c_end)) = caption_span {
            let label_span = find_token(body, "\\begin_inset LatexCommand label", c + 1..c_end)
                .and_then(|l| Some((l, find_end_of_inset(body, l)?)));
            let (l, l_end) = label_span.unwrap_or((c_end, c_end));
            let caption: String = body[c..l]
                .iter()
                .chain(&body[l_end + 1..=c_end])
                .filter(|line| !line.starts_with('\\'))
                .map(|line| line.trim())
                .collect();
            if !caption.is_empty() {
                options.push(format!("caption={{{}}}", caption));
            }
            let label = get_quoted_value(&body[l..l_end], "name", ..);
            if !label.is_empty() {
                options.push(format!("label={{{}}}", label));
            }
        }
        let options = if options.is_empty() {
            String::new()
        } else {
            format!("[{}]", options.join(","))
        };

        let mut code = Vec::new();
        let mut p = first_layout;
        while let Some(start) = find_token(body, "\\begin_layout", p..end) {
            let Some(stop) = find_end_of_layout(body, start) else {
                break;
            };
            let holds_caption = caption_span.is_some_and(|(c, _)| c > start && c < stop);
            if !holds_caption {
                code.push(lines_to_latex(&body[start + 1..stop]));
            }
            p = stop + 1;
        }

        let mut ert = if inline {
            put_cmd_in_ert(&format!("\\lstinline{}{{{}}}", options, code.join(" ")), 268)
        } else {
            let mut paragraphs = vec![format!("\\begin{{lstlisting}}{}", options)];
            paragraphs.extend(code);
            paragraphs.push("\\end{lstlisting}".to_string());
            let paragraphs: Vec<&str> = paragraphs.iter().map(String::as_str).collect();
            put_paragraphs_in_ert(&paragraphs, 268)
        };
        ert[1] = format!("status {}", status);
        i = k + ert.len();
        document.body.splice(k..=end, ert);
        document.add_to_preamble(&["\\usepackage{listings}"]);
    }
    Ok(())
}

fn revert_include_listings(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_re(&document.body, &LSTINPUT_RE, i..) {
        i = k + 1;
        let Some(captures) = LSTINPUT_RE.captures(&document.body[k]) else {
            break;
        };
        let latex = match captures.get(2).map(|m| m.as_str()) {
            Some(options) if !options.is_empty() => {
                format!("\\lstinputlisting[{}]{{{}}}", options, &captures[1])
            }
            _ => format!("\\lstinputlisting{{{}}}", &captures[1]),
        };
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after an include inset")?;
            continue;
        };
        let ert = put_cmd_in_ert(&latex, 268);
        i = k + ert.len();
        document.body.splice(k..=end, ert);
        document.add_to_preamble(&["\\usepackage{listings}"]);
    }
    Ok(())
}

const BEAMER_CHARSTYLES: &[(&str, &str)] = &[("Alert", "alert"), ("Structure", "structure")];

fn revert_beamer_charstyles(document: &mut Document) -> ConvertResult<()> {
    if document.textclass != "beamer" {
        return Ok(());
    }
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset CharStyle", i..) {
        i = k + 1;
        let style = document.body[k].split_whitespace().nth(2).unwrap_or("");
        let Some(&(_, command)) = BEAMER_CHARSTYLES.iter().find(|(name, _)| *name == style) else {
            continue;
        };
        let span = find_end_of_inset(&document.body, k).and_then(|end| {
            let p = find_token(&document.body, "\\begin_layout", k..end)?;
            Some((end, p, find_end_of_layout(&document.body, p)?))
        });
        let Some((end, p, p_end)) = span else {
            document.malformed("unterminated character style")?;
            continue;
        };
        let mut lines = put_cmd_in_ert(&format!("\\{}{{", command), 269);
        lines.extend(document.body[p + 1..p_end].iter().cloned());
        lines.extend(put_cmd_in_ert("}", 269));
        i = k + lines.len();
        document.body.splice(k..=end, lines);
    }
    Ok(())
}

const SIZE_PARAMS: &[&str] = &["width", "height", "scale"];

/// Rotated and scaled graphics keep scaling first.
fn convert_graphics_rotation(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset Graphics", i..) {
        i = k + 1;
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after a graphics inset")?;
            continue;
        };
        let body = &document.body;
        if find_token_exact(body, "rotateAngle", k + 1..end).is_some()
            && find_tokens_exact(body, SIZE_PARAMS, k + 1..end).is_some()
        {
            document.body.insert(end, "\tscaleBeforeRotation".to_string());
        }
    }
    Ok(())
}

/// Without `scaleBeforeRotation` the rotation has to be passed as a
/// `special` option.
fn revert_graphics_rotation(document: &mut Document) -> ConvertResult<()> {
    let mut i = 0;
    while let Some(k) = find_token(&document.body, "\\begin_inset Graphics", i..) {
        i = k + 1;
        let Some(end) = find_end_of_inset(&document.body, k) else {
            document.malformed("missing \\end_inset after a graphics inset")?;
            continue;
        };
        let body = &mut document.body;
        if let Some(s) = find_token_exact(body, "scaleBeforeRotation", k + 1..end) {
            body.remove(s);
            continue;
        }
        let angle = get_value(body, "rotateAngle", k + 1..end);
        if angle.is_empty() || find_tokens_exact(body, SIZE_PARAMS, k + 1..end).is_none() {
            continue;
        }
        match find_token_exact(body, "special", k + 1..end) {
            Some(s) => {
                let special = get_value_string(body, "special", s..=s);
                body[s] = format!("\tspecial angle={},{}", angle, special);
            }
            None => body.insert(end, format!("\tspecial angle={}", angle)),
        }
        if let Some(r) = find_token_exact(body, "rotateAngle", k + 1..end) {
            body.remove(r);
        }
    }
    Ok(())
}

pub static MODULE: ConverterModule = ConverterModule {
    name: "1_5",
    convert: &[
        Step { format: 246, rewrites: &[] },
        step!(247 => [convert_font_settings]),
        Step { format: 248, rewrites: &[] },
        step!(249 => [convert_utf8]),
        Step { format: 250, rewrites: &[] },
        Step { format: 251, rewrites: &[] },
        step!(252 => [convert_commandparams, convert_bibitem]),
        Step { format: 253, rewrites: &[] },
        step!(254 => [convert_esint]),
        Step { format: 255, rewrites: &[] },
        Step { format: 256, rewrites: &[] },
        step!(257 => [convert_caption]),
        step!(258 => [convert_lyxline]),
        step!(259 => [convert_accent]),
        Step { format: 260, rewrites: &[] },
        step!(261 => [convert_changes]),
        Step { format: 262, rewrites: &[] },
        step!(263 => [normalize_language_name]),
        step!(264 => [convert_cv_textclass]),
        step!(265 => [convert_tableborder]),
        Step { format: 266, rewrites: &[] },
        Step { format: 267, rewrites: &[] },
        Step { format: 268, rewrites: &[] },
        Step { format: 269, rewrites: &[] },
        Step { format: 270, rewrites: &[] },
        step!(271 => [convert_ext_font_sizes]),
        Step { format: 272, rewrites: &[] },
        Step { format: 273, rewrites: &[] },
        Step { format: 274, rewrites: &[] },
        step!(275 => [convert_graphics_rotation]),
        step!(276 => [convert_arabic]),
    ],
    revert: &[
        step!(275 => [revert_arabic]),
        step!(274 => [revert_graphics_rotation]),
        Step { format: 273, rewrites: &[] },
        Step { format: 272, rewrites: &[] },
        Step { format: 271, rewrites: &[] },
        step!(270 => [revert_ext_font_sizes]),
        step!(269 => [revert_beamer_charstyles]),
        step!(268 => [revert_listings_inset, revert_include_listings]),
        step!(267 => [revert_cjk]),
        step!(266 => [revert_utf8plain]),
        step!(265 => [revert_armenian]),
        Step { format: 264, rewrites: &[] },
        step!(263 => [revert_cv_textclass]),
        step!(262 => [revert_language_name]),
        step!(261 => [revert_ascii]),
        Step { format: 260, rewrites: &[] },
        Step { format: 259, rewrites: &[] },
        Step { format: 258, rewrites: &[] },
        Step { format: 257, rewrites: &[] },
        step!(256 => [revert_caption]),
        step!(255 => [revert_encodings]),
        step!(254 => [revert_clearpage, revert_cleardoublepage]),
        step!(253 => [revert_esint]),
        step!(252 => [revert_nomenclature, revert_printnomenclature]),
        step!(251 => [revert_commandparams]),
        Step { format: 250, rewrites: &[] },
        Step { format: 249, rewrites: &[] },
        step!(248 => [revert_utf8, revert_accent, revert_unicode]),
        step!(247 => [revert_booktabs]),
        step!(246 => [revert_font_settings]),
        step!(245 => [revert_framed]),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    fn body(lines: &[&str], format: u32) -> Document {
        Document::from_lines(Vec::<String>::new(), lines.iter().copied(), format)
    }

    fn ert(latex: &[&str]) -> Vec<String> {
        let mut lines =
            vec!["\\begin_inset ERT", "status collapsed", "", "\\begin_layout Standard"];
        lines.extend_from_slice(latex);
        lines.extend_from_slice(&["\\end_layout", "", "\\end_inset"]);
        lines.into_iter().map(String::from).collect()
    }

    #[test]
    fn test_font_scheme_round_trip() {
        let header = ["\\textclass article", "\\fontscheme pslatex", "\\graphics default"];
        let mut doc = Document::from_lines(header, Vec::<String>::new(), 246);
        convert_font_settings(&mut doc).unwrap();
        assert_eq!(
            doc.header,
            vec![
                "\\textclass article",
                "\\font_roman times",
                "\\font_sans helvet",
                "\\font_typewriter courier",
                "\\font_default_family default",
                "\\font_sc false",
                "\\font_osf false",
                "\\font_sf_scale 100",
                "\\font_tt_scale 100",
                "\\graphics default",
            ]
        );
        revert_font_settings(&mut doc).unwrap();
        assert_eq!(doc.header, header);
        assert!(doc.preamble.is_empty());
    }

    #[test]
    fn test_fonts_without_scheme_go_to_preamble() {
        let mut doc = Document::from_lines(
            [
                "\\font_roman lmodern",
                "\\font_sans default",
                "\\font_typewriter default",
                "\\font_default_family sfdefault",
                "\\font_sc false",
                "\\font_osf false",
                "\\font_sf_scale 100",
                "\\font_tt_scale 100",
            ],
            Vec::<String>::new(),
            247,
        );
        revert_font_settings(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\fontscheme default"]);
        assert_eq!(
            doc.preamble,
            vec!["\\usepackage{lmodern}", "\\renewcommand{\\familydefault}{\\sfdefault}"]
        );
    }

    #[test]
    fn test_unknown_font_scheme_warns() {
        let mut doc = Document::from_lines(["\\fontscheme fancy"], Vec::<String>::new(), 246);
        convert_font_settings(&mut doc).unwrap();
        assert_eq!(doc.header[0], "\\font_roman default");
        assert_eq!(doc.warnings().len(), 1);
    }

    #[test]
    fn test_revert_booktabs() {
        let mut doc = body(
            &[
                "\\begin_inset Tabular",
                "<features booktabs=\"true\" islongtable=\"false\">",
                "<row topspace=\"2mm\">",
                "</row>",
                "\\end_inset",
            ],
            247,
        );
        revert_booktabs(&mut doc).unwrap();
        assert_eq!(doc.body[1], "<features islongtable=\"false\">");
        assert_eq!(doc.body[2], "<row>");
        assert_eq!(doc.warnings().len(), 2);
    }

    #[test]
    fn test_scan_command() {
        assert_eq!(
            scan_command("\\cite[a[b]c][see]{knuth}"),
            Command {
                name: "cite".to_string(),
                option1: "a[b]c".to_string(),
                option2: "see".to_string(),
                argument: "knuth".to_string(),
            }
        );
        let command = scan_command("\\ref{sec:{x}}");
        assert_eq!(command.name, "ref");
        assert_eq!(command.argument, "sec:{x}");
    }

    #[test]
    fn test_commandparams_round_trip() {
        let original = ["\\begin_inset LatexCommand \\cite[p. 3]{knuth}", "", "\\end_inset"];
        let mut doc = body(&original, 251);
        convert_commandparams(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\begin_inset LatexCommand cite",
                "after \"p. 3\"",
                "key \"knuth\"",
                "",
                "\\end_inset",
            ]
        );
        revert_commandparams(&mut doc).unwrap();
        assert_eq!(doc.body, original);
    }

    #[test]
    fn test_command_params_are_escaped() {
        let mut doc = body(&[
            "\\begin_inset LatexCommand \\url[a \"b\"]{http://x}",
            "",
            "\\end_inset",
        ], 251);
        convert_commandparams(&mut doc).unwrap();
        assert_eq!(doc.body[1], "name \"a \\\"b\\\"\"");
        assert_eq!(unescape_param(&doc.body[1]["name ".len()..]), "a \"b\"");
    }

    #[test]
    fn test_unknown_command_is_kept() {
        let mut doc = body(&["\\begin_inset LatexCommand \\frobnicate{x}", "", "\\end_inset"], 251);
        convert_commandparams(&mut doc).unwrap();
        assert_eq!(doc.body[0], "\\begin_inset LatexCommand \\frobnicate{x}");
        assert_eq!(doc.warnings().len(), 1);
    }

    #[test]
    fn test_bibitem_round_trip() {
        let original = ["\\bibitem [Knu84]{knuth}", "Knuth, The TeXbook"];
        let mut doc = body(&original, 251);
        convert_bibitem(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\begin_inset LatexCommand bibitem",
                "label \"Knu84\"",
                "key \"knuth\"",
                "",
                "\\end_inset",
                "Knuth, The TeXbook",
            ]
        );
        revert_commandparams(&mut doc).unwrap();
        assert_eq!(doc.body, original);
    }

    #[test]
    fn test_revert_nomenclature() {
        let mut doc = body(
            &[
                "\\begin_inset LatexCommand nomenclature",
                "symbol \"$c$\"",
                "description \"speed of light\"",
                "",
                "\\end_inset",
            ],
            252,
        );
        revert_nomenclature(&mut doc).unwrap();
        assert_eq!(doc.body, ert(&["\\backslash", "nomenclature{$c$}{speed of light}"]));
        assert_eq!(doc.preamble, vec!["\\usepackage{nomencl}[2005/09/22]", "\\makenomenclature"]);
    }

    #[test]
    fn test_esint_setting() {
        let mut doc = Document::from_lines(["\\cite_engine basic"], Vec::<String>::new(), 253);
        convert_esint(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\use_esint 0", "\\cite_engine basic"]);

        let mut doc = Document::from_lines([
            "\\use_esint 2",
            "\\cite_engine basic",
        ], Vec::<String>::new(), 254);
        revert_esint(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\cite_engine basic"]);
        assert_eq!(doc.preamble, vec!["\\usepackage{esint}"]);
    }

    #[test]
    fn test_revert_clearpage() {
        let mut doc = body(&["\\clearpage", "text"], 254);
        revert_clearpage(&mut doc).unwrap();
        let mut expected = ert(&["\\backslash", "clearpage"]);
        expected.push("text".to_string());
        assert_eq!(doc.body, expected);
    }

    #[test]
    fn test_caption_round_trip() {
        let original = ["\\begin_layout Caption", "A figure", "\\end_layout"];
        let mut doc = body(&original, 256);
        convert_caption(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\begin_layout Standard",
                "\\begin_inset Caption",
                "",
                "\\begin_layout Standard",
                "A figure",
                "\\end_layout",
                "",
                "\\end_inset",
                "",
                "",
                "\\end_layout",
            ]
        );
        revert_caption(&mut doc).unwrap();
        assert_eq!(doc.body, original);
    }

    #[test]
    fn test_caption_inset_inside_text_splits_paragraph() {
        let mut doc = body(
            &[
                "\\begin_layout Standard",
                "before",
                "\\begin_inset Caption",
                "",
                "\\begin_layout Standard",
                "A figure",
                "\\end_layout",
                "",
                "\\end_inset",
                "after",
                "\\end_layout",
            ],
            257,
        );
        revert_caption(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\begin_layout Standard",
                "before",
                "\\end_layout",
                "",
                "\\begin_layout Caption",
                "A figure",
                "\\end_layout",
                "\\begin_layout Standard",
                "",
                "after",
                "\\end_layout",
            ]
        );
    }

    #[test]
    fn test_convert_lyxline() {
        let mut doc = body(&["\\size large", "", "\\lyxline", "text"], 257);
        convert_lyxline(&mut doc).unwrap();
        assert_eq!(doc.body, vec!["", "\\lyxline", "text"]);
    }

    #[test]
    fn test_convert_accent() {
        let mut doc = body(&["\\i \\\"{a}", "Caf\\i \\'{e}", "\\i \\q{t}", "\\i \\l{}"], 258);
        convert_accent(&mut doc).unwrap();
        assert_eq!(doc.body, vec!["ä", "Café", "\u{165}", "ł"]);
        assert!(doc.warnings().is_empty());
    }

    #[test]
    fn test_unknown_accent_becomes_ert() {
        let mut doc = body(&["\\i \\foo{x}"], 258);
        convert_accent(&mut doc).unwrap();
        assert_eq!(doc.body, ert(&["\\backslash", "foo{x}"]));
        assert_eq!(doc.warnings().len(), 1);
    }

    fn utf8_document(lines: &[&str]) -> Document {
        let header = ["\\language english", "\\inputencoding utf8"];
        Document::from_lines(header, lines.iter().copied(), 249)
    }

    #[test]
    fn test_revert_utf8_picks_language_encoding() {
        let mut doc = utf8_document(&[]);
        assert_eq!(doc.encoding, "utf8");
        revert_utf8(&mut doc).unwrap();
        assert_eq!(doc.header[1], "\\inputencoding auto");
        assert_eq!(doc.encoding, "latin1");
    }

    #[test]
    fn test_revert_accent_outside_encoding() {
        let mut doc = utf8_document(&["Erdős", "Gödel"]);
        revert_utf8(&mut doc).unwrap();
        revert_accent(&mut doc).unwrap();
        assert_eq!(doc.body, vec!["Erd\\i \\H{o}", "s", "Gödel"]);
    }

    #[test]
    fn test_revert_unicode() {
        let mut doc = utf8_document(&[
            "a\u{2192}b",
            "\\begin_inset Formula $a\u{2264}b$",
            "\\end_inset",
        ]);
        revert_utf8(&mut doc).unwrap();
        revert_unicode(&mut doc).unwrap();
        let mut expected = vec!["a".to_string()];
        expected.extend(ert(&["\\backslash", "ensuremath{", "\\backslash", "rightarrow}"]));
        expected.push("b".to_string());
        expected.push("\\begin_inset Formula $a\\ensuremath{\\leq}b$".to_string());
        expected.push("\\end_inset".to_string());
        assert_eq!(doc.body, expected);
    }

    #[test]
    fn test_language_renames() {
        let mut doc = Document::from_lines(["\\language brazil"], ["\\lang portuges", "x"], 262);
        normalize_language_name(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\language brazilian"]);
        assert_eq!(doc.body[0], "\\lang portuguese");
        assert_eq!(doc.language, "brazilian");

        let mut doc = Document::from_lines(["\\language arabic"], ["\\lang arabic"], 275);
        convert_arabic(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\language arabic_arabtex"]);
        assert_eq!(doc.body, vec!["\\lang arabic_arabtex"]);
        revert_arabic(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\language arabic"]);
        assert_eq!(doc.language, "arabic");
    }

    #[test]
    fn test_revert_cjk() {
        let mut doc = Document::from_lines(
            ["\\language japanese", "\\inputencoding JIS"],
            Vec::<String>::new(),
            267,
        );
        revert_cjk(&mut doc).unwrap();
        assert_eq!(doc.header, vec!["\\language english", "\\inputencoding default"]);
    }

    #[test]
    fn test_ext_font_sizes() {
        let header = [
            "\\textclass extarticle",
            "\\options 11pt,a4paper",
            "\\paperfontsize default",
        ];
        let mut doc = Document::from_lines(header, Vec::<String>::new(), 270);
        convert_ext_font_sizes(&mut doc).unwrap();
        assert_eq!(doc.header, vec![
            "\\textclass extarticle",
            "\\options a4paper",
            "\\paperfontsize 11",
        ]);
        revert_ext_font_sizes(&mut doc).unwrap();
        assert_eq!(
            doc.header,
            vec!["\\textclass extarticle", "\\options a4paper,11pt", "\\paperfontsize default"]
        );
    }

    #[test]
    fn test_plain_article_keeps_size_option() {
        let header = ["\\textclass article", "\\options 11pt", "\\paperfontsize default"];
        let mut doc = Document::from_lines(header, Vec::<String>::new(), 270);
        convert_ext_font_sizes(&mut doc).unwrap();
        assert_eq!(doc.header, header);
    }

    #[test]
    fn test_graphics_rotation() {
        let original = [
            "\\begin_inset Graphics",
            "\tfilename a.eps",
            "\tscale 50",
            "\trotateAngle 90",
            "\\end_inset",
        ];
        let mut doc = body(&original, 274);
        convert_graphics_rotation(&mut doc).unwrap();
        assert_eq!(doc.body[4], "\tscaleBeforeRotation");
        revert_graphics_rotation(&mut doc).unwrap();
        assert_eq!(doc.body, original);

        let mut doc = body(&original, 275);
        revert_graphics_rotation(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\begin_inset Graphics",
                "\tfilename a.eps",
                "\tscale 50",
                "\tspecial angle=90",
                "\\end_inset",
            ]
        );
    }

    #[test]
    fn test_revert_listing() {
        let mut doc = body(
            &[
                "\\begin_inset listings",
                "lstparams \"language=C\"",
                "inline false",
                "status open",
                "",
                "\\begin_layout Standard",
                "int x;",
                "\\end_layout",
                "",
                "\\end_inset",
            ],
            268,
        );
        revert_listings_inset(&mut doc).unwrap();
        assert_eq!(
            doc.body,
            vec![
                "\\begin_inset ERT",
                "status open",
                "",
                "\\begin_layout Standard",
                "\\backslash",
                "begin{lstlisting}[language=C]",
                "\\end_layout",
                "",
                "\\begin_layout Standard",
                "int x;",
                "\\end_layout",
                "",
                "\\begin_layout Standard",
                "\\backslash",
                "end{lstlisting}",
                "\\end_layout",
                "",
                "\\end_inset",
            ]
        );
        assert_eq!(doc.preamble, vec!["\\usepackage{listings}"]);
    }

    #[test]
    fn test_revert_inline_listing() {
        let mut doc = body(
            &[
                "\\begin_inset listings",
                "inline true",
                "status collapsed",
                "",
                "\\begin_layout Standard",
                "x++",
                "\\end_layout",
                "",
                "\\end_inset",
            ],
            268,
        );
        revert_listings_inset(&mut doc).unwrap();
        assert_eq!(doc.body, ert(&["\\backslash", "lstinline{x++}"]));
    }

    #[test]
    fn test_beamer_charstyle() {
        let mut doc = Document::from_lines(
            ["\\textclass beamer"],
            [
                "\\begin_inset CharStyle Alert",
                "status inlined",
                "",
                "\\begin_layout Standard",
                "look",
                "\\end_layout",
                "",
                "\\end_inset",
            ],
            269,
        );
        revert_beamer_charstyles(&mut doc).unwrap();
        let mut expected = ert(&["\\backslash", "alert{"]);
        expected.push("look".to_string());
        expected.extend(ert(&["}"]));
        assert_eq!(doc.body, expected);
    }

    #[test]
    fn test_revert_framed() {
        let mut doc = body(&["\\begin_inset Note Shaded", "\\begin_inset Note Comment"], 246);
        revert_framed(&mut doc).unwrap();
        assert_eq!(doc.body, vec!["\\begin_inset Note Note", "\\begin_inset Note Comment"]);
    }
}

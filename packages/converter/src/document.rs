//! # LyX Document
//!
//! A LyX file held as three flat line lists: the header (one declaration per
//! line), the LaTeX preamble and the body. Rewrite steps edit those lists in
//! place; nothing here ever builds a tree out of the body.
//!
//! ## Lifecycle
//!
//! ```rust,ignore
//! use lyx2lyx_common::{Input, Output, RunConfig};
//! use lyx2lyx_converter::Document;
//!
//! let mut document = Document::new(RunConfig::default().to_format(245))?
//!     .with_input(Input::from_arg(Some("old.lyx")))
//!     .with_output(Output::from_arg(Some("new.lyx")));
//! document.read()?;
//! document.convert()?;
//! document.write()?;
//! ```
//!
//! ## Error Handling
//!
//! Problems inside a rewrite either abort the run (the default) or, with
//! `try_hard` set, are logged and skipped: the document is restored to the
//! state before the failing rewrite and the run ends with status 2. Problems
//! that make the whole run meaningless (unknown formats, a missing revert,
//! undecodable text) always abort.
//!
//! ## Byte Identity
//!
//! The version comment and the `\lyxformat` line are only rewritten when the
//! format actually changed, so converting a canonical file to its own format
//! gives the input back unchanged.

use crate::registry::registry;
use crate::step::{Direction, Step};
use lyx2lyx_common::encoding::{decode_line, encode_text, lookup_encoding, resolve_encoding};
use lyx2lyx_common::{ConvertError, ConvertResult, Input, Output, RunConfig};
use lyx2lyx_parser::{
    find_token, find_token_exact, format_designation, get_value, read_format, read_version,
};
use std::fmt;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// First tokens that open the body of a file.
const BODY_START: &[&str] = &["\\layout", "\\begin_layout", "\\begin_body", "\\begin_deeper"];

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Export family of a text class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Latex,
    Linuxdoc,
    Docbook,
}

impl Backend {
    pub fn for_textclass(textclass: &str) -> Self {
        if textclass == "linuxdoc" || textclass == "manpage" {
            Backend::Linuxdoc
        } else if textclass.starts_with("docbook") || textclass.contains("-docbook") {
            Backend::Docbook
        } else {
            Backend::Latex
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Latex => write!(f, "latex"),
            Backend::Linuxdoc => write!(f, "linuxdoc"),
            Backend::Docbook => write!(f, "docbook"),
        }
    }
}

/// Document state a failed rewrite is rolled back to.
struct Snapshot {
    header: Vec<String>,
    preamble: Vec<String>,
    body: Vec<String>,
    textclass: String,
    language: String,
    inputencoding: String,
    encoding: String,
}

#[derive(Debug)]
pub struct Document {
    pub header: Vec<String>,
    pub preamble: Vec<String>,
    pub body: Vec<String>,
    pub textclass: String,
    pub backend: Backend,
    pub language: String,
    pub inputencoding: String,
    /// Encoding the file is read and written with.
    pub encoding: String,
    pub modules: Vec<String>,

    format: u32,
    start_format: u32,
    end_format: u32,
    initial_version: Option<String>,
    final_version: String,
    version_requested: bool,
    status: i32,
    config: RunConfig,
    input: Input,
    output: Output,
    warnings: Vec<String>,
}

impl Document {
    /// Resolve the target of a run.
    ///
    /// With only a target release, the newest format of that release is the
    /// target. A release that never wrote an explicitly requested format is
    /// dropped with a warning.
    pub fn new(config: RunConfig) -> ConvertResult<Self> {
        let registry = registry()?;
        let mut notes = Vec::new();
        let mut final_version = config.final_version.clone().filter(|v| !v.is_empty());

        let end_format = match config.end_format {
            Some(format) => {
                if !registry.supports(format) {
                    return Err(ConvertError::UnsupportedFormat(format));
                }
                if let Some(version) = final_version.as_deref() {
                    if !registry.version_has_format(version, format) {
                        notes.push(format!(
                            "Version {} never wrote format {}; ignoring the requested version",
                            version, format
                        ));
                        final_version = None;
                    }
                }
                format
            }
            None => match final_version.as_deref() {
                Some(version) => match registry.format_of_version(version) {
                    Some(format) => format,
                    None => {
                        notes.push(format!(
                            "Unknown version {}; converting to the newest format",
                            version
                        ));
                        final_version = None;
                        registry.latest_format()
                    }
                },
                None => registry.latest_format(),
            },
        };

        let version_requested = final_version.is_some();
        let final_version = final_version
            .or_else(|| registry.default_version(end_format).map(str::to_string))
            .unwrap_or_default();

        let mut document = Self {
            header: Vec::new(),
            preamble: Vec::new(),
            body: Vec::new(),
            textclass: "article".to_string(),
            backend: Backend::Latex,
            language: "english".to_string(),
            inputencoding: "auto".to_string(),
            encoding: "latin1".to_string(),
            modules: Vec::new(),
            format: 0,
            start_format: 0,
            end_format,
            initial_version: None,
            final_version,
            version_requested,
            status: 0,
            config,
            input: Input::default(),
            output: Output::default(),
            warnings: Vec::new(),
        };
        for note in notes {
            document.warning(note);
        }
        Ok(document)
    }

    /// Parse a complete file held in memory.
    pub fn from_text(text: &str, config: RunConfig) -> ConvertResult<Self> {
        let mut document = Self::new(config)?;
        document.read_from(text.as_bytes())?;
        Ok(document)
    }

    /// A document assembled from already split lines, targeting its own format.
    pub fn from_lines<H, B>(header: H, body: B, format: u32) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        let header: Vec<String> = header.into_iter().map(Into::into).collect();
        let body: Vec<String> = body.into_iter().map(Into::into).collect();
        let textclass = non_empty(get_value(&header, "\\textclass", ..), "article");
        let language = non_empty(get_value(&header, "\\language", ..), "english");
        let inputencoding = non_empty(get_value(&header, "\\inputencoding", ..), "auto");
        let encoding = resolve_encoding(&language, &inputencoding, format, None);
        Self {
            header,
            preamble: Vec::new(),
            body,
            backend: Backend::for_textclass(&textclass),
            textclass,
            language,
            inputencoding,
            encoding,
            modules: Vec::new(),
            format,
            start_format: format,
            end_format: format,
            initial_version: None,
            final_version: String::new(),
            version_requested: false,
            status: 0,
            config: RunConfig::default(),
            input: Input::default(),
            output: Output::default(),
            warnings: Vec::new(),
        }
    }

    pub fn with_input(mut self, input: Input) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn format(&self) -> u32 {
        self.format
    }

    pub fn start_format(&self) -> u32 {
        self.start_format
    }

    pub fn end_format(&self) -> u32 {
        self.end_format
    }

    pub fn initial_version(&self) -> Option<&str> {
        self.initial_version.as_deref()
    }

    pub fn final_version(&self) -> &str {
        &self.final_version
    }

    /// 0 after a clean run, 2 once anything was skipped or patched up.
    pub fn status(&self) -> i32 {
        self.status
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Directory of the input file; `None` when reading standard input.
    pub fn dir(&self) -> Option<&Path> {
        self.input.path().and_then(Path::parent)
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn default_layout(&self) -> &'static str {
        "Standard"
    }

    /// Record a diagnostic for the user.
    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// Report a structural problem in the document.
    ///
    /// In try-hard mode this only warns and marks the run as degraded, and
    /// the caller patches or skips the offending construct. Otherwise the
    /// returned error aborts the current rewrite.
    pub fn malformed(&mut self, message: impl Into<String>) -> ConvertResult<()> {
        let message = message.into();
        if self.config.try_hard {
            self.warning(format!("Malformed LyX document: {}", message));
            self.status = 2;
            Ok(())
        } else {
            Err(ConvertError::Malformed(message))
        }
    }

    /// Append LaTeX to the preamble unless its first line is already there.
    pub fn add_to_preamble(&mut self, lines: &[&str]) {
        let Some(first) = lines.first() else {
            return;
        };
        if self.preamble.iter().any(|line| line.starts_with(first)) {
            return;
        }
        self.preamble.extend(lines.iter().map(|line| line.to_string()));
    }

    /// Change the text class, keeping the header declaration in step.
    pub fn set_textclass(&mut self, textclass: &str) {
        self.textclass = textclass.to_string();
        self.backend = Backend::for_textclass(textclass);
        if let Some(i) = find_token_exact(&self.header, "\\textclass", ..) {
            self.header[i] = format!("\\textclass {}", textclass);
        }
    }

    pub fn read(&mut self) -> ConvertResult<()> {
        let reader = self.input.open()?;
        self.read_from(reader)
    }

    /// Split a file into header, preamble and body and decode it.
    pub fn read_from<R: BufRead>(&mut self, mut reader: R) -> ConvertResult<()> {
        let mut lines = Vec::new();
        let mut buffer = Vec::new();
        while reader.read_until(b'\n', &mut buffer)? > 0 {
            if buffer.last() == Some(&b'\n') {
                buffer.pop();
            }
            if buffer.last() == Some(&b'\r') {
                buffer.pop();
            }
            lines.push(std::mem::take(&mut buffer));
        }
        if let Some(first) = lines.first_mut() {
            if first.starts_with(UTF8_BOM) {
                first.drain(..UTF8_BOM.len());
            }
        }

        let sections = split_sections(lines)?;
        if sections.unterminated_preamble {
            self.warning("Missing \\end_preamble; adding it now and hoping for the best");
        }

        // Format, language and input encoding are plain ASCII, so they can be
        // read before the real encoding is known.
        let raw_header: Vec<String> = sections
            .header
            .iter()
            .map(|(_, line)| String::from_utf8_lossy(line).into_owned())
            .collect();
        let format = read_format(&raw_header)?;
        if !registry()?.supports(format) {
            return Err(ConvertError::UnsupportedFormat(format));
        }
        let language = non_empty(get_value(&raw_header, "\\language", ..), "english");
        let inputencoding = non_empty(get_value(&raw_header, "\\inputencoding", ..), "auto");
        let encoding_name = resolve_encoding(
            &language,
            &inputencoding,
            format,
            self.config.cjk_encoding.as_deref(),
        );
        let encoding = lookup_encoding(&encoding_name)?;
        let decode = |lines: Vec<(usize, Vec<u8>)>| -> ConvertResult<Vec<String>> {
            lines
                .into_iter()
                .map(|(number, line)| decode_line(&line, encoding, number))
                .collect()
        };

        self.header = decode(sections.header)?;
        self.preamble = decode(sections.preamble)?;
        self.body = decode(sections.body)?;
        self.format = format;
        self.start_format = format;
        self.language = language;
        self.inputencoding = inputencoding;
        self.encoding = encoding_name;
        self.initial_version = self
            .header
            .first()
            .filter(|line| line.starts_with('#'))
            .and_then(|line| read_version(line));

        if find_token_exact(&self.header, "\\textclass", ..).is_none() {
            self.warning("Missing \\textclass; using article");
            let at = find_token(&self.header, "\\lyxformat", ..).map_or(0, |i| i + 1);
            self.header.insert(at, "\\textclass article".to_string());
        }
        self.textclass = non_empty(get_value(&self.header, "\\textclass", ..), "article");
        self.backend = Backend::for_textclass(&self.textclass);
        self.modules = self.module_list();

        info!(
            format = self.format,
            version = self.initial_version.as_deref().unwrap_or("unknown"),
            encoding = %self.encoding,
            textclass = %self.textclass,
            lines = self.body.len(),
            "Read document"
        );
        Ok(())
    }

    /// Move the document along the format chain to the target format.
    #[instrument(skip(self), fields(from = self.format, to = self.end_format))]
    pub fn convert(&mut self) -> ConvertResult<()> {
        if self.format == self.end_format {
            if !self.version_requested {
                if let Some(version) = &self.initial_version {
                    self.final_version = version.clone();
                }
            }
            debug!("Document already has the requested format");
            return Ok(());
        }

        let chain = registry()?.chain(
            self.format,
            self.initial_version.as_deref(),
            self.end_format,
            Some(&self.final_version),
        )?;
        if chain.version_mismatch {
            let message = match &self.initial_version {
                Some(version) => format!(
                    "Version {} does not match format {}; choosing the conversion by format",
                    version, self.format
                ),
                None => format!(
                    "Version unknown and format {} is shared by several releases; assuming the oldest",
                    self.format
                ),
            };
            self.warning(message);
        }

        let direction = chain.direction;
        for relation in chain.relations {
            let module = relation.module;
            let steps = module.steps(direction);
            if steps.is_empty() {
                return Err(ConvertError::RevertNotImplemented {
                    module: module.name.to_string(),
                    format: self.format,
                });
            }
            info!(module = module.name, %direction, "Running converter module");

            let multi_step = steps.len() != 1;
            for step in steps {
                let satisfied = match direction {
                    Direction::Convert => self.format >= step.format,
                    Direction::Revert => self.format <= step.format,
                };
                if multi_step && satisfied {
                    continue;
                }
                self.run_step(step)?;
                self.format = step.format;
                if self.format == self.end_format {
                    info!(format = self.format, status = self.status, "Conversion finished");
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn run_step(&mut self, step: &Step) -> ConvertResult<()> {
        for rewrite in step.rewrites {
            debug!(format = step.format, rewrite = rewrite.name(), "Applying rewrite");
            let snapshot = self.config.try_hard.then(|| self.snapshot());
            if let Err(source) = rewrite.apply(self) {
                let fatal = source.is_fatal();
                let error = ConvertError::Step {
                    format: step.format,
                    step: rewrite.name(),
                    source: Box::new(source),
                };
                self.warning(error.to_string());
                self.status = 2;
                match snapshot {
                    Some(snapshot) if !fatal => self.restore(snapshot),
                    _ => return Err(error),
                }
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            header: self.header.clone(),
            preamble: self.preamble.clone(),
            body: self.body.clone(),
            textclass: self.textclass.clone(),
            language: self.language.clone(),
            inputencoding: self.inputencoding.clone(),
            encoding: self.encoding.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.header = snapshot.header;
        self.preamble = snapshot.preamble;
        self.body = snapshot.body;
        self.backend = Backend::for_textclass(&snapshot.textclass);
        self.textclass = snapshot.textclass;
        self.language = snapshot.language;
        self.inputencoding = snapshot.inputencoding;
        self.encoding = snapshot.encoding;
    }

    pub fn write(&mut self) -> ConvertResult<()> {
        let mut writer = self.output.open()?;
        self.write_to(&mut writer)
    }

    /// Serialize header, preamble and body in the document's encoding.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> ConvertResult<()> {
        if self.format != self.start_format || self.version_requested {
            self.set_version();
        }
        if self.format != self.start_format {
            self.set_format();
        }
        let textclass = self.textclass.clone();
        self.set_textclass(&textclass);
        let modules = self.modules.clone();
        self.set_module_list(&modules);

        let language = non_empty(get_value(&self.header, "\\language", ..), "english");
        let inputencoding = non_empty(get_value(&self.header, "\\inputencoding", ..), "auto");
        self.encoding = resolve_encoding(
            &language,
            &inputencoding,
            self.format,
            self.config.cjk_encoding.as_deref(),
        );
        let encoding = lookup_encoding(&self.encoding)?;

        let mut header = self.header.clone();
        if !self.preamble.is_empty() {
            let at = find_token_exact(&header, "\\textclass", ..).map_or(header.len(), |i| i + 1);
            let block = std::iter::once("\\begin_preamble".to_string())
                .chain(self.preamble.iter().cloned())
                .chain(std::iter::once("\\end_preamble".to_string()));
            header.splice(at..at, block);
        }

        let mut text = String::new();
        for line in &header {
            text.push_str(line);
            text.push('\n');
        }
        text.push('\n');
        for line in &self.body {
            text.push_str(line);
            text.push('\n');
        }

        let (bytes, unmappable) = encode_text(&text, encoding);
        if unmappable {
            self.warning(format!(
                "Some characters cannot be represented in {}; they were written as numeric references",
                self.encoding
            ));
            self.status = 2;
        }
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// The serialized document as text, for inspection.
    pub fn to_text(&mut self) -> ConvertResult<String> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        let encoding = lookup_encoding(&self.encoding)?;
        Ok(encoding.decode_lossy(&bytes))
    }

    fn set_version(&mut self) {
        let comment = format!(
            "#LyX {} created this file. For more info see http://www.lyx.org/",
            self.final_version
        );
        match self.header.first() {
            Some(line) if line.starts_with('#') => self.header[0] = comment,
            _ => self.header.insert(0, comment),
        }
    }

    fn set_format(&mut self) {
        let line = format!("\\lyxformat {}", format_designation(self.format));
        match find_token(&self.header, "\\lyxformat", ..) {
            Some(i) => self.header[i] = line,
            None => self.header.insert(0, line),
        }
    }

    /// Modules declared in the header's `\begin_modules` block.
    pub fn module_list(&self) -> Vec<String> {
        let Some(start) = find_token(&self.header, "\\begin_modules", ..) else {
            return Vec::new();
        };
        let end = find_token(&self.header, "\\end_modules", start..).unwrap_or(self.header.len());
        self.header[start + 1..end].to_vec()
    }

    /// Replace the header's module block, dropping it when `modules` is empty.
    pub fn set_module_list(&mut self, modules: &[String]) {
        let block = find_token(&self.header, "\\begin_modules", ..).map(|start| {
            let end = find_token(&self.header, "\\end_modules", start..);
            (start, end)
        });
        let mut lines = Vec::new();
        if !modules.is_empty() {
            lines.push("\\begin_modules".to_string());
            lines.extend(modules.iter().cloned());
            lines.push("\\end_modules".to_string());
        }
        match block {
            Some((start, Some(end))) => {
                self.header.splice(start..=end, lines);
            }
            Some((start, None)) => {
                self.header.splice(start.., lines);
            }
            None if !lines.is_empty() => {
                let at = find_token_exact(&self.header, "\\textclass", ..)
                    .map_or(self.header.len(), |i| i + 1);
                self.header.splice(at..at, lines);
            }
            None => {}
        }
    }
}

#[derive(Default)]
struct RawSections {
    header: Vec<(usize, Vec<u8>)>,
    preamble: Vec<(usize, Vec<u8>)>,
    body: Vec<(usize, Vec<u8>)>,
    unterminated_preamble: bool,
}

/// Classify raw lines, keeping their 1-based numbers for decode errors.
///
/// Header lines are trimmed and blank ones dropped; preamble and body lines
/// are kept as they are.
fn split_sections(lines: Vec<Vec<u8>>) -> ConvertResult<RawSections> {
    let mut sections = RawSections::default();
    let mut in_preamble = false;
    let mut lines = lines.into_iter().enumerate().map(|(i, line)| (i + 1, line));

    while let Some((number, line)) = lines.next() {
        let trimmed = trim_ascii(&line);
        if in_preamble {
            if trimmed.starts_with(b"\\end_preamble") {
                in_preamble = false;
                continue;
            }
            if !starts_body(trimmed) {
                sections.preamble.push((number, line));
                continue;
            }
            sections.unterminated_preamble = true;
            in_preamble = false;
        } else if trimmed.starts_with(b"\\begin_preamble") {
            in_preamble = true;
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }
        if starts_body(trimmed) {
            sections.body.push((number, line));
            sections.body.extend(lines.by_ref());
            return Ok(sections);
        }
        sections.header.push((number, trimmed.to_vec()));
    }

    Err(ConvertError::invalid_file("no body found"))
}

fn starts_body(line: &[u8]) -> bool {
    let word = line
        .split(|b| b.is_ascii_whitespace())
        .next()
        .unwrap_or_default();
    BODY_START.iter().any(|token| word == token.as_bytes())
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn non_empty(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_221: &str = "#LyX 1.3 created this file. For more info see http://www.lyx.org/\n\
\\lyxformat 221\n\
\\textclass article\n\
\\begin_preamble\n\
\\usepackage{babel}\n\
\\end_preamble\n\
\\language english\n\
\\inputencoding auto\n\
\n\
\\layout Standard\n\
\n\
café\n\
\n\
\\the_end\n";

    fn latin1(text: &str) -> Vec<u8> {
        text.chars().map(|c| c as u32 as u8).collect()
    }

    fn read(bytes: &[u8], config: RunConfig) -> ConvertResult<Document> {
        let mut document = Document::new(config)?;
        document.read_from(bytes)?;
        Ok(document)
    }

    #[test]
    fn test_read_sections() {
        let document = read(&latin1(SMALL_221), RunConfig::default()).unwrap();
        assert_eq!(document.format(), 221);
        assert_eq!(document.initial_version(), Some("1.3"));
        assert_eq!(document.preamble, vec!["\\usepackage{babel}"]);
        assert_eq!(document.header[1], "\\lyxformat 221");
        assert_eq!(document.body[0], "\\layout Standard");
        assert_eq!(document.body[2], "café");
        assert_eq!(document.encoding, "latin1");
        assert_eq!(document.backend, Backend::Latex);
    }

    #[test]
    fn test_read_crlf_and_bom() {
        let text = "\u{feff}\\lyxformat 276\r\n\\textclass article\r\n\r\n\\begin_body\r\n\\end_body\r\n\\end_document\r\n";
        let document = read(text.as_bytes(), RunConfig::default()).unwrap();
        assert_eq!(document.format(), 276);
        assert_eq!(document.initial_version(), None);
        assert_eq!(document.body, vec!["\\begin_body", "\\end_body", "\\end_document"]);
    }

    #[test]
    fn test_missing_body_is_invalid() {
        let result = read(b"\\lyxformat 221\n\\textclass article\n", RunConfig::default());
        assert!(matches!(result, Err(ConvertError::InvalidFile(_))));
    }

    #[test]
    fn test_unsupported_format() {
        let result = read(b"\\lyxformat 219\n\\layout Standard\n", RunConfig::default());
        assert!(matches!(result, Err(ConvertError::UnsupportedFormat(219))));
    }

    #[test]
    fn test_missing_textclass_is_added() {
        let document = read(b"\\lyxformat 221\n\\layout Standard\n\\the_end\n", RunConfig::default()).unwrap();
        assert_eq!(document.header, vec!["\\lyxformat 221", "\\textclass article"]);
        assert_eq!(document.warnings().len(), 1);
    }

    #[test]
    fn test_unterminated_preamble() {
        let text = "\\lyxformat 221\n\\textclass article\n\\begin_preamble\n\\usepackage{x}\n\\layout Standard\n\\the_end\n";
        let document = read(text.as_bytes(), RunConfig::default()).unwrap();
        assert_eq!(document.preamble, vec!["\\usepackage{x}"]);
        assert_eq!(document.body[0], "\\layout Standard");
        assert!(document.warnings()[0].contains("\\end_preamble"));
    }

    #[test]
    fn test_undecodable_utf8() {
        let text = b"\\lyxformat 276\n\\textclass article\n\\begin_body\ncaf\xe9\n";
        let result = read(text, RunConfig::default());
        assert!(matches!(result, Err(ConvertError::Decode { line: 4, .. })));
    }

    #[test]
    fn test_backend() {
        assert_eq!(Backend::for_textclass("manpage"), Backend::Linuxdoc);
        assert_eq!(Backend::for_textclass("docbook-book"), Backend::Docbook);
        assert_eq!(Backend::for_textclass("agu-docbook"), Backend::Docbook);
        assert_eq!(Backend::for_textclass("book"), Backend::Latex);
    }

    #[test]
    fn test_same_format_is_byte_identical() {
        let bytes = latin1(SMALL_221);
        let mut document = read(&bytes, RunConfig::default().to_format(221)).unwrap();
        document.convert().unwrap();
        assert_eq!(document.final_version(), "1.3");
        let mut out = Vec::new();
        document.write_to(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_target_version_only() {
        let document = Document::new(RunConfig::default().to_version("1.4.3")).unwrap();
        assert_eq!(document.end_format(), 245);
        assert_eq!(document.final_version(), "1.4.3");
    }

    #[test]
    fn test_incompatible_version_is_dropped() {
        let document = Document::new(RunConfig::default().to_format(221).to_version("1.5.1")).unwrap();
        assert_eq!(document.end_format(), 221);
        assert_eq!(document.final_version(), "1.3.7");
        assert_eq!(document.warnings().len(), 1);
    }

    #[test]
    fn test_unknown_target_format() {
        let result = Document::new(RunConfig::default().to_format(300));
        assert!(matches!(result, Err(ConvertError::UnsupportedFormat(300))));
    }

    #[test]
    fn test_malformed_modes() {
        let mut document = Document::from_lines(["\\lyxformat 245"], ["\\begin_body"], 245);
        assert!(matches!(document.malformed("x"), Err(ConvertError::Malformed(_))));
        assert_eq!(document.status(), 0);

        let mut document = Document::new(RunConfig::default().try_hard(true)).unwrap();
        assert!(document.malformed("x").is_ok());
        assert_eq!(document.status(), 2);
        assert_eq!(document.warnings(), ["Malformed LyX document: x"]);
    }

    #[test]
    fn test_module_list() {
        let mut document = Document::from_lines(
            ["\\lyxformat 276", "\\textclass article", "\\begin_modules", "theorems-ams", "\\end_modules"],
            ["\\begin_body"],
            276,
        );
        assert_eq!(document.module_list(), vec!["theorems-ams"]);
        document.set_module_list(&[]);
        assert_eq!(document.header, vec!["\\lyxformat 276", "\\textclass article"]);
        document.set_module_list(&["logicalmkup".to_string()]);
        assert_eq!(document.header[2], "\\begin_modules");
    }

    #[test]
    fn test_add_to_preamble_once() {
        let mut document = Document::from_lines(["\\lyxformat 245"], ["\\begin_body"], 245);
        document.add_to_preamble(&["\\usepackage{esint}"]);
        document.add_to_preamble(&["\\usepackage{esint}"]);
        assert_eq!(document.preamble, vec!["\\usepackage{esint}"]);
    }
}

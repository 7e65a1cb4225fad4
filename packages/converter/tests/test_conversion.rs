/// Whole-document conversion tests
///
/// These tests validate that:
/// - A document already at the target format comes back byte for byte
/// - The oldest format converts through every era to the newest one
/// - Structural rewrites of 1.5 reverse exactly, and 1.3 documents survive a trip through 1.4
/// - Strict runs stop on malformed input while try-hard runs finish degraded

use lyx2lyx_common::{ConvertError, RunConfig};
use lyx2lyx_converter::Document;

const LYX_15: &str = "#LyX 1.5.7 created this file. For more info see http://www.lyx.org/
\\lyxformat 276
\\begin_document
\\begin_header
\\textclass article
\\language english
\\inputencoding auto
\\font_roman default
\\font_sans default
\\font_typewriter default
\\font_default_family default
\\font_sc false
\\font_osf false
\\font_sf_scale 100
\\font_tt_scale 100
\\graphics default
\\paperfontsize default
\\use_amsmath 1
\\use_esint 0
\\cite_engine basic
\\tracking_changes false
\\output_changes false
\\end_header

\\begin_body

\\begin_layout Standard
Grüße
\\end_layout

\\end_body
\\end_document
";

const LYX_14: &str = "#LyX 1.4.5 created this file. For more info see http://www.lyx.org/
\\lyxformat 245
\\begin_document
\\begin_header
\\textclass article
\\language english
\\inputencoding auto
\\fontscheme default
\\graphics default
\\paperfontsize default
\\use_amsmath 1
\\cite_engine basic
\\tracking_changes false
\\output_changes false
\\end_header

\\begin_body

\\begin_layout Standard
Hello world
\\end_layout

\\end_body
\\end_document
";

fn convert(text: &str, config: RunConfig) -> Document {
    let mut document = Document::from_text(text, config).expect("Failed to read");
    document.convert().expect("Conversion failed");
    document
}

#[test]
fn test_same_format_is_untouched() {
    let mut document = convert(LYX_15, RunConfig::default());
    assert_eq!(document.format(), 276);
    assert!(document.warnings().is_empty());
    assert_eq!(document.to_text().unwrap(), LYX_15);
}

#[test]
fn test_oldest_format_reaches_newest() {
    let text = "\\lyxformat 2\n\\textclass article\n\n\\layout Standard\n\nHello world\n";
    let mut document = convert(text, RunConfig::default());
    assert_eq!(document.format(), 276);
    assert_eq!(document.status(), 0);

    let output = document.to_text().unwrap();
    assert!(output.starts_with("#LyX 1.5.7 created this file."));
    assert!(output.contains("\n\\lyxformat 276\n"));
    assert!(output.contains("\nHello world\n"));
    assert!(output.contains("\n\\begin_body\n"));
    assert!(output.ends_with("\\end_document\n"));
}

#[test]
fn test_latin1_text_is_written_as_utf8() {
    let text = "#LyX 1.3 created this file. For more info see http://www.lyx.org/\n\
\\lyxformat 221\n\
\\textclass article\n\
\\language english\n\
\\inputencoding auto\n\
\n\
\\layout Standard\n\
\n\
caf\u{e9}\n\
\n\
\\the_end\n";
    let bytes: Vec<u8> = text.chars().map(|c| c as u32 as u8).collect();
    let mut document = Document::new(RunConfig::default()).unwrap();
    document.read_from(&bytes[..]).unwrap();
    document.convert().unwrap();

    let mut out = Vec::new();
    document.write_to(&mut out).unwrap();
    let output = String::from_utf8(out).expect("output is UTF-8");
    assert!(output.contains("\ncafé\n"));
    assert!(output.contains("\\begin_layout Standard"));
}

#[test]
fn test_convert_then_revert_restores_document() {
    let mut document = convert(LYX_14, RunConfig::default());
    assert_eq!(document.format(), 276);
    let upgraded = document.to_text().unwrap();
    assert!(upgraded.contains("\n\\font_roman default\n"));
    assert!(upgraded.contains("\n\\use_esint 0\n"));
    assert!(!upgraded.contains("\\fontscheme"));

    let mut document = convert(&upgraded, RunConfig::default().to_format(245));
    assert_eq!(document.format(), 245);
    assert_eq!(document.to_text().unwrap(), LYX_14);
}

#[test]
fn test_revert_to_latin1_writes_accent_insets() {
    let mut document = convert(LYX_15, RunConfig::default().to_version("1.4.5"));
    assert_eq!(document.format(), 245);
    let mut out = Vec::new();
    document.write_to(&mut out).unwrap();
    // ü and ß are both latin1.
    assert!(out.windows(5).any(|w| w == b"Gr\xfc\xdfe"));
}

#[test]
fn test_version_mismatch_warns_once() {
    let text = LYX_15
        .replace("#LyX 1.5.7", "#LyX 1.3")
        .replace("\\lyxformat 276", "\\lyxformat 275");
    let document = convert(&text, RunConfig::default());
    assert_eq!(document.format(), 276);
    assert_eq!(document.warnings().len(), 1);
    assert!(document.warnings()[0].contains("Version 1.3"));
}

const BROKEN_CAPTION: &str = "\\lyxformat 256
\\textclass article
\\tracking_changes false
\\output_changes false

\\begin_body
\\begin_layout Caption
never closed
\\end_body
\\end_document
";

#[test]
fn test_malformed_document_aborts_strict_run() {
    let mut document = Document::from_text(BROKEN_CAPTION, RunConfig::default()).unwrap();
    let error = document.convert().unwrap_err();
    assert!(matches!(error, ConvertError::Step { format: 257, step: "convert_caption", .. }));
    assert_eq!(document.status(), 2);
}

#[test]
fn test_malformed_document_finishes_with_try_hard() {
    let config = RunConfig::default().try_hard(true);
    let mut document = Document::from_text(BROKEN_CAPTION, config).unwrap();
    document.convert().unwrap();
    assert_eq!(document.format(), 276);
    assert_eq!(document.status(), 2);
    assert!(document
        .warnings()
        .iter()
        .any(|w| w.starts_with("Malformed LyX document:")));
}

#[test]
fn test_missing_body_is_invalid() {
    let result = Document::from_text("\\lyxformat 276\n\\textclass article\n", RunConfig::default());
    assert!(matches!(result, Err(ConvertError::InvalidFile(_))));
}

const LYX_13: &str = "#LyX 1.3 created this file. For more info see http://www.lyx.org/
\\lyxformat 221
\\textclass article
\\language english
\\inputencoding auto
\\fontscheme default
\\graphics default
\\paperfontsize default
\\papersize Default
\\use_geometry 0
\\use_amsmath 0
\\use_natbib 0
\\use_numerical_citations 0
\\paperorientation portrait
\\secnumdepth 3
\\tocdepth 3
\\paragraph_separation indent
\\defskip medskip
\\quotes_language english
\\quotes_times 2
\\papercolumns 1
\\papersides 1
\\paperpagestyle default

\\layout Section

Introduction

\\layout Standard

Hello world

\\the_end
";

#[test]
fn test_1_3_document_survives_1_4_round_trip() {
    let mut document = convert(LYX_13, RunConfig::default().to_format(245));
    assert_eq!(document.format(), 245);
    assert_eq!(document.status(), 0);
    let upgraded = document.to_text().unwrap();
    assert!(upgraded.contains("\n\\begin_layout Standard\n"));
    assert!(upgraded.contains("\n\\cite_engine basic\n"));
    assert!(upgraded.contains("\n\\end_header\n"));
    assert!(!upgraded.contains("\\use_natbib"));

    let mut document = convert(&upgraded, RunConfig::default().to_format(221));
    assert_eq!(document.format(), 221);
    assert_eq!(document.status(), 0);
    let reverted = document.to_text().unwrap();
    assert!(reverted.starts_with("#LyX 1.3.7 created this file."));
    assert!(reverted.contains("\n\\lyxformat 221\n"));
    for line in [
        "\\use_amsmath 0",
        "\\use_natbib 0",
        "\\use_numerical_citations 0",
        "\\quotes_times 2",
        "\\layout Section",
        "Introduction",
        "\\layout Standard",
        "Hello world",
    ] {
        assert!(reverted.lines().any(|l| l == line), "missing {:?} in\n{}", line, reverted);
    }
    for token in [
        "\\begin_layout",
        "\\end_layout",
        "\\begin_body",
        "\\end_header",
        "\\cite_engine",
        "\\use_jurabib",
        "\\use_bibtopic",
        "\\tracking_changes",
        "\\output_changes",
    ] {
        assert!(!reverted.contains(token), "leftover {:?} in\n{}", token, reverted);
    }
}

const OVERSIZED_TABLE: &str = "\\lyxformat 2.16
\\textclass article

\\layout Standard
\\LyXTable
multicol4
18446744073709551615 2 0 0 -1 -1 -1 -1
1 1 0 0
";

#[test]
fn test_oversized_table_is_reported_not_fatal() {
    let config = RunConfig::default().try_hard(true).to_format(217);
    let mut document = Document::from_text(OVERSIZED_TABLE, config).unwrap();
    document.convert().unwrap();
    assert_eq!(document.format(), 217);
    assert_eq!(document.status(), 2);
    assert!(document
        .warnings()
        .iter()
        .any(|w| w.starts_with("Malformed LyX document:")));

    let mut document = Document::from_text(OVERSIZED_TABLE, RunConfig::default()).unwrap();
    assert!(document.convert().is_err());
}

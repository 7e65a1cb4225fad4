/// End-to-end tests of the `lyx2lyx` binary
///
/// These tests validate that:
/// - Documents flow from files or standard input to files or standard output
/// - The exit status separates clean, degraded and failed runs
/// - Diagnostics honour `--err` and the config file in the working directory

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

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

fn lyx2lyx(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lyx2lyx").unwrap();
    cmd.current_dir(dir.path());
    cmd
}

#[test]
fn test_same_format_passes_through_stdin() {
    let dir = tempfile::tempdir().unwrap();
    lyx2lyx(&dir)
        .args(["-t", "245"])
        .write_stdin(LYX_14)
        .assert()
        .success()
        .stdout(LYX_14);
}

#[test]
fn test_convert_file_to_newest_format() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("old.lyx"), LYX_14).unwrap();

    lyx2lyx(&dir)
        .args(["-o", "new.lyx", "old.lyx"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let output = fs::read_to_string(dir.path().join("new.lyx")).unwrap();
    assert!(output.starts_with("#LyX 1.5.7 created this file."));
    assert!(output.contains("\n\\lyxformat 276\n"));
    assert!(output.contains("\n\\font_roman default\n"));
}

#[test]
fn test_final_version_selects_format() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("old.lyx"), LYX_14).unwrap();

    lyx2lyx(&dir)
        .args(["-V", "1.5.0", "old.lyx"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\\lyxformat 276"));
}

#[test]
fn test_list_formats() {
    let dir = tempfile::tempdir().unwrap();
    lyx2lyx(&dir)
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Supported file formats:"))
        .stdout(predicate::str::contains("246-276"))
        .stdout(predicate::str::contains("1.5.7"));
}

#[test]
fn test_unsupported_target_fails() {
    let dir = tempfile::tempdir().unwrap();
    lyx2lyx(&dir)
        .args(["-t", "219"])
        .write_stdin(LYX_14)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("219"));
}

#[test]
fn test_malformed_document_fails_without_try_hard() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.lyx"), BROKEN_CAPTION).unwrap();

    lyx2lyx(&dir)
        .args(["-o", "out.lyx", "broken.lyx"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot convert broken.lyx"));
    assert!(!dir.path().join("out.lyx").exists());
}

#[test]
fn test_try_hard_finishes_degraded() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.lyx"), BROKEN_CAPTION).unwrap();

    lyx2lyx(&dir)
        .args(["-n", "broken.lyx"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\\lyxformat 276"))
        .stderr(predicate::str::contains("Malformed LyX document"));
}

#[test]
fn test_config_enables_try_hard() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lyx2lyx.config.json"), r#"{ "tryHard": true }"#).unwrap();

    lyx2lyx(&dir)
        .write_stdin(BROKEN_CAPTION)
        .assert()
        .code(2);
}

#[test]
fn test_warnings_go_to_err_file() {
    let dir = tempfile::tempdir().unwrap();
    let mismatched = LYX_14.replace("#LyX 1.4.5", "#LyX 1.3");

    lyx2lyx(&dir)
        .args(["-e", "errors.log"])
        .write_stdin(mismatched)
        .assert()
        .success()
        .stderr(predicate::str::is_empty());

    let log = fs::read_to_string(dir.path().join("errors.log")).unwrap();
    assert!(log.contains("Version 1.3"));
}

#[test]
fn test_quiet_suppresses_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let mismatched = LYX_14.replace("#LyX 1.4.5", "#LyX 1.3");

    lyx2lyx(&dir)
        .arg("-q")
        .write_stdin(mismatched)
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

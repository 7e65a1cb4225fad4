//! Format 210 as written by LyX 0.7 and 0.8.

use crate::step::{legacy_step, ConverterModule};
use lyx2lyx_common::ConvertResult;

/// Files from 0.6 stop without the end-of-document marker.
fn add_end(_header: &mut Vec<String>, body: &mut Vec<String>) -> ConvertResult<()> {
    while body.last().is_some_and(|line| line.trim().is_empty()) {
        body.pop();
    }
    if body.last().map(String::as_str) != Some("\\the_end") {
        body.push(String::new());
        body.push("\\the_end".to_string());
    }
    Ok(())
}

pub static MODULE: ConverterModule = ConverterModule {
    name: "0_08",
    convert: &[legacy_step!(210 => [add_end])],
    revert: &[],
};

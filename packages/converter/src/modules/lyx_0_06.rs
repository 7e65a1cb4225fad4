//! Format 200, written by LyX 0.6.

use crate::step::{ConverterModule, Step};

pub static MODULE: ConverterModule = ConverterModule {
    name: "0_06",
    convert: &[Step {
        format: 200,
        rewrites: &[],
    }],
    revert: &[],
};

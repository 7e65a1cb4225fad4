//! Format 215 as written by LyX 1.1.0 to 1.1.4; nothing changed on disk.

use crate::step::{ConverterModule, Step};

pub static MODULE: ConverterModule = ConverterModule {
    name: "1_1",
    convert: &[Step {
        format: 215,
        rewrites: &[],
    }],
    revert: &[],
};

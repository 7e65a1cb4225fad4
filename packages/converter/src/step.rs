//! Rewrite steps and the per-era modules that group them.
//!
//! A converter module carries two ordered step lists. In the `convert` list a
//! step tagged with format `F` takes a document from the previous format to
//! `F`; in the `revert` list a step tagged with `F` takes a document from the
//! next format down to `F`. Each step runs its rewrites in order.

use crate::document::Document;
use lyx2lyx_common::ConvertResult;
use std::fmt;

/// Rewrite over the header and body of the oldest formats.
pub type LegacyRewrite = fn(&mut Vec<String>, &mut Vec<String>) -> ConvertResult<()>;

/// Rewrite over the whole document.
pub type DocumentRewrite = fn(&mut Document) -> ConvertResult<()>;

/// One named rewrite function.
///
/// The two oldest modules predate the document object and only ever touch
/// the header and body lines; they keep that narrower calling convention.
#[derive(Clone, Copy)]
pub enum Rewrite {
    Legacy {
        name: &'static str,
        run: LegacyRewrite,
    },
    Document {
        name: &'static str,
        run: DocumentRewrite,
    },
}

impl Rewrite {
    pub fn name(&self) -> &'static str {
        match self {
            Rewrite::Legacy { name, .. } | Rewrite::Document { name, .. } => name,
        }
    }

    pub fn apply(&self, document: &mut Document) -> ConvertResult<()> {
        match self {
            Rewrite::Legacy { run, .. } => run(&mut document.header, &mut document.body),
            Rewrite::Document { run, .. } => run(document),
        }
    }
}

impl fmt::Debug for Rewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rewrite::Legacy { name, .. } => write!(f, "Legacy({})", name),
            Rewrite::Document { name, .. } => write!(f, "Document({})", name),
        }
    }
}

/// The rewrites that reach `format`.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub format: u32,
    pub rewrites: &'static [Rewrite],
}

/// All steps of one era of the file format.
#[derive(Debug)]
pub struct ConverterModule {
    pub name: &'static str,
    pub convert: &'static [Step],
    pub revert: &'static [Step],
}

impl ConverterModule {
    pub fn steps(&self, direction: Direction) -> &'static [Step] {
        match direction {
            Direction::Convert => self.convert,
            Direction::Revert => self.revert,
        }
    }
}

/// Which way a run moves along the format chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Convert,
    Revert,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Convert => write!(f, "convert"),
            Direction::Revert => write!(f, "revert"),
        }
    }
}

/// `step![format => rewrite, ...]` builds a [`Step`] of document rewrites.
macro_rules! step {
    ($format:literal => [$($rewrite:ident),* $(,)?]) => {
        $crate::step::Step {
            format: $format,
            rewrites: &[$($crate::step::Rewrite::Document {
                name: stringify!($rewrite),
                run: $rewrite,
            }),*],
        }
    };
}

/// Same as `step!` for header/body rewrites.
macro_rules! legacy_step {
    ($format:literal => [$($rewrite:ident),* $(,)?]) => {
        $crate::step::Step {
            format: $format,
            rewrites: &[$($crate::step::Rewrite::Legacy {
                name: stringify!($rewrite),
                run: $rewrite,
            }),*],
        }
    };
}

pub(crate) use legacy_step;
pub(crate) use step;

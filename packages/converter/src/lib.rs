pub mod document;
pub mod markup;
pub mod modules;
pub mod registry;
pub mod step;

pub use document::{Backend, Document};
pub use registry::{registry, Chain, FormatRelation, Registry};
pub use step::{ConverterModule, Direction, Rewrite, Step};

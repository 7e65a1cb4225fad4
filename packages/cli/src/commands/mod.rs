pub mod convert;
pub mod list;

pub use convert::{convert, ConvertArgs};
pub use list::list;

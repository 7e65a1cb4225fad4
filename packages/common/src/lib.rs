pub mod config;
pub mod encoding;
pub mod error;
pub mod io;
pub mod result;
mod tables;

pub use config::*;
pub use error::*;
pub use io::*;
pub use result::*;

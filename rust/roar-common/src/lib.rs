//! Error type, result alias and validation macros shared by the roar-* crates.

pub mod error;
pub mod result;


pub use error::{Error, ErrorKind};
pub use result::Result;

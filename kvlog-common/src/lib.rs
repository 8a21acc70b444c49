//! Core definitions (errors and common result handling), relied upon by all
//! kvlog-* crates.

pub mod error;
pub mod result;

pub use error::{Error, ErrorKind};
pub use result::Result;

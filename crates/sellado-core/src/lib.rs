#![forbid(unsafe_code)]

//! Shared vocabulary for the sellado crates: the error type, algorithm
//! URIs and namespace constants.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, ErrorKind, Result};

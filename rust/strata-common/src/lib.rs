//! Core definitions (error types, result helpers and verification macros), relied upon
//! by all strata-* crates.

pub mod error;
pub mod result;

pub use result::Result;

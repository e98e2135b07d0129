//! Test utilities for the Strata crates.
//!
//! - [`data_gen`]: deterministic Arrow batches for every supported nesting shape.
//! - [`file_builder`]: writes Strata files from Arrow batches with a configurable
//!   row group / page layout and codec.

pub mod data_gen;
pub mod file_builder;

pub use data_gen::{Shape, generate_batch, int_batch};
pub use file_builder::FileBuilder;

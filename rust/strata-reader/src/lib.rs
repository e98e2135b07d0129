//! Chunked reader of Strata files.
//!
//! A read session turns the selected rows of one or more sources into a sequence
//! of Arrow record batches under two independent limits:
//!
//! - the *input* limit caps the working memory of a pass: the stored bytes,
//!   decompressed bytes and codec scratch of every page loaded at once;
//! - the *output* limit caps the estimated decoded size of every returned chunk.
//!
//! The session is built in stages:
//!
//! 1. [`plan`]: row group, column chunk and page inventory of the selected rows.
//! 2. [`pass`]: consecutive row groups whose pages fit the input limit are fetched
//!    and decompressed together.
//! 3. [`estimate`]: decoded size of every page, from its header statistics.
//! 4. [`chunk`]: runs of whole rows of the pass that fit the output limit.
//! 5. [`decode`]: page decoding, slicing, filtering and per-source row counts.
//!
//! [`ChunkedReader`] drives the stages lazily, one chunk per `read_chunk` call.

pub mod builder;
pub mod chunk;
pub mod decode;
pub mod estimate;
pub mod filter;
pub mod limits;
pub mod pass;
pub mod plan;
pub mod reader;
pub mod source;

pub use builder::ChunkedReaderBuilder;
pub use filter::RowFilter;
pub use limits::{CodecScratchTable, ReadLimits};
pub use plan::RowSelection;
pub use reader::{ChunkedReader, ReadChunk, read_table};
pub use source::Source;

#[cfg(test)]
mod tests;

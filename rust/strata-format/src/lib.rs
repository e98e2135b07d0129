//! Strata file format definitions.
//!
//! A Strata file is a sequence of compressed pages followed by a footer that
//! describes the schema and the row-group / column-chunk / page inventory:
//!
//! ```text
//! [MAGIC] [page bytes ...] [metadata] [metadata_len: u64] [checksum: u32] [MAGIC]
//! ```
//!
//! Pages always start and end on top-level row boundaries, so a page of a
//! nested column carries every child value of the rows it covers.

pub mod checksum;
pub mod codec;
pub mod footer;
pub mod metadata;
pub mod schema;

pub use codec::Codec;
pub use metadata::{ColumnChunkMeta, FileMetadata, NodeStats, PageHeader, RowGroupMeta};
pub use schema::{NodeKind, PhysicalType, Schema, SchemaNode};

//! Row group, column chunk and page inventory stored in the file footer.

use std::ops::Range;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use strata_common::{Result, error::Error, verify_data};

use crate::{codec::Codec, schema::Schema};

/// Statistics of one schema node within a page.
///
/// `value_count` is the number of slots of this node (for a top-level node it equals
/// the page row count; for a list item it is the total number of list elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct NodeStats {
    pub value_count: u64,
    pub null_count: u64,
    /// Total length of the variable-length payload (strings and binaries), zero otherwise.
    pub payload_bytes: u64,
}

/// Describes a single page of a column chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct PageHeader {
    /// Absolute position of the stored page bytes in the file.
    pub offset: u64,
    /// Size of the stored (possibly compressed) page bytes.
    pub compressed_size: u64,
    /// Size of the page bytes after decompression.
    pub uncompressed_size: u64,
    /// First row of the page, relative to the start of its row group.
    pub first_row: u64,
    pub num_rows: u64,
    /// Checksum of the stored page bytes.
    pub checksum: u32,
    /// Per-node statistics, in schema pre-order of the column.
    pub node_stats: Vec<NodeStats>,
}

impl PageHeader {
    /// Row range of the page relative to its row group.
    pub fn row_range(&self) -> Range<u64> {
        self.first_row..self.first_row.saturating_add(self.num_rows)
    }

    /// Stored bytes of the page.
    pub fn byte_range(&self) -> Result<Range<u64>> {
        let end = self
            .offset
            .checked_add(self.compressed_size)
            .ok_or_else(|| Error::invalid_format("compressed_size"))?;
        Ok(self.offset..end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ColumnChunkMeta {
    pub codec: Codec,
    /// Total stored size of the pages. Writers that stream pages may leave this
    /// unknown, in which case readers must assume a conservative estimate.
    pub compressed_size: Option<u64>,
    pub uncompressed_size: u64,
    pub pages: Vec<PageHeader>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct RowGroupMeta {
    pub num_rows: u64,
    /// One column chunk per top-level schema column.
    pub columns: Vec<ColumnChunkMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct FileMetadata {
    pub schema: Schema,
    pub num_rows: u64,
    pub row_groups: Vec<RowGroupMeta>,
    pub created_by: String,
}

impl FileMetadata {
    /// Checks the internal consistency of the inventory: row counts add up, every row
    /// group has a chunk per column, the pages of each chunk tile its rows, and the
    /// stored bytes of each chunk's pages are ascending, disjoint and within `data`
    /// (the file region between the header magic and the metadata).
    pub fn verify(&self, data: Range<u64>) -> Result<()> {
        let total = self
            .row_groups
            .iter()
            .try_fold(0u64, |acc, rg| acc.checked_add(rg.num_rows));
        verify_data!(num_rows, total == Some(self.num_rows));

        let node_counts = self
            .schema
            .columns
            .iter()
            .map(|column| column.node_count())
            .collect::<Vec<_>>();

        for row_group in &self.row_groups {
            verify_data!(columns, row_group.columns.len() == node_counts.len());
            for (chunk, &node_count) in row_group.columns.iter().zip(node_counts.iter()) {
                let mut next_row = 0u64;
                let mut next_offset = data.start;
                for page in &chunk.pages {
                    verify_data!(first_row, page.first_row == next_row);
                    verify_data!(num_rows, page.num_rows != 0);
                    verify_data!(node_stats, page.node_stats.len() == node_count);
                    verify_data!(node_stats, page.node_stats[0].value_count == page.num_rows);
                    let row_end = next_row.checked_add(page.num_rows);
                    verify_data!(num_rows, row_end.is_some_and(|end| end <= row_group.num_rows));
                    next_row += page.num_rows;

                    verify_data!(offset, page.offset >= next_offset);
                    let bytes = page.byte_range()?;
                    verify_data!(compressed_size, bytes.end <= data.end);
                    verify_data!(compressed_size, usize::try_from(page.compressed_size).is_ok());
                    verify_data!(uncompressed_size, usize::try_from(page.uncompressed_size).is_ok());
                    next_offset = bytes.end;
                }
                verify_data!(pages, next_row == row_group.num_rows);
            }
        }
        Ok(())
    }
}

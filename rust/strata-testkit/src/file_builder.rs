//! Writes Strata files from Arrow batches.

use std::{ops::Range, path::Path, sync::Arc};

use arrow_array::{Array, RecordBatch};
use strata_encodings::{compress, encode_page};
use strata_format::{
    Codec, ColumnChunkMeta, FileMetadata, PageHeader, RowGroupMeta, Schema, checksum,
    footer::{self, MAGIC},
};

/// Builds an in-memory Strata file with a configurable physical layout.
#[derive(Debug, Clone)]
pub struct FileBuilder {
    schema: Schema,
    codec: Codec,
    rows_per_row_group: usize,
    rows_per_page: usize,
    column_rows_per_page: Vec<Option<usize>>,
    record_compressed_size: bool,
}

impl FileBuilder {
    /// Defaults: uncompressed pages, one row group, one page per column chunk.
    pub fn new(schema: Schema) -> FileBuilder {
        let column_count = schema.len();
        FileBuilder {
            schema,
            codec: Codec::Uncompressed,
            rows_per_row_group: 0,
            rows_per_page: 0,
            column_rows_per_page: vec![None; column_count],
            record_compressed_size: true,
        }
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Maximum rows per row group, `0` for a single row group.
    pub fn with_rows_per_row_group(mut self, rows: usize) -> Self {
        self.rows_per_row_group = rows;
        self
    }

    /// Maximum rows per page for every column, `0` for one page per column chunk.
    pub fn with_rows_per_page(mut self, rows: usize) -> Self {
        self.rows_per_page = rows;
        self
    }

    /// Overrides the rows per page of a single column.
    pub fn with_column_rows_per_page(mut self, column: usize, rows: usize) -> Self {
        self.column_rows_per_page[column] = Some(rows);
        self
    }

    /// When `false`, column chunks are written without their total stored size.
    pub fn with_recorded_compressed_size(mut self, record: bool) -> Self {
        self.record_compressed_size = record;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Writes all batches, in order, into a single file.
    pub fn build(&self, batches: &[RecordBatch]) -> anyhow::Result<Vec<u8>> {
        let arrow_schema = Arc::new(self.schema.to_arrow_schema());
        let batch = arrow_select::concat::concat_batches(&arrow_schema, batches)?;
        self.build_batch(&batch)
    }

    pub fn build_batch(&self, batch: &RecordBatch) -> anyhow::Result<Vec<u8>> {
        anyhow::ensure!(
            batch.num_columns() == self.schema.len(),
            "batch has {} columns, schema has {}",
            batch.num_columns(),
            self.schema.len()
        );

        let mut file = MAGIC.to_vec();
        let mut row_groups = Vec::new();
        for rows in split_range(0..batch.num_rows(), self.rows_per_row_group) {
            let mut columns = Vec::with_capacity(self.schema.len());
            for (idx, node) in self.schema.columns.iter().enumerate() {
                let array = batch.column(idx).slice(rows.start, rows.len());
                let page_rows = self.column_rows_per_page[idx].unwrap_or(self.rows_per_page);
                let mut chunk = ColumnChunkMeta {
                    codec: self.codec,
                    compressed_size: None,
                    uncompressed_size: 0,
                    pages: Vec::new(),
                };
                let mut stored = 0u64;
                for page_range in split_range(0..array.len(), page_rows) {
                    let page_array = array.slice(page_range.start, page_range.len());
                    let encoded = encode_page(node, page_array.as_ref())?;
                    let data = compress(self.codec, &encoded.data)?;
                    chunk.pages.push(PageHeader {
                        offset: file.len() as u64,
                        compressed_size: data.len() as u64,
                        uncompressed_size: encoded.data.len() as u64,
                        first_row: page_range.start as u64,
                        num_rows: page_range.len() as u64,
                        checksum: checksum::compute(&data),
                        node_stats: encoded.node_stats,
                    });
                    chunk.uncompressed_size += encoded.data.len() as u64;
                    stored += data.len() as u64;
                    file.extend_from_slice(&data);
                }
                if self.record_compressed_size {
                    chunk.compressed_size = Some(stored);
                }
                columns.push(chunk);
            }
            row_groups.push(RowGroupMeta {
                num_rows: rows.len() as u64,
                columns,
            });
        }

        let metadata = FileMetadata {
            schema: self.schema.clone(),
            num_rows: batch.num_rows() as u64,
            row_groups,
            created_by: format!("strata-testkit {}", env!("CARGO_PKG_VERSION")),
        };
        file.extend(footer::encode_footer(&metadata)?);
        Ok(file)
    }

    pub fn write_to_file(&self, batch: &RecordBatch, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, self.build_batch(batch)?)?;
        Ok(())
    }

    /// Writes the batch into a named temporary file.
    pub fn build_temp_file(&self, batch: &RecordBatch) -> anyhow::Result<tempfile::NamedTempFile> {
        let file = tempfile::NamedTempFile::new()?;
        self.write_to_file(batch, file.path())?;
        Ok(file)
    }
}

/// Splits `range` into consecutive pieces of at most `step` elements (`0` means one
/// piece). An empty range yields no pieces.
fn split_range(range: Range<usize>, step: usize) -> Vec<Range<usize>> {
    if range.is_empty() {
        return Vec::new();
    }
    let step = if step == 0 { range.len() } else { step };
    range
        .clone()
        .step_by(step)
        .map(|start| start..(start + step).min(range.end))
        .collect()
}

#[cfg(test)]
mod tests {
    use strata_format::footer::read_metadata;

    use super::*;
    use crate::data_gen::{Shape, generate_batch};

    #[test]
    fn test_split_range() {
        assert_eq!(split_range(0..10, 4), vec![0..4, 4..8, 8..10]);
        assert_eq!(split_range(0..10, 0), vec![0..10]);
        assert!(split_range(0..0, 3).is_empty());
    }

    #[test]
    fn test_layout() {
        let batch = generate_batch(Shape::List, 1000, 11).unwrap();
        let file = FileBuilder::new(Shape::List.schema())
            .with_codec(Codec::Zstd)
            .with_rows_per_row_group(300)
            .with_rows_per_page(100)
            .with_column_rows_per_page(2, 64)
            .build_batch(&batch)
            .unwrap();
        let metadata = read_metadata(&file).unwrap();
        assert_eq!(metadata.num_rows, 1000);
        assert_eq!(metadata.row_groups.len(), 4);
        assert_eq!(metadata.row_groups[3].num_rows, 100);
        assert_eq!(metadata.row_groups[0].columns[0].pages.len(), 3);
        assert_eq!(metadata.row_groups[0].columns[2].pages.len(), 5);
        assert!(metadata.row_groups[0].columns[1].compressed_size.is_some());
    }

    #[test]
    fn test_empty_file() {
        let batch = generate_batch(Shape::Flat, 0, 1).unwrap();
        let file = FileBuilder::new(Shape::Flat.schema())
            .with_recorded_compressed_size(false)
            .build_batch(&batch)
            .unwrap();
        let metadata = read_metadata(&file).unwrap();
        assert_eq!(metadata.num_rows, 0);
        assert!(metadata.row_groups.is_empty());
        assert_eq!(metadata.schema, Shape::Flat.schema());
    }
}

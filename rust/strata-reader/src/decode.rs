//! Decoding and materialization of chunks.

use std::{ops::Range, sync::Arc};

use arrow_array::{Array, ArrayRef, RecordBatch, RecordBatchOptions};
use arrow_schema::SchemaRef;
use rayon::prelude::*;
use strata_common::{Result, error::Error, result::to_usize};
use strata_encodings::PageDecoder;
use strata_format::{Schema, SchemaNode};

use crate::{
    filter::{self, RowFilter},
    pass::{Pass, PassColumn},
    reader::ReadChunk,
};

/// Turns row ranges of a pass into output chunks.
pub struct ChunkDecoder {
    schema: Schema,
    arrow_schema: SchemaRef,
    decoder: Arc<dyn PageDecoder>,
    filter: Option<Arc<dyn RowFilter>>,
    source_count: usize,
    row_count_limit: u64,
}

impl ChunkDecoder {
    pub fn new(
        schema: Schema,
        decoder: Arc<dyn PageDecoder>,
        filter: Option<Arc<dyn RowFilter>>,
        source_count: usize,
        row_count_limit: u64,
    ) -> ChunkDecoder {
        ChunkDecoder {
            arrow_schema: Arc::new(schema.to_arrow_schema()),
            schema,
            decoder,
            filter,
            source_count,
            row_count_limit,
        }
    }

    pub fn arrow_schema(&self) -> &SchemaRef {
        &self.arrow_schema
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Row counts per source of a chunk that contributed no rows. Empty when a
    /// filter is set.
    pub fn empty_ledger(&self) -> Vec<u64> {
        if self.has_filter() {
            Vec::new()
        } else {
            vec![0; self.source_count]
        }
    }

    /// A chunk without rows, carrying the output schema.
    pub fn empty_chunk(&self) -> ReadChunk {
        ReadChunk {
            batch: RecordBatch::new_empty(self.arrow_schema.clone()),
            rows_per_source: self.empty_ledger(),
        }
    }

    /// Decodes the pass rows `rows` of every projected column, builds the batch
    /// and applies the filter.
    pub fn decode(&self, pass: &Pass, rows: Range<u64>) -> Result<ReadChunk> {
        let num_rows = rows.end - rows.start;
        if num_rows > self.row_count_limit {
            return Err(Error::row_count_overflow(num_rows, self.row_count_limit));
        }

        let columns = self
            .schema
            .columns
            .par_iter()
            .zip(pass.columns.par_iter())
            .map(|(node, column)| self.decode_column(node, column, &rows))
            .collect::<Result<Vec<_>>>()?;

        let options = RecordBatchOptions::new().with_row_count(Some(to_usize(num_rows)?));
        let batch = RecordBatch::try_new_with_options(self.arrow_schema.clone(), columns, &options)
            .map_err(|e| Error::arrow("assemble chunk", e))?;

        let (batch, rows_per_source) = match &self.filter {
            Some(filter) => (filter::apply(filter.as_ref(), batch)?, Vec::new()),
            None => (batch, pass.rows_per_source(rows, self.source_count)),
        };
        Ok(ReadChunk {
            batch,
            rows_per_source,
        })
    }

    fn decode_column(
        &self,
        node: &SchemaNode,
        column: &PassColumn,
        rows: &Range<u64>,
    ) -> Result<ArrayRef> {
        let first = column.page_for_row(rows.start);
        let last = column.page_for_row(rows.end - 1);
        let pieces = column.pages[first..=last]
            .iter()
            .map(|page| -> Result<ArrayRef> {
                let array =
                    self.decoder
                        .decode_page(node, page.index, &page.data, to_usize(page.num_rows)?)?;
                let start = rows.start.max(page.rows.start);
                let end = rows.end.min(page.rows.end);
                let offset = page.skip + (start - page.rows.start);
                Ok(array.slice(to_usize(offset)?, to_usize(end - start)?))
            })
            .collect::<Result<Vec<_>>>()?;

        match pieces.as_slice() {
            [single] => Ok(single.clone()),
            _ => {
                let refs = pieces.iter().map(|array| array.as_ref()).collect::<Vec<_>>();
                arrow_select::concat::concat(&refs)
                    .map_err(|e| Error::arrow(format!("concatenate pages of '{}'", node.name), e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use arrow_array::{BooleanArray, cast::AsArray, types::Int64Type};
    use strata_encodings::PlainPageDecoder;
    use strata_io::ReadAt;
    use strata_testkit::{FileBuilder, Shape, generate_batch};

    use super::*;
    use crate::{
        chunk::RowLayout,
        limits::ReadLimits,
        pass::PassSplitter,
        plan::{RowSelection, build_plan},
        source::open_sources,
    };

    fn pass(shape: Shape, selection: RowSelection) -> (Pass, RecordBatch, Schema) {
        let batch = generate_batch(shape, 120, 11).unwrap();
        let file = FileBuilder::new(shape.schema())
            .with_rows_per_page(16)
            .with_column_rows_per_page(1, 7)
            .build_batch(&batch)
            .unwrap();
        let sources = open_sources(vec![Arc::new(file) as Arc<dyn ReadAt>]).unwrap();
        let projection = (0..shape.schema().len()).collect();
        let plan = build_plan(&sources, projection, &selection).unwrap();
        let pass = PassSplitter::new(&plan, &RowLayout::new(&plan), &ReadLimits::default())
            .next_pass(&plan, &sources)
            .unwrap()
            .unwrap();
        (pass, batch, plan.schema)
    }

    fn decoder(schema: Schema, filter: Option<Arc<dyn RowFilter>>) -> ChunkDecoder {
        ChunkDecoder::new(schema, Arc::new(PlainPageDecoder), filter, 1, u64::MAX)
    }

    #[test]
    fn test_decode_spanning_pages() {
        for shape in Shape::ALL {
            let (pass, expected, schema) = pass(shape, RowSelection::default());
            let chunk = decoder(schema, None).decode(&pass, 13..50).unwrap();
            assert_eq!(chunk.batch.num_rows(), 37);
            assert_eq!(chunk.rows_per_source, vec![37]);
            for (actual, expected) in chunk.batch.columns().iter().zip(expected.columns()) {
                assert_eq!(actual.to_data(), expected.slice(13, 37).to_data(), "{shape:?}");
            }
        }
    }

    #[test]
    fn test_decode_skipped_rows() {
        let selection = RowSelection {
            skip_rows: 20,
            num_rows: Some(30),
            row_groups: None,
        };
        let (pass, expected, schema) = pass(Shape::Strings, selection);
        let chunk = decoder(schema, None).decode(&pass, 0..30).unwrap();
        let ids = chunk.batch.column(0).as_primitive::<Int64Type>();
        assert_eq!(ids.value(0), 20);
        assert_eq!(ids.value(29), 49);
        assert_eq!(
            chunk.batch.column(1).to_data(),
            expected.column(1).slice(20, 30).to_data()
        );
    }

    #[test]
    fn test_filter_clears_ledger() {
        let (pass, _, schema) = pass(Shape::Flat, RowSelection::default());
        let odd = |batch: &RecordBatch| -> Result<BooleanArray> {
            let ids = batch.column(0).as_primitive::<Int64Type>();
            Ok(ids.iter().map(|id| id.map(|id| id % 2 == 1)).collect())
        };
        let chunk = decoder(schema, Some(Arc::new(odd))).decode(&pass, 0..10).unwrap();
        assert_eq!(chunk.batch.num_rows(), 5);
        assert!(chunk.rows_per_source.is_empty());
    }

    #[test]
    fn test_row_count_limit() {
        let (pass, _, schema) = pass(Shape::Flat, RowSelection::default());
        let decoder = ChunkDecoder::new(schema, Arc::new(PlainPageDecoder), None, 1, 50);
        assert!(decoder.decode(&pass, 0..50).is_ok());
        let err = decoder.decode(&pass, 0..51).unwrap_err();
        assert!(matches!(
            err.kind(),
            strata_common::error::ErrorKind::RowCountOverflow { rows: 51, limit: 50 }
        ));
    }

    #[test]
    fn test_empty_chunk() {
        let (_, _, schema) = pass(Shape::Struct, RowSelection::default());
        let chunk = decoder(schema.clone(), None).empty_chunk();
        assert_eq!(chunk.batch.num_rows(), 0);
        assert_eq!(chunk.batch.num_columns(), schema.len());
        assert_eq!(chunk.rows_per_source, vec![0]);
    }
}

//! The chunked reader: a lazy, pass-by-pass, chunk-by-chunk read session.

use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use strata_common::{Result, error::Error};

use crate::{
    builder::ChunkedReaderBuilder,
    chunk::{ChunkSplitter, RowLayout},
    decode::ChunkDecoder,
    pass::{Pass, PassSplitter},
    plan::ReadPlan,
    source::Source,
};

/// One output chunk of a read session.
#[derive(Debug, Clone)]
pub struct ReadChunk {
    pub batch: RecordBatch,
    /// Number of rows contributed by each source, indexed like the sources of the
    /// session.
    ///
    /// Counts are taken before filtering. When a filter is configured the ledger
    /// is not tracked and this vector is empty.
    pub rows_per_source: Vec<u64>,
}

impl ReadChunk {
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

enum State {
    /// No pass is loaded: either nothing was read yet, or the previous pass was
    /// consumed and another one remains.
    Ready,
    /// Chunks of the loaded pass remain.
    Active { pass: Pass, chunks: ChunkSplitter },
    Exhausted,
}

/// Reads the selected rows of one or more sources as a sequence of Arrow batches,
/// bounding both the estimated size of each batch and the working memory held by
/// the loaded pages.
///
/// ```text
/// while reader.has_next() {
///     let chunk = reader.read_chunk()?;
///     ...
/// }
/// ```
///
/// After `read_chunk` fails the session is over: `has_next` returns `false`.
pub struct ChunkedReader {
    sources: Vec<Source>,
    plan: ReadPlan,
    layout: Arc<RowLayout>,
    passes: PassSplitter,
    decoder: ChunkDecoder,
    output_size_limit: u64,
    state: State,
}

impl ChunkedReader {
    pub(crate) fn new(
        sources: Vec<Source>,
        plan: ReadPlan,
        layout: Arc<RowLayout>,
        passes: PassSplitter,
        decoder: ChunkDecoder,
        output_size_limit: u64,
    ) -> ChunkedReader {
        ChunkedReader {
            sources,
            plan,
            layout,
            passes,
            decoder,
            output_size_limit,
            state: State::Ready,
        }
    }

    /// Output schema (projected columns).
    pub fn schema(&self) -> &SchemaRef {
        self.decoder.arrow_schema()
    }

    pub fn plan(&self) -> &ReadPlan {
        &self.plan
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Number of selected rows, before filtering.
    pub fn num_rows(&self) -> u64 {
        self.plan.total_rows()
    }

    /// Working memory currently reserved by the loaded pass.
    pub fn reserved_memory(&self) -> u64 {
        self.passes.budget().used()
    }

    /// `true` while the loaded pass holds a row group whose footprint alone
    /// exceeds the input size limit.
    pub fn is_over_input_limit(&self) -> bool {
        self.passes.budget().is_over_committed()
    }

    /// Number of passes the selected row groups are read in.
    pub fn pass_count(&self) -> usize {
        self.passes.schedule().len()
    }

    /// `true` until the session is exhausted. Holds at least once, even when no
    /// rows are selected.
    pub fn has_next(&self) -> bool {
        !matches!(self.state, State::Exhausted)
    }

    /// Returns the next chunk.
    ///
    /// Once exhausted, returns an empty batch with the output schema and an empty
    /// ledger.
    pub fn read_chunk(&mut self) -> Result<ReadChunk> {
        // Any failure below leaves the session exhausted.
        let (pass, mut chunks) = match std::mem::replace(&mut self.state, State::Exhausted) {
            State::Exhausted => return Ok(self.decoder.empty_chunk()),
            State::Active { pass, chunks } => (pass, chunks),
            State::Ready => match self.passes.next_pass(&self.plan, &self.sources)? {
                Some(pass) => {
                    let chunks =
                        ChunkSplitter::new(self.layout.clone(), &pass, self.output_size_limit);
                    (pass, chunks)
                }
                None => return Ok(self.decoder.empty_chunk()),
            },
        };

        let rows = chunks
            .next_chunk()
            .ok_or_else(|| Error::invalid_operation("read_chunk: pass without rows"))?;
        let chunk = self.decoder.decode(&pass, rows)?;

        if !chunks.is_done() {
            self.state = State::Active { pass, chunks };
        } else {
            drop(pass);
            if !self.passes.is_done() {
                self.state = State::Ready;
            }
        }
        Ok(chunk)
    }
}

impl Iterator for ChunkedReader {
    type Item = Result<ReadChunk>;

    fn next(&mut self) -> Option<Result<ReadChunk>> {
        self.has_next().then(|| self.read_chunk())
    }
}

impl std::fmt::Debug for ChunkedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Ready => "ready",
            State::Active { .. } => "active",
            State::Exhausted => "exhausted",
        };
        f.debug_struct("ChunkedReader")
            .field("sources", &self.sources.len())
            .field("rows", &self.plan.total_rows())
            .field("passes", &self.pass_count())
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

/// Reads everything the builder selects into a single batch.
///
/// Fails with `RowCountOverflow` when the result would hold more rows than the
/// configured row count limit.
pub fn read_table(builder: ChunkedReaderBuilder) -> Result<ReadChunk> {
    let row_count_limit = builder.limits().row_count_limit;
    let mut reader = builder.build()?;
    let mut batches = Vec::new();
    let mut rows_per_source = reader.decoder.empty_ledger();
    let mut total_rows = 0u64;
    while reader.has_next() {
        let chunk = reader.read_chunk()?;
        total_rows += chunk.num_rows() as u64;
        if total_rows > row_count_limit {
            return Err(Error::row_count_overflow(total_rows, row_count_limit));
        }
        for (total, rows) in rows_per_source.iter_mut().zip(&chunk.rows_per_source) {
            *total += rows;
        }
        batches.push(chunk.batch);
    }
    let batch = arrow_select::concat::concat_batches(reader.schema(), &batches)
        .map_err(|e| Error::arrow("concatenate chunks", e))?;
    Ok(ReadChunk {
        batch,
        rows_per_source,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use strata_io::ReadAt;
    use strata_testkit::{FileBuilder, data_gen::int_schema, int_batch};

    use super::*;

    fn builder(rows: usize) -> ChunkedReaderBuilder {
        let batch = int_batch(rows, 2).unwrap();
        let file = FileBuilder::new(int_schema(2))
            .with_rows_per_row_group(50)
            .with_rows_per_page(10)
            .build_batch(&batch)
            .unwrap();
        ChunkedReaderBuilder::new().with_source(Arc::new(file) as Arc<dyn ReadAt>)
    }

    #[test]
    fn test_state_transitions() {
        // Two passes of one row group (800 bytes) each, three chunks per pass.
        let mut reader = builder(100)
            .with_input_size_limit(800)
            .with_output_size_limit(200)
            .build()
            .unwrap();
        assert!(reader.has_next());
        assert_eq!(reader.reserved_memory(), 0);

        let mut sizes = Vec::new();
        while reader.has_next() {
            let chunk = reader.read_chunk().unwrap();
            assert!(reader.reserved_memory() <= 800);
            sizes.push(chunk.num_rows());
        }
        assert_eq!(sizes, vec![20, 20, 10, 20, 20, 10]);
        assert_eq!(reader.reserved_memory(), 0);
    }

    #[test]
    fn test_pass_released_before_next_pass() {
        let mut reader = builder(100)
            .with_input_size_limit(800)
            .with_output_size_limit(0)
            .build()
            .unwrap();
        reader.read_chunk().unwrap();
        assert_eq!(reader.reserved_memory(), 0);
        assert!(reader.has_next());
        reader.read_chunk().unwrap();
        assert!(!reader.has_next());
    }

    #[test]
    fn test_iterator() {
        let reader = builder(100).with_output_size_limit(400).build().unwrap();
        let rows = reader
            .map(|chunk| chunk.unwrap().num_rows())
            .collect::<Vec<_>>();
        assert_eq!(rows, vec![50, 50]);
    }

    #[test]
    fn test_read_table() {
        let table = read_table(builder(100).with_output_size_limit(80)).unwrap();
        assert_eq!(table.num_rows(), 100);
        assert_eq!(table.rows_per_source, vec![100]);
        assert_eq!(table.batch, int_batch(100, 2).unwrap());

        let err = read_table(builder(100).with_row_count_limit(99)).unwrap_err();
        assert!(matches!(
            err.kind(),
            strata_common::error::ErrorKind::RowCountOverflow { .. }
        ));
    }
}

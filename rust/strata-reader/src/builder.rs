//! Configuration of a read session.

use std::sync::Arc;

use strata_common::{Result, verify_arg};
use strata_encodings::{PageDecoder, PlainPageDecoder};
use strata_format::Codec;
use strata_io::ReadAt;

use crate::{
    chunk::RowLayout,
    decode::ChunkDecoder,
    filter::RowFilter,
    limits::{CodecScratchTable, ReadLimits},
    pass::PassSplitter,
    plan::{RowSelection, build_plan, resolve_projection},
    reader::ChunkedReader,
    source::open_sources,
};

/// Builder of a [`ChunkedReader`].
///
/// ```ignore
/// let mut reader = ChunkedReaderBuilder::new()
///     .with_source(FileReader::open("data.strata")?)
///     .with_output_size_limit(64 * 1024 * 1024)
///     .with_input_size_limit(512 * 1024 * 1024)
///     .with_columns(["id", "name"])
///     .build()?;
/// ```
#[derive(Clone)]
pub struct ChunkedReaderBuilder {
    sources: Vec<Arc<dyn ReadAt>>,
    limits: ReadLimits,
    selection: RowSelection,
    columns: Option<Vec<String>>,
    filter: Option<Arc<dyn RowFilter>>,
    decoder: Arc<dyn PageDecoder>,
}

impl ChunkedReaderBuilder {
    pub fn new() -> ChunkedReaderBuilder {
        ChunkedReaderBuilder {
            sources: Vec::new(),
            limits: ReadLimits::default(),
            selection: RowSelection::default(),
            columns: None,
            filter: None,
            decoder: Arc::new(PlainPageDecoder),
        }
    }

    /// Appends a source. Rows of the sources are read in the order they were added.
    pub fn with_source(mut self, source: impl ReadAt) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = Arc<dyn ReadAt>>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn with_limits(mut self, limits: ReadLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Cap on the estimated decoded size of a chunk; `0` for unbounded.
    pub fn with_output_size_limit(mut self, limit: u64) -> Self {
        self.limits.output_size_limit = limit;
        self
    }

    /// Cap on the working memory of a pass; `0` for unbounded.
    pub fn with_input_size_limit(mut self, limit: u64) -> Self {
        self.limits.input_size_limit = limit;
        self
    }

    pub fn with_row_count_limit(mut self, limit: u64) -> Self {
        self.limits.row_count_limit = limit;
        self
    }

    pub fn with_codec_scratch(mut self, codec: Codec, multiplier: f64) -> Self {
        self.limits.codec_scratch = self.limits.codec_scratch.with(codec, multiplier);
        self
    }

    pub fn with_codec_scratch_table(mut self, table: CodecScratchTable) -> Self {
        self.limits.codec_scratch = table;
        self
    }

    /// Number of leading rows (over all sources) to skip.
    pub fn with_skip_rows(mut self, rows: u64) -> Self {
        self.selection.skip_rows = rows;
        self
    }

    /// Maximum number of rows to read after the skipped ones.
    pub fn with_num_rows(mut self, rows: u64) -> Self {
        self.selection.num_rows = Some(rows);
        self
    }

    /// Restricts each source to the given row groups, read in the given order.
    pub fn with_row_groups(mut self, row_groups: Vec<Vec<usize>>) -> Self {
        self.selection.row_groups = Some(row_groups);
        self
    }

    /// Projects the output to the named top-level columns, in the given order.
    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_filter(mut self, filter: impl RowFilter + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_page_decoder(mut self, decoder: Arc<dyn PageDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn limits(&self) -> &ReadLimits {
        &self.limits
    }

    pub fn selection(&self) -> &RowSelection {
        &self.selection
    }

    /// Opens the sources and plans the session. No page data is fetched until the
    /// first chunk is read.
    pub fn build(self) -> Result<ChunkedReader> {
        verify_arg!(sources, !self.sources.is_empty());
        self.limits.validate()?;

        let sources = open_sources(self.sources)?;
        let projection = resolve_projection(sources[0].schema(), self.columns.as_deref())?;
        let plan = build_plan(&sources, projection, &self.selection)?;

        let decoder = ChunkDecoder::new(
            plan.schema.clone(),
            self.decoder,
            self.filter,
            sources.len(),
            self.limits.row_count_limit,
        );
        let layout = Arc::new(RowLayout::new(&plan));
        let passes = PassSplitter::new(&plan, &layout, &self.limits);
        Ok(ChunkedReader::new(
            sources,
            plan,
            layout,
            passes,
            decoder,
            self.limits.output_size_limit,
        ))
    }
}

impl Default for ChunkedReaderBuilder {
    fn default() -> Self {
        ChunkedReaderBuilder::new()
    }
}

impl std::fmt::Debug for ChunkedReaderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedReaderBuilder")
            .field("sources", &self.sources.len())
            .field("limits", &self.limits)
            .field("selection", &self.selection)
            .field("columns", &self.columns)
            .field("filter", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use strata_common::error::ErrorKind;
    use strata_testkit::{FileBuilder, data_gen::int_schema, int_batch};

    use super::*;

    fn file() -> Vec<u8> {
        FileBuilder::new(int_schema(3))
            .build_batch(&int_batch(10, 3).unwrap())
            .unwrap()
    }

    #[test]
    fn test_build_requires_sources() {
        let err = ChunkedReaderBuilder::new().build().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
    }

    #[test]
    fn test_invalid_limits() {
        let err = ChunkedReaderBuilder::new()
            .with_source(file())
            .with_codec_scratch(Codec::Zstd, f64::NAN)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("codec_scratch"));
        assert!(
            ChunkedReaderBuilder::new()
                .with_source(file())
                .with_row_count_limit(0)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_projection() {
        let reader = ChunkedReaderBuilder::new()
            .with_source(file())
            .with_columns(["c2", "c0"])
            .build()
            .unwrap();
        let names = reader
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["c2", "c0"]);

        let err = ChunkedReaderBuilder::new()
            .with_source(file())
            .with_columns(["c9"])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("c9"));
    }

    #[test]
    fn test_limits_applied() {
        let limits = ReadLimits::from_json(r#"{"output_size_limit": 40, "input_size_limit": 1}"#)
            .unwrap();
        let builder = ChunkedReaderBuilder::new()
            .with_source(file())
            .with_limits(limits)
            .with_codec_scratch(Codec::Lz4, 2.0);
        assert_eq!(builder.limits().output_size_limit, 40);
        assert_eq!(builder.limits().codec_scratch.get(Codec::Lz4), 2.0);
        assert_eq!(builder.limits().codec_scratch.get(Codec::Zstd), 3.0);
        let chunks = builder.build().unwrap().count();
        assert_eq!(chunks, 1);
    }
}

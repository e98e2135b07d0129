//! Opened input sources.

use std::sync::Arc;

use strata_common::{Result, error::Error};
use strata_format::{FileMetadata, Schema, footer};
use strata_io::ReadAt;

/// One readable input with its decoded footer.
#[derive(Clone)]
pub struct Source {
    reader: Arc<dyn ReadAt>,
    metadata: Arc<FileMetadata>,
}

impl Source {
    /// Reads and verifies the footer of the source.
    pub fn open(reader: Arc<dyn ReadAt>) -> Result<Source> {
        let metadata = footer::read_metadata(reader.as_ref())?;
        Ok(Source {
            reader,
            metadata: Arc::new(metadata),
        })
    }

    pub fn reader(&self) -> &Arc<dyn ReadAt> {
        &self.reader
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn num_rows(&self) -> u64 {
        self.metadata.num_rows
    }

    pub fn schema(&self) -> &Schema {
        &self.metadata.schema
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("num_rows", &self.metadata.num_rows)
            .field("row_groups", &self.metadata.row_groups.len())
            .finish_non_exhaustive()
    }
}

/// Opens all sources and checks that they share the same schema.
pub fn open_sources(readers: Vec<Arc<dyn ReadAt>>) -> Result<Vec<Source>> {
    let sources = readers
        .into_iter()
        .map(Source::open)
        .collect::<Result<Vec<_>>>()?;
    if let Some((first, rest)) = sources.split_first() {
        if let Some(idx) = rest.iter().position(|s| s.schema() != first.schema()) {
            return Err(Error::invalid_arg(
                "sources",
                format!("schema of source {} differs from source 0", idx + 1),
            ));
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use strata_testkit::{FileBuilder, Shape, generate_batch};

    use super::*;

    fn file(shape: Shape, rows: usize) -> Arc<dyn ReadAt> {
        let batch = generate_batch(shape, rows, 5).unwrap();
        Arc::new(FileBuilder::new(shape.schema()).build_batch(&batch).unwrap())
    }

    #[test]
    fn test_open_sources() {
        let sources = open_sources(vec![file(Shape::Flat, 10), file(Shape::Flat, 0)]).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].num_rows(), 10);
        assert_eq!(sources[1].num_rows(), 0);
        assert_eq!(sources[0].schema(), &Shape::Flat.schema());
    }

    #[test]
    fn test_schema_mismatch() {
        let err = open_sources(vec![file(Shape::Flat, 10), file(Shape::List, 10)]).unwrap_err();
        assert!(err.to_string().contains("source 1"));
    }

    #[test]
    fn test_not_a_strata_file() {
        let garbage: Arc<dyn ReadAt> = Arc::new(vec![0u8; 64]);
        assert!(Source::open(garbage).is_err());
    }
}

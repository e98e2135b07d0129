use arrow_array::{BooleanArray, RecordBatch, cast::AsArray, types::Int64Type};
use strata_common::{Result, error::ErrorKind};
use strata_testkit::{FileBuilder, Shape, generate_batch};

use super::fixtures::{concat, read_all, source};
use crate::{ChunkedReaderBuilder, read_table};

/// Keeps the rows whose `id` lies in `start..end`.
fn id_between(start: i64, end: i64) -> impl Fn(&RecordBatch) -> Result<BooleanArray> + Send + Sync {
    move |batch: &RecordBatch| {
        let ids = batch.column(0).as_primitive::<Int64Type>();
        Ok(ids
            .iter()
            .map(|id| id.map(|id| (start..end).contains(&id)))
            .collect())
    }
}

fn builder(rows: usize) -> ChunkedReaderBuilder {
    let batch = generate_batch(Shape::Strings, rows, 23).unwrap();
    let file = source(
        &FileBuilder::new(Shape::Strings.schema())
            .with_rows_per_row_group(100)
            .with_rows_per_page(20),
        &batch,
    );
    ChunkedReaderBuilder::new().with_sources([file.clone(), file])
}

#[test]
fn test_filtered_chunks_may_be_empty() {
    let mut reader = builder(400)
        .with_input_size_limit(1)
        .with_filter(id_between(150, 170))
        .build()
        .unwrap();
    let mut chunks = Vec::new();
    while reader.has_next() {
        let chunk = reader.read_chunk().unwrap();
        assert!(chunk.rows_per_source.is_empty());
        chunks.push(chunk);
    }
    // One chunk per row group of each source; ids 150..170 live in the second.
    assert_eq!(chunks.len(), 8);
    let rows = chunks.iter().map(|chunk| chunk.num_rows()).collect::<Vec<_>>();
    assert_eq!(rows, vec![0, 20, 0, 0, 0, 20, 0, 0]);

    let ids = concat(&chunks)
        .column(0)
        .as_primitive::<Int64Type>()
        .values()
        .to_vec();
    let expected = (150..170).chain(150..170).collect::<Vec<_>>();
    assert_eq!(ids, expected);
}

#[test]
fn test_filter_rejecting_everything() {
    let chunks = read_all(
        builder(100)
            .with_output_size_limit(1)
            .with_filter(id_between(0, 0)),
    );
    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|chunk| chunk.num_rows() == 0));
    assert_eq!(chunks[0].batch.num_columns(), 4);
}

#[test]
fn test_read_table_with_filter() {
    let table = read_table(builder(300).with_filter(id_between(10, 40))).unwrap();
    assert_eq!(table.num_rows(), 60);
    assert!(table.rows_per_source.is_empty());
}

#[test]
fn test_filter_error_propagates() {
    let failing = |_: &RecordBatch| -> Result<BooleanArray> {
        Err(strata_common::error::Error::invalid_operation("predicate"))
    };
    let mut reader = builder(50).with_filter(failing).build().unwrap();
    let err = reader.read_chunk().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidOperation { .. }));
    assert!(!reader.has_next());
}

#[test]
fn test_read_table_overflow() {
    let err = read_table(
        builder(300)
            .with_output_size_limit(1)
            .with_row_count_limit(500),
    )
    .unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::RowCountOverflow { limit: 500, .. }
    ));

    // Filtered rows do not count towards the limit.
    let table = read_table(
        builder(300)
            .with_output_size_limit(1)
            .with_row_count_limit(500)
            .with_filter(id_between(0, 100)),
    )
    .unwrap();
    assert_eq!(table.num_rows(), 200);
}

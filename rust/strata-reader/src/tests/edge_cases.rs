use arrow_array::{BooleanArray, RecordBatch};
use strata_common::{Result, error::ErrorKind};
use strata_format::{Codec, FileMetadata, footer};
use strata_io::{CountingReadAt, FileReader};
use strata_testkit::{FileBuilder, Shape, data_gen::int_schema, generate_batch, int_batch};

use super::fixtures::{assert_batches_eq, concat, source};
use crate::{ChunkedReaderBuilder, read_table};

#[test]
fn test_empty_input_yields_one_empty_chunk() {
    for shape in Shape::ALL {
        let batch = generate_batch(shape, 0, 0).unwrap();
        let file = source(&FileBuilder::new(shape.schema()), &batch);
        let mut reader = ChunkedReaderBuilder::new()
            .with_sources([file.clone(), file])
            .with_output_size_limit(1)
            .build()
            .unwrap();
        assert!(reader.has_next(), "{shape:?}");
        let chunk = reader.read_chunk().unwrap();
        assert_eq!(chunk.num_rows(), 0);
        assert_eq!(chunk.batch.schema().as_ref(), &shape.schema().to_arrow_schema());
        assert_eq!(chunk.rows_per_source, vec![0, 0]);
        assert!(!reader.has_next());
    }
}

#[test]
fn test_read_past_end() {
    let batch = int_batch(30, 2).unwrap();
    let file = source(&FileBuilder::new(int_schema(2)), &batch);
    let mut reader = ChunkedReaderBuilder::new()
        .with_source(file.clone())
        .build()
        .unwrap();
    assert_eq!(reader.read_chunk().unwrap().num_rows(), 30);
    assert!(!reader.has_next());
    for _ in 0..3 {
        let chunk = reader.read_chunk().unwrap();
        assert_eq!(chunk.num_rows(), 0);
        assert_eq!(chunk.batch.schema(), batch.schema());
        assert_eq!(chunk.rows_per_source, vec![0]);
    }
    assert!(reader.next().is_none());

    let keep_all = |batch: &RecordBatch| -> Result<BooleanArray> {
        Ok(BooleanArray::from(vec![true; batch.num_rows()]))
    };
    let mut filtered = ChunkedReaderBuilder::new()
        .with_source(file)
        .with_filter(keep_all)
        .build()
        .unwrap();
    filtered.read_chunk().unwrap();
    assert!(filtered.read_chunk().unwrap().rows_per_source.is_empty());
}

/// Flips a byte in the first page of column `c0` of row group `row_group`.
fn corrupt_page(mut file: Vec<u8>, row_group: usize) -> Vec<u8> {
    let metadata = footer::read_metadata(&file).unwrap();
    let offset = metadata.row_groups[row_group].columns[0].pages[0].offset as usize;
    file[offset + 3] ^= 0xff;
    file
}

#[test]
fn test_decode_error_aborts_session() {
    let batch = int_batch(100, 2).unwrap();
    let file = FileBuilder::new(int_schema(2))
        .with_codec(Codec::Lz4)
        .with_rows_per_row_group(50)
        .build_batch(&batch)
        .unwrap();
    let mut reader = ChunkedReaderBuilder::new()
        .with_source(corrupt_page(file, 1))
        .with_input_size_limit(1)
        .build()
        .unwrap();

    assert_eq!(reader.read_chunk().unwrap().num_rows(), 50);
    assert!(reader.has_next());
    let err = reader.read_chunk().unwrap_err();
    assert!(err.is_decode_error(), "{err}");
    assert!(!reader.has_next());
    assert_eq!(reader.read_chunk().unwrap().num_rows(), 0);
    assert_eq!(reader.reserved_memory(), 0);
}

#[test]
fn test_corrupt_footer() {
    let batch = int_batch(10, 1).unwrap();
    let mut file = FileBuilder::new(int_schema(1)).build_batch(&batch).unwrap();
    let len = file.len();
    file[len - 10] ^= 0x01;
    assert!(ChunkedReaderBuilder::new().with_source(file).build().is_err());
}

#[test]
fn test_schema_mismatch_between_sources() {
    let flat = source(
        &FileBuilder::new(Shape::Flat.schema()),
        &generate_batch(Shape::Flat, 5, 0).unwrap(),
    );
    let list = source(
        &FileBuilder::new(Shape::List.schema()),
        &generate_batch(Shape::List, 5, 0).unwrap(),
    );
    let err = ChunkedReaderBuilder::new()
        .with_sources([flat, list])
        .build()
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
}

#[test]
fn test_file_source() {
    let batch = generate_batch(Shape::ListOfStruct, 500, 17).unwrap();
    let builder = FileBuilder::new(Shape::ListOfStruct.schema())
        .with_codec(Codec::Zstd)
        .with_rows_per_row_group(128)
        .with_rows_per_page(32);
    let temp = builder.build_temp_file(&batch).unwrap();
    let file = FileReader::open(temp.path()).unwrap();

    let table = read_table(
        ChunkedReaderBuilder::new()
            .with_source(file)
            .with_output_size_limit(2_048)
            .with_input_size_limit(16_384),
    )
    .unwrap();
    assert_batches_eq(&table.batch, &batch, "file source");
    assert_eq!(table.rows_per_source, vec![500]);
}

#[test]
fn test_pages_are_fetched_pass_by_pass() {
    let batch = int_batch(400, 2).unwrap();
    let file = FileBuilder::new(int_schema(2))
        .with_rows_per_row_group(100)
        .with_rows_per_page(25)
        .build_batch(&batch)
        .unwrap();
    let page_bytes = 400 * 2 * 4;
    let counting = CountingReadAt::new(file);
    let tracker = counting.tracker();

    let mut reader = ChunkedReaderBuilder::new()
        .with_source(counting)
        .with_input_size_limit(1_600)
        .build()
        .unwrap();
    tracker.reset();

    let mut fetched = Vec::new();
    while reader.has_next() {
        reader.read_chunk().unwrap();
        fetched.push(tracker.snapshot().bytes);
    }
    // One row group (two column chunks, one request each) per pass.
    assert_eq!(fetched, vec![800, 1_600, 2_400, 3_200]);
    assert_eq!(tracker.snapshot().bytes, page_bytes);
    assert_eq!(tracker.snapshot().requests, 8);
}

#[test]
fn test_projection_reads_only_selected_columns() {
    let batch = int_batch(100, 4).unwrap();
    let file = FileBuilder::new(int_schema(4)).build_batch(&batch).unwrap();
    let counting = CountingReadAt::new(file);
    let tracker = counting.tracker();
    let builder = ChunkedReaderBuilder::new()
        .with_source(counting)
        .with_columns(["c3", "c1"]);
    let mut reader = builder.build().unwrap();
    tracker.reset();

    let chunk = reader.read_chunk().unwrap();
    assert_eq!(tracker.snapshot().bytes, 2 * 400);
    assert_eq!(chunk.batch.num_columns(), 2);
    assert_batches_eq(
        &chunk.batch,
        &batch.project(&[3, 1]).unwrap(),
        "projection",
    );
}

#[test]
fn test_oversized_row_group_is_read_alone() {
    let batch = generate_batch(Shape::Strings, 200, 5).unwrap();
    let file = source(
        &FileBuilder::new(Shape::Strings.schema())
            .with_rows_per_row_group(40)
            .with_rows_per_page(10),
        &batch,
    );
    let mut reader = ChunkedReaderBuilder::new()
        .with_source(file)
        .with_input_size_limit(1)
        .with_output_size_limit(1)
        .build()
        .unwrap();
    assert_eq!(reader.pass_count(), 5);
    assert!(!reader.is_over_input_limit());
    let mut chunks = Vec::new();
    while reader.has_next() {
        chunks.push(reader.read_chunk().unwrap());
        // Four chunks per row group; the pass is held until its last one is read.
        assert_eq!(reader.is_over_input_limit(), chunks.len() % 4 != 0);
    }
    assert_eq!(chunks.len(), 20);
    assert_eq!(reader.reserved_memory(), 0);
    assert_batches_eq(&concat(&chunks), &batch, "forced passes");
}

/// Rewrites the footer of `file` with the metadata changed by `edit`.
fn rewrite_footer(file: Vec<u8>, edit: impl FnOnce(&mut FileMetadata)) -> Vec<u8> {
    let mut metadata = footer::read_metadata(&file).unwrap();
    let data_end = file.len() - footer::encode_footer(&metadata).unwrap().len();
    edit(&mut metadata);
    let mut rewritten = file[..data_end].to_vec();
    rewritten.extend(footer::encode_footer(&metadata).unwrap());
    rewritten
}

#[test]
fn test_crafted_page_layout_is_rejected() {
    let batch = int_batch(100, 2).unwrap();
    let file = FileBuilder::new(int_schema(2))
        .with_rows_per_row_group(50)
        .with_rows_per_page(10)
        .build_batch(&batch)
        .unwrap();

    let edits: [fn(&mut FileMetadata); 3] = [
        |metadata| {
            let pages = &mut metadata.row_groups[0].columns[0].pages;
            let first = pages[0].offset;
            pages[0].offset = pages[1].offset;
            pages[1].offset = first;
        },
        |metadata| metadata.row_groups[1].columns[1].pages[2].offset -= 1,
        |metadata| metadata.row_groups[1].columns[1].pages[4].compressed_size = u64::MAX,
    ];
    for edit in edits {
        let crafted = rewrite_footer(file.clone(), edit);
        let err = ChunkedReaderBuilder::new()
            .with_source(crafted)
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }), "{err}");
    }

    let untouched = rewrite_footer(file, |_| {});
    let table = read_table(ChunkedReaderBuilder::new().with_source(untouched)).unwrap();
    assert_batches_eq(&table.batch, &batch, "rewritten footer");
}

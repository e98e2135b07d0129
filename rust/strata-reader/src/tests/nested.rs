use std::sync::Arc;

use arrow_array::{Array, cast::AsArray};
use strata_format::Codec;
use strata_testkit::{FileBuilder, Shape, generate_batch};

use super::fixtures::{assert_batches_eq, concat, read_all, source};
use crate::{
    ChunkedReaderBuilder,
    chunk::{ChunkSplitter, RowLayout},
    limits::ReadLimits,
    pass::PassSplitter,
    plan::{RowSelection, build_plan},
    source::open_sources,
};

const NESTED: [Shape; 4] = [
    Shape::Struct,
    Shape::List,
    Shape::StructOfList,
    Shape::ListOfStruct,
];

fn layout(shape: Shape) -> FileBuilder {
    FileBuilder::new(shape.schema())
        .with_codec(Codec::Lz4)
        .with_rows_per_row_group(90)
        .with_rows_per_page(12)
        .with_column_rows_per_page(1, 5)
}

#[test]
fn test_nested_rows_stay_whole() {
    for shape in NESTED {
        let batch = generate_batch(shape, 270, 31).unwrap();
        let file = source(&layout(shape), &batch);
        for limit in [1, 300, 1_500] {
            let chunks = read_all(
                ChunkedReaderBuilder::new()
                    .with_source(file.clone())
                    .with_output_size_limit(limit)
                    .with_input_size_limit(4_096),
            );
            let context = format!("{shape:?} limit={limit}");
            let mut offset = 0;
            for chunk in &chunks {
                let rows = chunk.num_rows();
                // Each chunk holds exactly the rows it claims, with their nested values.
                for (column, expected) in chunk.batch.columns().iter().zip(batch.columns()) {
                    column.to_data().validate_full().unwrap();
                    assert_eq!(
                        column.to_data(),
                        expected.slice(offset, rows).to_data(),
                        "{context}"
                    );
                }
                offset += rows;
            }
            assert_eq!(offset, 270, "{context}");
        }
    }
}

#[test]
fn test_chunks_end_on_page_boundaries() {
    let batch = generate_batch(Shape::ListOfStruct, 90, 4).unwrap();
    let sources = open_sources(vec![source(&layout(Shape::ListOfStruct), &batch)]).unwrap();
    let plan = build_plan(&sources, vec![0, 1], &RowSelection::default()).unwrap();
    let layout = Arc::new(RowLayout::new(&plan));
    let pass = PassSplitter::new(&plan, &layout, &ReadLimits::default())
        .next_pass(&plan, &sources)
        .unwrap()
        .unwrap();

    let page_ends = pass
        .columns
        .iter()
        .flat_map(|column| column.pages.iter().map(|page| page.rows.end))
        .collect::<Vec<_>>();
    let chunks = ChunkSplitter::new(layout, &pass, 400).collect::<Vec<_>>();
    assert!(chunks.len() > 1);
    for rows in &chunks {
        assert!(page_ends.contains(&rows.end), "{rows:?}");
    }
}

#[test]
fn test_list_values_follow_rows() {
    let batch = generate_batch(Shape::List, 200, 8).unwrap();
    let file = source(&layout(Shape::List), &batch);
    let chunks = read_all(
        ChunkedReaderBuilder::new()
            .with_source(file)
            .with_columns(["values"])
            .with_output_size_limit(256),
    );
    assert!(chunks.len() > 1);
    let expected = batch.column(1).as_list::<i32>();
    let actual = concat(&chunks);
    let actual = actual.column(0).as_list::<i32>();
    assert_eq!(actual.len(), expected.len());
    for row in 0..expected.len() {
        assert_eq!(actual.is_null(row), expected.is_null(row));
        if expected.is_valid(row) {
            assert_eq!(actual.value(row).to_data(), expected.value(row).to_data());
        }
    }
}

#[test]
fn test_nested_estimates_drive_chunking() {
    // With equal limits, a shape with list payloads needs more chunks than its
    // flat projection.
    let batch = generate_batch(Shape::StructOfList, 270, 12).unwrap();
    let file = source(&layout(Shape::StructOfList), &batch);
    let count = |columns: &[&str]| {
        read_all(
            ChunkedReaderBuilder::new()
                .with_source(file.clone())
                .with_columns(columns.iter().copied())
                .with_output_size_limit(600),
        )
        .len()
    };
    assert!(count(&["id", "record"]) > count(&["id"]));
    assert_batches_eq(
        &concat(&read_all(ChunkedReaderBuilder::new().with_source(file.clone()))),
        &batch,
        "struct of list",
    );
}

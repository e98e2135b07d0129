//! Data generation utilities for testing.
//!
//! Batches are generated from a Strata [`Schema`] with a seeded random source, so
//! the same `(shape, rows, seed)` always produces the same batch.

use std::sync::Arc;

use arrow_array::{
    ArrayRef, BinaryArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    ListArray, RecordBatch, RecordBatchOptions, StringArray, StructArray,
};
use arrow_buffer::{NullBuffer, OffsetBuffer};
use arrow_schema::Fields;
use strata_format::schema::{NodeKind, PhysicalType, Schema, SchemaNode};

/// Probability of a null slot in a nullable node.
const NULL_PROBABILITY: f64 = 0.1;

/// Maximum number of elements of a generated list.
const MAX_LIST_LEN: usize = 4;

/// Maximum length of a generated string or binary value.
const MAX_VALUE_LEN: usize = 12;

/// Nesting shapes covered by the reader tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Fixed-width and boolean columns.
    Flat,
    /// Strings and binaries.
    Strings,
    Struct,
    List,
    StructOfList,
    ListOfStruct,
}

impl Shape {
    pub const ALL: [Shape; 6] = [
        Shape::Flat,
        Shape::Strings,
        Shape::Struct,
        Shape::List,
        Shape::StructOfList,
        Shape::ListOfStruct,
    ];

    pub fn schema(self) -> Schema {
        let id = SchemaNode::leaf("id", PhysicalType::Int64, false);
        let columns = match self {
            Shape::Flat => vec![
                id,
                SchemaNode::leaf("i32", PhysicalType::Int32, true),
                SchemaNode::leaf("f32", PhysicalType::Float32, false),
                SchemaNode::leaf("f64", PhysicalType::Float64, true),
                SchemaNode::leaf("flag", PhysicalType::Boolean, true),
            ],
            Shape::Strings => vec![
                id,
                SchemaNode::leaf("name", PhysicalType::Utf8, true),
                SchemaNode::leaf("blob", PhysicalType::Binary, true),
                SchemaNode::leaf("code", PhysicalType::Utf8, false),
            ],
            Shape::Struct => vec![
                id,
                SchemaNode::structure(
                    "point",
                    vec![
                        SchemaNode::leaf("x", PhysicalType::Int32, false),
                        SchemaNode::leaf("y", PhysicalType::Float64, true),
                        SchemaNode::leaf("label", PhysicalType::Utf8, true),
                    ],
                    true,
                ),
            ],
            Shape::List => vec![
                id,
                SchemaNode::list(
                    "values",
                    SchemaNode::leaf("item", PhysicalType::Int32, true),
                    true,
                ),
                SchemaNode::list(
                    "words",
                    SchemaNode::leaf("item", PhysicalType::Utf8, false),
                    false,
                ),
            ],
            Shape::StructOfList => vec![
                id,
                SchemaNode::structure(
                    "record",
                    vec![
                        SchemaNode::leaf("key", PhysicalType::Int32, false),
                        SchemaNode::list(
                            "samples",
                            SchemaNode::leaf("item", PhysicalType::Float64, true),
                            true,
                        ),
                    ],
                    true,
                ),
            ],
            Shape::ListOfStruct => vec![
                id,
                SchemaNode::list(
                    "events",
                    SchemaNode::structure(
                        "item",
                        vec![
                            SchemaNode::leaf("seq", PhysicalType::Int64, false),
                            SchemaNode::leaf("tag", PhysicalType::Utf8, true),
                            SchemaNode::list(
                                "scores",
                                SchemaNode::leaf("item", PhysicalType::Int32, false),
                                true,
                            ),
                        ],
                        true,
                    ),
                    true,
                ),
            ],
        };
        Schema::new(columns)
    }
}

/// Generates a batch of `rows` rows of the given shape.
///
/// The first column, `id`, holds the row index so that tests can tell which rows
/// ended up in which chunk.
pub fn generate_batch(shape: Shape, rows: usize, seed: u64) -> anyhow::Result<RecordBatch> {
    batch_for_schema(&shape.schema(), rows, seed)
}

/// Generates a batch for an arbitrary schema. A top-level `id` Int64 column, if
/// present, holds the row index.
pub fn batch_for_schema(schema: &Schema, rows: usize, seed: u64) -> anyhow::Result<RecordBatch> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let columns = schema
        .columns
        .iter()
        .map(|column| {
            if column.name == "id" && column.kind == NodeKind::Leaf(PhysicalType::Int64) {
                Arc::new(Int64Array::from_iter_values(0..rows as i64)) as ArrayRef
            } else {
                generate_array(column, rows, &mut rng)
            }
        })
        .collect::<Vec<_>>();
    let batch = RecordBatch::try_new_with_options(
        Arc::new(schema.to_arrow_schema()),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(rows)),
    )?;
    Ok(batch)
}

/// A batch of `columns` non-nullable Int32 columns named `c0`, `c1`, ... where
/// row `r` of column `c` holds `r * columns + c`.
pub fn int_batch(rows: usize, columns: usize) -> anyhow::Result<RecordBatch> {
    let schema = int_schema(columns);
    let arrays = (0..columns)
        .map(|c| {
            Arc::new(Int32Array::from_iter_values(
                (0..rows).map(|r| (r * columns + c) as i32),
            )) as ArrayRef
        })
        .collect::<Vec<_>>();
    let batch = RecordBatch::try_new_with_options(
        Arc::new(schema.to_arrow_schema()),
        arrays,
        &RecordBatchOptions::new().with_row_count(Some(rows)),
    )?;
    Ok(batch)
}

pub fn int_schema(columns: usize) -> Schema {
    Schema::new(
        (0..columns)
            .map(|c| SchemaNode::leaf(format!("c{c}"), PhysicalType::Int32, false))
            .collect(),
    )
}

fn generate_nulls(node: &SchemaNode, len: usize, rng: &mut fastrand::Rng) -> Option<NullBuffer> {
    if !node.nullable {
        return None;
    }
    let validity = (0..len)
        .map(|_| rng.f64() >= NULL_PROBABILITY)
        .collect::<Vec<_>>();
    Some(NullBuffer::from(validity)).filter(|nulls| nulls.null_count() != 0)
}

fn generate_array(node: &SchemaNode, len: usize, rng: &mut fastrand::Rng) -> ArrayRef {
    let nulls = generate_nulls(node, len, rng);
    match &node.kind {
        NodeKind::Leaf(physical_type) => generate_leaf(*physical_type, len, nulls, rng),
        NodeKind::List(item) => {
            let lengths = (0..len)
                .map(|i| match &nulls {
                    Some(nulls) if nulls.is_null(i) => 0,
                    _ => rng.usize(0..=MAX_LIST_LEN),
                })
                .collect::<Vec<_>>();
            let values = generate_array(item, lengths.iter().sum(), rng);
            Arc::new(ListArray::new(
                Arc::new(item.to_arrow_field()),
                OffsetBuffer::from_lengths(lengths),
                values,
                nulls,
            ))
        }
        NodeKind::Struct(children) => {
            let fields = children
                .iter()
                .map(SchemaNode::to_arrow_field)
                .collect::<Fields>();
            let arrays = children
                .iter()
                .map(|child| generate_array(child, len, rng))
                .collect::<Vec<_>>();
            Arc::new(StructArray::new(fields, arrays, nulls))
        }
    }
}

fn generate_leaf(
    physical_type: PhysicalType,
    len: usize,
    nulls: Option<NullBuffer>,
    rng: &mut fastrand::Rng,
) -> ArrayRef {
    match physical_type {
        PhysicalType::Boolean => {
            let values = (0..len).map(|_| rng.bool()).collect::<Vec<_>>();
            Arc::new(BooleanArray::new(values.into(), nulls))
        }
        PhysicalType::Int32 => {
            let values = (0..len).map(|_| rng.i32(-1000..1000)).collect::<Vec<_>>();
            Arc::new(Int32Array::new(values.into(), nulls))
        }
        PhysicalType::Int64 => {
            let values = (0..len).map(|_| rng.i64(..)).collect::<Vec<_>>();
            Arc::new(Int64Array::new(values.into(), nulls))
        }
        PhysicalType::Float32 => {
            let values = (0..len).map(|_| rng.f32() * 100.0).collect::<Vec<_>>();
            Arc::new(Float32Array::new(values.into(), nulls))
        }
        PhysicalType::Float64 => {
            let values = (0..len).map(|_| rng.f64() * 1e6).collect::<Vec<_>>();
            Arc::new(Float64Array::new(values.into(), nulls))
        }
        PhysicalType::Utf8 => {
            let values = (0..len)
                .map(|i| match &nulls {
                    Some(nulls) if nulls.is_null(i) => None,
                    _ => Some(random_word(rng)),
                })
                .collect::<Vec<_>>();
            Arc::new(StringArray::from(values))
        }
        PhysicalType::Binary => {
            let values = (0..len)
                .map(|i| match &nulls {
                    Some(nulls) if nulls.is_null(i) => None,
                    _ => Some(random_word(rng).into_bytes()),
                })
                .collect::<Vec<_>>();
            Arc::new(BinaryArray::from_iter(values))
        }
    }
}

fn random_word(rng: &mut fastrand::Rng) -> String {
    let len = rng.usize(0..=MAX_VALUE_LEN);
    (0..len).map(|_| rng.alphanumeric()).collect()
}

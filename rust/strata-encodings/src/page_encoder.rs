use arrow_array::{Array, cast::AsArray, types};
use arrow_buffer::{BooleanBufferBuilder, bit_util};
use byteorder::{LE, WriteBytesExt};
use strata_common::{Result, error::Error};
use strata_format::{
    NodeStats,
    schema::{NodeKind, PhysicalType, SchemaNode},
};

/// Plain-encoded page bytes (before compression) with the per-node statistics.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    pub data: Vec<u8>,
    /// Statistics of every node of the column, in pre-order.
    pub node_stats: Vec<NodeStats>,
}

/// Encodes all rows of `array` as a single page of the column described by `column`.
pub fn encode_page(column: &SchemaNode, array: &dyn Array) -> Result<EncodedPage> {
    let mut page = EncodedPage {
        data: Vec::new(),
        node_stats: Vec::with_capacity(column.node_count()),
    };
    encode_node(column, array, &mut page)?;
    Ok(page)
}

fn encode_node(node: &SchemaNode, array: &dyn Array, page: &mut EncodedPage) -> Result<()> {
    let len = array.len();
    let stats_idx = page.node_stats.len();
    page.node_stats.push(NodeStats {
        value_count: len as u64,
        null_count: array.null_count() as u64,
        payload_bytes: 0,
    });

    if node.nullable {
        write_bitmap(&mut page.data, len, |i| array.is_valid(i));
    } else if array.null_count() != 0 {
        return Err(Error::invalid_arg(
            &node.name,
            "null values in a non-nullable column",
        ));
    }

    match &node.kind {
        NodeKind::Leaf(physical_type) => {
            let payload = encode_leaf(node, *physical_type, array, &mut page.data)?;
            page.node_stats[stats_idx].payload_bytes = payload;
        }
        NodeKind::List(item) => {
            let list = array
                .as_list_opt::<i32>()
                .ok_or_else(|| type_mismatch(node, array))?;
            let offsets = list.value_offsets();
            for window in offsets.windows(2) {
                page.data.write_u32::<LE>((window[1] - window[0]) as u32)?;
            }
            let start = offsets[0] as usize;
            let end = offsets[len] as usize;
            let values = list.values().slice(start, end - start);
            encode_node(item, values.as_ref(), page)?;
        }
        NodeKind::Struct(children) => {
            let structure = array
                .as_struct_opt()
                .ok_or_else(|| type_mismatch(node, array))?;
            if structure.num_columns() != children.len() {
                return Err(type_mismatch(node, array));
            }
            for (child, child_array) in children.iter().zip(structure.columns()) {
                encode_node(child, child_array.as_ref(), page)?;
            }
        }
    }
    Ok(())
}

/// Writes the leaf values, returning the variable-length payload size.
fn encode_leaf(
    node: &SchemaNode,
    physical_type: PhysicalType,
    array: &dyn Array,
    out: &mut Vec<u8>,
) -> Result<u64> {
    let mismatch = || type_mismatch(node, array);
    match physical_type {
        PhysicalType::Boolean => {
            let values = array.as_boolean_opt().ok_or_else(mismatch)?.values();
            write_bitmap(out, values.len(), |i| values.value(i));
        }
        PhysicalType::Int32 => {
            let values = array.as_primitive_opt::<types::Int32Type>().ok_or_else(mismatch)?;
            out.reserve(values.len() * 4);
            for &v in values.values().iter() {
                out.write_i32::<LE>(v)?;
            }
        }
        PhysicalType::Int64 => {
            let values = array.as_primitive_opt::<types::Int64Type>().ok_or_else(mismatch)?;
            out.reserve(values.len() * 8);
            for &v in values.values().iter() {
                out.write_i64::<LE>(v)?;
            }
        }
        PhysicalType::Float32 => {
            let values = array
                .as_primitive_opt::<types::Float32Type>()
                .ok_or_else(mismatch)?;
            out.reserve(values.len() * 4);
            for &v in values.values().iter() {
                out.write_f32::<LE>(v)?;
            }
        }
        PhysicalType::Float64 => {
            let values = array
                .as_primitive_opt::<types::Float64Type>()
                .ok_or_else(mismatch)?;
            out.reserve(values.len() * 8);
            for &v in values.values().iter() {
                out.write_f64::<LE>(v)?;
            }
        }
        PhysicalType::Utf8 => {
            let strings = array.as_string_opt::<i32>().ok_or_else(mismatch)?;
            return Ok(write_var_len(out, strings.value_offsets(), strings.values()));
        }
        PhysicalType::Binary => {
            let binaries = array.as_binary_opt::<i32>().ok_or_else(mismatch)?;
            return Ok(write_var_len(out, binaries.value_offsets(), binaries.values()));
        }
    }
    Ok(0)
}

fn write_var_len(out: &mut Vec<u8>, offsets: &[i32], values: &[u8]) -> u64 {
    for window in offsets.windows(2) {
        out.extend_from_slice(&((window[1] - window[0]) as u32).to_le_bytes());
    }
    let start = offsets.first().copied().unwrap_or(0) as usize;
    let end = offsets.last().copied().unwrap_or(0) as usize;
    out.extend_from_slice(&values[start..end]);
    (end - start) as u64
}

fn write_bitmap(out: &mut Vec<u8>, len: usize, bit: impl Fn(usize) -> bool) {
    let mut builder = BooleanBufferBuilder::new(len);
    (0..len).for_each(|i| builder.append(bit(i)));
    let bits = builder.finish();
    out.extend_from_slice(&bits.inner().as_slice()[..bit_util::ceil(len, 8)]);
}

fn type_mismatch(node: &SchemaNode, array: &dyn Array) -> Error {
    Error::invalid_arg(
        &node.name,
        format!(
            "array of type {} does not match the column schema",
            array.data_type()
        ),
    )
}

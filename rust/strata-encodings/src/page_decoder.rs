use std::sync::Arc;

use arrow_array::{
    ArrayRef, BinaryArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    ListArray, StringArray, StructArray,
};
use arrow_buffer::{BooleanBuffer, Buffer, NullBuffer, OffsetBuffer, bit_util};
use arrow_schema::Fields;
use byteorder::{LE, ReadBytesExt};
use strata_common::{Result, error::Error};
use strata_format::schema::{NodeKind, PhysicalType, SchemaNode};

/// Decode kernel turning the decompressed bytes of one page into an Arrow array.
pub trait PageDecoder: Send + Sync {
    /// Decodes all `num_rows` rows of a page of `column`.
    ///
    /// `page_index` is the index of the page within its column chunk and is only
    /// used for error reporting.
    fn decode_page(
        &self,
        column: &SchemaNode,
        page_index: usize,
        data: &[u8],
        num_rows: usize,
    ) -> Result<ArrayRef>;
}

/// Decoder of the plain page layout produced by [`encode_page`](crate::encode_page).
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainPageDecoder;

impl PageDecoder for PlainPageDecoder {
    fn decode_page(
        &self,
        column: &SchemaNode,
        page_index: usize,
        data: &[u8],
        num_rows: usize,
    ) -> Result<ArrayRef> {
        log::trace!(
            "decoding page {page_index} of '{}': {num_rows} rows, {} bytes",
            column.name,
            data.len()
        );
        let mut cursor = PageCursor {
            data,
            column: &column.name,
            page: page_index,
        };
        let array = cursor.decode_node(column, num_rows)?;
        if !cursor.data.is_empty() {
            return Err(cursor.fail(format!("{} trailing bytes", cursor.data.len())));
        }
        Ok(array)
    }
}

struct PageCursor<'a> {
    data: &'a [u8],
    column: &'a str,
    page: usize,
}

impl<'a> PageCursor<'a> {
    fn fail(&self, message: impl Into<String>) -> Error {
        Error::decode(self.column, self.page, message)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.data.len() {
            return Err(self.fail(format!(
                "unexpected end of page data: need {len} bytes, {} left",
                self.data.len()
            )));
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn take_values(&mut self, count: usize, width: usize) -> Result<&'a [u8]> {
        let len = count
            .checked_mul(width)
            .ok_or_else(|| self.fail("value count overflow"))?;
        self.take(len)
    }

    fn bitmap(&mut self, len: usize) -> Result<BooleanBuffer> {
        let bytes = self.take(bit_util::ceil(len, 8))?;
        Ok(BooleanBuffer::new(Buffer::from_slice_ref(bytes), 0, len))
    }

    /// Reads `count` lengths and converts them into offsets.
    fn offsets(&mut self, count: usize) -> Result<OffsetBuffer<i32>> {
        let mut bytes = self.take_values(count, 4)?;
        let mut lengths = vec![0u32; count];
        bytes.read_u32_into::<LE>(&mut lengths)?;
        let total = lengths.iter().map(|&len| len as u64).sum::<u64>();
        if total > i32::MAX as u64 {
            return Err(self.fail(format!("{total} elements exceed the offset range")));
        }
        Ok(OffsetBuffer::from_lengths(
            lengths.into_iter().map(|len| len as usize),
        ))
    }

    fn decode_node(&mut self, node: &SchemaNode, len: usize) -> Result<ArrayRef> {
        let nulls = if node.nullable {
            Some(NullBuffer::new(self.bitmap(len)?)).filter(|nulls| nulls.null_count() != 0)
        } else {
            None
        };

        let array: ArrayRef = match &node.kind {
            NodeKind::Leaf(physical_type) => self.decode_leaf(*physical_type, len, nulls)?,
            NodeKind::List(item) => {
                let offsets = self.offsets(len)?;
                let item_count = offsets.last().copied().unwrap_or(0) as usize;
                let values = self.decode_node(item, item_count)?;
                Arc::new(
                    ListArray::try_new(Arc::new(item.to_arrow_field()), offsets, values, nulls)
                        .map_err(|e| self.fail(e.to_string()))?,
                )
            }
            NodeKind::Struct(children) if children.is_empty() => {
                Arc::new(StructArray::new_empty_fields(len, nulls))
            }
            NodeKind::Struct(children) => {
                let arrays = children
                    .iter()
                    .map(|child| self.decode_node(child, len))
                    .collect::<Result<Vec<_>>>()?;
                let fields = children
                    .iter()
                    .map(SchemaNode::to_arrow_field)
                    .collect::<Fields>();
                Arc::new(
                    StructArray::try_new(fields, arrays, nulls)
                        .map_err(|e| self.fail(e.to_string()))?,
                )
            }
        };
        Ok(array)
    }

    fn decode_leaf(
        &mut self,
        physical_type: PhysicalType,
        len: usize,
        nulls: Option<NullBuffer>,
    ) -> Result<ArrayRef> {
        Ok(match physical_type {
            PhysicalType::Boolean => Arc::new(BooleanArray::new(self.bitmap(len)?, nulls)),
            PhysicalType::Int32 => {
                let mut values = vec![0i32; len];
                self.take_values(len, 4)?.read_i32_into::<LE>(&mut values)?;
                Arc::new(Int32Array::new(values.into(), nulls))
            }
            PhysicalType::Int64 => {
                let mut values = vec![0i64; len];
                self.take_values(len, 8)?.read_i64_into::<LE>(&mut values)?;
                Arc::new(Int64Array::new(values.into(), nulls))
            }
            PhysicalType::Float32 => {
                let mut values = vec![0f32; len];
                self.take_values(len, 4)?.read_f32_into::<LE>(&mut values)?;
                Arc::new(Float32Array::new(values.into(), nulls))
            }
            PhysicalType::Float64 => {
                let mut values = vec![0f64; len];
                self.take_values(len, 8)?.read_f64_into::<LE>(&mut values)?;
                Arc::new(Float64Array::new(values.into(), nulls))
            }
            PhysicalType::Utf8 => {
                let offsets = self.offsets(len)?;
                let payload = self.take(offsets.last().copied().unwrap_or(0) as usize)?;
                Arc::new(
                    StringArray::try_new(offsets, Buffer::from_slice_ref(payload), nulls)
                        .map_err(|e| self.fail(e.to_string()))?,
                )
            }
            PhysicalType::Binary => {
                let offsets = self.offsets(len)?;
                let payload = self.take(offsets.last().copied().unwrap_or(0) as usize)?;
                Arc::new(
                    BinaryArray::try_new(offsets, Buffer::from_slice_ref(payload), nulls)
                        .map_err(|e| self.fail(e.to_string()))?,
                )
            }
        })
    }
}

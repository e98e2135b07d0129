//! Column schema tree.
//!
//! Every top-level column is a [`SchemaNode`] whose [`NodeKind`] is either a
//! leaf with a physical type, a list with a single item node, or a struct with
//! child nodes. Page statistics are stored per node in pre-order, with
//! [`SchemaNode::node_count`] entries per column.

use std::sync::Arc;

use arrow_schema::{DataType as ArrowDataType, Field as ArrowField, Fields as ArrowFields};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use strata_common::{Result, error::Error};

/// Physical representation of leaf values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum PhysicalType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
}

impl PhysicalType {
    /// Byte width of a fixed-width value. `None` for bit-packed booleans and
    /// variable-length types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            PhysicalType::Int32 | PhysicalType::Float32 => Some(4),
            PhysicalType::Int64 | PhysicalType::Float64 => Some(8),
            PhysicalType::Boolean | PhysicalType::Utf8 | PhysicalType::Binary => None,
        }
    }

    pub fn to_arrow(self) -> ArrowDataType {
        match self {
            PhysicalType::Boolean => ArrowDataType::Boolean,
            PhysicalType::Int32 => ArrowDataType::Int32,
            PhysicalType::Int64 => ArrowDataType::Int64,
            PhysicalType::Float32 => ArrowDataType::Float32,
            PhysicalType::Float64 => ArrowDataType::Float64,
            PhysicalType::Utf8 => ArrowDataType::Utf8,
            PhysicalType::Binary => ArrowDataType::Binary,
        }
    }

    pub fn from_arrow(data_type: &ArrowDataType) -> Option<PhysicalType> {
        Some(match data_type {
            ArrowDataType::Boolean => PhysicalType::Boolean,
            ArrowDataType::Int32 => PhysicalType::Int32,
            ArrowDataType::Int64 => PhysicalType::Int64,
            ArrowDataType::Float32 => PhysicalType::Float32,
            ArrowDataType::Float64 => PhysicalType::Float64,
            ArrowDataType::Utf8 => PhysicalType::Utf8,
            ArrowDataType::Binary => PhysicalType::Binary,
            _ => return None,
        })
    }
}

/// Shape of a schema node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum NodeKind {
    Leaf(PhysicalType),
    List(Box<SchemaNode>),
    Struct(Vec<SchemaNode>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct SchemaNode {
    pub name: String,
    pub nullable: bool,
    pub kind: NodeKind,
}

impl SchemaNode {
    pub fn leaf(name: impl Into<String>, physical_type: PhysicalType, nullable: bool) -> Self {
        SchemaNode {
            name: name.into(),
            nullable,
            kind: NodeKind::Leaf(physical_type),
        }
    }

    pub fn list(name: impl Into<String>, item: SchemaNode, nullable: bool) -> Self {
        SchemaNode {
            name: name.into(),
            nullable,
            kind: NodeKind::List(Box::new(item)),
        }
    }

    pub fn structure(name: impl Into<String>, children: Vec<SchemaNode>, nullable: bool) -> Self {
        SchemaNode {
            name: name.into(),
            nullable,
            kind: NodeKind::Struct(children),
        }
    }

    /// Number of nodes in this subtree, including the node itself.
    pub fn node_count(&self) -> usize {
        1 + match &self.kind {
            NodeKind::Leaf(_) => 0,
            NodeKind::List(item) => item.node_count(),
            NodeKind::Struct(children) => children.iter().map(SchemaNode::node_count).sum(),
        }
    }

    pub fn to_arrow_field(&self) -> ArrowField {
        let data_type = match &self.kind {
            NodeKind::Leaf(physical_type) => physical_type.to_arrow(),
            NodeKind::List(item) => ArrowDataType::List(Arc::new(item.to_arrow_field())),
            NodeKind::Struct(children) => ArrowDataType::Struct(
                children
                    .iter()
                    .map(SchemaNode::to_arrow_field)
                    .collect::<ArrowFields>(),
            ),
        };
        ArrowField::new(self.name.clone(), data_type, self.nullable)
    }

    pub fn from_arrow_field(field: &ArrowField) -> Result<SchemaNode> {
        let kind = match field.data_type() {
            ArrowDataType::List(item) => NodeKind::List(Box::new(Self::from_arrow_field(item)?)),
            ArrowDataType::Struct(children) => NodeKind::Struct(
                children
                    .iter()
                    .map(|child| Self::from_arrow_field(child))
                    .collect::<Result<Vec<_>>>()?,
            ),
            other => NodeKind::Leaf(PhysicalType::from_arrow(other).ok_or_else(|| {
                Error::not_implemented(format!("arrow type {other} of field '{}'", field.name()))
            })?),
        };
        Ok(SchemaNode {
            name: field.name().clone(),
            nullable: field.is_nullable(),
            kind,
        })
    }
}

/// Top-level schema of a Strata file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct Schema {
    pub columns: Vec<SchemaNode>,
}

impl Schema {
    pub fn new(columns: Vec<SchemaNode>) -> Schema {
        Schema { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn to_arrow_schema(&self) -> arrow_schema::Schema {
        arrow_schema::Schema::new(
            self.columns
                .iter()
                .map(SchemaNode::to_arrow_field)
                .collect::<Vec<_>>(),
        )
    }

    pub fn from_arrow_schema(schema: &arrow_schema::Schema) -> Result<Schema> {
        let columns = schema
            .fields()
            .iter()
            .map(|field| SchemaNode::from_arrow_field(field))
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema { columns })
    }
}

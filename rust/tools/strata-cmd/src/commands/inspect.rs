//! Inspect command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use strata_format::{ColumnChunkMeta, FileMetadata, SchemaNode, footer, schema::NodeKind};
use strata_io::ReadAt;
use strata_reader::estimate::estimate_page;

use crate::commands::open_file;

#[derive(Serialize)]
struct InspectSummary {
    file_size: u64,
    num_rows: u64,
    created_by: String,
    schema: Vec<FieldInfo>,
    row_groups: Vec<RowGroupInfo>,
}

#[derive(Serialize)]
struct FieldInfo {
    name: String,
    #[serde(rename = "type")]
    data_type: String,
    nullable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<FieldInfo>,
}

#[derive(Serialize)]
struct RowGroupInfo {
    index: usize,
    num_rows: u64,
    columns: Vec<ColumnChunkInfo>,
}

#[derive(Serialize)]
struct ColumnChunkInfo {
    name: String,
    codec: String,
    page_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    compressed_size: Option<u64>,
    uncompressed_size: u64,
    estimated_decoded_size: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pages: Vec<PageInfo>,
}

#[derive(Serialize)]
struct PageInfo {
    index: usize,
    offset: u64,
    first_row: u64,
    num_rows: u64,
    compressed_size: u64,
    uncompressed_size: u64,
    estimated_decoded_size: u64,
}

pub fn run(pages: bool, path: String) -> Result<()> {
    let source = open_file(&path)?;
    let metadata = footer::read_metadata(source.as_ref())
        .with_context(|| format!("Failed to read footer of {path}"))?;
    let summary = summarize(source.size()?, &metadata, pages)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn summarize(file_size: u64, metadata: &FileMetadata, pages: bool) -> Result<InspectSummary> {
    let row_groups = metadata
        .row_groups
        .iter()
        .enumerate()
        .map(|(index, rg)| -> Result<RowGroupInfo> {
            let columns = metadata
                .schema
                .columns
                .iter()
                .zip(&rg.columns)
                .map(|(node, chunk)| column_chunk_info(node, chunk, pages))
                .collect::<Result<Vec<_>>>()?;
            Ok(RowGroupInfo {
                index,
                num_rows: rg.num_rows,
                columns,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(InspectSummary {
        file_size,
        num_rows: metadata.num_rows,
        created_by: metadata.created_by.clone(),
        schema: metadata.schema.columns.iter().map(field_info).collect(),
        row_groups,
    })
}

fn column_chunk_info(
    node: &SchemaNode,
    chunk: &ColumnChunkMeta,
    with_pages: bool,
) -> Result<ColumnChunkInfo> {
    let pages = chunk
        .pages
        .iter()
        .enumerate()
        .map(|(index, page)| -> Result<PageInfo> {
            Ok(PageInfo {
                index,
                offset: page.offset,
                first_row: page.first_row,
                num_rows: page.num_rows,
                compressed_size: page.compressed_size,
                uncompressed_size: page.uncompressed_size,
                estimated_decoded_size: estimate_page(node, &page.node_stats)?.total(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ColumnChunkInfo {
        name: node.name.clone(),
        codec: chunk.codec.to_string(),
        page_count: pages.len(),
        compressed_size: chunk.compressed_size,
        uncompressed_size: chunk.uncompressed_size,
        estimated_decoded_size: pages.iter().map(|page| page.estimated_decoded_size).sum(),
        pages: if with_pages { pages } else { Vec::new() },
    })
}

fn field_info(node: &SchemaNode) -> FieldInfo {
    let (data_type, children) = match &node.kind {
        NodeKind::Leaf(physical_type) => (format!("{physical_type:?}"), Vec::new()),
        NodeKind::List(item) => ("List".to_string(), vec![field_info(item)]),
        NodeKind::Struct(children) => ("Struct".to_string(), children.iter().map(field_info).collect()),
    };
    FieldInfo {
        name: node.name.clone(),
        data_type,
        nullable: node.nullable,
        children,
    }
}

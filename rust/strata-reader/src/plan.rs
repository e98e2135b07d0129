//! Read plan: the ordered row groups, column chunks and pages a session visits.
//!
//! The plan is built once per session. Rows of all sources are concatenated in
//! source order (and, within a source, in row group selection order); `skip_rows`
//! and `num_rows` select a window of that concatenation. Row groups outside the
//! window are dropped, and within the kept row groups only the pages overlapping
//! the selected rows are retained.

use std::ops::Range;

use strata_common::{Result, error::Error};
use strata_format::{Codec, PageHeader, Schema};

use crate::{
    estimate::{estimate_page, scale_estimate},
    source::Source,
};

/// Row selection applied while planning.
#[derive(Debug, Clone, Default)]
pub struct RowSelection {
    pub skip_rows: u64,
    pub num_rows: Option<u64>,
    /// Explicit row group indices per source, in read order.
    pub row_groups: Option<Vec<Vec<usize>>>,
}

/// A page of a planned column chunk that overlaps the selected rows.
#[derive(Debug, Clone)]
pub struct PlannedPage {
    /// Index of the page within its column chunk.
    pub index: usize,
    pub header: PageHeader,
    /// Selected rows of this page, relative to the start of the row group.
    pub rows: Range<u64>,
    /// Estimated decoded size of the selected rows.
    pub estimate: u64,
}

impl PlannedPage {
    /// Stored bytes plus decompressed bytes plus codec scratch, as reserved while
    /// the page is held by a pass.
    pub fn footprint(&self, compressed_size_known: bool, scratch: u64) -> u64 {
        let stored = if compressed_size_known {
            self.header.compressed_size
        } else {
            self.header
                .compressed_size
                .max(self.header.uncompressed_size)
        };
        stored
            .saturating_add(self.header.uncompressed_size)
            .saturating_add(scratch)
    }
}

#[derive(Debug, Clone)]
pub struct PlannedColumnChunk {
    /// Index of the column in the file schema.
    pub column: usize,
    pub codec: Codec,
    pub compressed_size_known: bool,
    pub pages: Vec<PlannedPage>,
}

#[derive(Debug, Clone)]
pub struct PlannedRowGroup {
    pub source: usize,
    /// Index of the row group within its source.
    pub row_group: usize,
    /// Selected rows, relative to the start of the row group.
    pub rows: Range<u64>,
    /// One chunk per projected column.
    pub columns: Vec<PlannedColumnChunk>,
}

impl PlannedRowGroup {
    pub fn num_rows(&self) -> u64 {
        self.rows.end - self.rows.start
    }
}

#[derive(Debug, Clone)]
pub struct ReadPlan {
    /// Projected schema of the output.
    pub schema: Schema,
    /// File schema indices of the projected columns.
    pub projection: Vec<usize>,
    pub source_count: usize,
    pub row_groups: Vec<PlannedRowGroup>,
}

impl ReadPlan {
    pub fn total_rows(&self) -> u64 {
        self.row_groups.iter().map(PlannedRowGroup::num_rows).sum()
    }

    pub fn page_count(&self) -> usize {
        self.row_groups
            .iter()
            .flat_map(|rg| rg.columns.iter())
            .map(|chunk| chunk.pages.len())
            .sum()
    }
}

/// Resolves the projected column names to file schema indices. `None` selects
/// all columns.
pub fn resolve_projection(schema: &Schema, columns: Option<&[String]>) -> Result<Vec<usize>> {
    match columns {
        None => Ok((0..schema.len()).collect()),
        Some(names) => names
            .iter()
            .map(|name| {
                schema
                    .column_index(name)
                    .ok_or_else(|| Error::invalid_arg("columns", format!("unknown column '{name}'")))
            })
            .collect(),
    }
}

/// Builds the read plan over the given sources.
///
/// A selection starting past the end of the data is not an error; it yields an
/// empty plan.
pub fn build_plan(
    sources: &[Source],
    projection: Vec<usize>,
    selection: &RowSelection,
) -> Result<ReadPlan> {
    let file_schema = sources
        .first()
        .map(|source| source.schema().clone())
        .unwrap_or_default();
    let schema = Schema::new(
        projection
            .iter()
            .map(|&idx| file_schema.columns[idx].clone())
            .collect(),
    );

    let order = row_group_order(sources, selection.row_groups.as_deref())?;
    let window_start = selection.skip_rows;
    let window_end = selection
        .num_rows
        .map_or(u64::MAX, |n| window_start.saturating_add(n));

    let mut row_groups = Vec::new();
    let mut position = 0u64;
    for (source_idx, rg_idx) in order {
        let rg = &sources[source_idx].metadata().row_groups[rg_idx];
        let rg_start = position;
        position += rg.num_rows;
        let start = window_start.max(rg_start);
        let end = window_end.min(position);
        if start >= end {
            continue;
        }
        let rows = start - rg_start..end - rg_start;

        let columns = projection
            .iter()
            .map(|&column| -> Result<PlannedColumnChunk> {
                let chunk = &rg.columns[column];
                let node = &file_schema.columns[column];
                let pages = chunk
                    .pages
                    .iter()
                    .enumerate()
                    .filter_map(|(index, header)| {
                        let page_rows = header.row_range();
                        let selected = page_rows.start.max(rows.start)..page_rows.end.min(rows.end);
                        (selected.start < selected.end).then_some((index, header, selected))
                    })
                    .map(|(index, header, selected)| -> Result<PlannedPage> {
                        let full = estimate_page(node, &header.node_stats)?.total();
                        Ok(PlannedPage {
                            index,
                            header: header.clone(),
                            estimate: scale_estimate(
                                full,
                                selected.end - selected.start,
                                header.num_rows,
                            ),
                            rows: selected,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(PlannedColumnChunk {
                    column,
                    codec: chunk.codec,
                    compressed_size_known: chunk.compressed_size.is_some(),
                    pages,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        row_groups.push(PlannedRowGroup {
            source: source_idx,
            row_group: rg_idx,
            rows,
            columns,
        });
    }

    let plan = ReadPlan {
        schema,
        projection,
        source_count: sources.len(),
        row_groups,
    };
    log::debug!(
        "read plan: {} sources, {} of {} rows selected, {} row groups, {} pages",
        plan.source_count,
        plan.total_rows(),
        position,
        plan.row_groups.len(),
        plan.page_count()
    );
    Ok(plan)
}

/// Lists `(source, row group)` pairs in read order.
fn row_group_order(
    sources: &[Source],
    selection: Option<&[Vec<usize>]>,
) -> Result<Vec<(usize, usize)>> {
    let Some(selection) = selection else {
        return Ok(sources
            .iter()
            .enumerate()
            .flat_map(|(source_idx, source)| {
                (0..source.metadata().row_groups.len()).map(move |rg| (source_idx, rg))
            })
            .collect());
    };

    if selection.len() != sources.len() {
        return Err(Error::invalid_arg(
            "row_groups",
            format!(
                "selection lists {} sources, but {} were given",
                selection.len(),
                sources.len()
            ),
        ));
    }
    let mut order = Vec::new();
    for (source_idx, (source, indices)) in sources.iter().zip(selection).enumerate() {
        let available = source.metadata().row_groups.len();
        for &rg in indices {
            if rg >= available {
                return Err(Error::invalid_arg(
                    "row_groups",
                    format!("row group {rg} of source {source_idx} is out of range ({available})"),
                ));
            }
            order.push((source_idx, rg));
        }
    }
    Ok(order)
}

//! Pass splitting and loading.
//!
//! A pass is a contiguous run of planned row groups whose pages are fetched and
//! decompressed together. Its footprint (stored bytes, decompressed bytes and codec
//! scratch of every selected page) is charged against the working-memory [`Budget`]
//! for as long as the pass is alive.

use std::ops::Range;

use arrow_buffer::Buffer;
use rayon::prelude::*;
use strata_budget_tracker::{Allocation, Budget};
use strata_common::{Result, error::Error, result::to_usize};
use strata_encodings::decompress;
use strata_format::{Codec, checksum};

use crate::{
    chunk::RowLayout,
    limits::{CodecScratchTable, ReadLimits},
    plan::{PlannedColumnChunk, PlannedRowGroup, ReadPlan},
    source::Source,
};

/// A decompressed page held by a pass.
#[derive(Debug, Clone)]
pub struct PassPage {
    /// Index of the page within its column chunk.
    pub index: usize,
    /// Selected rows of the page, relative to the start of the pass.
    pub rows: Range<u64>,
    /// Number of page rows preceding the selected ones.
    pub skip: u64,
    /// Total number of rows encoded in the page.
    pub num_rows: u64,
    pub estimate: u64,
    pub data: Buffer,
}

#[derive(Debug, Clone, Default)]
pub struct PassColumn {
    pub pages: Vec<PassPage>,
}

impl PassColumn {
    /// Index of the page holding the pass-relative `row`.
    pub fn page_for_row(&self, row: u64) -> usize {
        self.pages.partition_point(|page| page.rows.end <= row)
    }
}

/// A planned row group as seen from within a pass.
#[derive(Debug, Clone)]
pub struct PassRowGroup {
    pub source: usize,
    /// Rows of the row group, relative to the start of the pass.
    pub rows: Range<u64>,
}

pub struct Pass {
    pub index: usize,
    /// Plan row of the first pass row.
    pub first_row: u64,
    pub row_groups: Vec<PassRowGroup>,
    /// One entry per projected column.
    pub columns: Vec<PassColumn>,
    pub num_rows: u64,
    allocation: Allocation,
}

impl Pass {
    /// Working memory reserved by this pass.
    pub fn reserved(&self) -> u64 {
        self.allocation.amount()
    }

    /// Rows per source contributed by the pass rows `rows`.
    pub fn rows_per_source(&self, rows: Range<u64>, source_count: usize) -> Vec<u64> {
        let mut counts = vec![0u64; source_count];
        for rg in &self.row_groups {
            let start = rg.rows.start.max(rows.start);
            let end = rg.rows.end.min(rows.end);
            if start < end {
                counts[rg.source] += end - start;
            }
        }
        counts
    }
}

impl std::fmt::Debug for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass")
            .field("index", &self.index)
            .field("row_groups", &self.row_groups.len())
            .field("num_rows", &self.num_rows)
            .field("reserved", &self.reserved())
            .finish_non_exhaustive()
    }
}

/// Working memory needed to hold the selected pages of a row group.
pub fn row_group_footprint(row_group: &PlannedRowGroup, scratch: &CodecScratchTable) -> u64 {
    row_group
        .columns
        .iter()
        .flat_map(|chunk| {
            chunk.pages.iter().map(|page| {
                let scratch = scratch.scratch_bytes(chunk.codec, page.header.uncompressed_size);
                page.footprint(chunk.compressed_size_known, scratch)
            })
        })
        .fold(0u64, u64::saturating_add)
}

/// Chooses the pass boundaries, at row group granularity.
///
/// A pass holds several row groups only when their combined footprint fits the
/// input limit; a single row group always makes a pass. Among the admissible
/// groupings the one yielding the fewest chunks wins, then the one with the
/// fewest passes, then the one with the longest leading passes. Since raising
/// either limit only widens the admissible groupings or shortens the split of
/// each pass, the chunk count never grows with a limit.
pub fn schedule_passes(
    footprints: &[u64],
    layout: &RowLayout,
    input_size_limit: u64,
    output_size_limit: u64,
) -> Vec<Range<usize>> {
    let count = footprints.len();
    if count == 0 {
        return Vec::new();
    }
    let total = footprints.iter().fold(0u64, |acc, &f| acc.saturating_add(f));
    // One pass never yields more chunks than a split of the same rows.
    if input_size_limit == 0 || total <= input_size_limit {
        return vec![0..count];
    }

    // best[start]: (chunks, passes, end of the first pass) over row groups start..
    let mut best = vec![(0usize, 0usize, count); count + 1];
    for start in (0..count).rev() {
        let mut choice = (usize::MAX, usize::MAX, start + 1);
        let mut footprint = 0u64;
        for end in start + 1..=count {
            footprint = footprint.saturating_add(footprints[end - 1]);
            if end > start + 1 && footprint > input_size_limit {
                break;
            }
            let chunks = layout.chunk_count(layout.row_group_rows(start..end), output_size_limit);
            let (rest_chunks, rest_passes, _) = best[end];
            let candidate = (chunks + rest_chunks, rest_passes + 1);
            if candidate <= (choice.0, choice.1) {
                choice = (candidate.0, candidate.1, end);
            }
        }
        best[start] = choice;
    }

    let mut passes = Vec::new();
    let mut start = 0;
    while start < count {
        let end = best[start].2;
        passes.push(start..end);
        start = end;
    }
    passes
}

/// Produces passes over a read plan, in plan order.
pub struct PassSplitter {
    budget: Budget,
    footprints: Vec<u64>,
    /// Planned row groups of every pass.
    schedule: Vec<Range<usize>>,
    next_pass: usize,
}

impl PassSplitter {
    /// `input_size_limit` of `0` puts the whole plan into a single pass.
    pub fn new(plan: &ReadPlan, layout: &RowLayout, limits: &ReadLimits) -> PassSplitter {
        let footprints = plan
            .row_groups
            .iter()
            .map(|rg| row_group_footprint(rg, &limits.codec_scratch))
            .collect::<Vec<_>>();
        let schedule = schedule_passes(
            &footprints,
            layout,
            limits.input_size_limit,
            limits.output_size_limit,
        );
        log::debug!(
            "{} row groups scheduled in {} passes",
            footprints.len(),
            schedule.len()
        );
        PassSplitter {
            budget: Budget::from_limit(limits.input_size_limit),
            footprints,
            schedule,
            next_pass: 0,
        }
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    pub fn schedule(&self) -> &[Range<usize>] {
        &self.schedule
    }

    pub fn is_done(&self) -> bool {
        self.next_pass >= self.schedule.len()
    }

    /// Takes the plan row groups of the next pass and reserves their footprint.
    ///
    /// A row group whose footprint alone exceeds the budget is still admitted,
    /// over-committing the budget until the pass is dropped.
    pub fn next_range(&mut self, plan: &ReadPlan) -> Option<(Range<usize>, Allocation)> {
        let range = self.schedule.get(self.next_pass)?.clone();
        self.next_pass += 1;
        let footprint = self.footprints[range.clone()]
            .iter()
            .fold(0u64, |acc, &f| acc.saturating_add(f));
        let allocation = match self.budget.allocate(footprint) {
            Ok(allocation) => allocation,
            Err(_) => {
                let first = &plan.row_groups[range.start];
                log::warn!(
                    "row group {} of source {} needs {footprint} bytes of working memory, \
                     above the input limit of {:?}; reading it in a pass of its own",
                    first.row_group,
                    first.source,
                    self.budget.ceiling()
                );
                self.budget.allocate_forced(footprint)
            }
        };
        Some((range, allocation))
    }

    /// Computes, fetches and decompresses the next pass. Returns `None` once the
    /// plan is exhausted.
    pub fn next_pass(&mut self, plan: &ReadPlan, sources: &[Source]) -> Result<Option<Pass>> {
        let index = self.next_pass;
        let Some((range, allocation)) = self.next_range(plan) else {
            return Ok(None);
        };
        let pass = load_pass(index, plan, range, sources, allocation)?;
        log::debug!(
            "pass {index}: {} row groups, {} rows, {} bytes reserved",
            pass.row_groups.len(),
            pass.num_rows,
            pass.reserved()
        );
        Ok(Some(pass))
    }
}

fn load_pass(
    index: usize,
    plan: &ReadPlan,
    range: Range<usize>,
    sources: &[Source],
    allocation: Allocation,
) -> Result<Pass> {
    let first_row = plan.row_groups[..range.start]
        .iter()
        .map(PlannedRowGroup::num_rows)
        .sum();
    let row_groups = &plan.row_groups[range];
    let mut pass_row_groups = Vec::with_capacity(row_groups.len());
    let mut offset = 0u64;
    for rg in row_groups {
        pass_row_groups.push(PassRowGroup {
            source: rg.source,
            rows: offset..offset + rg.num_rows(),
        });
        offset += rg.num_rows();
    }

    // One job per column chunk: a single fetch covering its selected pages.
    let jobs = row_groups
        .iter()
        .zip(pass_row_groups.iter())
        .flat_map(|(rg, pass_rg)| {
            rg.columns
                .iter()
                .enumerate()
                .map(move |(col, chunk)| (rg, pass_rg.rows.start, col, chunk))
        })
        .collect::<Vec<_>>();

    let loaded = jobs
        .into_par_iter()
        .map(|(rg, pass_offset, col, chunk)| -> Result<(usize, Vec<PassPage>)> {
            let name = &plan.schema.columns[col].name;
            let pages = load_column_chunk(&sources[rg.source], name, chunk)?;
            let pages = chunk
                .pages
                .iter()
                .zip(pages)
                .map(|(page, data)| PassPage {
                    index: page.index,
                    rows: pass_offset + (page.rows.start - rg.rows.start)
                        ..pass_offset + (page.rows.end - rg.rows.start),
                    skip: page.rows.start - page.header.first_row,
                    num_rows: page.header.num_rows,
                    estimate: page.estimate,
                    data,
                })
                .collect::<Vec<_>>();
            Ok((col, pages))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut columns = vec![PassColumn::default(); plan.schema.len()];
    for (col, pages) in loaded {
        columns[col].pages.extend(pages);
    }

    Ok(Pass {
        index,
        first_row,
        row_groups: pass_row_groups,
        columns,
        num_rows: offset,
        allocation,
    })
}

/// Fetches the selected pages of a column chunk and returns their decompressed bytes.
fn load_column_chunk(
    source: &Source,
    column: &str,
    chunk: &PlannedColumnChunk,
) -> Result<Vec<Buffer>> {
    let (Some(first), Some(last)) = (chunk.pages.first(), chunk.pages.last()) else {
        return Ok(Vec::new());
    };
    let range = first.header.offset..last.header.byte_range()?.end;
    if range.start > range.end {
        return Err(Error::decode(column, first.index, "pages are not in file order"));
    }
    let fetched = source
        .reader()
        .read_at(range.clone())
        .map_err(|e| Error::io(format!("pages of column '{column}'"), e))?;
    if fetched.len() as u64 != range.end - range.start {
        return Err(Error::decode(
            column,
            first.index,
            format!(
                "short read: {} of {} bytes",
                fetched.len(),
                range.end - range.start
            ),
        ));
    }

    chunk
        .pages
        .iter()
        .map(|page| {
            let header = &page.header;
            let page_range = header.byte_range()?;
            if page_range.start < range.start || page_range.end > range.end {
                return Err(Error::decode(
                    column,
                    page.index,
                    format!("page bytes {page_range:?} outside of the fetched range {range:?}"),
                ));
            }
            let start = to_usize(page_range.start - range.start)?;
            let stored = fetched.slice_with_length(start, to_usize(header.compressed_size)?);
            checksum::validate_buffer(
                &stored,
                header.checksum,
                &format!("page {} of column '{column}'", page.index),
            )?;
            let uncompressed_size = to_usize(header.uncompressed_size)?;
            if chunk.codec == Codec::Uncompressed && stored.len() == uncompressed_size {
                return Ok(stored);
            }
            let data = decompress(chunk.codec, &stored, uncompressed_size)
                .map_err(|e| Error::decode(column, page.index, e.to_string()))?;
            Ok(Buffer::from_vec(data))
        })
        .collect()
}

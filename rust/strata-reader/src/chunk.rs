//! Chunk splitting.
//!
//! A chunk is a run of whole rows. Chunks may only end where some projected column
//! has a page boundary, and the size of a candidate chunk is the sum of the
//! estimates of every page (of every column) it touches. Within a range of rows the
//! splitter greedily takes the longest run that fits the output limit; the limit is
//! inclusive.
//!
//! Because a shorter run never touches more pages than a longer one, the greedy
//! split of a range yields the fewest chunks any split of that range can, and
//! [`RowLayout::chunk_count`] is the cost the pass scheduler minimizes.

use std::{ops::Range, sync::Arc};

use itertools::Itertools;

use crate::{pass::Pass, plan::ReadPlan};

/// Page layout of the planned rows, in plan row coordinates (rows of all planned
/// row groups, concatenated).
#[derive(Debug, Clone)]
pub struct RowLayout {
    num_rows: u64,
    /// Candidate chunk ends: page ends of every column and row group ends,
    /// ascending.
    boundaries: Vec<u64>,
    columns: Vec<ColumnSizes>,
    /// First plan row of every planned row group, followed by `num_rows`.
    row_group_starts: Vec<u64>,
}

/// Page ends of one column, with prefix sums of the page estimates.
#[derive(Debug, Clone)]
struct ColumnSizes {
    page_ends: Vec<u64>,
    prefix: Vec<u64>,
}

impl ColumnSizes {
    fn new() -> ColumnSizes {
        ColumnSizes {
            page_ends: Vec::new(),
            prefix: vec![0],
        }
    }

    fn push(&mut self, end: u64, estimate: u64) {
        let total = self.prefix.last().copied().unwrap_or(0);
        self.page_ends.push(end);
        self.prefix.push(total.saturating_add(estimate));
    }

    /// Estimated size of the pages overlapping `rows` (non-empty).
    fn size(&self, rows: &Range<u64>) -> u64 {
        let first = self.page_ends.partition_point(|&end| end <= rows.start);
        let last = self.page_ends.partition_point(|&end| end < rows.end);
        if first >= self.page_ends.len() {
            return 0;
        }
        let last = last.min(self.page_ends.len() - 1);
        self.prefix[last + 1] - self.prefix[first]
    }
}

impl RowLayout {
    pub fn new(plan: &ReadPlan) -> RowLayout {
        let mut columns = vec![ColumnSizes::new(); plan.schema.len()];
        let mut row_group_starts = Vec::with_capacity(plan.row_groups.len() + 1);
        let mut offset = 0u64;
        for rg in &plan.row_groups {
            row_group_starts.push(offset);
            for (sizes, chunk) in columns.iter_mut().zip(&rg.columns) {
                for page in &chunk.pages {
                    sizes.push(offset + (page.rows.end - rg.rows.start), page.estimate);
                }
            }
            offset += rg.num_rows();
        }
        row_group_starts.push(offset);

        let boundaries = columns
            .iter()
            .map(|sizes| sizes.page_ends.iter().copied())
            .chain(std::iter::once(row_group_starts[1..].iter().copied()))
            .kmerge()
            .dedup()
            .filter(|&end| end > 0)
            .collect();

        RowLayout {
            num_rows: offset,
            boundaries,
            columns,
            row_group_starts,
        }
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    /// Plan rows of the planned row groups `row_groups`.
    pub fn row_group_rows(&self, row_groups: Range<usize>) -> Range<u64> {
        self.row_group_starts[row_groups.start]..self.row_group_starts[row_groups.end]
    }

    /// Estimated decoded size of the plan rows `rows`.
    pub fn estimate(&self, rows: Range<u64>) -> u64 {
        if rows.start >= rows.end {
            return 0;
        }
        self.columns
            .iter()
            .map(|column| column.size(&rows))
            .fold(0u64, u64::saturating_add)
    }

    /// End of the chunk starting at `rows.start` and bounded by `rows.end`, and
    /// whether it fits the limit. When nothing fits, the shortest candidate is
    /// returned.
    pub fn chunk_end(&self, rows: Range<u64>, limit: u64) -> (u64, bool) {
        if limit == 0 {
            return (rows.end, true);
        }
        let first = self.boundaries.partition_point(|&end| end <= rows.start);
        let last = self.boundaries.partition_point(|&end| end <= rows.end);
        let candidates = &self.boundaries[first..last];
        // The size grows with the chunk end, so the fitting ends form a prefix.
        let fitting =
            candidates.partition_point(|&end| self.estimate(rows.start..end) <= limit);
        if fitting > 0 {
            (candidates[fitting - 1], true)
        } else {
            (candidates.first().copied().unwrap_or(rows.end), false)
        }
    }

    /// Number of chunks the greedy split of `rows` produces.
    pub fn chunk_count(&self, rows: Range<u64>, limit: u64) -> usize {
        let mut start = rows.start;
        let mut count = 0;
        while start < rows.end {
            start = self.chunk_end(start..rows.end, limit).0;
            count += 1;
        }
        count
    }
}

/// Splits the rows of one pass into chunks that fit the output size limit.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    layout: Arc<RowLayout>,
    limit: u64,
    /// Plan rows of the pass.
    rows: Range<u64>,
    next_row: u64,
}

impl ChunkSplitter {
    /// `output_size_limit` of `0` makes the whole pass a single chunk.
    pub fn new(layout: Arc<RowLayout>, pass: &Pass, output_size_limit: u64) -> ChunkSplitter {
        let rows = pass.first_row..pass.first_row + pass.num_rows;
        ChunkSplitter {
            layout,
            limit: output_size_limit,
            next_row: rows.start,
            rows,
        }
    }

    pub fn is_done(&self) -> bool {
        self.next_row >= self.rows.end
    }

    /// Returns the pass rows of the next chunk, or `None` once the pass is consumed.
    pub fn next_chunk(&mut self) -> Option<Range<u64>> {
        if self.is_done() {
            return None;
        }
        let start = self.next_row;
        let (end, fits) = self.layout.chunk_end(start..self.rows.end, self.limit);
        let estimate = self.layout.estimate(start..end);
        if !fits {
            log::warn!(
                "rows {start}..{end} need an estimated {estimate} bytes, above the output \
                 limit of {}; emitting them as a chunk of their own",
                self.limit
            );
        }
        self.next_row = end;
        log::debug!("chunk: plan rows {start}..{end}, estimated {estimate} bytes");
        Some(start - self.rows.start..end - self.rows.start)
    }
}

impl Iterator for ChunkSplitter {
    type Item = Range<u64>;

    fn next(&mut self) -> Option<Range<u64>> {
        self.next_chunk()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use strata_io::ReadAt;
    use strata_testkit::{FileBuilder, data_gen::int_schema, int_batch};

    use super::*;
    use crate::{
        limits::ReadLimits,
        pass::PassSplitter,
        plan::{RowSelection, build_plan},
        source::{Source, open_sources},
    };

    /// 100 rows of two Int32 columns. Column `c0` has pages of 10 rows (40 bytes),
    /// column `c1` pages of `c1_rows`.
    fn plan(c1_rows: usize) -> (ReadPlan, Vec<Source>) {
        let batch = int_batch(100, 2).unwrap();
        let file = FileBuilder::new(int_schema(2))
            .with_rows_per_page(10)
            .with_column_rows_per_page(1, c1_rows)
            .build_batch(&batch)
            .unwrap();
        let sources = open_sources(vec![Arc::new(file) as Arc<dyn ReadAt>]).unwrap();
        let plan = build_plan(&sources, vec![0, 1], &RowSelection::default()).unwrap();
        (plan, sources)
    }

    fn layout(c1_rows: usize) -> Arc<RowLayout> {
        Arc::new(RowLayout::new(&plan(c1_rows).0))
    }

    /// Chunks of the single pass holding the whole file.
    fn chunks(c1_rows: usize, limit: u64) -> Vec<Range<u64>> {
        let (plan, sources) = plan(c1_rows);
        let layout = Arc::new(RowLayout::new(&plan));
        let pass = PassSplitter::new(&plan, &layout, &ReadLimits::unbounded())
            .next_pass(&plan, &sources)
            .unwrap()
            .unwrap();
        ChunkSplitter::new(layout, &pass, limit).collect()
    }

    #[test]
    fn test_zero_limit_is_whole_pass() {
        assert_eq!(chunks(10, 0), vec![0..100]);
    }

    #[test]
    fn test_limit_is_inclusive() {
        let fitting = chunks(10, 160);
        assert_eq!(fitting.len(), 5);
        assert!(fitting.iter().all(|rows| rows.end - rows.start == 20));
        assert_eq!(chunks(10, 159).len(), 10);
        assert_eq!(chunks(10, 800), vec![0..100]);
    }

    #[test]
    fn test_forward_progress() {
        let chunks = chunks(10, 1);
        assert_eq!(chunks.len(), 10);
        assert_eq!(chunks[3], 30..40);
        assert_eq!(layout(10).chunk_end(30..100, 1), (40, false));
    }

    #[test]
    fn test_misaligned_pages() {
        // c1 pages of 25 rows: boundaries at every 10 and every 25 rows.
        let layout = layout(25);
        assert_eq!(
            layout.boundaries(),
            &[10, 20, 25, 30, 40, 50, 60, 70, 75, 80, 90, 100]
        );
        // Rows 0..25 touch three c0 pages and one c1 page.
        assert_eq!(layout.estimate(0..25), 3 * 40 + 100);
        assert_eq!(layout.estimate(20..25), 40 + 100);

        let chunks = chunks(25, 220);
        assert_eq!(chunks[0], 0..25);
        let covered: u64 = chunks.iter().map(|rows| rows.end - rows.start).sum();
        assert_eq!(covered, 100);
        assert!(chunks.windows(2).all(|w| w[0].end == w[1].start));
        assert_eq!(layout.chunk_count(0..100, 220), chunks.len());
    }

    #[test]
    fn test_chunk_end_is_bounded_by_range() {
        let layout = layout(10);
        assert_eq!(layout.chunk_end(0..30, 800), (30, true));
        assert_eq!(layout.chunk_end(35..40, 1), (40, false));
        assert_eq!(layout.chunk_count(20..60, 160), 2);
        assert_eq!(layout.chunk_count(20..60, 0), 1);
        assert_eq!(layout.row_group_rows(0..1), 0..100);
    }

    #[test]
    fn test_budget_monotonicity() {
        let layout = layout(25);
        let counts = [1, 100, 150, 220, 300, 500, 1000, 0]
            .map(|limit| layout.chunk_count(0..100, limit));
        assert!(counts.windows(2).all(|w| w[0] >= w[1]), "{counts:?}");
    }
}

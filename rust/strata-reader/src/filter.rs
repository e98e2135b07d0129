//! Row-level predicate applied to every decoded chunk.

use arrow_array::{BooleanArray, RecordBatch};
use strata_common::{Result, error::Error, verify_arg};

/// Predicate over the decoded (projected) columns of a chunk.
///
/// Returns one entry per row of `batch`; rows mapped to `true` are kept, rows
/// mapped to `false` or null are dropped.
pub trait RowFilter: Send + Sync {
    fn evaluate(&self, batch: &RecordBatch) -> Result<BooleanArray>;
}

impl<F> RowFilter for F
where
    F: Fn(&RecordBatch) -> Result<BooleanArray> + Send + Sync,
{
    fn evaluate(&self, batch: &RecordBatch) -> Result<BooleanArray> {
        self(batch)
    }
}

/// Applies the filter to a batch.
pub(crate) fn apply(filter: &dyn RowFilter, batch: RecordBatch) -> Result<RecordBatch> {
    let mask = filter.evaluate(&batch)?;
    verify_arg!(filter_mask, mask.len() == batch.num_rows());
    arrow_select::filter::filter_record_batch(&batch, &mask)
        .map_err(|e| Error::arrow("filter chunk", e))
}

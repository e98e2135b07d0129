//! Decoded size estimation of pages.
//!
//! The estimate is computed from the page header statistics alone by visiting the
//! column schema tree. Every node contributes its share of the Arrow representation:
//!
//! - nullable nodes: a validity bitmap of `ceil(n / 8)` bytes;
//! - lists, strings and binaries: an offsets array of `(n + 1) * 4` bytes;
//! - fixed-width leaves: `n * width` value bytes, booleans `ceil(n / 8)`;
//! - strings and binaries: their payload bytes;
//! - structs: nothing beyond their validity, their children are visited in turn.

use strata_common::{Result, verify_data};
use strata_format::{
    NodeStats,
    schema::{NodeKind, PhysicalType, SchemaNode},
};

/// Size of a single offset entry.
const OFFSET_WIDTH: u64 = 4;

/// Estimated decoded bytes of a page, split by buffer role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeBreakdown {
    pub validity: u64,
    pub offsets: u64,
    pub values: u64,
}

impl SizeBreakdown {
    pub fn total(&self) -> u64 {
        self.validity
            .saturating_add(self.offsets)
            .saturating_add(self.values)
    }
}

impl std::ops::AddAssign for SizeBreakdown {
    fn add_assign(&mut self, rhs: SizeBreakdown) {
        self.validity = self.validity.saturating_add(rhs.validity);
        self.offsets = self.offsets.saturating_add(rhs.offsets);
        self.values = self.values.saturating_add(rhs.values);
    }
}

/// Estimates the decoded size of a page of `column` with the given per-node statistics.
pub fn estimate_page(column: &SchemaNode, node_stats: &[NodeStats]) -> Result<SizeBreakdown> {
    verify_data!(node_stats, node_stats.len() == column.node_count());
    let mut visitor = SizeVisitor::default();
    let mut stats = node_stats.iter();
    visitor.visit(column, &mut stats);
    Ok(visitor.size)
}

/// Share of `estimate` attributed to `selected` out of `total` rows, rounded up.
pub fn scale_estimate(estimate: u64, selected: u64, total: u64) -> u64 {
    if total == 0 || selected >= total {
        return estimate;
    }
    let scaled = (estimate as u128 * selected as u128).div_ceil(total as u128);
    scaled as u64
}

#[derive(Default)]
struct SizeVisitor {
    size: SizeBreakdown,
}

impl SizeVisitor {
    fn visit<'a>(&mut self, node: &SchemaNode, stats: &mut impl Iterator<Item = &'a NodeStats>) {
        // The statistics count was verified against the node count up front.
        let Some(node_stats) = stats.next() else {
            return;
        };
        let n = node_stats.value_count;
        if node.nullable {
            self.size.validity = self.size.validity.saturating_add(n.div_ceil(8));
        }
        match &node.kind {
            NodeKind::Leaf(physical_type) => self.visit_leaf(*physical_type, node_stats),
            NodeKind::List(item) => {
                self.add_offsets(n);
                self.visit(item, stats);
            }
            NodeKind::Struct(children) => {
                for child in children {
                    self.visit(child, stats);
                }
            }
        }
    }

    fn visit_leaf(&mut self, physical_type: PhysicalType, node_stats: &NodeStats) {
        let n = node_stats.value_count;
        let values = match physical_type {
            PhysicalType::Boolean => n.div_ceil(8),
            PhysicalType::Utf8 | PhysicalType::Binary => {
                self.add_offsets(n);
                node_stats.payload_bytes
            }
            fixed => n.saturating_mul(fixed.fixed_width().unwrap_or(0) as u64),
        };
        self.size.values = self.size.values.saturating_add(values);
    }

    fn add_offsets(&mut self, n: u64) {
        self.size.offsets = self
            .size
            .offsets
            .saturating_add(n.saturating_add(1).saturating_mul(OFFSET_WIDTH));
    }
}

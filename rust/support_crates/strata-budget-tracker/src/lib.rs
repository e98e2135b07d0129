//! Working-memory budget tracking.
//!
//! A [`Budget`] has an optional ceiling (no ceiling means unbounded). Memory is
//! taken from it through [`Allocation`]s, which return their amount to the budget
//! when dropped. Consumers that must make progress regardless of the ceiling can
//! over-commit with [`Budget::allocate_forced`]; the over-commit is visible through
//! [`Budget::is_over_committed`] until the allocation is dropped.

use std::sync::Arc;

use counter::UsageCounter;

pub mod counter;

/// Represents a budget that can be allocated from.
#[derive(Clone)]
pub struct Budget(Arc<BudgetState>);

struct BudgetState {
    ceiling: Option<u64>,
    used: UsageCounter,
}

impl BudgetState {
    fn ceiling_or_max(&self) -> u64 {
        self.ceiling.unwrap_or(u64::MAX)
    }
}

impl Budget {
    /// Creates a budget with the given ceiling.
    pub fn new(amount: u64) -> Budget {
        Budget(Arc::new(BudgetState {
            ceiling: Some(amount),
            used: UsageCounter::new(),
        }))
    }

    /// Creates a budget without a ceiling. Allocations from it never fail.
    pub fn unbounded() -> Budget {
        Budget(Arc::new(BudgetState {
            ceiling: None,
            used: UsageCounter::new(),
        }))
    }

    /// Creates a budget from a limit where `0` stands for "no limit".
    pub fn from_limit(limit: u64) -> Budget {
        if limit == 0 {
            Budget::unbounded()
        } else {
            Budget::new(limit)
        }
    }

    /// Returns the ceiling of this budget, `None` when unbounded.
    pub fn ceiling(&self) -> Option<u64> {
        self.0.ceiling
    }

    /// Returns the amount currently held by live allocations.
    pub fn used(&self) -> u64 {
        self.0.used.read()
    }

    /// Returns `true` if forced allocations pushed the usage above the ceiling.
    pub fn is_over_committed(&self) -> bool {
        self.used() > self.0.ceiling_or_max()
    }

    /// Attempts to allocate the specified amount from the budget.
    ///
    /// Returns an `Allocation` upon success, or an `AllocationError` if the budget
    /// lacks sufficient remaining funds. An allocation that exactly exhausts the
    /// budget succeeds.
    ///
    /// The allocated amount is automatically returned to the `Budget` when the
    /// `Allocation` is dropped.
    pub fn allocate(&self, amount: u64) -> Result<Allocation, AllocationError> {
        if self.0.used.try_charge(amount, self.0.ceiling_or_max()) {
            Ok(Allocation {
                budget: self.0.clone(),
                amount,
            })
        } else {
            Err(AllocationError)
        }
    }

    /// Allocates the specified amount regardless of the remaining funds.
    pub fn allocate_forced(&self, amount: u64) -> Allocation {
        self.0.used.charge(amount);
        Allocation {
            budget: self.0.clone(),
            amount,
        }
    }
}

impl std::fmt::Debug for Budget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Budget")
            .field("ceiling", &self.0.ceiling)
            .field("used", &self.used())
            .finish()
    }
}

/// Represents an allocation from a budget.
///
/// When the allocation is dropped, the allocated amount is returned to the budget.
pub struct Allocation {
    budget: Arc<BudgetState>,
    amount: u64,
}

impl Allocation {
    /// Currently allocated amount.
    pub fn amount(&self) -> u64 {
        self.amount
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        if self.amount != 0 {
            self.budget.used.refund(self.amount);
        }
    }
}

impl std::fmt::Debug for Allocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocation")
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

/// An error that occurs when a budget allocation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationError;

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Budget allocation error")
    }
}

impl std::error::Error for AllocationError {}

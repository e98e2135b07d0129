use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe usage counter that lets multiple consumers charge (if the ceiling allows)
/// and refund specific amounts.
///
/// The `UsageCounter` uses atomic operations to stay correct when multiple threads
/// are charging against the same ceiling concurrently.
pub struct UsageCounter(AtomicU64);

impl UsageCounter {
    /// Creates a new counter with zero usage.
    pub fn new() -> UsageCounter {
        UsageCounter(AtomicU64::new(0))
    }

    /// Attempts to charge `amount` while keeping the total usage at or below `ceiling`.
    ///
    /// Returns `true` if the charge was applied. A charge that lands exactly on the
    /// ceiling succeeds.
    pub fn try_charge(&self, amount: u64, ceiling: u64) -> bool {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let Some(next) = current.checked_add(amount) else {
                return false;
            };
            if next > ceiling {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(updated) => current = updated,
            }
        }
    }

    /// Charges `amount` unconditionally, saturating at `u64::MAX`.
    pub fn charge(&self, amount: u64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(amount);
            match self.0.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(updated) => current = updated,
            }
        }
    }

    /// Refunds `amount`. The usage never drops below zero.
    pub fn refund(&self, amount: u64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_sub(amount);
            match self.0.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(updated) => current = updated,
            }
        }
    }

    /// Returns the counter value (most likely stale by the time it is observed by the caller).
    pub fn read(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for UsageCounter {
    fn default() -> Self {
        Self::new()
    }
}
